//! Loader for the lookup-source registry with YAML + environment overlays.
//!
//! The registry is the only upstream input to the web-source core: a list of
//! remote lookup sites, each with a URL template and embed settings. The
//! core reads these fields once per fetch and never writes them back.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// The full registry as configured.
#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    pub version: Option<String>,
    pub sources: Vec<SourceSpec>,
}

/// One remote lookup source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    /// Stable short identifier; also namespaces the generated markup.
    pub id: String,
    /// Display name shown to the user.
    pub name: String,
    /// URL template, possibly carrying placeholder tokens for the lookup word.
    pub url: String,
    /// Disabled sources yield no dictionary. Defaults to enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Embed the live page in an iframe instead of fetching and rewriting it.
    #[serde(default)]
    pub iframe: Option<bool>,
    /// Articles from this source read right-to-left.
    #[serde(default)]
    pub rtl: Option<bool>,
}

impl SourceSpec {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct RegistryLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for RegistryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryLoader {
    /// Start with the defaults: a YAML file plus `LEXI__` env overrides.
    ///
    /// ```
    /// use lexi_registry::RegistryLoader;
    ///
    /// let registry = RegistryLoader::new()
    ///     .with_yaml_str("version: '1'\nsources: []")
    ///     .load()
    ///     .expect("valid registry");
    ///
    /// assert_eq!(registry.version.as_deref(), Some("1"));
    /// assert!(registry.sources.is_empty());
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("LEXI").separator("__"));
        Self { builder }
    }

    /// Attach a registry file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI overrides).
    ///
    /// ```
    /// use lexi_registry::RegistryLoader;
    ///
    /// let registry = RegistryLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// sources:
    ///   - id: "wiki"
    ///     name: "Wiktionary"
    ///     url: "https://en.wiktionary.org/wiki/%LXWORD%"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(registry.sources.len(), 1);
    /// assert!(registry.sources[0].is_enabled());
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders in any string field are expanded (recursively,
    /// with a depth cap) before the typed structs are materialised, so a
    /// registry file can reference e.g. a per-user mirror host.
    pub fn load(self) -> Result<RegistryConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: RegistryConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
