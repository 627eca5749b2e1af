//! The dictionary capability surface and its web-backed implementation.
//!
//! Dictionaries of every kind expose the same small capability set; the
//! web-backed source here is one concrete implementation of it. No
//! inheritance hierarchy: a trait object is all the polymorphism needed.

use std::sync::Arc;

use lexi_registry::RegistryConfig;

use crate::fetch::{self, ArticleFetch};
use crate::normalize;
use crate::template;
use crate::transport::Transport;

/// How a source's result is embedded in the surrounding document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// Fetch the page, rewrite it, and inline the fragment.
    Inline,
    /// Skip fetching entirely and emit an `<iframe>` onto the live page.
    Iframe,
}

/// Static description of one remote lookup source. Immutable; the core reads
/// it once per fetch and never writes it back.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Stable short identifier, also used to namespace generated markup.
    pub id: String,
    pub name: String,
    pub url_template: String,
    pub embed: EmbedMode,
    pub right_to_left: bool,
}

/// Instant outcome of a prefix search.
#[derive(Debug, Clone, Default)]
pub struct PrefixMatches {
    /// True when the source cannot actually enumerate candidates and the
    /// empty result must not be treated as "word absent".
    pub uncertain: bool,
    pub words: Vec<String>,
}

/// Capability set shared by every dictionary kind.
pub trait Dictionary: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    /// Human-readable description; for web sources this is the URL template.
    fn description(&self) -> &str;
    fn article_count(&self) -> u64 {
        0
    }
    fn word_count(&self) -> u64 {
        0
    }
    /// Prefix search over the source's headwords.
    fn prefix_match(&self, word: &str, limit: usize) -> PrefixMatches;
    /// Start (or instantly produce) an article lookup for `word`.
    ///
    /// A non-empty `context` is an already-resolved URL — typically a link
    /// the user followed inside a previous article — and is fetched as-is
    /// instead of templating `word`.
    fn article(&self, word: &str, context: Option<&str>) -> Arc<ArticleFetch>;
}

/// A dictionary backed by an arbitrary remote web page.
pub struct WebSiteSource {
    descriptor: SourceDescriptor,
    transport: Arc<dyn Transport>,
}

impl WebSiteSource {
    pub fn new(descriptor: SourceDescriptor, transport: Arc<dyn Transport>) -> Self {
        Self {
            descriptor,
            transport,
        }
    }
}

impl Dictionary for WebSiteSource {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.url_template
    }

    /// Remote sites cannot enumerate their headwords, so the result is
    /// instant, empty, and flagged uncertain.
    fn prefix_match(&self, _word: &str, _limit: usize) -> PrefixMatches {
        PrefixMatches {
            uncertain: true,
            words: Vec::new(),
        }
    }

    fn article(&self, word: &str, context: Option<&str>) -> Arc<ArticleFetch> {
        let url = template::resolve_url(&self.descriptor.url_template, word, context);

        if self.descriptor.embed == EmbedMode::Iframe {
            return ArticleFetch::instant(normalize::iframe_fragment(&url, &self.descriptor.id));
        }

        tracing::debug!(
            target: "websource.dict",
            source = %self.descriptor.id,
            url = %url,
            "starting article lookup"
        );
        fetch::spawn_fetch(
            Arc::clone(&self.transport),
            url,
            self.descriptor.id.clone(),
            self.descriptor.right_to_left,
        )
    }
}

/// Build one dictionary per enabled registry entry. Disabled entries are
/// skipped entirely; the descriptor fields are copied out once here.
pub fn make_dictionaries(
    config: &RegistryConfig,
    transport: Arc<dyn Transport>,
) -> Vec<Arc<dyn Dictionary>> {
    config
        .sources
        .iter()
        .filter(|s| s.is_enabled())
        .map(|s| {
            let descriptor = SourceDescriptor {
                id: s.id.clone(),
                name: s.name.clone(),
                url_template: s.url.clone(),
                embed: if s.iframe.unwrap_or(false) {
                    EmbedMode::Iframe
                } else {
                    EmbedMode::Inline
                },
                right_to_left: s.rtl.unwrap_or(false),
            };
            Arc::new(WebSiteSource::new(descriptor, Arc::clone(&transport))) as Arc<dyn Dictionary>
        })
        .collect()
}
