//! Web-site-backed dictionary sources.
//!
//! Turns an arbitrary remote web page into a dictionary article: the lookup
//! word is substituted into a source's URL template in several legacy
//! encodings at once (`template`), the page is fetched asynchronously with
//! redirect following and cooperative cancellation (`transport`, `fetch`),
//! and the returned markup is rewritten into a self-contained fragment that
//! can be embedded in a foreign document (`normalize`).
//!
//! - `dict`: the dictionary capability trait plus its web-backed
//!   implementation and the registry-driven constructor
//! - `template`: pure URL template resolution over a static encoding table
//! - `transport`: the abstract "one GET, one hop" transport and its
//!   reqwest-backed implementation
//! - `fetch`: the per-lookup state machine and its consumer handle
//! - `sniff`: HTML-aware charset detection for fetched bytes
//! - `normalize`: best-effort markup repair; deliberately regex-based, not a
//!   parser (see module docs)

pub mod dict;
pub mod fetch;
pub mod normalize;
pub mod sniff;
pub mod template;
pub mod transport;

pub use dict::{
    Dictionary, EmbedMode, PrefixMatches, SourceDescriptor, WebSiteSource, make_dictionaries,
};
pub use fetch::{ArticleFetch, FetchState};
pub use transport::{Hop, HttpTransport, Transport, TransportError};
