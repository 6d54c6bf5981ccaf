//! Stream URL resolution for the radio engine
//!
//! Configured stream URLs often point at a small playlist or feed document
//! (`.pls`, `.m3u`, `.xspf`, RSS/Atom) rather than at the audio itself. This
//! crate fetches such documents (size-capped, timeout-bounded and
//! interruptible), sniffs their format and follows the first playable entry,
//! recursing a bounded number of times.
//!
//! It also builds the ordered list of URL variants the stream fallback chain
//! tries when a URL does not play as-is.

#![forbid(unsafe_code)]

pub mod error;
pub mod fetch;
pub mod formats;
pub mod resolver;
pub mod url_tools;

pub use error::{ResolverError, Result};
pub use fetch::{Fetch, FetchedDocument, HttpFetcher};
pub use resolver::{ResolveUrl, StreamResolver};
pub use url_tools::stream_candidates;
