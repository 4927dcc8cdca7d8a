//! Auxiliary evidence fetchers and the canonical bundle builder.
//!
//! Each fetcher is independent, best-effort, and non-throwing: a slow,
//! rate-limited, empty, or absent source degrades its own section of the
//! evidence and never fails the pipeline.

pub mod bundle;
pub mod keywords;
pub mod news;
pub mod press;
pub mod products;

pub use bundle::{MAX_PROMPT_CHARS, build_bundle, digest, preview, render_prompt};
pub use keywords::derive_keywords;
pub use news::fetch_news;
pub use press::{PressDiscovery, discover_press};
pub use products::{ProductEvidence, ProductSearcher};
