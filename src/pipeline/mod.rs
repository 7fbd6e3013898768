//! Pipeline stages for web-to-PDF conversion.
//!
//! Each submodule implements one step and is testable without a browser;
//! only [`render`] talks to a [`crate::engine::RenderEngine`].
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ (discover) ──▶ render ⟲ retry ──▶ summary ──▶ (merge)
//! (URLs)     (crawl only)   (engine)  (policy)  (record)    (lopdf)
//! ```
//!
//! 1. [`source`]    parse and validate the user's URL list
//! 2. [`discover`]  extract same-site navigation links from a seed page
//! 3. [`render`]    navigate, settle, auto-scroll and print one page
//! 4. [`retry`]     re-run a failed render under a bounded backoff policy
//! 5. [`summary`]   aggregate outcomes and persist `batch_summary.json`
//! 6. [`merge`]     concatenate successful PDFs in input order

pub mod discover;
pub mod merge;
pub mod render;
pub mod retry;
pub mod source;
pub mod summary;
