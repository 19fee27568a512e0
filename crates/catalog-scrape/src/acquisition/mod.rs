//! HTTP-side acquisition: search, object metadata and static page text.
//!
//! None of these steps need a browser. The rendered-page side lives in
//! `renderer` and `reconcile::page`.

pub mod api;
pub mod description;
pub mod http_client;
pub mod search;
