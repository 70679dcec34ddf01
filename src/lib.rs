//! OGP Feed - an RSS fetcher with Open Graph previews
//!
//! This crate fetches one feed, reads its items with per-site CSS selectors
//! stored in SQLite, looks up the `og:image` of every item link and prints
//! the result as JSON.

pub mod config;
pub mod db;
pub mod dom;
pub mod error;
pub mod fetcher;
pub mod ogp;
