//! External tools used by the research loop
//!
//! - [`web`](crate::tools::web) - Web search and page crawling via daedra

/// daedra-backed search and crawler.
pub mod web;

pub use web::{DaedraCrawler, DaedraSearch};
