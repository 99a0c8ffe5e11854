//! Crawler module for Orb-Weaver
//!
//! Contains the crawl-orchestration core:
//! - HTTP fetching with wait profiles and retry/backoff
//! - HTML and text parsing helpers
//! - target classification and the four traversal strategies
//! - the three-tier concurrency controller with adaptive throttling
//! - the coordinator facade tying it all together

mod controller;
mod coordinator;
mod fetcher;
mod parser;
mod selector;
mod strategy;
mod wait;

pub use controller::{AdaptiveLimiter, Controller};
pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchResult, PageFetch, PageFetcher};
pub use parser::{extract_loc_values, extract_text_links, parse_page, ParsedPage};
pub use selector::{classify, classify_by_url, link_density, Classification};
pub use wait::{WaitProfile, WaitProfileTable};
