//! Configuration module for Sumi-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Fetch workers: {}", config.crawler.fetch_workers);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{pipeline_sizing_warning, validate, validate_crawler_config, validate_seed};
