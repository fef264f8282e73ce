//! Integration tests for sumi-crawl

mod crawl_tests;
mod scenario_tests;
