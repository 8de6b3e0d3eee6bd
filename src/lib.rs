//! Collects business listings from Google Maps for every combination of
//! search query and area, deduplicates them and exports CSV or JSON.

pub mod address;
pub mod batch;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod extract;
pub mod logging;
pub mod models;
pub mod scrapers;
