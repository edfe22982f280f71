//! Data layer for the production dashboard.
//!
//! Fetches and reads work-order exports, normalizes them into typed records,
//! loads the optional capacity log and sector KPI tables, and computes the
//! filtered aggregations and derived analyses consumed by the presentation
//! layer.

pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod capacity;
pub mod export;
pub mod filter;
pub mod kpi;
pub mod normalize;
pub mod reader;
pub mod twin;
