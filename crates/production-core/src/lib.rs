//! Domain model and pure calculations for the production dashboard.
//!
//! Everything here is free of I/O except [`profile::IngestionProfile::load_from`]:
//! the record schema, filter criteria, value parsers, statistics helpers and
//! the digital-twin projection formula.

pub mod calculations;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod profile;
pub mod settings;
pub mod stats;
pub mod time_utils;
