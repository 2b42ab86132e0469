//! Download sequencing runs by accession and sketch them into
//! sourmash-compatible signatures.

pub mod app;
pub mod config;
pub mod domain;
pub mod download;
pub mod engine;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod params;
pub mod signature;
pub mod sketch;
