//! CLI command implementations.

pub mod check;
pub mod circuit;
pub mod common;
pub mod config;
pub mod histogram;
pub mod version;
pub mod worker;
