//! CLI subcommands

pub mod auth;
pub mod clear;
pub mod config;
pub mod enrich;
pub mod status;
pub mod sync;
