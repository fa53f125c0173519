//! snow-utils - Snowflake provisioning tools
//!
//! This crate provides the `snow-network`, `snow-extvolume`, `snow-pat` and
//! `snow-check-setup` binaries. Snowflake is driven through the `snow` CLI;
//! AWS through the SDK.

pub mod aws;
pub mod cli;
pub mod config;
pub mod env_file;
pub mod error;
pub mod network;
pub mod output;
pub mod pat;
pub mod probe;
pub mod setup_check;
pub mod snow;
pub mod volume;
pub mod wait;

#[cfg(test)]
mod testing;
