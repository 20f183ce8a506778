//! # MiniVGG Common Library
//!
//! Shared code for the MiniVGG training service:
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Output directory resolution
//! - Common error type

pub mod config;
pub mod error;

pub use error::{Error, Result};
