//! # Youth Segmentation Common Library
//!
//! Shared code for the segmentation engine and its collaborators:
//! - Database bootstrap, schema and row models
//! - Run event types and the broadcast EventBus
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
