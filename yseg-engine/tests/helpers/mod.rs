//! Test Helper Utilities
//!
//! Shared utilities for testing yseg-engine

#![allow(dead_code)]

pub mod audit;
pub mod db_utils;

pub use audit::{FailingAuditSink, RecordingAuditSink, StalledAuditSink};
pub use db_utils::{
    create_test_db, grouping, seed_identical, seed_three_blobs, seed_two_groups, test_orchestrator,
    young_disengaged,
};
