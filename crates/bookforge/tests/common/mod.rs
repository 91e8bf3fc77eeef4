//! Shared test utilities for bookforge integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with an in-memory
//!   database and a temp storage directory
//! - Builder patterns and scripted generators for driving the pipeline
//!   without real providers

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{collect_events, TestHarness};
