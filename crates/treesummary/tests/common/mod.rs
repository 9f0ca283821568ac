//! Shared test utilities for treesummary integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs over a temporary project tree
//! - `ScriptedClient`, an in-memory model client with failure injection
//! - `ConfigBuilder` for creating test configurations programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedClient, TestHarness, FAIL_MARKER};
