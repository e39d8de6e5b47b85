//! Shared test utilities for doclara integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring the real engine and SQLite stores in a temp directory
//! - `ScriptedModel` and `FixedExtractor` standing in for the external services

pub mod harness;

pub use harness::{FixedExtractor, ScriptedModel, TestHarness};
