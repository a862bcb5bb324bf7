//! Testing utilities for stepflow pipelines.
//!
//! This module provides:
//! - Mock and recording step handlers
//! - Store fixtures
//! - Assertions over run results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_absent, assert_error_count, assert_message_contains, assert_not_terminated,
    assert_plan, assert_terminated, assert_value_eq,
};
pub use fixtures::{CallCounter, TestStore};
pub use mocks::{
    recording_step, responding_step, FailingHandler, MockHandler, PanickingHandler, RecordingLog,
};
