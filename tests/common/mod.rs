//! Shared helpers for integration tests.

pub mod logs;
pub mod mocks;
