//! Common test utilities for bulk engine integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod memory_provider;

pub use fixtures::*;
pub use memory_provider::*;

/// Base URL every test mounts the SCIM service at.
pub const BASE_URI: &str = "https://idp.example.com/scim/v2";

/// Initialize logging for tests. Safe to call more than once.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
