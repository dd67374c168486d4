//! All integration tests for sabr
#![expect(
    clippy::unwrap_used,
    reason = "integration test crate: unwraps are acceptable in test code"
)]

mod common;
mod sabr_it;
