//! Test utilities for idxviz
//!
//! Available to unit tests and, through the `test-utils` feature, to the integration
//! tests under `tests/`.
//!
//! - [`FakeSourceControl`] stands in for git so cache behavior can be tested without a network
//! - [`IndexBuilder`] writes index files byte by byte
//! - [`TestGit`] drives the real `git` binary for end-to-end tests
//! - [`ManualClock`] (re-exported) makes TTL expiry deterministic

pub mod fake_source;
pub mod git_helper;
pub mod index_builder;

pub use crate::cache::clock::ManualClock;
pub use fake_source::FakeSourceControl;
pub use git_helper::TestGit;
pub use index_builder::IndexBuilder;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `None`, logging is enabled only when
/// `RUST_LOG` is set.
///
/// ```bash
/// RUST_LOG=idxviz=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
