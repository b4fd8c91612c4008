//! # Deferred Store Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── deferred_benchmarks.rs  # Queue + replay vs direct forwarding
//! │
//! └── src/integration/
//!     ├── flows.rs                # End-to-end scenarios on the recording store
//!     └── memory.rs               # Full lifecycle on the in-memory store
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p deferred-store-tests
//!
//! # With logs
//! RUST_LOG=deferred_store=debug cargo test -p deferred-store-tests -- --nocapture
//!
//! # Benchmarks
//! cargo bench -p deferred-store-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
