//! # Integration Tests
//!
//! End-to-end scenarios driving the public `DeferredStore` API.

pub mod flows;
pub mod memory;
