//! # Ports Layer
//!
//! - `outbound.rs` - Driven ports (the wrapped store and its iterators)
//!
//! The inbound surface is [`DeferredStore`](crate::DeferredStore) itself.

pub mod outbound;
