//! Converter resolution.
//!
//! # Role
//!
//! [`ResolutionEngine`] answers "which converter turns `source` into `target`?"
//! by consulting an ordered list of [`ResolutionStrategy`] implementations and
//! memoizing the answer per [`ConversionPair`](conduit_primitives::ConversionPair).
//!
//! # Invariants
//!
//! - Fallback strategies are always consulted after every non-fallback strategy.
//! - A cached answer is served only if no converter or strategy mutation has
//!   completed since it was computed.
//! - A failed resolution is never cached.

mod cache;
mod converter;
mod engine;
mod graph;
mod service;
mod strategy;

#[cfg(test)]
mod tests;

pub use converter::{ConversionError, Converter, ConverterChain, FnConverter, Value, same_converter};
pub use engine::ResolutionEngine;
pub use graph::GraphStrategy;
pub use service::{TransformError, TransformationService};
pub use strategy::{RegistryAction, ResolutionStrategy, TypeBasedStrategy, same_strategy};
