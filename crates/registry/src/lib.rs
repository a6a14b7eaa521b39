//! Object registry broker with lifecycle phases and converter resolution.
//!
//! # Layout
//!
//! - [`registry`]: named object stores with processors and lifecycle fan-out.
//! - [`broker`]: ordered facade over several registries.
//! - [`lifecycle`]: phase ordering, idempotency and late-joiner catch-up.
//! - [`transform`]: converters, resolution strategies and the resolution caches.
//! - [`config`]: declarative broker construction.
//!
//! Data type descriptors live in `conduit-primitives` and are re-exported here.

pub mod broker;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod object;
pub mod registry;
pub mod transform;

#[cfg(test)]
mod tests;

pub use broker::RegistryBroker;
pub use conduit_primitives::{BaseType, ConversionPair, DataType, MediaType};
pub use config::{BrokerConfig, ConfigError, RegistryConfig};
pub use error::{BoxError, EntryFailures, LifecycleError, LookupError, NoConverterFound, RegistrationError};
pub use lifecycle::{Lifecycle, LifecycleManager, LifecycleState, Phase, PhaseSet};
pub use object::{Object, ObjectBuilder, RegisterOptions};
pub use registry::{ObjectProcessor, ProcessorStage, Registration, Registry, RegistryBuilder};
pub use transform::{
	ConversionError, Converter, ConverterChain, FnConverter, GraphStrategy, RegistryAction,
	ResolutionEngine, ResolutionStrategy, TransformError, TransformationService,
	TypeBasedStrategy, Value,
};
