//! Data type descriptors: the vocabulary for "convert from X to Y".

/// Nominal base types and their supertype chains.
pub mod base_type;
/// Data type descriptors and the compatibility predicate.
pub mod data_type;
/// Media type tags (`application/json`, `text/*`).
pub mod media_type;

pub use base_type::{BaseType, OBJECT};
pub use data_type::{ConversionPair, DataType};
pub use media_type::{MediaType, MediaTypeError};
