use std::any::Any;
use std::sync::Arc;

use conduit_primitives::DataType;

use super::converter::{ConversionError, Value};
use super::engine::ResolutionEngine;
use crate::error::NoConverterFound;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
	#[error(transparent)]
	NoConverter(#[from] NoConverterFound),
	#[error(transparent)]
	Conversion(#[from] ConversionError),
}

/// Applies resolved converters to values.
#[derive(Debug, Clone)]
pub struct TransformationService {
	engine: Arc<ResolutionEngine>,
}

impl TransformationService {
	pub fn new(engine: Arc<ResolutionEngine>) -> Self {
		Self { engine }
	}

	pub fn engine(&self) -> &Arc<ResolutionEngine> {
		&self.engine
	}

	/// Converts `value` from `source` to `target`.
	///
	/// A value whose source type the target already accepts is returned as is.
	pub fn transform(&self, value: Value, source: &DataType, target: &DataType) -> Result<Value, TransformError> {
		if target.is_compatible_with(source) {
			return Ok(value);
		}
		let converter = self.engine.resolve(source, target)?;
		tracing::trace!(converter = converter.name(), %source, %target, "transforming value");
		Ok(converter.convert(value)?)
	}

	/// Like [`transform`](Self::transform), then unboxes the result as `T`.
	pub fn transform_to<T: Any + Send>(
		&self,
		value: Value,
		source: &DataType,
		target: &DataType,
	) -> Result<T, TransformError> {
		let out = self.transform(value, source, target)?;
		out.downcast::<T>()
			.map(|boxed| *boxed)
			.map_err(|_| ConversionError::type_mismatch(format!("{source} -> {target}"), std::any::type_name::<T>()).into())
	}
}
