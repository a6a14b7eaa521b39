use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use conduit_primitives::DataType;

use crate::error::BoxError;

/// Value flowing through a converter.
pub type Value = Box<dyn Any + Send>;

/// Failure raised while running a converter.
#[derive(Debug, thiserror::Error)]
#[error("converter '{converter}' failed")]
pub struct ConversionError {
	converter: String,
	#[source]
	source: BoxError,
}

impl ConversionError {
	pub fn new(converter: impl Into<String>, source: impl Into<BoxError>) -> Self {
		Self {
			converter: converter.into(),
			source: source.into(),
		}
	}

	/// A value was not of the Rust type the caller expected.
	pub fn type_mismatch(converter: impl Into<String>, expected: &'static str) -> Self {
		Self::new(converter, format!("value is not of type {expected}"))
	}

	pub fn converter(&self) -> &str {
		&self.converter
	}
}

/// A named, weighted unit that turns values of some source types into a return type.
pub trait Converter: Send + Sync {
	fn name(&self) -> &str;

	/// Data types this converter accepts, in declaration order.
	fn source_types(&self) -> &[DataType];

	fn return_type(&self) -> &DataType;

	/// Higher wins among otherwise equally specific candidates.
	fn priority_weight(&self) -> i32;

	/// Returns true if any declared source type accepts `source`.
	fn supports(&self, source: &DataType) -> bool {
		self.source_types().iter().any(|t| t.is_compatible_with(source))
	}

	fn convert(&self, value: Value) -> Result<Value, ConversionError>;

	/// Changes the priority weight in place. Returns false if the weight is fixed.
	fn set_priority_weight(&self, _weight: i32) -> bool {
		false
	}
}

impl fmt::Debug for dyn Converter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Converter")
			.field("name", &self.name())
			.field("sources", &self.source_types())
			.field("returns", self.return_type())
			.field("weight", &self.priority_weight())
			.finish()
	}
}

/// Identity comparison between converter handles.
pub fn same_converter(a: &Arc<dyn Converter>, b: &Arc<dyn Converter>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

type ConvertFn = dyn Fn(Value) -> Result<Value, BoxError> + Send + Sync;

/// Converter backed by a closure.
pub struct FnConverter {
	name: String,
	sources: Vec<DataType>,
	returns: DataType,
	weight: AtomicI32,
	func: Box<ConvertFn>,
}

impl FnConverter {
	pub fn new<F>(
		name: impl Into<String>,
		sources: impl IntoIterator<Item = DataType>,
		returns: DataType,
		func: F,
	) -> Self
	where
		F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			sources: sources.into_iter().collect(),
			returns,
			weight: AtomicI32::new(0),
			func: Box::new(func),
		}
	}

	/// Builds a converter over concrete Rust input and output types.
	///
	/// Inputs of any other Rust type fail the conversion.
	pub fn typed<I, O, F>(
		name: impl Into<String>,
		sources: impl IntoIterator<Item = DataType>,
		returns: DataType,
		func: F,
	) -> Self
	where
		I: Any + Send,
		O: Any + Send,
		F: Fn(I) -> Result<O, BoxError> + Send + Sync + 'static,
	{
		Self::new(name, sources, returns, move |value: Value| {
			let input = value.downcast::<I>().map_err(|_| -> BoxError {
				format!("value is not of type {}", std::any::type_name::<I>()).into()
			})?;
			Ok(Box::new(func(*input)?) as Value)
		})
	}

	pub fn with_weight(self, weight: i32) -> Self {
		self.weight.store(weight, Ordering::Relaxed);
		self
	}
}

impl Converter for FnConverter {
	fn name(&self) -> &str {
		&self.name
	}

	fn source_types(&self) -> &[DataType] {
		&self.sources
	}

	fn return_type(&self) -> &DataType {
		&self.returns
	}

	fn priority_weight(&self) -> i32 {
		self.weight.load(Ordering::Acquire)
	}

	fn convert(&self, value: Value) -> Result<Value, ConversionError> {
		(self.func)(value).map_err(|source| ConversionError::new(&self.name, source))
	}

	fn set_priority_weight(&self, weight: i32) -> bool {
		self.weight.store(weight, Ordering::Release);
		true
	}
}

/// Ordered composite of converters where each link feeds the next.
pub struct ConverterChain {
	name: String,
	links: Vec<Arc<dyn Converter>>,
}

impl ConverterChain {
	/// Returns `None` for an empty chain.
	pub fn new(links: Vec<Arc<dyn Converter>>) -> Option<Self> {
		if links.is_empty() {
			return None;
		}
		let name = links.iter().map(|c| c.name()).collect::<Vec<_>>().join(" -> ");
		Some(Self { name, links })
	}

	pub fn links(&self) -> &[Arc<dyn Converter>] {
		&self.links
	}

	fn first(&self) -> &Arc<dyn Converter> {
		&self.links[0]
	}

	fn last(&self) -> &Arc<dyn Converter> {
		&self.links[self.links.len() - 1]
	}
}

impl Converter for ConverterChain {
	fn name(&self) -> &str {
		&self.name
	}

	fn source_types(&self) -> &[DataType] {
		self.first().source_types()
	}

	fn return_type(&self) -> &DataType {
		self.last().return_type()
	}

	/// The weakest link bounds the chain.
	fn priority_weight(&self) -> i32 {
		self.links.iter().map(|c| c.priority_weight()).min().unwrap_or_default()
	}

	fn supports(&self, source: &DataType) -> bool {
		self.first().supports(source)
	}

	fn convert(&self, value: Value) -> Result<Value, ConversionError> {
		self.links.iter().try_fold(value, |value, link| link.convert(value))
	}
}
