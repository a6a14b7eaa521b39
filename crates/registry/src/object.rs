//! Type-erased registry values and their capabilities.
//!
//! An [`Object`] carries the stored value plus the capability views the registry
//! and broker act on: lifecycle participation, converter and resolution strategy.
//! Capabilities are captured once when the object is built, so lookups never
//! need to inspect the value's type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::lifecycle::Lifecycle;
use crate::transform::{Converter, ResolutionStrategy};

/// Shared handle to a registered value.
#[derive(Clone)]
pub struct Object {
	value: Arc<dyn Any + Send + Sync>,
	type_name: &'static str,
	lifecycle: Option<Arc<dyn Lifecycle>>,
	converter: Option<Arc<dyn Converter>>,
	strategy: Option<Arc<dyn ResolutionStrategy>>,
}

impl Object {
	/// Wraps a plain value with no capabilities.
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self::builder(Arc::new(value)).build()
	}

	/// Starts building an object around a shared value.
	pub fn builder<T: Any + Send + Sync>(value: Arc<T>) -> ObjectBuilder<T> {
		ObjectBuilder {
			value,
			lifecycle: None,
			converter: None,
			strategy: None,
		}
	}

	/// Wraps a converter. The stored value is the `Arc<dyn Converter>` itself.
	pub fn from_converter(converter: Arc<dyn Converter>) -> Self {
		Self {
			value: Arc::new(converter.clone()),
			type_name: std::any::type_name::<Arc<dyn Converter>>(),
			lifecycle: None,
			converter: Some(converter),
			strategy: None,
		}
	}

	/// Wraps a resolution strategy. The stored value is the `Arc<dyn ResolutionStrategy>`.
	pub fn from_strategy(strategy: Arc<dyn ResolutionStrategy>) -> Self {
		Self {
			value: Arc::new(strategy.clone()),
			type_name: std::any::type_name::<Arc<dyn ResolutionStrategy>>(),
			lifecycle: None,
			converter: None,
			strategy: Some(strategy),
		}
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn is<T: Any>(&self) -> bool {
		self.value.is::<T>()
	}

	/// Returns the value as `T` if that is its concrete type.
	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.value.clone().downcast::<T>().ok()
	}

	pub fn lifecycle(&self) -> Option<&Arc<dyn Lifecycle>> {
		self.lifecycle.as_ref()
	}

	pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
		self.converter.as_ref()
	}

	pub fn strategy(&self) -> Option<&Arc<dyn ResolutionStrategy>> {
		self.strategy.as_ref()
	}

	/// Identity comparison on the stored value.
	pub fn ptr_eq(&self, other: &Object) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Object")
			.field("type", &self.type_name)
			.field("lifecycle", &self.lifecycle.is_some())
			.field("converter", &self.converter.as_ref().map(|c| c.name().to_string()))
			.field("strategy", &self.strategy.as_ref().map(|s| s.name().to_string()))
			.finish()
	}
}

/// Builder that records which capabilities an object exposes.
pub struct ObjectBuilder<T> {
	value: Arc<T>,
	lifecycle: Option<Arc<dyn Lifecycle>>,
	converter: Option<Arc<dyn Converter>>,
	strategy: Option<Arc<dyn ResolutionStrategy>>,
}

impl<T: Any + Send + Sync> ObjectBuilder<T> {
	pub fn lifecycle(mut self) -> Self
	where
		T: Lifecycle,
	{
		self.lifecycle = Some(self.value.clone());
		self
	}

	pub fn converter(mut self) -> Self
	where
		T: Converter,
	{
		self.converter = Some(self.value.clone());
		self
	}

	pub fn strategy(mut self) -> Self
	where
		T: ResolutionStrategy,
	{
		self.strategy = Some(self.value.clone());
		self
	}

	pub fn build(self) -> Object {
		Object {
			value: self.value,
			type_name: std::any::type_name::<T>(),
			lifecycle: self.lifecycle,
			converter: self.converter,
			strategy: self.strategy,
		}
	}
}

/// Per-registration switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
	/// Skip injection-stage processors.
	pub skip_injection: bool,
	/// Skip pre-initialisation processors, including their veto.
	pub skip_pre_init: bool,
	/// Store the object without catch-up and exclude it from phase fan-out.
	pub bypass_lifecycle: bool,
}

impl RegisterOptions {
	pub const fn without_injection(mut self) -> Self {
		self.skip_injection = true;
		self
	}

	pub const fn without_pre_init(mut self) -> Self {
		self.skip_pre_init = true;
		self
	}

	pub const fn without_lifecycle(mut self) -> Self {
		self.bypass_lifecycle = true;
		self
	}
}
