use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use conduit_primitives::{ConversionPair, DataType};
use parking_lot::{Mutex, RwLock};

use super::cache::ResolutionCache;
use super::converter::{Converter, same_converter};
use super::strategy::{RegistryAction, ResolutionStrategy, TypeBasedStrategy, same_strategy};
use crate::error::NoConverterFound;

/// Memoizing converter resolver.
///
/// # Concurrency
///
/// Mutations (converter or strategy add/remove, weight changes) are serialized
/// by an internal mutex. Each one bumps the generation counter while it still
/// holds the converter list's write lock, then clears both caches. Readers tag
/// what they compute with the generation they observed on entry, so a result
/// computed across a mutation is stored but never served.
///
/// Lock order: mutation, then strategies, then converters.
pub struct ResolutionEngine {
	mutation: Mutex<()>,
	strategies: RwLock<Vec<Arc<dyn ResolutionStrategy>>>,
	converters: RwLock<Vec<Arc<dyn Converter>>>,
	generation: AtomicU64,
	cache: ResolutionCache,
}

impl Default for ResolutionEngine {
	fn default() -> Self {
		Self::new()
	}
}

impl ResolutionEngine {
	/// Engine with the built-in [`TypeBasedStrategy`] installed.
	pub fn new() -> Self {
		let engine = Self::empty();
		engine.register_strategy(Arc::new(TypeBasedStrategy::new()));
		engine
	}

	/// Engine with no strategies.
	pub fn empty() -> Self {
		Self {
			mutation: Mutex::new(()),
			strategies: RwLock::new(Vec::new()),
			converters: RwLock::new(Vec::new()),
			generation: AtomicU64::new(0),
			cache: ResolutionCache::default(),
		}
	}

	/// Current mutation generation.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Number of cached answers, exact and list, including stale ones.
	pub fn cached_entries(&self) -> usize {
		self.cache.len()
	}

	pub fn converters(&self) -> Vec<Arc<dyn Converter>> {
		self.converters.read().clone()
	}

	pub fn strategies(&self) -> Vec<Arc<dyn ResolutionStrategy>> {
		self.strategies.read().clone()
	}

	pub fn find_converter(&self, name: &str) -> Option<Arc<dyn Converter>> {
		self.converters.read().iter().find(|c| c.name() == name).cloned()
	}

	/// Adds a converter and notifies every strategy.
	///
	/// Returns false if this exact converter handle is already registered.
	pub fn register_converter(&self, converter: Arc<dyn Converter>) -> bool {
		let _guard = self.mutation.lock();
		if self.converters.read().iter().any(|c| same_converter(c, &converter)) {
			return false;
		}

		let strategies = self.strategies.read();
		for strategy in strategies.iter() {
			strategy.converter_changed(&converter, RegistryAction::Added);
		}
		let mut converters = self.converters.write();
		converters.push(converter.clone());
		self.advance_generation();
		drop(converters);
		drop(strategies);
		self.cache.clear();

		tracing::debug!(
			converter = converter.name(),
			returns = %converter.return_type(),
			weight = converter.priority_weight(),
			"converter registered"
		);
		true
	}

	/// Removes a converter and notifies every strategy.
	pub fn unregister_converter(&self, converter: &Arc<dyn Converter>) -> bool {
		let _guard = self.mutation.lock();
		if !self.converters.read().iter().any(|c| same_converter(c, converter)) {
			return false;
		}

		let strategies = self.strategies.read();
		for strategy in strategies.iter() {
			strategy.converter_changed(converter, RegistryAction::Removed);
		}
		let mut converters = self.converters.write();
		converters.retain(|c| !same_converter(c, converter));
		self.advance_generation();
		drop(converters);
		drop(strategies);
		self.cache.clear();

		tracing::debug!(converter = converter.name(), "converter unregistered");
		true
	}

	/// Changes a registered converter's weight and invalidates cached answers.
	///
	/// Returns false if the converter is not registered or its weight is fixed.
	pub fn set_priority_weight(&self, converter: &Arc<dyn Converter>, weight: i32) -> bool {
		let _guard = self.mutation.lock();
		let mut converters = self.converters.write();
		if !converters.iter().any(|c| same_converter(c, converter)) || !converter.set_priority_weight(weight) {
			return false;
		}
		self.advance_generation();
		drop(converters);
		self.cache.clear();

		tracing::debug!(converter = converter.name(), weight, "converter weight changed");
		true
	}

	/// Installs a strategy and replays every registered converter to it.
	///
	/// Fallback strategies stay behind all others; otherwise strategies are
	/// consulted in registration order.
	pub fn register_strategy(&self, strategy: Arc<dyn ResolutionStrategy>) -> bool {
		let _guard = self.mutation.lock();
		let mut strategies = self.strategies.write();
		if strategies.iter().any(|s| same_strategy(s, &strategy)) {
			return false;
		}

		let converters = self.converters.read();
		for converter in converters.iter() {
			strategy.converter_changed(converter, RegistryAction::Added);
		}
		drop(converters);

		let name = strategy.name().to_string();
		strategies.push(strategy);
		strategies.sort_by_key(|s| s.is_fallback());
		let converters = self.converters.write();
		self.advance_generation();
		drop(converters);
		drop(strategies);
		self.cache.clear();

		tracing::debug!(strategy = %name, "resolution strategy registered");
		true
	}

	pub fn unregister_strategy(&self, strategy: &Arc<dyn ResolutionStrategy>) -> bool {
		let _guard = self.mutation.lock();
		let mut strategies = self.strategies.write();
		let before = strategies.len();
		strategies.retain(|s| !same_strategy(s, strategy));
		if strategies.len() == before {
			return false;
		}
		let converters = self.converters.write();
		self.advance_generation();
		drop(converters);
		drop(strategies);
		self.cache.clear();

		tracing::debug!(strategy = strategy.name(), "resolution strategy unregistered");
		true
	}

	/// Returns the converter for `source -> target`.
	///
	/// Strategies are consulted in order and the first non-empty answer wins.
	/// Failed lookups are not cached, so a later registration can satisfy them.
	pub fn resolve(&self, source: &DataType, target: &DataType) -> Result<Arc<dyn Converter>, NoConverterFound> {
		let pair = ConversionPair::new(source, target);
		let generation = self.generation();
		if let Some(hit) = self.cache.exact(&pair, generation) {
			return Ok(hit);
		}

		let found = {
			let strategies = self.strategies.read();
			strategies.iter().find_map(|s| s.resolve(source, target))
		};

		match found {
			Some(converter) => {
				tracing::trace!(%pair, converter = converter.name(), generation, "converter resolved");
				Ok(self.cache.store_exact(pair, generation, converter))
			}
			None => {
				tracing::debug!(%pair, "no converter found");
				Err(NoConverterFound { pair })
			}
		}
	}

	/// Returns every registered converter that supports `source` and whose
	/// return type `target` accepts, in registration order.
	pub fn resolve_all(&self, source: &DataType, target: &DataType) -> Arc<[Arc<dyn Converter>]> {
		let pair = ConversionPair::new(source, target);
		let generation = self.generation();
		if let Some(hit) = self.cache.list(&pair, generation) {
			return hit;
		}

		let matches: Arc<[Arc<dyn Converter>]> = self
			.converters
			.read()
			.iter()
			.filter(|c| c.supports(source) && target.is_compatible_with(c.return_type()))
			.cloned()
			.collect();
		self.cache.store_list(pair, generation, matches)
	}

	/// Discards every cached answer without changing registrations.
	pub fn clear_caches(&self) {
		let _guard = self.mutation.lock();
		let converters = self.converters.write();
		self.advance_generation();
		drop(converters);
		self.cache.clear();
	}

	/// Caller must hold the converter list's write lock.
	fn advance_generation(&self) {
		self.generation.fetch_add(1, Ordering::AcqRel);
	}
}

impl fmt::Debug for ResolutionEngine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolutionEngine")
			.field("generation", &self.generation())
			.field("converters", &self.converters.read().len())
			.field(
				"strategies",
				&self.strategies.read().iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
			)
			.finish()
	}
}
