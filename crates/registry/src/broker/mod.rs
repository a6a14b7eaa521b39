//! Ordered facade over several registries.
//!
//! # Role
//!
//! The broker is the single entry point callers use to store, find and manage
//! objects. Registries are consulted in configured order: the first hit wins
//! for key lookups, writes go to the first writable registry, and lifecycle
//! phases fan out to every registry after the broker records its own phase.
//!
//! Objects with converter or strategy capability are mirrored into the
//! broker's [`ResolutionEngine`] when registered and withdrawn when removed or
//! displaced.
//!
//! # Invariants
//!
//! - The registry sequence is published as an immutable snapshot; lookups never
//!   block on registry additions.
//! - Every registry is attempted for every phase, even after failures.
//! - Engine updates for registrations are serialised and follow what the
//!   registry holds under the key once the write has landed, so racing
//!   writers cannot leave an orphaned converter in the engine.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use conduit_primitives::DataType;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::config::{BrokerConfig, ConfigError, RegistryConfig};
use crate::error::{LifecycleError, LookupError, NoConverterFound, RegistrationError};
use crate::lifecycle::{LifecycleManager, Phase};
use crate::object::{Object, RegisterOptions};
use crate::registry::{self, Registration, Registry, RegistryBuilder};
use crate::transform::{
	Converter, ResolutionEngine, ResolutionStrategy, TransformationService, same_converter, same_strategy,
};


const OWNER: &str = "broker";

pub struct RegistryBroker {
	registries: ArcSwap<Vec<Arc<Registry>>>,
	lifecycle: LifecycleManager,
	engine: Arc<ResolutionEngine>,
	mirror: Mutex<()>,
}

impl RegistryBroker {
	/// Creates a broker over `registries` with a default resolution engine.
	pub fn new(registries: Vec<Arc<Registry>>) -> Self {
		Self::with_engine(registries, Arc::new(ResolutionEngine::new()))
	}

	pub fn with_engine(registries: Vec<Arc<Registry>>, engine: Arc<ResolutionEngine>) -> Self {
		let broker = Self {
			registries: ArcSwap::from_pointee(Vec::new()),
			lifecycle: LifecycleManager::new(OWNER),
			engine,
			mirror: Mutex::new(()),
		};
		for registry in registries {
			broker.adopt(registry);
		}
		broker
	}

	/// Builds one empty registry per configured entry, in order.
	pub fn from_config(config: &BrokerConfig) -> Result<Self, ConfigError> {
		Self::from_config_with(config, |_, builder| builder)
	}

	/// Like [`from_config`](Self::from_config), letting `seed` preload each
	/// registry's builder. This is how read-only registries get their content.
	pub fn from_config_with<F>(config: &BrokerConfig, mut seed: F) -> Result<Self, ConfigError>
	where
		F: FnMut(&RegistryConfig, RegistryBuilder) -> RegistryBuilder,
	{
		config.validate()?;
		let registries = config
			.registries
			.iter()
			.map(|rc| {
				let builder = Registry::builder(rc.id.clone()).read_only(rc.read_only);
				seed(rc, builder).build().map(Arc::new)
			})
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self::new(registries))
	}

	pub fn engine(&self) -> &Arc<ResolutionEngine> {
		&self.engine
	}

	pub fn transformation_service(&self) -> TransformationService {
		TransformationService::new(self.engine.clone())
	}

	pub fn lifecycle(&self) -> &LifecycleManager {
		&self.lifecycle
	}

	/// Registries in precedence order.
	pub fn registries(&self) -> Arc<Vec<Arc<Registry>>> {
		self.registries.load_full()
	}

	pub fn registry(&self, id: &str) -> Option<Arc<Registry>> {
		self.registries.load().iter().find(|r| r.id() == id).cloned()
	}

	/// Appends a registry with the lowest precedence and brings it up to the
	/// broker's completed phases.
	pub fn add_registry(&self, registry: Arc<Registry>) -> Result<(), LifecycleError> {
		self.adopt(registry.clone());
		for phase in self.lifecycle.state().catch_up_path() {
			registry.fire_phase(*phase)?;
		}
		Ok(())
	}

	/// Detaches a registry without applying any phase to it.
	pub fn remove_registry(&self, id: &str) -> Option<Arc<Registry>> {
		let mut removed = None;
		self.registries.rcu(|current| {
			let mut next = Vec::clone(current);
			removed = next.iter().position(|r| r.id() == id).map(|idx| next.remove(idx));
			next
		});
		if let Some(registry) = &removed {
			let _guard = self.mirror.lock();
			for converter in registry.lookup_converters().values() {
				self.engine.unregister_converter(converter);
			}
			for strategy in registry.lookup_strategies().values() {
				self.engine.unregister_strategy(strategy);
			}
			tracing::debug!(registry = id, "registry detached");
		}
		removed
	}

	fn adopt(&self, registry: Arc<Registry>) {
		let _guard = self.mirror.lock();
		for converter in registry.lookup_converters().into_values() {
			self.engine.register_converter(converter);
		}
		for strategy in registry.lookup_strategies().into_values() {
			self.engine.register_strategy(strategy);
		}
		tracing::debug!(registry = registry.id(), read_only = registry.is_read_only(), "registry attached");
		self.registries.rcu(|current| {
			let mut next = Vec::clone(current);
			next.push(registry.clone());
			next
		});
	}

	/// First object under `key` in precedence order.
	pub fn lookup(&self, key: &str) -> Option<Object> {
		self.registries.load().iter().find_map(|r| r.lookup(key))
	}

	/// Union of every registry's objects of type `T`. Later registries
	/// overwrite duplicate keys from earlier ones.
	pub fn lookup_by_type<T: Any + Send + Sync>(&self) -> IndexMap<String, Arc<T>> {
		let mut merged = IndexMap::new();
		for registry in self.registries.load().iter() {
			merged.extend(registry.lookup_by_type::<T>());
		}
		merged
	}

	pub fn lookup_single<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, LookupError> {
		registry::single(self.lookup_by_type::<T>())
	}

	/// Converter stored under `key`, in precedence order.
	pub fn lookup_converter(&self, key: &str) -> Option<Arc<dyn Converter>> {
		self.lookup(key)?.converter().cloned()
	}

	pub fn register(&self, key: &str, object: Object) -> Result<Registration, RegistrationError> {
		self.register_with(key, object, RegisterOptions::default())
	}

	/// Stores `object` in the first writable registry.
	pub fn register_with(
		&self,
		key: &str,
		object: Object,
		options: RegisterOptions,
	) -> Result<Registration, RegistrationError> {
		let target = self.first_writable().ok_or_else(|| RegistrationError::NoWritableRegistry {
			key: key.to_string(),
		})?;
		let registration = target.register(key, object, options)?;
		if let Registration::Stored { object, replaced } = &registration {
			self.sync_engine(&target, key, Some(object), replaced.as_ref());
		}
		Ok(registration)
	}

	/// Registers each pair in order, stopping at the first error.
	pub fn register_objects<K, I>(&self, objects: I) -> Result<Vec<Registration>, RegistrationError>
	where
		K: AsRef<str>,
		I: IntoIterator<Item = (K, Object)>,
	{
		objects
			.into_iter()
			.map(|(key, object)| self.register(key.as_ref(), object))
			.collect()
	}

	/// Removes `key` from the first writable registry that holds it.
	pub fn unregister(&self, key: &str) -> Option<Object> {
		let registries = self.registries.load_full();
		for registry in registries.iter().filter(|r| !r.is_read_only() && r.contains(key)) {
			if let Ok(Some(removed)) = registry.unregister(key) {
				self.sync_engine(registry, key, None, Some(&removed));
				return Some(removed);
			}
		}
		None
	}

	/// Registers a converter under its name, or under `<type>:<uuid>` if the
	/// name is blank. Returns the key used.
	pub fn register_converter(&self, converter: Arc<dyn Converter>) -> Result<String, RegistrationError> {
		let key = match converter.name().trim() {
			"" => generated_key(converter.return_type()),
			name => name.to_string(),
		};
		self.register(&key, Object::from_converter(converter))?;
		Ok(key)
	}

	/// Removes the converter stored under `key` and withdraws it from the engine.
	pub fn unregister_converter(&self, key: &str) -> Option<Arc<dyn Converter>> {
		self.lookup_converter(key)?;
		self.unregister(key)?.converter().cloned()
	}

	pub fn register_strategy(&self, key: &str, strategy: Arc<dyn ResolutionStrategy>) -> Result<Registration, RegistrationError> {
		self.register(key, Object::from_strategy(strategy))
	}

	pub fn resolve(&self, source: &DataType, target: &DataType) -> Result<Arc<dyn Converter>, NoConverterFound> {
		self.engine.resolve(source, target)
	}

	pub fn resolve_all(&self, source: &DataType, target: &DataType) -> Arc<[Arc<dyn Converter>]> {
		self.engine.resolve_all(source, target)
	}

	/// Records `phase` for the broker, then fires it on every registry in order.
	///
	/// Registry failures do not stop the fan-out; they are returned together
	/// as [`LifecycleError::Partial`].
	pub fn fire_phase(&self, phase: Phase) -> Result<(), LifecycleError> {
		self.lifecycle.fire_phase(phase, || Ok(()))?;

		let registries = self.registries.load_full();
		let mut failures = Vec::new();
		for registry in registries.iter() {
			if let Err(err) = registry.fire_phase(phase) {
				tracing::warn!(registry = registry.id(), %phase, error = %err, "registry phase failed");
				failures.push(err);
			}
		}

		if phase == Phase::Dispose {
			self.engine.clear_caches();
		}

		if failures.is_empty() {
			tracing::debug!(%phase, registries = registries.len(), "broker phase complete");
			return Ok(());
		}
		Err(LifecycleError::Partial {
			owner: OWNER.to_string(),
			phase,
			failures,
		})
	}

	/// Fires a phase given by name, such as `"initialise"` or `"Start"`.
	pub fn fire_phase_named(&self, name: &str) -> Result<(), LifecycleError> {
		self.fire_phase(name.parse()?)
	}

	pub fn initialise(&self) -> Result<(), LifecycleError> {
		self.fire_phase(Phase::Initialise)
	}

	pub fn start(&self) -> Result<(), LifecycleError> {
		self.fire_phase(Phase::Start)
	}

	pub fn stop(&self) -> Result<(), LifecycleError> {
		self.fire_phase(Phase::Stop)
	}

	pub fn dispose(&self) -> Result<(), LifecycleError> {
		self.fire_phase(Phase::Dispose)
	}

	fn first_writable(&self) -> Option<Arc<Registry>> {
		self.registries.load().iter().find(|r| !r.is_read_only()).cloned()
	}

	/// Mirrors a write under `key` into the engine.
	///
	/// `removed` is withdrawn unless the registry still holds its converter or
	/// strategy under `key`; `added` is published only if it is still the
	/// value under `key`. Re-publishing a handle the engine already holds is a
	/// no-op, so a converter re-registered under its key keeps its seniority.
	fn sync_engine(&self, registry: &Registry, key: &str, added: Option<&Object>, removed: Option<&Object>) {
		let _guard = self.mirror.lock();
		let current = registry.lookup(key);
		let current_converter = current.as_ref().and_then(|o| o.converter());
		let current_strategy = current.as_ref().and_then(|o| o.strategy());

		if let Some(old) = removed {
			if let Some(converter) = old.converter()
				&& !current_converter.is_some_and(|c| same_converter(c, converter))
			{
				self.engine.unregister_converter(converter);
			}
			if let Some(strategy) = old.strategy()
				&& !current_strategy.is_some_and(|s| same_strategy(s, strategy))
			{
				self.engine.unregister_strategy(strategy);
			}
		}

		let Some(new) = added else {
			return;
		};
		if !current.as_ref().is_some_and(|c| c.ptr_eq(new)) {
			tracing::debug!(registry = registry.id(), key, "registration superseded before engine sync");
			return;
		}
		if let Some(converter) = new.converter() {
			self.engine.register_converter(converter.clone());
		}
		if let Some(strategy) = new.strategy() {
			self.engine.register_strategy(strategy.clone());
		}
	}
}

impl fmt::Debug for RegistryBroker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegistryBroker")
			.field("registries", &self.registries.load().iter().map(|r| r.id().to_string()).collect::<Vec<_>>())
			.field("phase", &self.lifecycle.current_phase())
			.field("engine", &self.engine)
			.finish()
	}
}

fn generated_key(return_type: &DataType) -> String {
	format!("{}:{}", return_type.base_type().name(), uuid::Uuid::new_v4())
}
