//! Named object store with processors and lifecycle fan-out.
//!
//! # Role
//!
//! A [`Registry`] owns an insertion-ordered map of keyed [`Object`]s. Writers
//! publish a fresh snapshot through `ArcSwap::rcu`; readers load the current
//! snapshot and never block.
//!
//! # Invariants
//!
//! - No registry-wide lock is held while processors or lifecycle callbacks
//!   run. An entry's phase marker is locked only around its own callbacks.
//! - An object registered while a phase executes also receives that phase,
//!   exactly once.
//! - A registration whose lifecycle catch-up fails leaves the previous value
//!   (or no value) under its key, and the rejected object is wound down.
//! - Read-only registries only hold what their builder preloaded.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxBuildHasher;

use crate::error::{BoxError, EntryFailures, LifecycleError, LookupError, RegistrationError};
use crate::lifecycle::{self, LifecycleManager, Phase};
use crate::object::{Object, RegisterOptions};
use crate::transform::{Converter, ResolutionStrategy};

mod processor;


pub use processor::{ObjectProcessor, ProcessorStage};

/// A stored object with its registration options.
#[derive(Debug, Clone)]
pub struct Entry {
	key: Arc<str>,
	object: Object,
	options: RegisterOptions,
	reached: Arc<Mutex<Phase>>,
}

impl Entry {
	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn object(&self) -> &Object {
		&self.object
	}

	pub fn options(&self) -> RegisterOptions {
		self.options
	}

	/// Last phase the object completed.
	pub fn reached(&self) -> Phase {
		*self.reached.lock()
	}

	fn takes_part_in_lifecycle(&self) -> bool {
		!self.options.bypass_lifecycle && self.object.lifecycle().is_some()
	}

	/// Runs `phase` on the object unless it does not follow the last phase
	/// the object completed. Returns `None` when skipped.
	fn advance(&self, phase: Phase) -> Option<Result<(), BoxError>> {
		let target = self.object.lifecycle()?;
		let mut reached = self.reached.lock();
		let applies = match phase {
			Phase::NotInLifecycle => false,
			Phase::Initialise => *reached == Phase::NotInLifecycle,
			Phase::Start => matches!(*reached, Phase::Initialise | Phase::Stop),
			Phase::Stop => *reached == Phase::Start,
			Phase::Dispose => *reached != Phase::Dispose,
		};
		if !applies {
			return None;
		}
		let result = lifecycle::invoke(target.as_ref(), phase);
		if result.is_ok() {
			*reached = phase;
		}
		Some(result)
	}
}

#[derive(Clone, Default)]
struct Snapshot {
	entries: IndexMap<Arc<str>, Entry, FxBuildHasher>,
}

/// Outcome of a single registration.
#[derive(Debug, Clone)]
pub enum Registration {
	Stored {
		object: Object,
		replaced: Option<Object>,
	},
	/// A processor returned `None`; nothing was stored.
	Vetoed,
}

impl Registration {
	pub fn is_stored(&self) -> bool {
		matches!(self, Self::Stored { .. })
	}

	pub fn object(&self) -> Option<&Object> {
		match self {
			Self::Stored { object, .. } => Some(object),
			Self::Vetoed => None,
		}
	}

	pub fn replaced(&self) -> Option<&Object> {
		match self {
			Self::Stored { replaced, .. } => replaced.as_ref(),
			Self::Vetoed => None,
		}
	}
}

type Processors = Vec<(ProcessorStage, Arc<dyn ObjectProcessor>)>;

pub struct Registry {
	id: String,
	read_only: bool,
	snap: ArcSwap<Snapshot>,
	processors: RwLock<Processors>,
	pending_disposal: Mutex<Vec<Entry>>,
	lifecycle: LifecycleManager,
}

impl Registry {
	/// Creates an empty writable registry.
	pub fn new(id: impl Into<String>) -> Self {
		Self::from_parts(id.into(), false, Snapshot::default(), Vec::new())
	}

	pub fn builder(id: impl Into<String>) -> RegistryBuilder {
		RegistryBuilder {
			id: id.into(),
			read_only: false,
			entries: Vec::new(),
			processors: Vec::new(),
		}
	}

	fn from_parts(id: String, read_only: bool, snap: Snapshot, mut processors: Processors) -> Self {
		processors.sort_by_key(|(stage, _)| *stage);
		Self {
			lifecycle: LifecycleManager::new(id.clone()),
			id,
			read_only,
			snap: ArcSwap::from_pointee(snap),
			processors: RwLock::new(processors),
			pending_disposal: Mutex::new(Vec::new()),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn is_read_only(&self) -> bool {
		self.read_only
	}

	pub fn lifecycle(&self) -> &LifecycleManager {
		&self.lifecycle
	}

	pub fn len(&self) -> usize {
		self.snap.load().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Keys in registration order.
	pub fn keys(&self) -> Vec<String> {
		self.snap.load().entries.keys().map(|k| k.to_string()).collect()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.snap.load().entries.contains_key(key)
	}

	pub fn entry(&self, key: &str) -> Option<Entry> {
		self.snap.load().entries.get(key).cloned()
	}

	pub fn lookup(&self, key: &str) -> Option<Object> {
		self.snap.load().entries.get(key).map(|e| e.object.clone())
	}

	/// Every object whose concrete type is `T`, keyed and in registration order.
	pub fn lookup_by_type<T: Any + Send + Sync>(&self) -> IndexMap<String, Arc<T>> {
		let snap = self.snap.load();
		snap.entries
			.iter()
			.filter_map(|(key, e)| Some((key.to_string(), e.object.downcast::<T>()?)))
			.collect()
	}

	/// The only object of type `T`, if there is exactly one.
	pub fn lookup_single<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, LookupError> {
		single(self.lookup_by_type::<T>())
	}

	/// Every object with converter capability, keyed and in registration order.
	pub fn lookup_converters(&self) -> IndexMap<String, Arc<dyn Converter>> {
		let snap = self.snap.load();
		snap.entries
			.iter()
			.filter_map(|(key, e)| Some((key.to_string(), e.object.converter()?.clone())))
			.collect()
	}

	/// Every object with resolution strategy capability, keyed and in registration order.
	pub fn lookup_strategies(&self) -> IndexMap<String, Arc<dyn ResolutionStrategy>> {
		let snap = self.snap.load();
		snap.entries
			.iter()
			.filter_map(|(key, e)| Some((key.to_string(), e.object.strategy()?.clone())))
			.collect()
	}

	/// Adds a processor. Injection processors always run before pre-init ones;
	/// within a stage, processors run in the order they were added.
	pub fn add_processor(&self, stage: ProcessorStage, processor: Arc<dyn ObjectProcessor>) {
		let mut processors = self.processors.write();
		processors.push((stage, processor));
		processors.sort_by_key(|(stage, _)| *stage);
	}

	/// Stores `object` under `key`, replacing any previous value.
	///
	/// Runs processors, stores the result, then brings the object up to the
	/// registry's reached phase unless `options.bypass_lifecycle` is set.
	/// Storing the object already held under `key` keeps its phase as is.
	/// If catch-up fails, the previous value is put back.
	pub fn register(
		&self,
		key: &str,
		object: Object,
		options: RegisterOptions,
	) -> Result<Registration, RegistrationError> {
		if key.trim().is_empty() {
			return Err(RegistrationError::BlankKey);
		}
		if self.read_only {
			return Err(RegistrationError::ReadOnly {
				registry: self.id.clone(),
				key: key.to_string(),
			});
		}
		self.ensure_usable()?;

		let Some(object) = self.process(key, object, options) else {
			tracing::warn!(registry = %self.id, key, "registration vetoed by processor");
			return Ok(Registration::Vetoed);
		};

		let key: Arc<str> = Arc::from(key);
		let fresh = Arc::new(Mutex::new(Phase::NotInLifecycle));
		let entry_for = |previous: Option<&Entry>| Entry {
			key: key.clone(),
			object: object.clone(),
			options,
			reached: match previous {
				Some(old) if old.object.ptr_eq(&object) => old.reached.clone(),
				_ => fresh.clone(),
			},
		};
		let previous = self.snap.rcu(|snap| {
			let mut next = Snapshot::clone(snap);
			next.entries.insert(key.clone(), entry_for(snap.entries.get(&*key)));
			next
		});
		let replaced = previous.entries.get(&*key).cloned();
		let entry = entry_for(replaced.as_ref());
		let same_object = replaced.as_ref().is_some_and(|old| old.object.ptr_eq(&object));
		if let Some(old) = &replaced
			&& old.takes_part_in_lifecycle()
			&& !same_object
		{
			self.pending_disposal.lock().push(old.clone());
		}
		tracing::debug!(
			registry = %self.id,
			key = %key,
			type_name = object.type_name(),
			replaced = replaced.is_some(),
			"object registered"
		);

		if !same_object
			&& entry.takes_part_in_lifecycle()
			&& let Err(source) = self.catch_up(&entry)
		{
			self.roll_back(&entry, replaced.as_ref());
			tracing::warn!(registry = %self.id, key = %key, error = %source, "lifecycle catch-up failed, registration undone");
			return Err(RegistrationError::Lifecycle {
				key: key.to_string(),
				source,
			});
		}

		Ok(Registration::Stored {
			object,
			replaced: replaced.map(|e| e.object),
		})
	}

	/// Registers each pair in order with default options, stopping at the first error.
	///
	/// Objects registered before the failing one stay registered.
	pub fn register_objects<K, I>(&self, objects: I) -> Result<Vec<Registration>, RegistrationError>
	where
		K: AsRef<str>,
		I: IntoIterator<Item = (K, Object)>,
	{
		objects
			.into_iter()
			.map(|(key, object)| self.register(key.as_ref(), object, RegisterOptions::default()))
			.collect()
	}

	/// Removes and returns the object under `key`. No lifecycle phase is applied.
	pub fn unregister(&self, key: &str) -> Result<Option<Object>, RegistrationError> {
		if self.read_only {
			return Err(RegistrationError::ReadOnly {
				registry: self.id.clone(),
				key: key.to_string(),
			});
		}
		let previous = self.snap.rcu(|snap| {
			if !snap.entries.contains_key(key) {
				return Arc::clone(snap);
			}
			let mut next = Snapshot::clone(snap);
			next.entries.shift_remove(key);
			Arc::new(next)
		});
		let removed = previous.entries.get(key).map(|e| e.object.clone());
		if removed.is_some() {
			tracing::debug!(registry = %self.id, key, "object unregistered");
		}
		Ok(removed)
	}

	/// Runs `phase` on every lifecycle participant.
	///
	/// `initialise` and `start` visit entries in registration order, `stop` and
	/// `dispose` in reverse. Every participant is attempted; failures are
	/// collected into one error. A completed `dispose` releases every entry.
	pub fn fire_phase(&self, phase: Phase) -> Result<(), LifecycleError> {
		let result = self.lifecycle.fire_phase(phase, || self.fan_out(phase));
		if phase == Phase::Dispose && self.lifecycle.is_phase_complete(Phase::Dispose) {
			self.release();
		}
		result
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

	fn ensure_usable(&self) -> Result<(), RegistrationError> {
		let state = self.lifecycle.state();
		let phase = match state.failed {
			Some(failed) => failed,
			None if state.is_complete(Phase::Dispose) => Phase::Dispose,
			None => return Ok(()),
		};
		Err(RegistrationError::Unusable {
			registry: self.id.clone(),
			phase,
		})
	}

	fn process(&self, key: &str, mut object: Object, options: RegisterOptions) -> Option<Object> {
		let processors = self.processors.read().clone();
		for (stage, processor) in &processors {
			let skip = match stage {
				ProcessorStage::Injection => options.skip_injection,
				ProcessorStage::PreInit => options.skip_pre_init,
			};
			if !skip {
				object = processor.process(key, object)?;
			}
		}
		Some(object)
	}

	/// Brings a new entry up to the registry's reached or executing phase.
	fn catch_up(&self, entry: &Entry) -> Result<(), LifecycleError> {
		for &phase in self.lifecycle.state().catch_up_path() {
			if let Some(Err(source)) = entry.advance(phase) {
				return Err(LifecycleError::Phase {
					owner: entry.key.to_string(),
					phase,
					source,
				});
			}
		}
		Ok(())
	}

	/// Puts `previous` back under the key if it still maps to `entry`, then
	/// stops and disposes whatever the rejected object completed.
	fn roll_back(&self, entry: &Entry, previous: Option<&Entry>) {
		let mut restored = false;
		self.snap.rcu(|snap| {
			restored = snap.entries.get(&*entry.key).is_some_and(|e| e.object.ptr_eq(&entry.object));
			if !restored {
				return Arc::clone(snap);
			}
			let mut next = Snapshot::clone(snap);
			match previous {
				Some(old) => {
					next.entries.insert(entry.key.clone(), old.clone());
				}
				None => {
					next.entries.shift_remove(&*entry.key);
				}
			}
			Arc::new(next)
		});
		if restored && let Some(old) = previous {
			self.pending_disposal.lock().retain(|e| !e.object.ptr_eq(&old.object));
		}

		if entry.reached() == Phase::NotInLifecycle {
			return;
		}
		for phase in [Phase::Stop, Phase::Dispose] {
			if let Some(Err(err)) = entry.advance(phase) {
				tracing::warn!(registry = %self.id, key = %entry.key, %phase, error = %err, "rejected object wind-down failed");
			}
		}
	}

	fn fan_out(&self, phase: Phase) -> Result<(), BoxError> {
		let snap = self.snap.load_full();
		let mut members: Vec<&Entry> = snap.entries.values().filter(|e| e.takes_part_in_lifecycle()).collect();
		if phase.runs_in_reverse() {
			members.reverse();
		}

		let mut failures = Vec::new();
		for entry in members {
			if let Some(Err(err)) = entry.advance(phase) {
				tracing::warn!(registry = %self.id, key = %entry.key, %phase, error = %err, "member phase failed");
				failures.push((entry.key.to_string(), err));
			}
		}

		if phase == Phase::Dispose {
			let replaced = std::mem::take(&mut *self.pending_disposal.lock());
			for entry in replaced.iter().rev() {
				if let Some(Err(err)) = entry.advance(Phase::Dispose) {
					tracing::warn!(registry = %self.id, key = %entry.key, error = %err, "replaced member dispose failed");
					failures.push((entry.key.to_string(), err));
				}
			}
		}

		if failures.is_empty() {
			Ok(())
		} else {
			Err(Box::new(EntryFailures { failures }))
		}
	}

	fn release(&self) {
		let released = self.snap.swap(Arc::new(Snapshot::default()));
		self.pending_disposal.lock().clear();
		if !released.entries.is_empty() {
			tracing::debug!(registry = %self.id, entries = released.entries.len(), "registry released");
		}
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("id", &self.id)
			.field("read_only", &self.read_only)
			.field("entries", &self.len())
			.field("phase", &self.lifecycle.current_phase())
			.finish()
	}
}

/// Reduces a typed lookup to at most one match.
pub(crate) fn single<T>(mut matches: IndexMap<String, Arc<T>>) -> Result<Option<Arc<T>>, LookupError> {
	if matches.len() > 1 {
		return Err(LookupError::Ambiguous {
			type_name: std::any::type_name::<T>(),
			keys: matches.into_keys().collect(),
		});
	}
	Ok(matches.pop().map(|(_, value)| value))
}

/// Construction-time population, the only way to fill a read-only registry.
pub struct RegistryBuilder {
	id: String,
	read_only: bool,
	entries: Vec<(String, Object, RegisterOptions)>,
	processors: Processors,
}

impl RegistryBuilder {
	pub fn read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}

	/// Preloads an object. Processors are not applied to preloaded objects.
	pub fn object(self, key: impl Into<String>, object: Object) -> Self {
		self.object_with(key, object, RegisterOptions::default())
	}

	pub fn object_with(mut self, key: impl Into<String>, object: Object, options: RegisterOptions) -> Self {
		self.entries.push((key.into(), object, options));
		self
	}

	pub fn processor(mut self, stage: ProcessorStage, processor: Arc<dyn ObjectProcessor>) -> Self {
		self.processors.push((stage, processor));
		self
	}

	/// Fails on a blank key. A repeated key keeps its first position and the last value.
	pub fn build(self) -> Result<Registry, RegistrationError> {
		let mut snap = Snapshot::default();
		for (key, object, options) in self.entries {
			if key.trim().is_empty() {
				return Err(RegistrationError::BlankKey);
			}
			let key: Arc<str> = Arc::from(key);
			snap.entries.insert(
				key.clone(),
				Entry {
					key,
					object,
					options,
					reached: Arc::new(Mutex::new(Phase::NotInLifecycle)),
				},
			);
		}
		tracing::debug!(registry = %self.id, entries = snap.entries.len(), read_only = self.read_only, "registry built");
		Ok(Registry::from_parts(self.id, self.read_only, snap, self.processors))
	}
}
