use std::cmp::Reverse;
use std::sync::Arc;

use conduit_primitives::DataType;
use parking_lot::RwLock;

use super::converter::{Converter, same_converter};

/// Change notification delivered to strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAction {
	Added,
	Removed,
}

/// Pluggable algorithm that picks a converter for a `(source, target)` pair.
pub trait ResolutionStrategy: Send + Sync {
	fn name(&self) -> &str;

	/// Returns the best converter this strategy knows for the pair, if any.
	fn resolve(&self, source: &DataType, target: &DataType) -> Option<Arc<dyn Converter>>;

	/// Called for every converter added to or removed from the engine.
	fn converter_changed(&self, _converter: &Arc<dyn Converter>, _action: RegistryAction) {}

	/// Fallback strategies are consulted after all others.
	fn is_fallback(&self) -> bool {
		false
	}
}

/// Identity comparison between strategy handles.
pub fn same_strategy(a: &Arc<dyn ResolutionStrategy>, b: &Arc<dyn ResolutionStrategy>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

struct Ranked {
	seq: u64,
	converter: Arc<dyn Converter>,
}

#[derive(Default)]
struct Known {
	next_seq: u64,
	entries: Vec<Ranked>,
}

/// Default fallback strategy: direct single-converter matches ranked by type distance.
///
/// Candidates must support the source and return something the target accepts.
/// Among them the winner has:
///
/// 1. the smallest distance from its return type up to the target,
/// 2. then the highest priority weight,
/// 3. then the earliest registration.
#[derive(Default)]
pub struct TypeBasedStrategy {
	known: RwLock<Known>,
}

impl TypeBasedStrategy {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.known.read().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn rank(target: &DataType, candidate: &Ranked) -> Option<(u32, Reverse<i32>, u64)> {
	let distance = target.specificity(candidate.converter.return_type())?;
	Some((distance, Reverse(candidate.converter.priority_weight()), candidate.seq))
}

impl ResolutionStrategy for TypeBasedStrategy {
	fn name(&self) -> &str {
		"type-based"
	}

	fn resolve(&self, source: &DataType, target: &DataType) -> Option<Arc<dyn Converter>> {
		let known = self.known.read();
		known
			.entries
			.iter()
			.filter(|r| r.converter.supports(source))
			.filter_map(|r| rank(target, r).map(|key| (key, r)))
			.min_by_key(|(key, _)| *key)
			.map(|(_, r)| r.converter.clone())
	}

	fn converter_changed(&self, converter: &Arc<dyn Converter>, action: RegistryAction) {
		let mut known = self.known.write();
		match action {
			RegistryAction::Added => {
				if known.entries.iter().any(|r| same_converter(&r.converter, converter)) {
					return;
				}
				let seq = known.next_seq;
				known.next_seq += 1;
				known.entries.push(Ranked {
					seq,
					converter: converter.clone(),
				});
			}
			RegistryAction::Removed => {
				known.entries.retain(|r| !same_converter(&r.converter, converter));
			}
		}
	}

	fn is_fallback(&self) -> bool {
		true
	}
}
