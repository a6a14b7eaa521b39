//! Generation-tagged resolution caches.
//!
//! Entries remember the engine generation they were computed under and are
//! ignored once the generation moves on. Concurrent writers for the same pair
//! converge on whichever value was stored first for that generation.

use std::sync::Arc;

use conduit_primitives::ConversionPair;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::FxBuildHasher;

use super::converter::Converter;

struct Tagged<V> {
	generation: u64,
	value: V,
}

type TaggedMap<V> = DashMap<ConversionPair, Tagged<V>, FxBuildHasher>;

pub(super) struct ResolutionCache {
	exact: TaggedMap<Arc<dyn Converter>>,
	lists: TaggedMap<Arc<[Arc<dyn Converter>]>>,
}

impl Default for ResolutionCache {
	fn default() -> Self {
		Self {
			exact: DashMap::with_hasher(FxBuildHasher),
			lists: DashMap::with_hasher(FxBuildHasher),
		}
	}
}

impl ResolutionCache {
	pub(super) fn exact(&self, pair: &ConversionPair, generation: u64) -> Option<Arc<dyn Converter>> {
		lookup(&self.exact, pair, generation)
	}

	pub(super) fn store_exact(
		&self,
		pair: ConversionPair,
		generation: u64,
		value: Arc<dyn Converter>,
	) -> Arc<dyn Converter> {
		store(&self.exact, pair, generation, value)
	}

	pub(super) fn list(&self, pair: &ConversionPair, generation: u64) -> Option<Arc<[Arc<dyn Converter>]>> {
		lookup(&self.lists, pair, generation)
	}

	pub(super) fn store_list(
		&self,
		pair: ConversionPair,
		generation: u64,
		value: Arc<[Arc<dyn Converter>]>,
	) -> Arc<[Arc<dyn Converter>]> {
		store(&self.lists, pair, generation, value)
	}

	pub(super) fn clear(&self) {
		self.exact.clear();
		self.lists.clear();
	}

	pub(super) fn len(&self) -> usize {
		self.exact.len() + self.lists.len()
	}
}

fn lookup<V: Clone>(map: &TaggedMap<V>, pair: &ConversionPair, generation: u64) -> Option<V> {
	let hit = map.get(pair)?;
	(hit.generation == generation).then(|| hit.value.clone())
}

fn store<V: Clone>(map: &TaggedMap<V>, pair: ConversionPair, generation: u64, value: V) -> V {
	match map.entry(pair) {
		Entry::Occupied(mut slot) => {
			let existing = slot.get().generation;
			if existing == generation {
				return slot.get().value.clone();
			}
			if existing < generation {
				slot.insert(Tagged {
					generation,
					value: value.clone(),
				});
			}
			value
		}
		Entry::Vacant(slot) => {
			slot.insert(Tagged {
				generation,
				value: value.clone(),
			});
			value
		}
	}
}
