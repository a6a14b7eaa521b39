use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::base_type::BaseType;
use crate::media_type::MediaType;

#[cfg(test)]
mod tests;

/// Descriptor of a runtime value's shape.
///
/// Immutable once built; used as a lookup key and for compatibility tests only.
/// Equality and hashing are structural over all three components.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataType {
	base: BaseType,
	item: Option<Arc<DataType>>,
	media: Option<MediaType>,
}

impl DataType {
	pub fn new(base: BaseType) -> Self {
		Self {
			base,
			item: None,
			media: None,
		}
	}

	/// Shorthand for a data type over a base type with no supertypes.
	pub fn named(name: &str) -> Self {
		Self::new(BaseType::new(name))
	}

	/// Data type that accepts any value.
	pub fn object() -> Self {
		Self::new(BaseType::object())
	}

	/// Sets the element type of a parameterized or collection type.
	pub fn with_item_type(mut self, item: DataType) -> Self {
		self.item = Some(Arc::new(item));
		self
	}

	pub fn with_media_type(mut self, media: MediaType) -> Self {
		self.media = Some(media);
		self
	}

	pub fn base_type(&self) -> &BaseType {
		&self.base
	}

	pub fn item_type(&self) -> Option<&DataType> {
		self.item.as_deref()
	}

	pub fn media_type(&self) -> Option<&MediaType> {
		self.media.as_ref()
	}

	/// Returns true if this descriptor accepts a value described by `candidate`.
	///
	/// - the candidate's base type must be assignable to this base type,
	/// - item types are checked only when both sides declare one,
	/// - a missing media type on this side accepts any candidate media type.
	pub fn is_compatible_with(&self, candidate: &DataType) -> bool {
		self.specificity(candidate).is_some()
	}

	/// Base-type distance from `candidate` up to `self`, if compatible.
	///
	/// Lower is more specific. Used to rank converters whose return types all
	/// satisfy a requested target.
	pub fn specificity(&self, candidate: &DataType) -> Option<u32> {
		let distance = self.base.distance_from(&candidate.base)?;

		if let (Some(mine), Some(theirs)) = (&self.item, &candidate.item)
			&& !mine.is_compatible_with(theirs)
		{
			return None;
		}

		match (&self.media, &candidate.media) {
			(None, _) => {}
			(Some(mine), _) if mine.is_wildcard() => {}
			(Some(mine), Some(theirs)) if mine.accepts(theirs) => {}
			_ => return None,
		}

		Some(distance)
	}

	/// Stable structural hash over base type, item type and media type.
	pub fn hash_key(&self) -> u64 {
		let mut hasher = FxHasher::default();
		self.hash(&mut hasher);
		hasher.finish()
	}
}

impl fmt::Display for DataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.base)?;
		if let Some(item) = &self.item {
			write!(f, "<{item}>")?;
		}
		if let Some(media) = &self.media {
			write!(f, " ({media})")?;
		}
		Ok(())
	}
}

impl fmt::Debug for DataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("DataType");
		s.field("base", &self.base);
		if let Some(item) = &self.item {
			s.field("item", item);
		}
		if let Some(media) = &self.media {
			s.field("media", media);
		}
		s.finish()
	}
}

/// A `(source, target)` request, used as a cache key and in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversionPair {
	pub source: DataType,
	pub target: DataType,
}

impl ConversionPair {
	pub fn new(source: &DataType, target: &DataType) -> Self {
		Self {
			source: source.clone(),
			target: target.clone(),
		}
	}
}

impl fmt::Display for ConversionPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -> {}", self.source, self.target)
	}
}
