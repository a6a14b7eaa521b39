use std::fmt;
use std::sync::Arc;

/// Name of the root type. It accepts every other base type.
pub const OBJECT: &str = "object";

/// Nominal type identifier with its declared supertype chain.
///
/// Supertypes are stored nearest first, so the index of a supertype in the chain
/// is the number of hops needed to reach it. The root [`OBJECT`] type is implicit
/// and never needs to be listed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BaseType {
	name: Arc<str>,
	supertypes: Arc<[Arc<str>]>,
}

impl BaseType {
	/// Creates a base type with no declared supertypes.
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self {
			name: name.into(),
			supertypes: Arc::from([]),
		}
	}

	/// Returns the root type.
	pub fn object() -> Self {
		Self::new(OBJECT)
	}

	/// Creates a base type with an explicit supertype chain, nearest first.
	pub fn with_supertypes<I, S>(name: impl Into<Arc<str>>, supertypes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Arc<str>>,
	{
		Self {
			name: name.into(),
			supertypes: supertypes.into_iter().map(Into::into).collect(),
		}
	}

	/// Creates a base type whose direct supertype is `parent`.
	///
	/// The parent's own chain is inherited, so `extending("int", &number)` is
	/// assignable to `number` and to everything `number` is assignable to.
	pub fn extending(name: impl Into<Arc<str>>, parent: &BaseType) -> Self {
		let supertypes = std::iter::once(parent.name.clone())
			.chain(parent.supertypes.iter().cloned())
			.collect();
		Self {
			name: name.into(),
			supertypes,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the declared supertypes, nearest first.
	pub fn supertypes(&self) -> impl Iterator<Item = &str> {
		self.supertypes.iter().map(|s| &**s)
	}

	pub fn is_object(&self) -> bool {
		&*self.name == OBJECT
	}

	/// Returns true if a value of type `other` can be used where `self` is expected.
	pub fn is_assignable_from(&self, other: &BaseType) -> bool {
		self.distance_from(other).is_some()
	}

	/// Number of supertype hops from `other` up to `self`.
	///
	/// `Some(0)` is an exact match. `None` means `other` is not assignable to `self`.
	/// The root type is always one hop above the end of the declared chain, which
	/// makes it the least specific match for any type.
	pub fn distance_from(&self, other: &BaseType) -> Option<u32> {
		if self.name == other.name {
			return Some(0);
		}
		if let Some(pos) = other.supertypes.iter().position(|s| *s == self.name) {
			return Some(pos as u32 + 1);
		}
		if self.is_object() {
			return Some(other.supertypes.len() as u32 + 1);
		}
		None
	}
}

impl fmt::Debug for BaseType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.supertypes.is_empty() {
			return write!(f, "{}", self.name);
		}
		write!(f, "{} <:", self.name)?;
		for s in self.supertypes.iter() {
			write!(f, " {s}")?;
		}
		Ok(())
	}
}

impl fmt::Display for BaseType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)
	}
}

impl From<&str> for BaseType {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}
