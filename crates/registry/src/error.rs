//! Error types shared across the registry, broker and resolution engine.

use std::fmt;

use conduit_primitives::ConversionPair;

use crate::lifecycle::Phase;

/// Opaque failure raised by user code (lifecycle callbacks, converters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registration failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
	#[error("registration key must not be blank")]
	BlankKey,
	#[error("registry '{registry}' is read-only, cannot register '{key}'")]
	ReadOnly { registry: String, key: String },
	#[error("no writable registry available for '{key}'")]
	NoWritableRegistry { key: String },
	#[error("registry '{registry}' is no longer usable (last phase: {phase})")]
	Unusable { registry: String, phase: Phase },
	#[error("lifecycle catch-up failed for '{key}'")]
	Lifecycle {
		key: String,
		#[source]
		source: LifecycleError,
	},
}

/// Phase transition and phase execution failures.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
	#[error("{owner}: cannot enter {to} from {from}")]
	InvalidTransition { owner: String, from: Phase, to: Phase },
	#[error("{owner}: cannot enter {requested} while {executing} is executing")]
	Busy {
		owner: String,
		executing: Phase,
		requested: Phase,
	},
	#[error("{owner}: unusable after {failed} failed, only dispose is permitted")]
	Unusable { owner: String, failed: Phase },
	#[error("{owner}: {phase} failed")]
	Phase {
		owner: String,
		phase: Phase,
		#[source]
		source: BoxError,
	},
	#[error("{owner}: {phase} failed in {} member(s)", .failures.len())]
	Partial {
		owner: String,
		phase: Phase,
		failures: Vec<LifecycleError>,
	},
	#[error("unknown lifecycle phase '{0}'")]
	UnknownPhase(String),
}

impl LifecycleError {
	/// Phase the failure is attributed to, if any.
	pub fn phase(&self) -> Option<Phase> {
		match self {
			Self::InvalidTransition { to, .. } => Some(*to),
			Self::Busy { requested, .. } => Some(*requested),
			Self::Unusable { failed, .. } => Some(*failed),
			Self::Phase { phase, .. } | Self::Partial { phase, .. } => Some(*phase),
			Self::UnknownPhase(_) => None,
		}
	}

	/// Returns true if the owner must not be used again except for disposal.
	pub fn is_fatal(&self) -> bool {
		match self {
			Self::Unusable { .. } => true,
			Self::Phase { phase, .. } | Self::Partial { phase, .. } => phase.is_fatal_on_failure(),
			_ => false,
		}
	}
}

/// Per-member failures collected while fanning a phase out over a registry.
#[derive(Debug)]
pub struct EntryFailures {
	pub failures: Vec<(String, BoxError)>,
}

impl EntryFailures {
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.failures.iter().map(|(k, _)| k.as_str())
	}
}

impl fmt::Display for EntryFailures {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} member(s) failed:", self.failures.len())?;
		for (key, err) in &self.failures {
			write!(f, " [{key}: {err}]")?;
		}
		Ok(())
	}
}

impl std::error::Error for EntryFailures {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		let (_, first) = self.failures.first()?;
		Some(first.as_ref())
	}
}

/// Typed lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
	#[error("expected at most one {type_name}, found {}: {keys:?}", .keys.len())]
	Ambiguous {
		type_name: &'static str,
		keys: Vec<String>,
	},
}

/// No strategy produced a converter for the requested pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no converter found for {pair}")]
pub struct NoConverterFound {
	pub pair: ConversionPair,
}
