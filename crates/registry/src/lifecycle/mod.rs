//! Lifecycle phases and the per-owner phase state machine.
//!
//! # Role
//!
//! Every registry and the broker own a [`LifecycleManager`]. It decides whether
//! a requested phase runs, is skipped as a no-op, or is rejected, and records
//! the outcome once the owner's phase callback returns.
//!
//! # Invariants
//!
//! - Phases only advance in [`Phase::ORDER`]. `stop` may be followed by `start`.
//! - `initialise` and `dispose` run at most once per owner.
//! - A phase that is current or executing is a no-op when requested again.
//! - The manager's lock is never held while a phase callback runs.
//! - A failed `initialise` or `dispose` leaves the owner usable only for `dispose`.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::error::{BoxError, LifecycleError};


/// Lifecycle phase identifiers, in their only legal forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
	#[default]
	NotInLifecycle,
	Initialise,
	Start,
	Stop,
	Dispose,
}

impl Phase {
	/// Executable phases in forward order.
	pub const ORDER: [Phase; 4] = [Phase::Initialise, Phase::Start, Phase::Stop, Phase::Dispose];

	pub fn name(self) -> &'static str {
		match self {
			Self::NotInLifecycle => "not in lifecycle",
			Self::Initialise => "initialise",
			Self::Start => "start",
			Self::Stop => "stop",
			Self::Dispose => "dispose",
		}
	}

	/// Phases whose failure makes the owner unusable.
	pub fn is_fatal_on_failure(self) -> bool {
		matches!(self, Self::Initialise | Self::Dispose)
	}

	/// Fan-out order: stopping and disposing walk members in reverse.
	pub fn runs_in_reverse(self) -> bool {
		matches!(self, Self::Stop | Self::Dispose)
	}

	fn flag(self) -> PhaseSet {
		match self {
			Self::NotInLifecycle => PhaseSet::empty(),
			Self::Initialise => PhaseSet::INITIALISE,
			Self::Start => PhaseSet::START,
			Self::Stop => PhaseSet::STOP,
			Self::Dispose => PhaseSet::DISPOSE,
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Phase {
	type Err = LifecycleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"initialise" | "initialize" => Ok(Self::Initialise),
			"start" => Ok(Self::Start),
			"stop" => Ok(Self::Stop),
			"dispose" => Ok(Self::Dispose),
			_ => Err(LifecycleError::UnknownPhase(s.to_string())),
		}
	}
}

bitflags! {
	/// Set of phases an owner has completed at least once.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct PhaseSet: u8 {
		const INITIALISE = 1 << 0;
		const START = 1 << 1;
		const STOP = 1 << 2;
		const DISPOSE = 1 << 3;
	}
}

/// Callbacks a registered object may take part in.
///
/// All methods default to no-ops so implementors only override what they need.
pub trait Lifecycle: Send + Sync {
	fn initialise(&self) -> Result<(), BoxError> {
		Ok(())
	}

	fn start(&self) -> Result<(), BoxError> {
		Ok(())
	}

	fn stop(&self) -> Result<(), BoxError> {
		Ok(())
	}

	fn dispose(&self) -> Result<(), BoxError> {
		Ok(())
	}
}

/// Invokes the callback matching `phase` on `target`.
pub fn invoke(target: &dyn Lifecycle, phase: Phase) -> Result<(), BoxError> {
	match phase {
		Phase::NotInLifecycle => Ok(()),
		Phase::Initialise => target.initialise(),
		Phase::Start => target.start(),
		Phase::Stop => target.stop(),
		Phase::Dispose => target.dispose(),
	}
}

/// Point-in-time view of an owner's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecycleState {
	pub current: Phase,
	pub completed: PhaseSet,
	pub executing: Option<Phase>,
	pub failed: Option<Phase>,
}

enum Decision {
	Run,
	Skip,
}

impl LifecycleState {
	pub fn is_complete(&self, phase: Phase) -> bool {
		self.completed.contains(phase.flag())
	}

	/// Phases a late joiner must run to reach this state. A phase that is
	/// executing counts as reached; an object joining mid-dispose gets nothing.
	pub fn catch_up_path(&self) -> &'static [Phase] {
		if self.failed.is_some() {
			return &[];
		}
		let reached = match self.executing {
			Some(Phase::Dispose) => return &[],
			Some(executing) => executing,
			None => self.current,
		};
		match reached {
			Phase::Initialise | Phase::Stop => &[Phase::Initialise],
			Phase::Start => &[Phase::Initialise, Phase::Start],
			Phase::NotInLifecycle | Phase::Dispose => &[],
		}
	}

	fn decide(&self, owner: &str, phase: Phase) -> Result<Decision, LifecycleError> {
		if self.is_complete(Phase::Dispose) {
			return match phase {
				Phase::Dispose => Ok(Decision::Skip),
				_ => Err(self.invalid(owner, phase)),
			};
		}
		if let Some(failed) = self.failed
			&& phase != Phase::Dispose
		{
			return Err(LifecycleError::Unusable {
				owner: owner.to_string(),
				failed,
			});
		}
		match self.executing {
			Some(executing) if executing == phase => return Ok(Decision::Skip),
			Some(executing) => {
				return Err(LifecycleError::Busy {
					owner: owner.to_string(),
					executing,
					requested: phase,
				});
			}
			None => {}
		}

		match (phase, self.current) {
			(Phase::NotInLifecycle, _) => Err(self.invalid(owner, phase)),
			(Phase::Initialise, _) if self.is_complete(Phase::Initialise) => Ok(Decision::Skip),
			(Phase::Initialise, Phase::NotInLifecycle) => Ok(Decision::Run),
			(Phase::Start, Phase::Start) | (Phase::Stop, Phase::Stop) => Ok(Decision::Skip),
			(Phase::Start, Phase::Initialise | Phase::Stop) => Ok(Decision::Run),
			(Phase::Stop, Phase::Initialise | Phase::Start) => Ok(Decision::Run),
			(Phase::Dispose, _) => Ok(Decision::Run),
			_ => Err(self.invalid(owner, phase)),
		}
	}

	fn invalid(&self, owner: &str, to: Phase) -> LifecycleError {
		LifecycleError::InvalidTransition {
			owner: owner.to_string(),
			from: self.current,
			to,
		}
	}

	fn record(&mut self, phase: Phase) {
		self.current = phase;
		self.completed |= phase.flag();
	}
}

/// Per-owner phase state machine.
pub struct LifecycleManager {
	owner: String,
	state: Mutex<LifecycleState>,
}

impl LifecycleManager {
	pub fn new(owner: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			state: Mutex::new(LifecycleState::default()),
		}
	}

	pub fn owner(&self) -> &str {
		&self.owner
	}

	pub fn state(&self) -> LifecycleState {
		*self.state.lock()
	}

	pub fn current_phase(&self) -> Phase {
		self.state.lock().current
	}

	pub fn is_phase_complete(&self, phase: Phase) -> bool {
		self.state.lock().is_complete(phase)
	}

	/// Returns true once the owner has been disposed or has failed fatally.
	pub fn is_unusable(&self) -> bool {
		let state = self.state.lock();
		state.failed.is_some() || state.is_complete(Phase::Dispose)
	}

	/// Runs `callback` as `phase` if the transition is legal.
	///
	/// Returns `Ok(())` without running the callback when the phase is already
	/// current, already executing, or is a run-once phase that has completed.
	pub fn fire_phase<F>(&self, phase: Phase, callback: F) -> Result<(), LifecycleError>
	where
		F: FnOnce() -> Result<(), BoxError>,
	{
		{
			let mut state = self.state.lock();
			match state.decide(&self.owner, phase)? {
				Decision::Skip => {
					tracing::trace!(owner = %self.owner, %phase, "phase already reached, skipping");
					return Ok(());
				}
				Decision::Run => state.executing = Some(phase),
			}
		}

		let result = callback();

		let mut state = self.state.lock();
		state.executing = None;
		match result {
			Ok(()) => {
				state.record(phase);
				tracing::debug!(owner = %self.owner, %phase, "phase complete");
				Ok(())
			}
			Err(source) if phase.is_fatal_on_failure() => {
				state.failed = Some(phase);
				if phase == Phase::Dispose {
					state.record(phase);
				}
				tracing::error!(owner = %self.owner, %phase, error = %source, "phase failed, owner unusable");
				Err(LifecycleError::Phase {
					owner: self.owner.clone(),
					phase,
					source,
				})
			}
			Err(source) => {
				state.record(phase);
				tracing::warn!(owner = %self.owner, %phase, error = %source, "phase failed");
				Err(LifecycleError::Phase {
					owner: self.owner.clone(),
					phase,
					source,
				})
			}
		}
	}

	/// Brings a newly added object up to this owner's completed phases.
	///
	/// An owner that has started runs `initialise` then `start` on the object;
	/// one that is initialised or stopped runs `initialise` only.
	pub fn apply_completed_phases(
		&self,
		label: &str,
		target: &dyn Lifecycle,
	) -> Result<(), LifecycleError> {
		let path = self.state().catch_up_path();
		run_phases(label, target, path.iter().copied())
	}

	/// Runs every phase in `(from, to]` on `target`, in order.
	pub fn apply_phase(
		&self,
		label: &str,
		target: &dyn Lifecycle,
		from: Phase,
		to: Phase,
	) -> Result<(), LifecycleError> {
		apply_phase(label, target, from, to)
	}
}

impl fmt::Debug for LifecycleManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LifecycleManager")
			.field("owner", &self.owner)
			.field("state", &self.state())
			.finish()
	}
}

/// Runs every phase in `(from, to]` on `target`, in order.
pub fn apply_phase(
	label: &str,
	target: &dyn Lifecycle,
	from: Phase,
	to: Phase,
) -> Result<(), LifecycleError> {
	run_phases(
		label,
		target,
		Phase::ORDER.into_iter().filter(|p| *p > from && *p <= to),
	)
}

fn run_phases(
	label: &str,
	target: &dyn Lifecycle,
	phases: impl IntoIterator<Item = Phase>,
) -> Result<(), LifecycleError> {
	for phase in phases {
		invoke(target, phase).map_err(|source| LifecycleError::Phase {
			owner: label.to_string(),
			phase,
			source,
		})?;
		tracing::trace!(object = label, %phase, "object phase applied");
	}
	Ok(())
}
