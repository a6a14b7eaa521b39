//! Shared fixtures for unit and scenario tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BoxError;
use crate::lifecycle::{Lifecycle, Phase};
use crate::transform::{Converter, FnConverter};
use crate::{DataType, Object};

/// Ordered record of lifecycle callbacks across many participants.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
	pub(crate) fn push(&self, line: String) {
		self.0.lock().push(line);
	}

	pub(crate) fn entries(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	pub(crate) fn clear(&self) {
		self.0.lock().clear();
	}
}

/// Lifecycle participant that writes `name:phase` to a journal on success.
pub(crate) struct Participant {
	name: String,
	journal: Journal,
	fail_on: Option<Phase>,
}

impl Participant {
	pub(crate) fn new(name: &str, journal: &Journal) -> Self {
		Self {
			name: name.to_string(),
			journal: journal.clone(),
			fail_on: None,
		}
	}

	pub(crate) fn failing_on(mut self, phase: Phase) -> Self {
		self.fail_on = Some(phase);
		self
	}

	/// Wraps the member as a registrable object with lifecycle capability.
	pub(crate) fn object(self) -> Object {
		Object::builder(Arc::new(self)).lifecycle().build()
	}

	fn visit(&self, phase: Phase) -> Result<(), BoxError> {
		if self.fail_on == Some(phase) {
			return Err(format!("{} refused {phase}", self.name).into());
		}
		self.journal.push(format!("{}:{phase}", self.name));
		Ok(())
	}
}

impl Lifecycle for Participant {
	fn initialise(&self) -> Result<(), BoxError> {
		self.visit(Phase::Initialise)
	}

	fn start(&self) -> Result<(), BoxError> {
		self.visit(Phase::Start)
	}

	fn stop(&self) -> Result<(), BoxError> {
		self.visit(Phase::Stop)
	}

	fn dispose(&self) -> Result<(), BoxError> {
		self.visit(Phase::Dispose)
	}
}

pub(crate) fn dt(name: &str) -> DataType {
	DataType::named(name)
}

/// Pass-through converter used where only resolution matters.
pub(crate) fn converter(name: &str, sources: &[&str], target: &str, weight: i32) -> Arc<dyn Converter> {
	Arc::new(
		FnConverter::new(name, sources.iter().map(|s| dt(s)), dt(target), Ok).with_weight(weight),
	)
}

/// Converter that appends `suffix` to a `String` input.
pub(crate) fn appender(name: &str, source: &str, target: &str, suffix: &'static str) -> Arc<dyn Converter> {
	Arc::new(FnConverter::typed(
		name,
		[dt(source)],
		dt(target),
		move |input: String| Ok::<_, BoxError>(format!("{input}{suffix}")),
	))
}
