use crate::object::Object;

/// Point in the registration pipeline where a processor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessorStage {
	/// Dependency wiring. Runs first.
	Injection,
	/// Last chance to replace or veto an object before it is stored.
	PreInit,
}

/// Hook applied to every object on its way into a registry.
///
/// Returning `None` vetoes the registration: nothing is stored and no lifecycle
/// runs. Processors run outside every registry lock, so they may look up other
/// objects in the same registry.
pub trait ObjectProcessor: Send + Sync {
	fn process(&self, key: &str, object: Object) -> Option<Object>;
}

impl<F> ObjectProcessor for F
where
	F: Fn(&str, Object) -> Option<Object> + Send + Sync,
{
	fn process(&self, key: &str, object: Object) -> Option<Object> {
		self(key, object)
	}
}
