//! Cross-module scenarios: broker precedence, cache coherence, late joiners and
//! concurrent registration.

pub(crate) mod support;
