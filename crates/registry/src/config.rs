//! Declarative broker layout.
//!
//! ```toml
//! [[registries]]
//! id = "bootstrap"
//! read_only = true
//!
//! [[registries]]
//! id = "runtime"
//! ```

use rustc_hash::FxHashSet;
use serde::Deserialize;
use thiserror::Error;

use crate::error::RegistrationError;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to parse broker config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("broker config declares no registries")]
	Empty,
	#[error("registry at position {0} has a blank id")]
	BlankId(usize),
	#[error("registry id '{0}' is declared more than once")]
	DuplicateId(String),
	#[error("failed to build registry: {0}")]
	Registry(#[from] RegistrationError),
}

/// Ordered registry list. Order is lookup and registration precedence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
	#[serde(default)]
	pub registries: Vec<RegistryConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
	pub id: String,
	#[serde(default)]
	pub read_only: bool,
}

impl RegistryConfig {
	pub fn writable(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			read_only: false,
		}
	}

	pub fn read_only(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			read_only: true,
		}
	}
}

impl BrokerConfig {
	pub fn new(registries: Vec<RegistryConfig>) -> Self {
		Self { registries }
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.registries.is_empty() {
			return Err(ConfigError::Empty);
		}
		let mut seen = FxHashSet::default();
		for (idx, registry) in self.registries.iter().enumerate() {
			let id = registry.id.trim();
			if id.is_empty() {
				return Err(ConfigError::BlankId(idx));
			}
			if !seen.insert(id) {
				return Err(ConfigError::DuplicateId(id.to_string()));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;

	#[test]
	fn parses_ordered_registries() {
		let config = BrokerConfig::from_toml_str(
			r#"
			[[registries]]
			id = "bootstrap"
			read_only = true

			[[registries]]
			id = "runtime"
			"#,
		)
		.unwrap();

		assert_eq!(
			config.registries,
			vec![RegistryConfig::read_only("bootstrap"), RegistryConfig::writable("runtime")]
		);
	}

	#[rstest]
	#[case::empty("", "no registries")]
	#[case::blank_id("[[registries]]\nid = \"  \"", "blank id")]
	#[case::duplicate("[[registries]]\nid = \"a\"\n[[registries]]\nid = \"a\"", "more than once")]
	#[case::unknown_field("[[registries]]\nid = \"a\"\nmode = \"fast\"", "parse")]
	fn rejects_invalid_documents(#[case] input: &str, #[case] fragment: &str) {
		let err = BrokerConfig::from_toml_str(input).unwrap_err();
		assert!(err.to_string().contains(fragment), "unexpected error: {err}");
	}
}
