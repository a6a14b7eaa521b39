use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Media type parse failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaTypeError {
	#[error("empty media type")]
	Empty,
	#[error("media type {0:?} is missing a '/' separator")]
	MissingSubtype(String),
	#[error("media type {0:?} has an empty component")]
	EmptyComponent(String),
	#[error("malformed media type parameter {0:?}")]
	MalformedParameter(String),
}

/// Semantic tag such as `application/json; charset=utf-8`.
///
/// Type and subtype are lowercased on parse. `*` acts as a wildcard, but only on
/// the accepting side of [`MediaType::accepts`]. Parameters are preserved for
/// consumers and take no part in matching.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
	primary: Arc<str>,
	sub: Arc<str>,
	params: Arc<[(Arc<str>, Arc<str>)]>,
}

impl MediaType {
	/// Creates a media type from already-split components.
	pub fn new(primary: &str, sub: &str) -> Self {
		Self {
			primary: primary.to_ascii_lowercase().into(),
			sub: sub.to_ascii_lowercase().into(),
			params: Arc::from([]),
		}
	}

	/// `*/*`.
	pub fn any() -> Self {
		Self::new("*", "*")
	}

	pub fn primary(&self) -> &str {
		&self.primary
	}

	pub fn subtype(&self) -> &str {
		&self.sub
	}

	/// Returns a parameter value by case-insensitive name.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(name))
			.map(|(_, v)| &**v)
	}

	pub fn charset(&self) -> Option<&str> {
		self.param("charset")
	}

	pub fn is_wildcard(&self) -> bool {
		&*self.primary == "*" && &*self.sub == "*"
	}

	/// Returns true if content tagged `other` satisfies this media type.
	pub fn accepts(&self, other: &MediaType) -> bool {
		let primary = &*self.primary == "*" || self.primary == other.primary;
		let sub = &*self.sub == "*" || self.sub == other.sub;
		primary && sub
	}
}

impl FromStr for MediaType {
	type Err = MediaTypeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(MediaTypeError::Empty);
		}

		let mut parts = s.split(';');
		let essence = parts.next().unwrap_or_default().trim();
		let (primary, sub) = essence
			.split_once('/')
			.ok_or_else(|| MediaTypeError::MissingSubtype(s.to_string()))?;
		let (primary, sub) = (primary.trim(), sub.trim());
		if primary.is_empty() || sub.is_empty() {
			return Err(MediaTypeError::EmptyComponent(s.to_string()));
		}

		let mut params = Vec::new();
		for raw in parts {
			let raw = raw.trim();
			if raw.is_empty() {
				continue;
			}
			let (k, v) = raw
				.split_once('=')
				.ok_or_else(|| MediaTypeError::MalformedParameter(raw.to_string()))?;
			let v = v.trim().trim_matches('"');
			params.push((Arc::from(k.trim().to_ascii_lowercase()), Arc::from(v)));
		}

		let mut mt = Self::new(primary, sub);
		mt.params = params.into();
		Ok(mt)
	}
}

impl fmt::Display for MediaType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.primary, self.sub)?;
		for (k, v) in self.params.iter() {
			write!(f, "; {k}={v}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for MediaType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("application/json", "application/json", true)]
	#[case("APPLICATION/Json", "application/json", true)]
	#[case("application/*", "application/xml", true)]
	#[case("*/*", "text/plain", true)]
	#[case("text/plain", "text/html", false)]
	#[case("application/json", "*/*", false)]
	#[case("text/plain; charset=utf-8", "text/plain; charset=iso-8859-1", true)]
	fn accepts_follows_wildcards(#[case] accepting: &str, #[case] candidate: &str, #[case] expected: bool) {
		let a: MediaType = accepting.parse().unwrap();
		let c: MediaType = candidate.parse().unwrap();
		assert_eq!(a.accepts(&c), expected);
	}

	#[test]
	fn parameters_are_kept() {
		let mt: MediaType = "text/plain; Charset=\"UTF-8\"".parse().unwrap();
		assert_eq!(mt.charset(), Some("UTF-8"));
		assert_eq!(mt.to_string(), "text/plain; charset=UTF-8");
	}

	#[rstest]
	#[case("", MediaTypeError::Empty)]
	#[case("json", MediaTypeError::MissingSubtype("json".into()))]
	#[case("application/", MediaTypeError::EmptyComponent("application/".into()))]
	#[case("text/plain; charset", MediaTypeError::MalformedParameter("charset".into()))]
	fn rejects_malformed(#[case] input: &str, #[case] expected: MediaTypeError) {
		assert_eq!(input.parse::<MediaType>().unwrap_err(), expected);
	}
}
