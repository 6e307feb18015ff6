//! Redaction wrapper for access and refresh token values.
//!
//! Sessions hold their token material as [`TokenSecret`] so that `Debug` and `Display`
//! formatting, and therefore every tracing statement in the keeper, can never leak a live
//! credential. Serde passes the inner value through unchanged: session stores persist real
//! tokens while log output only ever shows `<redacted>`.

// self
use crate::_prelude::*;

/// An access or refresh token value that formats as `<redacted>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a raw token value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Yields the raw token for wire use. Never log the returned string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Compares two secrets by value.
	///
	/// The staleness check uses this to notice that a concurrent interactive login rotated a
	/// session's refresh token out from under the queue.
	pub fn same_value(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
