//! Collaborator contracts for the refresh exchange and best-effort revocation.
//!
//! The keeper never talks to a provider directly; it drives a [`RefreshClient`] for the
//! `grant_type=refresh_token` exchange and, optionally, a [`RevocationClient`] for cleaning up
//! superseded tokens. Any OAuth 2.0 client stack can satisfy these contracts; the crate ships a
//! reqwest-backed implementation behind the `reqwest` feature.

// self
use crate::{
	_prelude::*,
	session::{RegistrationId, Session, TokenSecret},
};

/// Provider error code treated as a transient server-side failure.
pub const SERVER_ERROR: &str = "server_error";
/// Provider error code treated as a transient availability failure.
pub const TEMPORARILY_UNAVAILABLE: &str = "temporarily_unavailable";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`RefreshClient::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<Session, RefreshError>> + 'a + Send>>;
/// Boxed future returned by [`RevocationClient::revoke`].
pub type RevokeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RevocationError>> + 'a + Send>>;

/// Performs the OAuth 2.0 refresh-token exchange for a session.
pub trait RefreshClient
where
	Self: Send + Sync,
{
	/// Exchanges the session's refresh token for a successor session.
	///
	/// Implementations must bound the call with a request timeout and surface timeouts as
	/// [`RefreshError::Timeout`] so the keeper can classify them as recoverable.
	fn refresh<'a>(&'a self, session: &'a Session) -> RefreshFuture<'a>;
}

/// Calls the provider's token revocation endpoint (RFC 7009), best effort.
pub trait RevocationClient
where
	Self: Send + Sync,
{
	/// Revokes a single token value. Failures are logged by the caller, never fatal.
	fn revoke<'a>(
		&'a self,
		registration: &'a RegistrationId,
		token: &'a TokenSecret,
		kind: TokenKind,
	) -> RevokeFuture<'a>;
}

/// Token classification forwarded as the RFC 7009 `token_type_hint`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
	/// An access token.
	Access,
	/// A refresh token.
	Refresh,
}
impl TokenKind {
	/// Returns the RFC 7009 `token_type_hint` value.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Access => "access_token",
			TokenKind::Refresh => "refresh_token",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Recoverability classification for a refresh failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshErrorKind {
	/// Safe to retry on a later cycle; the session stays enrolled.
	Transient,
	/// Terminal; the session is unenrolled and the user must re-authenticate.
	Permanent,
}

/// Failure reported by a [`RefreshClient`].
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Provider rejected the exchange with an OAuth error body.
	#[error("Provider rejected the refresh: {code}.")]
	Provider {
		/// OAuth error code reported by the provider.
		code: String,
		/// Optional human-readable description from the provider.
		description: Option<String>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned a response the client could not use.
	#[error("Token endpoint returned an unusable response: {message}.")]
	Response {
		/// Summary of what made the response unusable.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying transport reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Refresh call exceeded its request timeout.
	#[error("Refresh call timed out.")]
	Timeout,
}
impl RefreshError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Classifies the failure for the keeper's retry policy.
	///
	/// Provider `server_error`/`temporarily_unavailable`, plain 5xx responses, network failures,
	/// and timeouts are transient; every other rejection, along with malformed responses, is
	/// permanent.
	pub fn kind(&self) -> RefreshErrorKind {
		match self {
			Self::Provider { code, .. }
				if code == SERVER_ERROR || code == TEMPORARILY_UNAVAILABLE =>
				RefreshErrorKind::Transient,
			Self::Response { status: Some(status), .. } if *status >= 500 =>
				RefreshErrorKind::Transient,
			Self::Network { .. } | Self::Timeout => RefreshErrorKind::Transient,
			Self::Provider { .. } | Self::ResponseParse { .. } | Self::Response { .. } =>
				RefreshErrorKind::Permanent,
		}
	}
}

/// Failure reported by a [`RevocationClient`]; always non-fatal to the keeper.
#[derive(Debug, ThisError)]
pub enum RevocationError {
	/// The registration declares no revocation endpoint.
	#[error("Registration `{registration}` declares no revocation endpoint.")]
	MissingEndpoint {
		/// Registration identifier string.
		registration: String,
	},
	/// Revocation endpoint rejected the call.
	#[error("Revocation endpoint rejected the call with status {status}.")]
	Rejected {
		/// HTTP status code returned by the endpoint.
		status: u16,
	},
	/// Underlying transport reported a network failure.
	#[error("Network error occurred while calling the revocation endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl RevocationError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
