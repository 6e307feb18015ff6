//! Keeper-level error types shared across the scheduler, clients, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical keeper error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Refresh exchange failure reported by the provider or transport.
	#[error(transparent)]
	Refresh(#[from] crate::client::RefreshError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Session cannot be enrolled for automatic refresh.
	#[error("Session is not eligible for automatic refresh: {reason}.")]
	IneligibleSession {
		/// Human-readable explanation of the eligibility failure.
		reason: String,
	},
}

/// Configuration and validation failures raised by the keeper.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Provider registration validation failed.
	#[error("Provider registration is invalid.")]
	InvalidRegistration(#[from] crate::registration::RegistrationError),
	/// Session builder validation failed.
	#[error("Unable to build session.")]
	SessionBuild(#[from] crate::session::SessionBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
