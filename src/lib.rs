//! Background refresh keeper for OAuth 2.0 sessions: expiry-ordered scheduling, stale-login
//! reconciliation, and best-effort revocation of superseded tokens.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod keeper;
pub mod obs;
pub mod registration;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::session::{PrincipalName, RegistrationId, Session};

	/// Builds a refresh-eligible session fixture whose access token expires in `expires_in`.
	pub fn test_session(
		registration: &str,
		principal: &str,
		access: &str,
		refresh: &str,
		expires_in: Duration,
	) -> Session {
		let registration = RegistrationId::new(registration)
			.expect("Registration identifier fixture should be valid.");
		let principal =
			PrincipalName::new(principal).expect("Principal name fixture should be valid.");

		Session::builder(registration, principal)
			.access_token(access)
			.refresh_token(refresh)
			.issued_now()
			.expires_in(expires_in)
			.build()
			.expect("Session fixture should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, oauth2_keeper as _, tokio as _};
