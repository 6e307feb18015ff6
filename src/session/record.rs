//! Session record struct, refresh-eligibility helpers, and builder.

// self
use crate::{
	_prelude::*,
	session::{
		id::{PrincipalName, RegistrationId},
		secret::TokenSecret,
	},
};

/// Errors produced by [`SessionBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Unique key identifying a stored session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
	/// Provider registration component.
	pub registration: RegistrationId,
	/// Principal name component.
	pub principal: PrincipalName,
}
impl SessionKey {
	/// Builds a key from the provided registration and principal.
	pub fn new(registration: RegistrationId, principal: PrincipalName) -> Self {
		Self { registration, principal }
	}
}

/// One user's authorization grant for one provider registration.
#[derive(Serialize, Deserialize, Clone)]
pub struct Session {
	/// Identifier of the provider registration that minted the tokens.
	pub registration: RegistrationId,
	/// Stable identifier of the authenticated user.
	pub principal: PrincipalName,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Issued-at instant recorded from the provider response.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in or absolute expiry.
	pub expires_at: OffsetDateTime,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Refresh token expiry instant, when the provider reports one.
	pub refresh_expires_at: Option<OffsetDateTime>,
}
impl Session {
	/// Returns a builder for the provided registration and principal.
	pub fn builder(registration: RegistrationId, principal: PrincipalName) -> SessionBuilder {
		SessionBuilder::new(registration, principal)
	}

	/// Returns the store key for this session.
	pub fn key(&self) -> SessionKey {
		SessionKey::new(self.registration.clone(), self.principal.clone())
	}

	/// Returns `true` if the session can be refreshed automatically at the provided instant.
	///
	/// A session with no refresh token, or whose refresh token has already expired, can only be
	/// renewed by a fresh interactive login.
	pub fn refresh_eligible_at(&self, instant: OffsetDateTime) -> bool {
		if self.refresh_token.is_none() {
			return false;
		}

		match self.refresh_expires_at {
			Some(expiry) => instant < expiry,
			None => true,
		}
	}

	/// Convenience helper that checks eligibility against the current UTC instant.
	pub fn refresh_eligible(&self) -> bool {
		self.refresh_eligible_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if both sessions carry the same refresh token value.
	///
	/// Used by the keeper's staleness check: a queued session whose refresh token no longer
	/// matches the stored one has been superseded by a concurrent interactive login.
	pub fn same_refresh_token(&self, other: &Session) -> bool {
		match (self.refresh_token.as_ref(), other.refresh_token.as_ref()) {
			(Some(a), Some(b)) => a.same_value(b),
			(None, None) => true,
			_ => false,
		}
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("registration", &self.registration)
			.field("principal", &self.principal)
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_expires_at", &self.refresh_expires_at)
			.finish()
	}
}

/// Builder for [`Session`].
#[derive(Clone, Debug)]
pub struct SessionBuilder {
	registration: RegistrationId,
	principal: PrincipalName,
	access_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	refresh_token: Option<TokenSecret>,
	refresh_expires_at: Option<OffsetDateTime>,
}
impl SessionBuilder {
	fn new(registration: RegistrationId, principal: PrincipalName) -> Self {
		Self {
			registration,
			principal,
			access_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			refresh_token: None,
			refresh_expires_at: None,
		}
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Convenience helper that stamps `issued_at` with the current clock.
	pub fn issued_now(self) -> Self {
		self.issued_at(OffsetDateTime::now_utc())
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token expiry instant.
	pub fn refresh_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.refresh_expires_at = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`Session`].
	pub fn build(self) -> Result<Session, SessionBuilderError> {
		let access_token = self.access_token.ok_or(SessionBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(SessionBuilderError::MissingExpiry),
		};

		Ok(Session {
			registration: self.registration,
			principal: self.principal,
			access_token,
			issued_at,
			expires_at,
			refresh_token: self.refresh_token,
			refresh_expires_at: self.refresh_expires_at,
		})
	}
}
