//! Provider registration configuration consumed by the built-in token client.
//!
//! A registration identifies one configured authorization server: client credentials, the token
//! endpoint used for refresh exchanges, and the optional revocation endpoint used for best-effort
//! cleanup of superseded tokens.

// self
use crate::{_prelude::*, session::RegistrationId};

/// Client authentication modes for token and revocation endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Errors raised while constructing or validating registrations.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum RegistrationError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Confidential client authentication requires a secret.
	#[error("Client authentication method requires a client secret.")]
	MissingClientSecret,
	/// Client identifier must be non-empty.
	#[error("Client identifier cannot be empty.")]
	EmptyClientId,
	/// Endpoints must use HTTPS outside of loopback hosts.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Immutable provider registration consumed by the token client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRegistration {
	/// Registration identifier.
	pub id: RegistrationId,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret; both supported authentication methods are confidential.
	pub client_secret: String,
	/// Token endpoint used for refresh exchanges.
	pub token_endpoint: Url,
	/// Optional revocation endpoint (RFC 7009).
	pub revocation_endpoint: Option<Url>,
	/// Client authentication mechanism applied to both endpoints.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderRegistration {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: RegistrationId) -> ProviderRegistrationBuilder {
		ProviderRegistrationBuilder::new(id)
	}

	fn validate(&self) -> Result<(), RegistrationError> {
		if self.client_id.is_empty() {
			return Err(RegistrationError::EmptyClientId);
		}

		validate_endpoint("token", &self.token_endpoint)?;

		if let Some(revocation) = self.revocation_endpoint.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}

		Ok(())
	}
}

/// Builder for [`ProviderRegistration`] values.
#[derive(Debug)]
pub struct ProviderRegistrationBuilder {
	/// Identifier for the registration being constructed.
	pub id: RegistrationId,
	/// OAuth 2.0 client identifier.
	pub client_id: Option<String>,
	/// Optional client secret.
	pub client_secret: Option<String>,
	/// Token endpoint used for refresh exchanges.
	pub token_endpoint: Option<Url>,
	/// Optional revocation endpoint.
	pub revocation_endpoint: Option<Url>,
	/// Client authentication mechanism.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderRegistrationBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: RegistrationId) -> Self {
		Self {
			id,
			client_id: None,
			client_secret: None,
			token_endpoint: None,
			revocation_endpoint: None,
			client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, value: impl Into<String>) -> Self {
		self.client_id = Some(value.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, value: impl Into<String>) -> Self {
		self.client_secret = Some(value.into());

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the optional revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting registration.
	pub fn build(self) -> Result<ProviderRegistration, RegistrationError> {
		let client_id = self.client_id.ok_or(RegistrationError::EmptyClientId)?;
		let client_secret = self.client_secret.ok_or(RegistrationError::MissingClientSecret)?;
		let token_endpoint =
			self.token_endpoint.ok_or(RegistrationError::MissingTokenEndpoint)?;
		let registration = ProviderRegistration {
			id: self.id,
			client_id,
			client_secret,
			token_endpoint,
			revocation_endpoint: self.revocation_endpoint,
			client_auth_method: self.client_auth_method,
		};

		registration.validate()?;

		Ok(registration)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), RegistrationError> {
	if url.scheme() == "https" || is_loopback_host(url) {
		Ok(())
	} else {
		Err(RegistrationError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

// Local providers and mock servers listen on loopback over plain HTTP.
fn is_loopback_host(url: &Url) -> bool {
	matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}
