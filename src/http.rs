//! Reqwest-backed [`RefreshClient`] and [`RevocationClient`] implementations.
//!
//! One [`ReqwestTokenClient`] serves exactly one provider registration; refreshing sessions from
//! a different registration is out of scope for the keeper. Requests are bounded by a timeout and
//! never follow redirects, matching OAuth 2.0 guidance that token endpoints return results
//! directly instead of delegating to another URI.

// crates.io
use reqwest::{RequestBuilder, StatusCode, header, redirect};
// self
use crate::{
	_prelude::*,
	client::{
		RefreshClient, RefreshError, RefreshFuture, RevocationClient, RevocationError,
		RevokeFuture, TokenKind,
	},
	error::ConfigError,
	registration::{ClientAuthMethod, ProviderRegistration},
	session::{RegistrationId, Session, TokenSecret},
};

const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Successful token endpoint response view.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	expires_in: i64,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	refresh_expires_in: Option<i64>,
}

/// OAuth error body returned by token and revocation endpoints.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

/// Reqwest-backed client for the refresh-token grant and RFC 7009 revocation.
#[derive(Clone, Debug)]
pub struct ReqwestTokenClient {
	client: ReqwestClient,
	registration: ProviderRegistration,
}
impl ReqwestTokenClient {
	/// Creates a client for the provided registration with the default request timeout.
	pub fn new(registration: ProviderRegistration) -> Result<Self> {
		Self::with_timeout(registration, DEFAULT_REQUEST_TIMEOUT)
	}

	/// Creates a client with a caller-provided request timeout.
	pub fn with_timeout(
		registration: ProviderRegistration,
		timeout: std::time::Duration,
	) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self::with_client(client, registration))
	}

	/// Wraps an existing [`ReqwestClient`]. Configure it to bound requests with a timeout and to
	/// disable redirect following.
	pub fn with_client(client: ReqwestClient, registration: ProviderRegistration) -> Self {
		Self { client, registration }
	}

	fn apply_client_auth(
		&self,
		request: RequestBuilder,
		form: &mut Vec<(&'static str, String)>,
	) -> RequestBuilder {
		match self.registration.client_auth_method {
			ClientAuthMethod::ClientSecretBasic => request
				.basic_auth(&self.registration.client_id, Some(&self.registration.client_secret)),
			ClientAuthMethod::ClientSecretPost => {
				form.push(("client_id", self.registration.client_id.clone()));
				form.push(("client_secret", self.registration.client_secret.clone()));

				request
			},
		}
	}
}
impl RefreshClient for ReqwestTokenClient {
	fn refresh<'a>(&'a self, session: &'a Session) -> RefreshFuture<'a> {
		Box::pin(async move {
			let refresh_token =
				session.refresh_token.as_ref().ok_or_else(|| RefreshError::Response {
					message: "session carries no refresh token".into(),
					status: None,
				})?;
			let mut form = vec![
				("grant_type", "refresh_token".to_owned()),
				("refresh_token", refresh_token.expose().to_owned()),
			];
			let request = self
				.client
				.post(self.registration.token_endpoint.clone())
				.header(header::ACCEPT, "application/json");
			let request = self.apply_client_auth(request, &mut form);
			let response = request.form(&form).send().await.map_err(map_reqwest_error)?;
			let status = response.status();
			let bytes = response.bytes().await.map_err(map_reqwest_error)?;

			if status.is_success() {
				let parsed: TokenEndpointResponse = parse_json(&bytes, status)?;

				build_successor(session, refresh_token, parsed)
			} else {
				Err(map_error_body(status, &bytes))
			}
		})
	}
}
impl RevocationClient for ReqwestTokenClient {
	fn revoke<'a>(
		&'a self,
		registration: &'a RegistrationId,
		token: &'a TokenSecret,
		kind: TokenKind,
	) -> RevokeFuture<'a> {
		Box::pin(async move {
			let endpoint = self.registration.revocation_endpoint.clone().ok_or_else(|| {
				RevocationError::MissingEndpoint { registration: registration.to_string() }
			})?;
			let mut form = vec![
				("token", token.expose().to_owned()),
				("token_type_hint", kind.as_str().to_owned()),
			];
			let request = self.client.post(endpoint);
			let request = self.apply_client_auth(request, &mut form);
			let response = request.form(&form).send().await.map_err(RevocationError::network)?;
			let status = response.status();

			if status.is_success() {
				Ok(())
			} else {
				Err(RevocationError::Rejected { status: status.as_u16() })
			}
		})
	}
}

fn map_reqwest_error(err: ReqwestError) -> RefreshError {
	if err.is_timeout() { RefreshError::Timeout } else { RefreshError::network(err) }
}

fn parse_json<T>(bytes: &[u8], status: StatusCode) -> Result<T, RefreshError>
where
	T: serde::de::DeserializeOwned,
{
	let deserializer = &mut serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(deserializer)
		.map_err(|source| RefreshError::ResponseParse { source, status: Some(status.as_u16()) })
}

fn map_error_body(status: StatusCode, bytes: &[u8]) -> RefreshError {
	match parse_json::<OAuthErrorBody>(bytes, status) {
		Ok(body) =>
			RefreshError::Provider { code: body.error, description: body.error_description },
		Err(_) => RefreshError::Response {
			message: "token endpoint returned no OAuth error body".into(),
			status: Some(status.as_u16()),
		},
	}
}

fn build_successor(
	session: &Session,
	previous_refresh: &TokenSecret,
	response: TokenEndpointResponse,
) -> Result<Session, RefreshError> {
	if response.expires_in <= 0 {
		return Err(RefreshError::Response {
			message: "expires_in must be positive".into(),
			status: None,
		});
	}

	let now = OffsetDateTime::now_utc();
	let mut builder = Session::builder(session.registration.clone(), session.principal.clone())
		.access_token(response.access_token)
		.issued_at(now)
		.expires_in(Duration::seconds(response.expires_in));

	match response.refresh_token {
		Some(rotated) => {
			builder = builder.refresh_token(rotated);

			if let Some(refresh_expires_in) = response.refresh_expires_in {
				builder = builder.refresh_expires_at(now + Duration::seconds(refresh_expires_in));
			}
		},
		// Provider did not rotate; carry the previous refresh token forward.
		None => {
			builder = builder.refresh_token(previous_refresh.expose());

			if let Some(expiry) = session.refresh_expires_at {
				builder = builder.refresh_expires_at(expiry);
			}
		},
	}

	builder
		.build()
		.map_err(|err| RefreshError::Response { message: err.to_string(), status: None })
}
