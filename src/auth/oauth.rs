use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::http::header::{HeaderMap, HeaderName, HeaderValue};
use oauth2::http::StatusCode;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::error::{Error, Result};
use crate::mail::graph_client::log_response;

pub const DEFAULT_TOKEN_URL: &str =
    "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
const AUTH_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize";

/// Scopes requested on every renewal.
pub const MAIL_SCOPES: [&str; 2] = ["https://graph.microsoft.com/Mail.Read", "offline_access"];

/// Tokens returned by a refresh (in-memory)
#[derive(Debug, Clone, PartialEq)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// Something that can trade a refresh token for a new access token.
pub trait TokenEndpoint {
    fn refresh(&self, refresh_token: &str) -> Result<Tokens>;
}

/// Refresh-token grant against the Microsoft identity platform.
pub struct OAuthTokenEndpoint {
    client: BasicClient,
    http: Client,
    debug: bool,
}

impl OAuthTokenEndpoint {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        timeout: Duration,
        debug: bool,
    ) -> Result<Self> {
        let auth_url = AuthUrl::new(AUTH_URL.to_string())
            .map_err(|e| Error::Configuration(vec![format!("invalid auth url: {e}")]))?;
        let token_url = TokenUrl::new(token_url.to_string())
            .map_err(|e| Error::Configuration(vec![format!("invalid token_url: {e}")]))?;

        // Microsoft expects client_id/client_secret in the form body.
        let client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        // Redirects are not followed on token requests.
        let http = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            http,
            debug,
        })
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::AuthRenewal(e.to_string()))?;
        let mut builder = self
            .http
            .request(method, request.url.as_str())
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_bytes());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }
        let body = response.bytes()?.to_vec();
        log_response(status, &body, self.debug);

        Ok(HttpResponse {
            status_code: StatusCode::from_u16(status)
                .map_err(|e| Error::InvalidResponse(e.to_string()))?,
            headers,
            body,
        })
    }
}

impl TokenEndpoint for OAuthTokenEndpoint {
    fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let mut request = self.client.exchange_refresh_token(&refresh_token);
        for scope in MAIL_SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let token = request
            .request(|req| self.send(req))
            .map_err(|e| {
                Error::AuthRenewal(match e {
                    RequestTokenError::ServerResponse(r) => r.to_string(),
                    RequestTokenError::Parse(err, _) => {
                        format!("token response without a usable access_token: {err}")
                    }
                    RequestTokenError::Request(err) => err.to_string(),
                    RequestTokenError::Other(msg) => msg,
                })
            })?;

        Ok(Tokens {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }
}
