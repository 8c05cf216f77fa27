//! UAA login
//!
//! The API root (`GET /`) advertises the login server. Tokens are requested
//! from `{login}/oauth/token` with either the password grant (as the `cf`
//! CLI client) or the client credentials grant.

use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::client::{build_http_client, error_from_response, Client, ClientConfig};
use super::common::Link;
use super::error::ApiError;

#[derive(Clone)]
pub enum Credentials {
    AccessToken(String),
    Password {
        user: String,
        password: String,
        origin: Option<String>,
    },
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AccessToken(_) => write!(f, "AccessToken(***)"),
            Credentials::Password { user, origin, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("origin", origin)
                .finish_non_exhaustive(),
            Credentials::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RootInfo {
    links: RootLinks,
}

#[derive(Debug, Deserialize)]
struct RootLinks {
    login: Option<Link>,
    uaa: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl Client {
    /// Authenticate against the UAA advertised by `api_url` and build a client
    pub async fn login(
        api_url: &str,
        credentials: &Credentials,
        config: ClientConfig,
    ) -> Result<Self, ApiError> {
        if let Credentials::AccessToken(token) = credentials {
            return Self::with_config(api_url, token, config);
        }

        let http = build_http_client(&config)?;
        let login_url = discover_login_url(&http, api_url).await?;
        tracing::debug!("Requesting token from: {}", login_url);
        let token = request_token(&http, &login_url, credentials).await?;

        Self::with_config(api_url, &token.access_token, config)
    }
}

async fn discover_login_url(http: &reqwest::Client, api_url: &str) -> Result<String, ApiError> {
    let url = format!("{}/", api_url.trim_end_matches('/'));
    let response = http.get(&url).header(ACCEPT, "application/json").send().await?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let root: RootInfo = response
        .json()
        .await
        .map_err(|e| ApiError::ParseError(format!("Invalid API root document: {}", e)))?;

    root.links
        .login
        .or(root.links.uaa)
        .map(|link| link.href.trim_end_matches('/').to_string())
        .ok_or_else(|| ApiError::AuthError("API root does not advertise a login server".to_string()))
}

async fn request_token(
    http: &reqwest::Client,
    login_url: &str,
    credentials: &Credentials,
) -> Result<TokenResponse, ApiError> {
    let url = format!("{}/oauth/token", login_url);

    let request = match credentials {
        Credentials::Password {
            user,
            password,
            origin,
        } => {
            let mut form = vec![
                ("grant_type", "password".to_string()),
                ("username", user.clone()),
                ("password", password.clone()),
            ];
            if let Some(origin) = origin {
                form.push(("login_hint", format!(r#"{{"origin":"{}"}}"#, origin)));
            }
            http.post(&url).basic_auth("cf", Some("")).form(&form)
        }
        Credentials::ClientCredentials {
            client_id,
            client_secret,
        } => http
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")]),
        Credentials::AccessToken(_) => {
            return Err(ApiError::InvalidInput(
                "access tokens are not exchanged with UAA".to_string(),
            ))
        }
    };

    let response = request.header(ACCEPT, "application/json").send().await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::error!("Token request failed with {}: {}", status, text);
        return Err(ApiError::AuthError(format!(
            "token request returned {}: {}",
            status, text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ApiError::ParseError(format!("Invalid token response: {}", e)))
}
