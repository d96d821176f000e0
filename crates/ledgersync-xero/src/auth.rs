//! OAuth2 flows for Xero
//!
//! Implements the Authorization Code flow with PKCE for the interactive
//! login, and the `refresh_token` grant used by the token lifecycle.
//! Xero's token endpoint expects the client credentials as HTTP Basic
//! auth, which is the `oauth2` crate's default.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Endpoints, client credentials and scopes
//! - [`OAuthFlow`] - Authorization URL generation, code exchange, refresh
//! - [`XeroTokenEndpoint`] - [`ITokenEndpoint`] adapter (single attempt)
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`XeroAuthAdapter`] - Orchestrates login and tenant lookup

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ledgersync_core::config::XeroConfig;
use ledgersync_core::ports::{ITokenEndpoint, ProviderError, RefreshedTokens};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    HttpClientError, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use tracing::{debug, info, warn};

use crate::client::{TenantConnection, XeroClient};

/// Path the local callback server answers on
const CALLBACK_PATH: &str = "/callback";

/// Access-token lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 1800;

/// Tenant type of a Xero organisation (as opposed to a practice)
const ORGANISATION_TENANT: &str = "ORGANISATION";

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the Xero OAuth2 flows
#[derive(Clone)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub connections_url: String,
    pub redirect_port: u16,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("redirect_port", &self.redirect_port)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuth2Config {
    /// Builds the OAuth configuration from the `xero` config section
    ///
    /// # Errors
    /// Returns an error when no client id is configured.
    pub fn from_config(config: &XeroConfig) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .context("Xero client id is not configured (xero.client_id or LEDGERSYNC_XERO_CLIENT_ID)")?;

        Ok(Self {
            client_id,
            client_secret: config.client_secret.clone().filter(|s| !s.is_empty()),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            connections_url: config.connections_url.clone(),
            redirect_port: config.redirect_port,
            scopes: config.scopes.clone(),
        })
    }

    /// Redirect URI registered with the Xero app
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.redirect_port, CALLBACK_PATH)
    }
}

// ============================================================================
// OAuthFlow
// ============================================================================

/// OAuth2 flow implementation using the `oauth2` crate
pub struct OAuthFlow {
    client: ConfiguredClient,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl OAuthFlow {
    /// Creates a flow for the given configuration
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(config.authorize_url.clone()).context("Invalid authorization URL")?,
            )
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri()).context("Invalid redirect URI")?,
            );
        if let Some(secret) = &config.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        // The token endpoint must not be followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client for the token endpoint")?;

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            http,
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// Returns `(authorization_url, csrf_token, pkce_verifier)`. The
    /// verifier must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<RefreshedTokens, ProviderError> {
        info!("Exchanging authorization code for tokens");
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        Ok(to_refreshed(&response))
    }

    /// Exchanges a refresh token for a new token pair, one attempt only
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ProviderError> {
        info!("Refreshing access token");
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        Ok(to_refreshed(&response))
    }
}

fn to_refreshed(response: &BasicTokenResponse) -> RefreshedTokens {
    RefreshedTokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
        expires_in: response
            .expires_in()
            .map(|d| d.as_secs())
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
    }
}

fn map_token_error(
    err: RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>,
) -> ProviderError {
    match err {
        RequestTokenError::ServerResponse(response) => ProviderError::Unauthorized {
            status: 400,
            message: response.to_string(),
        },
        RequestTokenError::Request(e) => ProviderError::Network(e.to_string()),
        RequestTokenError::Parse(e, _body) => ProviderError::Decode(e.to_string()),
        RequestTokenError::Other(message) => ProviderError::Http {
            status: 0,
            message,
        },
    }
}

// ============================================================================
// XeroTokenEndpoint
// ============================================================================

/// Token endpoint adapter for the token lifecycle
///
/// No retry: a failed refresh surfaces immediately so the caller can ask
/// for a reconnect.
pub struct XeroTokenEndpoint {
    flow: OAuthFlow,
}

impl XeroTokenEndpoint {
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        Ok(Self {
            flow: OAuthFlow::new(config)?,
        })
    }
}

#[async_trait]
impl ITokenEndpoint for XeroTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ProviderError> {
        self.flow.refresh(refresh_token).await
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Minimal HTTP server that listens on localhost for the OAuth2 redirect
///
/// Serves connections until one carries an authorization code (browsers
/// may probe `/favicon.ico` first), answers it with a success page and
/// stops.
pub struct LocalCallbackServer;

/// Parameters extracted from the OAuth2 callback
#[derive(Debug)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl LocalCallbackServer {
    /// Listens on `127.0.0.1:{port}` and waits for the OAuth redirect
    pub async fn start(port: u16) -> Result<CallbackParams> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{header, Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::{oneshot, Mutex};

        let addr = format!("127.0.0.1:{port}");
        info!(%addr, "Starting local OAuth callback server");

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind callback server to {addr}"))?;

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let accept_loop = tokio::spawn(async move {
            loop {
                let (stream, _peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Callback server accept failed");
                        return;
                    }
                };
                let tx = tx.clone();
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let tx = tx.clone();
                    async move {
                        let uri = req.uri().to_string();
                        debug!(%uri, "Callback server received request");

                        let (status, html) = match parse_callback_params(&uri) {
                            Some(params) => {
                                if let Some(sender) = tx.lock().await.take() {
                                    let _ = sender.send(params);
                                }
                                (StatusCode::OK, success_html())
                            }
                            None => (
                                StatusCode::BAD_REQUEST,
                                error_html("Missing authorization code in callback"),
                            ),
                        };

                        let mut response = Response::new(Full::new(Bytes::from(html)));
                        *response.status_mut() = status;
                        response.headers_mut().insert(
                            header::CONTENT_TYPE,
                            header::HeaderValue::from_static("text/html; charset=utf-8"),
                        );
                        Ok::<_, hyper::Error>(response)
                    }
                });

                tokio::spawn(async move {
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        warn!(error = %e, "Callback server connection error");
                    }
                });
            }
        });

        let params = rx.await;
        accept_loop.abort();
        let params =
            params.context("Callback server closed without receiving an authorization code")?;

        info!("Received OAuth callback with authorization code");
        Ok(params)
    }
}

/// Parses the authorization code and state from a callback URI
///
/// Only requests to the callback path count.
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackParams {
        code: code.filter(|c| !c.is_empty())?,
        state: state.unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Ledgersync - Connected</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Connected to Xero</h1>
    <p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Ledgersync - Connection Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Connection Error</h1>
    <p>{message}</p>
</body>
</html>"#
    )
}

// ============================================================================
// Tenant selection
// ============================================================================

/// Picks the tenant to sync from `GET /connections`
///
/// An explicitly requested tenant id wins; otherwise the first
/// organisation, otherwise the first connection.
pub fn select_tenant(
    connections: &[TenantConnection],
    preferred: Option<&str>,
) -> Option<TenantConnection> {
    if let Some(id) = preferred {
        return connections.iter().find(|c| c.tenant_id == id).cloned();
    }
    connections
        .iter()
        .find(|c| c.tenant_type.as_deref() == Some(ORGANISATION_TENANT))
        .or_else(|| connections.first())
        .cloned()
}

// ============================================================================
// XeroAuthAdapter
// ============================================================================

/// Result of a completed interactive login
#[derive(Debug)]
pub struct LoginOutcome {
    pub tokens: RefreshedTokens,
    pub tenant: TenantConnection,
}

/// Orchestrates the interactive login
///
/// 1. Generates a PKCE authorization URL
/// 2. Opens the browser (the URL is also handed to `on_url`)
/// 3. Waits for the redirect on the local callback server
/// 4. Checks the CSRF state and exchanges the code for tokens
/// 5. Looks up the tenant the tokens grant access to
pub struct XeroAuthAdapter {
    config: OAuth2Config,
}

impl XeroAuthAdapter {
    pub fn new(config: OAuth2Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    pub async fn login(
        &self,
        preferred_tenant: Option<&str>,
        on_url: impl FnOnce(&str),
    ) -> Result<LoginOutcome> {
        info!("Starting OAuth2 PKCE login flow");
        let flow = OAuthFlow::new(&self.config)?;

        let (auth_url, csrf_token, pkce_verifier) = flow.generate_auth_url();
        on_url(&auth_url);
        if let Err(e) = webbrowser::open(&auth_url) {
            warn!(error = %e, "Could not open a browser; open the printed URL manually");
        }

        let callback = LocalCallbackServer::start(self.config.redirect_port).await?;
        if callback.state != *csrf_token.secret() {
            bail!("OAuth state mismatch; the callback did not originate from this login");
        }

        let tokens = flow
            .exchange_code(callback.code, pkce_verifier)
            .await
            .context("Failed to exchange authorization code")?;

        let connections = XeroClient::new()
            .get_connections(&self.config.connections_url, &tokens.access_token)
            .await
            .context("Failed to list Xero connections")?;
        let tenant = select_tenant(&connections, preferred_tenant).with_context(|| {
            match preferred_tenant {
                Some(id) => format!("Tenant {id} is not among the authorised connections"),
                None => "The login did not authorise any Xero organisation".to_string(),
            }
        })?;

        info!(
            tenant_id = %tenant.tenant_id,
            tenant_name = tenant.tenant_name.as_deref().unwrap_or(""),
            "OAuth2 login completed"
        );
        Ok(LoginOutcome { tokens, tenant })
    }
}
