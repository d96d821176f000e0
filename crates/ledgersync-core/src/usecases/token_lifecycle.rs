//! Token lifecycle use case
//!
//! Keeps the stored OAuth connection usable: hands out a valid access
//! token, refreshes it proactively shortly before it expires, and fails
//! closed once the refresh token itself has expired. Delegates the token
//! exchange to the token endpoint port and persistence to the record
//! store port.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::AuthConfig,
    domain::{AccessGrant, DomainError, OAuthConnection, UserId},
    ports::{IRecordStore, ITokenEndpoint, ProviderError, RefreshedTokens},
};

/// Default window before access-token expiry in which a refresh happens
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Default lifetime of a newly issued refresh token
pub const DEFAULT_REFRESH_TOKEN_LIFETIME_DAYS: i64 = 60;

/// Upper bound applied to endpoint-reported access-token lifetimes
const MAX_ACCESS_LIFETIME_SECS: u64 = 24 * 60 * 60;

fn access_lifetime(expires_in: u64) -> Duration {
    Duration::seconds(expires_in.min(MAX_ACCESS_LIFETIME_SECS) as i64)
}

/// Errors from [`TokenLifecycle::get_valid_access_token`]
#[derive(Debug, Error)]
pub enum TokenError {
    /// The refresh exchange failed; the user must reconnect
    #[error("token refresh failed, reconnect required: {0}")]
    RefreshFailed(#[source] ProviderError),

    /// Reading or writing the connection failed
    #[error("connection store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

/// State of the stored connection, for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotConnected,
    /// The refresh token expired; a new login is needed
    Expired { tenant_id: String },
    Connected {
        tenant_id: String,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    },
}

/// Use case for the access-token lifecycle of one user
pub struct TokenLifecycle {
    store: Arc<dyn IRecordStore>,
    endpoint: Arc<dyn ITokenEndpoint>,
    user_id: UserId,
    refresh_margin: Duration,
    refresh_token_lifetime: Duration,
}

impl TokenLifecycle {
    /// Creates a lifecycle with the default refresh margin and lifetime
    pub fn new(
        store: Arc<dyn IRecordStore>,
        endpoint: Arc<dyn ITokenEndpoint>,
        user_id: UserId,
    ) -> Self {
        Self {
            store,
            endpoint,
            user_id,
            refresh_margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
            refresh_token_lifetime: Duration::days(DEFAULT_REFRESH_TOKEN_LIFETIME_DAYS),
        }
    }

    /// Creates a lifecycle for the user and timings in `auth`
    pub fn from_config(
        store: Arc<dyn IRecordStore>,
        endpoint: Arc<dyn ITokenEndpoint>,
        auth: &AuthConfig,
    ) -> Result<Self, DomainError> {
        let user_id = UserId::new(auth.user_id.clone())?;
        Ok(Self::new(store, endpoint, user_id)
            .with_refresh_margin(Duration::seconds(auth.refresh_margin_secs as i64))
            .with_refresh_token_lifetime(Duration::days(i64::from(
                auth.refresh_token_lifetime_days,
            ))))
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns a usable access token, refreshing it first if needed
    ///
    /// - `Ok(None)` when there is no connection or its refresh token has
    ///   expired; the caller treats this as "not connected".
    /// - A refresh is attempted once when the access token expires within
    ///   the refresh margin. Failure is returned as
    ///   [`TokenError::RefreshFailed`] and is never retried here.
    pub async fn get_valid_access_token(&self) -> Result<Option<AccessGrant>, TokenError> {
        self.get_valid_access_token_at(Utc::now()).await
    }

    /// [`Self::get_valid_access_token`] evaluated at `now`
    pub async fn get_valid_access_token_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessGrant>, TokenError> {
        let Some(connection) = self
            .store
            .get_connection(&self.user_id)
            .await
            .map_err(TokenError::Store)?
        else {
            debug!(user = %self.user_id, "No stored connection");
            return Ok(None);
        };

        if connection.is_refresh_expired(now) {
            warn!(
                user = %self.user_id,
                refresh_expires_at = %connection.refresh_expires_at,
                "Refresh token expired; reconnect required"
            );
            return Ok(None);
        }

        if !connection.access_expires_within(now, self.refresh_margin) {
            return Ok(Some(connection.grant()));
        }

        info!(
            user = %self.user_id,
            access_expires_at = %connection.access_expires_at,
            "Access token expiring, refreshing"
        );

        let tokens = self
            .endpoint
            .refresh(&connection.refresh_token)
            .await
            .map_err(|e| {
                warn!(user = %self.user_id, error = %e, "Token refresh failed");
                TokenError::RefreshFailed(e)
            })?;

        let refreshed = self.apply_refresh(connection, tokens, now);
        self.store
            .save_connection(&refreshed)
            .await
            .map_err(TokenError::Store)?;

        debug!(
            user = %self.user_id,
            access_expires_at = %refreshed.access_expires_at,
            "Persisted refreshed tokens"
        );
        Ok(Some(refreshed.grant()))
    }

    fn apply_refresh(
        &self,
        previous: OAuthConnection,
        tokens: RefreshedTokens,
        now: DateTime<Utc>,
    ) -> OAuthConnection {
        // A kept refresh token keeps its original expiry
        let (refresh_token, refresh_expires_at) = match tokens.refresh_token {
            Some(rotated) => (rotated, now + self.refresh_token_lifetime),
            None => (previous.refresh_token, previous.refresh_expires_at),
        };
        OAuthConnection {
            access_expires_at: now + access_lifetime(tokens.expires_in),
            access_token: tokens.access_token,
            refresh_token,
            refresh_expires_at,
            updated_at: now,
            ..previous
        }
    }

    /// Stores a connection obtained from a completed login
    pub async fn connect(
        &self,
        tenant_id: impl Into<String>,
        tokens: RefreshedTokens,
    ) -> anyhow::Result<OAuthConnection> {
        let now = Utc::now();
        let refresh_token = tokens
            .refresh_token
            .clone()
            .context("Login did not return a refresh token (is 'offline_access' requested?)")?;

        let connection = OAuthConnection {
            user_id: self.user_id.clone(),
            tenant_id: tenant_id.into(),
            access_expires_at: now + access_lifetime(tokens.expires_in),
            access_token: tokens.access_token,
            refresh_token,
            refresh_expires_at: now + self.refresh_token_lifetime,
            updated_at: now,
        };

        self.store
            .save_connection(&connection)
            .await
            .context("Failed to persist connection")?;
        info!(user = %self.user_id, tenant = %connection.tenant_id, "Connection stored");
        Ok(connection)
    }

    /// Deletes the stored connection; returns whether one existed
    pub async fn disconnect(&self) -> anyhow::Result<bool> {
        let removed = self
            .store
            .delete_connection(&self.user_id)
            .await
            .context("Failed to delete connection")?;
        if removed {
            info!(user = %self.user_id, "Connection removed");
        }
        Ok(removed)
    }

    /// Describes the stored connection without refreshing it
    pub async fn status(&self) -> anyhow::Result<ConnectionStatus> {
        let connection = self
            .store
            .get_connection(&self.user_id)
            .await
            .context("Failed to read connection")?;

        Ok(match connection {
            None => ConnectionStatus::NotConnected,
            Some(c) if c.is_refresh_expired(Utc::now()) => ConnectionStatus::Expired {
                tenant_id: c.tenant_id,
            },
            Some(c) => ConnectionStatus::Connected {
                tenant_id: c.tenant_id,
                access_expires_at: c.access_expires_at,
                refresh_expires_at: c.refresh_expires_at,
            },
        })
    }
}
