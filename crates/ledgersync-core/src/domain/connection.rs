//! OAuth connection entity
//!
//! One [`OAuthConnection`] exists per authenticated user. It is created by
//! the login flow, mutated by token refreshes and removed on disconnect.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::UserId;

/// Stored OAuth credentials for the accounting API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConnection {
    pub user_id: UserId,
    /// Upstream organisation the tokens are scoped to
    pub tenant_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthConnection {
    /// Returns true once the refresh token itself can no longer be used
    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    /// Returns true if the access token expires within `margin` of `now`
    pub fn access_expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.access_expires_at
    }

    /// The credentials a fetcher needs
    pub fn grant(&self) -> AccessGrant {
        AccessGrant {
            access_token: self.access_token.clone(),
            tenant_id: self.tenant_id.clone(),
        }
    }
}

// Tokens never reach log output.
impl std::fmt::Debug for OAuthConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConnection")
            .field("user_id", &self.user_id)
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// A usable access token together with its tenant
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub tenant_id: String,
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}
