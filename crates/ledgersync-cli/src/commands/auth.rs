//! Auth commands - Login, Logout, and Status for the Xero connection
//!
//! 1. `login`  - Runs the OAuth2 PKCE flow, picks a tenant and stores the
//!    connection in SQLite
//! 2. `logout` - Deletes the stored connection
//! 3. `status` - Shows the connection and token expiry

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use ledgersync_core::config::Config;
use ledgersync_core::usecases::ConnectionStatus;
use ledgersync_xero::auth::{OAuth2Config, XeroAuthAdapter};

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Connect to Xero via OAuth2
    Login {
        /// Tenant to connect when the login grants several organisations
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Remove the stored connection
    Logout,
    /// Check connection status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let ctx = CliContext::open(config).await?;
        let result = match self {
            AuthCommand::Login { tenant } => execute_login(&ctx, tenant.as_deref(), format).await,
            AuthCommand::Logout => execute_logout(&ctx, format).await,
            AuthCommand::Status => execute_status(&ctx, format).await,
        };
        ctx.close().await;
        result
    }
}

async fn execute_login(ctx: &CliContext, tenant: Option<&str>, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let oauth = OAuth2Config::from_config(&ctx.config.xero)
        .context("Set xero.client_id in config.yaml or LEDGERSYNC_XERO_CLIENT_ID")?;
    let tokens = ctx.tokens()?;

    fmt.info("Opening browser for Xero login...");
    let outcome = XeroAuthAdapter::new(oauth)
        .login(tenant, |url| fmt.info(&format!("If the browser did not open, visit: {url}")))
        .await
        .context("OAuth2 login failed")?;

    let connection = tokens
        .connect(outcome.tenant.tenant_id.clone(), outcome.tokens)
        .await?;
    let tenant_name = outcome.tenant.tenant_name.unwrap_or_default();
    info!(tenant_id = %connection.tenant_id, "Connected");

    if format.is_json() {
        fmt.print_json(&json!({
            "success": true,
            "tenant_id": connection.tenant_id,
            "tenant_name": tenant_name,
            "access_expires_at": connection.access_expires_at,
            "refresh_expires_at": connection.refresh_expires_at,
        }));
    } else {
        fmt.success(&format!("Connected to {tenant_name} ({})", connection.tenant_id));
        fmt.field(
            "Reconnect before",
            &connection.refresh_expires_at.format("%Y-%m-%d").to_string(),
        );
    }
    Ok(())
}

async fn execute_logout(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let removed = ctx.stored_tokens()?.disconnect().await?;

    if format.is_json() {
        fmt.print_json(&json!({"success": true, "removed": removed}));
    } else if removed {
        fmt.success("Disconnected from Xero");
    } else {
        fmt.info("No connection stored. Nothing to log out.");
    }
    Ok(())
}

async fn execute_status(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let tokens = ctx.stored_tokens()?;
    let status = tokens.status().await?;

    if format.is_json() {
        fmt.print_json(&status_json(tokens.user_id().as_str(), &status));
        return Ok(());
    }

    match status {
        ConnectionStatus::NotConnected => {
            fmt.warn("Not connected. Run 'ledgersync auth login' first.");
        }
        ConnectionStatus::Expired { tenant_id } => {
            fmt.warn(&format!(
                "Connection to {tenant_id} expired. Run 'ledgersync auth login' again."
            ));
        }
        ConnectionStatus::Connected {
            tenant_id,
            access_expires_at,
            refresh_expires_at,
        } => {
            fmt.success(&format!("Connected to {tenant_id}"));
            let access = if access_expires_at > Utc::now() {
                access_expires_at.to_rfc3339()
            } else {
                "expired (refreshed on next use)".to_string()
            };
            fmt.field("Access token", &access);
            fmt.field("Reconnect before", &refresh_expires_at.to_rfc3339());
        }
    }
    Ok(())
}

fn status_json(user: &str, status: &ConnectionStatus) -> serde_json::Value {
    match status {
        ConnectionStatus::NotConnected => json!({"user": user, "connected": false}),
        ConnectionStatus::Expired { tenant_id } => json!({
            "user": user,
            "connected": false,
            "expired": true,
            "tenant_id": tenant_id,
        }),
        ConnectionStatus::Connected {
            tenant_id,
            access_expires_at,
            refresh_expires_at,
        } => json!({
            "user": user,
            "connected": true,
            "tenant_id": tenant_id,
            "access_expires_at": access_expires_at,
            "refresh_expires_at": refresh_expires_at,
        }),
    }
}
