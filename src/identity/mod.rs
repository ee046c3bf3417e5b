//! Logging identity bootstrap.
//!
//! Every attendance record carries the identity that wrote it. A user id can
//! be pre-supplied via config or the ROLLCALL_USER environment variable;
//! otherwise an anonymous id is generated once and persisted under the data
//! dir so it stays stable across restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::config::IdentityConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub anonymous: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    user_id: String,
}

/// Resolve the logging identity for this session.
pub fn resolve(config: &IdentityConfig) -> Result<Identity> {
    info!("Authenticating...");

    let identity_path = crate::global::identity_file()?;

    let env_user = std::env::var("ROLLCALL_USER").ok().filter(|u| !u.trim().is_empty());
    let identity = match env_user {
        Some(user_id) => Identity {
            user_id: user_id.trim().to_string(),
            anonymous: false,
        },
        None => resolve_with_path(config, &identity_path)?,
    };

    if identity.anonymous {
        info!("Authenticated as anonymous user {}", identity.user_id);
    } else {
        info!("Authenticated as {}", identity.user_id);
    }

    Ok(identity)
}

fn resolve_with_path(config: &IdentityConfig, identity_path: &Path) -> Result<Identity> {
    if let Some(user_id) = &config.user_id {
        if !user_id.trim().is_empty() {
            return Ok(Identity {
                user_id: user_id.trim().to_string(),
                anonymous: false,
            });
        }
    }

    anonymous_identity(identity_path)
}

/// Load the persisted anonymous id, creating it on first use.
fn anonymous_identity(identity_path: &Path) -> Result<Identity> {
    if identity_path.exists() {
        let content = std::fs::read_to_string(identity_path)
            .context("Failed to read identity file")?;
        if let Ok(stored) = serde_json::from_str::<StoredIdentity>(&content) {
            return Ok(Identity {
                user_id: stored.user_id,
                anonymous: true,
            });
        }
        // Corrupt identity file: fall through and regenerate.
    }

    let stored = StoredIdentity {
        user_id: format!("anon-{}", Uuid::new_v4()),
    };

    if let Some(parent) = identity_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    std::fs::write(
        identity_path,
        serde_json::to_string_pretty(&stored).context("Failed to serialize identity")?,
    )
    .context("Failed to persist anonymous identity")?;

    Ok(Identity {
        user_id: stored.user_id,
        anonymous: true,
    })
}
