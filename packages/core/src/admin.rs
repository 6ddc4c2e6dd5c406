//! Admin key service.
//!
//! Backs the gateway's `/admin/keys` routes without tying the store to an
//! HTTP framework. The route handler decodes the bearer token, builds a
//! [`Principal`] and forwards to [`KeyAdmin`]; the returned
//! [`AdminResponse`] carries the status code and JSON body to send back.
//!
//! | Route                         | Method                  |
//! |-------------------------------|-------------------------|
//! | `GET /admin/keys`             | [`KeyAdmin::list_keys`] |
//! | `PUT /admin/keys/{service}`   | [`KeyAdmin::update_key`]|
//! | `DELETE /admin/keys/{service}`| [`KeyAdmin::delete_key`]|

use crate::config::StoreConfig;
use crate::store::SecretsStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Authenticated caller, as decoded from the bearer token's `sub` claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Body of `PUT /admin/keys/{service}`. The path names the service; any
/// `service` field clients repeat in the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateKeyRequest {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: Value,
}

impl AdminResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: STATUS_OK,
            body,
        }
    }

    fn detail(status: u16, detail: &str) -> Self {
        Self {
            status,
            body: json!({ "detail": detail }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct KeyAdmin {
    store: Arc<SecretsStore>,
    admin_users: HashSet<String>,
}

impl KeyAdmin {
    pub fn new(store: Arc<SecretsStore>, admin_users: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            admin_users: admin_users.into_iter().collect(),
        }
    }

    /// Build the service with the admin users from the configuration.
    pub fn from_config(store: Arc<SecretsStore>, config: &StoreConfig) -> Self {
        Self::new(store, config.admin_users.iter().cloned())
    }

    pub fn store(&self) -> &SecretsStore {
        &self.store
    }

    pub fn list_keys(&self, principal: Option<&Principal>) -> AdminResponse {
        if let Err(denied) = self.authorize(principal, "list") {
            return denied;
        }

        AdminResponse::ok(json!(self.store.list()))
    }

    pub fn update_key(
        &self,
        principal: Option<&Principal>,
        service: &str,
        request: &UpdateKeyRequest,
    ) -> AdminResponse {
        if let Err(denied) = self.authorize(principal, "update") {
            return denied;
        }

        if !is_valid_key_name(service) {
            return AdminResponse::detail(STATUS_BAD_REQUEST, "Invalid key name");
        }

        let outcome = self.store.set(service, &request.key);
        if outcome.is_success() {
            info!(service, "API key updated");
            AdminResponse::ok(json!({
                "status": "success",
                "message": format!("API key for {} updated", service),
            }))
        } else {
            warn!(service, outcome = ?outcome, "API key update failed");
            AdminResponse::detail(STATUS_INTERNAL_ERROR, "Failed to update API key")
        }
    }

    pub fn delete_key(&self, principal: Option<&Principal>, service: &str) -> AdminResponse {
        if let Err(denied) = self.authorize(principal, "delete") {
            return denied;
        }

        if !is_valid_key_name(service) {
            return AdminResponse::detail(STATUS_BAD_REQUEST, "Invalid key name");
        }

        let outcome = self.store.delete(service);
        if outcome.is_success() {
            info!(service, "API key deleted");
            AdminResponse::ok(json!({
                "status": "success",
                "message": format!("API key for {} deleted", service),
            }))
        } else {
            warn!(service, outcome = ?outcome, "API key delete failed");
            AdminResponse::detail(STATUS_INTERNAL_ERROR, "Failed to delete API key")
        }
    }

    fn authorize(&self, principal: Option<&Principal>, action: &str) -> Result<(), AdminResponse> {
        let Some(principal) = principal else {
            return Err(AdminResponse::detail(
                STATUS_UNAUTHORIZED,
                "Authorization header missing",
            ));
        };

        if !self.admin_users.contains(&principal.user_id) {
            warn!(user = %principal.user_id, action, "non-admin key management attempt");
            return Err(AdminResponse::detail(
                STATUS_FORBIDDEN,
                &format!("Only admin users can {} keys", action),
            ));
        }

        Ok(())
    }
}

/// Credential names are env-var shaped: ASCII letters, digits and `_`.
pub fn is_valid_key_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
