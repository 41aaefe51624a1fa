//! response envelope and request DTOs
//!
//! grounded on `original_source/api/views.go`'s `ResMsg` struct and the
//! `models.Options`/`Binding`/`ACL`/`Reserves` request shapes it binds JSON
//! onto — here as raw-string fields so a malformed MAC or IP address is a
//! validation error carried in the envelope, not an axum JSON-rejection
//! (every endpoint answers HTTP 200; failures live in the body, per §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// the envelope every admin endpoint responds with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResMsg {
    /// whether the request was handled without error
    pub success: bool,
    /// HTTP-style status code, mirrored into the body for clients that don't
    /// inspect the transport status (which is always 200)
    pub code: u16,
    /// error detail, or `null` on success
    pub error: Value,
    /// response payload, or `null` on failure
    pub data: Value,
}

impl ResMsg {
    /// a successful response carrying `data`
    pub fn success(data: impl Serialize) -> Self {
        ResMsg {
            success: true,
            code: 200,
            error: Value::Null,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    /// a failed response carrying a human-readable `error`
    pub fn error(err: impl std::fmt::Display) -> Self {
        ResMsg {
            success: false,
            code: 400,
            error: Value::String(err.to_string()),
            data: Value::Null,
        }
    }
}

impl axum::response::IntoResponse for ResMsg {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self).into_response()
    }
}

/// `POST/PUT /api/v1/{set,update}/options` body, matching
/// [`dhcpd_core::model::Options`] field-for-field but as raw strings so
/// parse failures surface as a validation error rather than a JSON rejection
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsRequest {
    pub lease_time: String,
    pub server_ip: String,
    pub gateway_ip: String,
    pub range_start_ip: String,
    pub range_end_ip: String,
    pub netmask: String,
    #[serde(default)]
    pub boot_file_name: String,
    #[serde(default)]
    pub router: String,
    #[serde(default)]
    pub dns: String,
    #[serde(default)]
    pub acl_enabled: bool,
    #[serde(default)]
    pub acl_action: String,
}

/// `POST/PUT /api/v1/{set,update}/bind` body
#[derive(Debug, Clone, Deserialize)]
pub struct BindingRequest {
    pub client_hw_addr: String,
    pub bind_addr: String,
}

/// `POST/PUT /api/v1/{set,update}/acl` body
#[derive(Debug, Clone, Deserialize)]
pub struct AclRequest {
    pub client_hw_addr: String,
    pub action: String,
}

/// `POST /api/v1/set/reserve` body
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    pub address: String,
}

/// `DELETE /api/v1/del/bind` query string: mac, ip, or both
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BindDeleteQuery {
    pub mac: Option<String>,
    pub ip: Option<String>,
}

/// `DELETE /api/v1/del/acl` query string
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AclDeleteQuery {
    pub mac: Option<String>,
}

/// `DELETE /api/v1/del/reserve` query string
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReserveDeleteQuery {
    pub ip: Option<String>,
}
