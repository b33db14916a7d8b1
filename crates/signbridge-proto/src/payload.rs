//! JSON payload schemas, one per opcode.
//!
//! Field names follow the controller's own JSON (`"sn"`, `"loginType"`,
//! `"programInfos"`). Readers are tolerant: unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Opaque token returned by a successful login.
///
/// Tokens are connection-scoped: every post-login request frame on the
/// same connection carries it, and a reconnect re-authenticates from
/// scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

/// Login request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "sn")]
    pub serial_number: String,
    pub username: String,
    pub password: String,
    #[serde(rename = "loginType")]
    pub login_type: u8,
}

/// Login response payload. `result` 0 means the credentials were accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAck {
    pub result: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SessionToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// List-programs request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub token: SessionToken,
}

/// A program identifier as the vendor tool assigned it.
///
/// Some firmware revisions hand out integers, others strings; both appear
/// in the wild, so the identifier is kept opaque and compared as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgramId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One entry of the sign's program directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub name: String,
    pub identifier: ProgramId,
}

/// List-programs response payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramList {
    #[serde(rename = "programInfos", default)]
    pub program_infos: Vec<ProgramInfo>,
}

/// Switch-program request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchRequest {
    pub token: SessionToken,
    pub identifier: ProgramId,
}

/// Command acknowledgement payload. `result` 0 means the device applied
/// the command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchAck {
    pub result: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
