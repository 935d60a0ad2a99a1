use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub iat: Option<u64>,
}

/// Verified identity injected by the auth middleware. The scheduling core
/// trusts this unconditionally; verification itself happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_therapist(&self) -> bool {
        self.role.as_deref() == Some("therapist")
    }

    pub fn is_client(&self) -> bool {
        self.role.as_deref() == Some("client")
    }
}
