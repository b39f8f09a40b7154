//! Time-bound session credentials.
//!
//! The platform recomputes the password from the timestamp embedded in the
//! client id, so both are always derived from the same timestamp string.
//!
//! ```text
//! client_id = {device_id}_0_0_{YYYYMMDDHH}
//! password  = hex(HMAC-SHA256(key = secret, message = YYYYMMDDHH))
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::device::DeviceIdentity;

type HmacSha256 = Hmac<Sha256>;

/// UTC hour resolution, fixed width (10 digits).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H";

const CLIENT_ID_SEPARATOR: &str = "_";
/// Reserved client id segments: SDK type, SDK version.
const SDK_TYPE: &str = "0";
const SDK_VERSION: &str = "0";

/// The device secret could not key the HMAC.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device secret cannot key HMAC-SHA256")]
pub struct CredentialError;

/// Format `now` as the credential timestamp.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Hex-encoded HMAC-SHA256 of `timestamp` keyed with `secret`. Always 64 chars.
pub fn session_password(secret: &str, timestamp: &str) -> Result<String, CredentialError> {
    let mut mac = <HmacSha256 as KeyInit>::new_from_slice(secret.as_bytes())
        .map_err(|_| CredentialError)?;
    mac.update(timestamp.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Session-scoped client identifier.
pub fn client_id(device_id: &str, timestamp: &str) -> String {
    [device_id, SDK_TYPE, SDK_VERSION, timestamp].join(CLIENT_ID_SEPARATOR)
}

/// MQTT CONNECT credentials issued for one session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Derive credentials for `identity` at wall-clock time `now`.
    pub fn issue(identity: &DeviceIdentity, now: DateTime<Utc>) -> Result<Self, CredentialError> {
        let ts = timestamp(now);
        Ok(Self {
            client_id: client_id(identity.id(), &ts),
            username: identity.id().to_string(),
            password: session_password(identity.secret(), &ts)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
