use std::fmt;

/// Identity a device authenticates with: platform device id and its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String,
    secret: String,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Keep the secret out of logs.
impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
