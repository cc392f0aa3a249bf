//! Caller identity attached to an invocation.

use serde::{Deserialize, Serialize};

/// Identity of the caller, as forwarded by the upstream system.
///
/// Every field is optional on the wire: anonymous or system-triggered calls
/// send `null` for most of them.
///
/// # Example
///
/// ```
/// use callgate_core::Accountability;
///
/// let acc: Accountability = serde_json::from_str(
///     r#"{"user":"u-1","role":"r-1","admin":true,"app":true,"userAgent":"curl"}"#,
/// ).unwrap();
///
/// assert_eq!(acc.user.as_deref(), Some("u-1"));
/// assert_eq!(acc.user_agent.as_deref(), Some("curl"));
/// assert!(acc.admin);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Accountability {
    /// User ID of the caller.
    pub user: Option<String>,

    /// Role ID of the caller.
    pub role: Option<String>,

    /// Whether the caller has administrator privileges.
    #[serde(deserialize_with = "null_as_false")]
    pub admin: bool,

    /// Whether the caller has access to the application UI.
    #[serde(deserialize_with = "null_as_false")]
    pub app: bool,

    /// Network address of the caller.
    pub ip: Option<String>,

    /// User agent reported by the caller.
    pub user_agent: Option<String>,

    /// Origin header reported by the caller.
    pub origin: Option<String>,
}

impl Accountability {
    /// Creates an accountability record for a user.
    #[must_use]
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    /// Returns a string identifier suitable for logging.
    ///
    /// Returns the user ID, or `anonymous` when the call carries none.
    #[must_use]
    pub fn log_id(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
