//! Account and password status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatusType {
    /// Account is locked out (usually after failed logons).
    Locked,
    /// Account is usable.
    #[default]
    Unlocked,
    /// Account has passed its expiry date.
    Expired,
    /// Account has been disabled by an administrator.
    Disabled,
}

/// Account status with the dates that explain it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Current state.
    pub status: AccountStatusType,
    /// When the account was locked.
    pub locked: Option<DateTime<Utc>>,
    /// When the account expires (or expired).
    pub expire: Option<DateTime<Utc>>,
}

impl AccountStatus {
    /// Creates a status of the given type with no dates.
    #[must_use]
    pub const fn new(status: AccountStatusType) -> Self {
        Self {
            status,
            locked: None,
            expire: None,
        }
    }

    /// Sets the expiry date.
    #[must_use]
    pub const fn with_expire(mut self, expire: DateTime<Utc>) -> Self {
        self.expire = Some(expire);
        self
    }

    /// Returns true if the account can be used to sign on.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.status, AccountStatusType::Unlocked)
    }
}

/// State of a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PasswordStatusType {
    /// Password cannot be changed.
    Locked,
    /// Password is current.
    #[default]
    UpToDate,
    /// Password will expire soon.
    NearExpiry,
    /// Password has expired.
    Expired,
    /// Password must be changed at next sign on.
    ChangeRequired,
}

/// Password status with the dates that explain it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordStatus {
    /// Current state.
    pub status: PasswordStatusType,
    /// When the password was last changed.
    pub last_change: Option<DateTime<Utc>>,
    /// When the password expires.
    pub expire: Option<DateTime<Utc>>,
    /// Whether the password never expires.
    pub never_expires: bool,
}

impl PasswordStatus {
    /// Creates a status of the given type with no dates.
    #[must_use]
    pub const fn new(status: PasswordStatusType) -> Self {
        Self {
            status,
            last_change: None,
            expire: None,
            never_expires: false,
        }
    }
}
