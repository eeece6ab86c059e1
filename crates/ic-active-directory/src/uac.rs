//! `userAccountControl` flags and the account/password status derived from
//! them.

use std::collections::BTreeMap;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use ic_directory::{DirectoryError, DirectoryResult};
use ic_model::{AccountStatus, AccountStatusType, PasswordStatus, PasswordStatusType};

bitflags! {
    /// Bits of the `userAccountControl` attribute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UserAccountControl: u32 {
        /// The logon script is run.
        const SCRIPT = 0x0001;
        /// The account is disabled.
        const ACCOUNTDISABLE = 0x0002;
        /// A home folder is required.
        const HOMEDIR_REQUIRED = 0x0008;
        /// The account is locked out. Not maintained by current servers; see
        /// `lockoutTime`.
        const LOCKOUT = 0x0010;
        /// No password is required.
        const PASSWD_NOTREQD = 0x0020;
        /// The password is stored with reversible encryption.
        const ENCRYPTED_TEXT_PWD_ALLOWED = 0x0080;
        /// Local account for a user whose primary account is in another domain.
        const TEMP_DUPLICATE_ACCOUNT = 0x0100;
        /// A typical user account.
        const NORMAL_ACCOUNT = 0x0200;
        /// Trust account for a trusting domain.
        const INTERDOMAIN_TRUST_ACCOUNT = 0x0800;
        /// Computer account of a domain member.
        const WORKSTATION_TRUST_ACCOUNT = 0x1000;
        /// Computer account of a domain controller.
        const SERVER_TRUST_ACCOUNT = 0x2000;
        /// The password never expires.
        const DONT_EXPIRE_PASSWORD = 0x1_0000;
        /// MNS logon account.
        const MNS_LOGON_ACCOUNT = 0x2_0000;
        /// Interactive logon requires a smart card.
        const SMARTCARD_REQUIRED = 0x4_0000;
        /// Trusted for Kerberos delegation.
        const TRUSTED_FOR_DELEGATION = 0x8_0000;
        /// Never delegated, even to trusted services.
        const NOT_DELEGATED = 0x10_0000;
        /// Only DES key types are used.
        const USE_DES_KEY_ONLY = 0x20_0000;
        /// Kerberos pre-authentication is not required.
        const DONT_REQ_PREAUTH = 0x40_0000;
        /// The password has expired.
        const PASSWORD_EXPIRED = 0x80_0000;
        /// Trusted to authenticate for delegation.
        const TRUSTED_TO_AUTH_FOR_DELEGATION = 0x100_0000;
    }
}

/// Setting names, as exposed to administrators.
const SETTINGS: &[(&str, UserAccountControl)] = &[
    ("RunScript", UserAccountControl::SCRIPT),
    ("AccountDisabled", UserAccountControl::ACCOUNTDISABLE),
    ("HomeDirectoryRequired", UserAccountControl::HOMEDIR_REQUIRED),
    ("LockOut", UserAccountControl::LOCKOUT),
    ("PasswordNotRequired", UserAccountControl::PASSWD_NOTREQD),
    ("PasswordUsingReversibleEncryption", UserAccountControl::ENCRYPTED_TEXT_PWD_ALLOWED),
    ("TempDuplicateAccount", UserAccountControl::TEMP_DUPLICATE_ACCOUNT),
    ("NormalAccount", UserAccountControl::NORMAL_ACCOUNT),
    ("InterdomainTrustAccount", UserAccountControl::INTERDOMAIN_TRUST_ACCOUNT),
    ("WorkstationTrustAccount", UserAccountControl::WORKSTATION_TRUST_ACCOUNT),
    ("ServerTrustAccount", UserAccountControl::SERVER_TRUST_ACCOUNT),
    ("PasswordNeverExpires", UserAccountControl::DONT_EXPIRE_PASSWORD),
    ("MNSLogonAccount", UserAccountControl::MNS_LOGON_ACCOUNT),
    ("SmartCardIsRequiredForInteractiveLogon", UserAccountControl::SMARTCARD_REQUIRED),
    ("AccountIsTrustedForDelegation", UserAccountControl::TRUSTED_FOR_DELEGATION),
    ("AccountIsSensitiveAndCannotBeDelegated", UserAccountControl::NOT_DELEGATED),
    ("UseDESEncryptionTypesForThisAccount", UserAccountControl::USE_DES_KEY_ONLY),
    ("DoNotRequireKerberosPreauthentication", UserAccountControl::DONT_REQ_PREAUTH),
    ("PasswordExpired", UserAccountControl::PASSWORD_EXPIRED),
    ("EnabledForDelegation", UserAccountControl::TRUSTED_TO_AUTH_FOR_DELEGATION),
];

impl UserAccountControl {
    /// Parses the attribute value. Unknown bits are kept.
    pub fn parse(value: &str) -> DirectoryResult<Self> {
        value
            .trim()
            .parse::<u32>()
            .map(Self::from_bits_retain)
            .map_err(|_| DirectoryError::mapping(format!("invalid userAccountControl '{value}'")))
    }

    /// Every named setting and whether it is set.
    #[must_use]
    pub fn settings(self) -> BTreeMap<&'static str, bool> {
        SETTINGS
            .iter()
            .map(|(name, flag)| (*name, self.contains(*flag)))
            .collect()
    }

    /// Applies named settings, then the enabled state if given.
    ///
    /// ## Errors
    ///
    /// Fails on an unknown setting name.
    pub fn with_settings(
        mut self,
        settings: &BTreeMap<String, bool>,
        enabled: Option<bool>,
    ) -> DirectoryResult<Self> {
        for (name, value) in settings {
            let flag = SETTINGS
                .iter()
                .find(|(known, _)| known == name)
                .map(|(_, flag)| *flag)
                .ok_or_else(|| {
                    DirectoryError::config(format!("unknown account control setting '{name}'"))
                })?;
            self.set(flag, *value);
        }
        if let Some(enabled) = enabled {
            self.set(Self::ACCOUNTDISABLE, !enabled);
        }
        Ok(self)
    }

    /// Derives the account status.
    ///
    /// Disabled wins over locked, locked over expired.
    #[must_use]
    pub fn account_status(
        self,
        locked: Option<DateTime<Utc>>,
        expire: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AccountStatus {
        let status = if self.contains(Self::ACCOUNTDISABLE) {
            AccountStatusType::Disabled
        } else if locked.is_some() || self.contains(Self::LOCKOUT) {
            AccountStatusType::Locked
        } else if expire.is_some_and(|e| e <= now) {
            AccountStatusType::Expired
        } else {
            AccountStatusType::Unlocked
        };
        AccountStatus {
            status,
            locked,
            expire,
        }
    }

    /// Derives the password status.
    ///
    /// `last_set` is `None` when `pwdLastSet` is `0`, which forces a change
    /// at next logon.
    #[must_use]
    pub fn password_status(
        self,
        last_set: Option<DateTime<Utc>>,
        expire: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> PasswordStatus {
        let never_expires = self.contains(Self::DONT_EXPIRE_PASSWORD);
        let expire = if never_expires { None } else { expire };

        let status = if last_set.is_none() && !self.contains(Self::PASSWD_NOTREQD) {
            PasswordStatusType::ChangeRequired
        } else if self.contains(Self::PASSWORD_EXPIRED) || expire.is_some_and(|e| e <= now) {
            PasswordStatusType::Expired
        } else {
            PasswordStatusType::UpToDate
        };
        PasswordStatus {
            status,
            last_change: last_set,
            expire,
            never_expires,
        }
    }
}
