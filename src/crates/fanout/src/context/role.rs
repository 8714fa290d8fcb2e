//! Role selection for federated (SSO) execution

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do with an account the primary role cannot reach
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Use the fallback role where it is available
    #[default]
    UseFallback,
    /// Leave the account out
    SkipAccount,
}

/// Which role to assume in which account
///
/// `role_account_map` lists, per role name, the accounts where that role
/// exists. A primary role with no entry in the map is treated as available
/// everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSelection {
    pub primary_role: String,
    #[serde(default)]
    pub fallback_role: Option<String>,
    #[serde(default)]
    pub fallback_strategy: FallbackStrategy,
    #[serde(default)]
    pub role_account_map: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub skipped_accounts: Vec<String>,
}

impl RoleSelection {
    pub fn new(primary_role: impl Into<String>) -> Self {
        Self {
            primary_role: primary_role.into(),
            ..Default::default()
        }
    }

    pub fn with_fallback(mut self, role: impl Into<String>, strategy: FallbackStrategy) -> Self {
        self.fallback_role = Some(role.into());
        self.fallback_strategy = strategy;
        self
    }

    /// Record the accounts where `role` exists
    pub fn with_role_accounts<I, S>(mut self, role: impl Into<String>, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_account_map
            .insert(role.into(), accounts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_skipped<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_accounts.extend(accounts.into_iter().map(Into::into));
        self
    }

    fn role_has_account(&self, role: &str, account_id: &str) -> Option<bool> {
        self.role_account_map
            .get(role)
            .map(|accounts| accounts.iter().any(|a| a == account_id))
    }

    pub fn is_skipped(&self, account_id: &str) -> bool {
        self.skipped_accounts.iter().any(|a| a == account_id)
    }

    /// Role to assume in `account_id`, or `None` to skip the account
    ///
    /// # Example
    ///
    /// ```rust
    /// use fanout::{FallbackStrategy, RoleSelection};
    ///
    /// let roles = RoleSelection::new("AuditAdmin")
    ///     .with_fallback("ReadOnly", FallbackStrategy::UseFallback)
    ///     .with_role_accounts("AuditAdmin", ["111111111111"])
    ///     .with_role_accounts("ReadOnly", ["222222222222"]);
    ///
    /// assert_eq!(roles.effective_role("111111111111"), Some("AuditAdmin"));
    /// assert_eq!(roles.effective_role("222222222222"), Some("ReadOnly"));
    /// assert_eq!(roles.effective_role("333333333333"), None);
    /// ```
    pub fn effective_role(&self, account_id: &str) -> Option<&str> {
        if self.is_skipped(account_id) {
            return None;
        }

        match self.role_has_account(&self.primary_role, account_id) {
            Some(true) | None => return Some(&self.primary_role),
            Some(false) => {}
        }

        if self.fallback_strategy == FallbackStrategy::UseFallback {
            if let Some(fallback) = self.fallback_role.as_deref() {
                if self.role_has_account(fallback, account_id) == Some(true) {
                    return Some(fallback);
                }
            }
        }
        None
    }
}
