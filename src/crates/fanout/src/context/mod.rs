//! Execution context contract
//!
//! An execution context says which identities to audit (accounts reached
//! through a federated role, or named local profiles), in which regions,
//! and how to open a session for one (identity, role, region). Opening
//! sessions is delegated to a [`SessionProvider`]; this crate never touches
//! credentials itself.

mod role;

pub use role::{FallbackStrategy, RoleSelection};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Profile name used when a single-profile context names none
pub const DEFAULT_PROFILE: &str = "default";

/// How identities are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Accounts reached by assuming a role through SSO
    Federated,
    /// Several named local profiles
    MultiProfile,
    /// One local profile
    SingleProfile,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMode::Federated => "federated",
            AuthMode::MultiProfile => "multi_profile",
            AuthMode::SingleProfile => "single_profile",
        };
        f.write_str(name)
    }
}

/// An AWS account in a federated context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Everything needed to open one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRequest<'a> {
    /// Account id or profile name
    pub identity: &'a str,
    /// Role to assume, federated mode only
    pub role: Option<&'a str>,
    pub region: &'a str,
}

/// Opens sessions for task workers
///
/// Implemented for any `Fn(&SessionRequest) -> anyhow::Result<S>`.
pub trait SessionProvider: Send + Sync {
    type Session;

    fn session(&self, request: &SessionRequest<'_>) -> anyhow::Result<Self::Session>;
}

impl<F, S> SessionProvider for F
where
    F: Fn(&SessionRequest<'_>) -> anyhow::Result<S> + Send + Sync,
{
    type Session = S;

    fn session(&self, request: &SessionRequest<'_>) -> anyhow::Result<S> {
        self(request)
    }
}

/// What the task builder and executor need from a context
///
/// Contexts are shared by reference with every worker, hence `Sync`.
pub trait ExecutionContext: Sync {
    type Session;

    fn auth_mode(&self) -> AuthMode;

    fn regions(&self) -> &[String];

    /// Accounts to audit in federated mode, skipped accounts excluded
    fn target_accounts(&self) -> Vec<Account> {
        Vec::new()
    }

    /// Role to assume in `account_id`; `None` skips the account
    fn effective_role(&self, _account_id: &str) -> Option<String> {
        None
    }

    /// Profiles to audit in multi-profile mode
    fn profiles(&self) -> &[String] {
        &[]
    }

    /// Profile in single-profile mode; `None` means [`DEFAULT_PROFILE`]
    fn profile_name(&self) -> Option<&str> {
        None
    }

    fn session(&self, request: &SessionRequest<'_>) -> anyhow::Result<Self::Session>;
}

#[derive(Debug, Clone)]
enum Identities {
    Federated {
        accounts: Vec<Account>,
        roles: RoleSelection,
    },
    MultiProfile {
        profiles: Vec<String>,
    },
    SingleProfile {
        profile: Option<String>,
    },
}

/// Ready-made [`ExecutionContext`]
///
/// # Example
///
/// ```rust
/// use fanout::{Account, AuditContext, AuthMode, ExecutionContext, RoleSelection, SessionRequest};
///
/// let ctx = AuditContext::federated(
///     vec![Account::new("111122223333", "prod")],
///     RoleSelection::new("AuditReadOnly"),
///     |req: &SessionRequest<'_>| -> anyhow::Result<String> {
///         Ok(format!("{}:{}@{}", req.identity, req.role.unwrap_or("-"), req.region))
///     },
/// )
/// .with_regions(vec!["us-east-1".to_string()]);
///
/// assert_eq!(ctx.auth_mode(), AuthMode::Federated);
/// assert_eq!(ctx.effective_role("111122223333").as_deref(), Some("AuditReadOnly"));
/// ```
#[derive(Debug, Clone)]
pub struct AuditContext<P> {
    identities: Identities,
    regions: Vec<String>,
    provider: P,
}

impl<P: SessionProvider> AuditContext<P> {
    pub fn federated(accounts: Vec<Account>, roles: RoleSelection, provider: P) -> Self {
        Self {
            identities: Identities::Federated { accounts, roles },
            regions: Vec::new(),
            provider,
        }
    }

    pub fn profiles(profiles: Vec<String>, provider: P) -> Self {
        Self {
            identities: Identities::MultiProfile { profiles },
            regions: Vec::new(),
            provider,
        }
    }

    pub fn single(profile: Option<String>, provider: P) -> Self {
        Self {
            identities: Identities::SingleProfile { profile },
            regions: Vec::new(),
            provider,
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    pub fn role_selection(&self) -> Option<&RoleSelection> {
        match &self.identities {
            Identities::Federated { roles, .. } => Some(roles),
            _ => None,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: SessionProvider> ExecutionContext for AuditContext<P> {
    type Session = P::Session;

    fn auth_mode(&self) -> AuthMode {
        match self.identities {
            Identities::Federated { .. } => AuthMode::Federated,
            Identities::MultiProfile { .. } => AuthMode::MultiProfile,
            Identities::SingleProfile { .. } => AuthMode::SingleProfile,
        }
    }

    fn regions(&self) -> &[String] {
        &self.regions
    }

    fn target_accounts(&self) -> Vec<Account> {
        match &self.identities {
            Identities::Federated { accounts, roles } => accounts
                .iter()
                .filter(|account| !roles.is_skipped(&account.id))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn effective_role(&self, account_id: &str) -> Option<String> {
        self.role_selection()
            .and_then(|roles| roles.effective_role(account_id))
            .map(str::to_string)
    }

    fn profiles(&self) -> &[String] {
        match &self.identities {
            Identities::MultiProfile { profiles } => profiles,
            _ => &[],
        }
    }

    fn profile_name(&self) -> Option<&str> {
        match &self.identities {
            Identities::SingleProfile { profile } => profile.as_deref(),
            _ => None,
        }
    }

    fn session(&self, request: &SessionRequest<'_>) -> anyhow::Result<P::Session> {
        self.provider.session(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(req: &SessionRequest<'_>) -> anyhow::Result<String> {
        Ok(format!("{}/{}/{}", req.identity, req.role.unwrap_or("-"), req.region))
    }

    #[test]
    fn test_federated_context() {
        let roles = RoleSelection::new("Admin").with_skipped(["222"]);
        let ctx = AuditContext::federated(
            vec![Account::new("111", "prod"), Account::new("222", "legacy")],
            roles,
            provider,
        )
        .with_regions(vec!["us-east-1".into()]);

        assert_eq!(ctx.auth_mode(), AuthMode::Federated);
        assert_eq!(ctx.target_accounts(), vec![Account::new("111", "prod")]);
        assert_eq!(ctx.effective_role("111").as_deref(), Some("Admin"));
        assert_eq!(ctx.effective_role("222"), None);
        assert!(ctx.profiles().is_empty());
    }

    #[test]
    fn test_profile_contexts() {
        let ctx = AuditContext::profiles(vec!["dev".into(), "prod".into()], provider);
        assert_eq!(ctx.auth_mode(), AuthMode::MultiProfile);
        assert_eq!(ctx.profiles(), ["dev".to_string(), "prod".to_string()]);
        assert!(ctx.regions().is_empty());
        assert!(ctx.target_accounts().is_empty());

        let ctx = AuditContext::single(None, provider);
        assert_eq!(ctx.auth_mode(), AuthMode::SingleProfile);
        assert_eq!(ctx.profile_name(), None);
        assert_eq!(ctx.effective_role("111"), None);
    }

    #[test]
    fn test_session_delegates_to_provider() {
        let ctx = AuditContext::single(Some("ops".into()), provider);
        let session = ctx
            .session(&SessionRequest {
                identity: "ops",
                role: None,
                region: "eu-west-1",
            })
            .unwrap();
        assert_eq!(session, "ops/-/eu-west-1");
    }

    #[test]
    fn test_auth_mode_display() {
        assert_eq!(AuthMode::MultiProfile.to_string(), "multi_profile");
    }
}
