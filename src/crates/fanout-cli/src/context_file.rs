//! Execution context files
//!
//! ```yaml
//! mode: federated
//! regions: [us-east-1, eu-west-1]
//! accounts:
//!   - { id: "111122223333", name: prod }
//! roles:
//!   primary_role: AuditReadOnly
//! ```

use anyhow::{bail, Context, Result};
use fanout::config::load_file;
use fanout::{Account, AuditContext, AuthMode, RoleSelection, SessionProvider};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextFile {
    pub mode: AuthMode,
    pub regions: Vec<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub roles: Option<RoleSelection>,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl ContextFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file: Self = load_file(path).with_context(|| format!("failed to load context file {}", path.display()))?;
        file.validate()?;
        Ok(file)
    }

    /// Reject fields that do not belong to the chosen mode
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            AuthMode::Federated => {
                if self.roles.is_none() {
                    bail!("federated mode needs a `roles` section");
                }
                if !self.profiles.is_empty() || self.profile.is_some() {
                    bail!("federated mode takes `accounts`, not profiles");
                }
            }
            AuthMode::MultiProfile => {
                if !self.accounts.is_empty() || self.roles.is_some() || self.profile.is_some() {
                    bail!("multi_profile mode takes only `profiles`");
                }
            }
            AuthMode::SingleProfile => {
                if !self.accounts.is_empty() || self.roles.is_some() || !self.profiles.is_empty() {
                    bail!("single_profile mode takes only `profile`");
                }
            }
        }
        Ok(())
    }

    pub fn into_context<P: SessionProvider>(self, provider: P) -> AuditContext<P> {
        let context = match self.mode {
            AuthMode::Federated => {
                AuditContext::federated(self.accounts, self.roles.unwrap_or_default(), provider)
            }
            AuthMode::MultiProfile => AuditContext::profiles(self.profiles, provider),
            AuthMode::SingleProfile => AuditContext::single(self.profile, provider),
        };
        context.with_regions(self.regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout::{ExecutionContext, SessionRequest};

    fn parse(yaml: &str) -> ContextFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn provider(req: &SessionRequest<'_>) -> anyhow::Result<String> {
        Ok(req.identity.to_string())
    }

    #[test]
    fn test_federated_file() {
        let file = parse(
            r#"
mode: federated
regions: [us-east-1]
accounts:
  - { id: "111122223333", name: prod }
  - { id: "444455556666", name: dev }
roles:
  primary_role: Audit
  skipped_accounts: ["444455556666"]
"#,
        );
        file.validate().unwrap();

        let ctx = file.into_context(provider);
        assert_eq!(ctx.auth_mode(), AuthMode::Federated);
        assert_eq!(ctx.target_accounts(), vec![Account::new("111122223333", "prod")]);
        assert_eq!(ctx.regions(), ["us-east-1".to_string()]);
    }

    #[test]
    fn test_profile_files() {
        let multi = parse("mode: multi_profile\nregions: [us-east-1]\nprofiles: [dev, prod]\n");
        multi.validate().unwrap();
        assert_eq!(multi.into_context(provider).profiles().len(), 2);

        let single = parse("mode: single_profile\nregions: [us-east-1]\n");
        single.validate().unwrap();
        assert_eq!(single.into_context(provider).profile_name(), None);
    }

    #[test]
    fn test_mode_mismatch() {
        let file = parse("mode: federated\nregions: [us-east-1]\n");
        assert!(file.validate().is_err());

        let file = parse("mode: single_profile\nregions: [us-east-1]\nprofiles: [dev]\n");
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<ContextFile>("mode: single_profile\nregions: []\nregion: x\n").is_err());
    }
}
