//! Expansion of an execution context into tasks

use crate::context::{AuthMode, ExecutionContext, SessionRequest, DEFAULT_PROFILE};
use std::fmt;
use tracing::{debug, warn};

type SessionGetter<'c, S> = Box<dyn Fn() -> anyhow::Result<S> + Send + Sync + 'c>;

/// One unit of work: a collector call for one identity in one region
///
/// The session is opened lazily by the worker that runs the task.
pub struct TaskSpec<'c, S> {
    /// Account id or profile name
    pub identifier: String,
    /// Account name or profile name
    pub display_name: String,
    pub region: String,
    /// Role assumed in federated mode
    pub role: Option<String>,
    session_getter: SessionGetter<'c, S>,
}

impl<'c, S> TaskSpec<'c, S> {
    pub fn new<F>(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        region: impl Into<String>,
        session_getter: F,
    ) -> Self
    where
        F: Fn() -> anyhow::Result<S> + Send + Sync + 'c,
    {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            region: region.into(),
            role: None,
            session_getter: Box::new(session_getter),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Open the session for this task
    pub fn open_session(&self) -> anyhow::Result<S> {
        (self.session_getter)()
    }

    /// `identifier/region`
    pub fn label(&self) -> String {
        format!("{}/{}", self.identifier, self.region)
    }
}

impl<S> fmt::Debug for TaskSpec<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("identifier", &self.identifier)
            .field("display_name", &self.display_name)
            .field("region", &self.region)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Builds the task list for an execution
///
/// - federated: target accounts × regions, accounts without a usable role are skipped
/// - multi-profile: profiles × regions
/// - single-profile: the profile (or `default`) × regions
pub struct TaskBuilder<'c, C> {
    ctx: &'c C,
}

impl<'c, C: ExecutionContext> TaskBuilder<'c, C> {
    pub fn new(ctx: &'c C) -> Self {
        Self { ctx }
    }

    pub fn build(&self) -> Vec<TaskSpec<'c, C::Session>> {
        let regions = self.ctx.regions();
        if regions.is_empty() {
            debug!("No regions selected, no tasks to build");
            return Vec::new();
        }

        match self.ctx.auth_mode() {
            AuthMode::Federated => self.federated_tasks(regions),
            AuthMode::MultiProfile => self
                .ctx
                .profiles()
                .iter()
                .flat_map(|profile| self.profile_tasks(profile, regions))
                .collect(),
            AuthMode::SingleProfile => {
                let profile = self.ctx.profile_name().unwrap_or(DEFAULT_PROFILE);
                self.profile_tasks(profile, regions)
            }
        }
    }

    fn federated_tasks(&self, regions: &[String]) -> Vec<TaskSpec<'c, C::Session>> {
        let ctx = self.ctx;
        let mut tasks = Vec::new();

        for account in ctx.target_accounts() {
            let Some(role) = ctx.effective_role(&account.id) else {
                warn!(
                    account_id = %account.id,
                    account_name = %account.name,
                    "No usable role for account, skipping"
                );
                continue;
            };

            for region in regions {
                let id = account.id.clone();
                let assumed = role.clone();
                let target = region.clone();
                let task = TaskSpec::new(&account.id, &account.name, region, move || {
                    ctx.session(&SessionRequest {
                        identity: &id,
                        role: Some(&assumed),
                        region: &target,
                    })
                })
                .with_role(&role);
                tasks.push(task);
            }
        }

        tasks
    }

    fn profile_tasks(&self, profile: &str, regions: &[String]) -> Vec<TaskSpec<'c, C::Session>> {
        let ctx = self.ctx;
        regions
            .iter()
            .map(|region| {
                let name = profile.to_string();
                let target = region.clone();
                TaskSpec::new(profile, profile, region, move || {
                    ctx.session(&SessionRequest {
                        identity: &name,
                        role: None,
                        region: &target,
                    })
                })
            })
            .collect()
    }
}
