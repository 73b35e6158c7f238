//! Branch and pull-request ref planning

use crate::errors::EngineError;
use crate::models::deployment::{DeploymentContext, GitType};

/// Local branch a pull request head is fetched into
pub fn preview_branch_name(pull_request_id: u64) -> String {
    format!("pr-{}-coolify", pull_request_id)
}

/// Whether `value` is a ref name or commit that can go into a shell command
/// as a bare word
///
/// Accepts ASCII letters, digits and `._/+@-`, never a leading `-`.
pub fn is_safe_ref(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"._/+@-".contains(&b))
}

/// [`is_safe_ref`] as a `ConfigurationError`; the rejected value is not echoed
pub fn validate_ref(what: &str, value: &str, deployment_id: &str) -> Result<(), EngineError> {
    if is_safe_ref(value) {
        return Ok(());
    }
    Err(EngineError::ConfigurationError(format!(
        "{} of deployment {} is not a valid git ref",
        what, deployment_id
    )))
}

/// Extra checkout a preview deployment performs after the base clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefCheckout {
    /// `git fetch origin <refspec> && git checkout <local_branch>`
    FetchAndCheckout { refspec: String, local_branch: String },

    /// `git checkout <commit>`, for providers without a symbolic PR ref
    Commit { commit: String },
}

impl RefCheckout {
    /// Text of the `Checking out ...` announcement
    pub fn target(&self) -> &str {
        match self {
            RefCheckout::FetchAndCheckout { refspec, .. } => refspec,
            RefCheckout::Commit { commit } => commit,
        }
    }
}

/// Output of ref planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPlan {
    /// Branch reported back to the caller; the refspec for fetched PR heads
    pub branch: String,
    pub checkout: Option<RefCheckout>,
}

/// Plan with the provider named by the context
pub fn plan(ctx: &DeploymentContext, base_branch: &str) -> Result<RefPlan, EngineError> {
    plan_for_provider(ctx, ctx.git_type, base_branch)
}

/// Plan with an explicit provider, e.g. the one implied by a source app
pub fn plan_for_provider(
    ctx: &DeploymentContext,
    git_type: GitType,
    base_branch: &str,
) -> Result<RefPlan, EngineError> {
    if !ctx.is_pull_request() {
        return Ok(RefPlan {
            branch: base_branch.to_string(),
            checkout: None,
        });
    }

    let id = ctx.pull_request_id;
    let local_branch = preview_branch_name(id);
    let refspec = match git_type {
        GitType::Github => format!("pull/{}/head:{}", id, local_branch),
        GitType::Gitlab => format!("merge-requests/{}/head:{}", id, local_branch),
        GitType::Bitbucket => {
            let commit = ctx
                .target_commit
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    EngineError::UnsupportedProviderError(format!(
                        "bitbucket pull request {} of deployment {} needs an explicit target commit",
                        id, ctx.deployment_id
                    ))
                })?;
            return Ok(RefPlan {
                branch: base_branch.to_string(),
                checkout: Some(RefCheckout::Commit {
                    commit: commit.to_string(),
                }),
            });
        }
        GitType::None => {
            return Err(EngineError::UnsupportedProviderError(format!(
                "pull request {} of deployment {} has no git provider",
                id, ctx.deployment_id
            )));
        }
    };

    Ok(RefPlan {
        branch: refspec.clone(),
        checkout: Some(RefCheckout::FetchAndCheckout {
            refspec,
            local_branch,
        }),
    })
}
