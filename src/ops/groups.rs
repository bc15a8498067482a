//! User group membership reconciliation.

use crate::core::outcome::{GroupMembership, GroupOutcome};
use crate::util::config::GroupConfig;
use crate::util::context::HostContext;
use crate::util::process::ProcessBuilder;

/// Make `user` a member of `group`.
///
/// A group that does not exist on the host is reported as
/// [`GroupOutcome::GroupAbsent`] and never created.
pub fn ensure_group_membership(
    ctx: &HostContext<'_>,
    user: &str,
    group: &GroupConfig,
) -> GroupMembership {
    let membership = |outcome, detail: String| GroupMembership {
        user: user.to_string(),
        group: group.name.clone(),
        outcome,
        required: group.required,
        detail,
    };

    match current_membership(ctx, user, &group.name) {
        Err(detail) => membership(GroupOutcome::Failed, detail),
        Ok(Some(outcome)) => membership(outcome, String::new()),
        Ok(None) => {
            let cmd = ProcessBuilder::new("usermod").args(["-aG", &group.name, user]);
            match ctx.run(&cmd) {
                Ok(output) if output.success() => {
                    tracing::debug!("added {} to group {}", user, group.name);
                    membership(GroupOutcome::Added, String::new())
                }
                Ok(output) => membership(GroupOutcome::Failed, output.diagnostic()),
                Err(e) => membership(GroupOutcome::Failed, format!("{:#}", e)),
            }
        }
    }
}

/// Read-only membership check used by `verify`.
///
/// A non-member is reported as [`GroupOutcome::Failed`].
pub fn check_group_membership(
    ctx: &HostContext<'_>,
    user: &str,
    group: &GroupConfig,
) -> GroupMembership {
    let (outcome, detail) = match current_membership(ctx, user, &group.name) {
        Ok(Some(outcome)) => (outcome, String::new()),
        Ok(None) => (GroupOutcome::Failed, format!("{} is not a member", user)),
        Err(detail) => (GroupOutcome::Failed, detail),
    };
    GroupMembership {
        user: user.to_string(),
        group: group.name.clone(),
        outcome,
        required: group.required,
        detail,
    }
}

/// `Some(AlreadyMember | GroupAbsent)` when nothing needs doing, `None` when
/// the user must be added.
fn current_membership(
    ctx: &HostContext<'_>,
    user: &str,
    group: &str,
) -> Result<Option<GroupOutcome>, String> {
    let getent = ProcessBuilder::new("getent").args(["group", group]);
    let exists = ctx.run(&getent).map_err(|e| format!("{:#}", e))?;
    if !exists.success() {
        tracing::debug!("group {} does not exist", group);
        return Ok(Some(GroupOutcome::GroupAbsent));
    }

    let id = ProcessBuilder::new("id").args(["-nG", user]);
    let groups = ctx.run(&id).map_err(|e| format!("{:#}", e))?;
    if !groups.success() {
        return Err(format!("cannot list groups of {}: {}", user, groups.diagnostic()));
    }

    if groups.stdout.split_whitespace().any(|g| g == group) {
        Ok(Some(GroupOutcome::AlreadyMember))
    } else {
        Ok(None)
    }
}
