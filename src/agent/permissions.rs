//! Per-step action permission computation.
//!
//! Disabling actions whose preconditions cannot be met keeps the LLM
//! from looping on impossible choices. Permissions are a pure function
//! of context and are recomputed at the top of every step.

use crate::config::SessionConfig;

use super::actions::ActionPermissions;
use super::context::AgentContext;

/// URL-store size at which further searching is pointless.
pub const MAX_COLLECTED_URLS: usize = 50;

/// Gap questions accepted per reflect step.
pub const MAX_REFLECT_PER_STEP: usize = 5;

/// URLs read per read step.
pub const MAX_URLS_PER_STEP: usize = 5;

/// Compute the allowed-action set for the coming step.
pub fn compute_permissions(ctx: &AgentContext, config: &SessionConfig) -> ActionPermissions {
    ActionPermissions {
        search: ctx.urls.count() < MAX_COLLECTED_URLS,
        read: ctx.urls.has_unvisited(),
        reflect: ctx.gap_questions_this_step <= MAX_REFLECT_PER_STEP,
        answer: ctx.step > 1 || config.allow_direct_answer,
        coding: config.enable_coding,
    }
}
