//! Permission queries over a verified token.
//!
//! The token is always passed in explicitly; nothing here reads request state.

use uuid::Uuid;

use super::{AccessToken, ProjectId};
use crate::errors::AppError;

/// True iff `project` was granted when the token was issued.
pub fn has_project_permission(token: &AccessToken, project: ProjectId) -> bool {
    token.project_permissions().contains(&project)
}

/// True iff `dashboard` was granted when the token was issued.
///
/// Ids are compared as parsed UUIDs, which is the same as comparing their canonical
/// text; letter case and brace/urn forms of the input do not matter.
pub fn has_dashboard_permission(token: &AccessToken, dashboard: &Uuid) -> bool {
    token.dashboard_permissions().contains(dashboard)
}

/// Helper for handlers: 403 unless the token grants `project`.
pub fn require_project(token: &AccessToken, project: ProjectId) -> Result<(), AppError> {
    if has_project_permission(token, project) {
        return Ok(());
    }
    tracing::warn!(
        user_id = %token.user_id(),
        project_id = project,
        "access denied: project not in token"
    );
    Err(AppError::Forbidden(format!(
        "you don't have access to project {}",
        project
    )))
}

/// Helper for handlers: 403 unless the token grants `dashboard`.
pub fn require_dashboard(token: &AccessToken, dashboard: &Uuid) -> Result<(), AppError> {
    if has_dashboard_permission(token, dashboard) {
        return Ok(());
    }
    tracing::warn!(
        user_id = %token.user_id(),
        dashboard_id = %dashboard,
        "access denied: dashboard not in token"
    );
    Err(AppError::Forbidden(format!(
        "you don't have access to dashboard {}",
        dashboard
    )))
}
