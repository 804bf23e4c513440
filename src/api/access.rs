use axum::extract::Path;
use axum::http::StatusCode;
use uuid::Uuid;

use crate::errors::AppError;
use crate::token::{permissions, Authenticated, ProjectId};

/// GET /api/v1/projects/:id/access. 204 when the token grants the project.
pub async fn project_access(
    auth: Authenticated,
    Path(project): Path<ProjectId>,
) -> Result<StatusCode, AppError> {
    permissions::require_project(auth.token(), project)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/dashboards/:id/access
pub async fn dashboard_access(
    auth: Authenticated,
    Path(dashboard): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    permissions::require_dashboard(auth.token(), &dashboard)?;
    Ok(StatusCode::NO_CONTENT)
}
