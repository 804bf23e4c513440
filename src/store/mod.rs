//! Permission lookups consumed at token issuance.

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::token::ProjectId;

/// Supplies a user's current memberships when a token is issued.
///
/// Whatever this returns is frozen into the token until it is re-issued.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Ids of the projects the user is a member of.
    async fn project_ids_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ProjectId>>;

    /// Ids of the dashboards the user is a member of.
    async fn dashboard_ids_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Uuid>>;

    /// Readiness probe.
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
