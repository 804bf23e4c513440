use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::PermissionSource;
use crate::token::ProjectId;

/// Reads memberships from the `user_projects` / `user_dashboards` join tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl PermissionSource for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn project_ids_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ProjectId>> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT project_id FROM user_projects WHERE user_id = $1 ORDER BY project_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|id| {
                ProjectId::try_from(id)
                    .map_err(|_| anyhow::anyhow!("negative project id {} for user {}", id, user_id))
            })
            .collect()
    }

    async fn dashboard_ids_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Uuid>> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT dashboard_id FROM user_dashboards WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
