//! Read-only access to the `users` table. Only the public summary columns
//! are ever selected.

use parkbase_core::{Role, UserSummary};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const SUMMARY_COLUMNS: &str = "id, name, email, photo, role";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub role: String,
}

impl TryFrom<UserSummaryRow> for UserSummary {
    type Error = DbError;

    fn try_from(row: UserSummaryRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| {
            DbError::InvalidRow(format!("user {} has unknown role '{}'", row.id, row.role))
        })?;
        Ok(UserSummary {
            id: row.id,
            name: row.name,
            email: row.email,
            photo: row.photo,
            role,
        })
    }
}

fn into_summaries(rows: Vec<UserSummaryRow>) -> Result<Vec<UserSummary>, DbError> {
    rows.into_iter().map(UserSummary::try_from).collect()
}

/// Summaries of the active users among `ids`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn user_summaries_by_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<Vec<UserSummary>, DbError> {
    let rows = sqlx::query_as::<_, UserSummaryRow>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM users WHERE id = ANY($1) AND active"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    into_summaries(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_summary(pool: &PgPool, id: Uuid) -> Result<Option<UserSummary>, DbError> {
    let row = sqlx::query_as::<_, UserSummaryRow>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM users WHERE id = $1 AND active"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(UserSummary::try_from).transpose()
}

/// Every active user, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_summaries(pool: &PgPool) -> Result<Vec<UserSummary>, DbError> {
    let rows = sqlx::query_as::<_, UserSummaryRow>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM users WHERE active ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    into_summaries(rows)
}
