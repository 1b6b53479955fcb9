use anyhow::Result;
use sqlx::PgPool;

use crate::domain::User;

/// Fetch every newsletter subscriber, ordered by name.
pub async fn registered_users(pool: &PgPool) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, User>(
        r#"
        SELECT
            name,
            email
        FROM newsletter_users
        WHERE email IS NOT NULL
        ORDER BY name, email
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
