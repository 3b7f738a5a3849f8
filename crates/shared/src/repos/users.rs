use sqlx::Row;
use uuid::Uuid;

use super::{Store, StoreError, UserRecord};

impl Store {
    /// Auto-provisions the user row on first token resolution. The id comes
    /// from the verified JWT, so conflicts are simply ignored.
    pub async fn ensure_user(&self, user_id: Uuid, email: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email)
             VALUES ($1, $2)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, display_name, push_token
             FROM users
             WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(UserRecord {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                display_name: row.try_get("display_name")?,
                push_token: row.try_get("push_token")?,
            })
        })
        .transpose()
    }

    /// Users reachable by the briefing scheduler.
    pub async fn users_with_push_tokens(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, email, display_name, push_token
             FROM users
             WHERE push_token IS NOT NULL AND push_token <> ''",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UserRecord {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                    display_name: row.try_get("display_name")?,
                    push_token: row.try_get("push_token")?,
                })
            })
            .collect()
    }
}
