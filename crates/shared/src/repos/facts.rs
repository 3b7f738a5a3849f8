use sqlx::Row;
use uuid::Uuid;

use super::{ProfileFactRecord, Store, StoreError};

impl Store {
    /// Idempotent on (user_id, fact_text); returns whether a row was inserted.
    pub async fn upsert_profile_fact(
        &self,
        user_id: Uuid,
        fact_text: &str,
        category: &str,
        origin_ref: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO profile_facts (user_id, fact_text, category, origin_ref)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, fact_text) DO NOTHING",
        )
        .bind(user_id)
        .bind(fact_text)
        .bind(category)
        .bind(origin_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_profile_facts(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ProfileFactRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT fact_text, category, origin_ref
             FROM profile_facts
             WHERE user_id = $1
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ProfileFactRecord {
                    fact_text: row.try_get("fact_text")?,
                    category: row.try_get("category")?,
                    origin_ref: row.try_get("origin_ref")?,
                })
            })
            .collect()
    }
}
