use chrono::{Datelike, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::{AnalysisRecord, UserUsage};
use crate::types::AppResult;

pub struct DatabaseOperations;

impl DatabaseOperations {
    // Magic-link token operations

    pub async fn store_magic_token(pool: &SqlitePool, email: &str, token: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO magic_links (token, email, created, used) VALUES (?, ?, ?, 0)",
        )
        .bind(token)
        .bind(email)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Look a token up and return the email it belongs to. `mark_used` is
    /// true only on the login hop; session checks leave the flag alone so
    /// the same token keeps working as the session cookie.
    pub async fn verify_magic_link(
        pool: &SqlitePool,
        token: &str,
        mark_used: bool,
    ) -> AppResult<Option<String>> {
        let email: Option<(String,)> =
            sqlx::query_as("SELECT email FROM magic_links WHERE token = ?")
                .bind(token)
                .fetch_optional(pool)
                .await?;

        let Some((email,)) = email else {
            return Ok(None);
        };

        if mark_used {
            sqlx::query("UPDATE magic_links SET used = 1 WHERE token = ?")
                .bind(token)
                .execute(pool)
                .await?;
        }

        Ok(Some(email))
    }

    // Usage / credit operations

    /// Create the usage row for new users (free plan, `free_credits`
    /// analyses) and apply the monthly reset for existing free accounts.
    pub async fn ensure_user(pool: &SqlitePool, email: &str, free_credits: i64) -> AppResult<()> {
        let today = Utc::now().date_naive();

        let Some(usage) = Self::get_usage(pool, email).await? else {
            sqlx::query(
                "INSERT INTO user_usage (email, analyses_used, analyses_limit, reset_date, subscription_status) \
                 VALUES (?, 0, ?, ?, 'free')",
            )
            .bind(email)
            .bind(free_credits)
            .bind(today.format("%Y-%m-%d").to_string())
            .execute(pool)
            .await?;
            tracing::info!(email = %email, credits = free_credits, "new user created");
            return Ok(());
        };

        if usage.subscription_status != "free" {
            return Ok(());
        }

        if let Ok(reset) = NaiveDate::parse_from_str(&usage.reset_date, "%Y-%m-%d") {
            let stale = reset.year() < today.year()
                || (reset.year() == today.year() && reset.month() < today.month());
            if stale {
                sqlx::query(
                    "UPDATE user_usage SET analyses_used = 0, reset_date = ? WHERE email = ?",
                )
                .bind(today.format("%Y-%m-%d").to_string())
                .bind(email)
                .execute(pool)
                .await?;
                tracing::info!(email = %email, "monthly credits reset");
            }
        }

        Ok(())
    }

    pub async fn get_usage(pool: &SqlitePool, email: &str) -> AppResult<Option<UserUsage>> {
        let usage = sqlx::query_as::<_, UserUsage>(
            "SELECT email, analyses_used, analyses_limit, reset_date, subscription_status \
             FROM user_usage WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(usage)
    }

    pub async fn increment_usage(pool: &SqlitePool, email: &str) -> AppResult<()> {
        sqlx::query("UPDATE user_usage SET analyses_used = analyses_used + 1 WHERE email = ?")
            .bind(email)
            .execute(pool)
            .await?;

        Ok(())
    }

    // Analysis history

    pub async fn record_analysis(pool: &SqlitePool, record: &AnalysisRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO analyses (id, user_email, kind, name, created_at, duration_ms, is_mock) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_email)
        .bind(&record.kind)
        .bind(&record.name)
        .bind(&record.created_at)
        .bind(record.duration_ms)
        .bind(record.is_mock)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn recent_analyses(
        pool: &SqlitePool,
        email: &str,
        limit: i64,
    ) -> AppResult<Vec<AnalysisRecord>> {
        let rows = sqlx::query_as::<_, AnalysisRecord>(
            "SELECT id, user_email, kind, name, created_at, duration_ms, is_mock \
             FROM analyses WHERE user_email = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(email)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Per-kind counts for the dashboard: (github, security, document).
    pub async fn kind_counts(pool: &SqlitePool, email: &str) -> AppResult<(i64, i64, i64)> {
        let row: (i64, i64, i64) = sqlx::query_as(
            "SELECT \
               COUNT(CASE WHEN kind = 'github' THEN 1 END), \
               COUNT(CASE WHEN kind = 'security' THEN 1 END), \
               COUNT(CASE WHEN kind = 'document' THEN 1 END) \
             FROM analyses WHERE user_email = ?",
        )
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_token_store_and_verify() {
        let pool = test_pool().await;
        DatabaseOperations::store_magic_token(&pool, "a@b.com", "magic_abc")
            .await
            .unwrap();

        // Session check does not consume the token
        let email = DatabaseOperations::verify_magic_link(&pool, "magic_abc", false)
            .await
            .unwrap();
        assert_eq!(email.as_deref(), Some("a@b.com"));

        // Login hop marks it used, but the token still resolves afterwards
        let email = DatabaseOperations::verify_magic_link(&pool, "magic_abc", true)
            .await
            .unwrap();
        assert_eq!(email.as_deref(), Some("a@b.com"));
        let email = DatabaseOperations::verify_magic_link(&pool, "magic_abc", false)
            .await
            .unwrap();
        assert_eq!(email.as_deref(), Some("a@b.com"));

        let missing = DatabaseOperations::verify_magic_link(&pool, "magic_nope", false)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_token_replaced_on_new_login() {
        let pool = test_pool().await;
        DatabaseOperations::store_magic_token(&pool, "a@b.com", "magic_one")
            .await
            .unwrap();
        DatabaseOperations::store_magic_token(&pool, "a@b.com", "magic_one")
            .await
            .unwrap();

        let email = DatabaseOperations::verify_magic_link(&pool, "magic_one", false)
            .await
            .unwrap();
        assert_eq!(email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_ensure_user_grants_free_credits() {
        let pool = test_pool().await;
        DatabaseOperations::ensure_user(&pool, "new@user.com", 5)
            .await
            .unwrap();

        let usage = DatabaseOperations::get_usage(&pool, "new@user.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(usage.analyses_used, 0);
        assert_eq!(usage.analyses_limit, 5);
        assert_eq!(usage.subscription_status, "free");
        assert_eq!(usage.balance(), 5);
    }

    #[tokio::test]
    async fn test_monthly_reset_for_free_accounts() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO user_usage (email, analyses_used, analyses_limit, reset_date, subscription_status) \
             VALUES ('old@user.com', 4, 5, '2020-01-01', 'free')",
        )
        .execute(&pool)
        .await
        .unwrap();

        DatabaseOperations::ensure_user(&pool, "old@user.com", 5)
            .await
            .unwrap();

        let usage = DatabaseOperations::get_usage(&pool, "old@user.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(usage.analyses_used, 0);
        assert_ne!(usage.reset_date, "2020-01-01");
    }

    #[tokio::test]
    async fn test_paid_accounts_are_not_reset() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO user_usage (email, analyses_used, analyses_limit, reset_date, subscription_status) \
             VALUES ('pro@user.com', 40, 100, '2020-01-01', 'pro')",
        )
        .execute(&pool)
        .await
        .unwrap();

        DatabaseOperations::ensure_user(&pool, "pro@user.com", 5)
            .await
            .unwrap();

        let usage = DatabaseOperations::get_usage(&pool, "pro@user.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(usage.analyses_used, 40);
        assert_eq!(usage.reset_date, "2020-01-01");
    }

    #[tokio::test]
    async fn test_history_and_counts() {
        let pool = test_pool().await;
        for (i, kind) in ["github", "security", "document", "github"].iter().enumerate() {
            DatabaseOperations::record_analysis(
                &pool,
                &AnalysisRecord {
                    id: format!("job-{i}"),
                    user_email: "a@b.com".to_string(),
                    kind: kind.to_string(),
                    name: format!("analysis {i}"),
                    created_at: format!("2026-08-0{}T00:00:00Z", i + 1),
                    duration_ms: 1200,
                    is_mock: i % 2 == 0,
                },
            )
            .await
            .unwrap();
        }

        let recent = DatabaseOperations::recent_analyses(&pool, "a@b.com", 50)
            .await
            .unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].id, "job-3"); // newest first

        let (github, security, document) =
            DatabaseOperations::kind_counts(&pool, "a@b.com").await.unwrap();
        assert_eq!((github, security, document), (2, 1, 1));
    }
}
