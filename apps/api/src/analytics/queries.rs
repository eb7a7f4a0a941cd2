use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::analytics::AnalyticsRow;

/// Midnight UTC on the first day of `now`'s calendar month.
pub fn start_of_month(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let first = now
        .date_naive()
        .with_day(1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .context("first day of month is not representable")?;
    Ok(first.and_utc())
}

pub async fn posts_created_since(pool: &PgPool, user_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_id = $1 AND created_at >= $2")
            .bind(user_id)
            .bind(since)
            .fetch_one(pool)
            .await?,
    )
}

pub async fn scheduled_count(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    Ok(sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts WHERE user_id = $1 AND status = 'scheduled'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?)
}

pub async fn latest_analytics(pool: &PgPool, user_id: Uuid) -> Result<Option<AnalyticsRow>> {
    Ok(sqlx::query_as::<_, AnalyticsRow>(
        "SELECT * FROM analytics WHERE user_id = $1 ORDER BY date DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_start_of_month_truncates_to_first_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 15, 42, 9).unwrap();
        let start = start_of_month(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_start_of_month_on_the_first() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(start_of_month(now).unwrap(), now);
    }
}
