//! Postgres implementation of the RoutingRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::errors::DomainResult;
use crate::domain::models::{KeywordToolScore, RoutingStats, ToolTypeCount};
use crate::domain::ports::RoutingRepository;

#[derive(Clone)]
pub struct PgRoutingRepository {
    pool: PgPool,
}

impl PgRoutingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScoreRow {
    id: i64,
    keyword: String,
    tool_name: String,
    tool_type: Option<String>,
    score: f64,
    usage_count: i64,
    success_count: i64,
    last_used: Option<DateTime<Utc>>,
}

impl From<ScoreRow> for KeywordToolScore {
    fn from(r: ScoreRow) -> Self {
        KeywordToolScore {
            id: r.id,
            keyword: r.keyword,
            tool_name: r.tool_name,
            tool_type: r.tool_type,
            score: r.score,
            usage_count: r.usage_count,
            success_count: r.success_count,
            last_used: r.last_used,
        }
    }
}

const COLUMNS: &str =
    "id, keyword, tool_name, tool_type, score, usage_count, success_count, last_used";

#[async_trait]
impl RoutingRepository for PgRoutingRepository {
    async fn pairs_for_keywords(&self, keywords: &[String]) -> DomainResult<Vec<KeywordToolScore>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM keyword_tool_scores WHERE keyword = ANY($1)"
        ))
        .bind(keywords)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_pair(
        &self,
        keyword: &str,
        tool_name: &str,
    ) -> DomainResult<Option<KeywordToolScore>> {
        let row: Option<ScoreRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM keyword_tool_scores WHERE keyword = $1 AND tool_name = $2"
        ))
        .bind(keyword)
        .bind(tool_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_pair(
        &self,
        keyword: &str,
        tool_name: &str,
        tool_type: Option<&str>,
        score: f64,
        increment_success: bool,
        last_used: DateTime<Utc>,
    ) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO keyword_tool_scores
               (keyword, tool_name, tool_type, score, usage_count, success_count, last_used)
               VALUES ($1, $2, $3, $4, 1, CASE WHEN $5 THEN 1 ELSE 0 END, $6)
               ON CONFLICT (keyword, tool_name) DO UPDATE SET
                   tool_type = COALESCE(EXCLUDED.tool_type, keyword_tool_scores.tool_type),
                   score = $4,
                   usage_count = keyword_tool_scores.usage_count + 1,
                   success_count = keyword_tool_scores.success_count
                                   + CASE WHEN $5 THEN 1 ELSE 0 END,
                   last_used = $6"#,
        )
        .bind(keyword)
        .bind(tool_name)
        .bind(tool_type)
        .bind(score)
        .bind(increment_success)
        .bind(last_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_feedback(&self, accepted: bool, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query("INSERT INTO routing_feedback (accepted, created_at) VALUES ($1, $2)")
            .bind(accepted)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stats(&self, accuracy_window_start: DateTime<Utc>) -> DomainResult<RoutingStats> {
        let totals: (i64, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(usage_count), SUM(success_count) FROM keyword_tool_scores",
        )
        .fetch_one(&self.pool)
        .await?;

        let top_by_usage: Vec<ScoreRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM keyword_tool_scores ORDER BY usage_count DESC LIMIT 10"
        ))
        .fetch_all(&self.pool)
        .await?;

        let top_by_score: Vec<ScoreRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM keyword_tool_scores ORDER BY score DESC LIMIT 10"
        ))
        .fetch_all(&self.pool)
        .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT COALESCE(tool_type, 'unknown'), COUNT(*)
               FROM keyword_tool_scores GROUP BY 1 ORDER BY 2 DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let accuracy: Option<(i64, i64)> = sqlx::query_as(
            r#"SELECT COUNT(*) FILTER (WHERE accepted), COUNT(*)
               FROM routing_feedback WHERE created_at >= $1"#,
        )
        .bind(accuracy_window_start)
        .fetch_optional(&self.pool)
        .await?;

        Ok(RoutingStats {
            total_pairs: totals.0,
            total_usage: totals.1.unwrap_or(0),
            total_success: totals.2.unwrap_or(0),
            top_by_usage: top_by_usage.into_iter().map(Into::into).collect(),
            top_by_score: top_by_score.into_iter().map(Into::into).collect(),
            by_tool_type: by_type
                .into_iter()
                .map(|(tool_type, count)| ToolTypeCount { tool_type, count })
                .collect(),
            accuracy: accuracy.and_then(|(accepted, total)| {
                (total > 0).then(|| accepted as f64 / total as f64)
            }),
        })
    }
}
