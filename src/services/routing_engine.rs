//! Keyword-to-tool routing engine.
//!
//! Suggestion scores sum the stored per-keyword scores for each tool; all
//! learning happens at feedback time. Nudge constants: an accepted
//! selection gains `0.3 * (1 - score/10)` (asymptotic toward the cap),
//! suggested-but-unselected tools lose 0.05, and on rejection every
//! suggested tool loses 0.1 while the tool the agent picked anyway is left
//! untouched. Scores stay within [0, 10].

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    clamp_score, normalize_keywords, KeywordToolScore, RoutingFeedback, RoutingStats,
    SuggestFilters, ToolSuggestion, MAX_TOOL_SCORE,
};
use crate::domain::ports::RoutingRepository;

/// Learning rate for accepted selections.
const ACCEPT_ALPHA: f64 = 0.3;
/// Penalty for suggested tools passed over in an accepted round.
const UNSELECTED_DECREMENT: f64 = 0.05;
/// Penalty for suggested tools in a rejected round.
const REJECT_DECREMENT: f64 = 0.1;
/// Score granted to a (keyword, tool) pair on first sight.
const INITIAL_SCORE: f64 = 1.0;
/// Accuracy KPI window.
const ACCURACY_WINDOW_DAYS: i64 = 7;

const DEFAULT_SUGGEST_LIMIT: usize = 10;

pub struct RoutingEngine {
    scores: Arc<dyn RoutingRepository>,
}

impl RoutingEngine {
    pub fn new(scores: Arc<dyn RoutingRepository>) -> Self {
        Self { scores }
    }

    /// Rank tools for a comma-separated keyword string.
    pub async fn suggest(
        &self,
        raw_keywords: &str,
        filters: SuggestFilters,
    ) -> DomainResult<Vec<ToolSuggestion>> {
        let keywords = normalize_keywords(raw_keywords);
        if keywords.is_empty() {
            return Err(DomainError::validation("keywords", "no usable keywords"));
        }

        let pairs = self.scores.pairs_for_keywords(&keywords).await?;

        let mut by_tool: HashMap<String, ToolSuggestion> = HashMap::new();
        for pair in pairs {
            let entry = by_tool
                .entry(pair.tool_name.clone())
                .or_insert_with(|| ToolSuggestion {
                    tool_name: pair.tool_name.clone(),
                    tool_type: pair.tool_type.clone(),
                    score: 0.0,
                    usage_count: 0,
                    matched_keywords: Vec::new(),
                });
            entry.score += pair.score;
            entry.usage_count += pair.usage_count;
            entry.matched_keywords.push(pair.keyword);
            if entry.tool_type.is_none() {
                entry.tool_type = pair.tool_type;
            }
        }

        let mut suggestions: Vec<ToolSuggestion> = by_tool
            .into_values()
            .filter(|s| {
                if let Some(min_score) = filters.min_score {
                    if s.score < min_score {
                        return false;
                    }
                }
                if !filters.include_types.is_empty() {
                    match &s.tool_type {
                        Some(t) => {
                            if !filters.include_types.contains(t) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                if let Some(t) = &s.tool_type {
                    if filters.exclude_types.contains(t) {
                        return false;
                    }
                }
                true
            })
            .collect();

        // Score desc, then usage desc, then name asc for stable ties.
        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.usage_count.cmp(&a.usage_count))
                .then(a.tool_name.cmp(&b.tool_name))
        });
        suggestions.truncate(filters.limit.unwrap_or(DEFAULT_SUGGEST_LIMIT));
        Ok(suggestions)
    }

    /// Apply one round of feedback across every touched (keyword, tool)
    /// pair.
    pub async fn feedback(&self, feedback: RoutingFeedback) -> DomainResult<()> {
        let keywords: Vec<String> = feedback
            .keywords
            .iter()
            .flat_map(|k| normalize_keywords(k))
            .collect();
        if keywords.is_empty() {
            return Err(DomainError::validation("keywords", "no usable keywords"));
        }
        if feedback.selected_tool.trim().is_empty() {
            return Err(DomainError::validation("selected_tool", "must not be empty"));
        }

        let mut tools: Vec<String> = feedback.suggested_tools.clone();
        if !tools.contains(&feedback.selected_tool) {
            tools.push(feedback.selected_tool.clone());
        }

        let now = Utc::now();
        for keyword in &keywords {
            for tool in &tools {
                let selected = *tool == feedback.selected_tool;
                let current = self
                    .scores
                    .get_pair(keyword, tool)
                    .await?
                    .map_or(INITIAL_SCORE, |pair| pair.score);

                let next = if feedback.accepted {
                    if selected {
                        current + ACCEPT_ALPHA * (1.0 - current / MAX_TOOL_SCORE)
                    } else {
                        current - UNSELECTED_DECREMENT
                    }
                } else if selected {
                    // The agent overrode the suggestions; its own pick is a
                    // neutral signal.
                    current
                } else {
                    current - REJECT_DECREMENT
                };

                self.scores
                    .upsert_pair(
                        keyword,
                        tool,
                        None,
                        clamp_score(next),
                        feedback.accepted && selected,
                        now,
                    )
                    .await?;
            }
        }

        self.scores.record_feedback(feedback.accepted, now).await
    }

    pub async fn stats(&self) -> DomainResult<RoutingStats> {
        let window_start = Utc::now() - Duration::days(ACCURACY_WINDOW_DAYS);
        self.scores.stats(window_start).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use tokio::sync::Mutex;

    /// In-memory routing rows for exercising the scoring math.
    #[derive(Default)]
    struct FakeRoutingRepository {
        rows: Mutex<Vec<KeywordToolScore>>,
        feedback: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl RoutingRepository for FakeRoutingRepository {
        async fn pairs_for_keywords(
            &self,
            keywords: &[String],
        ) -> DomainResult<Vec<KeywordToolScore>> {
            Ok(self
                .rows
                .lock()
                .await
                .iter()
                .filter(|r| keywords.contains(&r.keyword))
                .cloned()
                .collect())
        }

        async fn get_pair(
            &self,
            keyword: &str,
            tool_name: &str,
        ) -> DomainResult<Option<KeywordToolScore>> {
            Ok(self
                .rows
                .lock()
                .await
                .iter()
                .find(|r| r.keyword == keyword && r.tool_name == tool_name)
                .cloned())
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
            let mut rows = self.rows.lock().await;
            if let Some(row) = rows
                .iter_mut()
                .find(|r| r.keyword == keyword && r.tool_name == tool_name)
            {
                row.score = score;
                row.usage_count += 1;
                if increment_success {
                    row.success_count += 1;
                }
                row.last_used = Some(last_used);
            } else {
                let next_id = rows.len() as i64 + 1;
                rows.push(KeywordToolScore {
                    id: next_id,
                    keyword: keyword.to_string(),
                    tool_name: tool_name.to_string(),
                    tool_type: tool_type.map(String::from),
                    score,
                    usage_count: 1,
                    success_count: i64::from(increment_success),
                    last_used: Some(last_used),
                });
            }
            Ok(())
        }

        async fn record_feedback(&self, accepted: bool, _at: DateTime<Utc>) -> DomainResult<()> {
            self.feedback.lock().await.push(accepted);
            Ok(())
        }

        async fn stats(&self, _window: DateTime<Utc>) -> DomainResult<RoutingStats> {
            let feedback = self.feedback.lock().await;
            let total = feedback.len() as i64;
            let accepted = feedback.iter().filter(|a| **a).count() as i64;
            Ok(RoutingStats {
                accuracy: (total > 0).then(|| accepted as f64 / total as f64),
                ..RoutingStats::default()
            })
        }
    }

    fn engine() -> (RoutingEngine, Arc<FakeRoutingRepository>) {
        let repo = Arc::new(FakeRoutingRepository::default());
        (RoutingEngine::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn accepted_feedback_raises_selected_tool_rank() {
        let (engine, repo) = engine();

        engine
            .feedback(RoutingFeedback {
                keywords: vec!["optimize".into(), "react".into()],
                selected_tool: "frontend-react".into(),
                suggested_tools: vec!["generic-tool".into()],
                accepted: true,
            })
            .await
            .unwrap();

        let selected = repo.get_pair("optimize", "frontend-react").await.unwrap().unwrap();
        let passed_over = repo.get_pair("optimize", "generic-tool").await.unwrap().unwrap();
        assert!(selected.score > INITIAL_SCORE);
        assert!(passed_over.score < INITIAL_SCORE);
        assert_eq!(selected.success_count, 1);
        assert_eq!(passed_over.success_count, 0);

        let suggestions = engine
            .suggest("optimize,react", SuggestFilters::default())
            .await
            .unwrap();
        assert_eq!(suggestions[0].tool_name, "frontend-react");
    }

    #[tokio::test]
    async fn repeated_acceptance_stays_within_bounds() {
        let (engine, repo) = engine();
        for _ in 0..200 {
            engine
                .feedback(RoutingFeedback {
                    keywords: vec!["deploy".into()],
                    selected_tool: "deployer".into(),
                    suggested_tools: vec![],
                    accepted: true,
                })
                .await
                .unwrap();
        }
        let row = repo.get_pair("deploy", "deployer").await.unwrap().unwrap();
        assert!(row.score <= MAX_TOOL_SCORE);
        assert!(row.score > 9.0);
    }

    #[tokio::test]
    async fn repeated_rejection_clamps_at_zero() {
        let (engine, repo) = engine();
        for _ in 0..100 {
            engine
                .feedback(RoutingFeedback {
                    keywords: vec!["deploy".into()],
                    selected_tool: "manual".into(),
                    suggested_tools: vec!["deployer".into()],
                    accepted: false,
                })
                .await
                .unwrap();
        }
        let rejected = repo.get_pair("deploy", "deployer").await.unwrap().unwrap();
        assert_eq!(rejected.score, 0.0);
        // The agent's own pick is a neutral signal on rejection.
        let selected = repo.get_pair("deploy", "manual").await.unwrap().unwrap();
        assert_eq!(selected.score, INITIAL_SCORE);
    }

    #[tokio::test]
    async fn suggestion_filters_apply() {
        let (engine, repo) = engine();
        repo.upsert_pair("k", "a-tool", Some("agent"), 5.0, false, Utc::now())
            .await
            .unwrap();
        repo.upsert_pair("k", "b-tool", Some("skill"), 4.0, false, Utc::now())
            .await
            .unwrap();

        let only_agents = engine
            .suggest(
                "k",
                SuggestFilters {
                    include_types: vec!["agent".into()],
                    ..SuggestFilters::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(only_agents.len(), 1);
        assert_eq!(only_agents[0].tool_name, "a-tool");

        let high_bar = engine
            .suggest(
                "k",
                SuggestFilters {
                    min_score: Some(4.5),
                    ..SuggestFilters::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(high_bar.len(), 1);
    }

    #[tokio::test]
    async fn ties_break_by_usage_then_name() {
        let (engine, repo) = engine();
        repo.upsert_pair("k", "zeta", None, 3.0, false, Utc::now()).await.unwrap();
        repo.upsert_pair("k", "alpha", None, 3.0, false, Utc::now()).await.unwrap();

        let suggestions = engine.suggest("k", SuggestFilters::default()).await.unwrap();
        assert_eq!(suggestions[0].tool_name, "alpha");
        assert_eq!(suggestions[1].tool_name, "zeta");
    }

    #[tokio::test]
    async fn accuracy_tracks_accept_ratio() {
        let (engine, _repo) = engine();
        for accepted in [true, true, false, true] {
            engine
                .feedback(RoutingFeedback {
                    keywords: vec!["k".into()],
                    selected_tool: "t".into(),
                    suggested_tools: vec![],
                    accepted,
                })
                .await
                .unwrap();
        }
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.accuracy, Some(0.75));
    }
}
