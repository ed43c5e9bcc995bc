//! Keyword-to-tool routing score model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score bounds after any sequence of feedback updates.
pub const MIN_TOOL_SCORE: f64 = 0.0;
pub const MAX_TOOL_SCORE: f64 = 10.0;

/// One (keyword, tool) scoring row. The pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordToolScore {
    pub id: i64,
    pub keyword: String,
    pub tool_name: String,
    pub tool_type: Option<String>,
    pub score: f64,
    pub usage_count: i64,
    pub success_count: i64,
    pub last_used: Option<DateTime<Utc>>,
}

/// One suggested tool with its accumulated score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSuggestion {
    pub tool_name: String,
    pub tool_type: Option<String>,
    pub score: f64,
    pub usage_count: i64,
    pub matched_keywords: Vec<String>,
}

/// Filters applied to suggestion queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestFilters {
    #[serde(default)]
    pub include_types: Vec<String>,
    #[serde(default)]
    pub exclude_types: Vec<String>,
    pub min_score: Option<f64>,
    pub limit: Option<usize>,
}

/// Feedback on a suggestion round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingFeedback {
    pub keywords: Vec<String>,
    pub selected_tool: String,
    #[serde(default)]
    pub suggested_tools: Vec<String>,
    pub accepted: bool,
}

/// Aggregated routing statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total_pairs: i64,
    pub total_usage: i64,
    pub total_success: i64,
    pub top_by_usage: Vec<KeywordToolScore>,
    pub top_by_score: Vec<KeywordToolScore>,
    pub by_tool_type: Vec<ToolTypeCount>,
    /// `accepted_feedback / total_feedback` over the KPI window.
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTypeCount {
    pub tool_type: String,
    pub count: i64,
}

/// Normalize a raw comma-separated keyword string into lowercase trimmed
/// tokens, dropping empties.
pub fn normalize_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Clamp a score into the permitted range.
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(MIN_TOOL_SCORE, MAX_TOOL_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_normalize_and_drop_empties() {
        assert_eq!(
            normalize_keywords("Optimize, REACT , ,rust"),
            vec!["optimize", "react", "rust"]
        );
        assert!(normalize_keywords(" , ,").is_empty());
    }

    #[test]
    fn scores_clamp_to_bounds() {
        assert_eq!(clamp_score(-1.0), 0.0);
        assert_eq!(clamp_score(10.5), 10.0);
        assert_eq!(clamp_score(4.2), 4.2);
    }
}
