//! 分析结果：逐条分类 + 本地重算的汇总
//!
//! 模型自报的 summary 一律丢弃；汇总是对 per_item 与条目总数的确定性折叠。

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::tools::ToolOutcome;

/// 高 / 中匹配度分界
pub const HIGH_RELEVANCE: f64 = 0.7;
pub const MEDIUM_RELEVANCE: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpamVerdict {
    pub index: usize,
    pub is_spam: bool,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobVerdict {
    pub index: usize,
    pub relevance_score: f64,
    pub key_matches: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpamSummary {
    pub total: usize,
    pub spam_count: usize,
    pub not_spam_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelevanceSummary {
    pub total: usize,
    pub high_relevance: usize,
    pub medium_relevance: usize,
    pub low_relevance: usize,
}

/// 匹配度分档
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceBand {
    High,
    Medium,
    Low,
}

impl RelevanceBand {
    pub fn of(score: f64) -> Self {
        if score >= HIGH_RELEVANCE {
            RelevanceBand::High
        } else if score >= MEDIUM_RELEVANCE {
            RelevanceBand::Medium
        } else {
            RelevanceBand::Low
        }
    }
}

impl SpamSummary {
    /// 没有判定的条目按「非垃圾」计
    pub fn fold(per_item: &[SpamVerdict], total: usize) -> Self {
        let mut flags: Vec<Option<bool>> = vec![None; total];
        for v in per_item.iter().filter(|v| v.index < total) {
            flags[v.index].get_or_insert(v.is_spam);
        }
        let spam_count = flags.iter().filter(|f| **f == Some(true)).count();
        Self {
            total,
            spam_count,
            not_spam_count: total - spam_count,
        }
    }
}

impl RelevanceSummary {
    /// 没有判定的条目按 0 分（低匹配）计
    pub fn fold(per_item: &[JobVerdict], total: usize) -> Self {
        let mut scores: Vec<Option<f64>> = vec![None; total];
        for v in per_item.iter().filter(|v| v.index < total) {
            scores[v.index].get_or_insert(v.relevance_score);
        }
        let mut summary = Self {
            total,
            high_relevance: 0,
            medium_relevance: 0,
            low_relevance: 0,
        };
        for score in scores {
            match RelevanceBand::of(score.unwrap_or(0.0)) {
                RelevanceBand::High => summary.high_relevance += 1,
                RelevanceBand::Medium => summary.medium_relevance += 1,
                RelevanceBand::Low => summary.low_relevance += 1,
            }
        }
        summary
    }
}

/// 完整分析报告
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisReport {
    Spam {
        per_item: Vec<SpamVerdict>,
        summary: SpamSummary,
    },
    JobRelevance {
        per_item: Vec<JobVerdict>,
        summary: RelevanceSummary,
    },
}

fn as_f64(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn as_bool(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "да"),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn as_string(v: Option<&Value>) -> String {
    v.and_then(Value::as_str).unwrap_or_default().to_string()
}

fn as_string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 取 analysis 数组中的对象条目：index 缺失时用数组位置；越界与重复的 index 丢弃（保留首个）
fn indexed_entries(parsed: &Map<String, Value>, total: usize) -> Vec<(usize, &Map<String, Value>)> {
    let mut seen = vec![false; total];
    parsed
        .get("analysis")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(pos, entry)| {
                    let obj = entry.as_object()?;
                    let index = obj
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|i| i as usize)
                        .unwrap_or(pos);
                    if index >= total || seen[index] {
                        return None;
                    }
                    seen[index] = true;
                    Some((index, obj))
                })
                .collect()
        })
        .unwrap_or_default()
}

impl AnalysisReport {
    pub fn spam_from_json(parsed: &Map<String, Value>, total: usize) -> Self {
        let per_item: Vec<SpamVerdict> = indexed_entries(parsed, total)
            .into_iter()
            .map(|(index, obj)| SpamVerdict {
                index,
                is_spam: as_bool(obj.get("is_spam")),
                confidence: as_f64(obj.get("confidence")),
                reason: as_string(obj.get("reason")),
            })
            .collect();
        let summary = SpamSummary::fold(&per_item, total);
        AnalysisReport::Spam { per_item, summary }
    }

    pub fn jobs_from_json(parsed: &Map<String, Value>, total: usize) -> Self {
        let per_item: Vec<JobVerdict> = indexed_entries(parsed, total)
            .into_iter()
            .map(|(index, obj)| JobVerdict {
                index,
                relevance_score: as_f64(obj.get("relevance_score")),
                key_matches: as_string_list(obj.get("key_matches")),
                missing_skills: as_string_list(obj.get("missing_skills")),
                recommendation: as_string(obj.get("recommendation")),
            })
            .collect();
        let summary = RelevanceSummary::fold(&per_item, total);
        AnalysisReport::JobRelevance { per_item, summary }
    }

    pub fn total(&self) -> usize {
        match self {
            AnalysisReport::Spam { summary, .. } => summary.total,
            AnalysisReport::JobRelevance { summary, .. } => summary.total,
        }
    }

    /// 一行汇总文本
    pub fn headline(&self) -> String {
        match self {
            AnalysisReport::Spam { summary, .. } => format!(
                "Анализ спама: {} из {} — спам, {} — не спам",
                summary.spam_count, summary.total, summary.not_spam_count
            ),
            AnalysisReport::JobRelevance { summary, .. } => format!(
                "Анализ вакансий ({}): высокая релевантность — {}, средняя — {}, низкая — {}",
                summary.total, summary.high_relevance, summary.medium_relevance, summary.low_relevance
            ),
        }
    }

    /// 每条一行，供写回对话
    pub fn formatted_items(&self) -> Vec<String> {
        match self {
            AnalysisReport::Spam { per_item, .. } => per_item
                .iter()
                .map(|v| {
                    format!(
                        "[{}] {} ({:.2}): {}",
                        v.index,
                        if v.is_spam { "СПАМ" } else { "не спам" },
                        v.confidence,
                        v.reason
                    )
                })
                .collect(),
            AnalysisReport::JobRelevance { per_item, .. } => per_item
                .iter()
                .map(|v| {
                    format!(
                        "[{}] {:.2} {}: совпадения {:?}, не хватает {:?}",
                        v.index, v.relevance_score, v.recommendation, v.key_matches, v.missing_skills
                    )
                })
                .collect(),
        }
    }

    pub fn to_outcome(&self) -> ToolOutcome {
        let summary = match self {
            AnalysisReport::Spam { summary, .. } => json!(summary),
            AnalysisReport::JobRelevance { summary, .. } => json!(summary),
        };
        ToolOutcome::ok(self.headline())
            .with("summary", summary)
            .with("formatted_items", json!(self.formatted_items()))
            .with("analysis", json!(self))
    }
}
