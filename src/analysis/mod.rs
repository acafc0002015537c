//! 内容分析子程序：一次模型调用对一批文本做分类（垃圾邮件 / 职位匹配度）
//!
//! 流程：拼 prompt → 单次调用 → 提取首个 JSON 对象 → 逐条解析 → 本地重算汇总。
//! 解析失败时返回带原始回复的错误，不自动重试；不跨调用保留任何状态。

pub mod prompt;
pub mod report;

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::AnalysisSection;
use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::react::parse_json_object;
use crate::tools::ToolOutcome;

pub use report::{
    AnalysisReport, JobVerdict, RelevanceBand, RelevanceSummary, SpamSummary, SpamVerdict,
};

/// 分析类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Spam,
    JobRelevance,
}

impl AnalysisKind {
    /// 解析工具参数中的 type 字段
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "spam" | "спам" => Some(AnalysisKind::Spam),
            "jobs" | "job" | "job_relevance" | "вакансии" => Some(AnalysisKind::JobRelevance),
            _ => None,
        }
    }
}

/// 一次分析请求；context 对职位匹配是候选人画像
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub kind: AnalysisKind,
    pub items: Vec<String>,
    pub context: Option<String>,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("LLM error: {0}")]
    Transport(#[from] LlmError),

    /// 回复中没有可解析的 JSON 对象，raw 为原始回复
    #[error("Не удалось распарсить ответ модели")]
    Unparseable { raw: String },
}

impl AnalysisError {
    /// 转为失败的工具结果；解析失败时附带原始回复供排查
    pub fn to_outcome(&self) -> ToolOutcome {
        let outcome = ToolOutcome::failure(self.to_string());
        match self {
            AnalysisError::Unparseable { raw } => outcome.with("raw_response", raw.clone()),
            AnalysisError::Transport(_) => outcome,
        }
    }
}

/// 分析器：持有 LLM 与截断配置
pub struct Analyzer {
    llm: Arc<dyn LlmClient>,
    spam_item_chars: usize,
    job_item_chars: usize,
}

impl Analyzer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::from_config(llm, &AnalysisSection::default())
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, section: &AnalysisSection) -> Self {
        Self {
            llm,
            spam_item_chars: section.spam_item_chars,
            job_item_chars: section.job_item_chars,
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        let total = request.items.len();
        if total == 0 {
            // 没有条目时不调用模型
            return Ok(Self::report_from(request.kind, &Map::new(), 0));
        }
        let prompt = match request.kind {
            AnalysisKind::Spam => prompt::spam_prompt(&request.items, self.spam_item_chars),
            AnalysisKind::JobRelevance => prompt::job_prompt(
                &request.items,
                request.context.as_deref(),
                self.job_item_chars,
            ),
        };

        tracing::info!(kind = ?request.kind, items = total, "sub-agent analysis");
        let raw = self.llm.complete(&[Message::user(prompt)]).await?;

        let Some(parsed) = parse_json_object(&raw) else {
            tracing::warn!(kind = ?request.kind, "analysis reply is not valid JSON");
            return Err(AnalysisError::Unparseable { raw });
        };

        let report = Self::report_from(request.kind, &parsed, total);
        tracing::info!(summary = %report.headline(), "analysis done");
        Ok(report)
    }

    fn report_from(kind: AnalysisKind, parsed: &Map<String, Value>, total: usize) -> AnalysisReport {
        match kind {
            AnalysisKind::Spam => AnalysisReport::spam_from_json(parsed, total),
            AnalysisKind::JobRelevance => AnalysisReport::jobs_from_json(parsed, total),
        }
    }
}
