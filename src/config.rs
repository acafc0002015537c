//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PILOT__*` 覆盖（双下划线表示嵌套，如 `PILOT__AGENT__MAX_TURNS=40`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub browser: BrowserSection,
    pub analysis: AnalysisSection,
    pub confirm: ConfirmSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// system prompt 文件，未设置时按默认路径查找，找不到则用内置 prompt
    pub system_prompt_path: Option<PathBuf>,
}

/// [llm] 段：OpenAI 兼容端点、模型与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_model(),
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [agent] 段：任务循环的预算、阈值与完成判定关键词
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 单个任务最多调用模型的轮数
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// 连续格式错误达到此值即放弃任务
    #[serde(default = "default_max_format_errors")]
    pub max_format_errors: usize,
    /// 连续空白页达到此值触发恢复导航
    #[serde(default = "default_blank_page_threshold")]
    pub blank_page_threshold: usize,
    /// 前 N 轮不做「完成」判定，避免开场白误判
    #[serde(default = "default_warmup_turns")]
    pub warmup_turns: usize,
    /// 卡住时回到的锚点页面
    #[serde(default = "default_anchor_url")]
    pub anchor_url: String,
    /// 回复短于此字符数时即使含 "tool" 也允许判定完成
    #[serde(default = "default_long_reply_chars")]
    pub long_reply_chars: usize,
    #[serde(default = "default_completion_phrases")]
    pub completion_phrases: Vec<String>,
    #[serde(default = "default_summary_keywords")]
    pub summary_keywords: Vec<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_format_errors: default_max_format_errors(),
            blank_page_threshold: default_blank_page_threshold(),
            warmup_turns: default_warmup_turns(),
            anchor_url: default_anchor_url(),
            long_reply_chars: default_long_reply_chars(),
            completion_phrases: default_completion_phrases(),
            summary_keywords: default_summary_keywords(),
        }
    }
}

fn default_max_turns() -> usize {
    30
}

fn default_max_format_errors() -> usize {
    3
}

fn default_blank_page_threshold() -> usize {
    3
}

fn default_warmup_turns() -> usize {
    3
}

fn default_anchor_url() -> String {
    "https://yandex.ru".to_string()
}

fn default_long_reply_chars() -> usize {
    100
}

fn default_completion_phrases() -> Vec<String> {
    vec![
        "задача выполнена".into(),
        "готово".into(),
        "успешно завершено".into(),
    ]
}

fn default_summary_keywords() -> Vec<String> {
    vec![
        "итог".into(),
        "результат".into(),
        "ответ".into(),
        "вывод".into(),
        "отчёт".into(),
    ]
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [browser] 段：Chrome 启动参数
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

/// [analysis] 段：分析子程序中每条文本的截断长度（字符）
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSection {
    #[serde(default = "default_spam_item_chars")]
    pub spam_item_chars: usize,
    #[serde(default = "default_job_item_chars")]
    pub job_item_chars: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            spam_item_chars: default_spam_item_chars(),
            job_item_chars: default_job_item_chars(),
        }
    }
}

fn default_spam_item_chars() -> usize {
    300
}

fn default_job_item_chars() -> usize {
    500
}

/// [confirm] 段：危险动作确认的词表
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmSection {
    /// 跳过交互，所有危险动作直接放行（仅用于无人值守场景）
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_yes_words")]
    pub yes: Vec<String>,
    #[serde(default = "default_no_words")]
    pub no: Vec<String>,
}

impl Default for ConfirmSection {
    fn default() -> Self {
        Self {
            auto_approve: false,
            yes: default_yes_words(),
            no: default_no_words(),
        }
    }
}

fn default_yes_words() -> Vec<String> {
    vec!["да".into(), "д".into(), "y".into(), "yes".into()]
}

fn default_no_words() -> Vec<String> {
    vec!["нет".into(), "н".into(), "n".into(), "no".into()]
}

/// 从 config 目录加载配置，环境变量 PILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PILOT")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("agent.completion_phrases")
            .with_list_parse_key("agent.summary_keywords")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_loop_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_turns, 30);
        assert_eq!(cfg.agent.max_format_errors, 3);
        assert_eq!(cfg.agent.blank_page_threshold, 3);
        assert_eq!(cfg.agent.anchor_url, "https://yandex.ru");
        assert!(cfg.agent.summary_keywords.contains(&"итог".to_string()));
        assert_eq!(cfg.analysis.spam_item_chars, 300);
        assert_eq!(cfg.analysis.job_item_chars, 500);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\nmax_turns = 12\nanchor_url = \"https://example.com\"\n\n[analysis]\nspam_item_chars = 80"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.agent.max_turns, 12);
        assert_eq!(cfg.agent.anchor_url, "https://example.com");
        assert_eq!(cfg.analysis.spam_item_chars, 80);
        // 未出现的键保持默认
        assert_eq!(cfg.agent.max_format_errors, 3);
        assert_eq!(cfg.analysis.job_item_chars, 500);
    }
}
