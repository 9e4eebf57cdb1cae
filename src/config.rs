use serde::Deserialize;
use std::fs;
use tracing::warn;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 运行模式：generate（从内容生成新题）或 variants（为基础题生成变体）
    pub mode: String,
    /// 目标单元ID
    pub unit_id: String,
    /// 目标单元标题
    pub unit_title: String,
    /// generate 模式：教学内容文件路径
    pub content_file: String,
    /// generate 模式：期望生成的题目数量
    pub question_count: usize,
    /// variants 模式：指定的基础题 key 列表；为空则处理单元内全部 BASE 题
    pub variant_base_keys: Vec<String>,
    /// 每道基础题生成的变体数量
    pub variant_count: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    // --- 存储（Supabase）配置 ---
    pub supabase_url: String,
    pub supabase_api_key: String,
    pub storage_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: "generate".to_string(),
            unit_id: String::new(),
            unit_title: String::new(),
            content_file: "content.md".to_string(),
            question_count: 10,
            variant_base_keys: Vec::new(),
            variant_count: 3,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_max_tokens: 2000,
            llm_timeout_secs: 120,
            supabase_url: String::new(),
            supabase_api_key: String::new(),
            storage_timeout_secs: 30,
        }
    }
}

impl Config {
    /// 加载配置：先读 config.toml（可缺省），再用环境变量覆盖
    pub fn load() -> Self {
        let base = match fs::read_to_string("config.toml") {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("⚠️ config.toml 解析失败，使用默认配置: {}", e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        base.apply_env()
    }

    /// 用环境变量覆盖已有配置
    pub fn apply_env(self) -> Self {
        Self {
            mode: std::env::var("MCQ_MODE").unwrap_or(self.mode),
            unit_id: std::env::var("MCQ_UNIT_ID").unwrap_or(self.unit_id),
            unit_title: std::env::var("MCQ_UNIT_TITLE").unwrap_or(self.unit_title),
            content_file: std::env::var("MCQ_CONTENT_FILE").unwrap_or(self.content_file),
            question_count: std::env::var("MCQ_QUESTION_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(self.question_count),
            variant_base_keys: std::env::var("MCQ_VARIANT_BASE_KEYS")
                .map(|v| v.split(',').map(|k| k.trim().to_string()).filter(|k| !k.is_empty()).collect())
                .unwrap_or(self.variant_base_keys),
            variant_count: std::env::var("MCQ_VARIANT_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(self.variant_count),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.llm_max_tokens),
            llm_timeout_secs: std::env::var("LLM_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.llm_timeout_secs),
            supabase_url: std::env::var("SUPABASE_URL").unwrap_or(self.supabase_url),
            supabase_api_key: std::env::var("SUPABASE_API_KEY").unwrap_or(self.supabase_api_key),
            storage_timeout_secs: std::env::var("STORAGE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.storage_timeout_secs),
        }
    }
}
