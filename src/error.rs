use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// LLM 服务错误
    Llm(LlmError),
    /// 解析错误（单个题目块级别）
    Parse(ParseError),
    /// 存储层错误
    Storage(StorageError),
    /// 文件操作错误
    File(FileError),
    /// 业务逻辑错误
    Business(BusinessError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Llm(e) => write!(f, "LLM错误: {}", e),
            AppError::Parse(e) => write!(f, "解析错误: {}", e),
            AppError::Storage(e) => write!(f, "存储错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Business(e) => write!(f, "业务错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Llm(e) => Some(e),
            AppError::Parse(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Business(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// LLM 服务错误
#[derive(Debug)]
pub enum LlmError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回结果为空
    EmptyResponse {
        model: String,
    },
    /// 返回内容为空
    EmptyContent {
        model: String,
    },
    /// 请求超时
    Timeout {
        model: String,
        seconds: u64,
    },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ApiCallFailed { model, source } => {
                write!(f, "LLM API调用失败 (模型: {}): {}", model, source)
            }
            LlmError::EmptyResponse { model } => {
                write!(f, "LLM返回结果为空 (模型: {})", model)
            }
            LlmError::EmptyContent { model } => {
                write!(f, "LLM返回内容为空 (模型: {})", model)
            }
            LlmError::Timeout { model, seconds } => {
                write!(f, "LLM请求超时 (模型: {}, {}秒)，可稍后重试", model, seconds)
            }
        }
    }
}

impl std::error::Error for LlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LlmError::ApiCallFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 解析错误
///
/// 只描述单个题目块的失败；解析器会丢弃失败的块并继续处理下一个，
/// 绝不因为一个坏块让整批解析中断。
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// 必填字段缺失
    MissingField { field: &'static str },
    /// 没有解析出任何选项
    NoOptions,
    /// 选择题的选项数量不足
    NotEnoughOptions { count: usize },
    /// 单元上下文为空
    EmptyUnit,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingField { field } => {
                write!(f, "必填字段 {} 缺失", field)
            }
            ParseError::NoOptions => write!(f, "题目块中没有任何选项"),
            ParseError::NotEnoughOptions { count } => {
                write!(f, "选择题至少需要 2 个选项，实际只有 {} 个", count)
            }
            ParseError::EmptyUnit => write!(f, "单元上下文为空"),
        }
    }
}

impl std::error::Error for ParseError {}

/// 存储层错误
#[derive(Debug)]
pub enum StorageError {
    /// 网络请求失败
    RequestFailed {
        table: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 存储端返回错误响应
    BadResponse {
        table: String,
        status: u16,
        body: String,
    },
    /// 父记录已写入但子表写入失败（需要人工修复）
    PartialInsert {
        question_key: String,
        table: String,
        detail: String,
    },
    /// 行数据反序列化失败
    RowDecodeFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RequestFailed { table, source } => {
                write!(f, "存储请求失败 (表: {}): {}", table, source)
            }
            StorageError::BadResponse {
                table,
                status,
                body,
            } => {
                write!(
                    f,
                    "存储端返回错误响应 (表: {}, 状态: {}): {}",
                    table, status, body
                )
            }
            StorageError::PartialInsert {
                question_key,
                table,
                detail,
            } => {
                write!(
                    f,
                    "题目 {} 主记录已写入，但子表 {} 写入失败: {}",
                    question_key, table, detail
                )
            }
            StorageError::RowDecodeFailed { source } => {
                write!(f, "行数据反序列化失败: {}", source)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::RequestFailed { source, .. }
            | StorageError::RowDecodeFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 业务逻辑错误
#[derive(Debug)]
pub enum BusinessError {
    /// 唯一 key 生成超过重试上限
    KeyGenerationExhausted {
        base_key: String,
        attempts: usize,
    },
    /// 指定的基础题不存在
    BaseQuestionNotFound {
        question_key: String,
    },
    /// 未知的运行模式
    UnknownMode {
        mode: String,
    },
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::KeyGenerationExhausted { base_key, attempts } => {
                write!(
                    f,
                    "无法为 {} 生成唯一 key（已尝试 {} 次）",
                    base_key, attempts
                )
            }
            BusinessError::BaseQuestionNotFound { question_key } => {
                write!(f, "基础题 {} 不存在", question_key)
            }
            BusinessError::UnknownMode { mode } => {
                write!(f, "未知的运行模式: {}（支持 generate / variants）", mode)
            }
        }
    }
}

impl std::error::Error for BusinessError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置值非法
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// 必要配置缺失
    MissingValue {
        field: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(f, "配置项 {} 的值 '{}' 非法: {}", field, value, reason)
            }
            ConfigError::MissingValue { field } => {
                write!(f, "缺少必要配置项: {}", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(StorageError::RowDecodeFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(), // IO 错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建 LLM API 调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建存储请求失败错误
    pub fn storage_request_failed(
        table: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Storage(StorageError::RequestFailed {
            table: table.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
