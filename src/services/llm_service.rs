//! LLM 服务 - 业务能力层
//!
//! 只负责"一次生成调用"能力，不关心提示词内容，也不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure OpenAI 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 获取一段文本响应
/// - 单次往返，不做流式消费
/// - 不出现 Question / Vec<Question>
/// - 不关心提示词怎么拼出来的
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// 这是最基础的 LLM 调用接口，生成题目和生成变体都走这里。
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）。超时、非成功响应、空载荷
    /// 都作为整次调用的硬失败返回。
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        // 构建消息列表
        let mut messages = Vec::new();

        // 添加系统消息（如果提供）
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        // 添加用户消息
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.7)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        // 调用 API，套一层有界超时：生成调用是流水线里唯一的长延迟操作
        let response = match timeout(self.timeout, self.client.chat().create(request)).await {
            Ok(result) => result.map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                AppError::llm_api_failed(&self.model_name, e)
            })?,
            Err(_) => {
                warn!("LLM API 调用超时（{}秒）", self.timeout.as_secs());
                return Err(AppError::Llm(LlmError::Timeout {
                    model: self.model_name.clone(),
                    seconds: self.timeout.as_secs(),
                }));
            }
        };

        debug!("LLM API 调用成功");

        // 提取响应内容
        let choice = response.choices.first().ok_or_else(|| {
            AppError::Llm(LlmError::EmptyResponse {
                model: self.model_name.clone(),
            })
        })?;
        let content = choice.message.content.clone().ok_or_else(|| {
            AppError::Llm(LlmError::EmptyContent {
                model: self.model_name.clone(),
            })
        })?;

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Llm(LlmError::EmptyContent {
                model: self.model_name.clone(),
            }));
        }

        Ok(content)
    }
}
