//! 业务能力层
//!
//! 每个服务封装一种单一能力，互相之间不依赖：
//! - `llm_service`：一次 LLM 生成调用
//! - `prompt_builder`：生成/变体两类提示词的拼装
//! - `question_store`：Supabase 题库的读写
//! - `key_generator`：单元内唯一 question_key 的生成
//!
//! 能力的编排（谁先谁后、失败怎么处理）在 workflow / orchestrator 层

pub mod key_generator;
pub mod llm_service;
pub mod prompt_builder;
pub mod question_store;

pub use key_generator::{ensure_unique_key, KeyLookup};
pub use llm_service::LlmService;
pub use question_store::QuestionStore;
