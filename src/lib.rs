//! SQL 课程选择题生成器
//!
//! 从教学内容生成新题、为已有基础题派生变体，并写入 Supabase 题库。
//!
//! ## 架构分层
//!
//! - `models`：数据模型（题目、选项、单元上下文）
//! - `parser`：LLM 响应的线上格式解析（`-END-` 分块 + `KEY: value` 字段）
//! - `services`：业务能力层（LLM 调用、提示词、存储、唯一 key）
//! - `workflow`：流程层（一道基础题的变体生成链路）
//! - `orchestrator`：编排层（模式分发、批量调度、统计）
//! - `config` / `error` / `logger`：配置、错误和日志基础设施

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod services;
pub mod utils;
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Question, UnitContext};
pub use orchestrator::App;
