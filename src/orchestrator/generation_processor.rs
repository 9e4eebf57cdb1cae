//! 新题生成处理器 - 编排层
//!
//! generate 模式的完整链路：读教学内容文件 → 拼提示词 → LLM 生成
//! → 解析 → 逐题去重入库。LLM 调用失败是整次运行的硬失败；
//! 解析出的单道题入库失败只记录不中断。

use anyhow::Result;
use std::fs;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::UnitContext;
use crate::parser::parse_response;
use crate::services::prompt_builder::{build_generation_prompt, GENERATION_SYSTEM_PROMPT};
use crate::services::{ensure_unique_key, LlmService, QuestionStore};
use crate::utils::logging::{print_final_stats, truncate_text};

/// 运行 generate 模式
pub async fn run(config: &Config, store: &QuestionStore) -> Result<()> {
    let unit = UnitContext::new(&config.unit_id, &config.unit_title);

    info!("\n📁 正在读取教学内容: {}", config.content_file);
    let content = fs::read_to_string(&config.content_file)
        .map_err(|e| AppError::file_read_failed(&config.content_file, e))?;
    info!("✓ 内容长度: {} 字符", content.chars().count());

    let prompt = build_generation_prompt(&content, config.question_count);
    if config.verbose_logging {
        info!("提示词预览: {}", truncate_text(&prompt, 200));
    }

    info!("🤖 正在调用 LLM 生成题目...");
    let llm = LlmService::new(config);
    let raw = llm
        .send_to_llm(&prompt, Some(GENERATION_SYSTEM_PROMPT))
        .await?;

    let questions = parse_response(&raw, &unit);
    if questions.is_empty() {
        warn!("⚠️ 响应中没有解析出任何题目，程序结束");
        return Ok(());
    }
    info!("✓ 解析出 {} 道题目", questions.len());

    let total = questions.len();
    let mut success = 0;
    let mut failed = 0;

    for mut question in questions {
        match persist(store, &unit, &mut question).await {
            Ok(()) => success += 1,
            Err(e) => {
                error!("❌ 题目 {} 入库失败: {}", question.question_key, e);
                failed += 1;
            }
        }
    }

    print_final_stats(success, failed, total, &config.output_log_file);

    Ok(())
}

async fn persist(
    store: &QuestionStore,
    unit: &UnitContext,
    question: &mut crate::models::Question,
) -> Result<()> {
    let unique_key = ensure_unique_key(store, &unit.unit_id, &question.question_key).await?;
    if unique_key != question.question_key {
        info!(
            "🔑 key 冲突，已顺延: {} -> {}",
            question.question_key, unique_key
        );
        question.question_key = unique_key;
    }
    store.insert_question(question).await?;
    Ok(())
}
