//! 变体生成流程 - 流程层
//!
//! 核心职责：定义"一道基础题"的完整变体生成流程
//!
//! 流程顺序：
//! 1. 拼装变体提示词 → LLM 生成 → 解析
//! 2. 给每道变体打上派生标记（分类、回指 key、单元）
//!
//! 失败语义：LLM 调用失败是整次流程的硬失败；LLM 成功但一道变体
//! 都没解析出来不算错误，返回空列表由上层决定怎么处理。

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{Category, Question};
use crate::parser::parse_response;
use crate::services::prompt_builder::{build_variant_prompt, VARIANT_SYSTEM_PROMPT};
use crate::services::LlmService;
use crate::utils::logging::truncate_text;
use crate::workflow::variant_ctx::VariantCtx;

/// 变体生成流程
///
/// - 编排"提示词 → 生成 → 解析 → 打标"的完整链路
/// - 不触碰存储，入库和 key 去重由编排层负责
/// - 只依赖业务能力（services）
pub struct VariantFlow {
    llm_service: LlmService,
    variant_count: usize,
    verbose_logging: bool,
}

impl VariantFlow {
    /// 创建新的变体生成流程
    pub fn new(config: &Config) -> Self {
        Self {
            llm_service: LlmService::new(config),
            variant_count: config.variant_count,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 为一道基础题生成变体
    pub async fn generate_variants(
        &self,
        base: &Question,
        ctx: &VariantCtx,
    ) -> AppResult<Vec<Question>> {
        self.log_base(ctx, base);

        let prompt = build_variant_prompt(base, self.variant_count);
        if self.verbose_logging {
            info!(
                "[基础题 {}] 提示词预览: {}",
                ctx.base_index,
                truncate_text(&prompt, 200)
            );
        }

        info!("[基础题 {}] 🤖 正在调用 LLM 生成变体...", ctx.base_index);
        let raw = self
            .llm_service
            .send_to_llm(&prompt, Some(VARIANT_SYSTEM_PROMPT))
            .await?;

        let mut variants = parse_response(&raw, &ctx.unit);
        if variants.is_empty() {
            // LLM 响应正常但没解析出任何变体，交给上层统计
            warn!(
                "[基础题 {}] ⚠️ 响应中没有解析出任何变体（key: {}）",
                ctx.base_index, base.question_key
            );
            return Ok(Vec::new());
        }

        info!(
            "[基础题 {}] ✓ 解析出 {} 道变体",
            ctx.base_index,
            variants.len()
        );

        for (index, variant) in variants.iter_mut().enumerate() {
            self.tag_variant(variant, base, index + 1);
        }

        Ok(variants)
    }

    /// 给第 n 道变体打上派生标记
    ///
    /// LLM 可能忘记回填 BASE_QUESTION_KEYS、回显基础题自己的 key，
    /// 或在一批内重复同一个 key，这里统一覆盖：key 一律本地派生为
    /// `<基础题key>_v<n>`，保证批内唯一且和基础题不同。单元内的
    /// 最终去重仍由入库前的 key 检查兜底。
    fn tag_variant(&self, variant: &mut Question, base: &Question, n: usize) {
        variant.category = Category::Variant;
        variant.base_question_keys = Some(base.question_key.clone());
        variant.unit = base.unit.clone();
        variant.question_key = format!("{}_v{}", base.question_key, n);
    }

    /// 显示基础题预览
    fn log_base(&self, ctx: &VariantCtx, base: &Question) {
        info!(
            "[基础题 {}] 题干: {}",
            ctx.base_index,
            truncate_text(&base.question_text, 80)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChoiceOption, ContentType, QuestionExtra, QuestionType, UnitContext};
    use uuid::Uuid;

    fn base_question() -> Question {
        Question {
            id: Uuid::new_v4(),
            unit: UnitContext::new("unit-7", "SQL Joins"),
            topic: "Joins".to_string(),
            concept: "Inner Join".to_string(),
            question_key: "J001".to_string(),
            base_question_keys: None,
            question_text: "What does an inner join return?".to_string(),
            content_type: ContentType::Markdown,
            question_type: QuestionType::MultipleChoice,
            code: None,
            code_language: None,
            learning_outcome: "identify_inner_join".to_string(),
            explanation: None,
            bloom_level: "UNDERSTAND".to_string(),
            category: Category::Base,
            options: vec![ChoiceOption {
                id: Uuid::new_v4(),
                text: "Matching rows".to_string(),
                order: 1,
                is_correct: true,
            }],
            extra: QuestionExtra::None,
            is_selected: true,
        }
    }

    #[test]
    fn test_tag_variant_overrides_derivation_fields() {
        let config = Config::default();
        let flow = VariantFlow::new(&config);
        let base = base_question();

        let mut variant = base_question();
        variant.base_question_keys = None;

        flow.tag_variant(&mut variant, &base, 1);

        assert_eq!(variant.category, Category::Variant);
        assert_eq!(variant.base_question_keys.as_deref(), Some("J001"));
        assert_eq!(variant.unit, base.unit);
        assert_eq!(variant.question_key, "J001_v1");
    }

    #[test]
    fn test_duplicate_llm_keys_rewritten_locally() {
        let config = Config::default();
        let flow = VariantFlow::new(&config);
        let base = base_question();

        // LLM 在一批里回显了两次基础题的 key
        let block = "TOPIC: Joins\nCONCEPT: Inner Join\nQUESTION_KEY: J001\nQUESTION_TEXT: Variant text?\nOPTION_1: A\nOPTION_2: B\nCORRECT_OPTION: OPTION_1\n";
        let raw = format!("{}-END-\n{}-END-", block, block);
        let mut variants = crate::parser::parse_response(&raw, &base.unit);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].question_key, variants[1].question_key);

        for (index, variant) in variants.iter_mut().enumerate() {
            flow.tag_variant(variant, &base, index + 1);
        }

        // 打标后批内唯一，且不会和基础题撞 key
        assert_eq!(variants[0].question_key, "J001_v1");
        assert_eq!(variants[1].question_key, "J001_v2");
        assert_ne!(variants[0].question_key, base.question_key);
        assert_ne!(variants[0].question_key, variants[1].question_key);
    }
}
