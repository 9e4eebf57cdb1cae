//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责两种运行模式的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、校验配置、创建存储客户端
//! 2. **模式分发**：generate（内容生成新题）/ variants（基础题派生变体）
//! 3. **批量加载**：variants 模式下加载全部待处理的基础题
//! 4. **逐题处理**：单题失败记录后继续，不中断整批
//! 5. **唯一 key 兜底**：入库前为每道题做单元内去重
//! 6. **全局统计**：汇总所有题目的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单道题的生成细节
//! - **资源所有者**：唯一持有 QuestionStore 的模块
//! - **向下委托**：委托 variant_flow / generation_processor 处理具体链路

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, BusinessError, ConfigError};
use crate::models::{Category, Question, UnitContext};
use crate::orchestrator::generation_processor;
use crate::services::{ensure_unique_key, QuestionStore};
use crate::utils::logging::{
    init_log_file, log_base_complete, log_base_start, log_bases_loaded, log_startup,
    print_final_stats,
};
use crate::workflow::{VariantCtx, VariantFlow};

/// 应用主结构
pub struct App {
    config: Config,
    store: QuestionStore,
    flow: VariantFlow,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        let unit = UnitContext::new(&config.unit_id, &config.unit_title);
        log_startup(&config.mode, &unit.to_string());

        if !unit.is_valid() {
            return Err(AppError::Config(ConfigError::MissingValue {
                field: "unit_id".to_string(),
            })
            .into());
        }

        let store = QuestionStore::new(&config)?;
        let flow = VariantFlow::new(&config);

        Ok(Self {
            config,
            store,
            flow,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        match self.config.mode.as_str() {
            "generate" => generation_processor::run(&self.config, &self.store).await,
            "variants" => self.run_variants().await,
            other => Err(AppError::Business(BusinessError::UnknownMode {
                mode: other.to_string(),
            })
            .into()),
        }
    }

    /// variants 模式：为单元内的基础题批量生成变体
    async fn run_variants(&self) -> Result<()> {
        let unit = UnitContext::new(&self.config.unit_id, &self.config.unit_title);

        // 加载所有待处理的基础题
        let bases = self.load_base_questions(&unit).await?;

        if bases.is_empty() {
            warn!("⚠️ 单元 {} 下没有待处理的基础题，程序结束", unit);
            return Ok(());
        }

        let total = bases.len();
        log_bases_loaded(total, self.config.variant_count);

        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };

        // 逐题处理，单题失败不影响后续
        for (idx, base) in bases.iter().enumerate() {
            log_base_start(idx + 1, total, &base.question_key);
            let ctx = VariantCtx::new(idx + 1, total, unit.clone());

            match self.process_base(base, &ctx).await {
                Ok(persisted) => {
                    log_base_complete(&base.question_key, persisted, self.config.variant_count);
                    if persisted > 0 {
                        stats.success += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
                Err(e) => {
                    error!(
                        "[基础题 {}] ❌ 处理过程中发生错误: {}",
                        ctx.base_index, e
                    );
                    stats.failed += 1;
                }
            }
        }

        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(())
    }

    /// 处理单道基础题：生成变体并逐个入库
    ///
    /// 返回成功入库的变体数量。入库阶段单个变体失败只记录不中断。
    async fn process_base(&self, base: &Question, ctx: &VariantCtx) -> Result<usize> {
        let variants = self.flow.generate_variants(base, ctx).await?;

        let mut persisted = 0;
        for mut variant in variants {
            match self.persist_question(&mut variant).await {
                Ok(()) => persisted += 1,
                Err(e) => {
                    error!(
                        "[基础题 {}] ❌ 变体 {} 入库失败: {}",
                        ctx.base_index, variant.question_key, e
                    );
                }
            }
        }

        Ok(persisted)
    }

    /// 入库前做单元内 key 去重，再写入存储
    async fn persist_question(&self, question: &mut Question) -> AppResult<()> {
        let unique_key = ensure_unique_key(
            &self.store,
            &question.unit.unit_id,
            &question.question_key,
        )
        .await?;
        if unique_key != question.question_key {
            info!(
                "🔑 key 冲突，已顺延: {} -> {}",
                question.question_key, unique_key
            );
            question.question_key = unique_key;
        }
        self.store.insert_question(question).await
    }

    /// 加载基础题
    ///
    /// 配置里指定了 key 列表时只取这些题，并要求每个 key 都存在；
    /// 没指定时取单元下全部 BASE 题
    async fn load_base_questions(&self, unit: &UnitContext) -> Result<Vec<Question>> {
        info!("\n📁 正在加载待处理的基础题...");

        let mut bases = if self.config.variant_base_keys.is_empty() {
            self.store.list_questions(unit, Some(Category::Base)).await?
        } else {
            let found = self
                .store
                .find_by_keys(unit, &self.config.variant_base_keys)
                .await?;
            for key in &self.config.variant_base_keys {
                if !found.iter().any(|q| &q.question_key == key) {
                    return Err(AppError::Business(BusinessError::BaseQuestionNotFound {
                        question_key: key.clone(),
                    })
                    .into());
                }
            }
            found
        };

        for base in &mut bases {
            base.is_selected = true;
        }

        Ok(bases)
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
}
