//! 题库存储 - 业务能力层
//!
//! 通过 Supabase 的 PostgREST 接口读写规范化多表结构：
//! - `questions`：主表，一行一道题
//! - `options`：选项子表
//! - `fill_in_blank_answers` / `rearrangement_steps` /
//!   `code_analysis_expected_output` / `external_resources`：题型专属子表
//!
//! 写入顺序固定为"先父后子"。父记录成功而子记录失败时返回
//! `StorageError::PartialInsert`，带上题目 key 和表名方便人工修复。

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult, StorageError};
use crate::models::{
    Category, ChoiceOption, CodeAnalysisCase, ContentType, ExternalResources, FibAnswer, Question,
    QuestionExtra, QuestionType, RearrangeStep, UnitContext,
};
use crate::services::key_generator::KeyLookup;

/// 题库存储客户端
///
/// 持有一个带默认认证头的 HTTP 客户端，所有请求共用
pub struct QuestionStore {
    client: Client,
    base_url: String,
}

impl QuestionStore {
    /// 创建新的存储客户端
    ///
    /// Supabase 要求每个请求同时携带 `apikey` 头和 Bearer 认证头
    pub fn new(config: &Config) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.supabase_api_key)
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.supabase_api_key))
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.storage_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::storage_request_failed("questions", e))?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// 把非成功响应转成带状态码和响应体的存储错误
    async fn ensure_ok(table: &str, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Storage(StorageError::BadResponse {
            table: table.to_string(),
            status: status.as_u16(),
            body,
        }))
    }

    /// 向指定表 POST 一批行
    async fn post_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(self.endpoint(table))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|e| AppError::storage_request_failed(table, e))?;
        Self::ensure_ok(table, response).await?;
        Ok(())
    }

    // ========== 写入 ==========

    /// 插入一道完整题目（父记录 + 所有子表记录）
    ///
    /// 子表失败不回滚父记录，而是返回 `PartialInsert` 并打错误日志，
    /// 留给人工清理。
    pub async fn insert_question(&self, question: &Question) -> AppResult<()> {
        debug!("插入题目: {}", question.question_key);

        let row = QuestionInsert::from(question);
        self.post_rows("questions", std::slice::from_ref(&row))
            .await?;

        // 父记录已落库，之后的任何失败都是部分写入
        self.insert_children(question).await.map_err(|e| {
            error!(
                "⚠️ 题目 {} 部分写入：主记录已存在，子表写入失败: {}",
                question.question_key, e
            );
            e
        })?;

        info!("✅ 题目 {} 写入完成", question.question_key);
        Ok(())
    }

    async fn insert_children(&self, question: &Question) -> AppResult<()> {
        let option_rows: Vec<OptionInsert> = question
            .options
            .iter()
            .map(|opt| OptionInsert::new(question.id, opt))
            .collect();
        self.post_rows("options", &option_rows)
            .await
            .map_err(|e| Self::partial(question, "options", e))?;

        match &question.extra {
            QuestionExtra::None => {}
            QuestionExtra::FillInBlank { answers, resources } => {
                let rows: Vec<FibAnswerInsert> = answers
                    .iter()
                    .map(|a| FibAnswerInsert::new(question.id, a))
                    .collect();
                self.post_rows("fill_in_blank_answers", &rows)
                    .await
                    .map_err(|e| Self::partial(question, "fill_in_blank_answers", e))?;

                if let Some(res) = resources {
                    let row = ResourcesInsert::new(question.id, res);
                    self.post_rows("external_resources", std::slice::from_ref(&row))
                        .await
                        .map_err(|e| Self::partial(question, "external_resources", e))?;
                }
            }
            QuestionExtra::Rearrange { steps } => {
                let rows: Vec<RearrangeStepInsert> = steps
                    .iter()
                    .map(|s| RearrangeStepInsert::new(question.id, s))
                    .collect();
                self.post_rows("rearrangement_steps", &rows)
                    .await
                    .map_err(|e| Self::partial(question, "rearrangement_steps", e))?;
            }
            QuestionExtra::CodeAnalysis { cases } => {
                let rows: Vec<CaseInsert> = cases
                    .iter()
                    .map(|c| CaseInsert::new(question.id, c))
                    .collect();
                self.post_rows("code_analysis_expected_output", &rows)
                    .await
                    .map_err(|e| Self::partial(question, "code_analysis_expected_output", e))?;
            }
        }

        Ok(())
    }

    fn partial(question: &Question, table: &str, err: AppError) -> AppError {
        AppError::Storage(StorageError::PartialInsert {
            question_key: question.question_key.clone(),
            table: table.to_string(),
            detail: err.to_string(),
        })
    }

    /// 更新题目的可变部分：题干、解析和选项
    ///
    /// 选项采用"先删后插"替换，保证顺序和正确性标记完全跟随新值
    pub async fn update_question(&self, question: &Question) -> AppResult<()> {
        debug!("更新题目: {}", question.question_key);

        let patch = QuestionPatch {
            question_text: &question.question_text,
            explanation: question.explanation.as_deref(),
        };
        let response = self
            .client
            .patch(format!(
                "{}?id=eq.{}",
                self.endpoint("questions"),
                question.id
            ))
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        Self::ensure_ok("questions", response).await?;

        self.delete_child_rows("options", question.id).await?;
        let option_rows: Vec<OptionInsert> = question
            .options
            .iter()
            .map(|opt| OptionInsert::new(question.id, opt))
            .collect();
        self.post_rows("options", &option_rows).await?;

        info!("✅ 题目 {} 更新完成", question.question_key);
        Ok(())
    }

    /// 删除一道题目及其全部子表记录（先子后父）
    pub async fn delete_question(&self, question_id: Uuid) -> AppResult<()> {
        for table in [
            "options",
            "fill_in_blank_answers",
            "rearrangement_steps",
            "code_analysis_expected_output",
            "external_resources",
        ] {
            self.delete_child_rows(table, question_id).await?;
        }

        let response = self
            .client
            .delete(format!("{}?id=eq.{}", self.endpoint("questions"), question_id))
            .send()
            .await
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        Self::ensure_ok("questions", response).await?;

        info!("🗑️ 题目 {} 删除完成", question_id);
        Ok(())
    }

    async fn delete_child_rows(&self, table: &str, question_id: Uuid) -> AppResult<()> {
        let response = self
            .client
            .delete(format!(
                "{}?question_id=eq.{}",
                self.endpoint(table),
                question_id
            ))
            .send()
            .await
            .map_err(|e| AppError::storage_request_failed(table, e))?;
        Self::ensure_ok(table, response).await?;
        Ok(())
    }

    // ========== 读取 ==========

    /// 嵌套查询的 select 子句，一次请求把子表一起带回来
    const NESTED_SELECT: &'static str = "*,options(*),fill_in_blank_answers(*),rearrangement_steps(*),code_analysis_expected_output(*),external_resources(*)";

    /// 列出某单元下的题目，可按分类过滤
    pub async fn list_questions(
        &self,
        unit: &UnitContext,
        category: Option<Category>,
    ) -> AppResult<Vec<Question>> {
        let mut url = format!(
            "{}?select={}&unit_id=eq.{}",
            self.endpoint("questions"),
            Self::NESTED_SELECT,
            unit.unit_id
        );
        if let Some(cat) = category {
            url.push_str(&format!("&category=eq.{}", cat.as_wire()));
        }
        self.fetch_questions(&url).await
    }

    /// 按 key 列表查询某单元下的题目
    pub async fn find_by_keys(
        &self,
        unit: &UnitContext,
        keys: &[String],
    ) -> AppResult<Vec<Question>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}?select={}&unit_id=eq.{}&question_key=in.({})",
            self.endpoint("questions"),
            Self::NESTED_SELECT,
            unit.unit_id,
            keys.join(",")
        );
        self.fetch_questions(&url).await
    }

    async fn fetch_questions(&self, url: &str) -> AppResult<Vec<Question>> {
        debug!("查询题目: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        let response = Self::ensure_ok("questions", response).await?;
        let rows: Vec<QuestionRow> = response
            .json()
            .await
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        Ok(rows.into_iter().map(QuestionRow::into_question).collect())
    }

    /// 某单元内是否已存在指定 question_key
    pub async fn question_key_exists(&self, unit_id: &str, key: &str) -> AppResult<bool> {
        let url = format!(
            "{}?select=id&unit_id=eq.{}&question_key=eq.{}&limit=1",
            self.endpoint("questions"),
            unit_id,
            key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        let response = Self::ensure_ok("questions", response).await?;
        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|e| AppError::storage_request_failed("questions", e))?;
        Ok(!rows.is_empty())
    }
}

impl KeyLookup for QuestionStore {
    async fn key_exists(&self, unit_id: &str, key: &str) -> AppResult<bool> {
        self.question_key_exists(unit_id, key).await
    }
}

// ========== 写入载荷 ==========

#[derive(Serialize)]
struct QuestionInsert<'a> {
    id: Uuid,
    unit_id: &'a str,
    unit_title: &'a str,
    topic: &'a str,
    concept: &'a str,
    question_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_question_keys: Option<&'a str>,
    question_text: &'a str,
    content_type: &'static str,
    question_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_language: Option<&'a str>,
    learning_outcome: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<&'a str>,
    bloom_level: &'a str,
    category: &'static str,
}

impl<'a> From<&'a Question> for QuestionInsert<'a> {
    fn from(q: &'a Question) -> Self {
        Self {
            id: q.id,
            unit_id: &q.unit.unit_id,
            unit_title: &q.unit.unit_title,
            topic: &q.topic,
            concept: &q.concept,
            question_key: &q.question_key,
            base_question_keys: q.base_question_keys.as_deref(),
            question_text: &q.question_text,
            content_type: q.content_type.as_wire(),
            question_type: q.question_type.as_wire(),
            code: q.code.as_deref(),
            code_language: q.code_language.as_deref(),
            learning_outcome: &q.learning_outcome,
            explanation: q.explanation.as_deref(),
            bloom_level: &q.bloom_level,
            category: q.category.as_wire(),
        }
    }
}

#[derive(Serialize)]
struct QuestionPatch<'a> {
    question_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<&'a str>,
}

#[derive(Serialize)]
struct OptionInsert<'a> {
    id: Uuid,
    question_id: Uuid,
    option_text: &'a str,
    option_order: u32,
    is_correct: bool,
}

impl<'a> OptionInsert<'a> {
    fn new(question_id: Uuid, opt: &'a ChoiceOption) -> Self {
        Self {
            id: opt.id,
            question_id,
            option_text: &opt.text,
            option_order: opt.order,
            is_correct: opt.is_correct,
        }
    }
}

#[derive(Serialize)]
struct FibAnswerInsert<'a> {
    question_id: Uuid,
    blank_position: u32,
    correct_answer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<&'a str>,
}

impl<'a> FibAnswerInsert<'a> {
    fn new(question_id: Uuid, answer: &'a FibAnswer) -> Self {
        Self {
            question_id,
            blank_position: answer.position,
            correct_answer: &answer.correct_answer,
            expected_output: answer.expected_output.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct RearrangeStepInsert<'a> {
    question_id: Uuid,
    step_text: &'a str,
    display_order: u32,
    correct_order: u32,
}

impl<'a> RearrangeStepInsert<'a> {
    fn new(question_id: Uuid, step: &'a RearrangeStep) -> Self {
        Self {
            question_id,
            step_text: &step.text,
            display_order: step.display_order,
            correct_order: step.correct_order,
        }
    }
}

#[derive(Serialize)]
struct CaseInsert<'a> {
    question_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_case: Option<&'a str>,
    expected_output: &'a str,
}

impl<'a> CaseInsert<'a> {
    fn new(question_id: Uuid, case: &'a CodeAnalysisCase) -> Self {
        Self {
            question_id,
            input_case: case.input_case.as_deref(),
            expected_output: &case.expected_output,
        }
    }
}

#[derive(Serialize)]
struct ResourcesInsert<'a> {
    question_id: Uuid,
    db_url: &'a str,
    test_url: &'a str,
    tables_used: &'a [String],
}

impl<'a> ResourcesInsert<'a> {
    fn new(question_id: Uuid, res: &'a ExternalResources) -> Self {
        Self {
            question_id,
            db_url: &res.db_url,
            test_url: &res.test_url,
            tables_used: &res.tables_used,
        }
    }
}

// ========== 读取行 ==========

#[derive(Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: Uuid,
}

#[derive(Deserialize)]
struct QuestionRow {
    id: Uuid,
    unit_id: String,
    #[serde(default)]
    unit_title: String,
    topic: String,
    concept: String,
    question_key: String,
    base_question_keys: Option<String>,
    question_text: String,
    content_type: String,
    question_type: String,
    code: Option<String>,
    code_language: Option<String>,
    learning_outcome: String,
    explanation: Option<String>,
    bloom_level: String,
    category: String,
    #[serde(default)]
    options: Vec<OptionRow>,
    #[serde(default)]
    fill_in_blank_answers: Vec<FibAnswerRow>,
    #[serde(default)]
    rearrangement_steps: Vec<RearrangeStepRow>,
    #[serde(default)]
    code_analysis_expected_output: Vec<CaseRow>,
    #[serde(default)]
    external_resources: Vec<ResourcesRow>,
}

#[derive(Deserialize)]
struct OptionRow {
    id: Uuid,
    option_text: String,
    option_order: u32,
    is_correct: bool,
}

#[derive(Deserialize)]
struct FibAnswerRow {
    blank_position: u32,
    correct_answer: String,
    expected_output: Option<String>,
}

#[derive(Deserialize)]
struct RearrangeStepRow {
    step_text: String,
    display_order: u32,
    correct_order: u32,
}

#[derive(Deserialize)]
struct CaseRow {
    input_case: Option<String>,
    expected_output: String,
}

#[derive(Deserialize)]
struct ResourcesRow {
    db_url: String,
    test_url: String,
    #[serde(default)]
    tables_used: Vec<String>,
}

impl QuestionRow {
    /// 把数据库行还原为领域实体
    ///
    /// 历史数据里可能有未知的枚举字面值，按保守默认值处理并打警告
    fn into_question(self) -> Question {
        let question_type = QuestionType::from_wire(&self.question_type).unwrap_or_else(|| {
            warn!(
                "题目 {} 的类型 {} 无法识别，按 MULTIPLE_CHOICE 处理",
                self.question_key, self.question_type
            );
            QuestionType::MultipleChoice
        });
        let content_type = ContentType::from_wire(&self.content_type).unwrap_or(ContentType::Markdown);
        let category = Category::from_wire(&self.category).unwrap_or(Category::Other);

        let mut options: Vec<ChoiceOption> = self
            .options
            .into_iter()
            .map(|row| ChoiceOption {
                id: row.id,
                text: row.option_text,
                order: row.option_order,
                is_correct: row.is_correct,
            })
            .collect();
        options.sort_by_key(|opt| opt.order);

        let extra = if !self.fill_in_blank_answers.is_empty() {
            let mut answers: Vec<FibAnswer> = self
                .fill_in_blank_answers
                .into_iter()
                .map(|row| FibAnswer {
                    position: row.blank_position,
                    correct_answer: row.correct_answer,
                    expected_output: row.expected_output,
                })
                .collect();
            answers.sort_by_key(|a| a.position);
            let resources = self.external_resources.into_iter().next().map(|row| {
                ExternalResources {
                    db_url: row.db_url,
                    test_url: row.test_url,
                    tables_used: row.tables_used,
                }
            });
            QuestionExtra::FillInBlank { answers, resources }
        } else if !self.rearrangement_steps.is_empty() {
            let mut steps: Vec<RearrangeStep> = self
                .rearrangement_steps
                .into_iter()
                .map(|row| RearrangeStep {
                    text: row.step_text,
                    display_order: row.display_order,
                    correct_order: row.correct_order,
                })
                .collect();
            steps.sort_by_key(|s| s.display_order);
            QuestionExtra::Rearrange { steps }
        } else if !self.code_analysis_expected_output.is_empty() {
            let cases = self
                .code_analysis_expected_output
                .into_iter()
                .map(|row| CodeAnalysisCase {
                    input_case: row.input_case,
                    expected_output: row.expected_output,
                })
                .collect();
            QuestionExtra::CodeAnalysis { cases }
        } else {
            QuestionExtra::None
        };

        Question {
            id: self.id,
            unit: UnitContext::new(&self.unit_id, &self.unit_title),
            topic: self.topic,
            concept: self.concept,
            question_key: self.question_key,
            base_question_keys: self.base_question_keys,
            question_text: self.question_text,
            content_type,
            question_type,
            code: self.code,
            code_language: self.code_language,
            learning_outcome: self.learning_outcome,
            explanation: self.explanation,
            bloom_level: self.bloom_level,
            category,
            options,
            extra,
            is_selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_row_decode_with_nested_children() {
        // PostgREST 嵌套查询返回的典型形态
        let json = r#"{
            "id": "7f1e6a2e-6f14-4b3a-9a01-2d6c1f0f9b10",
            "unit_id": "unit-7",
            "unit_title": "SQL Joins",
            "topic": "Joins",
            "concept": "Inner Join",
            "question_key": "J001",
            "base_question_keys": null,
            "question_text": "What does an inner join return?",
            "content_type": "MARKDOWN",
            "question_type": "MULTIPLE_CHOICE",
            "code": null,
            "code_language": null,
            "learning_outcome": "identify_inner_join",
            "explanation": "Inner joins keep only matching rows.",
            "bloom_level": "UNDERSTAND",
            "category": "BASE",
            "options": [
                {"id": "0a64b0ec-9d38-4f5e-8f8c-0d1b2c3d4e5f", "option_text": "All rows", "option_order": 2, "is_correct": false},
                {"id": "1b75c1fd-ae49-5a6f-9f9d-1e2c3d4e5f60", "option_text": "Matching rows", "option_order": 1, "is_correct": true}
            ],
            "fill_in_blank_answers": [],
            "rearrangement_steps": [],
            "code_analysis_expected_output": [],
            "external_resources": []
        }"#;

        let row: QuestionRow = serde_json::from_str(json).unwrap();
        let question = row.into_question();

        assert_eq!(question.question_key, "J001");
        assert_eq!(question.question_type, QuestionType::MultipleChoice);
        assert_eq!(question.category, Category::Base);
        // 选项按 option_order 排序
        assert_eq!(question.options[0].text, "Matching rows");
        assert!(question.options[0].is_correct);
        assert_eq!(question.correct_indices(), vec![0]);
        assert!(matches!(question.extra, QuestionExtra::None));
    }

    #[test]
    fn test_question_row_decode_rearrange() {
        let json = r#"{
            "id": "7f1e6a2e-6f14-4b3a-9a01-2d6c1f0f9b10",
            "unit_id": "unit-7",
            "unit_title": "SQL Joins",
            "topic": "Queries",
            "concept": "Query Order",
            "question_key": "R001",
            "base_question_keys": null,
            "question_text": "Arrange the clauses in execution order.",
            "content_type": "MARKDOWN",
            "question_type": "REARRANGE",
            "code": null,
            "code_language": null,
            "learning_outcome": "order_clauses",
            "explanation": null,
            "bloom_level": "APPLY",
            "category": "BASE",
            "options": [],
            "fill_in_blank_answers": [],
            "rearrangement_steps": [
                {"step_text": "SELECT", "display_order": 2, "correct_order": 2},
                {"step_text": "FROM", "display_order": 1, "correct_order": 1}
            ],
            "code_analysis_expected_output": [],
            "external_resources": []
        }"#;

        let row: QuestionRow = serde_json::from_str(json).unwrap();
        let question = row.into_question();

        match question.extra {
            QuestionExtra::Rearrange { steps } => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].text, "FROM");
            }
            other => panic!("unexpected extra: {:?}", other),
        }
    }
}
