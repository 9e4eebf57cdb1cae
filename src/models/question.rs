//! 题目数据模型
//!
//! 定义贯穿整个流水线的核心实体：`Question` 及其子结构。
//! 字段命名与数据库规范化多表结构（questions / options /
//! fill_in_blank_answers / rearrangement_steps /
//! code_analysis_expected_output / external_resources）一一对应。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::unit::UnitContext;

/// 题目类型
///
/// 枚举值与线上格式中的 `QUESTION_TYPE` 字段一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    MoreThanOneMultipleChoice,
    CodeAnalysisMultipleChoice,
    CodeAnalysisMoreThanOneMultipleChoice,
    CodeAnalysisTextual,
    FibCoding,
    FibSqlCoding,
    Rearrange,
}

impl QuestionType {
    /// 从线上格式的字面值解析
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "MULTIPLE_CHOICE" => Some(Self::MultipleChoice),
            "MORE_THAN_ONE_MULTIPLE_CHOICE" => Some(Self::MoreThanOneMultipleChoice),
            "CODE_ANALYSIS_MULTIPLE_CHOICE" => Some(Self::CodeAnalysisMultipleChoice),
            "CODE_ANALYSIS_MORE_THAN_ONE_MULTIPLE_CHOICE" => {
                Some(Self::CodeAnalysisMoreThanOneMultipleChoice)
            }
            "CODE_ANALYSIS_TEXTUAL" => Some(Self::CodeAnalysisTextual),
            "FIB_CODING" => Some(Self::FibCoding),
            "FIB_SQL_CODING" => Some(Self::FibSqlCoding),
            "REARRANGE" => Some(Self::Rearrange),
            _ => None,
        }
    }

    /// 转回线上格式的字面值
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "MULTIPLE_CHOICE",
            Self::MoreThanOneMultipleChoice => "MORE_THAN_ONE_MULTIPLE_CHOICE",
            Self::CodeAnalysisMultipleChoice => "CODE_ANALYSIS_MULTIPLE_CHOICE",
            Self::CodeAnalysisMoreThanOneMultipleChoice => {
                "CODE_ANALYSIS_MORE_THAN_ONE_MULTIPLE_CHOICE"
            }
            Self::CodeAnalysisTextual => "CODE_ANALYSIS_TEXTUAL",
            Self::FibCoding => "FIB_CODING",
            Self::FibSqlCoding => "FIB_SQL_CODING",
            Self::Rearrange => "REARRANGE",
        }
    }

    /// 是否允许多个正确选项
    pub fn is_multi_answer(&self) -> bool {
        matches!(
            self,
            Self::MoreThanOneMultipleChoice | Self::CodeAnalysisMoreThanOneMultipleChoice
        )
    }

    /// 是否是选择题（选项本身承载作答）
    pub fn is_choice_based(&self) -> bool {
        matches!(
            self,
            Self::MultipleChoice
                | Self::MoreThanOneMultipleChoice
                | Self::CodeAnalysisMultipleChoice
                | Self::CodeAnalysisMoreThanOneMultipleChoice
        )
    }
}

/// 题干内容格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Html,
    Markdown,
}

impl ContentType {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "HTML" => Some(Self::Html),
            "MARKDOWN" => Some(Self::Markdown),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Markdown => "MARKDOWN",
        }
    }
}

/// 题目来源分类
///
/// BASE 为人工/首轮生成的原始题目，VARIANT 为基于某道 BASE 题派生的变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Base,
    Variant,
    Other,
}

impl Category {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "BASE" => Some(Self::Base),
            "VARIANT" => Some(Self::Variant),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::Variant => "VARIANT",
            Self::Other => "OTHER",
        }
    }
}

/// 选项
///
/// 顺序敏感：`order` 从 1 开始，与线上格式的 `OPTION_<n>` 编号一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: Uuid,
    pub text: String,
    pub order: u32,
    pub is_correct: bool,
}

/// 填空题答案（FIB_CODING / FIB_SQL_CODING）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibAnswer {
    /// 空位编号（从 1 开始）
    pub position: u32,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

/// 排序题步骤（REARRANGE）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RearrangeStep {
    pub text: String,
    pub display_order: u32,
    pub correct_order: u32,
}

/// 代码分析题用例（CODE_ANALYSIS_TEXTUAL）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAnalysisCase {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_case: Option<String>,
    pub expected_output: String,
}

/// SQL 执行类题目的外部资源（FIB_SQL_CODING）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalResources {
    pub db_url: String,
    pub test_url: String,
    pub tables_used: Vec<String>,
}

/// 题型专属载荷
///
/// 按 `question_type` 打标签的联合体，每个分支只携带该题型用到的字段，
/// 避免一个结构里塞满一堆可选字段。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionExtra {
    /// 普通选择题，没有额外载荷
    #[default]
    None,
    /// 填空题：答案列表 + 可选的外部资源（仅 FIB_SQL_CODING）
    FillInBlank {
        answers: Vec<FibAnswer>,
        #[serde(skip_serializing_if = "Option::is_none")]
        resources: Option<ExternalResources>,
    },
    /// 排序题：步骤列表
    Rearrange { steps: Vec<RearrangeStep> },
    /// 代码分析题：输入/期望输出用例
    CodeAnalysis { cases: Vec<CodeAnalysisCase> },
}

/// 题目实体
///
/// 解析器产出、存储层读写、变体流程消费的统一记录形态。
/// 创建后只允许修改题干、选项和解析（explanation），其余字段不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// 唯一 ID，解析/创建时分配，不复用
    pub id: Uuid,
    /// 所属单元
    pub unit: UnitContext,
    pub topic: String,
    pub concept: String,
    /// 单元内唯一的短标识
    pub question_key: String,
    /// 变体题回指原始题的 key；BASE 题为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_question_keys: Option<String>,
    pub question_text: String,
    pub content_type: ContentType,
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
    pub learning_outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub bloom_level: String,
    pub category: Category,
    /// 有序选项列表，顺序从生成到存储到展示全程保持
    pub options: Vec<ChoiceOption>,
    /// 题型专属载荷
    #[serde(default)]
    pub extra: QuestionExtra,
    /// 工作流临时标记：是否被选作变体生成的输入（不落库）
    #[serde(default, skip_serializing)]
    pub is_selected: bool,
}

impl Question {
    /// 正确选项的 0-based 下标集合
    ///
    /// 内部统一用下标表达正确性，`OPTION_<k>` 字符串约定只存在于
    /// 线上格式边界（见 parser 模块）。
    pub fn correct_indices(&self) -> Vec<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, opt)| opt.is_correct)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// 把正确选项翻译回线上格式的 `OPTION_<k>`（1-based）记号
    ///
    /// 多选题会返回逗号分隔的多个记号；没有正确选项时返回 None
    pub fn correct_option_tokens(&self) -> Option<String> {
        let tokens: Vec<String> = self
            .correct_indices()
            .iter()
            .map(|idx| format!("OPTION_{}", idx + 1))
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_wire_round_trip() {
        // 所有题型的字面值往返一致
        let all = [
            QuestionType::MultipleChoice,
            QuestionType::MoreThanOneMultipleChoice,
            QuestionType::CodeAnalysisMultipleChoice,
            QuestionType::CodeAnalysisMoreThanOneMultipleChoice,
            QuestionType::CodeAnalysisTextual,
            QuestionType::FibCoding,
            QuestionType::FibSqlCoding,
            QuestionType::Rearrange,
        ];
        for qt in all {
            assert_eq!(QuestionType::from_wire(qt.as_wire()), Some(qt));
        }
        assert_eq!(QuestionType::from_wire("ESSAY"), None);
    }

    #[test]
    fn test_multi_answer_flags() {
        assert!(QuestionType::MoreThanOneMultipleChoice.is_multi_answer());
        assert!(!QuestionType::MultipleChoice.is_multi_answer());
        assert!(QuestionType::CodeAnalysisMultipleChoice.is_choice_based());
        assert!(!QuestionType::Rearrange.is_choice_based());
    }
}
