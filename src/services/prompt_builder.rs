//! 提示词构建 - 业务能力层
//!
//! 两个入口：从教学内容生成新题、从基础题生成变体。
//! 提示词里固定声明 `-END-` 分隔的输出格式，和解析器的线上格式
//! 契约严格对齐，保证"生成 → 解析"往返闭合。

use serde::Serialize;

use crate::models::Question;

/// 生成新题时的系统消息
pub const GENERATION_SYSTEM_PROMPT: &str =
    "You are a technical instructional designer specialized in creating SQL MCQs.";

/// 生成变体时的系统消息
pub const VARIANT_SYSTEM_PROMPT: &str =
    "You are an expert technical instructor who creates SQL practice questions.";

/// 基础题的精简投影
///
/// 只携带向生成端无歧义描述一道题所需的字段，避免把整条记录
/// （含数据库 id、工作流标记等）塞进提示词。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseQuestionView {
    question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_language: Option<String>,
    options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correct_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    topic: String,
    concept: String,
    learning_outcome: String,
    bloom_level: String,
    question_type: &'static str,
}

impl From<&Question> for BaseQuestionView {
    fn from(question: &Question) -> Self {
        Self {
            question_text: question.question_text.clone(),
            code: question.code.clone(),
            code_language: question.code_language.clone(),
            options: question.options.iter().map(|o| o.text.clone()).collect(),
            // 正确性在边界翻译回 OPTION_<k> 记号
            correct_option: question.correct_option_tokens(),
            explanation: question.explanation.clone(),
            topic: question.topic.clone(),
            concept: question.concept.clone(),
            learning_outcome: question.learning_outcome.clone(),
            bloom_level: question.bloom_level.clone(),
            question_type: question.question_type.as_wire(),
        }
    }
}

/// 构建"从内容生成新题"的提示词
pub fn build_generation_prompt(content: &str, question_count: usize) -> String {
    format!(
        r#"I want you to act as a technical instructional designer with 10 years of experience in technical curriculum design and development.

Given the following content:

{content}

Generate {question_count} multiple choice questions (MCQs) that test understanding of the content. For each question:

1. Identify the specific topic and concept being tested
2. Create a clear question with 4 options
3. Provide the correct answer and a detailed explanation
4. Assign an appropriate Bloom's taxonomy level

Format each question as follows:

TOPIC: [Topic name]
CONCEPT: [Specific concept]
QUESTION_KEY: [Unique identifier, letters followed by digits, e.g. SQLJ01]
QUESTION_TEXT: [The actual question]
LEARNING_OUTCOME: [snake_case tag for what the question tests]
CONTENT_TYPE: MARKDOWN
QUESTION_TYPE: MULTIPLE_CHOICE
CODE: [Any code snippet, or NA if none]
CODE_LANGUAGE: [Programming language of code, or NA]
OPTION_1: [First option]
OPTION_2: [Second option]
OPTION_3: [Third option]
OPTION_4: [Fourth option]
CORRECT_OPTION: [OPTION_<k> token naming the correct option, e.g. OPTION_2]
EXPLANATION: [Detailed explanation of the correct answer]
BLOOM_LEVEL: [Bloom's taxonomy level]
-END-"#
    )
}

/// 构建"从基础题生成变体"的提示词
pub fn build_variant_prompt(base: &Question, variant_count: usize) -> String {
    let view = BaseQuestionView::from(base);
    let base_json = serde_json::to_string_pretty(&view).unwrap_or_default();
    let correct_field = if base.question_type.is_multi_answer() {
        "CORRECT_OPTIONS: [comma-separated OPTION_<k> tokens, e.g. OPTION_1,OPTION_3]"
    } else {
        "CORRECT_OPTION: [OPTION_<k> token naming the correct option, e.g. OPTION_2]"
    };

    format!(
        r#"**Objective**: As a technical instructional designer with over 10 years of experience, your task is to generate variant questions from a given base question.
  - Each base question includes Question text, Options, Correct Option, and Explanation text. Also optionally there can be an SQL query and database table or schema.
  - For these questions students require to analyze the question text, query and table/schema to answer the question correctly.
  - These questions assess the students' ability to understand and interpret query and table. Create variants by asking the same question in different ways.

## Input

### Base Question

{base_json}

## Steps for Variant Creation:

1. **Identify the Concept**: Determine the precise concept being assessed in the base question by closely examining the question text and the correct answer.
2. **Pick Specific Variant Types**: Choose different types of question variants that meaningfully test the same concept.
3. **Independent Questions**: Each variant should be self-contained with all information needed to answer correctly.
4. **Different Examples**: Use different examples while maintaining the base concept and learning outcome.
5. **Concept-Focused**: Create variants strictly aligned with the base question's specific concept.
6. **Cognitive Level**: Match the base question's Bloom's taxonomy level.
7. **Follow Guidelines**: Adhere to all guidelines for questions, options, and explanations.

Please generate {variant_count} variants in the following format for each:

TOPIC: {topic}
CONCEPT: {concept}
QUESTION_KEY: {base_key}_v<number>
BASE_QUESTION_KEYS: {base_key}
QUESTION_TEXT: <question_text>
CONTENT_TYPE: {content_type}
QUESTION_TYPE: {question_type}
LEARNING_OUTCOME: {learning_outcome}
CODE: <code, or NA if none>
CODE_LANGUAGE: <code_language, or NA>
OPTION_1: <option_1>
OPTION_2: <option_2>
OPTION_3: <option_3>
OPTION_4: <option_4>
{correct_field}
EXPLANATION: <explanation>
BLOOM_LEVEL: {bloom_level}
-END-"#,
        base_json = base_json,
        variant_count = variant_count,
        topic = base.topic,
        concept = base.concept,
        base_key = base.question_key,
        content_type = base.content_type.as_wire(),
        question_type = base.question_type.as_wire(),
        learning_outcome = base.learning_outcome,
        correct_field = correct_field,
        bloom_level = base.bloom_level,
    )
}
