//! 响应解析器
//!
//! 把生成端返回的 `-END-` 分隔的原始文本，确定性地转换成强类型的
//! `Question` 记录。纯同步、无 I/O。
//!
//! 逐行扫描 + 字段游标：遇到词汇表内的键就冲刷上一个字段的缓冲区并
//! 开启新字段，否则把整行追加进当前字段的多行取值。这样题干里内嵌的
//! 代码围栏、markdown 表格都能原样保留，不会被简单的按行切分破坏。
//!
//! 容错语义：单个题目块校验失败只丢弃该块并记一条 warn 日志，
//! 整批解析永远正常返回。

use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::ParseError;
use crate::models::{
    Category, ChoiceOption, CodeAnalysisCase, ContentType, ExternalResources, FibAnswer, Question,
    QuestionExtra, QuestionType, RearrangeStep, UnitContext,
};
use crate::parser::field::{self, FieldKey};

/// 题目块分隔符
pub const BLOCK_SEPARATOR: &str = "-END-";

/// 不合法的选项记号哨兵（`CODE` / `CODE_LANGUAGE` 专用）
const NOT_APPLICABLE: &str = "NA";

/// 默认布鲁姆层级
const DEFAULT_BLOOM_LEVEL: &str = "UNDERSTAND";

/// 解析一整份生成响应
///
/// 按 `-END-` 切块，空白块直接丢弃；每个块独立解析，失败的块跳过。
/// 空输入返回空列表而不是错误。
pub fn parse_response(raw: &str, unit: &UnitContext) -> Vec<Question> {
    if raw.trim().is_empty() {
        warn!("⚠️ 生成响应为空，没有可解析的题目块");
        return Vec::new();
    }

    let mut questions = Vec::new();
    for (index, block) in raw.split(BLOCK_SEPARATOR).enumerate() {
        if block.trim().is_empty() {
            continue;
        }
        match parse_block(block, unit) {
            Ok(question) => questions.push(question),
            Err(e) => warn!("⚠️ 丢弃第 {} 个题目块: {}", index + 1, e),
        }
    }
    questions
}

/// 解析单个题目块
pub fn parse_block(block: &str, unit: &UnitContext) -> Result<Question, ParseError> {
    if !unit.is_valid() {
        return Err(ParseError::EmptyUnit);
    }

    let fields = scan_block(block);
    fields.into_question(unit)
}

/// 扫描出的字段集合（组装成 Question 前的中间形态）
#[derive(Debug, Default)]
struct BlockFields {
    topic: Option<String>,
    concept: Option<String>,
    question_key: Option<String>,
    base_question_keys: Option<String>,
    question_text: Option<String>,
    question_type: Option<String>,
    learning_outcome: Option<String>,
    code: Option<String>,
    content_type: Option<String>,
    code_language: Option<String>,
    correct_option: Option<String>,
    correct_options: Option<String>,
    bloom_level: Option<String>,
    explanation: Option<String>,
    input: Option<String>,
    output: Option<String>,
    db_url: Option<String>,
    test_url: Option<String>,
    tables_used: Option<String>,
    /// `OPTION_<n>` 按编号排序
    options: BTreeMap<u32, String>,
    inputs: BTreeMap<u32, String>,
    outputs: BTreeMap<u32, String>,
    display_orders: BTreeMap<u32, u32>,
    correct_orders: BTreeMap<u32, u32>,
}

/// 逐行扫描一个题目块
///
/// 维护"当前字段"游标；只有词汇表内的顶格键会终结上一个字段的取值。
fn scan_block(block: &str) -> BlockFields {
    let mut fields = BlockFields::default();
    let mut current: Option<(FieldKey, String)> = None;

    for line in block.lines() {
        match field::split_field_line(line) {
            Some((key, first_line)) => {
                if let Some((prev_key, buffer)) = current.take() {
                    fields.store(prev_key, buffer);
                }
                current = Some((key, first_line.to_string()));
            }
            None => {
                if let Some((_, buffer)) = current.as_mut() {
                    buffer.push('\n');
                    buffer.push_str(line);
                }
                // 块首还没有任何字段时出现的散行（空行、客套话）直接忽略
            }
        }
    }
    if let Some((prev_key, buffer)) = current.take() {
        fields.store(prev_key, buffer);
    }

    fields
}

impl BlockFields {
    /// 落一个扫描完成的字段
    ///
    /// 取值先整体 trim；空值视同缺失。`CODE` / `CODE_LANGUAGE` 的字面值
    /// `NA` 表示"不适用"，按缺失存储；其他字段的 `NA` 是普通文本。
    fn store(&mut self, key: FieldKey, buffer: String) {
        let value = buffer.trim();
        if value.is_empty() {
            return;
        }
        let value = value.to_string();

        match key {
            FieldKey::Topic => self.topic = Some(value),
            FieldKey::Concept => self.concept = Some(value),
            FieldKey::QuestionKey => self.question_key = Some(value),
            FieldKey::BaseQuestionKeys => self.base_question_keys = Some(value),
            FieldKey::QuestionText => self.question_text = Some(value),
            FieldKey::QuestionType => self.question_type = Some(value),
            FieldKey::LearningOutcome => self.learning_outcome = Some(value),
            FieldKey::Code => {
                if value != NOT_APPLICABLE {
                    self.code = Some(value);
                }
            }
            FieldKey::ContentType => self.content_type = Some(value),
            FieldKey::CodeLanguage => {
                if value != NOT_APPLICABLE {
                    self.code_language = Some(value);
                }
            }
            FieldKey::CorrectOption => self.correct_option = Some(value),
            FieldKey::CorrectOptions => self.correct_options = Some(value),
            FieldKey::BloomLevel => self.bloom_level = Some(value),
            FieldKey::Explanation => self.explanation = Some(value),
            FieldKey::Input => self.input = Some(value),
            FieldKey::Output => self.output = Some(value),
            FieldKey::DbUrl => self.db_url = Some(value),
            FieldKey::TestUrl => self.test_url = Some(value),
            FieldKey::TablesUsed => self.tables_used = Some(value),
            FieldKey::Option(n) => {
                self.options.insert(n, value);
            }
            FieldKey::InputN(n) => {
                self.inputs.insert(n, value);
            }
            FieldKey::OutputN(n) => {
                self.outputs.insert(n, value);
            }
            FieldKey::DisplayOrder(n) => {
                if let Ok(order) = value.parse() {
                    self.display_orders.insert(n, order);
                }
            }
            FieldKey::CorrectOrder(n) => {
                if let Ok(order) = value.parse() {
                    self.correct_orders.insert(n, order);
                }
            }
            // 词汇表内但不落库的键：识别它们只是为了正确截断上一个字段
            FieldKey::NewConcepts
            | FieldKey::QuestionId
            | FieldKey::TagNames
            | FieldKey::OptionId(_)
            | FieldKey::InputId(_) => {}
        }
    }

    /// 校验必填字段并组装 Question
    fn into_question(self, unit: &UnitContext) -> Result<Question, ParseError> {
        let topic = self
            .topic
            .clone()
            .ok_or(ParseError::MissingField { field: "TOPIC" })?;
        let concept = self
            .concept
            .clone()
            .ok_or(ParseError::MissingField { field: "CONCEPT" })?;
        let question_key = self.question_key.clone().ok_or(ParseError::MissingField {
            field: "QUESTION_KEY",
        })?;
        let question_text = self.question_text.clone().ok_or(ParseError::MissingField {
            field: "QUESTION_TEXT",
        })?;
        if self.options.is_empty() {
            return Err(ParseError::NoOptions);
        }

        let question_type = self.resolve_question_type(&question_key);
        // 选择题靠选项承载作答，少于 2 个没有意义
        if question_type.is_choice_based() && self.options.len() < 2 {
            return Err(ParseError::NotEnoughOptions {
                count: self.options.len(),
            });
        }
        let content_type = self
            .content_type
            .as_deref()
            .and_then(ContentType::from_wire)
            .unwrap_or(ContentType::Markdown);

        let correct = self.correct_indices(question_type);
        let options: Vec<ChoiceOption> = self
            .options
            .values()
            .enumerate()
            .map(|(index, text)| ChoiceOption {
                id: Uuid::new_v4(),
                text: text.clone(),
                order: index as u32 + 1,
                is_correct: correct.contains(&index),
            })
            .collect();

        let extra = self.build_extra(question_type, &options);

        Ok(Question {
            id: Uuid::new_v4(),
            unit: unit.clone(),
            topic,
            concept,
            question_key,
            base_question_keys: self.base_question_keys,
            question_text,
            content_type,
            question_type,
            code: self.code,
            code_language: self.code_language,
            learning_outcome: self.learning_outcome.unwrap_or_default(),
            explanation: self.explanation,
            bloom_level: self
                .bloom_level
                .unwrap_or_else(|| DEFAULT_BLOOM_LEVEL.to_string()),
            category: Category::Base,
            options,
            extra,
            is_selected: false,
        })
    }

    /// 解析题目类型；缺失或不认识的类型回退为单选题
    fn resolve_question_type(&self, question_key: &str) -> QuestionType {
        match self.question_type.as_deref() {
            Some(raw) => QuestionType::from_wire(raw).unwrap_or_else(|| {
                warn!(
                    "⚠️ 题目 {} 的类型 '{}' 不在枚举中，按单选题处理",
                    question_key, raw
                );
                QuestionType::MultipleChoice
            }),
            None => QuestionType::MultipleChoice,
        }
    }

    /// 解出正确选项的 0-based 下标集合
    ///
    /// 线上格式约定：`CORRECT_OPTION: OPTION_<k>`（1-based）表示第 k 个
    /// 选项正确。多选题优先读扩展字段 `CORRECT_OPTIONS`（逗号分隔多个
    /// 记号）。此处是唯一一处做 1-based 记号 → 0-based 下标换算的地方。
    fn correct_indices(&self, question_type: QuestionType) -> Vec<usize> {
        if question_type.is_multi_answer() {
            if let Some(tokens) = &self.correct_options {
                return tokens.split(',').filter_map(parse_option_token).collect();
            }
        }
        self.correct_option
            .as_deref()
            .and_then(parse_option_token)
            .into_iter()
            .collect()
    }

    /// 按题型派生专属载荷
    fn build_extra(&self, question_type: QuestionType, options: &[ChoiceOption]) -> QuestionExtra {
        match question_type {
            QuestionType::FibCoding | QuestionType::FibSqlCoding => {
                // 填空题的 CORRECT_OPTION 携带的是填空内容本身，不是 OPTION_<k> 记号
                let answers = vec![FibAnswer {
                    position: 1,
                    correct_answer: self.correct_option.clone().unwrap_or_default(),
                    expected_output: self.output.clone(),
                }];
                let resources = if question_type == QuestionType::FibSqlCoding {
                    Some(ExternalResources {
                        db_url: self.db_url.clone().unwrap_or_default(),
                        test_url: self.test_url.clone().unwrap_or_default(),
                        tables_used: self
                            .tables_used
                            .as_deref()
                            .map(split_table_list)
                            .unwrap_or_default(),
                    })
                } else {
                    None
                };
                QuestionExtra::FillInBlank { answers, resources }
            }
            QuestionType::Rearrange => {
                // 显式顺序缺失时退化为自然顺序
                let steps = options
                    .iter()
                    .enumerate()
                    .map(|(index, opt)| {
                        let wire_no = index as u32 + 1;
                        RearrangeStep {
                            text: opt.text.clone(),
                            display_order: self
                                .display_orders
                                .get(&wire_no)
                                .copied()
                                .unwrap_or(wire_no),
                            correct_order: self
                                .correct_orders
                                .get(&wire_no)
                                .copied()
                                .unwrap_or(wire_no),
                        }
                    })
                    .collect();
                QuestionExtra::Rearrange { steps }
            }
            QuestionType::CodeAnalysisTextual => {
                let mut cases: Vec<CodeAnalysisCase> = Vec::new();
                if self.input.is_some() || self.output.is_some() {
                    cases.push(CodeAnalysisCase {
                        input_case: self.input.clone(),
                        expected_output: self.output.clone().unwrap_or_default(),
                    });
                }
                // 编号的 INPUT_<n>/OUTPUT_<n> 对作为补充用例
                for (n, input) in &self.inputs {
                    cases.push(CodeAnalysisCase {
                        input_case: Some(input.clone()),
                        expected_output: self.outputs.get(n).cloned().unwrap_or_default(),
                    });
                }
                QuestionExtra::CodeAnalysis { cases }
            }
            _ => QuestionExtra::None,
        }
    }
}

/// 解析 `OPTION_<k>` 记号为 0-based 下标
fn parse_option_token(token: &str) -> Option<usize> {
    let k: usize = token.trim().strip_prefix("OPTION_")?.parse().ok()?;
    if k >= 1 {
        Some(k - 1)
    } else {
        None
    }
}

/// 逗号切分表名列表
fn split_table_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> UnitContext {
        UnitContext::new("unit-7", "SQL Joins")
    }

    /// 一个结构完整的单选题块
    fn well_formed_block(key: &str) -> String {
        format!(
            "TOPIC: Joins\n\
             CONCEPT: Inner Join\n\
             QUESTION_KEY: {}\n\
             QUESTION_TEXT: What does an inner join return?\n\
             OPTION_1: Matching rows\n\
             OPTION_2: All rows\n\
             OPTION_3: No rows\n\
             OPTION_4: Distinct rows\n\
             CORRECT_OPTION: OPTION_1\n",
            key
        )
    }

    #[test]
    fn test_block_count_round_trip() {
        // k 个合法块 → k 条记录
        let raw = format!(
            "{}-END-\n{}-END-\n{}-END-",
            well_formed_block("J001"),
            well_formed_block("J002"),
            well_formed_block("J003")
        );
        let questions = parse_response(&raw, &unit());
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].question_key, "J001");
        assert_eq!(questions[2].question_key, "J003");
    }

    #[test]
    fn test_end_to_end_single_block() {
        let raw = "TOPIC: Joins\nCONCEPT: Inner Join\nQUESTION_KEY: J001\nQUESTION_TEXT: What does an inner join return?\nOPTION_1: Matching rows\nOPTION_2: All rows\nOPTION_3: No rows\nOPTION_4: Distinct rows\nCORRECT_OPTION: OPTION_1\n-END-";
        let questions = parse_response(raw, &unit());
        assert_eq!(questions.len(), 1);

        let q = &questions[0];
        assert_eq!(q.topic, "Joins");
        assert_eq!(q.concept, "Inner Join");
        assert_eq!(q.options.len(), 4);
        assert!(q.options[0].is_correct);
        assert!(q.options[1..].iter().all(|o| !o.is_correct));
        assert_eq!(q.unit.unit_id, "unit-7");
        assert_eq!(q.category, Category::Base);
    }

    #[test]
    fn test_multi_line_field_integrity() {
        // 题干里嵌套代码围栏和 markdown 表格，必须原样保留到下一个键为止
        let question_text = "Given the query below:\n\n\
            ```sql\n\
            SELECT e.name, d.name\n\
            FROM employees e\n\
            INNER JOIN departments d ON e.dept_id = d.id;\n\
            ```\n\n\
            | col | type |\n\
            |-----|------|\n\
            | id  | int  |\n\n\
            Which rows appear in the result?";
        let raw = format!(
            "TOPIC: Joins\nCONCEPT: Inner Join\nQUESTION_KEY: J010\nQUESTION_TEXT: {}\nOPTION_1: Only matching rows\nOPTION_2: All rows\nCORRECT_OPTION: OPTION_1\n-END-",
            question_text
        );
        let questions = parse_response(&raw, &unit());
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_text, question_text);
        assert_eq!(questions[0].options.len(), 2);
    }

    #[test]
    fn test_malformed_block_tolerance() {
        // 三个块中第二个缺 QUESTION_KEY，只产出 1、3 两条记录，不 panic
        let bad_block = "TOPIC: Joins\nCONCEPT: Left Join\nQUESTION_TEXT: Broken?\nOPTION_1: A\nOPTION_2: B\nCORRECT_OPTION: OPTION_1\n";
        let raw = format!(
            "{}-END-\n{}-END-\n{}-END-",
            well_formed_block("J001"),
            bad_block,
            well_formed_block("J003")
        );
        let questions = parse_response(&raw, &unit());
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question_key, "J001");
        assert_eq!(questions[1].question_key, "J003");
    }

    #[test]
    fn test_option_correctness_mapping() {
        // CORRECT_OPTION: OPTION_3 → options[2] 正确，其余为假
        let raw = "TOPIC: Aggregates\nCONCEPT: COUNT\nQUESTION_KEY: A001\nQUESTION_TEXT: Which counts rows?\nOPTION_1: SUM\nOPTION_2: AVG\nOPTION_3: COUNT\nOPTION_4: MAX\nCORRECT_OPTION: OPTION_3\n-END-";
        let questions = parse_response(raw, &unit());
        let q = &questions[0];
        assert!(!q.options[0].is_correct);
        assert!(!q.options[1].is_correct);
        assert!(q.options[2].is_correct);
        assert!(!q.options[3].is_correct);
        assert_eq!(q.correct_indices(), vec![2]);
        assert_eq!(q.correct_option_tokens().as_deref(), Some("OPTION_3"));
    }

    #[test]
    fn test_na_sentinel_handling() {
        // CODE: NA 存为缺失；选项文本恰好是 "NA" 则保留字面值
        let raw = "TOPIC: Basics\nCONCEPT: NULL\nQUESTION_KEY: B001\nQUESTION_TEXT: Placeholder?\nCODE: NA\nCODE_LANGUAGE: NA\nOPTION_1: Something\nOPTION_2: NA\nCORRECT_OPTION: OPTION_2\n-END-";
        let questions = parse_response(raw, &unit());
        let q = &questions[0];
        assert_eq!(q.code, None);
        assert_eq!(q.code_language, None);
        assert_eq!(q.options[1].text, "NA");
        assert!(q.options[1].is_correct);
    }

    #[test]
    fn test_multi_answer_correct_options() {
        let raw = "TOPIC: Joins\nCONCEPT: Join types\nQUESTION_KEY: M001\nQUESTION_TEXT: Which joins keep unmatched rows?\nQUESTION_TYPE: MORE_THAN_ONE_MULTIPLE_CHOICE\nOPTION_1: INNER JOIN\nOPTION_2: LEFT JOIN\nOPTION_3: RIGHT JOIN\nOPTION_4: CROSS JOIN\nCORRECT_OPTIONS: OPTION_2,OPTION_3\n-END-";
        let questions = parse_response(raw, &unit());
        let q = &questions[0];
        assert_eq!(q.question_type, QuestionType::MoreThanOneMultipleChoice);
        assert_eq!(q.correct_indices(), vec![1, 2]);
        assert_eq!(
            q.correct_option_tokens().as_deref(),
            Some("OPTION_2,OPTION_3")
        );
    }

    #[test]
    fn test_rearrange_defaults_to_sequential_order() {
        let raw = "TOPIC: Queries\nCONCEPT: Query execution\nQUESTION_KEY: R001\nQUESTION_TEXT: Order the clauses.\nQUESTION_TYPE: REARRANGE\nOPTION_1: FROM\nOPTION_2: WHERE\nOPTION_3: SELECT\n-END-";
        let questions = parse_response(raw, &unit());
        match &questions[0].extra {
            QuestionExtra::Rearrange { steps } => {
                assert_eq!(steps.len(), 3);
                assert_eq!(steps[0].display_order, 1);
                assert_eq!(steps[2].correct_order, 3);
                assert_eq!(steps[1].text, "WHERE");
            }
            other => panic!("期望 Rearrange 载荷，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_rearrange_explicit_orders() {
        let raw = "TOPIC: Queries\nCONCEPT: Query execution\nQUESTION_KEY: R002\nQUESTION_TEXT: Order the clauses.\nQUESTION_TYPE: REARRANGE\nOPTION_1: SELECT\nOPTION_2: FROM\nOPT_1_DSPLY_ORDER: 1\nOPT_1_CRT_ORDER: 2\nOPT_2_DSPLY_ORDER: 2\nOPT_2_CRT_ORDER: 1\n-END-";
        let questions = parse_response(raw, &unit());
        match &questions[0].extra {
            QuestionExtra::Rearrange { steps } => {
                assert_eq!(steps[0].correct_order, 2);
                assert_eq!(steps[1].correct_order, 1);
            }
            other => panic!("期望 Rearrange 载荷，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_fib_sql_coding_resources() {
        let raw = "TOPIC: DML\nCONCEPT: INSERT\nQUESTION_KEY: F001\nQUESTION_TEXT: Fill in the blank.\nQUESTION_TYPE: FIB_SQL_CODING\nOPTION_1: placeholder\nCORRECT_OPTION: INSERT INTO\nOUTPUT: 1 row affected\nDB_URL: https://db.example.com/fixtures/shop\nTEST_URL: https://test.example.com/fib/F001\nTABLES_USED: orders, customers\n-END-";
        let questions = parse_response(raw, &unit());
        match &questions[0].extra {
            QuestionExtra::FillInBlank { answers, resources } => {
                assert_eq!(answers[0].position, 1);
                assert_eq!(answers[0].correct_answer, "INSERT INTO");
                assert_eq!(answers[0].expected_output.as_deref(), Some("1 row affected"));
                let res = resources.as_ref().expect("FIB_SQL_CODING 应携带外部资源");
                assert_eq!(res.tables_used, vec!["orders", "customers"]);
            }
            other => panic!("期望 FillInBlank 载荷，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_code_analysis_textual_cases() {
        let raw = "TOPIC: Functions\nCONCEPT: UPPER\nQUESTION_KEY: C001\nQUESTION_TEXT: What is printed?\nQUESTION_TYPE: CODE_ANALYSIS_TEXTUAL\nCODE: SELECT UPPER('abc');\nCODE_LANGUAGE: sql\nOPTION_1: placeholder\nINPUT: 'abc'\nOUTPUT: ABC\n-END-";
        let questions = parse_response(raw, &unit());
        let q = &questions[0];
        assert_eq!(q.code.as_deref(), Some("SELECT UPPER('abc');"));
        assert_eq!(q.code_language.as_deref(), Some("sql"));
        match &q.extra {
            QuestionExtra::CodeAnalysis { cases } => {
                assert_eq!(cases.len(), 1);
                assert_eq!(cases[0].input_case.as_deref(), Some("'abc'"));
                assert_eq!(cases[0].expected_output, "ABC");
            }
            other => panic!("期望 CodeAnalysis 载荷，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_choice_question_needs_two_options() {
        let raw = "TOPIC: Joins\nCONCEPT: Inner Join\nQUESTION_KEY: J020\nQUESTION_TEXT: Single option?\nOPTION_1: Only one\nCORRECT_OPTION: OPTION_1\n-END-";
        assert!(parse_response(raw, &unit()).is_empty());

        let err = parse_block(
            "TOPIC: T\nCONCEPT: C\nQUESTION_KEY: K\nQUESTION_TEXT: Q\nOPTION_1: A\n",
            &unit(),
        )
        .unwrap_err();
        assert_eq!(err, ParseError::NotEnoughOptions { count: 1 });
    }

    #[test]
    fn test_empty_input_returns_empty() {
        assert!(parse_response("", &unit()).is_empty());
        assert!(parse_response("   \n  ", &unit()).is_empty());
        // 只有分隔符也不产出任何记录
        assert!(parse_response("-END-\n-END-", &unit()).is_empty());
    }

    #[test]
    fn test_empty_unit_context_drops_block() {
        let raw = format!("{}-END-", well_formed_block("J001"));
        let questions = parse_response(&raw, &UnitContext::default());
        assert!(questions.is_empty());
    }
}
