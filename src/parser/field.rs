//! 字段词汇表
//!
//! 线上格式的键是一个封闭集合：固定的标量键，加上若干带编号的键族
//! （`OPTION_<n>`、`INPUT_<n>` 等）。解析器逐行扫描时靠"这一行是否以
//! 词汇表内的键开头"来判定上一个字段的取值在哪里结束，因此词汇表必须
//! 完整——哪怕某个键解析后会被丢弃（如 `OPTION_<n>_ID`），也必须被识别，
//! 否则它的整行会被误并进上一个字段的多行取值里。

use phf::phf_map;
use regex::Regex;
use std::sync::LazyLock;

/// 线上格式中允许出现的字段键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Topic,
    Concept,
    NewConcepts,
    QuestionId,
    QuestionKey,
    BaseQuestionKeys,
    QuestionText,
    QuestionType,
    LearningOutcome,
    Code,
    ContentType,
    CodeLanguage,
    CorrectOption,
    /// 多选题扩展：逗号分隔的多个 `OPTION_<k>` 记号
    CorrectOptions,
    BloomLevel,
    Explanation,
    TagNames,
    Input,
    Output,
    DbUrl,
    TestUrl,
    TablesUsed,
    /// `OPTION_<n>`，1-based 编号
    Option(u32),
    /// `OPTION_<n>_ID` / `OPT<n>_ID`（识别后丢弃）
    OptionId(u32),
    /// `INPUT_<n>`
    InputN(u32),
    /// `INPUT_<n>_ID`（识别后丢弃）
    InputId(u32),
    /// `OUTPUT_<n>`
    OutputN(u32),
    /// `OPT_<n>_DSPLY_ORDER`（排序题展示顺序）
    DisplayOrder(u32),
    /// `OPT_<n>_CRT_ORDER`（排序题正确顺序）
    CorrectOrder(u32),
}

/// 固定标量键表
static SCALAR_KEYS: phf::Map<&'static str, FieldKey> = phf_map! {
    "TOPIC" => FieldKey::Topic,
    "CONCEPT" => FieldKey::Concept,
    "NEW_CONCEPTS" => FieldKey::NewConcepts,
    "QUESTION_ID" => FieldKey::QuestionId,
    "QUESTION_KEY" => FieldKey::QuestionKey,
    "BASE_QUESTION_KEYS" => FieldKey::BaseQuestionKeys,
    "QUESTION_TEXT" => FieldKey::QuestionText,
    "QUESTION_TYPE" => FieldKey::QuestionType,
    "LEARNING_OUTCOME" => FieldKey::LearningOutcome,
    "CODE" => FieldKey::Code,
    "CONTENT_TYPE" => FieldKey::ContentType,
    "CODE_LANGUAGE" => FieldKey::CodeLanguage,
    "CORRECT_OPTION" => FieldKey::CorrectOption,
    "CORRECT_OPTIONS" => FieldKey::CorrectOptions,
    "BLOOM_LEVEL" => FieldKey::BloomLevel,
    "EXPLANATION" => FieldKey::Explanation,
    "TAG_NAMES" => FieldKey::TagNames,
    "INPUT" => FieldKey::Input,
    "OUTPUT" => FieldKey::Output,
    "DB_URL" => FieldKey::DbUrl,
    "TEST_URL" => FieldKey::TestUrl,
    "TABLES_USED" => FieldKey::TablesUsed,
};

/// 带编号的键族
static NUMBERED_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^(?:
            OPTION_(?P<opt>\d+)(?P<opt_id>_ID)?
          | INPUT_(?P<inp>\d+)(?P<inp_id>_ID)?
          | OUTPUT_(?P<out>\d+)
          | OPT(?P<legacy_id>\d+)_ID
          | OPT_(?P<dsply>\d+)_DSPLY_ORDER
          | OPT_(?P<crt>\d+)_CRT_ORDER
        )$",
    )
    .expect("数字键族正则应当合法")
});

impl FieldKey {
    /// 从键名字面值解析
    pub fn from_token(token: &str) -> Option<FieldKey> {
        if let Some(key) = SCALAR_KEYS.get(token) {
            return Some(*key);
        }

        let caps = NUMBERED_KEY_RE.captures(token)?;
        if let Some(n) = caps.name("opt") {
            let n = n.as_str().parse().ok()?;
            return if caps.name("opt_id").is_some() {
                Some(FieldKey::OptionId(n))
            } else {
                Some(FieldKey::Option(n))
            };
        }
        if let Some(n) = caps.name("inp") {
            let n = n.as_str().parse().ok()?;
            return if caps.name("inp_id").is_some() {
                Some(FieldKey::InputId(n))
            } else {
                Some(FieldKey::InputN(n))
            };
        }
        if let Some(n) = caps.name("out") {
            return Some(FieldKey::OutputN(n.as_str().parse().ok()?));
        }
        if let Some(n) = caps.name("legacy_id") {
            return Some(FieldKey::OptionId(n.as_str().parse().ok()?));
        }
        if let Some(n) = caps.name("dsply") {
            return Some(FieldKey::DisplayOrder(n.as_str().parse().ok()?));
        }
        if let Some(n) = caps.name("crt") {
            return Some(FieldKey::CorrectOrder(n.as_str().parse().ok()?));
        }
        None
    }
}

/// 判断一行是否开启了一个新字段
///
/// 键必须顶格出现、后跟冒号，键名只允许大写字母/数字/下划线。
/// 命中则返回键和冒号之后的剩余内容（首行取值），否则这一行属于
/// 上一个字段的多行取值。
pub fn split_field_line(line: &str) -> Option<(FieldKey, &str)> {
    let colon = line.find(':')?;
    let token = &line[..colon];
    if token.is_empty()
        || !token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
    {
        return None;
    }
    let key = FieldKey::from_token(token)?;
    Some((key, &line[colon + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_keys() {
        assert_eq!(FieldKey::from_token("TOPIC"), Some(FieldKey::Topic));
        assert_eq!(
            FieldKey::from_token("CORRECT_OPTIONS"),
            Some(FieldKey::CorrectOptions)
        );
        assert_eq!(FieldKey::from_token("TOPICS"), None);
        assert_eq!(FieldKey::from_token("topic"), None);
    }

    #[test]
    fn test_numbered_keys() {
        assert_eq!(FieldKey::from_token("OPTION_1"), Some(FieldKey::Option(1)));
        assert_eq!(
            FieldKey::from_token("OPTION_12_ID"),
            Some(FieldKey::OptionId(12))
        );
        assert_eq!(FieldKey::from_token("OPT3_ID"), Some(FieldKey::OptionId(3)));
        assert_eq!(FieldKey::from_token("INPUT_2"), Some(FieldKey::InputN(2)));
        assert_eq!(
            FieldKey::from_token("OPT_4_DSPLY_ORDER"),
            Some(FieldKey::DisplayOrder(4))
        );
        assert_eq!(
            FieldKey::from_token("OPT_4_CRT_ORDER"),
            Some(FieldKey::CorrectOrder(4))
        );
        assert_eq!(FieldKey::from_token("OPTION_"), None);
        assert_eq!(FieldKey::from_token("OPTION_X"), None);
    }

    #[test]
    fn test_split_field_line() {
        let (key, rest) = split_field_line("TOPIC: Joins").unwrap();
        assert_eq!(key, FieldKey::Topic);
        assert_eq!(rest.trim(), "Joins");

        // SQL 代码行不应被当成字段键
        assert!(split_field_line("SELECT * FROM users;").is_none());
        // 缩进的键名不算顶格，属于多行取值
        assert!(split_field_line("  TOPIC: Joins").is_none());
        // 行内冒号前有空格，不是键
        assert!(split_field_line("note : something").is_none());
    }
}
