//! 解析层
//!
//! 生成端返回的原始文本与强类型 `Question` 之间的唯一边界。
//! `field` 定义封闭的字段词汇表，`response_parser` 负责按块切分、
//! 逐行扫描和组装校验。

pub mod field;
pub mod response_parser;

pub use field::FieldKey;
pub use response_parser::{parse_block, parse_response, BLOCK_SEPARATOR};
