//! 单元上下文
//!
//! 封装"这批题目属于哪个课程单元"这一信息

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 单元上下文
///
/// 解析出的每一道题目都会统一带上这份上下文。
/// `unit_id` 是数据库外键，`unit_title` 是展示用的单元名称，
/// 两者指向同一个单元（历史上两种写法并存，这里统一收在一个结构里）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitContext {
    /// 单元ID（questions 表外键）
    pub unit_id: String,

    /// 单元标题（展示用）
    pub unit_title: String,
}

impl UnitContext {
    /// 创建新的单元上下文
    pub fn new(unit_id: impl Into<String>, unit_title: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            unit_title: unit_title.into(),
        }
    }

    /// 上下文是否可用（unit_id 不能为空）
    pub fn is_valid(&self) -> bool {
        !self.unit_id.trim().is_empty()
    }
}

impl Display for UnitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.unit_title.is_empty() {
            write!(f, "[单元 #{}]", self.unit_id)
        } else {
            write!(f, "[单元 #{} {}]", self.unit_id, self.unit_title)
        }
    }
}
