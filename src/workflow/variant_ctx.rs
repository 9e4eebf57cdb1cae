//! 变体生成的流程上下文

use crate::models::UnitContext;

/// 单道基础题在整批处理中的位置信息
///
/// 只携带日志和编排需要的定位数据，不携带题目内容
#[derive(Debug, Clone)]
pub struct VariantCtx {
    /// 当前基础题序号（从 1 开始）
    pub base_index: usize,
    /// 基础题总数
    pub base_total: usize,
    /// 所属单元
    pub unit: UnitContext,
}

impl VariantCtx {
    pub fn new(base_index: usize, base_total: usize, unit: UnitContext) -> Self {
        Self {
            base_index,
            base_total,
            unit,
        }
    }
}
