//! 流程层
//!
//! 定义单个处理单位（一道基础题）的完整链路，不持有存储资源，
//! 批量调度和统计在 orchestrator 层

pub mod variant_ctx;
pub mod variant_flow;

pub use variant_ctx::VariantCtx;
pub use variant_flow::VariantFlow;
