//! 编排层
//!
//! 应用入口和批量调度：模式分发、基础题加载、逐题统计、资源持有

pub mod batch_processor;
pub mod generation_processor;

pub use batch_processor::App;
