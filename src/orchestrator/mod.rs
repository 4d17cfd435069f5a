//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的整体调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 初始化日志文件、加载检索条件
//! - 组装浏览器启动器、验证码服务和输出端
//! - 输出最终统计信息
//!
//! ### `pipeline` - 运行流水线
//! - 在重试策略下执行检索
//! - 逐行提取，单行失败只计数
//! - 定期释放残留页面
//!
//! ### `export_buffer` - 导出缓冲区
//! - 按批次写入数据集和分隔文件
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! pipeline (处理结果表格的所有行)
//!     ↓
//! workflow::SearchOrchestrator / RowExtractor (一次检索 / 一行)
//!     ↓
//! services (能力层：表单 / 验证码 / 输出端)
//!     ↓
//! infrastructure (基础设施：PortalPage / JsExecutor)
//! ```

pub mod app;
pub mod export_buffer;
pub mod pipeline;

// 重新导出主要类型
pub use app::App;
pub use export_buffer::{ExportBuffer, FlushReport};
pub use pipeline::PipelineDriver;
