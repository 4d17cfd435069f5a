//! # Land Records Export
//!
//! 从政府土地登记门户检索文档、逐行提取详情和扫描图片，并批量写入两个输出端
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器页面），只暴露能力
//! - `PortalSession` / `PortalPage` - 会话与页面的 DOM 原语
//! - `JsExecutor` - 唯一的 page owner，提供按作用域 eval() 能力
//! - `browser/` - 基于 chromiumoxide 的实现（启动无头浏览器或连接调试端口）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个对象
//! - `FormFiller` - 各检索模式的表单填写与代码翻译
//! - `ChallengeSolver` - 验证码截取与识别
//! - `DatasetSink` / `FileSink` / `ImageStore` - 三个输出端
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次检索"和"一行结果"的完整处理流程
//! - `SearchOrchestrator` - 落地页 → 表单 → 提交 → 结果表格
//! - `RowExtractor` - 单元格 → 图片（查看器翻页）→ 详情页
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 检索重试、逐行处理、失败隔离
//! - `orchestrator/export_buffer` - 批量写入两个输出端
//! - `orchestrator/app` - 组装协作者，输出统计
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod selectors;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Timings};
pub use error::AppError;
pub use infrastructure::{JsExecutor, PortalPage, PortalSession, SessionLauncher};
pub use models::{Record, RunOutcome, SearchCriteria};
pub use orchestrator::{App, ExportBuffer, PipelineDriver};
pub use workflow::{RowCtx, RowExtractor, SearchOrchestrator};
