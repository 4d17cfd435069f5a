//! 行处理上下文
//!
//! 封装"我正在处理结果表格的第几行"这一信息

use std::fmt::Display;

/// 行处理上下文
#[derive(Debug, Clone)]
pub struct RowCtx {
    /// 行号（从 1 开始，与表格的 nth-of-type 一致）
    pub row: usize,

    /// 本次运行要处理的总行数（仅用于日志显示）
    pub total: usize,

    /// 结果表格选择器
    pub table: &'static str,
}

impl RowCtx {
    pub fn new(row: usize, total: usize, table: &'static str) -> Self {
        Self { row, total, table }
    }
}

impl Display for RowCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[行 {}/{}]", self.row, self.total)
    }
}
