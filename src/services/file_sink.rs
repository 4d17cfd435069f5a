//! 分隔文件写入服务 - 业务能力层
//!
//! 只负责"把一批记录追加到本地分隔文件"，不关心批次何时形成

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SinkError;
use crate::models::record::Record;

/// 字段分隔符
pub const FIELD_SEPARATOR: char = '|';

/// 本地文件输出端
pub trait FileSink: Send + Sync {
    /// 追加一批记录
    fn append(&self, batch: &[Record]) -> Result<(), SinkError>;
}

/// 管道符分隔文件
///
/// - 文件不存在或为空时先写一行表头
/// - 每个字段都加双引号，字段内的双引号写成两个
/// - 每条记录一行，图片链接字段内部的换行原样保留在引号中
pub struct DelimitedFileSink {
    path: PathBuf,
}

impl DelimitedFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::File {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl FileSink for DelimitedFileSink {
    fn append(&self, batch: &[Record]) -> Result<(), SinkError> {
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut content = String::new();
        if needs_header {
            content.push_str(&format_line(&Record::HEADERS));
        }
        for record in batch {
            content.push_str(&format_line(&record.fields()));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| self.io_error(e))?;

        debug!(
            "已写入 {} 条记录到 {}",
            batch.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// 一行：引号包裹、管道符分隔、`\n` 结尾
pub fn format_line(fields: &[&str]) -> String {
    let quoted: Vec<String> = fields
        .iter()
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect();
    let mut line = quoted.join(&FIELD_SEPARATOR.to_string());
    line.push('\n');
    line
}
