use std::fmt;
use std::time::Duration;

/// 运行的终止状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunStatus {
    /// 仍在处理中
    #[default]
    Running,
    /// 正常处理完所有行
    Completed,
    /// 检索没有结果
    NoResults,
    /// 未进入行处理阶段就终止
    Fatal(String),
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 导出缓冲区执行刷新的批次数（含输出端写入失败的批次）
    pub flushes: usize,
    pub images_saved: usize,
    pub status: RunStatus,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.attempted += 1;
        self.failed += 1;
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Fatal(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.status, RunStatus::Fatal(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            RunStatus::Fatal(reason) => write!(f, "运行终止: {}", reason),
            _ => write!(
                f,
                "处理 {} 行: 成功 {}, 失败 {}",
                self.attempted, self.succeeded, self.failed
            ),
        }
    }
}
