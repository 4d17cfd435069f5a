//! 运行流水线 - 编排层
//!
//! ## 职责
//!
//! 1. **检索**：在重试策略下执行 `SearchOrchestrator`，致命错误立即终止
//! 2. **遍历行**：按表格顺序逐行调用 `RowExtractor`，单行失败只计数
//! 3. **导出**：把每条记录交给 `ExportBuffer`
//! 4. **资源回收**：每处理若干行关闭残留页面
//! 5. **统计输出**：最终刷新并返回 `RunOutcome`

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::SearchError;
use crate::models::criteria::SearchCriteria;
use crate::models::outcome::{RunOutcome, RunStatus};
use crate::orchestrator::export_buffer::{ExportBuffer, FlushReport};
use crate::utils::retry::{retry, RetryPolicy};
use crate::workflow::{ReadySearch, RejectionCounter, RowCtx, RowExtractor, SearchOrchestrator};

/// 运行流水线
pub struct PipelineDriver {
    search: SearchOrchestrator,
    extractor: RowExtractor,
    buffer: ExportBuffer,
    /// 整体检索的尝试次数和间隔
    attempts: RetryPolicy,
    /// 每处理多少行释放一次残留页面（0 表示不释放）
    release_interval: usize,
}

impl PipelineDriver {
    pub fn new(
        search: SearchOrchestrator,
        extractor: RowExtractor,
        buffer: ExportBuffer,
        attempts: RetryPolicy,
        release_interval: usize,
    ) -> Self {
        Self {
            search,
            extractor,
            buffer,
            attempts,
            release_interval,
        }
    }

    pub fn buffer(&self) -> &ExportBuffer {
        &self.buffer
    }

    /// 执行一次完整运行
    pub async fn run(&mut self, criteria: &SearchCriteria) -> RunOutcome {
        let started = Instant::now();

        // ========== 检索 ==========
        let ready = match self.search_with_retry(criteria).await {
            Ok(ready) => ready,
            Err(e) => {
                error!("❌ 检索失败，运行终止: {}", e);
                let mut outcome = RunOutcome::fatal(e.to_string());
                outcome.elapsed = started.elapsed();
                return outcome;
            }
        };

        let mut outcome = RunOutcome::default();
        let total = match criteria.max_rows {
            Some(limit) => ready.grid.row_count.min(limit),
            None => ready.grid.row_count,
        };

        if total == 0 {
            info!("📭 检索没有结果，运行结束");
            outcome.status = RunStatus::NoResults;
        } else {
            log_rows_start(ready.grid.row_count, total);
            if criteria.export_mode.captures_images() && !ready.grid.images_available() {
                warn!("⚠️ 结果表格没有图片列，本次运行不截取图片");
            }
            self.process_rows(&ready, total, &mut outcome).await;

            // 剩余记录
            if let Some(report) = self.buffer.flush().await {
                log_flush(&report);
            }
            outcome.status = RunStatus::Completed;
        }

        outcome.flushes = self.buffer.flushes();
        outcome.elapsed = started.elapsed();

        if let Err(e) = ready.close().await {
            warn!("关闭浏览器会话失败: {}", e);
        }
        outcome
    }

    async fn search_with_retry(&self, criteria: &SearchCriteria) -> Result<ReadySearch, SearchError> {
        let search = &self.search;
        let max_attempts = self.attempts.attempts;
        let rejections = RejectionCounter::default();
        let rejections = &rejections;

        retry(
            self.attempts,
            |attempt| async move {
                info!("🔍 第 {}/{} 次检索尝试", attempt, max_attempts);
                let result = search.run(criteria, attempt, rejections).await;
                if let Err(e) = &result {
                    if e.is_fatal() {
                        error!("[检索 {}] ❌ 致命错误，不再重试: {}", attempt, e);
                    } else {
                        warn!("[检索 {}] ⚠️ 检索失败: {}", attempt, e);
                    }
                }
                result
            },
            |e: &SearchError| !e.is_fatal(),
        )
        .await
    }

    async fn process_rows(&mut self, ready: &ReadySearch, total: usize, outcome: &mut RunOutcome) {
        for row in 1..=total {
            let ctx = RowCtx::new(row, total, ready.table);
            info!("\n{} {}", ctx, "─".repeat(30));

            match self
                .extractor
                .extract(&*ready.session, &*ready.page, &ready.grid, &ctx)
                .await
            {
                Ok(output) => {
                    outcome.record_success();
                    outcome.images_saved += output.images_saved;
                    if let Some(report) = self.buffer.append(output.record).await {
                        log_flush(&report);
                    }
                }
                Err(e) => {
                    error!("{} ❌ 处理失败: {}", ctx, e);
                    outcome.record_failure();
                    if let Err(e) = self.extractor.restore_grid(&*ready.page, &ctx).await {
                        warn!("{} ⚠️ 无法回到结果表格: {}", ctx, e);
                    }
                }
            }

            if self.release_interval > 0 && row % self.release_interval == 0 {
                match ready.session.release_transient().await {
                    Ok(closed) => info!("🧹 已处理 {} 行，释放 {} 个残留页面", row, closed),
                    Err(e) => warn!("释放残留页面失败: {}", e),
                }
            }
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_rows_start(grid_rows: usize, total: usize) {
    info!("{}", "=".repeat(60));
    if total < grid_rows {
        info!("📋 结果表格共 {} 行，本次处理前 {} 行", grid_rows, total);
    } else {
        info!("📋 结果表格共 {} 行", grid_rows);
    }
    info!("{}", "=".repeat(60));
}

fn log_flush(report: &FlushReport) {
    if report.is_clean() {
        debug!("✓ {} 条记录已写入两个输出端", report.records);
    } else {
        warn!("⚠️ 本批 {} 条记录未能写入全部输出端", report.records);
    }
}
