//! 检索流程 - 流程层
//!
//! 核心职责：把一个全新的会话从落地页带到已加载的结果表格
//!
//! 状态顺序：
//! 1. 落地页 → 同意条款 → 进入检索区域 → 选择模式标签
//! 2. （需要时）截取验证码 → 识别 → 填写答案
//! 3. 填写表单 → 提交
//! 4. 验证码错误：换一个新会话重来一次，整次运行累计第二次即终止
//! 5. 结果超限：立即终止
//! 6. 等待结果表格，解析列映射和行数

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::error::{ConfigError, SearchError, SessionError, SessionResult};
use crate::infrastructure::{PortalPage, PortalSession, Scope, SessionLauncher};
use crate::models::criteria::{SearchCriteria, SubmitStyle};
use crate::models::grid::ResultGrid;
use crate::selectors::{grid, landing, outcome};
use crate::services::challenge::{capture_challenge, ChallengeSolver};
use crate::services::form_filler::FormFiller;

/// 验证码最多被拒绝的次数（第二次即终止）
pub const MAX_VERIFICATION_ROUNDS: u32 = 2;

/// 已就绪的检索结果：会话、主页面和结果表格
pub struct ReadySearch {
    pub session: Box<dyn PortalSession>,
    pub page: Box<dyn PortalPage>,
    pub grid: ResultGrid,
    /// 结果表格选择器
    pub table: &'static str,
}

impl ReadySearch {
    /// 关闭主页面和会话
    pub async fn close(self) -> SessionResult<()> {
        close_all(self.session, self.page).await
    }
}

/// 整次运行内验证码被拒绝的次数，跨检索尝试累计
#[derive(Debug, Default)]
pub struct RejectionCounter(AtomicU32);

impl RejectionCounter {
    /// 记一次拒绝，返回累计次数
    pub fn record(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// 单次提交的结果
enum Submitted {
    Grid(ResultGrid),
    /// 验证码被判定错误
    Rejected,
}

/// 检索流程
///
/// - 每次 `run()` 都从一个全新的会话开始
/// - 不持有会话；成功时把会话交给调用方
pub struct SearchOrchestrator {
    launcher: Arc<dyn SessionLauncher>,
    solver: Option<Arc<dyn ChallengeSolver>>,
    portal_url: String,
    timings: Timings,
}

impl SearchOrchestrator {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        solver: Option<Arc<dyn ChallengeSolver>>,
        portal_url: impl Into<String>,
        timings: Timings,
    ) -> Self {
        Self {
            launcher,
            solver,
            portal_url: portal_url.into(),
            timings,
        }
    }

    /// 执行一次完整的检索尝试
    ///
    /// `rejections` 由调用方在整次运行内共享，累计达到
    /// `MAX_VERIFICATION_ROUNDS` 时返回 `VerificationRejected`。
    pub async fn run(
        &self,
        criteria: &SearchCriteria,
        attempt: u32,
        rejections: &RejectionCounter,
    ) -> Result<ReadySearch, SearchError> {
        let kind = criteria.kind();
        if kind.requires_challenge() && self.solver.is_none() {
            return Err(ConfigError::MissingSolverCredential {
                mode: kind.to_string(),
            }
            .into());
        }

        let filler = FormFiller::for_mode(kind);

        loop {
            info!(
                "[检索 {}] 🚀 启动新会话 (已被拒绝 {} 次)",
                attempt,
                rejections.count()
            );
            let session = self.launcher.launch().await?;
            let page = match session.new_page().await {
                Ok(page) => page,
                Err(e) => {
                    close_session(session).await;
                    return Err(e.into());
                }
            };

            match self.drive(&*page, criteria, &filler, attempt).await {
                Ok(Submitted::Grid(grid)) => {
                    info!(
                        "[检索 {}] ✓ 结果表格已就绪: {} 行, 列映射 {:?}",
                        attempt,
                        grid.row_count,
                        grid.mapping()
                    );
                    return Ok(ReadySearch {
                        session,
                        page,
                        grid,
                        table: filler.layout().results_table,
                    });
                }
                Ok(Submitted::Rejected) => {
                    if let Err(e) = close_all(session, page).await {
                        debug!("关闭会话失败: {}", e);
                    }
                    let rejected = rejections.record();
                    if rejected >= MAX_VERIFICATION_ROUNDS {
                        return Err(SearchError::VerificationRejected(rejected));
                    }
                    warn!("[检索 {}] ⚠️ 验证码被判定错误，使用新会话重新识别", attempt);
                }
                Err(e) => {
                    if let Err(close_err) = close_all(session, page).await {
                        debug!("关闭会话失败: {}", close_err);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn drive(
        &self,
        page: &dyn PortalPage,
        criteria: &SearchCriteria,
        filler: &FormFiller,
        attempt: u32,
    ) -> Result<Submitted, SearchError> {
        let main = Scope::Main;
        let layout = filler.layout();
        let wait = self.timings.element_wait;

        page.goto(&self.portal_url).await?;
        self.enter_search_area(page, attempt).await?;

        // 选择模式标签并等待表单挂载
        page.locate(&main, layout.tab).wait(wait).await?;
        page.locate(&main, layout.tab).click().await?;
        page.locate(&main, layout.signature).wait(wait).await?;
        debug!("[检索 {}] 模式 {} 表单已挂载", attempt, filler.kind());

        if filler.kind().requires_challenge() {
            self.answer_challenge(page, attempt).await?;
        }

        let applied = filler.fill(page, criteria).await?;
        for (selector, value) in &applied {
            debug!("[检索 {}] {} = {}", attempt, selector, value);
        }
        info!("[检索 {}] 📝 已填写 {} 个字段，提交检索", attempt, applied.len());
        filler.submit(page).await?;

        sleep(self.timings.outcome_settle).await;
        if let Some(submitted) = self.check_indicators(page).await? {
            return Ok(submitted);
        }

        let results_wait = match filler.kind().submit_style() {
            SubmitStyle::FormPost => self.timings.results_wait_form,
            SubmitStyle::ButtonClick => self.timings.results_wait_direct,
        };
        if let Err(e) = page.locate(&main, layout.results_table).wait(results_wait).await {
            // 提示可能晚于等待开始时才出现
            if let Some(submitted) = self.check_indicators(page).await? {
                return Ok(submitted);
            }
            return Err(e.into());
        }

        let grid = resolve_grid(page, layout.results_table).await?;
        Ok(Submitted::Grid(grid))
    }

    async fn enter_search_area(&self, page: &dyn PortalPage, attempt: u32) -> SessionResult<()> {
        let main = Scope::Main;
        let wait = self.timings.element_wait;

        match page.locate(&main, landing::ACCEPT_TERMS).wait(wait).await {
            Ok(()) => {
                page.locate(&main, landing::ACCEPT_TERMS).click().await?;
                info!("[检索 {}] ✓ 已同意使用条款", attempt);
            }
            Err(SessionError::Timeout { .. }) => {
                debug!("[检索 {}] 未出现使用条款，跳过", attempt);
            }
            Err(e) => return Err(e),
        }

        if !page.locate(&main, landing::SIDEBAR).exists().await? {
            page.locate(&main, landing::SEARCH_ENTRY).wait(wait).await?;
            page.locate(&main, landing::SEARCH_ENTRY).click().await?;
        }
        page.locate(&main, landing::SIDEBAR).wait(wait).await
    }

    async fn answer_challenge(&self, page: &dyn PortalPage, attempt: u32) -> Result<(), SearchError> {
        let solver = self.solver.as_ref().ok_or_else(|| ConfigError::MissingSolverCredential {
            mode: "challenge".to_string(),
        })?;

        let captured = capture_challenge(page).await?;
        info!("[检索 {}] 🧩 验证码已截取 ({} 字节)，等待识别...", attempt, captured.image.len());

        let answer = solver.solve(&captured.image).await?;
        info!("[检索 {}] ✓ 验证码识别结果: {}", attempt, answer);

        page.fill(&captured.input, answer.trim()).await?;
        Ok(())
    }

    /// 按优先级检查提交后的提示：验证码错误 > 结果超限
    async fn check_indicators(&self, page: &dyn PortalPage) -> Result<Option<Submitted>, SearchError> {
        let main = Scope::Main;

        if visible_text(page, &main, outcome::INCORRECT_VERIFICATION).await?.is_some() {
            return Ok(Some(Submitted::Rejected));
        }
        if let Some(message) = visible_text(page, &main, outcome::RESULT_LIMIT).await? {
            return Err(SearchError::ResultLimitExceeded(message));
        }
        Ok(None)
    }
}

/// 元素存在且文本非空时返回文本
async fn visible_text(page: &dyn PortalPage, scope: &Scope, selector: &str) -> SessionResult<Option<String>> {
    let text = page.locate(scope, selector).text_if_exists().await?;
    Ok(text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
}

/// 从已加载的结果表格解析列映射和行数
pub async fn resolve_grid(page: &dyn PortalPage, table: &str) -> SessionResult<ResultGrid> {
    let main = Scope::Main;
    let headers = page.locate(&main, grid::header_cells(table)).texts().await?;
    let row_count = page.locate(&main, grid::rows(table)).count().await?;
    Ok(ResultGrid::resolve(&headers, row_count))
}

async fn close_all(session: Box<dyn PortalSession>, page: Box<dyn PortalPage>) -> SessionResult<()> {
    if let Err(e) = page.close().await {
        debug!("关闭页面失败: {}", e);
    }
    session.close().await
}

async fn close_session(session: Box<dyn PortalSession>) {
    if let Err(e) = session.close().await {
        debug!("关闭会话失败: {}", e);
    }
}
