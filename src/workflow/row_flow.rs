//! 单行提取流程 - 流程层
//!
//! 核心职责：定义"一行结果"的完整处理流程
//!
//! 流程顺序：
//! 1. 读取可直接定位的单元格
//! 2. 图片（需要时）：打开查看器 → 翻页截取 → 合成保存
//! 3. 详情页（存在时）：同页跳转后后退，或新标签打开后关闭
//!
//! 任何一步的错误都原样返回，由调用方的行级边界统一计为失败。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::Timings;
use crate::error::{RowError, SessionError, SessionResult};
use crate::infrastructure::{PortalPage, PortalSession, Scope};
use crate::models::criteria::{DetailNavigation, DirectCells, ExportMode, ModeKind};
use crate::models::grid::ResultGrid;
use crate::models::record::{flatten, Record};
use crate::selectors::{detail, grid};
use crate::services::image_store::{ImageComposer, ImageStore};
use crate::workflow::row_ctx::RowCtx;
use crate::workflow::viewer::{resolve_link, ViewerCapture};

// ========== 详情页标签 ==========
//
// 每个字段按顺序尝试多个标签，取第一个有值的。

const DOCUMENT_NUMBER_LABELS: &[&str] = &["INSTRUMENT NUMBER", "INSTRUMENT #", "INSTRUMENT", "DOCUMENT NUMBER"];
const BOOK_LABELS: &[&str] = &["BOOK"];
const PAGE_LABELS: &[&str] = &["PAGE"];
const RECORDING_DATE_LABELS: &[&str] = &["RECORDING DATE", "RECORD DATE", "FILE DATE"];
const BOOK_TYPE_LABELS: &[&str] = &["INDEX", "BOOK TYPE"];
const DOCUMENT_TYPE_LABELS: &[&str] = &["TYPE", "DOCUMENT TYPE", "DOC TYPE"];
const AMOUNT_LABELS: &[&str] = &["AMOUNT", "CONSIDERATION"];
const GRANTOR_LABELS: &[&str] = &["GRANTOR", "GRANTORS", "MORTGAGOR", "MORTGAGORS"];
const GRANTEE_LABELS: &[&str] = &[
    "GRANTEE",
    "GRANTEES",
    "MORTGAGEE",
    "MORTGAGEES",
    "ASSIGNEE",
    "ASSIGNEES",
];
const REFERENCE_LABELS: &[&str] = &["REFERENCES", "REFERENCE"];
const REMARKS_LABELS: &[&str] = &["REMARKS", "NOTES", "REMARK", "NOTE"];
const PARCEL_LABELS: &[&str] = &["PARCEL NUMBER", "PARCEL ID", "PARCEL"];
const LEGAL_LABELS: &[&str] = &["LEGAL DESCRIPTION", "LEGAL"];
const PROPERTY_LABELS: &[&str] = &["PROPERTY DESCRIPTION", "PROPERTY ADDRESS", "PROPERTY"];

/// 详情页的标签 → 已压平的值
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetailFields {
    values: HashMap<String, String>,
}

impl DetailFields {
    /// 同一标签出现多次时合并
    pub fn insert(&mut self, label: &str, raw_value: &str) {
        let lines: Vec<&str> = raw_value.lines().collect();
        let value = flatten(&lines);
        if value.is_empty() {
            return;
        }
        self.values
            .entry(normalize_label(label))
            .and_modify(|existing| *existing = flatten(&[existing.as_str(), value.as_str()]))
            .or_insert(value);
    }

    /// 按标签回退链取第一个非空值
    pub fn first_of(&self, labels: &[&str]) -> Option<&str> {
        labels
            .iter()
            .find_map(|label| self.values.get(*label))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 填入记录：单元格已读到的字段（文档号、账簿、页、日期、类型）优先保留
    pub fn apply(&self, record: &mut Record) {
        let set = |field: &mut String, labels: &[&str]| {
            if let Some(value) = self.first_of(labels) {
                *field = value.to_string();
            }
        };
        let fill = |field: &mut String, labels: &[&str]| {
            if field.is_empty() {
                if let Some(value) = self.first_of(labels) {
                    *field = value.to_string();
                }
            }
        };

        fill(&mut record.document_number, DOCUMENT_NUMBER_LABELS);
        fill(&mut record.book, BOOK_LABELS);
        fill(&mut record.page, PAGE_LABELS);
        fill(&mut record.recording_date, RECORDING_DATE_LABELS);
        set(&mut record.book_type, BOOK_TYPE_LABELS);
        fill(&mut record.document_type, DOCUMENT_TYPE_LABELS);
        set(&mut record.amount, AMOUNT_LABELS);
        set(&mut record.grantor, GRANTOR_LABELS);
        set(&mut record.grantee, GRANTEE_LABELS);
        set(&mut record.reference, REFERENCE_LABELS);
        set(&mut record.remarks, REMARKS_LABELS);
        set(&mut record.parcel_number, PARCEL_LABELS);
        set(&mut record.legal_description, LEGAL_LABELS);
        set(&mut record.property_description, PROPERTY_LABELS);
    }
}

/// 标签规范化：去空白、去结尾冒号、大写
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(':')
        .trim()
        .to_uppercase()
}

/// 单行的提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutput {
    pub record: Record,
    pub images_saved: usize,
}

/// 单行提取流程
///
/// - 不持有会话，只借用主页面和会话
/// - 新打开的页面（详情标签、查看器）在返回前一定关闭
pub struct RowExtractor {
    kind: ModeKind,
    export_mode: ExportMode,
    timings: Timings,
    viewer: ViewerCapture,
}

impl RowExtractor {
    pub fn new(
        kind: ModeKind,
        export_mode: ExportMode,
        timings: Timings,
        composer: Arc<dyn ImageComposer>,
        store: Arc<dyn ImageStore>,
        run_date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            export_mode,
            viewer: ViewerCapture::new(timings.clone(), composer, store, run_date),
            timings,
        }
    }

    pub async fn extract(
        &self,
        session: &dyn PortalSession,
        page: &dyn PortalPage,
        result_grid: &ResultGrid,
        ctx: &RowCtx,
    ) -> Result<RowOutput, RowError> {
        // ========== 1. 单元格 ==========
        let mut record = self.read_cells(page, result_grid, ctx).await?;

        // ========== 2. 图片 ==========
        let mut images_saved = 0;
        let capture = result_grid.images_available() && self.export_mode.captures_images();
        if let Some(image_col) = result_grid.image.filter(|_| capture) {
            let document_id = record.document_number.clone();
            let images = self
                .viewer
                .capture_row(session, page, ctx, image_col, &document_id)
                .await?;
            images_saved = images.saved;
            if self.export_mode.records_links() {
                for link in &images.links {
                    record.push_image_link(link);
                }
            }
        }

        // ========== 3. 详情页 ==========
        let navigation = self.kind.detail_navigation();
        if navigation != DetailNavigation::None {
            let link = page.locate(&Scope::Main, grid::detail_link(ctx.table, ctx.row));
            if link.exists().await? {
                let fields = match navigation {
                    DetailNavigation::SamePage => self.read_detail_same_page(page, ctx).await?,
                    _ => self.read_detail_new_tab(session, page, ctx).await?,
                };
                debug!("{} 详情页读取到 {} 个字段", ctx, fields.len());
                fields.apply(&mut record);
            } else {
                debug!("{} 没有详情链接", ctx);
            }
        }

        info!(
            "{} ✓ 文档号: {}, 日期: {}, 类型: {}",
            ctx, record.document_number, record.recording_date, record.document_type
        );
        Ok(RowOutput {
            record,
            images_saved,
        })
    }

    /// 行失败后确保主页面回到结果表格
    pub async fn restore_grid(&self, page: &dyn PortalPage, ctx: &RowCtx) -> SessionResult<()> {
        let rows = page.locate(&Scope::Main, grid::rows(ctx.table));
        if rows.exists().await? {
            return Ok(());
        }
        debug!("{} 主页面不在结果表格，后退", ctx);
        page.go_back().await?;
        rows.wait(self.timings.element_wait).await
    }

    async fn read_cells(&self, page: &dyn PortalPage, result_grid: &ResultGrid, ctx: &RowCtx) -> SessionResult<Record> {
        let mut record = Record::default();

        let row = page.locate(&Scope::Main, grid::row(ctx.table, ctx.row));
        if !row.exists().await? {
            return Err(SessionError::not_found(grid::row(ctx.table, ctx.row)));
        }

        if let Some(col) = result_grid.file_date {
            record.recording_date = cell_text(page, ctx, col).await?;
        }
        if let Some(col) = result_grid.file_number {
            record.document_number = cell_text(page, ctx, col).await?;
        }

        match self.kind.direct_cells() {
            DirectCells::None => {}
            DirectCells::TypeBookPage => {
                record.document_type = optional_cell(page, ctx, result_grid.document_type).await?;
                record.book = optional_cell(page, ctx, result_grid.book).await?;
                record.page = optional_cell(page, ctx, result_grid.page).await?;
            }
            // 文件号已经从 Instrument 列读出
            DirectCells::TypeInstrument => {
                record.document_type = optional_cell(page, ctx, result_grid.document_type).await?;
            }
        }
        Ok(record)
    }

    /// 同页跳转：点击 → 读取 → 后退（无论读取是否成功）
    async fn read_detail_same_page(&self, page: &dyn PortalPage, ctx: &RowCtx) -> Result<DetailFields, RowError> {
        page.locate(&Scope::Main, grid::detail_link(ctx.table, ctx.row))
            .click()
            .await?;

        let fields = self.read_detail(page).await;

        page.go_back().await?;
        page.locate(&Scope::Main, grid::rows(ctx.table))
            .wait(self.timings.element_wait)
            .await?;

        Ok(fields?)
    }

    /// 新标签：打开 → 读取 → 关闭（无论读取是否成功）
    async fn read_detail_new_tab(
        &self,
        session: &dyn PortalSession,
        page: &dyn PortalPage,
        ctx: &RowCtx,
    ) -> Result<DetailFields, RowError> {
        let selector = grid::detail_link(ctx.table, ctx.row);
        let href = page
            .locate(&Scope::Main, &selector)
            .attribute("href")
            .await?
            .ok_or_else(|| SessionError::not_found(format!("{}[href]", selector)))?;
        let base = page.current_url().await?;
        let url = resolve_link(&base, &href).ok_or_else(|| SessionError::Navigation {
            url: href.clone(),
            message: "无法解析详情链接".to_string(),
        })?;

        let tab = session.new_page().await?;
        let fields = match tab.goto(&url).await {
            Ok(()) => self.read_detail(&*tab).await,
            Err(e) => Err(e),
        };
        if let Err(e) = tab.close().await {
            debug!("{} 关闭详情标签失败: {}", ctx, e);
        }
        Ok(fields?)
    }

    async fn read_detail(&self, page: &dyn PortalPage) -> SessionResult<DetailFields> {
        let main = Scope::Main;
        page.locate(&main, detail::CONTAINER)
            .wait(self.timings.element_wait)
            .await?;

        let count = page.locate(&main, detail::ROWS).count().await?;
        let mut fields = DetailFields::default();
        for row in 1..=count {
            let label = page.locate(&main, detail::label(row)).text_if_exists().await?;
            let value = page.locate(&main, detail::value(row)).text_if_exists().await?;
            if let (Some(label), Some(value)) = (label, value) {
                fields.insert(&label, &value);
            }
        }
        Ok(fields)
    }
}

async fn cell_text(page: &dyn PortalPage, ctx: &RowCtx, col: usize) -> SessionResult<String> {
    let text = page
        .locate(&Scope::Main, grid::cell(ctx.table, ctx.row, col))
        .text_if_exists()
        .await?;
    Ok(text.map(|t| t.trim().to_string()).unwrap_or_default())
}

async fn optional_cell(page: &dyn PortalPage, ctx: &RowCtx, col: Option<usize>) -> SessionResult<String> {
    match col {
        Some(col) => cell_text(page, ctx, col).await,
        None => Ok(String::new()),
    }
}
