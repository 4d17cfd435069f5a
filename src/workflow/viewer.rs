//! 文档查看器翻页协议 - 流程层
//!
//! 一行的图片入口会在新页面中打开查看器。查看器可能嵌在任意子 frame 中，
//! 并且有两种形态：
//!
//! - 直接查看器：截取当前页，点击"下一页"直到按钮被禁用
//! - 文件夹列表：逐个打开文件夹，每个文件夹按直接查看器的方式截取
//!
//! 每个图片集截取完成后立即合成并保存；单个文件夹的失败不影响其他文件夹。

use std::sync::Arc;

use chrono::NaiveDate;
use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Timings;
use crate::error::{RowError, SessionError};
use crate::infrastructure::{PortalPage, PortalSession, Scope};
use crate::models::image_set::DocumentImageSet;
use crate::selectors::{grid, viewer};
use crate::services::image_store::{ImageComposer, ImageStore};
use crate::utils::retry::poll_until;
use crate::workflow::row_ctx::RowCtx;

/// 单个图片集的页数上限，防止翻页按钮失效时死循环
pub const MAX_PAGES: usize = 500;

/// 查看器形态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerShape {
    Direct(Scope),
    Folders(Scope),
}

/// 一行的图片处理结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    /// 已保存产物的访问链接，按文件夹顺序
    pub links: Vec<String>,
    pub saved: usize,
}

/// 查看器截取
pub struct ViewerCapture {
    timings: Timings,
    composer: Arc<dyn ImageComposer>,
    store: Arc<dyn ImageStore>,
    run_date: NaiveDate,
}

impl ViewerCapture {
    pub fn new(
        timings: Timings,
        composer: Arc<dyn ImageComposer>,
        store: Arc<dyn ImageStore>,
        run_date: NaiveDate,
    ) -> Self {
        Self {
            timings,
            composer,
            store,
            run_date,
        }
    }

    /// 处理一行的图片；该行没有图片入口时返回空结果
    ///
    /// 入口没有可解析的地址时改为点击它，并接管点击后新出现的页面；
    /// 点击也没有打开任何页面时只放弃图片，记录照常输出。
    pub async fn capture_row(
        &self,
        session: &dyn PortalSession,
        page: &dyn PortalPage,
        ctx: &RowCtx,
        image_col: usize,
        document_id: &str,
    ) -> Result<ImageOutcome, RowError> {
        let trigger_selector = grid::image_trigger(ctx.table, ctx.row, image_col);
        if !page.locate(&Scope::Main, &trigger_selector).exists().await? {
            debug!("{} 没有图片入口", ctx);
            return Ok(ImageOutcome::default());
        }

        let viewer_page = match viewer_url(page, &trigger_selector).await? {
            Some(url) => {
                info!("{} 🖼️ 打开文档查看器: {}", ctx, url);
                let viewer_page = session.new_page().await?;
                if let Err(e) = viewer_page.goto(&url).await {
                    close_viewer(viewer_page, ctx).await;
                    return Err(e.into());
                }
                viewer_page
            }
            None => match self.open_by_click(session, page, &trigger_selector, ctx).await? {
                Some(viewer_page) => viewer_page,
                None => {
                    warn!("{} ⚠️ 图片入口没有打开查看器，跳过图片", ctx);
                    return Ok(ImageOutcome::default());
                }
            },
        };

        let result = self.capture_in(&*viewer_page, ctx, document_id).await;
        close_viewer(viewer_page, ctx).await;
        result
    }

    /// 点击图片入口并等待新页面出现
    async fn open_by_click(
        &self,
        session: &dyn PortalSession,
        page: &dyn PortalPage,
        trigger_selector: &str,
        ctx: &RowCtx,
    ) -> Result<Option<Box<dyn PortalPage>>, RowError> {
        let before = session.page_ids().await?;
        let grid_url = page.current_url().await?;
        info!("{} 🖼️ 图片入口没有链接，点击打开查看器", ctx);
        page.locate(&Scope::Main, trigger_selector).click().await?;

        let before = &before;
        let opened = poll_until(self.timings.viewer_poll, |_| async move {
            let ids = session.page_ids().await.ok()?;
            ids.into_iter().find(|id| !before.contains(id))
        })
        .await;

        match opened {
            Some(id) => {
                debug!("{} 查看器在新页面 {} 中打开", ctx, id);
                Ok(Some(session.attach_page(&id).await?))
            }
            None => {
                // 点击可能把主页面带离了结果表格
                if page.current_url().await? != grid_url {
                    page.go_back().await?;
                }
                Ok(None)
            }
        }
    }

    async fn capture_in(&self, page: &dyn PortalPage, ctx: &RowCtx, document_id: &str) -> Result<ImageOutcome, RowError> {
        let mut outcome = ImageOutcome::default();
        match self.locate_viewer(page, true).await? {
            ViewerShape::Direct(scope) => {
                debug!("{} 直接查看器位于 {}", ctx, scope);
                let set = self.capture_pages(page, &scope, DocumentImageSet::new(ctx.row, None)).await?;
                let link = self.persist(&set, document_id, ctx).await?;
                outcome.links.push(link);
                outcome.saved += 1;
            }
            ViewerShape::Folders(scope) => {
                let count = page.locate(&scope, viewer::FOLDER_ROWS).count().await?;
                info!("{} 📁 查看器包含 {} 个文件夹", ctx, count);
                for idx in 0..count {
                    match self.capture_folder(page, &scope, idx, ctx, document_id).await {
                        Ok(link) => {
                            outcome.links.push(link);
                            outcome.saved += 1;
                        }
                        Err(e) => warn!("{} ⚠️ 文件夹 {} 图片处理失败: {}", ctx, idx + 1, e),
                    }
                }
            }
        }
        Ok(outcome)
    }

    async fn capture_folder(
        &self,
        page: &dyn PortalPage,
        list_scope: &Scope,
        idx: usize,
        ctx: &RowCtx,
        document_id: &str,
    ) -> Result<String, RowError> {
        let folder = page.locate(list_scope, viewer::FOLDER_ROWS).nth(idx);
        if let Err(e) = folder.double_click().await {
            debug!("{} 双击文件夹 {} 失败，改为连续单击: {}", ctx, idx + 1, e);
            folder.click().await?;
            // 第一次单击可能已经打开了文件夹
            if folder.exists().await? {
                folder.click().await?;
            }
        }

        let captured = match self.locate_viewer(page, false).await {
            Ok(ViewerShape::Direct(scope)) => {
                let set = DocumentImageSet::new(ctx.row, Some(idx + 1));
                match self.capture_pages(page, &scope, set).await {
                    Ok(set) => self.persist(&set, document_id, ctx).await,
                    Err(e) => Err(e),
                }
            }
            Ok(ViewerShape::Folders(_)) => Err(RowError::ViewerNotFound {
                attempts: self.timings.viewer_poll.attempts,
            }),
            Err(e) => Err(e),
        };

        self.back_to_folders(page, list_scope, ctx).await;
        captured
    }

    /// 返回文件夹列表（尽力而为）
    async fn back_to_folders(&self, page: &dyn PortalPage, list_scope: &Scope, ctx: &RowCtx) {
        let mut scopes = vec![list_scope.clone()];
        scopes.extend(page.frames().await.unwrap_or_default());
        scopes.dedup();

        for scope in &scopes {
            let back = page.locate(scope, viewer::BACK_TO_FOLDERS);
            if back.exists().await.unwrap_or(false) {
                if let Err(e) = back.click().await {
                    debug!("{} 返回文件夹列表失败: {}", ctx, e);
                }
                break;
            }
        }

        if let Err(e) = page
            .locate(list_scope, viewer::FOLDER_ROWS)
            .wait(self.timings.element_wait)
            .await
        {
            debug!("{} 等待文件夹列表失败: {}", ctx, e);
        }
    }

    /// 在所有 frame 中轮询查找查看器
    pub async fn locate_viewer(&self, page: &dyn PortalPage, accept_folders: bool) -> Result<ViewerShape, RowError> {
        let policy = self.timings.viewer_poll;
        let found = poll_until(policy, |attempt| async move {
            let mut scopes = vec![Scope::Main];
            scopes.extend(page.frames().await.unwrap_or_default());

            for scope in scopes {
                if page.count(&scope, viewer::PAGE_IMAGE).await.unwrap_or(0) > 0 {
                    return Some(ViewerShape::Direct(scope));
                }
                if accept_folders && page.count(&scope, viewer::FOLDER_ROWS).await.unwrap_or(0) > 0 {
                    return Some(ViewerShape::Folders(scope));
                }
            }
            debug!("第 {} 次查找查看器未命中", attempt);
            None
        })
        .await;

        found.ok_or(RowError::ViewerNotFound {
            attempts: policy.attempts,
        })
    }

    /// 截取当前页，然后翻页直到"下一页"被禁用
    async fn capture_pages(
        &self,
        page: &dyn PortalPage,
        scope: &Scope,
        mut set: DocumentImageSet,
    ) -> Result<DocumentImageSet, RowError> {
        loop {
            let shot = self.wait_page_image(page, scope).await?;
            set.push(shot);

            if set.len() >= MAX_PAGES {
                warn!("页数达到上限 {}，停止翻页", MAX_PAGES);
                break;
            }
            if let Some((current, total)) = page_indicator(page, scope).await {
                if current >= total {
                    break;
                }
            }
            if is_last_page(page, scope).await? {
                break;
            }

            page.locate(scope, viewer::NEXT_PAGE).click().await?;
            sleep(self.timings.page_advance_delay).await;
        }
        debug!("已截取 {} 页", set.len());
        Ok(set)
    }

    /// 等待页面图像就绪并截图
    async fn wait_page_image(&self, page: &dyn PortalPage, scope: &Scope) -> Result<Vec<u8>, RowError> {
        let policy = self.timings.page_ready_poll;
        let shot = poll_until(policy, |_| async move {
            match page.locate(scope, viewer::PAGE_IMAGE).screenshot().await {
                Ok(bytes) if !bytes.is_empty() => Some(bytes),
                _ => None,
            }
        })
        .await;

        shot.ok_or_else(|| SessionError::timeout(viewer::PAGE_IMAGE, policy.total_wait()).into())
    }

    /// 合成并保存一个图片集，返回访问链接
    async fn persist(&self, set: &DocumentImageSet, document_id: &str, ctx: &RowCtx) -> Result<String, RowError> {
        let key = set.artifact_key(self.run_date, document_id);
        let bytes = self.composer.compose(set).map_err(|e| RowError::ImageSave {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.store.save(&key, &bytes).await.map_err(|e| RowError::ImageSave {
            key: key.clone(),
            message: e.to_string(),
        })?;

        info!("{} 💾 已保存 {} 页 → {}", ctx, set.len(), key);
        Ok(self.store.url_for(&key))
    }
}

/// "下一页"不存在或已禁用即为最后一页
async fn is_last_page(page: &dyn PortalPage, scope: &Scope) -> Result<bool, SessionError> {
    if page.locate(scope, viewer::NEXT_DISABLED).exists().await? {
        return Ok(true);
    }
    Ok(!page.locate(scope, viewer::NEXT_PAGE).exists().await?)
}

/// 读取页码提示，如 "Page 2 of 5"
async fn page_indicator(page: &dyn PortalPage, scope: &Scope) -> Option<(usize, usize)> {
    let text = page
        .locate(scope, viewer::PAGE_INDICATOR)
        .text_if_exists()
        .await
        .ok()
        .flatten()?;
    parse_page_indicator(&text)
}

pub fn parse_page_indicator(text: &str) -> Option<(usize, usize)> {
    let re = Regex::new(r"(?i)(\d+)\s*(?:of|/)\s*(\d+)").ok()?;
    let caps = re.captures(text)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

/// 解析图片入口指向的查看器地址：优先 href，其次 onclick 中的地址
///
/// 两者都没有可用地址时返回 `None`，由调用方改为点击入口。
async fn viewer_url(page: &dyn PortalPage, trigger_selector: &str) -> Result<Option<String>, RowError> {
    let trigger = page.locate(&Scope::Main, trigger_selector);

    let href = trigger
        .attribute("href")
        .await?
        .filter(|h| is_navigable(h));
    let link = match href {
        Some(href) => href,
        None => {
            let onclick = trigger.attribute("onclick").await?.unwrap_or_default();
            match extract_script_url(&onclick) {
                Some(link) => link,
                None => return Ok(None),
            }
        }
    };

    let base = page.current_url().await?;
    resolve_link(&base, &link)
        .map(Some)
        .ok_or(RowError::ViewerLinkMissing)
}

async fn close_viewer(viewer_page: Box<dyn PortalPage>, ctx: &RowCtx) {
    if let Err(e) = viewer_page.close().await {
        warn!("{} 关闭查看器页面失败: {}", ctx, e);
    }
}

fn is_navigable(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && href != "#" && !href.to_ascii_lowercase().starts_with("javascript:")
}

/// 从 `window.open('...')` 之类的脚本中取出地址
pub fn extract_script_url(script: &str) -> Option<String> {
    let re = Regex::new(r#"(?:window\.open|location(?:\.href)?\s*=|openViewer)\s*\(?\s*['"]([^'"]+)['"]"#).ok()?;
    re.captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 相对地址基于当前页面解析
pub fn resolve_link(base: &str, link: &str) -> Option<String> {
    match Url::parse(base).and_then(|b| b.join(link)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(link).ok().map(|u| u.to_string()),
    }
}
