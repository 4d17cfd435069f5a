//! 基于 chromiumoxide 的页面实现
//!
//! 所有 DOM 原语都通过 `JsExecutor` 以脚本形式执行，截图走 CDP 的裁剪截图。
//! 后退使用导航历史，跨域 frame 通过 CDP 的 frame 树发现。

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::{GetBoxModelParams, GetFrameOwnerParams};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, FrameId, GetNavigationHistoryParams, NavigateToHistoryEntryParams, Viewport,
};
use chromiumoxide::page::ScreenshotParams;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::infrastructure::js_executor::NOT_FOUND_MARKER;
use crate::infrastructure::{JsExecutor, PortalPage, Scope, Target};

/// 等待元素时的轮询间隔
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// 后退导航的最长等待时间
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Chrome 页面
pub struct ChromePage {
    executor: JsExecutor,
}

impl ChromePage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self {
            executor: JsExecutor::new(page),
        }
    }

    /// 在目标元素上执行一段脚本，`el` 为定位到的元素
    async fn on_element(&self, target: &Target, action: &str) -> SessionResult<JsonValue> {
        let body = element_script(target, action)?;
        self.executor.eval_in(&target.scope, &body).await
    }

    /// 等待后退完成：地址离开 `from`（或到达 `to`）且文档加载完毕
    ///
    /// 导航过程中旧的执行上下文会被销毁，期间的脚本错误视为尚未完成。
    async fn wait_for_history(&self, from: &str, to: &str) -> SessionResult<()> {
        let deadline = Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            let state: Option<(String, String)> = self
                .executor
                .eval_as(&Scope::Main, "return [location.href, document.readyState];")
                .await
                .ok();
            if let Some((href, ready)) = state {
                if (href == to || href != from) && ready == "complete" {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Navigation {
                    url: to.to_string(),
                    message: format!("后退超时 ({:?})", NAVIGATION_TIMEOUT),
                });
            }
            sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// 与主文档不同源的子 frame
    async fn remote_frames(&self) -> SessionResult<Vec<Scope>> {
        let page = self.executor.page();
        let main = page.mainframe().await?;
        let origin: String = self.executor.eval_as(&Scope::Main, "return location.origin;").await?;

        let mut remote = Vec::new();
        for frame in page.frames().await? {
            if main.as_ref() == Some(&frame) {
                continue;
            }
            let scope = Scope::Remote(frame.inner().clone());
            match self.executor.eval_as::<String>(&scope, "return location.origin;").await {
                Ok(frame_origin) if frame_origin != origin => remote.push(scope),
                Ok(_) => {}
                Err(e) => debug!("跳过 {}: {}", scope, e),
            }
        }
        Ok(remote)
    }

    /// 跨域 frame 的内容区在主视口中的左上角
    async fn frame_offset(&self, frame_id: &str) -> SessionResult<(f64, f64)> {
        let page = self.executor.page();
        let owner = page.execute(GetFrameOwnerParams::new(FrameId::new(frame_id))).await?;
        let model = page
            .execute(
                GetBoxModelParams::builder()
                    .backend_node_id(owner.result.backend_node_id)
                    .build(),
            )
            .await?;
        match model.result.model.content.inner().as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(SessionError::not_found(format!("frame {}", frame_id))),
        }
    }
}

/// 生成"定位第 nth 个元素后执行 action"的函数体
fn element_script(target: &Target, action: &str) -> SessionResult<String> {
    let selector = serde_json::to_string(&target.selector)?;
    Ok(format!(
        r#"
        const el = doc.querySelectorAll({selector})[{nth}];
        if (!el) {{ throw new Error("{marker}" + {selector}); }}
        {action}
        "#,
        selector = selector,
        nth = target.nth,
        marker = NOT_FOUND_MARKER,
        action = action
    ))
}

#[derive(Debug, Deserialize)]
struct ClipRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[async_trait]
impl PortalPage for ChromePage {
    async fn goto(&self, url: &str) -> SessionResult<()> {
        debug!("导航到: {}", url);
        self.executor
            .page()
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn go_back(&self) -> SessionResult<()> {
        let page = self.executor.page();
        let history = page.execute(GetNavigationHistoryParams::default()).await?.result;
        let previous = usize::try_from(history.current_index)
            .ok()
            .and_then(|current| current.checked_sub(1))
            .and_then(|idx| history.entries.get(idx))
            .ok_or_else(|| SessionError::Navigation {
                url: "history.back".to_string(),
                message: "没有可后退的历史记录".to_string(),
            })?;

        let from = self.current_url().await?;
        debug!("后退到: {}", previous.url);
        page.execute(NavigateToHistoryEntryParams::new(previous.id)).await?;
        self.wait_for_history(&from, &previous.url).await
    }

    async fn current_url(&self) -> SessionResult<String> {
        let url = self.executor.page().url().await?;
        Ok(url.unwrap_or_default())
    }

    async fn wait_for_selector(
        &self,
        scope: &Scope,
        selector: &str,
        timeout: Duration,
    ) -> SessionResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            // frame 还没挂载时 count 会报 NotFound，继续等待
            match self.count(scope, selector).await {
                Ok(n) if n > 0 => return Ok(()),
                Ok(_) | Err(SessionError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(SessionError::timeout(selector, timeout));
            }
            sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn count(&self, scope: &Scope, selector: &str) -> SessionResult<usize> {
        let body = format!(
            "return doc.querySelectorAll({}).length;",
            serde_json::to_string(selector)?
        );
        self.executor.eval_as(scope, &body).await
    }

    async fn text(&self, target: &Target) -> SessionResult<String> {
        let value = self
            .on_element(target, r#"return (el.innerText ?? el.textContent ?? "").trim();"#)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, target: &Target, name: &str) -> SessionResult<Option<String>> {
        let action = format!("return el.getAttribute({});", serde_json::to_string(name)?);
        let value = self.on_element(target, &action).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, target: &Target) -> SessionResult<()> {
        self.on_element(
            target,
            r#"el.scrollIntoView({ block: "center" }); el.click(); return null;"#,
        )
        .await?;
        Ok(())
    }

    async fn double_click(&self, target: &Target) -> SessionResult<()> {
        self.on_element(
            target,
            r#"
            el.scrollIntoView({ block: "center" });
            const opts = { bubbles: true, cancelable: true, view: win };
            el.dispatchEvent(new MouseEvent("mousedown", opts));
            el.dispatchEvent(new MouseEvent("mouseup", opts));
            el.dispatchEvent(new MouseEvent("click", opts));
            el.dispatchEvent(new MouseEvent("dblclick", opts));
            return null;
            "#,
        )
        .await?;
        Ok(())
    }

    async fn fill(&self, target: &Target, value: &str) -> SessionResult<()> {
        let action = format!(
            r#"
            el.focus();
            el.value = {};
            el.dispatchEvent(new Event("input", {{ bubbles: true }}));
            el.dispatchEvent(new Event("change", {{ bubbles: true }}));
            return null;
            "#,
            serde_json::to_string(value)?
        );
        self.on_element(target, &action).await?;
        Ok(())
    }

    async fn select_options(&self, target: &Target, values: &[String]) -> SessionResult<()> {
        let action = format!(
            r#"
            const wanted = new Set({});
            let selected = 0;
            for (const o of el.options) {{
                o.selected = wanted.has(o.value) || wanted.has(o.text.trim());
                if (o.selected) {{ selected += 1; }}
            }}
            el.dispatchEvent(new Event("change", {{ bubbles: true }}));
            return selected;
            "#,
            serde_json::to_string(values)?
        );
        let selected = self.on_element(target, &action).await?;
        if selected.as_u64().unwrap_or(0) == 0 && !values.is_empty() {
            return Err(SessionError::not_found(format!(
                "{} option {:?}",
                target.selector, values
            )));
        }
        Ok(())
    }

    async fn screenshot(&self, target: &Target) -> SessionResult<Vec<u8>> {
        // 同源祖先 frame 的偏移在脚本里累加；跨域 frame 的偏移和主文档滚动另外加上
        let rect = self
            .on_element(
                target,
                r#"
                el.scrollIntoView({ block: "center" });
                const r = el.getBoundingClientRect();
                let x = r.left, y = r.top, w = win;
                while (w !== window.top && w.frameElement) {
                    const fr = w.frameElement.getBoundingClientRect();
                    x += fr.left; y += fr.top;
                    w = w.parent;
                }
                return { x: x, y: y, width: r.width, height: r.height };
                "#,
            )
            .await?;
        let mut rect: ClipRect = serde_json::from_value(rect)?;
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(SessionError::not_found(format!("{} (不可见)", target.selector)));
        }

        if let Scope::Remote(frame_id) = &target.scope {
            let (dx, dy) = self.frame_offset(frame_id).await?;
            rect.x += dx;
            rect.y += dy;
        }
        let (scroll_x, scroll_y): (f64, f64) = self
            .executor
            .eval_as(&Scope::Main, "return [window.scrollX, window.scrollY];")
            .await?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport {
                x: rect.x + scroll_x,
                y: rect.y + scroll_y,
                width: rect.width,
                height: rect.height,
                scale: 1.0,
            })
            .build();
        let bytes = self.executor.page().screenshot(params).await?;
        Ok(bytes)
    }

    async fn evaluate(&self, scope: &Scope, script: &str) -> SessionResult<JsonValue> {
        self.executor.eval_in(scope, script).await
    }

    async fn frames(&self) -> SessionResult<Vec<Scope>> {
        let paths: Vec<Vec<usize>> = self
            .executor
            .eval_as(
                &Scope::Main,
                r#"
                const out = [];
                const walk = (w, path) => {
                    for (let i = 0; i < w.frames.length; i++) {
                        const p = path.concat([i]);
                        try {
                            void w.frames[i].document.body;
                            out.push(p);
                            walk(w.frames[i], p);
                        } catch (e) {
                            // 跨域 frame 无法访问
                        }
                    }
                };
                walk(win, []);
                return out;
                "#,
            )
            .await?;
        let mut scopes: Vec<Scope> = paths.into_iter().map(Scope::Frame).collect();
        scopes.extend(self.remote_frames().await?);
        Ok(scopes)
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        self.executor.into_page().close().await?;
        Ok(())
    }
}
