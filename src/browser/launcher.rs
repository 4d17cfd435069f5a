use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::chrome_page::ChromePage;
use crate::config::Config;
use crate::error::{SessionError, SessionResult};
use crate::infrastructure::{PortalPage, PortalSession, SessionLauncher};

/// 浏览器来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserMode {
    /// 启动一个新的无头浏览器
    Headless { executable: Option<PathBuf> },
    /// 连接到已开启调试端口的浏览器
    Connect { port: u16 },
}

/// Chrome 会话启动器
pub struct ChromeLauncher {
    mode: BrowserMode,
}

impl ChromeLauncher {
    pub fn new(mode: BrowserMode) -> Self {
        Self { mode }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.browser_mode.clone())
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> SessionResult<Box<dyn PortalSession>> {
        let session = match &self.mode {
            BrowserMode::Headless { executable } => launch_headless_browser(executable.as_ref()).await?,
            BrowserMode::Connect { port } => connect_to_browser(*port).await?,
        };
        Ok(Box::new(session))
    }
}

/// 一个 Chrome 浏览器会话
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// 连接到外部浏览器时不关闭浏览器本身
    owned: bool,
    primary: Mutex<Option<TargetId>>,
}

#[async_trait]
impl PortalSession for ChromeSession {
    async fn new_page(&self) -> SessionResult<Box<dyn PortalPage>> {
        let page = self.browser.new_page("about:blank").await.map_err(|e| {
            error!("创建新页面失败: {}", e);
            SessionError::Browser(format!("创建新页面失败: {}", e))
        })?;

        if let Ok(mut primary) = self.primary.lock() {
            if primary.is_none() {
                *primary = Some(page.target_id().clone());
            }
        }

        Ok(Box::new(ChromePage::new(page)))
    }

    async fn release_transient(&self) -> SessionResult<usize> {
        let primary = self.primary.lock().ok().and_then(|p| p.clone());
        let pages = self.browser.pages().await?;
        let mut closed = 0;
        for page in pages {
            if Some(page.target_id()) == primary.as_ref() {
                continue;
            }
            match page.close().await {
                Ok(()) => closed += 1,
                Err(e) => warn!("关闭残留页面失败: {}", e),
            }
        }
        debug!("已释放 {} 个残留页面", closed);
        Ok(closed)
    }

    async fn page_ids(&self) -> SessionResult<Vec<String>> {
        let pages = self.browser.pages().await?;
        Ok(pages.iter().map(|p| p.target_id().inner().clone()).collect())
    }

    async fn attach_page(&self, id: &str) -> SessionResult<Box<dyn PortalPage>> {
        let pages = self.browser.pages().await?;
        let page = pages
            .into_iter()
            .find(|p| p.target_id().inner() == id)
            .ok_or_else(|| SessionError::Browser(format!("页面 {} 已不存在", id)))?;
        debug!("接管页面 {}", id);
        Ok(Box::new(ChromePage::new(page)))
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        let ChromeSession {
            mut browser,
            handler,
            owned,
            ..
        } = *self;

        if owned {
            browser.close().await?;
            if let Err(e) = browser.wait().await {
                warn!("等待浏览器进程退出失败: {}", e);
            }
        }
        handler.abort();
        info!("浏览器会话已关闭");
        Ok(())
    }
}

/// 在后台处理浏览器事件
fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

/// 启动无头浏览器
pub async fn launch_headless_browser(executable: Option<&PathBuf>) -> SessionResult<ChromeSession> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--remote-debugging-port=0",
        // 跨域 frame 留在同一渲染进程中，frame 路径才能覆盖到查看器
        "--disable-features=IsolateOrigins,site-per-process",
    ]);
    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }
    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        SessionError::Browser(format!("配置无头浏览器失败: {}", e))
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        SessionError::Browser(format!("启动无头浏览器失败: {}", e))
    })?;
    let handler = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;
    debug!("无头浏览器启动成功");

    Ok(ChromeSession {
        browser,
        handler,
        owned: true,
        primary: Mutex::new(None),
    })
}

/// 连接到已开启调试端口的浏览器
pub async fn connect_to_browser(port: u16) -> SessionResult<ChromeSession> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        SessionError::Browser(format!("无法连接到浏览器 (端口: {}): {}", port, e))
    })?;
    let handler = spawn_handler(handler);

    sleep(tokio::time::Duration::from_millis(300)).await;
    debug!("浏览器连接成功");

    Ok(ChromeSession {
        browser,
        handler,
        owned: false,
        primary: Mutex::new(None),
    })
}
