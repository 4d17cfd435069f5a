//! 交互式会话能力 - 基础设施层
//!
//! 远程门户的状态（当前页面、选中的标签、打开的查看器 frame）是一个共享的
//! 可变资源。这里只描述"能对它做什么"，不关心具体的业务流程：
//!
//! - `SessionLauncher` 负责打开一个全新的会话
//! - `PortalSession` 持有浏览器，负责创建 / 回收页面
//! - `PortalPage` 是单个页面（或标签）上的 DOM 原语
//!
//! 所有操作都可能失败或超时，调用方决定是否在步骤级或行级恢复。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{SessionError, SessionResult};

/// 操作作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// 主文档
    #[default]
    Main,
    /// 由 `window.frames` 索引路径定位的同源子 frame
    Frame(Vec<usize>),
    /// 跨域子 frame，按浏览器的 frame 标识在它自己的执行上下文中运行
    Remote(String),
}

impl Scope {
    pub fn frame(path: impl Into<Vec<usize>>) -> Self {
        Scope::Frame(path.into())
    }

    /// 以 JSON 数组形式表示的 frame 路径；主文档和跨域 frame 为空数组
    pub fn path(&self) -> &[usize] {
        match self {
            Scope::Main | Scope::Remote(_) => &[],
            Scope::Frame(path) => path,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Main => write!(f, "main"),
            Scope::Frame(path) => {
                let parts: Vec<String> = path.iter().map(|i| i.to_string()).collect();
                write!(f, "frame[{}]", parts.join("/"))
            }
            Scope::Remote(id) => write!(f, "remote[{}]", id),
        }
    }
}

/// 作用域 + 选择器 + 第几个匹配元素
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub scope: Scope,
    pub selector: String,
    pub nth: usize,
}

impl Target {
    pub fn new(scope: &Scope, selector: impl Into<String>) -> Self {
        Self {
            scope: scope.clone(),
            selector: selector.into(),
            nth: 0,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} #{}", self.scope, self.selector, self.nth)
    }
}

/// 单个页面上的 DOM 原语
#[async_trait]
pub trait PortalPage: Send + Sync {
    async fn goto(&self, url: &str) -> SessionResult<()>;

    async fn go_back(&self) -> SessionResult<()>;

    async fn current_url(&self) -> SessionResult<String>;

    /// 等待选择器出现在作用域中，超时返回 `SessionError::Timeout`
    async fn wait_for_selector(
        &self,
        scope: &Scope,
        selector: &str,
        timeout: Duration,
    ) -> SessionResult<()>;

    async fn count(&self, scope: &Scope, selector: &str) -> SessionResult<usize>;

    async fn text(&self, target: &Target) -> SessionResult<String>;

    async fn attribute(&self, target: &Target, name: &str) -> SessionResult<Option<String>>;

    async fn click(&self, target: &Target) -> SessionResult<()>;

    async fn double_click(&self, target: &Target) -> SessionResult<()>;

    async fn fill(&self, target: &Target, value: &str) -> SessionResult<()>;

    async fn select_options(&self, target: &Target, values: &[String]) -> SessionResult<()>;

    /// 截取元素图像（PNG）
    async fn screenshot(&self, target: &Target) -> SessionResult<Vec<u8>>;

    async fn evaluate(&self, scope: &Scope, script: &str) -> SessionResult<JsonValue>;

    /// 列出页面中所有可访问的 frame（不含主文档）
    async fn frames(&self) -> SessionResult<Vec<Scope>>;

    async fn close(self: Box<Self>) -> SessionResult<()>;
}

/// 一个浏览器会话
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// 打开一个新的页面（标签）
    async fn new_page(&self) -> SessionResult<Box<dyn PortalPage>>;

    /// 关闭除主页面以外残留的页面，返回关闭的数量
    async fn release_transient(&self) -> SessionResult<usize>;

    /// 当前所有页面的标识
    async fn page_ids(&self) -> SessionResult<Vec<String>>;

    /// 接管一个由页面脚本打开的页面（如 `window.open` 弹出的标签）
    async fn attach_page(&self, id: &str) -> SessionResult<Box<dyn PortalPage>>;

    async fn close(self: Box<Self>) -> SessionResult<()>;
}

/// 会话启动器，每次检索尝试都会启动一个全新的会话
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> SessionResult<Box<dyn PortalSession>>;
}

/// 某个作用域内按选择器定位的元素集合
pub struct Locator<'a> {
    page: &'a dyn PortalPage,
    target: Target,
}

impl<'p> dyn PortalPage + 'p {
    pub fn locate(&self, scope: &Scope, selector: impl Into<String>) -> Locator<'_> {
        Locator {
            page: self,
            target: Target::new(scope, selector),
        }
    }
}

impl<'a> Locator<'a> {
    pub fn nth(mut self, nth: usize) -> Self {
        self.target.nth = nth;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub async fn count(&self) -> SessionResult<usize> {
        self.page
            .count(&self.target.scope, &self.target.selector)
            .await
    }

    pub async fn exists(&self) -> SessionResult<bool> {
        Ok(self.count().await? > self.target.nth)
    }

    pub async fn wait(&self, timeout: Duration) -> SessionResult<()> {
        self.page
            .wait_for_selector(&self.target.scope, &self.target.selector, timeout)
            .await
    }

    pub async fn text(&self) -> SessionResult<String> {
        self.page.text(&self.target).await
    }

    /// 所有匹配元素的文本，按文档顺序
    pub async fn texts(&self) -> SessionResult<Vec<String>> {
        let count = self.count().await?;
        let mut texts = Vec::with_capacity(count);
        for nth in 0..count {
            let mut target = self.target.clone();
            target.nth = nth;
            texts.push(self.page.text(&target).await?);
        }
        Ok(texts)
    }

    pub async fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        self.page.attribute(&self.target, name).await
    }

    pub async fn click(&self) -> SessionResult<()> {
        self.page.click(&self.target).await
    }

    pub async fn double_click(&self) -> SessionResult<()> {
        self.page.double_click(&self.target).await
    }

    pub async fn fill(&self, value: &str) -> SessionResult<()> {
        self.page.fill(&self.target, value).await
    }

    pub async fn select_options(&self, values: &[String]) -> SessionResult<()> {
        self.page.select_options(&self.target, values).await
    }

    pub async fn screenshot(&self) -> SessionResult<Vec<u8>> {
        self.page.screenshot(&self.target).await
    }

    /// 存在则返回文本，否则 `None`
    pub async fn text_if_exists(&self) -> SessionResult<Option<String>> {
        match self.text().await {
            Ok(text) => Ok(Some(text)),
            Err(SessionError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
