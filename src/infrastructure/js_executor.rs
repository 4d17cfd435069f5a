//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"在某个作用域里执行 JS"的能力

use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{SessionError, SessionResult};
use crate::infrastructure::session::Scope;

/// 脚本中抛出此前缀表示"元素不存在"
pub const NOT_FOUND_MARKER: &str = "__not_found__:";

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力，并可以定位到任意子 frame（同源走 `window.frames`，跨域走 frame 自己的执行上下文）
/// - 不认识 Record / SearchCriteria
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于导航、截图等非脚本操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 取回 page 的所有权（用于关闭）
    pub fn into_page(self) -> Page {
        self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> SessionResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await.map_err(map_cdp_error)?;
        // undefined 没有值，统一视为 null
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    /// 在指定作用域中执行函数体
    ///
    /// 函数体中可以使用 `doc`（作用域的 document）和 `win`（作用域的 window），
    /// 并且必须用 `return` 返回结果。
    pub async fn eval_in(&self, scope: &Scope, body: &str) -> SessionResult<JsonValue> {
        if let Scope::Remote(frame_id) = scope {
            return self.eval_in_frame(frame_id, body).await;
        }

        let path = serde_json::to_string(scope.path())?;
        let js_code = format!(
            r#"
            (async () => {{
                let win = window;
                for (const i of {path}) {{
                    win = win.frames[i];
                    if (!win) {{ throw new Error("{marker}frame"); }}
                }}
                const doc = win.document;
                {body}
            }})()
            "#,
            path = path,
            marker = NOT_FOUND_MARKER,
            body = body
        );
        self.eval(js_code).await
    }

    /// 在跨域 frame 自己的执行上下文中执行函数体
    async fn eval_in_frame(&self, frame_id: &str, body: &str) -> SessionResult<JsonValue> {
        let context = self
            .page
            .frame_execution_context(FrameId::new(frame_id))
            .await
            .map_err(map_cdp_error)?
            .ok_or_else(|| SessionError::not_found(format!("frame {}", frame_id)))?;

        let js_code = format!(
            r#"
            (async () => {{
                const win = window;
                const doc = document;
                {body}
            }})()
            "#,
            body = body
        );
        let params = EvaluateParams::builder()
            .expression(js_code)
            .context_id(context)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(SessionError::Script)?;

        let result = self.page.evaluate_expression(params).await.map_err(map_cdp_error)?;
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    /// 在指定作用域中执行函数体并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, scope: &Scope, body: &str) -> SessionResult<T> {
        let json_value = self.eval_in(scope, body).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }
}

/// 把脚本异常翻译成会话错误，识别"元素不存在"
fn map_cdp_error(err: chromiumoxide::error::CdpError) -> SessionError {
    let message = err.to_string();
    match message.find(NOT_FOUND_MARKER) {
        Some(pos) => {
            let selector = message[pos + NOT_FOUND_MARKER.len()..]
                .split(['\n', '"'])
                .next()
                .unwrap_or_default()
                .to_string();
            SessionError::not_found(selector)
        }
        None => SessionError::Script(message),
    }
}
