//! 人机验证 - 业务能力层
//!
//! - 从页面（或任意子 frame）截取验证码图片
//! - 提交给外部识别服务并轮询结果

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ChallengeError;
use crate::infrastructure::{PortalPage, Scope, Target};
use crate::selectors::captcha;
use crate::utils::retry::{poll_until, RetryPolicy};

/// 验证码识别服务
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// 识别验证码图片，返回文本
    async fn solve(&self, image: &[u8]) -> Result<String, ChallengeError>;
}

/// 结果尚未就绪时服务返回的文本
const NOT_READY: &str = "CAPCHA_NOT_READY";

/// 基于 HTTP 的验证码识别服务（in.php / res.php 协议）
pub struct HttpChallengeSolver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    poll: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct SolverResponse {
    status: u8,
    request: String,
}

impl HttpChallengeSolver {
    /// 默认每 5 秒轮询一次，最多约 60 秒
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            poll: RetryPolicy::new(12, Duration::from_secs(5)),
        }
    }

    pub fn with_poll(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    async fn submit(&self, image: &[u8]) -> Result<String, ChallengeError> {
        let body = base64::engine::general_purpose::STANDARD.encode(image);
        let response: SolverResponse = self
            .client
            .post(format!("{}/in.php", self.base_url))
            .form(&[
                ("key", self.api_key.as_str()),
                ("method", "base64"),
                ("json", "1"),
                ("body", body.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if response.status != 1 {
            return Err(ChallengeError::Rejected(response.request));
        }
        Ok(response.request)
    }

    async fn fetch(&self, id: &str) -> Result<Option<String>, ChallengeError> {
        let response: SolverResponse = self
            .client
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", id),
                ("json", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        match (response.status, response.request.as_str()) {
            (1, _) => Ok(Some(response.request)),
            (_, NOT_READY) => Ok(None),
            _ => Err(ChallengeError::Rejected(response.request)),
        }
    }
}

#[async_trait]
impl ChallengeSolver for HttpChallengeSolver {
    async fn solve(&self, image: &[u8]) -> Result<String, ChallengeError> {
        let id = self.submit(image).await?;
        debug!("验证码任务已提交: {}", id);

        // 服务端识别需要时间，先等一个间隔再取结果
        sleep(self.poll.interval).await;

        // 服务明确拒绝时停止轮询，把错误带出来
        let outcome = poll_until(self.poll, |attempt| {
            let id = id.clone();
            async move {
                match self.fetch(&id).await {
                    Ok(Some(text)) => Some(Ok(text)),
                    Ok(None) => {
                        debug!("验证码结果未就绪 (第 {} 次)", attempt);
                        None
                    }
                    Err(e) => {
                        warn!("获取验证码结果失败: {}", e);
                        Some(Err(e))
                    }
                }
            }
        })
        .await;

        outcome.unwrap_or_else(|| {
            Err(ChallengeError::Timeout(
                self.poll.total_wait() + self.poll.interval,
            ))
        })
    }
}

/// 截取到的验证码
#[derive(Debug, Clone)]
pub struct CapturedChallenge {
    pub image: Vec<u8>,
    /// 答案输入框
    pub input: Target,
}

/// 通用启发式：在验证码命名的输入框附近找一张大小像验证码的图片并打上标记
const HEURISTIC_SCRIPT: &str = r#"
const inputs = [...doc.querySelectorAll("input")].filter(i =>
    /captcha|verif/i.test(`${i.name || ""} ${i.id || ""} ${i.placeholder || ""}`));
const imgs = [...doc.querySelectorAll("img")].filter(img => {
    const r = img.getBoundingClientRect();
    return r.width >= 60 && r.width <= 400 && r.height >= 20 && r.height <= 150;
});
if (!inputs.length || !imgs.length) { return false; }
const center = el => { const r = el.getBoundingClientRect(); return [r.left + r.width / 2, r.top + r.height / 2]; };
const [ix, iy] = center(inputs[0]);
let best = null, bestDistance = Infinity;
for (const img of imgs) {
    const [x, y] = center(img);
    const d = Math.hypot(x - ix, y - iy);
    if (d < bestDistance) { bestDistance = d; best = img; }
}
best.setAttribute("data-captcha-candidate", "1");
inputs[0].setAttribute("data-captcha-input", "1");
return true;
"#;

/// 按优先级截取验证码图片
///
/// 1. 主文档中的显式提示选择器
/// 2. 各子 frame 中的显式提示选择器
/// 3. 主文档和各子 frame 中的通用启发式
pub async fn capture_challenge(page: &dyn PortalPage) -> Result<CapturedChallenge, ChallengeError> {
    let mut scopes = vec![Scope::Main];
    scopes.extend(page.frames().await.unwrap_or_default());

    for scope in &scopes {
        for hint in captcha::IMAGE_HINTS {
            if let Some(captured) = try_capture(page, scope, hint, captcha::INPUT_HINTS).await {
                info!("✓ 通过提示选择器 {} 找到验证码 ({})", hint, scope);
                return Ok(captured);
            }
        }
    }

    for scope in &scopes {
        let marked = page
            .evaluate(scope, HEURISTIC_SCRIPT)
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !marked {
            continue;
        }
        let inputs = [captcha::HEURISTIC_INPUT];
        if let Some(captured) = try_capture(page, scope, captcha::HEURISTIC_IMAGE, &inputs).await {
            info!("✓ 通过通用启发式找到验证码 ({})", scope);
            return Ok(captured);
        }
    }

    Err(ChallengeError::ImageNotFound)
}

async fn try_capture(
    page: &dyn PortalPage,
    scope: &Scope,
    image_selector: &str,
    input_hints: &[&str],
) -> Option<CapturedChallenge> {
    let image = page.locate(scope, image_selector);
    if !image.exists().await.unwrap_or(false) {
        return None;
    }
    let bytes = match image.screenshot().await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return None,
        Err(e) => {
            debug!("截取验证码失败 {}: {}", image_selector, e);
            return None;
        }
    };

    for hint in input_hints {
        if page.locate(scope, *hint).exists().await.unwrap_or(false) {
            return Some(CapturedChallenge {
                image: bytes,
                input: Target::new(scope, *hint),
            });
        }
    }
    debug!("找到验证码图片但没有输入框: {}", image_selector);
    None
}
