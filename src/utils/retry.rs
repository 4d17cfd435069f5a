//! 有界重试 / 轮询组合子
//!
//! 查看器 frame 查找、图片就绪检查、验证码结果轮询和整体检索重试都基于这里。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// 次数 + 固定间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// 立即重试，不等待（测试用）
    pub const fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO)
    }

    /// 最坏情况下的总等待时间
    pub fn total_wait(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }

    fn effective_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// 轮询直到 `check` 返回 `Some`，次数用尽返回 `None`
///
/// `check` 收到的是从 1 开始的尝试序号。
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut check: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let attempts = policy.effective_attempts();
    for attempt in 1..=attempts {
        if let Some(value) = check(attempt).await {
            return Some(value);
        }
        if attempt < attempts {
            sleep(policy.interval).await;
        }
    }
    debug!("轮询 {} 次后仍未满足条件", attempts);
    None
}

/// 执行操作，失败且 `is_retryable` 为真时按策略重试
///
/// 不可重试的错误立即返回；次数用尽时返回最后一次的错误。
pub async fn retry<T, E, F, Fut, R>(policy: RetryPolicy, mut operation: F, is_retryable: R) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let attempts = policy.effective_attempts();
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_retryable(&e) => {
                debug!("第 {}/{} 次尝试失败，{:?} 后重试", attempt, attempts, policy.interval);
                sleep(policy.interval).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
