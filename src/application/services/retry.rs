//! Retry Policy - 固定次数 + 固定间隔重试
//!
//! 没有指数退避，没有抖动。耗尽后的行为由调用方显式选择：
//! - `Exhaustion::Propagate` 返回最后一次错误（调用方没有兜底路径）
//! - `Exhaustion::Tolerate` 返回 None（调用方自行降级）

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::application::context::JobContext;

/// 默认尝试次数
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// 默认重试间隔
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// 重试耗尽后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    Propagate,
    Tolerate,
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// attempts 至少为 1
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 按指定耗尽策略执行
    ///
    /// 成功返回 `Ok(Some(value))`；耗尽时 Propagate 返回 `Err`，Tolerate 返回 `Ok(None)`
    pub async fn execute<T, E, F, Fut>(
        &self,
        ctx: &JobContext,
        label: &str,
        exhaustion: Exhaustion,
        op: F,
    ) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match self.run(ctx, label, op).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => match exhaustion {
                Exhaustion::Propagate => Err(e),
                Exhaustion::Tolerate => Ok(None),
            },
        }
    }

    /// 重试，耗尽后返回最后一次错误
    pub async fn retry<T, E, F, Fut>(&self, ctx: &JobContext, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run(ctx, label, op).await
    }

    /// 重试，耗尽后返回 None
    pub async fn retry_or_none<T, E, F, Fut>(
        &self,
        ctx: &JobContext,
        label: &str,
        op: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run(ctx, label, op).await.ok()
    }

    async fn run<T, E, F, Fut>(&self, ctx: &JobContext, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    ctx.warning(format!(
                        "Attempt {}/{} failed for {}. Retrying in {}ms. Error: {}",
                        attempt,
                        self.attempts,
                        label,
                        self.delay.as_millis(),
                        e
                    ));
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    ctx.warning(format!(
                        "All {} attempts failed for {}. Error: {}",
                        self.attempts, label, e
                    ));
                    return Err(e);
                }
            }
        }
    }
}
