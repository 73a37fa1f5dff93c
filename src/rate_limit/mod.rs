//! # 出站调用速率限制
//!
//! 固定窗口计数器，按 `scope:key` 维度限制出站调用频率，
//! 防止缺陷或滥用把服务的 API 配额打爆。
//!
//! 有意选择固定窗口而非令牌桶或滑动日志：窗口边界的突发是已知的
//! 不精确之处，换来 O(1) 内存和可直接推断的行为。

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{GuardError, Result};

/// 无账户身份时的保留 key
///
/// `check` 的 key 在调用点是必填参数；只有真正无法归属到账户的
/// 系统级调用才允许使用这个全局 key。
pub const GLOBAL_KEY: &str = "global";

/// 默认窗口长度
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// 单个 `scope:key` 的计数窗口
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: Instant,
    count: u32,
}

/// 固定窗口速率限制器
///
/// 显式构造、按 `Arc` 注入共享，没有进程级全局状态，
/// 测试可以实例化互不干扰的限制器。
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
}

impl RateLimiter {
    /// 创建新的限制器实例
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// 按默认 60 秒窗口检查并计数一次调用
    ///
    /// 超限时返回 [`GuardError::RateLimitExceeded`]，否则计入并放行。
    /// 触发限制的那次调用本身会被计入，计数至多达到 max + 1。
    pub fn check(&self, scope: &str, key: &str, max_per_window: u32) -> Result<()> {
        self.check_with_window(scope, key, max_per_window, DEFAULT_WINDOW)
    }

    /// 按指定窗口长度检查并计数一次调用
    pub fn check_with_window(
        &self,
        scope: &str,
        key: &str,
        max_per_window: u32,
        window: Duration,
    ) -> Result<()> {
        let map_key = format!("{scope}:{key}");
        let now = Instant::now();

        // DashMap 的 entry 锁保证同一键上的"重置+自增"原子执行
        let mut entry = self.windows.entry(map_key).or_insert(RateWindow {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= window {
            // 窗口已过，整体换新
            entry.window_start = now;
            entry.count = 0;
        }

        // 触发限制的那次调用计入后封顶在 max + 1，
        // 后续被拒调用不再推高计数
        if entry.count <= max_per_window {
            entry.count += 1;
        }
        let count = entry.count;
        drop(entry);

        if count > max_per_window {
            warn!(scope, key, count, max_per_window, "outbound call rate limited");
            return Err(GuardError::rate_limit_exceeded(scope, key, max_per_window));
        }

        Ok(())
    }

    /// 清空全部计数窗口
    pub fn reset(&self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_enforced_within_window() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.check("drive", "owner-1", 3).is_ok());
        }

        let err = limiter.check("drive", "owner-1", 3).unwrap_err();
        match err {
            GuardError::RateLimitExceeded { scope, key, limit } => {
                assert_eq!(scope, "drive");
                assert_eq!(key, "owner-1");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();

        assert!(limiter.check("drive", "owner-1", 1).is_ok());
        assert!(limiter.check("drive", "owner-1", 1).is_err());

        // 另一个账户、另一个 scope 均不受影响
        assert!(limiter.check("drive", "owner-2", 1).is_ok());
        assert!(limiter.check("sheets", "owner-1", 1).is_ok());
        assert!(limiter.check("smtp", GLOBAL_KEY, 1).is_ok());
    }

    #[test]
    fn test_window_elapse_resets_count() {
        let limiter = RateLimiter::new();
        let window = Duration::from_millis(40);

        assert!(limiter.check_with_window("smtp", "o", 1, window).is_ok());
        assert!(limiter.check_with_window("smtp", "o", 1, window).is_err());

        std::thread::sleep(Duration::from_millis(50));

        assert!(limiter.check_with_window("smtp", "o", 1, window).is_ok());
    }

    #[test]
    fn test_reset_clears_all_windows() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("drive", "o", 1).is_ok());
        assert!(limiter.check("drive", "o", 1).is_err());

        limiter.reset();
        assert!(limiter.check("drive", "o", 1).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_increments_are_not_lost() {
        let limiter = std::sync::Arc::new(RateLimiter::new());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check("drive", "owner-1", 10).is_ok()
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }

        // 正好 10 次放行，没有丢失的计数
        assert_eq!(allowed, 10);
    }
}
