//! 单调时钟抽象。
//!
//! # 教案式说明
//! - **意图（Why）**：溢出日志的节流窗口依赖“距上次输出过去了多久”，若直接调用 [`Instant::now`]，
//!   测试只能真实等待 5 秒；抽象出 [`Clock`] 后，生产路径用 [`SystemClock`]，测试用 [`MockClock`] 手动推进。
//! - **契约（What）**：`now` 必须单调不减；实现需满足 `Send + Sync + 'static`，以便放入 `Arc<dyn Clock>`
//!   随缓冲一起跨任务移动。

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

/// 统一的单调时间来源。
pub trait Clock: Send + Sync + 'static {
    /// 返回当前的单调时间点。
    fn now(&self) -> Instant;
}

/// 直接读取 [`Instant::now`] 的系统时钟。
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 虚拟时钟：通过手动推进时间在测试中复现确定性的节流序列。
///
/// # 行为概览（How）
/// - 构造时记录基准 [`Instant`]，之后 `now` 返回 `origin + elapsed`；
/// - `advance` 只增不减，克隆体共享同一份偏移量，便于测试持有一份、缓冲持有另一份。
#[derive(Clone, Debug)]
pub struct MockClock {
    inner: Arc<Mutex<ClockState>>,
}

#[derive(Debug)]
struct ClockState {
    origin: Instant,
    elapsed: Duration,
}

impl MockClock {
    /// 以当前系统时间为基准创建虚拟时钟。
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    /// 以指定起点构造虚拟时钟。
    pub fn with_start(origin: Instant) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockState {
                origin,
                elapsed: Duration::ZERO,
            })),
        }
    }

    /// 手动推进虚拟时钟；`delta` 为零时不做任何事。
    pub fn advance(&self, delta: Duration) {
        if delta.is_zero() {
            return;
        }
        let mut state = self.inner.lock();
        state.elapsed = state.elapsed.saturating_add(delta);
    }

    /// 返回自起点以来累计推进的虚拟时间。
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock();
        state.origin + state.elapsed
    }
}
