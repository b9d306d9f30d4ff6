//! 溢出治理：水位告警、溢出日志节流与“丢弃最旧”淘汰。
//!
//! # 模块定位（Why）
//! - 上游录制不能被下游写入拖慢，缓冲也不能无限增长；当持续的写入迟缓超过容量时，
//!   牺牲最旧（对连续录制最不紧要）的数据，换取内存有界与录制不中断。
//!
//! # 核心机制（How）
//! - 水位告警带 10 个百分点的迟滞区间：越过阈值告警一次，回落到 `阈值 - 10` 以下才重新布防；
//! - 溢出日志按 5000 ms 窗口节流，但淘汰本身不节流，每次溢出都会执行；
//! - 淘汰以整块为单位，把总量压到容量的 90% 以下，且永远保留至少一个块。
//!
//! # 设计权衡（Trade-offs）
//! - 整块淘汰不会切割块内数据，块相对容量较大时，淘汰后的用量可能明显低于 90%，
//!   而单个超大块会被原样保留、超出目标。

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    clock::Clock,
    logging::{Logger, format_bytes},
    state::BufferState,
};

/// 告警复位所需回落的百分点数。
pub const HYSTERESIS_GAP_PERCENT: f64 = 10.0;

/// 两次溢出 ERROR 日志之间的最小间隔。
pub const OVERFLOW_LOG_INTERVAL: Duration = Duration::from_millis(5000);

/// 淘汰目标占容量的比例。
pub const EVICTION_TARGET_RATIO: f64 = 0.9;

/// 容量与告警水位。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub max_buffer_size: usize,
    pub warning_threshold: f64,
}

impl Thresholds {
    pub fn new(max_buffer_size: usize, warning_threshold: f64) -> Self {
        Self {
            max_buffer_size,
            warning_threshold,
        }
    }

    /// 计算给定字节量对应的使用率（百分比）。
    pub fn usage_percent(&self, used: usize) -> f64 {
        used as f64 / self.max_buffer_size as f64 * 100.0
    }

    /// 淘汰目标字节量（`max_buffer_size * 0.9`）。
    pub fn eviction_target(&self) -> f64 {
        self.max_buffer_size as f64 * EVICTION_TARGET_RATIO
    }
}

/// 告警状态。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WarnState {
    pub high_usage_warned: bool,
    pub overflow_warned: bool,
    pub last_overflow_log_time: Option<Instant>,
}

/// 单次评估中被淘汰的数据量；为空表示没有发生淘汰。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub chunks: usize,
    pub bytes: usize,
}

impl EvictionReport {
    pub fn is_empty(&self) -> bool {
        self.chunks == 0
    }
}

/// 溢出治理器。
///
/// # 契约说明（What）
/// - `evaluate` 只产生副作用（日志、淘汰），返回值仅用于统计，从不表示错误；
/// - 评估结束后，若缓冲曾达到容量上限，则 `total_bytes <= max * 0.9` 或仅剩一个块。
pub struct OverflowGovernor {
    thresholds: Thresholds,
    warn_state: WarnState,
    correlation_id: Arc<str>,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
}

impl OverflowGovernor {
    pub fn new(
        thresholds: Thresholds,
        correlation_id: Arc<str>,
        logger: Arc<dyn Logger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            thresholds,
            warn_state: WarnState::default(),
            correlation_id,
            logger,
            clock,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn warn_state(&self) -> WarnState {
        self.warn_state
    }

    /// 根据当前用量输出告警，并在溢出时淘汰最旧的块。
    pub fn evaluate(&mut self, state: &mut BufferState) -> EvictionReport {
        let used = state.total_bytes();
        let max = self.thresholds.max_buffer_size;
        let warning = self.thresholds.warning_threshold;
        let usage = self.thresholds.usage_percent(used);

        if usage >= warning {
            if !self.warn_state.high_usage_warned {
                self.logger.warn(
                    &self.correlation_id,
                    &format!(
                        "buffer usage high: {usage:.1}% ({} / {})",
                        format_bytes(used),
                        format_bytes(max)
                    ),
                );
                self.warn_state.high_usage_warned = true;
            }
        } else if usage < warning - HYSTERESIS_GAP_PERCENT {
            self.warn_state.high_usage_warned = false;
        }

        if used < max {
            return EvictionReport::default();
        }

        let now = self.clock.now();
        let throttle_elapsed = self
            .warn_state
            .last_overflow_log_time
            .is_none_or(|last| now.duration_since(last) > OVERFLOW_LOG_INTERVAL);
        if !self.warn_state.overflow_warned || throttle_elapsed {
            self.logger.error(
                &self.correlation_id,
                &format!(
                    "buffer overflow: {} / {} ({usage:.1}%), dropping oldest data",
                    format_bytes(used),
                    format_bytes(max)
                ),
            );
            self.warn_state.last_overflow_log_time = Some(now);
        }
        self.warn_state.overflow_warned = true;

        self.evict_oldest(state)
    }

    fn evict_oldest(&self, state: &mut BufferState) -> EvictionReport {
        let target = self.thresholds.eviction_target();
        let mut report = EvictionReport::default();
        while state.total_bytes() as f64 > target && state.len() > 1 {
            let Some(dropped) = state.pop_front() else {
                break;
            };
            report.chunks += 1;
            report.bytes += dropped.len();
        }

        if report.bytes > 0 {
            self.logger.error(
                &self.correlation_id,
                &format!(
                    "dropped {} of oldest buffered data ({} chunks), {} still buffered",
                    format_bytes(report.bytes),
                    report.chunks,
                    format_bytes(state.total_bytes())
                ),
            );
        }
        tracing::debug!(
            correlation_id = %self.correlation_id,
            evicted_chunks = report.chunks,
            evicted_bytes = report.bytes,
            remaining_bytes = state.total_bytes(),
            "overflow eviction finished"
        );
        report
    }
}
