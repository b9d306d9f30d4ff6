//! 利用率快照与累计计数。
//!
//! # 教案式说明
//! - **意图（Why）**：运维需要随时知道缓冲有多满，以及淘汰与背压发生得有多频繁，
//!   才能判断写入端是否长期跟不上录制速率。
//! - **逻辑（How）**：[`BufferStats`] 由当前字节量与容量即时计算；[`BufferMetrics`] 由缓冲在
//!   接收、淘汰、排空与销毁各路径上累加。
//! - **契约（What）**：读取均无副作用，可在排空过程中任意调用。

use core::fmt;

use crate::{
    governor::EvictionReport,
    logging::format_bytes,
    pump::{DrainOutcome, DrainReport},
};

/// 缓冲利用率的瞬时快照。
///
/// 读取不产生任何副作用，排空过程中也可随时调用。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferStats {
    /// 当前缓存的字节数。
    pub used: usize,
    /// 配置的容量上限。
    pub max: usize,
    /// `used / max * 100`。
    pub percentage: f64,
}

impl BufferStats {
    pub fn new(used: usize, max: usize) -> Self {
        Self {
            used,
            max,
            percentage: used as f64 / max as f64 * 100.0,
        }
    }
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({:.1}%)",
            format_bytes(self.used),
            format_bytes(self.max),
            self.percentage
        )
    }
}

/// 自构造以来的累计计数，供运维观察淘汰与背压频度。
///
/// # 契约说明（What）
/// - 所有字段单调递增，销毁后保持最后的值；
/// - `bytes_accepted == bytes_written + bytes_evicted + 当前缓存 + 销毁时释放` 在无写入失败时成立。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferMetrics {
    pub chunks_accepted: u64,
    pub bytes_accepted: u64,
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub chunks_evicted: u64,
    pub bytes_evicted: u64,
    /// 发生淘汰的评估次数。
    pub eviction_events: u64,
    /// 写入端施加背压的次数。
    pub writer_stalls: u64,
    /// 销毁时随缓冲一起释放的字节数。
    pub bytes_released_on_destroy: u64,
    /// 销毁后仍被投递、因而直接丢弃的字节数。
    pub bytes_discarded_after_destroy: u64,
}

impl BufferMetrics {
    pub(crate) fn record_accept(&mut self, bytes: usize) {
        self.chunks_accepted += 1;
        self.bytes_accepted += bytes as u64;
    }

    pub(crate) fn record_eviction(&mut self, report: EvictionReport) {
        if report.is_empty() {
            return;
        }
        self.eviction_events += 1;
        self.chunks_evicted += report.chunks as u64;
        self.bytes_evicted += report.bytes as u64;
    }

    pub(crate) fn record_drain(&mut self, report: &DrainReport) {
        self.chunks_written += report.chunks_written as u64;
        self.bytes_written += report.bytes_written as u64;
        if matches!(report.outcome, DrainOutcome::WriterBusy) {
            self.writer_stalls += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_derived_from_used_and_max() {
        let stats = BufferStats::new(1000, 2000);
        assert_eq!(stats.percentage, 50.0);
        assert_eq!(stats.to_string(), "1000 B / 1.95 KB (50.0%)");
    }

    #[test]
    fn empty_eviction_is_not_counted() {
        let mut metrics = BufferMetrics::default();
        metrics.record_eviction(EvictionReport::default());
        assert_eq!(metrics.eviction_events, 0);
        metrics.record_eviction(EvictionReport { chunks: 2, bytes: 800 });
        assert_eq!(metrics.eviction_events, 1);
        assert_eq!(metrics.bytes_evicted, 800);
    }
}
