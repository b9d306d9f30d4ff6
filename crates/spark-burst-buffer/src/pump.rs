//! 下游泵：把缓冲按顺序排空到写入端。
//!
//! # 教案式注释
//!
//! ## 意图 (Why)
//! - 写入端可能暂时慢于录制端；泵只在写入端表示可写时提交数据，遇到背压立刻停下，
//!   等待外部的就绪通知再继续，从而把“慢”吸收在缓冲里而不是传给上游。
//!
//! ## 逻辑 (How)
//! - 以 [`PumpState`] 三态枚举替代两个布尔标志，`attempt_drain` 仅在 `Idle` 时启动；
//! - 每次从队首取出一块交给写入端：`Accepted` 继续循环，`FlowControlApplied` 转入
//!   `WaitingForWriterReady` 并返回，同步 `Err` 则归还该块、丢弃链接并上报错误。
//!
//! ## 契约 (What)
//! - 状态迁移：`Idle → Draining`（新数据/冲刷/挂载）、`Draining → Idle`（排空）、
//!   `Draining → WaitingForWriterReady`（背压）、`WaitingForWriterReady → Draining`（就绪通知）；
//! - 泵本身不记录统计，结果以 [`DrainReport`] 返回给调用方。

use std::sync::Arc;

use crate::{
    error::{BurstBufferError, WriterError},
    state::BufferState,
    writer::ChunkWriter,
};

/// 泵的运行状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpState {
    /// 空闲，可以开始新的排空。
    Idle,
    /// 正在向写入端提交数据。
    Draining,
    /// 写入端施加了背压，等待就绪通知。
    WaitingForWriterReady,
}

/// 一次排空尝试的结果。
#[derive(Clone, Debug)]
pub enum DrainOutcome {
    /// 未启动：没有写入端，或已有排空在进行/等待中。
    Skipped,
    /// 缓冲已排空，泵回到 `Idle`。
    Emptied,
    /// 写入端施加背压，泵停在 `WaitingForWriterReady`。
    WriterBusy,
    /// 写入端同步报错，链接已失效。
    Failed(WriterError),
}

/// 一次排空尝试提交给写入端的数据量及结局。
#[derive(Clone, Debug)]
pub struct DrainReport {
    pub chunks_written: usize,
    pub bytes_written: usize,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            chunks_written: 0,
            bytes_written: 0,
            outcome: DrainOutcome::Skipped,
        }
    }
}

/// 写入端链接：共享的写入端引用加上泵状态。
struct WriterLink {
    writer: Arc<dyn ChunkWriter>,
    state: PumpState,
}

/// 下游泵。
#[derive(Default)]
pub struct DownstreamPump {
    link: Option<WriterLink>,
}

impl DownstreamPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// 挂载写入端；已有有效链接时拒绝。
    pub fn attach(&mut self, writer: Arc<dyn ChunkWriter>) -> Result<(), BurstBufferError> {
        if self.link.is_some() {
            return Err(BurstBufferError::WriterAlreadyAttached);
        }
        self.link = Some(WriterLink {
            writer,
            state: PumpState::Idle,
        });
        Ok(())
    }

    /// 丢弃链接，返回此前是否存在链接。写入端本身不会被关闭。
    pub fn detach(&mut self) -> bool {
        self.link.take().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// 当前泵状态；未挂载写入端时为 `None`。
    pub fn state(&self) -> Option<PumpState> {
        self.link.as_ref().map(|link| link.state)
    }

    /// 尝试把缓冲排空到写入端。
    pub fn attempt_drain(&mut self, buffer: &mut BufferState) -> DrainReport {
        let Some(link) = self.link.as_mut() else {
            return DrainReport::skipped();
        };
        if link.state != PumpState::Idle {
            return DrainReport::skipped();
        }

        link.state = PumpState::Draining;
        let mut report = DrainReport {
            chunks_written: 0,
            bytes_written: 0,
            outcome: DrainOutcome::Emptied,
        };

        while let Some(chunk) = buffer.pop_front() {
            let len = chunk.len();
            match link.writer.write(chunk.clone()) {
                Ok(signal) => {
                    report.chunks_written += 1;
                    report.bytes_written += len;
                    if !signal.is_ready() {
                        link.state = PumpState::WaitingForWriterReady;
                        tracing::debug!(
                            written_chunks = report.chunks_written,
                            buffered_bytes = buffer.total_bytes(),
                            "writer applied flow control, pump waiting for ready"
                        );
                        report.outcome = DrainOutcome::WriterBusy;
                        return report;
                    }
                }
                Err(err) => {
                    buffer.push_front(chunk);
                    self.link = None;
                    tracing::debug!(error = %err, "writer failed during drain, link dropped");
                    report.outcome = DrainOutcome::Failed(err);
                    return report;
                }
            }
        }

        link.state = PumpState::Idle;
        report
    }

    /// 处理写入端的就绪通知：离开等待态并重新尝试排空。
    pub fn on_writer_ready(&mut self, buffer: &mut BufferState) -> DrainReport {
        if let Some(link) = self.link.as_mut()
            && link.state == PumpState::WaitingForWriterReady
        {
            link.state = PumpState::Idle;
        }
        self.attempt_drain(buffer)
    }
}
