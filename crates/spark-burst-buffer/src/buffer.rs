//! 突发缓冲的组合入口：录制端接收、写入端挂载与销毁。
//!
//! # 教案式注释
//!
//! ## 意图 (Why)
//! - 把 [`BufferState`]、[`OverflowGovernor`] 与 [`DownstreamPump`] 组合成一个对宿主可见的对象，
//!   让录制端只面对 `accept`，写入端只面对挂载与事件通知。
//!
//! ## 逻辑 (How)
//! - 每次 `accept` 依次执行“追加 → 治理评估 → 尝试排空”，并把淘汰与排空结果计入 [`BufferMetrics`]；
//! - 写入端同步失败不能从 `accept` 返回，因此先暂存，再由 `flush`/`destroy`/`take_writer_error` 取回。
//!
//! ## 契约 (What)
//! - 所有方法都在一次调用内完成状态迁移，调用方需独占 `&mut self`；
//! - 销毁幂等，销毁后的输入只做丢弃计数。

use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::BufferConfig,
    error::{BurstBufferError, WriterError},
    governor::OverflowGovernor,
    logging::{Logger, TracingLogger, format_bytes},
    pump::{DownstreamPump, DrainOutcome, DrainReport, PumpState},
    state::{BufferState, Chunk},
    stats::{BufferMetrics, BufferStats},
    writer::{ChunkWriter, WriterEvent},
};

/// `flush` 的完成结果。冲刷从不等待慢速写入端。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// 缓冲已全部交给写入端。
    Drained,
    /// 写入端未挂载或正在施加背压，仍有数据留在缓冲中。
    Pending { remaining_bytes: usize },
}

/// 突发写入缓冲：录制端与持久化写入端之间的内存减震器。
///
/// # 模块角色（Why）
/// - 录制端按自己的节奏产出数据块，写入端偶尔会变慢；缓冲吸收这种速率差，
///   既不向录制端施加背压（否则实时采集会失步），也不无限占用内存。
///
/// # 核心机制（How）
/// - `accept`：无条件追加，随后交给 [`OverflowGovernor`] 评估水位/淘汰，再由 [`DownstreamPump`] 尝试排空；
/// - `on_writer_event`：写入端的就绪通知恢复排空，失败通知使链接失效并向上返回错误；
/// - `destroy`：清空缓冲、解除链接，幂等。
///
/// # 契约说明（What）
/// - **单线程协作**：所有方法都需要 `&mut self`，状态迁移在一次调用内完成，无需加锁；
/// - **录制端不受阻**：`accept` 永不失败、永不阻塞；从 `accept` 触发的排空若遇到写入端同步失败，
///   错误被暂存，可通过 [`BurstBuffer::take_writer_error`]、`flush` 或 `destroy` 取回，重新挂载写入端时丢弃；
/// - **错误边界**：只有写入端的失败会以错误形式离开本组件。
pub struct BurstBuffer {
    state: BufferState,
    governor: OverflowGovernor,
    pump: DownstreamPump,
    logger: Arc<dyn Logger>,
    correlation_id: Arc<str>,
    max_buffer_size: usize,
    metrics: BufferMetrics,
    pending_writer_error: Option<WriterError>,
    destroyed: bool,
}

impl BurstBuffer {
    /// 以 `tracing` 日志与系统时钟构造缓冲。
    pub fn new(config: BufferConfig) -> Result<Self, BurstBufferError> {
        Self::builder().config(config).build()
    }

    /// 返回构建器，用于注入自定义日志或时钟。
    pub fn builder() -> BurstBufferBuilder {
        BurstBufferBuilder::default()
    }

    /// 挂载写入端。
    ///
    /// - 已有有效链接时返回 [`BurstBufferError::WriterAlreadyAttached`]；
    /// - 销毁后返回 [`BurstBufferError::Destroyed`]；
    /// - 暂存的写入端错误属于已失效的旧链接，新链接建立时随之丢弃（该错误已在发生时记录 ERROR 日志）；
    /// - 挂载成功后立即尝试排空已缓存的数据；若此时写入端同步失败，链接随即失效并返回该错误。
    pub fn attach(&mut self, writer: Arc<dyn ChunkWriter>) -> Result<(), BurstBufferError> {
        if self.destroyed {
            return Err(BurstBufferError::Destroyed);
        }
        self.pump.attach(writer)?;
        let stale = self.pending_writer_error.take();
        tracing::debug!(
            correlation_id = %self.correlation_id,
            buffered_bytes = self.state.total_bytes(),
            discarded_stale_error = stale.is_some(),
            "writer attached"
        );
        let report = self.pump.attempt_drain(&mut self.state);
        self.settle_drain(report).map_err(BurstBufferError::from)
    }

    /// 接收一块录制数据。永不失败，也不向调用方施加背压。
    pub fn accept(&mut self, chunk: impl Into<Chunk>) {
        let chunk = chunk.into();
        if self.destroyed {
            self.metrics.bytes_discarded_after_destroy += chunk.len() as u64;
            tracing::debug!(
                correlation_id = %self.correlation_id,
                bytes = chunk.len(),
                "chunk discarded after destroy"
            );
            return;
        }

        self.metrics.record_accept(chunk.len());
        self.state.push_back(chunk);
        let eviction = self.governor.evaluate(&mut self.state);
        self.metrics.record_eviction(eviction);

        let report = self.pump.attempt_drain(&mut self.state);
        if let Err(err) = self.settle_drain(report) {
            self.park_writer_error(err);
        }
    }

    /// 处理写入端送达的通知。
    ///
    /// `Ready` 恢复排空；`Failed` 使链接失效，错误原样返回，不做重试。销毁后到达的通知一律忽略。
    pub fn on_writer_event(&mut self, event: WriterEvent) -> Result<(), BurstBufferError> {
        if self.destroyed {
            return Ok(());
        }
        match event {
            WriterEvent::Ready => {
                let report = self.pump.on_writer_ready(&mut self.state);
                self.settle_drain(report)?;
                Ok(())
            }
            WriterEvent::Failed(err) => {
                if self.pump.detach() {
                    self.logger.error(
                        &self.correlation_id,
                        &format!(
                            "writer failed: {err}; {} left in buffer",
                            format_bytes(self.state.total_bytes())
                        ),
                    );
                }
                Err(err.into())
            }
        }
    }

    /// [`WriterEvent::Ready`] 的便捷入口。
    pub fn notify_writer_ready(&mut self) -> Result<(), BurstBufferError> {
        self.on_writer_event(WriterEvent::Ready)
    }

    /// 把写入端当前能接收的数据尽量交出去，然后立即返回。
    ///
    /// 若此前从 `accept` 触发的排空暂存了写入端错误，优先返回该错误。
    pub fn flush(&mut self) -> Result<FlushOutcome, BurstBufferError> {
        if let Some(err) = self.pending_writer_error.take() {
            return Err(err.into());
        }
        let report = self.pump.attempt_drain(&mut self.state);
        self.settle_drain(report)?;
        if self.state.is_empty() {
            Ok(FlushOutcome::Drained)
        } else {
            Ok(FlushOutcome::Pending {
                remaining_bytes: self.state.total_bytes(),
            })
        }
    }

    /// 当前利用率快照。
    pub fn stats(&self) -> BufferStats {
        BufferStats::new(self.state.total_bytes(), self.max_buffer_size)
    }

    /// 累计计数。
    pub fn metrics(&self) -> BufferMetrics {
        self.metrics
    }

    /// 只读访问当前缓存的块序列。
    pub fn buffered(&self) -> &BufferState {
        &self.state
    }

    /// 泵状态；未挂载写入端时为 `None`。
    pub fn pump_state(&self) -> Option<PumpState> {
        self.pump.state()
    }

    pub fn is_writer_attached(&self) -> bool {
        self.pump.is_attached()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// 取出从 `accept` 路径暂存的写入端错误。
    pub fn take_writer_error(&mut self) -> Option<WriterError> {
        self.pending_writer_error.take()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// 销毁缓冲：清空数据、解除写入端链接，并沿终止路径返回 `cause`。
    ///
    /// - 未显式给出 `cause` 时，若存在暂存的写入端错误，则以其作为终止原因；
    /// - 幂等：再次调用只会看到已清空的状态，返回 `Ok(())`。
    pub fn destroy(&mut self, cause: Option<BurstBufferError>) -> Result<(), BurstBufferError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;

        let released = self.state.clear();
        self.metrics.bytes_released_on_destroy += released as u64;
        let detached = self.pump.detach();
        tracing::debug!(
            correlation_id = %self.correlation_id,
            released_bytes = released,
            writer_detached = detached,
            "buffer destroyed"
        );

        match cause.or_else(|| self.pending_writer_error.take().map(Into::into)) {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    /// 把排空结果计入统计；写入端同步失败时返回该错误。
    fn settle_drain(&mut self, report: DrainReport) -> Result<(), WriterError> {
        self.metrics.record_drain(&report);
        match report.outcome {
            DrainOutcome::Failed(err) => {
                self.logger.error(
                    &self.correlation_id,
                    &format!(
                        "writer failed: {err}; {} left in buffer",
                        format_bytes(self.state.total_bytes())
                    ),
                );
                Err(err)
            }
            DrainOutcome::Skipped | DrainOutcome::Emptied | DrainOutcome::WriterBusy => Ok(()),
        }
    }

    fn park_writer_error(&mut self, err: WriterError) {
        if self.pending_writer_error.is_none() {
            self.pending_writer_error = Some(err);
        }
    }
}

/// [`BurstBuffer`] 构建器。
///
/// 未注入日志时使用 [`TracingLogger`]，未注入时钟时使用 [`SystemClock`]。
#[derive(Default)]
pub struct BurstBufferBuilder {
    config: BufferConfig,
    logger: Option<Arc<dyn Logger>>,
    clock: Option<Arc<dyn Clock>>,
}

impl BurstBufferBuilder {
    /// 整体替换配置。
    pub fn config(mut self, config: BufferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.config.max_buffer_size = bytes;
        self
    }

    pub fn warning_threshold(mut self, percent: f64) -> Self {
        self.config.warning_threshold = percent;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.config.correlation_id = id.into();
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 校验配置并构造缓冲。
    pub fn build(self) -> Result<BurstBuffer, BurstBufferError> {
        self.config.validate()?;
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger) as Arc<dyn Logger>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let correlation_id: Arc<str> = Arc::from(self.config.correlation_id.as_str());
        let governor = OverflowGovernor::new(
            self.config.thresholds(),
            correlation_id.clone(),
            logger.clone(),
            clock,
        );
        Ok(BurstBuffer {
            state: BufferState::new(),
            governor,
            pump: DownstreamPump::new(),
            logger,
            correlation_id,
            max_buffer_size: self.config.max_buffer_size,
            metrics: BufferMetrics::default(),
            pending_writer_error: None,
            destroyed: false,
        })
    }
}
