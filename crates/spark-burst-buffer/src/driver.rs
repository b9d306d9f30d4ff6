//! Tokio 事件循环驱动。
//!
//! # 教案式注释
//!
//! ## 意图 (Why)
//! - [`BurstBuffer`] 本身是单线程、同步的状态机；真实宿主里录制端与写入端往往在不同任务中运行，
//!   写入端的就绪/失败也是异步送达的。驱动把缓冲独占在一个任务里，把所有输入串行化为
//!   “一次逻辑回合”，从而无需任何锁。
//!
//! ## 逻辑 (How)
//! - 录制端持有可克隆的 [`BurstBufferHandle`]，背后是无界 `mpsc`，发送从不等待，所以录制端永不被阻塞；
//! - 写入端持有 [`WriterNotifier`]，投递 [`WriterEvent`]；
//! - `run` 以 `biased` 的 `select!` 优先处理写入端通知，再处理录制端命令。
//!
//! ## 契约 (What)
//! - 写入端失败（通知或同步返回）使任务销毁缓冲并以该错误结束；
//! - 所有句柄被丢弃后，任务做最后一次不等待的冲刷，然后销毁缓冲并正常结束；
//! - 任务结束后，句柄上的 `accept` 静默丢弃，其余请求返回 [`BurstBufferError::DriverClosed`]。

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    buffer::{BurstBuffer, FlushOutcome},
    error::{BurstBufferError, WriterError},
    state::Chunk,
    stats::{BufferMetrics, BufferStats},
    writer::{ChunkWriter, WriterEvent},
};

enum Command {
    Accept(Chunk),
    Flush(oneshot::Sender<Result<FlushOutcome, BurstBufferError>>),
    Stats(oneshot::Sender<BufferStats>),
    Metrics(oneshot::Sender<BufferMetrics>),
    Destroy(Option<BurstBufferError>),
}

/// 录制端使用的句柄。
#[derive(Clone, Debug)]
pub struct BurstBufferHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl BurstBufferHandle {
    /// 投递一块数据；永不阻塞，驱动结束后静默丢弃。
    pub fn accept(&self, chunk: impl Into<Chunk>) {
        if self.commands.send(Command::Accept(chunk.into())).is_err() {
            tracing::debug!("buffer driver stopped, chunk dropped");
        }
    }

    /// 请求一次冲刷并等待结果。
    pub async fn flush(&self) -> Result<FlushOutcome, BurstBufferError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Flush(reply))?;
        response.await.map_err(|_| BurstBufferError::DriverClosed)?
    }

    pub async fn stats(&self) -> Result<BufferStats, BurstBufferError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stats(reply))?;
        response.await.map_err(|_| BurstBufferError::DriverClosed)
    }

    pub async fn metrics(&self) -> Result<BufferMetrics, BurstBufferError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Metrics(reply))?;
        response.await.map_err(|_| BurstBufferError::DriverClosed)
    }

    /// 请求销毁缓冲；驱动任务随后以 `cause` 结束。
    pub fn destroy(&self, cause: Option<BurstBufferError>) -> Result<(), BurstBufferError> {
        self.send(Command::Destroy(cause))
    }

    /// 驱动任务是否已经结束。
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), BurstBufferError> {
        self.commands
            .send(command)
            .map_err(|_| BurstBufferError::DriverClosed)
    }
}

/// 写入端用于送达就绪/失败通知的句柄。
#[derive(Clone, Debug)]
pub struct WriterNotifier {
    events: mpsc::UnboundedSender<WriterEvent>,
}

impl WriterNotifier {
    /// 通知缓冲写入端已可继续接收数据。
    pub fn ready(&self) {
        let _ = self.events.send(WriterEvent::Ready);
    }

    /// 通知缓冲写入端发生故障。
    pub fn failed(&self, error: WriterError) {
        let _ = self.events.send(WriterEvent::Failed(error));
    }
}

/// 独占 [`BurstBuffer`] 的事件循环。
pub struct BurstBufferDriver {
    buffer: BurstBuffer,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<WriterEvent>,
    events_tx: mpsc::UnboundedSender<WriterEvent>,
}

impl BurstBufferDriver {
    /// 包装缓冲并返回录制端句柄。
    pub fn new(buffer: BurstBuffer) -> (Self, BurstBufferHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        (
            Self {
                buffer,
                commands,
                events,
                events_tx,
            },
            BurstBufferHandle {
                commands: commands_tx,
            },
        )
    }

    /// 为写入端签发通知句柄。
    pub fn notifier(&self) -> WriterNotifier {
        WriterNotifier {
            events: self.events_tx.clone(),
        }
    }

    /// 在启动前挂载写入端。
    pub fn attach(&mut self, writer: Arc<dyn ChunkWriter>) -> Result<(), BurstBufferError> {
        self.buffer.attach(writer)
    }

    /// 在当前 Tokio 运行时上启动驱动任务。
    pub fn spawn(self) -> JoinHandle<Result<(), BurstBufferError>> {
        tokio::spawn(self.run())
    }

    /// 运行事件循环直至销毁、写入端失败或所有句柄被丢弃。
    pub async fn run(mut self) -> Result<(), BurstBufferError> {
        tracing::debug!(correlation_id = %self.buffer.correlation_id(), "buffer driver started");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => {
                    if let Err(err) = self.buffer.on_writer_event(event) {
                        return self.terminate(err);
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Accept(chunk)) => {
                        self.buffer.accept(chunk);
                        if let Some(err) = self.buffer.take_writer_error() {
                            return self.terminate(err.into());
                        }
                    }
                    Some(Command::Flush(reply)) => match self.buffer.flush() {
                        Ok(outcome) => {
                            let _ = reply.send(Ok(outcome));
                        }
                        Err(err) => {
                            let _ = reply.send(Err(err.clone()));
                            return self.terminate(err);
                        }
                    },
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.buffer.stats());
                    }
                    Some(Command::Metrics(reply)) => {
                        let _ = reply.send(self.buffer.metrics());
                    }
                    Some(Command::Destroy(cause)) => return self.buffer.destroy(cause),
                    None => match self.buffer.flush() {
                        Ok(FlushOutcome::Drained) => return self.buffer.destroy(None),
                        Ok(FlushOutcome::Pending { remaining_bytes }) => {
                            tracing::debug!(
                                correlation_id = %self.buffer.correlation_id(),
                                remaining_bytes,
                                "all handles dropped with data still buffered"
                            );
                            return self.buffer.destroy(None);
                        }
                        Err(err) => return self.terminate(err),
                    },
                },
            }
        }
    }

    fn terminate(&mut self, err: BurstBufferError) -> Result<(), BurstBufferError> {
        self.buffer.destroy(Some(err))
    }
}
