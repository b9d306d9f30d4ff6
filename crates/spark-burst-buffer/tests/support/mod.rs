//! 集成测试共享的探针实现。
//!
//! # 设计动机（Why）
//! - 契约测试需要观察“缓冲输出了哪些日志”与“写入端收到了哪些块”，又不能依赖内部实现细节；
//!   这里提供两个只通过公开 trait 接入的探针。
//!
//! # 行为描述（How）
//! - [`RecordingLogger`]：把每条记录按级别、关联 ID 与正文保存下来；
//! - [`ValveWriter`]：带“放行额度”的写入端。每次写入都会接管数据块，额度耗尽的那一次返回
//!   `FlowControlApplied`，从而让测试精确控制每轮排空交出的块数。

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use spark_burst_buffer::{
    BurstBuffer, Chunk, ChunkWriter, LogRecord, LogSeverity, Logger, WriteSignal, WriterError,
};

/// 捕获到的一条日志。
#[derive(Clone, Debug)]
pub struct CapturedLine {
    pub severity: LogSeverity,
    pub correlation_id: String,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<CapturedLine>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.lock().clone()
    }

    /// 级别为 `severity` 且正文包含 `needle` 的行数。
    pub fn count(&self, severity: LogSeverity, needle: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.severity == severity && line.message.contains(needle))
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.count(LogSeverity::Warn, "")
    }
}

impl Logger for RecordingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        self.lines.lock().push(CapturedLine {
            severity: record.severity,
            correlation_id: record.correlation_id.to_owned(),
            message: record.message.to_string(),
        });
    }
}

/// 带放行额度的写入端。
#[derive(Default)]
pub struct ValveWriter {
    allowance: Mutex<usize>,
    written: Mutex<Vec<Chunk>>,
    failure: Mutex<Option<WriterError>>,
}

impl ValveWriter {
    /// 构造一个初始额度为 `allowance` 的写入端。
    pub fn with_allowance(allowance: usize) -> Arc<Self> {
        let writer = Self::default();
        *writer.allowance.lock() = allowance;
        Arc::new(writer)
    }

    /// 一直就绪的写入端。
    pub fn unlimited() -> Arc<Self> {
        Self::with_allowance(usize::MAX)
    }

    /// 重新设置放行额度。
    pub fn open(&self, allowance: usize) {
        *self.allowance.lock() = allowance;
    }

    /// 让后续写入同步失败。
    pub fn fail_with(&self, error: WriterError) {
        *self.failure.lock() = Some(error);
    }

    pub fn written(&self) -> Vec<Chunk> {
        self.written.lock().clone()
    }

    pub fn written_bytes(&self) -> usize {
        self.written.lock().iter().map(Bytes::len).sum()
    }
}

impl ChunkWriter for ValveWriter {
    fn write(&self, chunk: Chunk) -> Result<WriteSignal, WriterError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.written.lock().push(chunk);
        let mut allowance = self.allowance.lock();
        *allowance = allowance.saturating_sub(1);
        if *allowance == 0 {
            Ok(WriteSignal::FlowControlApplied)
        } else {
            Ok(WriteSignal::Accepted)
        }
    }
}

/// 以 `fill` 填充的 `len` 字节数据块，便于断言顺序。
pub fn chunk(fill: u8, len: usize) -> Bytes {
    Bytes::from(vec![fill; len])
}

/// 以录制日志探针构造缓冲。
pub fn buffer_with(
    max_buffer_size: usize,
    warning_threshold: f64,
    logger: Arc<RecordingLogger>,
) -> BurstBuffer {
    BurstBuffer::builder()
        .max_buffer_size(max_buffer_size)
        .warning_threshold(warning_threshold)
        .correlation_id("contract")
        .logger(logger)
        .build()
        .expect("测试配置合法")
}
