//! `spark-burst-buffer` 提供连续录制流水线中的突发写入缓冲。
//!
//! # 模块定位（Why）
//! - 录制端（音视频采集、遥测采样）以固定节奏产出数据块，持久化写入端（磁盘、对象存储、编码器）
//!   偶尔会变慢；本 crate 在两者之间吸收速率差，录制端永不被阻塞，内存占用也始终有上限。
//! - 长时间运行时宁可有损地丢弃最旧数据，也不让进程因内存耗尽而崩溃。
//!
//! # 设计概要（How）
//! - `state`：按到达顺序保存数据块并维护字节总量；
//! - `governor`：水位告警（带迟滞）、溢出节流日志与整块淘汰；
//! - `pump`：以三态状态机把缓冲排空到 [`ChunkWriter`]，尊重写入端背压；
//! - `buffer`：组合以上部件，对外暴露 `accept`/`attach`/`flush`/`destroy` 等入口；
//! - `stats`：利用率快照与累计计数；
//! - `driver`（`runtime-tokio` 特性）：把缓冲独占在 Tokio 任务中，以通道串行化录制端与写入端输入。
//!
//! # 契约边界（What）
//! - 核心类型全部同步、单线程协作，所有状态迁移需要 `&mut self`；
//! - 日志与时钟以 trait 注入，默认实现分别为 [`TracingLogger`] 与 [`SystemClock`]；
//! - 只有写入端失败会以错误形式离开组件，溢出与淘汰仅产生日志。

pub mod buffer;
pub mod clock;
pub mod config;
#[cfg(feature = "runtime-tokio")]
pub mod driver;
pub mod error;
pub mod governor;
pub mod logging;
pub mod pump;
pub mod state;
pub mod stats;
pub mod writer;

pub use buffer::{BurstBuffer, BurstBufferBuilder, FlushOutcome};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::BufferConfig;
#[cfg(feature = "runtime-tokio")]
pub use driver::{BurstBufferDriver, BurstBufferHandle, WriterNotifier};
pub use error::{BurstBufferError, ConfigError, WriterError};
pub use governor::{EvictionReport, OverflowGovernor, Thresholds, WarnState};
pub use logging::{LogRecord, LogSeverity, Logger, TracingLogger, format_bytes};
pub use pump::{DownstreamPump, DrainOutcome, DrainReport, PumpState};
pub use state::{BufferState, Chunk};
pub use stats::{BufferMetrics, BufferStats};
pub use writer::{ChunkWriter, WriteSignal, WriterEvent};
