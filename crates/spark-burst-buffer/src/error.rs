//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义缓冲对外可见的错误语义。软告警（水位越线）与有损降级（淘汰最旧数据）只写日志、
//!   从不以错误形式逃逸；真正会冒泡的只有写入端失败、配置非法以及生命周期误用。
//!
//! ## 设计要求（What）
//! - 所有错误均派生 `thiserror::Error`，并实现 `Clone`，以便 Tokio 驱动层既能把错误回复给 `flush`
//!   调用方，又能作为任务的终止原因返回；
//! - [`WriterError`] 原样透传，不做包装改写，重连与恢复由外部调用方负责。

use std::{io, sync::Arc};

use thiserror::Error;

/// 下游写入端报告的失败。
#[derive(Clone, Debug, Error)]
pub enum WriterError {
    /// 底层 I/O 失败，例如磁盘写满或文件句柄失效。
    #[error("writer I/O failure: {0}")]
    Io(#[source] Arc<io::Error>),

    /// 写入端已被外部关闭。
    #[error("writer is closed")]
    Closed,

    /// 写入端拒绝了数据，`reason` 为写入端提供的描述。
    #[error("writer rejected chunk: {reason}")]
    Rejected { reason: String },
}

impl From<io::Error> for WriterError {
    fn from(value: io::Error) -> Self {
        WriterError::Io(Arc::new(value))
    }
}

/// 构造配置校验失败。
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// 缓冲上限必须为正数。
    #[error("max_buffer_size must be greater than zero")]
    ZeroCapacity,

    /// 告警阈值必须是 `[0, 100]` 内的有限百分比。
    #[error("warning_threshold must be a percentage within [0, 100], got {value}")]
    ThresholdOutOfRange { value: f64 },

    /// TOML 文本无法解析为配置。
    #[error("failed to parse buffer configuration: {message}")]
    Parse { message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parse {
            message: value.to_string(),
        }
    }
}

/// 缓冲组件级错误。
///
/// # 教案式说明
/// - **意图 (Why)**：对上游只暴露“会让当前实例失效”的失败；溢出、淘汰等状况由内部日志消化。
/// - **契约 (What)**：`Writer` 变体为透明包装，`Display` 与 `source` 均直接来自写入端错误。
#[derive(Clone, Debug, Error)]
pub enum BurstBufferError {
    /// 写入端失败，对本实例是致命的；不会进行内部重试。
    #[error(transparent)]
    Writer(#[from] WriterError),

    /// 构造配置非法。
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 当前写入端链接仍然有效，禁止重复挂载。
    #[error("a writer is already attached to this buffer")]
    WriterAlreadyAttached,

    /// 缓冲已被销毁，无法再挂载写入端。
    #[error("buffer has been destroyed")]
    Destroyed,

    /// Tokio 驱动任务已经结束，句柄上的请求无法送达。
    #[error("buffer driver is no longer running")]
    DriverClosed,

    /// 调用方在销毁时主动提供的终止原因。
    #[error("buffer terminated: {reason}")]
    Terminated { reason: String },
}

impl BurstBufferError {
    /// 构造一个带描述的终止原因，便于 `destroy(Some(..))` 调用点直接使用。
    pub fn terminated(reason: impl Into<String>) -> Self {
        BurstBufferError::Terminated {
            reason: reason.into(),
        }
    }
}
