//! 下游写入端契约。
//!
//! # 教案式说明
//! - **意图（Why）**：持久化写入端（文件、对象存储、编码器）的实现与生命周期都属于外部协作者，
//!   缓冲只需要“提交一块数据”与“得知能否继续提交”两种能力；就绪与失败以事件形式异步送达。
//! - **契约（What）**：见 [`ChunkWriter::write`]。返回 [`WriteSignal::FlowControlApplied`] 时，
//!   本次提交的块依旧算作已交付，写入端必须自行保留并最终刷出它。

use crate::{error::WriterError, state::Chunk};

/// 写入调用返回的背压信号。
///
/// - `Accepted`：块已被接收，写入端可以立刻接收更多数据；
/// - `FlowControlApplied`：块已被接收，但写入端内部缓冲已满，应等待 [`WriterEvent::Ready`] 再继续提交。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteSignal {
    Accepted,
    FlowControlApplied,
}

impl WriteSignal {
    /// 写入端是否可以立刻接收下一块。
    pub fn is_ready(self) -> bool {
        matches!(self, WriteSignal::Accepted)
    }
}

/// 下游持久化写入端。
///
/// 缓冲只持有共享引用，从不关闭或重新打开写入端；链接在销毁或写入失败时被丢弃。
pub trait ChunkWriter: Send + Sync + 'static {
    /// 提交一块数据。
    ///
    /// # 契约（What）
    /// - 返回 `Ok(_)` 即表示写入端无条件接管了 `chunk`，信号只预测**后续**是否就绪；
    /// - 返回 `Ok(WriteSignal::FlowControlApplied)` 时，缓冲不会重新入队该块，写入端必须保留并最终写出；
    ///   之后写入端需通过 [`WriterEvent::Ready`] 通知缓冲恢复；
    /// - 返回 `Err(_)` 表示该块未被接管，缓冲会把它放回队首，并把错误视为致命错误向上传播。
    fn write(&self, chunk: Chunk) -> Result<WriteSignal, WriterError>;
}

/// 写入端异步送达的通知。
#[derive(Clone, Debug)]
pub enum WriterEvent {
    /// 写入端可以再次接收数据。
    Ready,
    /// 写入端发生故障；链接随之失效。
    Failed(WriterError),
}
