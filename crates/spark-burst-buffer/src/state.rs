use std::collections::VecDeque;

use bytes::Bytes;

/// 一段不可变的录制数据。顺序即身份：块没有独立序号，只由其在缓冲中的位置区分。
pub type Chunk = Bytes;

/// 按到达顺序排列的数据块序列及其字节总量。
///
/// # 契约说明（What）
/// - 队首为最旧的块；
/// - 每次修改后都满足 `total_bytes == Σ chunk.len()`，所有改动都经由本类型的方法完成，
///   调用方无法单独改写计数。
#[derive(Debug, Default)]
pub struct BufferState {
    chunks: VecDeque<Chunk>,
    total_bytes: usize,
}

impl BufferState {
    /// 创建空缓冲。
    pub fn new() -> Self {
        Self::default()
    }

    /// 在队尾追加新块。
    pub fn push_back(&mut self, chunk: Chunk) {
        self.total_bytes += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// 把块放回队首，用于写入端同步失败时归还尚未交付的块。
    pub fn push_front(&mut self, chunk: Chunk) {
        self.total_bytes += chunk.len();
        self.chunks.push_front(chunk);
    }

    /// 取出最旧的块。
    pub fn pop_front(&mut self) -> Option<Chunk> {
        let chunk = self.chunks.pop_front()?;
        self.total_bytes -= chunk.len();
        Some(chunk)
    }

    /// 清空缓冲，返回被释放的字节数。
    pub fn clear(&mut self) -> usize {
        let released = self.total_bytes;
        self.chunks.clear();
        self.total_bytes = 0;
        released
    }

    /// 当前缓存的字节总量。
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// 当前缓存的块数量。
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 按从旧到新的顺序遍历缓存的块。
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(len: usize) -> Chunk {
        Bytes::from(vec![0u8; len])
    }

    #[test]
    fn total_tracks_every_mutation() {
        let mut state = BufferState::new();
        state.push_back(chunk(10));
        state.push_back(chunk(20));
        assert_eq!(state.total_bytes(), 30);

        let oldest = state.pop_front().expect("非空");
        assert_eq!(oldest.len(), 10);
        assert_eq!(state.total_bytes(), 20);

        state.push_front(oldest);
        assert_eq!(state.total_bytes(), 30);
        assert_eq!(state.iter().map(Bytes::len).collect::<Vec<_>>(), vec![10, 20]);

        assert_eq!(state.clear(), 30);
        assert!(state.is_empty());
        assert_eq!(state.total_bytes(), 0);
        assert!(state.pop_front().is_none());
    }

    #[test]
    fn empty_chunks_are_kept_in_order() {
        let mut state = BufferState::new();
        state.push_back(Bytes::new());
        state.push_back(chunk(3));
        assert_eq!(state.len(), 2);
        assert_eq!(state.total_bytes(), 3);
    }
}
