use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// 写队列首次分配时预留的 arena 容量。
pub const ARENA_INITIAL_CAPACITY: usize = 8 * 1024;

/// 写队列中的一个分块：不可变字节区间加写游标。
#[derive(Debug)]
pub struct Chunk {
    data: Bytes,
    cursor: usize,
}

impl Chunk {
    fn new(data: Bytes) -> Self {
        Self { data, cursor: 0 }
    }

    /// 分块总长度。
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 已交给内核的字节数。
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 尚未交给内核的剩余字节。
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    pub fn is_flushed(&self) -> bool {
        self.cursor == self.data.len()
    }

    fn advance(&mut self, n: usize) -> usize {
        let step = n.min(self.data.len() - self.cursor);
        self.cursor += step;
        step
    }
}

/// 写队列的观测快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// 队列中尚未完全冲刷的分块数量。
    pub pending_chunks: usize,
    /// 尚未交给内核的字节数。
    pub pending_bytes: usize,
    /// 生命周期内累计入队的分块数。
    pub enqueued_chunks: u64,
    /// 生命周期内经由队列冲刷出去的字节数。
    pub flushed_bytes: u64,
    /// 直接写遭遇背压、转入排队的次数。
    pub backpressure_events: u64,
}

/// 按到达顺序排列的待发送字节队列（FIFO）。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 内核发送缓冲写满时，调用方已经交出的字节必须无损、保序地暂存，
///   等到写就绪通知再逐块冲刷；
/// - 分块从每个套接字独享的 `BytesMut` arena 切出：arena 只在首次背压时分配，
///   之后的背压周期复用同一块内存，热路径上不为每个分块单独向分配器申请。
///
/// ## 逻辑 (How)
/// - [`WriteQueue::push`] 把字节追加进 arena，再用 `split().freeze()` 切出只读 [`Bytes`]；
///   当之前切出的分块全部冲刷并释放后，`BytesMut::reserve` 可以回收原有存储；
/// - [`WriteQueue::consume`] 推进队首游标，游标到达末尾时才弹出分块。
///
/// ## 契约 (What)
/// - 分块严格按入队顺序冲刷，不重排、不合并；
/// - `pending_bytes` 始终等于所有分块剩余字节之和。
#[derive(Debug)]
pub struct WriteQueue {
    chunks: VecDeque<Chunk>,
    arena: BytesMut,
    pending_bytes: usize,
    enqueued_chunks: u64,
    flushed_bytes: u64,
    backpressure_events: u64,
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::with_capacity(ARENA_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            arena: BytesMut::with_capacity(capacity),
            pending_bytes: 0,
            enqueued_chunks: 0,
            flushed_bytes: 0,
            backpressure_events: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 队列中的分块数量。
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// 以新分块追加字节；空切片不产生分块。
    pub fn push(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.arena.extend_from_slice(bytes);
        let data = self.arena.split().freeze();
        self.pending_bytes += data.len();
        self.enqueued_chunks += 1;
        self.chunks.push_back(Chunk::new(data));
    }

    pub fn front(&self) -> Option<&Chunk> {
        self.chunks.front()
    }

    /// 记录内核接收了队首的 `n` 个字节；队首冲刷完毕时弹出并返回 `true`。
    pub fn consume(&mut self, n: usize) -> bool {
        let Some(front) = self.chunks.front_mut() else {
            return false;
        };
        let step = front.advance(n);
        self.pending_bytes -= step;
        self.flushed_bytes += step as u64;
        if front.is_flushed() {
            self.chunks.pop_front();
            true
        } else {
            false
        }
    }

    /// 按顺序遍历分块。
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub(crate) fn note_backpressure(&mut self) {
        self.backpressure_events += 1;
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending_chunks: self.chunks.len(),
            pending_bytes: self.pending_bytes,
            enqueued_chunks: self.enqueued_chunks,
            flushed_bytes: self.flushed_bytes,
            backpressure_events: self.backpressure_events,
        }
    }
}
