use crate::{interest::Interest, kind::TransportKind, queue::WriteQueue};
use std::{
    collections::HashMap,
    io,
    os::fd::{AsRawFd, RawFd},
};
use tracing::{debug, warn};

/// 反应器视角下的一个存活套接字：描述符、传输类型、已登记兴趣与可选写队列。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 把“内核端点 + 引擎侧元数据”绑成一个所有权单元：套接字关闭时写队列随之释放，
///   不存在脱离套接字独立存活的队列；
/// - 端点类型 `S` 只要求 [`io::Write`]，生产环境使用 [`socket2::Socket`]，测试可以替换为
///   按脚本返回 `WouldBlock` 的桩实现。
///
/// ## 契约 (What)
/// - `fd` 与 `kind` 在构造时固定，之后不可变；
/// - `interest` 记录当前已在多路复用器上登记的兴趣，只有异步写子系统在套接字已登记时修改它；
/// - `pending` 在首次背压前为 `None`，分配后在套接字整个生命周期内复用。
///
/// ## 注意事项 (Trade-offs)
/// - 端点必须已处于非阻塞模式，否则直接写会阻塞反应器线程。
#[derive(Debug)]
pub struct Socket<S = socket2::Socket> {
    io: S,
    fd: RawFd,
    kind: TransportKind,
    interest: Interest,
    pending: Option<WriteQueue>,
}

impl<S: AsRawFd> Socket<S> {
    pub fn new(io: S, kind: TransportKind) -> Self {
        let fd = io.as_raw_fd();
        Self {
            io,
            fd,
            kind,
            interest: Interest::NONE,
            pending: None,
        }
    }
}

impl<S> Socket<S> {
    /// 预置登记兴趣，通常由连接管理器在插入表前设置为 [`Interest::READABLE`]。
    pub fn with_interest(mut self, interest: Interest) -> Self {
        self.interest = interest;
        self
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// 写队列（首次背压前为 `None`）。
    pub fn pending_writes(&self) -> Option<&WriteQueue> {
        self.pending.as_ref()
    }

    /// 是否存在尚未交给内核的字节。
    pub fn has_pending_writes(&self) -> bool {
        self.pending.as_ref().is_some_and(|queue| !queue.is_empty())
    }

    pub fn io(&self) -> &S {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut S {
        &mut self.io
    }

    pub fn into_inner(self) -> S {
        self.io
    }

    pub(crate) fn set_interest(&mut self, interest: Interest) {
        self.interest = interest;
    }

    /// 返回写队列，不存在时按需分配。
    pub(crate) fn queue_mut(&mut self) -> &mut WriteQueue {
        let fd = self.fd;
        self.pending.get_or_insert_with(|| {
            debug!(fd, "allocating pending write queue");
            WriteQueue::new()
        })
    }

    pub(crate) fn split_mut(&mut self) -> (&mut S, Option<&mut WriteQueue>) {
        (&mut self.io, self.pending.as_mut())
    }
}

/// 套接字层对反应器的最小依赖。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 反应器以显式句柄传入每一次异步写调用，不存在进程级单例；同一进程可以并存多个
///   互不干扰的反应器（测试、分片部署）；
/// - 描述符表只通过 `lookup` 暴露，异步写子系统不做任何指针运算或越界访问。
///
/// ## 契约 (What)
/// - `lookup`：返回已登记描述符对应的 [`Socket`]，未登记时返回 `None`；
/// - `add`：首次登记兴趣；
/// - `modify`：修改已登记描述符的兴趣；
/// - `remove`：完全注销描述符；
/// - **前置条件**：同一描述符的 `write_async` 与 `on_writable` 只在反应器所属线程上串行执行，
///   `&mut self` 接收者让编译器强制这一点。
pub trait Reactor {
    type Io: io::Write;

    fn lookup(&mut self, fd: RawFd) -> Option<&mut Socket<Self::Io>>;

    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    fn modify(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    fn remove(&mut self, fd: RawFd) -> io::Result<()>;
}

/// 多路复用器的兴趣登记原语（epoll/kqueue 等由宿主实现）。
pub trait Multiplexer {
    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    fn modify(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    fn remove(&mut self, fd: RawFd) -> io::Result<()>;
}

/// 以描述符为键的套接字表，在任意 [`Multiplexer`] 之上实现 [`Reactor`]。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 反应器作者只需提供内核登记原语，描述符表的生命周期管理由本结构统一完成；
/// - 一个表对应一个单线程反应器，多线程部署按描述符分片到多个表。
///
/// ## 契约 (What)
/// - `insert`：接管套接字所有权；若套接字预置了非空兴趣则立即 `add` 登记；
/// - `close`：移出套接字并注销仍然存活的兴趣，写队列随返回的套接字一起释放；
///   注销失败只记录告警，因为描述符即将被关闭。
#[derive(Debug)]
pub struct SocketTable<M, S = socket2::Socket> {
    sockets: HashMap<RawFd, Socket<S>>,
    mux: M,
}

impl<M: Multiplexer, S> SocketTable<M, S> {
    pub fn new(mux: M) -> Self {
        Self {
            sockets: HashMap::new(),
            mux,
        }
    }

    /// 插入套接字并按其预置兴趣登记，返回描述符。
    pub fn insert(&mut self, socket: Socket<S>) -> io::Result<RawFd> {
        let fd = socket.fd();
        if self.sockets.contains_key(&fd) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("fd {fd} is already tracked"),
            ));
        }
        if !socket.interest().is_empty() {
            self.mux.add(fd, socket.interest())?;
        }
        self.sockets.insert(fd, socket);
        Ok(fd)
    }

    pub fn get(&self, fd: RawFd) -> Option<&Socket<S>> {
        self.sockets.get(&fd)
    }

    /// 移出套接字，注销仍登记的兴趣。
    pub fn close(&mut self, fd: RawFd) -> Option<Socket<S>> {
        let socket = self.sockets.remove(&fd)?;
        if !socket.interest().is_empty() {
            if let Err(err) = self.mux.remove(fd) {
                warn!(fd, error = %err, "failed to deregister closing socket");
            }
        }
        if let Some(queue) = socket.pending_writes().filter(|queue| !queue.is_empty()) {
            debug!(
                fd,
                pending_bytes = queue.pending_bytes(),
                "closing socket with unflushed writes"
            );
        }
        Some(socket)
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn multiplexer(&self) -> &M {
        &self.mux
    }

    pub fn multiplexer_mut(&mut self) -> &mut M {
        &mut self.mux
    }
}

impl<M: Multiplexer, S: io::Write> Reactor for SocketTable<M, S> {
    type Io = S;

    fn lookup(&mut self, fd: RawFd) -> Option<&mut Socket<S>> {
        self.sockets.get_mut(&fd)
    }

    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.mux.add(fd, interest)
    }

    fn modify(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.mux.modify(fd, interest)
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        self.mux.remove(fd)
    }
}
