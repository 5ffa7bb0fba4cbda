use crate::{
    error::{Result, SocketError},
    interest::Interest,
    queue::WriteQueue,
    reactor::Reactor,
};
use std::{io, os::fd::RawFd};
use tracing::{debug, trace, warn};

/// 一次写就绪回调后的队列状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// 队列已清空，写兴趣已撤销。
    Drained,
    /// 内核缓冲再次写满，保持写兴趣等待下一次通知。
    Pending,
}

/// 向反应器管理的套接字异步写入字节，永不阻塞。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 让协议层可以“写了就走”：能直接交给内核的字节立即写出，写不下的部分无损暂存，
///   由反应器在套接字可写时通过 [`on_writable`] 续写；
/// - 正常路径零分配：内核一次吃下全部字节时既不分配写队列，也不触碰多路复用器。
///
/// ## 逻辑 (How)
/// 1. 通过 [`Reactor::lookup`] 取得套接字，未登记返回 [`SocketError::UnknownSocket`]；
/// 2. 写队列非空时一律排队，直接写会让新字节越过队列中更早的字节；
/// 3. 队列为空时直接写：被中断则重试；全部写出直接返回；`EWOULDBLOCK` 或部分写出时
///    把剩余字节作为一个分块入队；
/// 4. 只要发生入队，就确保写兴趣已登记：已登记可读则 `modify(READABLE | WRITABLE)`，
///    尚未登记则 `add(WRITABLE)`。
///
/// ## 契约 (What)
/// - 空字节切片是无副作用的成功；
/// - 内核的其它失败返回 [`SocketError::Write`]，队列保持原状；
/// - 登记失败返回 [`SocketError::Register`]，字节仍留在队列中，下一次调用会重试登记。
pub fn write_async<R: Reactor + ?Sized>(reactor: &mut R, fd: RawFd, bytes: &[u8]) -> Result<()> {
    let socket = reactor
        .lookup(fd)
        .ok_or(SocketError::UnknownSocket { fd })?;
    if bytes.is_empty() {
        return Ok(());
    }

    if socket.has_pending_writes() {
        socket.queue_mut().push(bytes);
    } else {
        let written = write_direct(socket.io_mut(), fd, bytes)?;
        if written == bytes.len() {
            return Ok(());
        }
        let queue = socket.queue_mut();
        queue.push(&bytes[written..]);
        queue.note_backpressure();
        debug!(
            fd,
            written,
            queued = bytes.len() - written,
            "kernel send buffer full, queueing remainder"
        );
    }

    ensure_write_interest(reactor, fd)
}

/// 写就绪回调：按序冲刷写队列，清空后撤销写兴趣。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// 1. 反复写出队首分块的剩余字节：`EWOULDBLOCK` 返回 [`FlushOutcome::Pending`]（保持登记），
///    被中断则重试，其它失败返回 [`SocketError::Write`]，成功时推进游标并弹出写完的分块；
/// 2. 队列清空后从兴趣集合中移除 WRITABLE：仍有可读兴趣则 `modify(READABLE)`，否则 `remove`。
///
/// ## 契约 (What)
/// - 撤销只发生一次：兴趣集合中已经没有 WRITABLE 的套接字不会再触发任何登记调用；
/// - 撤销失败仅记录告警，兴趣集合照常更新，返回值仍为 [`FlushOutcome::Drained`]。
pub fn on_writable<R: Reactor + ?Sized>(reactor: &mut R, fd: RawFd) -> Result<FlushOutcome> {
    let socket = reactor
        .lookup(fd)
        .ok_or(SocketError::UnknownSocket { fd })?;
    let (io, queue) = socket.split_mut();
    if let Some(queue) = queue {
        if flush(io, queue, fd)? == FlushOutcome::Pending {
            return Ok(FlushOutcome::Pending);
        }
    }

    let current = socket.interest();
    if !current.is_writable() {
        return Ok(FlushOutcome::Drained);
    }
    let target = current.remove(Interest::WRITABLE);
    socket.set_interest(target);
    let downgraded = if target.is_empty() {
        reactor.remove(fd)
    } else {
        reactor.modify(fd, target)
    };
    match downgraded {
        Ok(()) => debug!(fd, interest = %target, "write queue drained, write interest dropped"),
        Err(err) => warn!(fd, error = %err, "failed to deregister write interest"),
    }
    Ok(FlushOutcome::Drained)
}

/// 直接写，返回内核接收的字节数；遇到 `EWOULDBLOCK` 时提前返回。
fn write_direct<W: io::Write + ?Sized>(io: &mut W, fd: RawFd, bytes: &[u8]) -> Result<usize> {
    let mut written = 0;
    while written < bytes.len() {
        match io.write(&bytes[written..]) {
            Ok(0) => {
                return Err(SocketError::Write {
                    fd,
                    source: io::Error::from(io::ErrorKind::WriteZero),
                });
            }
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(source) => return Err(SocketError::Write { fd, source }),
        }
    }
    Ok(written)
}

fn flush<W: io::Write + ?Sized>(
    io: &mut W,
    queue: &mut WriteQueue,
    fd: RawFd,
) -> Result<FlushOutcome> {
    while let Some(chunk) = queue.front() {
        match io.write(chunk.remaining()) {
            Ok(0) => {
                return Err(SocketError::Write {
                    fd,
                    source: io::Error::from(io::ErrorKind::WriteZero),
                });
            }
            Ok(n) => {
                queue.consume(n);
                trace!(
                    fd,
                    flushed = n,
                    pending_bytes = queue.pending_bytes(),
                    "flushed queued bytes"
                );
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                return Ok(FlushOutcome::Pending);
            }
            Err(source) => return Err(SocketError::Write { fd, source }),
        }
    }
    Ok(FlushOutcome::Drained)
}

fn ensure_write_interest<R: Reactor + ?Sized>(reactor: &mut R, fd: RawFd) -> Result<()> {
    let current = reactor
        .lookup(fd)
        .ok_or(SocketError::UnknownSocket { fd })?
        .interest();
    if current.is_writable() {
        return Ok(());
    }
    let target = current | Interest::WRITABLE;
    let registered = if current.is_empty() {
        reactor.add(fd, target)
    } else {
        reactor.modify(fd, target)
    };
    registered.map_err(|source| SocketError::Register {
        fd,
        interest: target,
        source,
    })?;
    if let Some(socket) = reactor.lookup(fd) {
        socket.set_interest(target);
    }
    debug!(fd, interest = %target, "write interest registered");
    Ok(())
}
