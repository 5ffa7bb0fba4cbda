use crate::{
    config::SocketConfig,
    error::{Result, SocketError},
    interest::Interest,
    wait::{Readiness, wait},
};
use std::{
    fs::File,
    io,
    os::fd::{AsFd, AsRawFd, BorrowedFd},
    path::Path,
    time::Duration,
};
use tracing::{debug, warn};

/// 同步文件发送的节拍与发送原语。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 把“等待可写”和“发送一个分块”两个内核交互点抽象出来，发送循环本身
///   （分块、偏移推进、失败中止）可以在不依赖真实套接字的情况下验证调用次数；
///
/// ## 契约 (What)
/// - `wait_writable`：阻塞至可写或超时，`None` 表示无限等待；
/// - `send_chunk`：从 `file` 的 `offset` 处最多发送 `len` 字节，返回实际发送量；
///   不得修改文件游标（使用带偏移的读取/`sendfile`）。
pub trait ChunkSender {
    fn wait_writable(&mut self, timeout: Option<Duration>) -> Result<Readiness>;

    fn send_chunk(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize>;
}

/// 以内核为后端的 [`ChunkSender`]：`poll(2)` 等待，Linux 上 `sendfile(2)` 零拷贝发送。
#[derive(Debug)]
pub struct SocketSender<'a> {
    fd: BorrowedFd<'a>,
}

impl<'a> SocketSender<'a> {
    pub fn new<F: AsFd + ?Sized>(socket: &'a F) -> Self {
        Self {
            fd: socket.as_fd(),
        }
    }
}

impl ChunkSender for SocketSender<'_> {
    fn wait_writable(&mut self, timeout: Option<Duration>) -> Result<Readiness> {
        wait(&self.fd, timeout, Interest::WRITABLE)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn send_chunk(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize> {
        use nix::{errno::Errno, libc};

        let mut off = libc::off_t::try_from(offset)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        // SAFETY: 两个描述符在调用期间均由借用保证有效，`off` 指向栈上变量。
        let ret = unsafe { libc::sendfile(self.fd.as_raw_fd(), file.as_raw_fd(), &mut off, len) };
        if ret < 0 {
            return Err(io::Error::from(Errno::last()));
        }
        Ok(ret as usize)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn send_chunk(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize> {
        use nix::sys::socket::{MsgFlags, send};
        use std::os::unix::fs::FileExt;

        let mut buf = vec![0u8; len];
        let read = file.read_at(&mut buf, offset)?;
        if read == 0 {
            return Ok(0);
        }
        Ok(send(self.fd.as_raw_fd(), &buf[..read], MsgFlags::empty())?)
    }
}

/// 以默认分块大小把整个文件同步发送到阻塞或非阻塞的流式套接字。
pub fn send_file<F, P>(socket: &F, path: P, timeout: Option<Duration>) -> Result<()>
where
    F: AsFd + ?Sized,
    P: AsRef<Path>,
{
    send_file_with_config(socket, path, timeout, &SocketConfig::new())
}

/// 按配置中的分块大小发送文件。
pub fn send_file_with_config<F, P>(
    socket: &F,
    path: P,
    timeout: Option<Duration>,
    config: &SocketConfig,
) -> Result<()>
where
    F: AsFd + ?Sized,
    P: AsRef<Path>,
{
    send_file_with(
        &mut SocketSender::new(socket),
        path,
        timeout,
        config.sendfile_chunk_size(),
    )
}

/// 发送循环本体。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// 1. 只读打开文件并读取长度，失败分别映射为 [`SocketError::Open`] / [`SocketError::Stat`]；
/// 2. 在 `offset < size` 时：等待可写（超时映射为 [`SocketError::Timeout`]），
///    发送 `min(chunk_size, size - offset)` 字节并推进偏移；
/// 3. 被中断的发送立即重试；`EWOULDBLOCK` 回到等待步骤；
///    返回 0 或其它失败映射为 [`SocketError::Send`] 并中止。
///
/// ## 契约 (What)
/// - 理想情况下（每次都发满一个分块）发送次数为 `ceil(size / chunk_size)`；
/// - 失败时不报告已发送的字节数，调用方应关闭连接；
/// - `chunk_size` 为 0 时按 1 处理。
pub fn send_file_with<S, P>(
    sender: &mut S,
    path: P,
    timeout: Option<Duration>,
    chunk_size: usize,
) -> Result<()>
where
    S: ChunkSender + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SocketError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file
        .metadata()
        .map_err(|source| SocketError::Stat {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    let chunk_size = chunk_size.max(1);

    let mut offset = 0u64;
    while offset < size {
        if !sender.wait_writable(timeout)?.is_ready() {
            return Err(SocketError::Timeout { timeout });
        }
        let len = usize::try_from(size - offset).map_or(chunk_size, |rest| rest.min(chunk_size));
        loop {
            match sender.send_chunk(&file, offset, len) {
                Ok(0) => {
                    warn!(path = %path.display(), offset, "sendfile() made no progress");
                    return Err(SocketError::Send {
                        offset,
                        source: io::Error::from(io::ErrorKind::WriteZero),
                    });
                }
                Ok(sent) => {
                    offset += sent as u64;
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(source) => {
                    warn!(path = %path.display(), offset, error = %source, "sendfile() failed");
                    return Err(SocketError::Send { offset, source });
                }
            }
        }
    }
    debug!(path = %path.display(), bytes = size, "file sent");
    Ok(())
}
