use crate::config::SocketConfig;
use nix::{
    errno::Errno,
    sys::socket::{MsgFlags, recv},
};
use std::os::fd::AsRawFd;
use tracing::trace;

/// 以非阻塞方式丢弃描述符上所有已到达的入站数据。
///
/// 循环 `recv(MSG_DONTWAIT)` 直到内核报告无数据、对端关闭或任何错误；错误一律吞掉。
/// 被中断的接收会重试。`scratch` 为空时立即返回。丢弃的字节数以 `trace` 级别记录。
pub fn drain<F: AsRawFd + ?Sized>(fd: &F, scratch: &mut [u8]) {
    if scratch.is_empty() {
        return;
    }
    let fd = fd.as_raw_fd();
    let mut discarded = 0usize;
    loop {
        match recv(fd, scratch, MsgFlags::MSG_DONTWAIT) {
            Ok(0) => break,
            Ok(n) => discarded += n,
            Err(Errno::EINTR) => {}
            Err(_) => break,
        }
    }
    trace!(fd, discarded, "drained inbound bytes");
}

/// 按配置分配临时缓冲后调用 [`drain`]。
pub fn drain_with_config<F: AsRawFd + ?Sized>(fd: &F, config: &SocketConfig) {
    let mut scratch = vec![0u8; config.drain_buffer_size()];
    drain(fd, &mut scratch);
}
