use crate::{
    error::{Result, SocketError},
    interest::Interest,
};
use nix::{errno::Errno, libc};
use std::{
    io,
    os::fd::{AsRawFd, RawFd},
    time::{Duration, Instant},
};
use tracing::warn;

/// 单描述符就绪等待的结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// 至少一个请求的兴趣已就绪（或内核报告了错误/挂起，留给后续 IO 暴露）。
    Ready,
    /// 截止时间内没有任何事件。
    Timeout,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// 一次 `poll(2)` 调用的抽象。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 中断重试、超时判定等语义与真实的 `poll` 系统调用解耦，测试可以注入脚本化实现，
///   稳定复现 `EINTR` 等难以在真实内核上触发的路径。
///
/// ## 契约 (What)
/// - `events` 为 `POLLIN`/`POLLOUT` 组合，`timeout_ms < 0` 表示无限等待；
/// - 返回就绪描述符数量（`0` 表示超时）；失败时返回携带系统错误码的 [`io::Error`]。
pub trait PollOnce {
    fn poll_once(&mut self, fd: RawFd, events: libc::c_short, timeout_ms: libc::c_int)
    -> io::Result<usize>;
}

/// 基于 `libc::poll` 的默认实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct SysPoll;

impl PollOnce for SysPoll {
    fn poll_once(
        &mut self,
        fd: RawFd,
        events: libc::c_short,
        timeout_ms: libc::c_int,
    ) -> io::Result<usize> {
        let mut pollfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if ret < 0 {
            return Err(io::Error::from(Errno::last()));
        }
        Ok(ret as usize)
    }
}

/// 阻塞等待描述符可读/可写，`timeout = None` 表示无限等待。
pub fn wait<F: AsRawFd + ?Sized>(
    fd: &F,
    timeout: Option<Duration>,
    interest: Interest,
) -> Result<Readiness> {
    wait_with(&mut SysPoll, fd.as_raw_fd(), timeout, interest)
}

/// 使用指定的轮询原语等待就绪。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// 1. 将 [`Interest`] 映射为 `POLLIN`/`POLLOUT`；
/// 2. 调用 [`PollOnce::poll_once`]：`0` 映射为 [`Readiness::Timeout`]，正数映射为
///    [`Readiness::Ready`]；
/// 3. 遇到 `EINTR` 时按剩余时间重新等待，中断本身永远不会暴露给调用方；
/// 4. 其它失败返回 [`SocketError::Wait`]。
///
/// ## 注意事项 (Trade-offs)
/// - 剩余时间按毫秒向上取整，避免亚毫秒的超时退化为非阻塞轮询。
pub fn wait_with<P: PollOnce + ?Sized>(
    poller: &mut P,
    fd: RawFd,
    timeout: Option<Duration>,
    interest: Interest,
) -> Result<Readiness> {
    let events = poll_events(interest);
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    let mut timeout_ms = timeout_to_millis(timeout);
    loop {
        match poller.poll_once(fd, events, timeout_ms) {
            Ok(0) => return Ok(Readiness::Timeout),
            Ok(_) => return Ok(Readiness::Ready),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                if let Some(deadline) = deadline {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    timeout_ms = timeout_to_millis(Some(remaining));
                }
            }
            Err(source) => {
                warn!(fd, error = %source, "poll() failed");
                return Err(SocketError::Wait { source });
            }
        }
    }
}

/// 将以秒计的浮点超时转换为 [`Duration`]；负数或非有限值表示无限等待。
pub fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

fn timeout_to_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(timeout) => {
            let millis = timeout.as_nanos().div_ceil(1_000_000);
            libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
        }
    }
}

fn poll_events(interest: Interest) -> libc::c_short {
    let mut events = 0;
    if interest.is_readable() {
        events |= libc::POLLIN;
    }
    if interest.is_writable() {
        events |= libc::POLLOUT;
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 按脚本返回结果的轮询桩，同时记录每次调用的参数。
    struct ScriptedPoll {
        script: VecDeque<io::Result<usize>>,
        calls: Vec<(libc::c_short, libc::c_int)>,
    }

    impl ScriptedPoll {
        fn new(script: impl IntoIterator<Item = io::Result<usize>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                calls: Vec::new(),
            }
        }
    }

    impl PollOnce for ScriptedPoll {
        fn poll_once(
            &mut self,
            _fd: RawFd,
            events: libc::c_short,
            timeout_ms: libc::c_int,
        ) -> io::Result<usize> {
            self.calls.push((events, timeout_ms));
            self.script.pop_front().expect("脚本耗尽")
        }
    }

    fn interrupted() -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::Interrupted))
    }

    #[test]
    fn interruption_is_retried_until_ready() {
        let mut poll = ScriptedPoll::new([interrupted(), interrupted(), Ok(1)]);
        let readiness = wait_with(&mut poll, 3, None, Interest::WRITABLE).expect("等待成功");
        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(poll.calls.len(), 3);
        assert!(poll.calls.iter().all(|&(events, ms)| events == libc::POLLOUT && ms == -1));
    }

    #[test]
    fn interruption_then_zero_events_is_timeout() {
        let mut poll = ScriptedPoll::new([interrupted(), Ok(0)]);
        let readiness = wait_with(
            &mut poll,
            3,
            Some(Duration::from_millis(50)),
            Interest::READABLE,
        )
        .expect("等待成功");
        assert_eq!(readiness, Readiness::Timeout);
        assert_eq!(poll.calls[0], (libc::POLLIN, 50));
        assert!(poll.calls[1].1 <= 50);
    }

    #[test]
    fn other_failures_surface_with_errno() {
        let mut poll = ScriptedPoll::new([Err(io::Error::from_raw_os_error(libc::EBADF))]);
        let err = wait_with(&mut poll, -1, None, Interest::BOTH).unwrap_err();
        assert!(matches!(err, SocketError::Wait { .. }));
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert_eq!(poll.calls[0].0, libc::POLLIN | libc::POLLOUT);
    }

    #[test]
    fn sub_millisecond_timeout_rounds_up() {
        assert_eq!(timeout_to_millis(Some(Duration::from_micros(10))), 1);
        assert_eq!(timeout_to_millis(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_to_millis(Some(Duration::from_secs(u64::MAX))), libc::c_int::MAX);
    }

    #[test]
    fn negative_seconds_mean_forever() {
        assert_eq!(timeout_from_secs(-1.0), None);
        assert_eq!(timeout_from_secs(f64::NAN), None);
        assert_eq!(timeout_from_secs(1.5), Some(Duration::from_millis(1500)));
    }
}
