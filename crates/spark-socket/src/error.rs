use crate::{interest::Interest, kind::TransportKind};
use std::{io, os::fd::RawFd, path::PathBuf, time::Duration};
use thiserror::Error;

/// 套接字层统一的返回类型。
pub type Result<T, E = SocketError> = std::result::Result<T, E>;

/// 非阻塞套接字层的错误域。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 将“建连 → 绑定 → 监听 → 就绪等待 → 发送/写入”各阶段的失败归档为稳定枚举，
///   让调用方可以按变体决定是否重试、关闭描述符或上报告警；
/// - 所有内核失败都保留原始 [`io::Error`] 作为 `source`，系统错误码不丢失。
///
/// ## 契约 (What)
/// - 瞬态条件（`EINTR`、`EWOULDBLOCK`）在内部被吸收，**不会**出现在本枚举中；
/// - [`SocketError::Timeout`] 仅在调用方把就绪超时视为致命时出现（例如同步文件发送），
///   就绪等待本身以 [`Readiness::Timeout`](crate::Readiness::Timeout) 表达超时；
/// - [`SocketError::code`] 返回形如 `spark.socket.*` 的稳定错误码，可直接作为指标或日志维度。
///
/// ## 注意事项 (Trade-offs)
/// - `Bind` 携带 `String` 形式的主机名，牺牲一次分配换取可读的排障上下文；
/// - 枚举标记为 `#[non_exhaustive]`，新增失败路径不会破坏下游的穷尽匹配。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SocketError {
    /// 原始传输类型编码无法识别，调用方错误，不应重试。
    #[error("unsupported transport kind code {code}")]
    UnsupportedTransport { code: i32 },

    /// 内核创建描述符失败（资源耗尽、权限不足等）。
    #[error("create {kind} socket failed: {source}")]
    Resource {
        kind: TransportKind,
        #[source]
        source: io::Error,
    },

    /// 地址解析或 `bind` 失败。
    #[error("bind({host}:{port}) failed: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// 流式套接字进入监听状态失败。
    #[error("listen({backlog}) failed: {source}")]
    Listen {
        backlog: i32,
        #[source]
        source: io::Error,
    },

    /// 必要的套接字选项无法落地（例如非阻塞标志）。
    #[error("configure {option} failed: {source}")]
    Configure {
        option: &'static str,
        #[source]
        source: io::Error,
    },

    /// `poll()` 返回了中断以外的失败。
    #[error("poll() failed: {source}")]
    Wait {
        #[source]
        source: io::Error,
    },

    /// 在截止时间内未等到写就绪。
    #[error("socket not writable within {timeout:?}")]
    Timeout { timeout: Option<Duration> },

    /// 待发送文件无法以只读方式打开。
    #[error("open({}) failed: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 无法读取待发送文件的元数据。
    #[error("fstat({}) failed: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 同步文件发送在 `offset` 处失败，传输已中止。
    #[error("sendfile() failed at offset {offset}: {source}")]
    Send {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// 异步写路径遇到 `EWOULDBLOCK` 以外的内核失败。
    #[error("write(fd {fd}) failed: {source}")]
    Write {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    /// 反应器拒绝登记写兴趣；数据仍保留在写队列中。
    #[error("register {interest} for fd {fd} failed: {source}")]
    Register {
        fd: RawFd,
        interest: Interest,
        #[source]
        source: io::Error,
    },

    /// 对未登记到反应器的描述符发起异步写，属于编程错误。
    #[error("fd {fd} is not registered with the reactor")]
    UnknownSocket { fd: RawFd },
}

impl SocketError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            SocketError::UnsupportedTransport { .. } => "spark.socket.unsupported_transport",
            SocketError::Resource { .. } => "spark.socket.create_failed",
            SocketError::Bind { .. } => "spark.socket.bind_failed",
            SocketError::Listen { .. } => "spark.socket.listen_failed",
            SocketError::Configure { .. } => "spark.socket.configure_failed",
            SocketError::Wait { .. } => "spark.socket.wait_failed",
            SocketError::Timeout { .. } => "spark.socket.timeout",
            SocketError::Open { .. } => "spark.socket.open_failed",
            SocketError::Stat { .. } => "spark.socket.stat_failed",
            SocketError::Send { .. } => "spark.socket.send_failed",
            SocketError::Write { .. } => "spark.socket.write_failed",
            SocketError::Register { .. } => "spark.socket.register_failed",
            SocketError::UnknownSocket { .. } => "spark.socket.unknown_socket",
        }
    }

    /// 取出底层系统错误码（若存在）。
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            SocketError::Resource { source, .. }
            | SocketError::Bind { source, .. }
            | SocketError::Listen { source, .. }
            | SocketError::Configure { source, .. }
            | SocketError::Wait { source }
            | SocketError::Open { source, .. }
            | SocketError::Stat { source, .. }
            | SocketError::Send { source, .. }
            | SocketError::Write { source, .. }
            | SocketError::Register { source, .. } => source.raw_os_error(),
            SocketError::UnsupportedTransport { .. }
            | SocketError::Timeout { .. }
            | SocketError::UnknownSocket { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_namespaced() {
        let errors = [
            SocketError::UnsupportedTransport { code: 42 },
            SocketError::Timeout { timeout: None },
            SocketError::UnknownSocket { fd: 7 },
            SocketError::Listen {
                backlog: 16,
                source: io::Error::from_raw_os_error(98),
            },
        ];
        for err in &errors {
            assert!(err.code().starts_with("spark.socket."), "{}", err.code());
        }
    }

    #[test]
    fn bind_error_keeps_context_and_errno() {
        let err = SocketError::Bind {
            host: "127.0.0.1".to_owned(),
            port: 9501,
            source: io::Error::from_raw_os_error(98),
        };
        assert!(err.to_string().starts_with("bind(127.0.0.1:9501) failed"));
        assert_eq!(err.raw_os_error(), Some(98));
        assert_eq!(SocketError::UnknownSocket { fd: 3 }.raw_os_error(), None);
    }
}
