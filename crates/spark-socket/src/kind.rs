use crate::error::SocketError;
use socket2::{Domain, Type};
use std::fmt;

/// 传输类型：决定描述符的地址族与套接字风格，创建后不可变。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 宿主配置与 Worker 间协议使用整数编码描述监听类型，本枚举把编码收敛为强类型，
///   后续的建连、绑定与监听阶段只需按枚举分派；
/// - 通过 [`TransportKind::domain`] 与 [`TransportKind::socket_type`] 集中维护
///   “类型 → (地址族, 风格)” 映射，避免在多处复写 `match`。
///
/// ## 契约 (What)
/// - 编码：`1=TCP`、`2=UDP`、`3=TCP6`、`4=UDP6`、`5=UnixDgram`、`6=UnixStream`；
/// - [`TryFrom<i32>`] 对其它编码返回 [`SocketError::UnsupportedTransport`]，且不触发任何系统调用。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Udp,
    Tcp6,
    Udp6,
    UnixDgram,
    UnixStream,
}

impl TransportKind {
    /// 全部受支持的传输类型。
    pub const ALL: [TransportKind; 6] = [
        TransportKind::Tcp,
        TransportKind::Udp,
        TransportKind::Tcp6,
        TransportKind::Udp6,
        TransportKind::UnixDgram,
        TransportKind::UnixStream,
    ];

    /// 返回该类型的整数编码。
    pub const fn code(self) -> i32 {
        match self {
            TransportKind::Tcp => 1,
            TransportKind::Udp => 2,
            TransportKind::Tcp6 => 3,
            TransportKind::Udp6 => 4,
            TransportKind::UnixDgram => 5,
            TransportKind::UnixStream => 6,
        }
    }

    /// 对应的地址族。
    pub fn domain(self) -> Domain {
        match self {
            TransportKind::Tcp | TransportKind::Udp => Domain::IPV4,
            TransportKind::Tcp6 | TransportKind::Udp6 => Domain::IPV6,
            TransportKind::UnixDgram | TransportKind::UnixStream => Domain::UNIX,
        }
    }

    /// 对应的套接字风格。
    pub fn socket_type(self) -> Type {
        if self.is_stream() {
            Type::STREAM
        } else {
            Type::DGRAM
        }
    }

    pub const fn is_stream(self) -> bool {
        matches!(
            self,
            TransportKind::Tcp | TransportKind::Tcp6 | TransportKind::UnixStream
        )
    }

    pub const fn is_datagram(self) -> bool {
        !self.is_stream()
    }

    pub const fn is_unix(self) -> bool {
        matches!(self, TransportKind::UnixDgram | TransportKind::UnixStream)
    }

    pub const fn is_ipv6(self) -> bool {
        matches!(self, TransportKind::Tcp6 | TransportKind::Udp6)
    }

    /// 低基数的文本标签，用于日志与错误信息。
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
            TransportKind::Tcp6 => "tcp6",
            TransportKind::Udp6 => "udp6",
            TransportKind::UnixDgram => "unix-dgram",
            TransportKind::UnixStream => "unix-stream",
        }
    }
}

impl TryFrom<i32> for TransportKind {
    type Error = SocketError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        TransportKind::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(SocketError::UnsupportedTransport { code })
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
