use crate::{
    error::{Result, SocketError},
    kind::TransportKind,
};
use socket2::Socket;

/// 按传输类型创建描述符。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - 成功返回拥有所有权的 [`socket2::Socket`]，`Drop` 时关闭描述符；
/// - 内核失败映射为 [`SocketError::Resource`]，保留系统错误码；
/// - 除 `socket(2)` 外没有其它副作用：不设置选项、不绑定、不修改阻塞模式。
pub fn create(kind: TransportKind) -> Result<Socket> {
    Socket::new(kind.domain(), kind.socket_type(), None)
        .map_err(|source| SocketError::Resource { kind, source })
}

/// 按整数编码创建描述符；无法识别的编码在任何系统调用之前被拒绝。
pub fn create_raw(code: i32) -> Result<Socket> {
    create(TransportKind::try_from(code)?)
}
