use crate::{
    config::SocketConfig,
    error::{Result, SocketError},
    factory,
    kind::TransportKind,
};
use socket2::{SockAddr, Socket};
use std::{
    fs, io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tracing::{debug, warn};

/// 创建、绑定并（对流式类型）开始监听。
///
/// 等价于以默认配置并覆盖 `backlog` 调用 [`listen_with_config`]。
pub fn listen(kind: TransportKind, host: &str, port: u16, backlog: i32) -> Result<Socket> {
    listen_with_config(
        kind,
        host,
        port,
        &SocketConfig::new().with_backlog(backlog),
    )
}

/// 按配置创建监听端点。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 服务端启动时“建连 → 复用 → 绑定 → 监听 → 非阻塞”的固定序列集中在一处，
///   各协议不必重复处理地址族差异与 Unix 套接字的残留路径。
///
/// ## 逻辑 (How)
/// 1. 通过 [`factory::create`] 取得描述符；
/// 2. 按配置尝试 `SO_REUSEADDR`，失败只记录告警；
/// 3. Unix 类型先删除 `host` 路径上的残留文件（不存在视为正常），再绑定到该路径；
///    IPv6/IPv4 类型把 `host` 解析为对应地址族的字面量后绑定 `(host, port)`；
/// 4. 数据报类型到此返回，保持阻塞模式且不调用 `listen`；
/// 5. 流式类型调用 `listen(backlog)` 并切换为非阻塞。
///
/// ## 契约 (What)
/// - 地址解析失败与 `bind` 失败都映射为 [`SocketError::Bind`]；
/// - `listen` 失败映射为 [`SocketError::Listen`]，非阻塞标志设置失败映射为
///   [`SocketError::Configure`]；
/// - 任何失败路径上描述符都随 `Socket` 的 `Drop` 关闭，不会泄漏。
///
/// ## 注意事项 (Trade-offs)
/// - `host` 只接受地址字面量，不做 DNS 解析，避免在启动路径上阻塞；
/// - 删除残留路径意味着同一路径上的另一个活跃监听者会被顶替，调用方需自行保证路径独占。
pub fn listen_with_config(
    kind: TransportKind,
    host: &str,
    port: u16,
    config: &SocketConfig,
) -> Result<Socket> {
    let socket = factory::create(kind)?;

    if config.reuse_address() {
        if let Err(err) = socket.set_reuse_address(true) {
            warn!(%kind, error = %err, "failed to enable SO_REUSEADDR");
        }
    }

    let bind_error = |source: io::Error| SocketError::Bind {
        host: host.to_owned(),
        port,
        source,
    };
    let address = bind_address(kind, host, port).map_err(bind_error)?;
    socket.bind(&address).map_err(bind_error)?;

    if kind.is_datagram() {
        debug!(%kind, host, port, "datagram socket bound");
        return Ok(socket);
    }

    let backlog = config.backlog();
    socket
        .listen(backlog)
        .map_err(|source| SocketError::Listen { backlog, source })?;
    socket
        .set_nonblocking(true)
        .map_err(|source| SocketError::Configure {
            option: "O_NONBLOCK",
            source,
        })?;
    debug!(%kind, host, port, backlog, "listening");
    Ok(socket)
}

fn bind_address(kind: TransportKind, host: &str, port: u16) -> io::Result<SockAddr> {
    if kind.is_unix() {
        remove_stale_path(host);
        return SockAddr::unix(host);
    }
    let ip: std::result::Result<IpAddr, _> = if kind.is_ipv6() {
        host.parse::<Ipv6Addr>().map(Into::into)
    } else {
        host.parse::<Ipv4Addr>().map(Into::into)
    };
    let ip = ip.map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    Ok(SocketAddr::new(ip, port).into())
}

fn remove_stale_path(path: &str) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path, "removed stale unix socket path"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path, error = %err, "failed to remove stale unix socket path"),
    }
}
