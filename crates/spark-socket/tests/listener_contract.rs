//! `listener_contract` 集成测试：在真实内核套接字上验证监听端点的建立序列。
//!
//! # 测试目标（Why）
//! - 确认 Unix 类型绑定前会清理残留路径，服务重启不会因旧文件而失败；
//! - 确认数据报类型只绑定、不监听、保持阻塞，流式类型则监听并切换非阻塞；
//! - 确认地址解析与端口冲突都归档为 `Bind` 错误。

use spark_socket::{SocketConfig, SocketError, TransportKind, listen, listen_with_config};
use std::{
    fs,
    net::TcpStream,
    os::unix::net::{UnixDatagram, UnixStream},
    path::{Path, PathBuf},
    process,
};

/// 为每个测试准备独立的临时目录，避免并行测试互相删除路径。
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("spark-socket-listener-{}-{name}", process::id()));
    fs::create_dir_all(&dir).expect("创建临时目录");
    dir
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("临时路径应为 UTF-8")
}

#[test]
fn unix_stream_replaces_stale_path() {
    let dir = scratch_dir("stale");
    let path = dir.join("engine.sock");
    fs::write(&path, b"left over from a crashed run").expect("写入残留文件");

    let socket = listen(TransportKind::UnixStream, path_str(&path), 0, 16).expect("监听 Unix 流");
    assert!(socket.nonblocking().expect("读取阻塞模式"));
    UnixStream::connect(&path).expect("客户端应能连上");

    drop(socket);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn unix_datagram_binds_without_listening() {
    let dir = scratch_dir("dgram");
    let path = dir.join("engine.dgram");

    let socket = listen(TransportKind::UnixDgram, path_str(&path), 0, 16).expect("绑定 Unix 数据报");
    assert!(!socket.nonblocking().expect("读取阻塞模式"));

    let server = UnixDatagram::from(socket);
    let client = UnixDatagram::unbound().expect("创建客户端");
    client.send_to(b"ping", &path).expect("发送数据报");
    let mut buf = [0u8; 8];
    let (n, _) = server.recv_from(&mut buf).expect("接收数据报");
    assert_eq!(&buf[..n], b"ping");

    drop(server);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn udp_stays_blocking_and_tcp_listens_nonblocking() {
    let udp = listen(TransportKind::Udp, "127.0.0.1", 0, 16).expect("绑定 UDP");
    assert!(!udp.nonblocking().expect("读取阻塞模式"));
    #[cfg(target_os = "linux")]
    assert!(!udp.is_listener().expect("读取 SO_ACCEPTCONN"));

    let tcp = listen(TransportKind::Tcp, "127.0.0.1", 0, 16).expect("监听 TCP");
    assert!(tcp.nonblocking().expect("读取阻塞模式"));
    #[cfg(target_os = "linux")]
    assert!(tcp.is_listener().expect("读取 SO_ACCEPTCONN"));

    let addr = tcp
        .local_addr()
        .expect("读取本地地址")
        .as_socket()
        .expect("IPv4 地址");
    TcpStream::connect(addr).expect("客户端应能连上");
}

#[test]
fn malformed_host_is_a_bind_error() {
    let err = listen(TransportKind::Tcp, "not-an-address", 9, 16).unwrap_err();
    assert!(matches!(&err, SocketError::Bind { port: 9, host, .. } if host == "not-an-address"));
    assert_eq!(err.code(), "spark.socket.bind_failed");

    let err = listen(TransportKind::Udp, "::1", 9, 16).unwrap_err();
    assert!(matches!(err, SocketError::Bind { .. }));
}

#[test]
fn occupied_port_is_a_bind_error() {
    let first = listen(TransportKind::Tcp, "127.0.0.1", 0, 16).expect("监听 TCP");
    let port = first
        .local_addr()
        .expect("读取本地地址")
        .as_socket()
        .expect("IPv4 地址")
        .port();

    let err = listen(TransportKind::Tcp, "127.0.0.1", port, 16).unwrap_err();
    assert!(matches!(err, SocketError::Bind { .. }));
    assert_eq!(err.raw_os_error(), Some(nix::libc::EADDRINUSE));
}

#[test]
fn config_loaded_from_toml_drives_listen() {
    let config = SocketConfig::from_toml_str("backlog = 4\nreuse_address = false\n").expect("解析配置");
    let socket = listen_with_config(TransportKind::Tcp, "127.0.0.1", 0, &config).expect("监听 TCP");
    assert!(!socket.reuse_address().expect("读取 SO_REUSEADDR"));
}
