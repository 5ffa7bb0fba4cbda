//! `readiness_contract` 集成测试：在真实描述符上验证就绪等待与入站清理。

use spark_socket::{
    Interest, Readiness, SocketConfig, TransportKind, create, drain, drain_with_config, wait,
};
use std::{
    io,
    os::unix::net::{UnixDatagram, UnixStream},
    time::Duration,
};

#[test]
fn idle_socket_times_out_and_fresh_socket_is_writable() {
    let (local, _peer) = UnixStream::pair().expect("socketpair");

    let readable = wait(&local, Some(Duration::from_millis(20)), Interest::READABLE).expect("等待");
    assert_eq!(readable, Readiness::Timeout);

    let writable = wait(&local, Some(Duration::ZERO), Interest::WRITABLE).expect("等待");
    assert!(writable.is_ready());
}

#[test]
fn pending_datagram_makes_socket_readable() {
    let (left, right) = UnixDatagram::pair().expect("socketpair");
    left.send(b"ping").expect("发送");
    let readiness = wait(&right, None, Interest::READABLE).expect("等待");
    assert_eq!(readiness, Readiness::Ready);
}

#[test]
fn drain_consumes_every_queued_datagram() {
    let (left, right) = UnixDatagram::pair().expect("socketpair");
    for i in 0..8u8 {
        left.send(&[i; 100]).expect("发送");
    }

    drain(&right, &mut [0u8; 64]);

    right.set_nonblocking(true).expect("非阻塞");
    let err = right.recv(&mut [0u8; 128]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
}

#[test]
fn drain_on_empty_socket_returns_immediately() {
    let (_left, right) = UnixDatagram::pair().expect("socketpair");
    drain_with_config(&right, &SocketConfig::new());
    let probe = socket2::SockRef::from(&right);
    assert!(!probe.nonblocking().expect("读取阻塞模式"), "清理不改变阻塞模式");
}

#[test]
fn drain_accepts_factory_sockets() {
    let socket = create(TransportKind::Udp).expect("创建 UDP");
    drain(&socket, &mut [0u8; 16]);
}
