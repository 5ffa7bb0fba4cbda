#![doc = r#"
# spark-socket

## 模块使命（Why）
- **事件引擎的套接字底座**：为单线程反应器提供建连、监听、就绪等待、同步文件发送与异步写队列，
  让上层协议只关心“写什么”，不关心“内核此刻能不能收”。
- **背压不丢字节**：非阻塞写遭遇内核缓冲写满时，字节按提交顺序暂存在每个套接字独享的写队列中，
  由反应器的写就绪通知驱动续写；队列清空后自动撤销写兴趣。
- **无全局状态**：反应器以 [`Reactor`] 句柄显式传入每一次异步写调用，同一进程可并存多个反应器。

## 核心契约（What）
- [`create`] / [`create_raw`]：按 [`TransportKind`]（TCP/UDP、IPv4/IPv6、Unix 流/数据报）创建描述符；
- [`listen`] / [`listen_with_config`]：复用地址、绑定，并对流式类型开始监听与切换非阻塞；
- [`wait`]：单描述符 `poll(2)`，超时以 [`Readiness::Timeout`] 表达而非错误，`EINTR` 透明重试；
- [`send_file`]：分块把文件同步发送到套接字，失败即中止；
- [`write_async`] / [`on_writable`]：永不阻塞的写入与写就绪回调；
- [`drain`]：尽力丢弃已到达的入站数据。

## 实现策略（How）
- 描述符由 `socket2` 持有，`Drop` 即关闭；`poll`/`sendfile`/`recv` 通过 `nix` 访问内核；
- 写队列分块从每个套接字独享的 `bytes::BytesMut` arena 切出，首次背压时才分配；
- 失败统一归档为 [`SocketError`]，并提供 `spark.socket.*` 稳定错误码；尽力而为的辅助步骤只用
  `tracing` 记录告警，不中断调用。

## 风险提示（Trade-offs）
- [`write_async`] 与 [`on_writable`] 要求对反应器的独占借用，多线程部署需按描述符分片到多个
  [`SocketTable`]；
- [`wait`] 与 [`send_file`] 会阻塞调用线程，只应在事件循环之外使用。
"#]

#[cfg(not(unix))]
compile_error!("spark-socket 依赖 POSIX 套接字与 `poll(2)`，仅支持 Unix 平台。");

mod config;
mod drain;
mod error;
mod factory;
mod interest;
mod kind;
mod listener;
mod queue;
mod reactor;
mod sendfile;
mod wait;
mod write;

pub use config::{ConfigError, DEFAULT_BACKLOG, DRAIN_BUFFER_SIZE, SENDFILE_CHUNK_SIZE, SocketConfig};
pub use drain::{drain, drain_with_config};
pub use error::{Result, SocketError};
pub use factory::{create, create_raw};
pub use interest::Interest;
pub use kind::TransportKind;
pub use listener::{listen, listen_with_config};
pub use queue::{ARENA_INITIAL_CAPACITY, Chunk, QueueStats, WriteQueue};
pub use reactor::{Multiplexer, Reactor, Socket, SocketTable};
pub use sendfile::{ChunkSender, SocketSender, send_file, send_file_with, send_file_with_config};
pub use wait::{PollOnce, Readiness, SysPoll, timeout_from_secs, wait, wait_with};
pub use write::{FlushOutcome, on_writable, write_async};
