use serde::Deserialize;
use thiserror::Error;

/// 同步文件发送单次交给内核的最大字节数。
pub const SENDFILE_CHUNK_SIZE: usize = 64 * 1024;

/// 流式监听默认的 backlog 深度。
pub const DEFAULT_BACKLOG: i32 = 512;

/// 入站清理默认使用的临时缓冲大小。
pub const DRAIN_BUFFER_SIZE: usize = 64 * 1024;

/// 套接字层的可调参数。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 将监听 backlog、地址复用开关、文件发送分块大小与入站清理缓冲大小集中为一个配置对象，
///   宿主可以在启动阶段一次性注入，而不必在每个调用点硬编码常量；
/// - 支持从 TOML 片段加载（`#[serde(default)]`），缺省字段沿用内置默认值。
///
/// ## 契约（What）
/// - `backlog`：传给 `listen(2)` 的队列深度，仅对流式类型生效；
/// - `reuse_address`：是否在绑定前尝试 `SO_REUSEADDR`，失败只记录告警；
/// - `sendfile_chunk_size`：单次发送上限，读取时下限钳制为 1，避免零长度死循环；
/// - `drain_buffer_size`：[`drain_with_config`](crate::drain_with_config) 的临时缓冲大小。
///
/// ## 注意事项（Trade-offs）
/// - 分块越大系统调用越少，但单次阻塞时长越长；默认 64 KiB 与常见套接字发送缓冲同量级。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocketConfig {
    backlog: i32,
    reuse_address: bool,
    sendfile_chunk_size: usize,
    drain_buffer_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketConfig {
    /// 创建默认配置。
    pub const fn new() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            reuse_address: true,
            sendfile_chunk_size: SENDFILE_CHUNK_SIZE,
            drain_buffer_size: DRAIN_BUFFER_SIZE,
        }
    }

    /// 从 TOML 文本解析配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    pub fn with_sendfile_chunk_size(mut self, size: usize) -> Self {
        self.sendfile_chunk_size = size;
        self
    }

    pub fn with_drain_buffer_size(mut self, size: usize) -> Self {
        self.drain_buffer_size = size;
        self
    }

    pub fn backlog(&self) -> i32 {
        self.backlog
    }

    pub fn reuse_address(&self) -> bool {
        self.reuse_address
    }

    pub fn sendfile_chunk_size(&self) -> usize {
        self.sendfile_chunk_size.max(1)
    }

    pub fn drain_buffer_size(&self) -> usize {
        self.drain_buffer_size
    }
}

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket config: {0}")]
    Parse(#[from] toml::de::Error),
}
