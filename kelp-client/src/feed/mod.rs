// kelp-client/src/feed/mod.rs
// 变更订阅模块 - 传输层、事件通道与连接管理

pub mod channel;
pub mod supervisor;
pub mod transport;

pub use channel::EventChannel;
pub use supervisor::{
    ConnectionState, ConnectionStatus, ConnectionSupervisor, FeedConnector, MemoryConnector,
    TcpConnector,
};
pub use transport::{FeedTransport, MemoryTransport, TcpTransport, Transport};

pub use shared::feed::{ChangeEvent, ChangeKind, FeedEventKind, FeedMessage, RecordTable};

use thiserror::Error;

/// 订阅通道错误
#[derive(Debug, Error)]
pub enum FeedError {
    /// 连接失败或中断
    #[error("Connection error: {0}")]
    Connection(String),

    /// 底层 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 帧格式错误 (未知消息类型、长度越界)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// 载荷序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
