//! 变更订阅消息类型定义
//!
//! 这些类型在订单存储端和厨房显示客户端之间共享，用于
//! 进程内（内存）和网络（TCP）的变更推送。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

pub mod payload;
pub use payload::*;

/// 协议版本号
pub const PROTOCOL_VERSION: u16 = 1;

/// 订阅流消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedEventKind {
    /// 握手消息
    Handshake = 0,
    /// 数据变更通知
    Change = 1,
    /// 在线状态上报
    Presence = 2,
    /// 连接保活
    Ping = 3,
}

impl TryFrom<u8> for FeedEventKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FeedEventKind::Handshake),
            1 => Ok(FeedEventKind::Change),
            2 => Ok(FeedEventKind::Presence),
            3 => Ok(FeedEventKind::Ping),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FeedEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedEventKind::Handshake => write!(f, "handshake"),
            FeedEventKind::Change => write!(f, "change"),
            FeedEventKind::Presence => write!(f, "presence"),
            FeedEventKind::Ping => write!(f, "ping"),
        }
    }
}

/// 订阅流消息体
///
/// 同一实体的 Change 消息按存储端提交顺序下发；
/// 跨实体之间不保证顺序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    pub message_id: Uuid,
    pub kind: FeedEventKind,
    pub payload: Vec<u8>,
}

impl FeedMessage {
    pub fn new(kind: FeedEventKind, payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            kind,
            payload,
        }
    }

    /// 创建握手消息
    pub fn handshake(payload: &HandshakePayload) -> Self {
        Self::new(
            FeedEventKind::Handshake,
            serde_json::to_vec(payload).expect("Failed to serialize handshake payload"),
        )
    }

    /// 创建变更通知消息
    pub fn change(event: &ChangeEvent) -> Self {
        Self::new(
            FeedEventKind::Change,
            serde_json::to_vec(event).expect("Failed to serialize change event"),
        )
    }

    /// 创建在线状态消息
    pub fn presence(payload: &PresencePayload) -> Self {
        Self::new(
            FeedEventKind::Presence,
            serde_json::to_vec(payload).expect("Failed to serialize presence payload"),
        )
    }

    /// 创建保活消息
    pub fn ping() -> Self {
        Self::new(FeedEventKind::Ping, Vec::new())
    }

    /// 解析载荷为指定类型
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
