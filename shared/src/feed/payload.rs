//! 订阅流载荷类型

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==================== Watched Tables ====================

/// 被订阅的逻辑表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTable {
    Orders,
    OrderItems,
    Payments,
}

impl fmt::Display for RecordTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordTable::Orders => write!(f, "orders"),
            RecordTable::OrderItems => write!(f, "order_items"),
            RecordTable::Payments => write!(f, "payments"),
        }
    }
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

// ==================== Payloads ====================

/// 变更通知 (存储端 -> 客户端)
///
/// DELETE 时 `new_record` 缺省；INSERT 时 `old_record` 缺省。
/// 记录体按表结构序列化为 JSON，由客户端按 `table` 解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: RecordTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_record: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_record: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// 创建 INSERT 通知
    pub fn insert<T: Serialize>(table: RecordTable, record: &T) -> Self {
        Self {
            kind: ChangeKind::Insert,
            table,
            new_record: Some(serde_json::to_value(record).expect("Failed to serialize record")),
            old_record: None,
        }
    }

    /// 创建 UPDATE 通知
    pub fn update<T: Serialize>(table: RecordTable, old: &T, new: &T) -> Self {
        Self {
            kind: ChangeKind::Update,
            table,
            new_record: Some(serde_json::to_value(new).expect("Failed to serialize record")),
            old_record: Some(serde_json::to_value(old).expect("Failed to serialize record")),
        }
    }

    /// 创建 DELETE 通知
    pub fn delete<T: Serialize>(table: RecordTable, old: &T) -> Self {
        Self {
            kind: ChangeKind::Delete,
            table,
            new_record: None,
            old_record: Some(serde_json::to_value(old).expect("Failed to serialize record")),
        }
    }

    /// 按类型解析 `new_record`
    pub fn new_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.new_record
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// 按类型解析 `old_record`
    pub fn old_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.old_record
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// 握手载荷 (客户端 -> 存储端)
///
/// 包含协议版本与门店范围，存储端按 `restaurant_id` 过滤下发的变更。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// 协议版本
    pub version: u16,
    /// 客户端名称/标识
    pub client_name: Option<String>,
    /// 客户端版本
    pub client_version: Option<String>,
    /// 门店范围
    pub restaurant_id: String,
}

/// 在线状态载荷 (客户端 -> 存储端)
///
/// 记录谁在看哪个页面，用于运营可见性，不参与事件语义。
/// 在连接与重连时上报，并按心跳间隔刷新。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// 客户端唯一标识 (UUID)
    pub client_id: String,
    /// 当前查看者 (可选)
    pub viewer: Option<String>,
    /// 页面标识 (例如: "kitchen-board")
    pub page: String,
    /// 门店范围
    pub restaurant_id: String,
}
