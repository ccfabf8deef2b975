//! 事件通道
//!
//! 在一条逻辑连接上完成握手与在线状态上报，然后把变更通知
//! 扇出给进程内任意数量的订阅者。订阅者之间互不阻塞：慢的
//! 订阅者只会在自己的接收端产生 Lagged，不影响其他订阅者。
//!
//! 通道自身不做重连：连接失败以 `Result` 形式返回给调用方，
//! 重试属于 `ConnectionSupervisor` 的职责。

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::BoardConfig;
use crate::feed::FeedError;
use crate::feed::transport::FeedTransport;
use shared::feed::{
    ChangeEvent, FeedEventKind, FeedMessage, HandshakePayload, PresencePayload, PROTOCOL_VERSION,
};

/// Event channel over one live transport
///
/// 创建即完成握手；读取循环在后台把 Change 消息解析后广播。
/// 连接中断时 `closed` 令牌被取消，由上层决定重建。
#[derive(Debug)]
pub struct EventChannel {
    transport: FeedTransport,
    presence: PresencePayload,
    closed: CancellationToken,
}

impl EventChannel {
    /// 打开通道：握手、上报在线状态、启动读取循环
    ///
    /// `event_tx` 由上层长期持有，跨越重连存活，订阅者无需重新订阅。
    pub async fn open(
        transport: FeedTransport,
        event_tx: broadcast::Sender<ChangeEvent>,
        config: &BoardConfig,
    ) -> Result<Self, FeedError> {
        let client_id = Uuid::new_v4().to_string();

        let handshake = HandshakePayload {
            version: PROTOCOL_VERSION,
            client_name: Some(config.client_name.clone()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            restaurant_id: config.restaurant_id.clone(),
        };
        transport
            .write_message(&FeedMessage::handshake(&handshake))
            .await?;

        let presence = PresencePayload {
            client_id,
            viewer: None,
            page: config.page.clone(),
            restaurant_id: config.restaurant_id.clone(),
        };
        transport
            .write_message(&FeedMessage::presence(&presence))
            .await?;

        let closed = CancellationToken::new();
        Self::spawn_read_loop(transport.clone(), event_tx, closed.clone());

        Ok(Self {
            transport,
            presence,
            closed,
        })
    }

    fn spawn_read_loop(
        transport: FeedTransport,
        event_tx: broadcast::Sender<ChangeEvent>,
        closed: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                // 取消优先于待处理的读取：close 之后零回调
                let msg = tokio::select! {
                    biased;
                    _ = closed.cancelled() => break,
                    msg = transport.read_message() => msg,
                };

                match msg {
                    Ok(msg) => match msg.kind {
                        FeedEventKind::Change => match msg.parse_payload::<ChangeEvent>() {
                            Ok(event) => {
                                if let Err(e) = event_tx.send(event) {
                                    tracing::debug!("No subscribers for change event: {}", e);
                                }
                            }
                            // 坏载荷只丢弃该条消息，连接继续
                            Err(e) => {
                                tracing::warn!(error = %e, "Dropping malformed change payload")
                            }
                        },
                        FeedEventKind::Ping => {
                            let _ = transport.write_message(&FeedMessage::ping()).await;
                        }
                        other => {
                            tracing::debug!(kind = %other, "Ignoring non-change feed message");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "Feed transport read error");
                        closed.cancel();
                        break;
                    }
                }
            }
        });
    }

    /// 刷新在线状态 (心跳)
    pub async fn announce_presence(&self) -> Result<(), FeedError> {
        self.transport
            .write_message(&FeedMessage::presence(&self.presence))
            .await
    }

    /// 设置当前查看者后刷新在线状态
    pub async fn announce_viewer(&self, viewer: Option<String>) -> Result<(), FeedError> {
        let mut presence = self.presence.clone();
        presence.viewer = viewer;
        self.transport
            .write_message(&FeedMessage::presence(&presence))
            .await
    }

    /// 连接中断时被取消的令牌
    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    /// 主动关闭通道；读取循环停止，不再有任何回调
    pub async fn close(&self) {
        self.closed.cancel();
        let _ = self.transport.close().await;
    }
}
