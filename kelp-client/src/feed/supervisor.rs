//! Connection Supervisor - 连接状态监控和自动重连
//!
//! 每个启用的客户端保持恰好一条活跃订阅。单个监督任务持有
//! 重连计数器（断线期间单调递增，成功后归零），因此同一时刻
//! 最多只有一次连接尝试在途，重入 connect 在结构上不可能发生。
//!
//! 重试耗尽后停止自动重连并持续上报离线状态，直到显式
//! `reconnect()` 重新武装；UI 此时必须提供手动刷新，而不是
//! 把过期数据当作实时数据展示。

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::BoardConfig;
use crate::feed::FeedError;
use crate::feed::channel::EventChannel;
use crate::feed::transport::{FeedTransport, MemoryTransport, TcpTransport};
use shared::feed::{ChangeEvent, FeedMessage};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection status projection for the UI ("live/offline" indicator)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Failed attempts in the current outage; 0 while connected
    pub attempts: u32,
    /// Unix milliseconds of the last successful connect
    pub last_connected_at: Option<i64>,
    /// Retry budget exhausted; only a manual `reconnect()` re-arms
    pub retries_exhausted: bool,
}

impl ConnectionStatus {
    fn initial() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            last_connected_at: None,
            retries_exhausted: false,
        }
    }

    /// Whether the UI may present data as live
    pub fn is_live(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// 连接工厂 - 每次尝试建立一条新传输
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<FeedTransport, FeedError>;
}

/// TCP 连接工厂
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl FeedConnector for TcpConnector {
    async fn connect(&self) -> Result<FeedTransport, FeedError> {
        Ok(FeedTransport::Tcp(TcpTransport::connect(&self.addr).await?))
    }
}

/// 内存连接工厂 (进程内 feed 与测试)
pub struct MemoryConnector {
    from_store_tx: broadcast::Sender<FeedMessage>,
    to_store_tx: broadcast::Sender<FeedMessage>,
}

impl MemoryConnector {
    pub fn new(
        from_store_tx: broadcast::Sender<FeedMessage>,
        to_store_tx: broadcast::Sender<FeedMessage>,
    ) -> Self {
        Self {
            from_store_tx,
            to_store_tx,
        }
    }
}

#[async_trait]
impl FeedConnector for MemoryConnector {
    async fn connect(&self) -> Result<FeedTransport, FeedError> {
        Ok(FeedTransport::Memory(MemoryTransport::new(
            &self.from_store_tx,
            &self.to_store_tx,
        )))
    }
}

/// 连接监督任务的句柄
///
/// 显式构造、显式销毁；不持有任何模块级全局状态。
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    status_rx: watch::Receiver<ConnectionStatus>,
    reconnect_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
}

impl ConnectionSupervisor {
    /// 启动监督任务
    ///
    /// `event_tx` 是跨重连存活的变更扇出端；订阅者在重连前后
    /// 持有同一个接收端。
    pub fn spawn(
        config: BoardConfig,
        connector: Arc<dyn FeedConnector>,
        event_tx: broadcast::Sender<ChangeEvent>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::initial());
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let task = SupervisorTask {
            config,
            connector,
            event_tx,
            status_tx,
            reconnect_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        Self {
            status_rx,
            reconnect_tx,
            cancel,
        }
    }

    /// 当前连接状态
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// 订阅连接状态变化 (UI 指示灯)
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// 手动重连：重置计数器并立即发起一次尝试
    pub async fn reconnect(&self) {
        let _ = self.reconnect_tx.send(()).await;
    }

    /// 同步触发停机：取消待定的重试定时器并释放订阅
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

struct SupervisorTask {
    config: BoardConfig,
    connector: Arc<dyn FeedConnector>,
    event_tx: broadcast::Sender<ChangeEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    reconnect_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl SupervisorTask {
    async fn run(mut self) {
        // 重连计数器是本任务的局部变量：断线期间单调递增，
        // 成功后归零，不存在跨回调的陈旧捕获。
        let mut attempts: u32 = 0;
        let mut exhausted = false;
        let mut last_connected_at: Option<i64> = None;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if exhausted {
                self.publish(ConnectionState::Disconnected, attempts, last_connected_at, true);
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    Some(()) = self.reconnect_rx.recv() => {
                        tracing::info!("Manual reconnect requested");
                        attempts = 0;
                        exhausted = false;
                        continue;
                    }
                }
            }

            self.publish(ConnectionState::Connecting, attempts, last_connected_at, false);

            match self.open_channel().await {
                Ok(channel) => {
                    attempts = 0;
                    last_connected_at = Some(chrono::Utc::now().timestamp_millis());
                    self.publish(ConnectionState::Connected, 0, last_connected_at, false);
                    tracing::info!("Feed connected");

                    self.serve_connection(&channel).await;
                    channel.close().await;

                    if self.cancel.is_cancelled() {
                        break;
                    }
                    tracing::warn!("Feed connection lost");
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        error = %e,
                        attempt = attempts,
                        max = self.config.max_retry_attempts,
                        "Feed connect failed"
                    );
                    if attempts >= self.config.max_retry_attempts {
                        tracing::error!(
                            "Real-time updates unavailable after {} attempts; falling back to manual refresh",
                            attempts
                        );
                        exhausted = true;
                        continue;
                    }
                }
            }

            self.publish(ConnectionState::Disconnected, attempts, last_connected_at, false);

            // 固定间隔重试；手动 reconnect 跳过剩余等待并重置计数
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(()) = self.reconnect_rx.recv() => { attempts = 0; }
                _ = tokio::time::sleep(self.config.retry_interval) => {}
            }
        }

        self.publish(ConnectionState::Disconnected, attempts, last_connected_at, exhausted);
        tracing::debug!("Connection supervisor stopped");
    }

    async fn open_channel(&self) -> Result<EventChannel, FeedError> {
        let transport = self.connector.connect().await?;
        EventChannel::open(transport, self.event_tx.clone(), &self.config).await
    }

    /// 连接保持期间：心跳刷新在线状态，直到断连或停机
    async fn serve_connection(&mut self, channel: &EventChannel) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        // 第一次 tick 立即完成；presence 在 open 时已上报过
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = channel.closed().cancelled() => return,
                _ = heartbeat.tick() => {
                    if let Err(e) = channel.announce_presence().await {
                        tracing::warn!(error = %e, "Presence heartbeat failed");
                    }
                }
                // 已连接时的手动 reconnect 是 no-op
                Some(()) = self.reconnect_rx.recv() => {}
            }
        }
    }

    fn publish(
        &self,
        state: ConnectionState,
        attempts: u32,
        last_connected_at: Option<i64>,
        retries_exhausted: bool,
    ) {
        let _ = self.status_tx.send(ConnectionStatus {
            state,
            attempts,
            last_connected_at,
            retries_exhausted,
        });
    }
}
