use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::feed::FeedError;
use shared::feed::{FeedEventKind, FeedMessage};

/// 单帧载荷上限 (16 MiB)，防止坏长度字段导致的内存放大
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Transport abstraction for the change feed
///
/// 帧格式: `[kind: u8][message_id: 16B][len: u32 LE][payload]`
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn read_message(&self) -> Result<FeedMessage, FeedError>;
    async fn write_message(&self, msg: &FeedMessage) -> Result<(), FeedError>;
    async fn close(&self) -> Result<(), FeedError>;
}

/// TCP Transport Implementation
#[derive(Debug, Clone)]
pub struct TcpTransport {
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> Result<Self, FeedError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already accepted stream (store side, tests)
    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_message(&self) -> Result<FeedMessage, FeedError> {
        let mut reader = self.reader.lock().await;

        // Read event kind (1 byte)
        let mut kind_buf = [0u8; 1];
        reader.read_exact(&mut kind_buf).await.map_err(FeedError::Io)?;

        let kind = FeedEventKind::try_from(kind_buf[0])
            .map_err(|_| FeedError::InvalidFrame(format!("Unknown event kind: {}", kind_buf[0])))?;

        // Read message ID (16 bytes)
        let mut uuid_buf = [0u8; 16];
        reader.read_exact(&mut uuid_buf).await.map_err(FeedError::Io)?;
        let message_id = Uuid::from_bytes(uuid_buf);

        // Read payload length (4 bytes)
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await.map_err(FeedError::Io)?;

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(FeedError::InvalidFrame(format!(
                "Frame length {} exceeds limit",
                len
            )));
        }

        // Read payload
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(FeedError::Io)?;

        Ok(FeedMessage {
            message_id,
            kind,
            payload,
        })
    }

    async fn write_message(&self, msg: &FeedMessage) -> Result<(), FeedError> {
        let mut writer = self.writer.lock().await;
        let mut data = Vec::with_capacity(21 + msg.payload.len());
        data.push(msg.kind as u8);
        data.extend_from_slice(msg.message_id.as_bytes());
        data.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&msg.payload);

        writer.write_all(&data).await.map_err(FeedError::Io)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), FeedError> {
        // Dropping the Arc references will eventually close the stream
        Ok(())
    }
}

/// Memory Transport Implementation (for in-process feeds and tests)
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    /// Receiver for messages FROM the store (change broadcasts)
    rx: Arc<Mutex<broadcast::Receiver<FeedMessage>>>,
    /// Sender for messages TO the store (handshake, presence)
    tx: broadcast::Sender<FeedMessage>,
}

impl MemoryTransport {
    /// Create a new memory transport
    ///
    /// # Arguments
    /// * `store_broadcast_tx` - The store's broadcast sender (to subscribe to changes)
    /// * `client_to_store_tx` - The channel carrying messages TO the store
    pub fn new(
        store_broadcast_tx: &broadcast::Sender<FeedMessage>,
        client_to_store_tx: &broadcast::Sender<FeedMessage>,
    ) -> Self {
        Self {
            rx: Arc::new(Mutex::new(store_broadcast_tx.subscribe())),
            tx: client_to_store_tx.clone(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> Result<FeedMessage, FeedError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .map_err(|e| FeedError::Connection(format!("Memory channel error: {}", e)))
    }

    async fn write_message(&self, msg: &FeedMessage) -> Result<(), FeedError> {
        self.tx
            .send(msg.clone())
            .map_err(|e| FeedError::Connection(format!("Failed to send to store: {}", e)))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), FeedError> {
        Ok(())
    }
}

/// 可用传输实现的封装
#[derive(Debug, Clone)]
pub enum FeedTransport {
    Tcp(TcpTransport),
    Memory(MemoryTransport),
}

impl FeedTransport {
    pub async fn read_message(&self) -> Result<FeedMessage, FeedError> {
        match self {
            FeedTransport::Tcp(t) => t.read_message().await,
            FeedTransport::Memory(t) => t.read_message().await,
        }
    }

    pub async fn write_message(&self, msg: &FeedMessage) -> Result<(), FeedError> {
        match self {
            FeedTransport::Tcp(t) => t.write_message(msg).await,
            FeedTransport::Memory(t) => t.write_message(msg).await,
        }
    }

    pub async fn close(&self) -> Result<(), FeedError> {
        match self {
            FeedTransport::Tcp(t) => t.close().await,
            FeedTransport::Memory(t) => t.close().await,
        }
    }
}
