//! JSON-lines TCP 传输
//!
//! 每行一个 JSON 对象，双向格式相同：
//!
//! ```text
//! → {"topic":"eim/arduino","payload":"board.digital_write(13,1)"}
//! ← {"topic":"eim/arduino","payload":{"digital_pin_13":1,"analog_pin_0":512}}
//! ```
//!
//! 连接拆分为读、写两个任务：写任务消费出站队列，读任务把遥测帧投递到
//! [`InboundFrames`]。任一方向断开后 [`ChannelSender`] 立即报告 `Unavailable`。

use crate::{Channel, ChannelError};
use eim_protocol::{OutboundMessage, TelemetryFrame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 入站遥测帧流
pub type InboundFrames = mpsc::UnboundedReceiver<TelemetryFrame>;

/// 出站发送端（可克隆）
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    connected: Arc<AtomicBool>,
}

impl Channel for ChannelSender {
    fn send(&mut self, message: OutboundMessage) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ChannelError::Unavailable);
        }
        self.tx.send(message).map_err(|_| ChannelError::Unavailable)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// TCP 传输入口
pub struct TcpTransport;

impl TcpTransport {
    /// 连接适配器
    ///
    /// 必须在 tokio 运行时内调用（读写任务通过 `tokio::spawn` 启动）。
    pub async fn connect(
        addr: impl ToSocketAddrs,
    ) -> Result<(ChannelSender, InboundFrames), ChannelError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            info!("Connected to adapter at {}", peer);
        }
        Ok(Self::spawn(stream))
    }

    /// 在任意双工字节流上启动读写任务
    pub fn spawn<S>(stream: S) -> (ChannelSender, InboundFrames)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(write_loop(writer, out_rx, connected.clone()));
        tokio::spawn(read_loop(reader, in_tx, connected.clone()));

        (
            ChannelSender {
                tx: out_tx,
                connected,
            },
            in_rx,
        )
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    connected: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping unserializable outbound message: {}", e);
                continue;
            },
        };
        line.push(b'\n');

        if let Err(e) = writer.write_all(&line).await {
            error!("Adapter write failed: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            error!("Adapter flush failed: {}", e);
            break;
        }
    }

    connected.store(false, Ordering::Release);
    let _ = writer.shutdown().await;
    debug!("Adapter writer stopped");
}

/// 单行上限，超过后丢弃该行
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// 一行读取结果
enum Line {
    Complete,
    TooLong,
    Eof,
}

/// 读取到换行符为止（不含换行符），超长部分丢弃
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if buf.is_empty() && !overflow {
                Line::Eof
            } else if overflow {
                Line::TooLong
            } else {
                Line::Complete
            });
        }

        let (chunk, found) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..i], Some(i + 1)),
            None => (available, None),
        };
        if !overflow {
            if buf.len() + chunk.len() > MAX_LINE_BYTES {
                overflow = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }

        let used = found.unwrap_or(available.len());
        reader.consume(used);
        if found.is_some() {
            return Ok(if overflow { Line::TooLong } else { Line::Complete });
        }
    }
}

async fn read_loop<R>(
    reader: R,
    inbound: mpsc::UnboundedSender<TelemetryFrame>,
    connected: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        match read_line(&mut reader, &mut buf).await {
            Ok(Line::Complete) => {
                let line = match std::str::from_utf8(&buf) {
                    Ok(line) => line.trim(),
                    Err(e) => {
                        warn!("Ignoring non UTF-8 line from adapter: {}", e);
                        continue;
                    },
                };
                if line.is_empty() {
                    continue;
                }
                match TelemetryFrame::from_json(line) {
                    Ok(frame) => {
                        if inbound.send(frame).is_err() {
                            debug!("Inbound consumer dropped, stopping reader");
                            break;
                        }
                    },
                    Err(e) => warn!("Ignoring malformed frame from adapter: {}", e),
                }
            },
            Ok(Line::TooLong) => {
                warn!("Dropping line longer than {} bytes from adapter", MAX_LINE_BYTES);
            },
            Ok(Line::Eof) => {
                info!("Adapter closed the connection");
                break;
            },
            Err(e) => {
                error!("Adapter read failed: {}", e);
                break;
            },
        }
    }

    connected.store(false, Ordering::Release);
}
