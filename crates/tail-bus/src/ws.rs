use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, trace, warn};

use crate::{
    error::BusError,
    frame::{Command, Frame},
    link::{Dialer, Link},
};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials the broker's raw WebSocket endpoint and speaks STOMP over text messages.
#[derive(Debug, Clone)]
pub struct WsDialer {
    url: String,
    host: String,
    handshake_timeout: Duration,
}

impl WsDialer {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let host = host_of(&url).to_string();
        Self {
            url,
            host,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[async_trait]
impl Dialer for WsDialer {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn dial(&self) -> Result<Link, BusError> {
        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        write
            .send(Message::Text(Frame::connect(&self.host).encode()))
            .await?;

        tokio::time::timeout(self.handshake_timeout, await_connected(&mut read))
            .await
            .map_err(|_| BusError::Handshake("timed out waiting for CONNECTED".into()))??;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Frame>();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let last = frame.command == Command::Disconnect;
                if let Err(e) = write.send(Message::Text(frame.encode())).await {
                    debug!(error = %e, "websocket write failed");
                    break;
                }
                if last {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "websocket read failed");
                        break;
                    }
                };
                match Frame::parse(&text) {
                    Ok(Some(frame)) => {
                        if in_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(None) => trace!("heart-beat"),
                    Err(e) => warn!(error = %e, "dropping unparsable frame"),
                }
            }
        });

        Ok(Link {
            outbound: Box::new(out_tx),
            inbound: in_rx,
        })
    }
}

/// Read until the broker answers the CONNECT frame.
async fn await_connected<S>(read: &mut S) -> Result<(), BusError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let Some(frame) = Frame::parse(&text)? else {
            continue;
        };
        return match frame.command {
            Command::Connected => {
                debug!(version = frame.get("version").unwrap_or("1.0"), "stomp session established");
                Ok(())
            }
            Command::Error => Err(BusError::Rejected(
                frame.get("message").unwrap_or("no message").to_string(),
            )),
            other => Err(BusError::Handshake(format!("unexpected {other} before CONNECTED"))),
        };
    }
    Err(BusError::Handshake("socket closed during handshake".into()))
}

/// `host[:port]` part of a ws URL, sent as the STOMP virtual host.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}
