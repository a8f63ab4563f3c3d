use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{error::BusError, frame::Frame};

/// Outbound half of a live link.
///
/// `send` never blocks: frames are queued for the writer (or applied directly
/// by in-process brokers).
pub trait FrameSink: Send + Sync + 'static {
    fn send(&self, frame: Frame) -> Result<(), BusError>;
}

impl FrameSink for mpsc::UnboundedSender<Frame> {
    fn send(&self, frame: Frame) -> Result<(), BusError> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| BusError::Closed)
    }
}

/// An established, handshaken connection to the broker.
///
/// The link is gone once `inbound` yields `None`.
pub struct Link {
    pub outbound: Box<dyn FrameSink>,
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

/// Opens links to the broker.
///
/// [`WsDialer`](crate::WsDialer) talks to a real endpoint; [`MemoryBus`](crate::MemoryBus)
/// is an in-process broker.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Endpoint description used in logs.
    fn endpoint(&self) -> &str;

    /// Connect and complete the STOMP handshake.
    async fn dial(&self) -> Result<Link, BusError>;
}
