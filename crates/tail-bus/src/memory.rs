use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{
    error::BusError,
    frame::{Command, Frame},
    link::{Dialer, FrameSink, Link},
    sync::lock,
};

const ENDPOINT: &str = "memory://bus";

/// In-process STOMP broker.
///
/// Frames sent by a client are applied synchronously, so a `SUBSCRIBE` is
/// routable as soon as [`FrameSink::send`] returns. Backs the connection,
/// subscriber and session tests.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<Broker>>,
}

#[derive(Default)]
struct Broker {
    refuse: bool,
    dials: usize,
    next_link: u64,
    next_message: u64,
    links: HashMap<u64, LinkState>,
    subscribe_log: Vec<String>,
}

struct LinkState {
    to_client: mpsc::UnboundedSender<Frame>,
    /// subscription id -> destination
    subs: HashMap<String, String>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent dials fail (or succeed again).
    pub fn refuse_dials(&self, refuse: bool) {
        lock(&self.inner).refuse = refuse;
    }

    /// Number of dial attempts so far, successful or not.
    pub fn dial_count(&self) -> usize {
        lock(&self.inner).dials
    }

    /// Number of live client links.
    pub fn link_count(&self) -> usize {
        lock(&self.inner).links.len()
    }

    /// Drop every live link, as if the broker went away.
    pub fn drop_links(&self) {
        lock(&self.inner).links.clear();
    }

    /// Destinations of every SUBSCRIBE ever received, in order.
    pub fn subscribe_log(&self) -> Vec<String> {
        lock(&self.inner).subscribe_log.clone()
    }

    /// Active subscriptions on `destination` across all links.
    pub fn subscriber_count(&self, destination: &str) -> usize {
        lock(&self.inner)
            .links
            .values()
            .flat_map(|l| l.subs.values())
            .filter(|d| *d == destination)
            .count()
    }

    /// Publish `body` on `destination`; returns the number of subscriptions reached.
    ///
    /// Nothing is retained: a publish with no subscriber is lost.
    pub fn publish(&self, destination: &str, body: &str) -> usize {
        let mut broker = lock(&self.inner);
        broker.next_message += 1;
        let message_id = format!("m-{}", broker.next_message);

        let mut delivered = 0;
        for link in broker.links.values() {
            for (sub, dest) in &link.subs {
                if dest != destination {
                    continue;
                }
                let frame = Frame::message(sub, destination, &message_id, body);
                if link.to_client.send(frame).is_ok() {
                    delivered += 1;
                }
            }
        }
        trace!(destination, delivered, "memory bus publish");
        delivered
    }
}

#[async_trait]
impl Dialer for MemoryBus {
    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    async fn dial(&self) -> Result<Link, BusError> {
        let mut broker = lock(&self.inner);
        broker.dials += 1;
        if broker.refuse {
            return Err(BusError::Refused(format!("{ENDPOINT} is refusing connections")));
        }

        broker.next_link += 1;
        let id = broker.next_link;
        let (to_client, inbound) = mpsc::unbounded_channel();
        broker.links.insert(
            id,
            LinkState {
                to_client,
                subs: HashMap::new(),
            },
        );

        Ok(Link {
            outbound: Box::new(MemorySink {
                broker: Arc::clone(&self.inner),
                link: id,
            }),
            inbound,
        })
    }
}

struct MemorySink {
    broker: Arc<Mutex<Broker>>,
    link: u64,
}

impl FrameSink for MemorySink {
    fn send(&self, frame: Frame) -> Result<(), BusError> {
        let mut broker = lock(&self.broker);

        match frame.command {
            Command::Subscribe => {
                let id = frame.get("id").unwrap_or_default().to_string();
                let dest = frame.get("destination").unwrap_or_default().to_string();
                let link = broker.links.get_mut(&self.link).ok_or(BusError::Closed)?;
                link.subs.insert(id, dest.clone());
                broker.subscribe_log.push(dest);
            }
            Command::Unsubscribe => {
                let id = frame.get("id").unwrap_or_default();
                let link = broker.links.get_mut(&self.link).ok_or(BusError::Closed)?;
                link.subs.remove(id);
            }
            Command::Disconnect => {
                broker.links.remove(&self.link);
            }
            _ => {
                if !broker.links.contains_key(&self.link) {
                    return Err(BusError::Closed);
                }
            }
        }
        Ok(())
    }
}
