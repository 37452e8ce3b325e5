use std::fmt;
use tokio::sync::mpsc;

use crate::error::ChannelError;

pub type ChannelId = u64;

/// Outgoing half of one observer connection.
///
/// A failed post only affects this channel.
pub trait Channel: Send + Sync + fmt::Debug {
    fn post(&self, frame: String) -> Result<(), ChannelError>;

    fn is_alive(&self) -> bool;
}

/// In-process channel backed by unbounded mpsc queues.
#[derive(Debug)]
pub struct LocalChannel {
    tx: mpsc::UnboundedSender<String>,
}

impl Channel for LocalChannel {
    fn post(&self, frame: String) -> Result<(), ChannelError> {
        self.tx.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Observer side of a [`LocalChannel`].
#[derive(Debug)]
pub struct ObserverEnd {
    inbox: mpsc::UnboundedReceiver<String>,
    outbox: mpsc::UnboundedSender<String>,
}

impl ObserverEnd {
    /// Sends a raw frame to the server. Fails once the server side hung up.
    pub fn send(&self, frame: String) -> Result<(), ChannelError> {
        self.outbox.send(frame).map_err(|_| ChannelError::Closed)
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.inbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.inbox.try_recv().ok()
    }
}

/// Builds a connected pair: the server channel, the stream of frames the
/// observer sends to the server, and the observer's end.
pub fn local_pair() -> (LocalChannel, mpsc::UnboundedReceiver<String>, ObserverEnd) {
    let (to_observer, inbox) = mpsc::unbounded_channel();
    let (outbox, from_observer) = mpsc::unbounded_channel();
    (
        LocalChannel { tx: to_observer },
        from_observer,
        ObserverEnd { inbox, outbox },
    )
}
