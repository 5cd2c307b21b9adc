use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::broker::message::Message;
use crate::broker::subscription::Subscriber;
use crate::broker::topic::Topic;
use crate::utils::DeliveryError;

/// Represents a connected remote subscriber in the Pub/Sub system.
///
/// Each client is uniquely identified by an `id` and has a channel (`sender`)
/// drained by the transport's connection task, which writes the messages to
/// the wire. A client whose channel has been closed fails delivery, and the
/// subscription that delivery went through is ended by the broker.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the client (e.g. UUID or connection ID).
    pub id: String,

    /// Channel to send messages to the client's connection task.
    pub sender: UnboundedSender<Message>,
}

impl Client {
    /// Create a client with a generated `client-<uuid>` id.
    pub fn new(sender: UnboundedSender<Message>) -> Self {
        Self::with_id(format!("client-{}", Uuid::new_v4()), sender)
    }

    pub fn with_id(id: impl Into<String>, sender: UnboundedSender<Message>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }
}

impl Subscriber for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn notify(&self, message: &Message) -> Result<(), DeliveryError> {
        self.sender
            .send(message.clone())
            .map_err(|_| DeliveryError::new(&self.id, "connection channel closed"))
    }

    fn release(&self, topic: &Topic) {
        debug!(client = %self.id, %topic, "client subscription released");
    }
}
