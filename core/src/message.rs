// Outbound messages
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::utils::{gen_id, now_ms};

/// An event on its way to the cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    pub timestamp_ms: i64,
    pub json_content: Value,
}

impl MessageRequest {
    /// Build an event with a fresh message id
    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        let message_id = gen_id();
        let json_content = json!({
            "event": {
                "header": {
                    "namespace": namespace,
                    "name": name,
                    "messageId": message_id,
                },
                "payload": payload,
            }
        });
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            message_id,
            timestamp_ms: now_ms(),
            json_content,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.json_content["event"]["payload"]
    }
}

pub trait MessageSender: Send + Sync {
    fn send_message(&self, request: MessageRequest);
}

/// Forwards messages into an unbounded channel drained by the transport
#[derive(Debug, Clone)]
pub struct ChannelMessageSender {
    tx: mpsc::UnboundedSender<MessageRequest>,
}

impl ChannelMessageSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MessageRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSender for ChannelMessageSender {
    fn send_message(&self, request: MessageRequest) {
        debug!(target: "message_sender", namespace = %request.namespace, name = %request.name, message_id = %request.message_id, "Sending message");
        if self.tx.send(request).is_err() {
            warn!(target: "message_sender", "Message receiver dropped");
        }
    }
}
