use crate::broker::message::Message;
use crate::notifications::types::Notification;

/// A notification plus the attempt count carried beside it on the wire.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub notification: Notification,
    pub retry_count: i64,
}

pub fn encode(notification: &Notification, retry_count: i64) -> Result<Message, serde_json::Error> {
    let body = serde_json::to_vec(notification)?;
    Ok(Message::new(body).with_retry_count(retry_count))
}

pub fn decode(message: &Message) -> Result<Envelope, serde_json::Error> {
    let notification = serde_json::from_slice(&message.body)?;
    Ok(Envelope {
        notification,
        retry_count: message.retry_count(),
    })
}
