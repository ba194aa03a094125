//! Pub/sub topic resource: `pubsub.NewTopic[Msg](name, cfg)`, plus the
//! publisher/subscriber reference kinds that point back at it (spec.md
//! §4.6, §4.9).

use crate::schema::Type;
use crate::source::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryGuarantee {
    AtLeastOnce,
    ExactlyOnce,
}

#[derive(Debug, Clone)]
pub struct PubsubTopic {
    pub name: String,
    pub message_type: Type,
    pub delivery_guarantee: DeliveryGuarantee,
    pub ordering_key: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub name: String,
    pub topic_name: String,
    pub handler_func: String,
    /// The handler's declaring package, when it was referenced through a
    /// package-qualified selector (`otherpkg.Handle`). `None` means a bare
    /// identifier, which Go scoping rules already pin to the subscribing
    /// call's own package.
    pub handler_package: Option<String>,
    pub ack_deadline_seconds: Option<u32>,
    pub max_retries: Option<u32>,
    pub position: Position,
}
