use std::time::Duration;

/// One write in a [`RemoteStore::batch_set`](crate::RemoteStore::batch_set) round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOp {
    pub key: String,
    pub value: String,
    /// `None` stores the value without expiry.
    pub ttl: Option<Duration>,
}

impl SetOp {
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }
}
