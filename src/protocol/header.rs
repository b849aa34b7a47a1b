use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Metadata preceding every body on the wire.
///
/// A response reuses the header of the request it answers, so
/// `service_method` and `seq` always match; `error` is empty on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Target method, formatted as `Service.Method`.
    pub service_method: String,
    /// Correlates a response with its request; unique per connection.
    pub seq: u64,
    pub error: String,
}

impl Header {
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
