use thiserror::Error;

use crate::{
    codec::CodecError,
    protocol::{Header, Value},
};

/// A fully read request, owned by the thread that handles it.
#[derive(Debug)]
pub(crate) struct Request {
    pub header: Header,
    pub arg: Value,
}

#[derive(Debug, Error)]
pub(crate) enum ReadError {
    /// Peer closed the stream between messages.
    #[error("connection closed")]
    Closed,

    /// The header could not be read; the stream can no longer be trusted.
    #[error("failed to read request header: {0}")]
    Header(CodecError),

    /// The header was read but the request cannot be served. The body has
    /// been consumed, so reading can continue with the next message.
    #[error("invalid request '{}' seq {}: {reason}", header.service_method, header.seq)]
    Invalid { header: Header, reason: String },
}
