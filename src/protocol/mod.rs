//! Wire-level data model.
//!
//! This module defines what travels between an mrpc client and server: the
//! handshake that opens every connection, the header that precedes every
//! message, and the body values carried after it.
//!
//! # Connection layout
//!
//! 1. One [`Options`] record, encoded as a single JSON object. JSON is used
//!    regardless of the codec it selects, so the server can parse it before
//!    it knows anything else about the peer. The `magicNumber` must equal
//!    [`MAGIC_NUMBER`] and `codecType` must name a codec in the server's
//!    [`CodecRegistry`](crate::codec::CodecRegistry).
//! 2. Zero or more messages, each a [`Header`] followed by a body [`Value`],
//!    encoded with the negotiated [`Codec`](crate::codec::Codec).
//! 3. Either side closing the stream ends the session. There is no goodbye
//!    message.
//!
//! # Correlation
//!
//! A response carries the header of the request it answers. Responses on one
//! connection may be written in any order; peers match them up by
//! [`Header::seq`], never by arrival order.
//!
//! # See Also
//!
//! - [`codec`](crate::codec): Encodings for headers and bodies.
//! - [`server`](crate::server): Consumes this protocol on accepted streams.
mod header;
mod option;
mod value;

pub use header::Header;
pub use option::{NegotiationError, Options, negotiate, write_options};
pub use value::{Payload, Value, ValueKind};

/// Identifies an mrpc peer; the first field of every handshake.
pub const MAGIC_NUMBER: u32 = 0x1b2b3c;
