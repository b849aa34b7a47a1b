//! Pluggable encodings for message frames.
//!
//! A [`Codec`] reads and writes [`Header`]/[`Value`] pairs on one connection.
//! Which codec a connection uses is decided by the handshake: the
//! `codecType` string is looked up in a [`CodecRegistry`], and the constructor
//! found there wraps the raw stream. New encodings are added by registering a
//! constructor; the server loop never changes.
//!
//! # Framing
//!
//! Every header and every body is sent as its own frame:
//!
//! - a 4-byte big-endian length,
//! - followed by exactly that many bytes of encoded payload.
//!
//! Frames longer than [`MAX_FRAME_LEN`] are refused. A refused or undecodable
//! frame is still consumed in full, so the stream stays aligned on the next
//! frame and the caller decides whether the failure is fatal.
//!
//! # Concurrency
//!
//! A codec is made of a [`CodecReader`] and a [`CodecWriter`] over separate
//! handles of the same stream. [`Codec::split`] hands them out so one thread
//! can keep reading requests while others write responses. Writers must be
//! serialized by the caller; a single [`CodecWriter::write`] emits the header
//! and body frames together and flushes once.
use std::io;

use thiserror::Error;

use crate::protocol::{Header, Value};

mod binary;
mod frame;
mod json;
mod registry;

pub use binary::BincodeCodec;
pub use json::JsonCodec;
pub use registry::{CodecRegistry, NewCodecFn};

pub(crate) use frame::write_frame;

/// Identifier of [`BincodeCodec`] in the default registry.
pub const BINCODE: &str = "application/bincode";
/// Identifier of [`JsonCodec`] in the default registry.
pub const JSON: &str = "application/json";

/// Largest payload accepted in a single frame.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("connection closed")]
    Closed,
    #[error("failed to encode message: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode message: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to process json message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(u64),
    #[error("{0} unread bytes after decoded frame")]
    TrailingBytes(usize),
    #[error("codec IO error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// True for failures to interpret bytes, as opposed to failures to move them.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            CodecError::Decode(_)
                | CodecError::Json(_)
                | CodecError::FrameTooLarge(_)
                | CodecError::TrailingBytes(_)
        )
    }
}

pub trait CodecReader: Send {
    fn read_header(&mut self) -> Result<Header, CodecError>;

    fn read_body(&mut self) -> Result<Value, CodecError>;
}

pub trait CodecWriter: Send {
    /// Writes `header` followed by `body` and flushes them as one unit.
    fn write(&mut self, header: &Header, body: &Value) -> Result<(), CodecError>;

    /// Flushes pending output and shuts the underlying stream down.
    fn close(&mut self) -> Result<(), CodecError>;
}

/// A negotiated encoding bound to one connection.
pub struct Codec {
    reader: Box<dyn CodecReader>,
    writer: Box<dyn CodecWriter>,
}

impl Codec {
    pub fn new(reader: Box<dyn CodecReader>, writer: Box<dyn CodecWriter>) -> Self {
        Self { reader, writer }
    }

    pub fn read_header(&mut self) -> Result<Header, CodecError> {
        self.reader.read_header()
    }

    pub fn read_body(&mut self) -> Result<Value, CodecError> {
        self.reader.read_body()
    }

    pub fn write(&mut self, header: &Header, body: &Value) -> Result<(), CodecError> {
        self.writer.write(header, body)
    }

    pub fn close(&mut self) -> Result<(), CodecError> {
        self.writer.close()
    }

    pub fn split(self) -> (Box<dyn CodecReader>, Box<dyn CodecWriter>) {
        (self.reader, self.writer)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{io::Write, os::unix::net::UnixStream};

    use super::*;

    fn pair(new_codec: NewCodecFn) -> (Codec, Codec) {
        let (a, b) = UnixStream::pair().unwrap();
        (new_codec(Box::new(a)).unwrap(), new_codec(Box::new(b)).unwrap())
    }

    #[test]
    fn bincode_carries_header_and_body() {
        let (mut client, mut server) = pair(BincodeCodec::new);

        let header = Header::new("Service.Add", 1);
        client
            .write(&header, &Value::from("req body,seq:1"))
            .unwrap();

        assert_eq!(server.read_header().unwrap(), header);
        assert_eq!(server.read_body().unwrap(), Value::from("req body,seq:1"));
    }

    #[test]
    fn json_carries_header_and_body() {
        let (mut client, mut server) = pair(JsonCodec::new);

        let mut header = Header::new("Arith.Div", 9);
        header.error = String::from("division by zero");
        client.write(&header, &Value::Unit).unwrap();
        client.write(&Header::new("Arith.Mul", 10), &Value::Int(-3)).unwrap();

        assert_eq!(server.read_header().unwrap(), header);
        assert_eq!(server.read_body().unwrap(), Value::Unit);
        assert_eq!(server.read_header().unwrap().seq, 10);
        assert_eq!(server.read_body().unwrap(), Value::Int(-3));
    }

    #[test]
    fn clean_close_reads_as_closed() {
        let (mut client, mut server) = pair(BincodeCodec::new);
        client.close().unwrap();

        assert!(matches!(server.read_header(), Err(CodecError::Closed)));
    }

    #[test]
    fn close_mid_frame_is_io_error() {
        let (mut raw, other) = UnixStream::pair().unwrap();
        let mut server = BincodeCodec::new(Box::new(other)).unwrap();

        raw.write_all(&[0, 0, 0, 10, 1, 2]).unwrap();
        drop(raw);

        assert!(matches!(server.read_header(), Err(CodecError::Io(_))));
    }

    #[test]
    fn undecodable_body_keeps_stream_aligned() {
        let (mut raw, other) = UnixStream::pair().unwrap();
        let mut server = BincodeCodec::new(Box::new(other)).unwrap();

        write_frame(&mut raw, &[0xff; 4]).unwrap();
        let mut client = BincodeCodec::new(Box::new(raw)).unwrap();
        client.write(&Header::new("Service.Add", 2), &Value::Uint(2)).unwrap();

        assert!(server.read_body().unwrap_err().is_decode());
        assert_eq!(server.read_header().unwrap().seq, 2);
        assert_eq!(server.read_body().unwrap(), Value::Uint(2));
    }

    #[test]
    fn oversized_body_is_refused_before_anything_is_sent() {
        let (mut client, mut server) = pair(BincodeCodec::new);

        let huge = Value::Bytes(vec![0; MAX_FRAME_LEN as usize]);
        let err = client.write(&Header::new("Blob.Put", 1), &huge).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));

        client.write(&Header::new("Blob.Put", 2), &Value::Uint(2)).unwrap();
        assert_eq!(server.read_header().unwrap(), Header::new("Blob.Put", 2));
        assert_eq!(server.read_body().unwrap(), Value::Uint(2));
    }

    #[test]
    fn oversized_frame_is_drained() {
        let (mut raw, other) = UnixStream::pair().unwrap();
        let mut server = JsonCodec::new(Box::new(other)).unwrap();

        let writer = std::thread::spawn(move || {
            let len = MAX_FRAME_LEN + 1;
            raw.write_all(&len.to_be_bytes()).unwrap();
            raw.write_all(&vec![b' '; len as usize]).unwrap();
            write_frame(&mut raw, br#"{"Str":"after"}"#).unwrap();
            raw
        });

        let err = server.read_body().unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(len) if len == u64::from(MAX_FRAME_LEN) + 1));
        assert_eq!(server.read_body().unwrap(), Value::from("after"));
        writer.join().unwrap();
    }
}
