use std::io;

use crate::{
    net::Stream,
    protocol::{Header, Value},
};

use super::{
    Codec, CodecError,
    frame::{Format, framed},
};

/// Human readable codec; each frame holds one JSON document.
pub struct JsonCodec;

impl JsonCodec {
    pub fn new(stream: Box<dyn Stream>) -> io::Result<Codec> {
        framed(stream, Json)
    }
}

#[derive(Clone)]
struct Json;

impl Format for Json {
    fn encode_header(&self, header: &Header, out: &mut Vec<u8>) -> Result<(), CodecError> {
        serde_json::to_writer(out, header)?;
        Ok(())
    }

    fn encode_body(&self, body: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
        serde_json::to_writer(out, body)?;
        Ok(())
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<Header, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
