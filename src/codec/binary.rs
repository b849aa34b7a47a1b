use std::io;

use bincode::{
    config::{BigEndian, Configuration, Fixint, Limit},
    decode_from_slice, encode_into_std_write,
};

use crate::{
    net::Stream,
    protocol::{Header, Value},
};

use super::{
    Codec, CodecError, MAX_FRAME_LEN,
    frame::{Format, framed},
};

/// Decoding never claims more than a whole frame could hold, so a forged
/// length inside a payload is a decode error rather than a huge allocation.
const DECODE_LIMIT: usize = MAX_FRAME_LEN as usize;

type Config = Configuration<BigEndian, Fixint, Limit<DECODE_LIMIT>>;

pub(crate) fn config() -> Config {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<DECODE_LIMIT>()
}

/// Compact binary codec built on bincode.
pub struct BincodeCodec;

impl BincodeCodec {
    pub fn new(stream: Box<dyn Stream>) -> io::Result<Codec> {
        framed(stream, Bincode { config: config() })
    }
}

#[derive(Clone)]
struct Bincode {
    config: Config,
}

impl Bincode {
    fn decode<T: bincode::Decode<()>>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let (value, read) = decode_from_slice(bytes, self.config)?;
        if read < bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - read));
        }
        Ok(value)
    }
}

impl Format for Bincode {
    fn encode_header(&self, header: &Header, out: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_into_std_write(header, out, self.config)?;
        Ok(())
    }

    fn encode_body(&self, body: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_into_std_write(body, out, self.config)?;
        Ok(())
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<Header, CodecError> {
        self.decode(bytes)
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        self.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian_fixint() {
        let mut out = Vec::new();
        Bincode { config: config() }
            .encode_header(&Header::new("A.B", 1), &mut out)
            .unwrap();

        let mut expected = 3u64.to_be_bytes().to_vec();
        expected.extend_from_slice(b"A.B");
        expected.extend_from_slice(&1u64.to_be_bytes());
        expected.extend_from_slice(&0u64.to_be_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let format = Bincode { config: config() };
        let mut out = Vec::new();
        format.encode_body(&Value::Bool(true), &mut out).unwrap();
        out.push(0);

        assert!(matches!(
            format.decode_body(&out),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn truncated_header_is_decode_error() {
        let err = Bincode { config: config() }
            .decode_header(&[0xff; 4])
            .unwrap_err();

        assert!(err.is_decode());
    }

    #[test]
    fn forged_string_length_is_refused_without_allocating() {
        let mut frame = (1u64 << 40).to_be_bytes().to_vec();
        frame.extend_from_slice(&[0; 4]);

        let format = Bincode { config: config() };
        assert!(matches!(format.decode_header(&frame), Err(CodecError::Decode(_))));

        let mut body = 5u32.to_be_bytes().to_vec();
        body.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(format.decode_body(&body), Err(CodecError::Decode(_))));
    }
}
