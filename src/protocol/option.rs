use std::io::{self, Read, Write};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{BINCODE, CodecRegistry, NewCodecFn};

use super::MAGIC_NUMBER;

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("failed to decode options: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stream closed before options were received")]
    Closed,
    #[error("invalid magic number {0:#x}")]
    BadMagic(u32),
    #[error("invalid codec type '{0}'")]
    UnknownCodec(String),
    #[error("negotiation IO error: {0}")]
    Io(#[from] io::Error),
}

/// Handshake sent once, as the very first bytes of a connection.
///
/// Always JSON, whatever codec it selects, so the server can read it before it
/// knows which codec the rest of the connection uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub magic_number: u32,
    pub codec_type: String,
}

impl Options {
    pub fn with_codec(codec_type: impl Into<String>) -> Self {
        Self {
            magic_number: MAGIC_NUMBER,
            codec_type: codec_type.into(),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::with_codec(BINCODE)
    }
}

/// Writes `options` with nothing after the JSON object; the peer's codec
/// frames start at the very next byte.
pub fn write_options<W>(stream: &mut W, options: &Options) -> Result<(), NegotiationError>
where
    W: Write + ?Sized,
{
    serde_json::to_writer(&mut *stream, options)?;
    stream.flush()?;
    Ok(())
}

/// Reads the handshake from `stream` and resolves the codec it selects.
///
/// Consumes exactly one JSON object; bytes after it are left in the stream
/// for the codec.
pub fn negotiate<R>(
    stream: &mut R,
    codecs: &CodecRegistry,
) -> Result<(Options, NewCodecFn), NegotiationError>
where
    R: Read + ?Sized,
{
    let options = read_options(stream)?;
    debug!("received options: {options:?}");

    if options.magic_number != MAGIC_NUMBER {
        return Err(NegotiationError::BadMagic(options.magic_number));
    }
    let new_codec = codecs
        .get(&options.codec_type)
        .ok_or_else(|| NegotiationError::UnknownCodec(options.codec_type.clone()))?;

    Ok((options, new_codec))
}

fn read_options<R>(stream: &mut R) -> Result<Options, NegotiationError>
where
    R: Read + ?Sized,
{
    // A stream deserializer stops at the closing brace instead of checking
    // for trailing input, which would swallow the first frame.
    let mut values = serde_json::Deserializer::from_reader(stream).into_iter::<Options>();
    match values.next() {
        Some(options) => Ok(options?),
        None => Err(NegotiationError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::codec::JSON;

    use super::*;

    #[test]
    fn options_wire_format() {
        let mut out = Vec::new();
        write_options(&mut out, &Options::default()).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(r#"{{"magicNumber":{MAGIC_NUMBER},"codecType":"{BINCODE}"}}"#)
        );
    }

    #[test]
    fn negotiation_leaves_trailing_bytes() {
        let mut wire = Vec::new();
        write_options(&mut wire, &Options::with_codec(JSON)).unwrap();
        wire.extend_from_slice(&[0, 0, 0, 4, b'n', b'e', b'x', b't']);

        let mut stream = Cursor::new(wire);
        let (options, _) = negotiate(&mut stream, &CodecRegistry::default()).unwrap();
        assert_eq!(options.codec_type, JSON);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0, 0, 0, 4, b'n', b'e', b'x', b't']);
    }

    #[test]
    fn negotiation_rejects_bad_magic() {
        let mut stream = Cursor::new(br#"{"magicNumber":0,"codecType":"application/bincode"}"#);
        let err = negotiate(&mut stream, &CodecRegistry::default()).unwrap_err();

        assert!(matches!(err, NegotiationError::BadMagic(0)));
    }

    #[test]
    fn negotiation_rejects_unknown_codec() {
        let mut wire = Vec::new();
        write_options(&mut wire, &Options::with_codec("application/gob")).unwrap();

        let err = negotiate(&mut Cursor::new(wire), &CodecRegistry::default()).unwrap_err();
        assert!(matches!(err, NegotiationError::UnknownCodec(c) if c == "application/gob"));
    }

    #[test]
    fn negotiation_rejects_garbage_and_eof() {
        let err = negotiate(&mut Cursor::new(b"hello"), &CodecRegistry::default()).unwrap_err();
        assert!(matches!(err, NegotiationError::Json(_)));

        let err = negotiate(&mut Cursor::new(b""), &CodecRegistry::default()).unwrap_err();
        assert!(matches!(err, NegotiationError::Closed));
    }
}
