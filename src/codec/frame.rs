use std::io::{self, BufReader, BufWriter, Read, Write};

use log::trace;

use crate::{
    net::Stream,
    protocol::{Header, Value},
};

use super::{Codec, CodecError, CodecReader, CodecWriter, MAX_FRAME_LEN};

const LEN_PREFIX: usize = size_of::<u32>();

/// Turns headers and bodies into frame payloads and back.
pub(crate) trait Format: Clone + Send + 'static {
    fn encode_header(&self, header: &Header, out: &mut Vec<u8>) -> Result<(), CodecError>;

    fn encode_body(&self, body: &Value, out: &mut Vec<u8>) -> Result<(), CodecError>;

    fn decode_header(&self, bytes: &[u8]) -> Result<Header, CodecError>;

    fn decode_body(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Reads one frame into `buf`.
///
/// End-of-stream before the first prefix byte is a clean [`CodecError::Closed`];
/// anywhere later it is an IO error. Oversized payloads are skipped before
/// the error is returned.
pub(crate) fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<(), CodecError>
where
    R: Read + ?Sized,
{
    let mut prefix = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Err(CodecError::Closed),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_LEN {
        let skipped = io::copy(&mut (&mut *reader).take(u64::from(len)), &mut io::sink())?;
        if skipped < u64::from(len) {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        return Err(CodecError::FrameTooLarge(u64::from(len)));
    }

    buf.clear();
    buf.resize(len as usize, 0);
    reader.read_exact(buf)?;
    trace!("read frame of {len} bytes");
    Ok(())
}

fn frame_len(payload: &[u8]) -> Result<u32, CodecError> {
    u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or(CodecError::FrameTooLarge(payload.len() as u64))
}

pub(crate) fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), CodecError>
where
    W: Write + ?Sized,
{
    let len = frame_len(payload)?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Builds a [`Codec`] that frames `format` over two handles of `stream`.
pub(crate) fn framed<F: Format>(stream: Box<dyn Stream>, format: F) -> io::Result<Codec> {
    let write_half = stream.try_clone_stream()?;
    let reader = FramedReader {
        stream: BufReader::new(stream),
        format: format.clone(),
        buf: Vec::new(),
    };
    let writer = FramedWriter {
        stream: BufWriter::new(write_half),
        format,
        header: Vec::new(),
        body: Vec::new(),
    };
    Ok(Codec::new(Box::new(reader), Box::new(writer)))
}

struct FramedReader<F> {
    stream: BufReader<Box<dyn Stream>>,
    format: F,
    buf: Vec<u8>,
}

impl<F: Format> CodecReader for FramedReader<F> {
    fn read_header(&mut self) -> Result<Header, CodecError> {
        read_frame(&mut self.stream, &mut self.buf)?;
        self.format.decode_header(&self.buf)
    }

    fn read_body(&mut self) -> Result<Value, CodecError> {
        read_frame(&mut self.stream, &mut self.buf)?;
        self.format.decode_body(&self.buf)
    }
}

struct FramedWriter<F> {
    stream: BufWriter<Box<dyn Stream>>,
    format: F,
    header: Vec<u8>,
    body: Vec<u8>,
}

impl<F: Format> CodecWriter for FramedWriter<F> {
    fn write(&mut self, header: &Header, body: &Value) -> Result<(), CodecError> {
        // Nothing reaches the stream unless both frames can be sent.
        self.header.clear();
        self.body.clear();
        self.format.encode_header(header, &mut self.header)?;
        self.format.encode_body(body, &mut self.body)?;
        let header_len = frame_len(&self.header)?;
        let body_len = frame_len(&self.body)?;

        self.stream.write_all(&header_len.to_be_bytes())?;
        self.stream.write_all(&self.header)?;
        self.stream.write_all(&body_len.to_be_bytes())?;
        self.stream.write_all(&self.body)?;
        self.stream.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        self.stream.flush()?;
        self.stream.get_ref().shutdown()?;
        Ok(())
    }
}
