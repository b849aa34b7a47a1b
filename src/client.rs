//! Blocking client for an mrpc server.
//!
//! A [`Client`] sends the handshake, then issues one call at a time over the
//! negotiated codec. Sequence numbers start at 1 and grow by one per call.
use std::{
    io,
    net::{TcpStream, ToSocketAddrs},
};

use log::debug;
use thiserror::Error;

use crate::{
    codec::{Codec, CodecError, CodecRegistry},
    net::Stream,
    protocol::{Header, NegotiationError, Options, Payload, ValueKind, write_options},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("server error: {0}")]
    Remote(String),
    #[error("response seq {got} does not match request seq {expected}")]
    OutOfSequence { expected: u64, got: u64 },
    #[error("expected {expected} reply, got {got}")]
    UnexpectedReply { expected: ValueKind, got: ValueKind },
}

pub struct Client {
    codec: Codec,
    seq: u64,
}

impl Client {
    /// Connects over TCP using the built-in codecs.
    pub fn dial(addr: impl ToSocketAddrs, options: &Options) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        Self::with_stream(Box::new(stream), options, &CodecRegistry::default())
    }

    pub fn with_stream(
        mut stream: Box<dyn Stream>,
        options: &Options,
        codecs: &CodecRegistry,
    ) -> Result<Self, ClientError> {
        let new_codec = codecs
            .get(&options.codec_type)
            .ok_or_else(|| NegotiationError::UnknownCodec(options.codec_type.clone()))?;

        write_options(&mut stream, options)?;
        debug!("sent options {options:?} to {}", stream.peer());

        Ok(Self {
            codec: new_codec(stream)?,
            seq: 0,
        })
    }

    /// Calls `service_method` and waits for its reply.
    pub fn call<A, R>(&mut self, service_method: &str, arg: A) -> Result<R, ClientError>
    where
        A: Payload,
        R: Payload,
    {
        self.seq += 1;
        let header = Header::new(service_method, self.seq);
        self.codec.write(&header, &arg.into_value())?;

        let reply = self.codec.read_header()?;
        let body = self.codec.read_body()?;
        if reply.seq != header.seq {
            return Err(ClientError::OutOfSequence {
                expected: header.seq,
                got: reply.seq,
            });
        }
        if reply.is_error() {
            return Err(ClientError::Remote(reply.error));
        }

        R::from_value(body).map_err(|body| ClientError::UnexpectedReply {
            expected: R::KIND,
            got: body.kind(),
        })
    }

    pub fn close(mut self) -> Result<(), ClientError> {
        self.codec.close()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{os::unix::net::UnixStream, thread};

    use crate::{
        Value,
        codec::{BINCODE, BincodeCodec},
        protocol::negotiate,
    };

    use super::*;

    /// Plays the server side by hand: negotiates, then answers each request
    /// with `reply(header)`.
    fn fake_server<F>(conn: UnixStream, calls: usize, reply: F) -> thread::JoinHandle<()>
    where
        F: Fn(Header) -> (Header, Value) + Send + 'static,
    {
        thread::spawn(move || {
            let mut conn: Box<dyn Stream> = Box::new(conn);
            let (options, new_codec) = negotiate(&mut conn, &CodecRegistry::default()).unwrap();
            assert_eq!(options.codec_type, BINCODE);

            let mut codec = new_codec(conn).unwrap();
            for _ in 0..calls {
                let header = codec.read_header().unwrap();
                codec.read_body().unwrap();
                let (header, body) = reply(header);
                codec.write(&header, &body).unwrap();
            }
        })
    }

    fn client(calls: usize, reply: fn(Header) -> (Header, Value)) -> (Client, thread::JoinHandle<()>) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let server = fake_server(theirs, calls, reply);
        let client =
            Client::with_stream(Box::new(ours), &Options::default(), &CodecRegistry::default())
                .unwrap();
        (client, server)
    }

    #[test]
    fn sequence_numbers_start_at_one() {
        let (mut client, server) = client(3, |h| {
            let seq = h.seq;
            (h, Value::Uint(seq))
        });

        for expected in 1..=3u64 {
            let seq: u64 = client.call("Service.Seq", ()).unwrap();
            assert_eq!(seq, expected);
        }
        server.join().unwrap();
    }

    #[test]
    fn remote_error_is_surfaced() {
        let (mut client, server) = client(1, |mut h| {
            h.error = String::from("boom");
            (h, Value::Unit)
        });

        let err = client.call::<_, ()>("Service.Fail", ()).unwrap_err();
        assert!(matches!(err, ClientError::Remote(ref e) if e == "boom"));
        server.join().unwrap();
    }

    #[test]
    fn mismatched_seq_is_rejected() {
        let (mut client, server) = client(1, |mut h| {
            h.seq += 10;
            (h, Value::Unit)
        });

        let err = client.call::<_, ()>("Service.Any", ()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::OutOfSequence {
                expected: 1,
                got: 11
            }
        ));
        server.join().unwrap();
    }

    #[test]
    fn unexpected_reply_kind() {
        let (mut client, server) = client(1, |h| (h, Value::from("text")));

        let err = client.call::<_, u64>("Service.Any", ()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedReply {
                expected: ValueKind::Uint,
                got: ValueKind::Str
            }
        ));
        server.join().unwrap();
    }

    #[test]
    fn unknown_local_codec_is_rejected_before_sending() {
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let mut codecs = CodecRegistry::new();
        codecs.register("gob", BincodeCodec::new);

        let err = Client::with_stream(Box::new(ours), &Options::default(), &codecs).err();
        assert!(matches!(
            err,
            Some(ClientError::Negotiation(NegotiationError::UnknownCodec(_)))
        ));
    }
}
