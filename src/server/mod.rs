//! Connection handling.
//!
//! [`Server::accept`] takes streams from a [`Listener`] and serves each on its
//! own thread. Serving a connection means negotiating a codec from the
//! handshake and then running the request pipeline until the peer goes away.
//!
//! # Failure scopes
//!
//! - Listener errors other than transient accept failures end
//!   [`Server::accept`] with [`Error::Transport`].
//! - A bad handshake closes that connection only; nothing is read after it.
//! - A header that cannot be read stops reading on that connection. Requests
//!   already dispatched still run and their responses are flushed before the
//!   stream is closed.
//! - A body that cannot be read, an unknown method, or a handler failure is
//!   answered with an error response and the connection carries on.
//!
//! Nothing bounds the number of connections or of in-flight requests per
//! connection, and reads have no timeout: a peer that stops halfway through a
//! frame holds its connection's read loop until it disconnects.
use std::{io, sync::Arc, thread};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{
    codec::{Codec, CodecError, CodecRegistry},
    net::{Listener, Stream},
    protocol::{NegotiationError, negotiate},
    service::Dispatcher,
};

mod pipeline;
mod request;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),
    #[error("connection error: {0}")]
    Codec(#[from] CodecError),
}

/// An RPC server. Cloning is cheap; clones share codecs and dispatcher.
#[derive(Clone)]
pub struct Server {
    codecs: Arc<CodecRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Server {
    pub fn new(codecs: CodecRegistry, dispatcher: impl Dispatcher + 'static) -> Self {
        Self {
            codecs: Arc::new(codecs),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Accepts streams until `listener` fails, serving each on a new thread.
    ///
    /// Never waits for a connection to finish before accepting the next one.
    pub fn accept<L>(&self, listener: &L) -> Result<(), Error>
    where
        L: Listener + ?Sized,
    {
        info!("accepting connections at {}", listener.local());
        let mut accepted = 0u64;

        loop {
            let stream = match listener.accept_stream() {
                Ok(stream) => stream,
                Err(e) if is_transient(&e) => {
                    warn!("broken connection: {e:?}");
                    continue;
                }
                Err(e) => {
                    error!("accept error, no longer accepting: {e}");
                    return Err(e.into());
                }
            };

            accepted += 1;
            let server = self.clone();
            let spawned = thread::Builder::new()
                .name(format!("mrpc-conn-{accepted}"))
                .spawn(move || {
                    let peer = stream.peer();
                    info!("serving connection from {peer}");
                    match server.serve_conn(stream) {
                        Ok(()) => info!("connection from {peer} closed"),
                        Err(e) => warn!("connection from {peer} failed: {e}"),
                    }
                });
            if let Err(e) = spawned {
                error!("failed to spawn connection thread: {e}");
            }
        }
    }

    /// Negotiates a codec on `stream` and serves requests until it closes.
    ///
    /// On a failed handshake the stream is shut down without reading further.
    pub fn serve_conn(&self, mut stream: Box<dyn Stream>) -> Result<(), Error> {
        let peer = stream.peer();
        let new_codec = match negotiate(&mut stream, &self.codecs) {
            Ok((options, new_codec)) => {
                debug!("{peer} negotiated codec '{}'", options.codec_type);
                new_codec
            }
            Err(e) => {
                if let Err(e) = stream.shutdown() {
                    debug!("{peer}: error while closing: {e}");
                }
                return Err(e.into());
            }
        };

        let codec = new_codec(stream)?;
        pipeline::serve_codec(codec, self.dispatcher.as_ref(), &peer)?;
        Ok(())
    }

    /// Runs the request pipeline on an already negotiated codec.
    pub fn serve_codec(&self, codec: Codec) -> Result<(), Error> {
        pipeline::serve_codec(codec, self.dispatcher.as_ref(), "codec")?;
        Ok(())
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
