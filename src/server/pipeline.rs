use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
    thread,
};

use log::{debug, trace, warn};

use crate::{
    codec::{Codec, CodecError, CodecReader, CodecWriter},
    protocol::{Header, Value},
    service::Dispatcher,
};

use super::request::{ReadError, Request};

type Sending = Mutex<Box<dyn CodecWriter>>;

/// Serves requests on `codec` until the peer closes or a header cannot be read.
///
/// Every request is handled on its own scoped thread while the next one is
/// read. Responses are written under a per-connection lock, in completion
/// order. All handlers are joined before the codec is closed.
pub(super) fn serve_codec(
    codec: Codec,
    dispatcher: &dyn Dispatcher,
    peer: &str,
) -> Result<(), CodecError> {
    let (mut reader, writer) = codec.split();
    let sending: Sending = Mutex::new(writer);

    let outcome = thread::scope(|scope| {
        let mut dispatched = 0usize;
        let outcome = loop {
            match read_request(reader.as_mut(), dispatcher) {
                Ok(req) => {
                    let header = req.header.clone();
                    let sending = &sending;
                    let spawned = thread::Builder::new()
                        .spawn_scoped(scope, move || handle_request(dispatcher, req, sending));
                    match spawned {
                        Ok(_) => dispatched += 1,
                        Err(e) => refuse_request(sending, header, &e),
                    }
                }
                Err(ReadError::Closed) => {
                    debug!("{peer} closed the stream");
                    break Ok(());
                }
                Err(ReadError::Header(e)) => {
                    warn!("{peer}: failed to read request header, no further reads: {e}");
                    break Err(e);
                }
                Err(ReadError::Invalid { mut header, reason }) => {
                    warn!(
                        "{peer}: rejecting '{}' seq {}: {reason}",
                        header.service_method, header.seq
                    );
                    header.error = reason;
                    send_response(&sending, &header, &Value::Unit);
                }
            }
        };
        debug!("{peer}: draining {dispatched} dispatched requests");
        outcome
    });

    let mut writer = sending.into_inner().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = writer.close() {
        debug!("{peer}: error while closing: {e}");
    }
    outcome
}

fn read_request(
    reader: &mut dyn CodecReader,
    dispatcher: &dyn Dispatcher,
) -> Result<Request, ReadError> {
    let mut header = match reader.read_header() {
        Ok(header) => header,
        Err(CodecError::Closed) => return Err(ReadError::Closed),
        Err(e) => return Err(ReadError::Header(e)),
    };
    header.error.clear();
    trace!("read header {header:?}");

    // Resolve before reading so the body is consumed whatever the outcome.
    let expected = dispatcher.argument_kind(&header.service_method);
    let arg = match reader.read_body() {
        Ok(arg) => arg,
        Err(e) => {
            return Err(ReadError::Invalid {
                header,
                reason: format!("failed to read request body: {e}"),
            });
        }
    };

    match expected {
        Ok(kind) if kind.accepts(arg.kind()) => Ok(Request { header, arg }),
        Ok(kind) => {
            let reason = format!("expected {kind} argument, got {}", arg.kind());
            Err(ReadError::Invalid { header, reason })
        }
        Err(e) => Err(ReadError::Invalid {
            header,
            reason: e.to_string(),
        }),
    }
}

fn handle_request(dispatcher: &dyn Dispatcher, req: Request, sending: &Sending) {
    let Request { mut header, arg } = req;
    debug!("handling '{}' seq {}", header.service_method, header.seq);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatcher.invoke(&header.service_method, arg)
    }))
    .unwrap_or_else(|_| Err(format!("method '{}' panicked", header.service_method)));

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            header.error = e;
            Value::Unit
        }
    };
    send_response(sending, &header, &reply);
}

fn refuse_request(sending: &Sending, mut header: Header, e: &io::Error) {
    warn!(
        "no thread for '{}' seq {}: {e}",
        header.service_method, header.seq
    );
    header.error = format!("failed to start method '{}': {e}", header.service_method);
    send_response(sending, &header, &Value::Unit);
}

/// Writes one response. A reply that cannot be encoded or framed is replaced
/// by an error response so the request is still answered.
fn send_response(sending: &Sending, header: &Header, body: &Value) {
    let mut writer = sending.lock().unwrap_or_else(PoisonError::into_inner);
    let e = match writer.write(header, body) {
        Ok(()) => return,
        Err(e @ CodecError::Io(_)) => {
            warn!("failed to write response seq {}: {e}", header.seq);
            return;
        }
        Err(e) => e,
    };

    warn!("unsendable response seq {}: {e}", header.seq);
    let mut header = header.clone();
    header.error = format!("failed to send response: {e}");
    if let Err(e) = writer.write(&header, &Value::Unit) {
        warn!("failed to write response seq {}: {e}", header.seq);
    }
}
