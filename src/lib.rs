pub mod client;
pub mod codec;
pub mod net;
pub mod protocol;
pub mod server;
pub mod service;

pub use client::{Client, ClientError};
pub use codec::{Codec, CodecError, CodecRegistry};
pub use net::{Listener, Stream};
pub use protocol::{Header, Options, Payload, Value, ValueKind};
pub use server::Server;
pub use service::{DispatchError, Dispatcher, ServiceRegistry};
