use std::{collections::HashMap, io};

use log::debug;

use crate::net::Stream;

use super::{BINCODE, BincodeCodec, Codec, JSON, JsonCodec};

/// Wraps a freshly negotiated stream in a codec.
pub type NewCodecFn = fn(Box<dyn Stream>) -> io::Result<Codec>;

/// Codec constructors keyed by the `codecType` sent in the handshake.
///
/// [`CodecRegistry::default`] knows only [`BINCODE`] and [`JSON`]. Peers that
/// ask for another name, such as `gob`, are refused unless that name is
/// registered too:
///
/// ```rust
/// use mrpc::{CodecRegistry, codec::BincodeCodec};
///
/// let mut codecs = CodecRegistry::default();
/// assert!(!codecs.contains("gob"));
/// codecs.register("gob", BincodeCodec::new);
/// assert!(codecs.contains("gob"));
/// ```
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, NewCodecFn>,
}

impl CodecRegistry {
    /// An empty registry; every handshake is refused until codecs are added.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Adds or replaces the constructor for `codec_type`.
    pub fn register(&mut self, codec_type: impl Into<String>, new_codec: NewCodecFn) {
        let codec_type = codec_type.into();
        debug!("registering codec '{codec_type}'");
        self.codecs.insert(codec_type, new_codec);
    }

    pub fn get(&self, codec_type: &str) -> Option<NewCodecFn> {
        self.codecs.get(codec_type).copied()
    }

    pub fn contains(&self, codec_type: &str) -> bool {
        self.codecs.contains_key(codec_type)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(BINCODE, BincodeCodec::new);
        registry.register(JSON, JsonCodec::new);
        registry
    }
}
