use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Argument or reply carried in the body of a message.
///
/// Codecs only turn bytes into a [`Value`] and back; what the value means is
/// left to the method that receives it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum Value {
    /// Empty body. Also sent as the reply of a request that could not be served.
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Shape of a [`Value`], used by methods to declare the argument they expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unit,
    Bool,
    Int,
    Uint,
    Str,
    Bytes,
    /// Matches every kind.
    Any,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Uint(_) => ValueKind::Uint,
            Value::Str(_) => ValueKind::Str,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }
}

impl ValueKind {
    pub fn accepts(self, other: ValueKind) -> bool {
        self == ValueKind::Any || self == other
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unit => "unit",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Uint => "uint",
            ValueKind::Str => "str",
            ValueKind::Bytes => "bytes",
            ValueKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// Rust types that travel as a [`Value`].
///
/// Typed method handlers and [`Client::call`](crate::Client::call) convert
/// through this trait, so a method declares its argument kind once via
/// [`Payload::KIND`].
pub trait Payload: Sized {
    const KIND: ValueKind;

    /// Unwraps `value`, handing it back unchanged when the kind does not match.
    fn from_value(value: Value) -> Result<Self, Value>;

    fn into_value(self) -> Value;
}

macro_rules! impl_payload {
    ($ty:ty, $variant:ident) => {
        impl Payload for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_payload!(bool, Bool);
impl_payload!(i64, Int);
impl_payload!(u64, Uint);
impl_payload!(String, Str);
impl_payload!(Vec<u8>, Bytes);

impl Payload for () {
    const KIND: ValueKind = ValueKind::Unit;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Unit => Ok(()),
            other => Err(other),
        }
    }

    fn into_value(self) -> Value {
        Value::Unit
    }
}

impl Payload for Value {
    const KIND: ValueKind = ValueKind::Any;

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}
