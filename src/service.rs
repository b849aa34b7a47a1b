//! Method dispatch.
//!
//! The server pipeline only needs two things from whatever answers requests:
//! the argument kind a method expects, so the body can be checked once it is
//! read, and a way to invoke the method. [`Dispatcher`] captures exactly
//! that. [`ServiceRegistry`] is the provided implementation: an explicit map
//! from `Service.Method` names to typed handlers, built up front.
//!
//! # Example
//! ```rust
//! use mrpc::{Dispatcher, ServiceRegistry, Value};
//!
//! let mut services = ServiceRegistry::new();
//! services
//!     .register("Arith.Double", |n: u64| Ok::<_, String>(n * 2))
//!     .unwrap();
//!
//! assert_eq!(services.invoke("Arith.Double", Value::Uint(21)), Ok(Value::Uint(42)));
//! ```
use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::protocol::{Payload, Value, ValueKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("service/method request ill-formed: '{0}'")]
    IllFormed(String),

    #[error("can't find method '{0}'")]
    UnknownMethod(String),

    #[error("method '{0}' is already registered")]
    Duplicate(String),
}

/// Resolves `Service.Method` names to behavior.
pub trait Dispatcher: Send + Sync {
    /// The argument kind `service_method` expects in its request body.
    fn argument_kind(&self, service_method: &str) -> Result<ValueKind, DispatchError>;

    /// Runs `service_method`; the error text is returned to the caller verbatim.
    fn invoke(&self, service_method: &str, arg: Value) -> Result<Value, String>;
}

type Handler = Box<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

struct Method {
    argument: ValueKind,
    handler: Handler,
}

#[derive(Default)]
pub struct ServiceRegistry {
    methods: HashMap<String, Method>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    ///
    /// The name must be `Service.Method` with both parts non-empty, and may
    /// only be registered once.
    pub fn register<A, R, E, F>(&mut self, name: &str, handler: F) -> Result<(), DispatchError>
    where
        A: Payload + 'static,
        R: Payload + 'static,
        E: ToString + 'static,
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    {
        split_name(name)?;
        if self.methods.contains_key(name) {
            return Err(DispatchError::Duplicate(name.to_string()));
        }

        let handler: Handler = Box::new(move |arg: Value| {
            let arg = A::from_value(arg)
                .map_err(|v| format!("expected {} argument, got {}", A::KIND, v.kind()))?;
            handler(arg)
                .map(Payload::into_value)
                .map_err(|e| e.to_string())
        });

        debug!("registered method '{name}' taking {}", A::KIND);
        self.methods.insert(
            name.to_string(),
            Method {
                argument: A::KIND,
                handler,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn method(&self, service_method: &str) -> Result<&Method, DispatchError> {
        split_name(service_method)?;
        self.methods
            .get(service_method)
            .ok_or_else(|| DispatchError::UnknownMethod(service_method.to_string()))
    }
}

impl Dispatcher for ServiceRegistry {
    fn argument_kind(&self, service_method: &str) -> Result<ValueKind, DispatchError> {
        Ok(self.method(service_method)?.argument)
    }

    fn invoke(&self, service_method: &str, arg: Value) -> Result<Value, String> {
        let method = self.method(service_method).map_err(|e| e.to_string())?;
        (method.handler)(arg)
    }
}

/// Splits `Service.Method` at the last dot.
fn split_name(name: &str) -> Result<(&str, &str), DispatchError> {
    match name.rsplit_once('.') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service, method))
        }
        _ => Err(DispatchError::IllFormed(name.to_string())),
    }
}
