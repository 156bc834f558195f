//! Message-type registry.
//!
//! Maps every known message type id to the codec that decodes it, so a
//! receive path can turn an arbitrary inbound [`Message`] into typed
//! parameters without knowing the operation up front. The registry is built
//! once and then only read; share it behind an `Arc`.

use crate::error::ProtocolError;
use crate::layout::{FieldLayout, Role};
use crate::message::Message;
use crate::operation::{MessageCodec, OperationCodec};
use crate::ops;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Decoded parameters of any registered message type.
pub trait Params: fmt::Debug + Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: fmt::Debug + Any + Send + Sync> Params for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result of decoding a message through the registry.
#[derive(Debug)]
pub struct Decoded {
    pub message_type: i32,
    pub correlation_id: i64,
    pub operation: &'static str,
    pub role: Role,
    pub params: Box<dyn Params>,
}

impl Decoded {
    /// Returns the parameters as `T` if that is their concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.params).as_any().downcast_ref::<T>()
    }
}

/// A registered message type, as listed by [`Registry::entries`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegistryEntry {
    pub operation: &'static str,
    pub layout: &'static FieldLayout,
}

type DecodeFn = Box<dyn Fn(&Message) -> Result<Box<dyn Params>, ProtocolError> + Send + Sync>;

struct Entry {
    operation: &'static str,
    layout: &'static FieldLayout,
    decode: DecodeFn,
}

fn erase<P: Params>(codec: &'static MessageCodec<P>) -> DecodeFn {
    Box::new(move |message| {
        codec
            .decode(message)
            .map(|params| Box::new(params) as Box<dyn Params>)
    })
}

/// Message type id to codec map.
pub struct Registry {
    entries: HashMap<i32, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Creates a registry holding every operation this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.insert_operation(&ops::PING);
        registry.insert_operation(&ops::SUBMIT_TO_PARTITION);
        registry.insert_operation(&ops::SUBMIT_TO_MEMBER);
        registry.insert_operation(&ops::GET_ALL_SCHEDULED_FUTURES);
        registry.insert("Client.Errors", &ops::ERRORS);
        registry
    }

    /// Registers both directions of an operation.
    pub fn register<Req: Params, Resp: Params>(
        &mut self,
        codec: &'static OperationCodec<Req, Resp>,
    ) -> Result<(), ProtocolError> {
        self.check_free(codec.request_type())?;
        self.check_free(codec.response_type())?;
        if codec.request_type() == codec.response_type() {
            return Err(ProtocolError::DuplicateMessageType(codec.request_type()));
        }
        self.insert_operation(codec);
        Ok(())
    }

    /// Registers a message type that only ever travels as a response, such
    /// as the error response.
    pub fn register_response_only<Resp: Params>(
        &mut self,
        operation: &'static str,
        codec: &'static MessageCodec<Resp>,
    ) -> Result<(), ProtocolError> {
        self.check_free(codec.message_type())?;
        self.insert(operation, codec);
        Ok(())
    }

    /// Decodes `message` with the codec registered for its message type.
    pub fn decode(&self, message: &Message) -> Result<Decoded, ProtocolError> {
        let message_type = message.message_type()?;
        let Some(entry) = self.entries.get(&message_type) else {
            tracing::warn!("Unknown message type {:#08x}", message_type);
            return Err(ProtocolError::UnknownMessageType(message_type));
        };

        let params = (entry.decode)(message)?;
        Ok(Decoded {
            message_type,
            correlation_id: message.correlation_id()?,
            operation: entry.operation,
            role: entry.layout.role,
            params,
        })
    }

    pub fn contains(&self, message_type: i32) -> bool {
        self.entries.contains_key(&message_type)
    }

    pub fn operation_name(&self, message_type: i32) -> Option<&'static str> {
        self.entries.get(&message_type).map(|e| e.operation)
    }

    pub fn layout(&self, message_type: i32) -> Option<&'static FieldLayout> {
        self.entries.get(&message_type).map(|e| e.layout)
    }

    /// Lists registered message types ordered by id.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .map(|e| RegistryEntry {
                operation: e.operation,
                layout: e.layout,
            })
            .collect();
        entries.sort_by_key(|e| e.layout.message_type);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_free(&self, message_type: i32) -> Result<(), ProtocolError> {
        if self.entries.contains_key(&message_type) {
            return Err(ProtocolError::DuplicateMessageType(message_type));
        }
        Ok(())
    }

    fn insert_operation<Req: Params, Resp: Params>(
        &mut self,
        codec: &'static OperationCodec<Req, Resp>,
    ) {
        self.insert(codec.name, &codec.request);
        self.insert(codec.name, &codec.response);
    }

    fn insert<P: Params>(&mut self, operation: &'static str, codec: &'static MessageCodec<P>) {
        self.entries.insert(
            codec.message_type(),
            Entry {
                operation,
                layout: codec.layout,
                decode: erase(codec),
            },
        );
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries().iter().map(|e| e.operation))
            .finish()
    }
}
