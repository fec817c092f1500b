// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy shared by every marshalling operation.
//!
//! Errors form a causal chain: wrapping variants hold a boxed `cause` exposed
//! through [`std::error::Error::source`], and [`Error::full_message`] renders
//! the whole chain the way it is reported to callers:
//!
//! ```text
//! Failed to unmarshall property 'aString' of class 'MyObject'
//! [caused by]: Cannot convert type 'double' to type 'string'
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Separator inserted between chained error messages.
pub const CAUSED_BY_SEPARATOR: &str = "\n[caused by]: ";

/// Conversion direction, used when reporting property failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `Value` into a platform value.
    Unmarshall,
    /// Platform value into a `Value`.
    Marshall,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Unmarshall => write!(f, "unmarshall"),
            Direction::Marshall => write!(f, "marshall"),
        }
    }
}

/// Marshalling engine errors.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A schema key was never registered and no listener could provide it.
    #[error("Type not registered in ValueSchemaRegistry")]
    TypeNotRegistered,

    /// A named type reference failed to resolve.
    #[error("Could not resolve type reference '{name}'")]
    UnresolvedTypeReference {
        name: String,
        #[source]
        cause: Box<Error>,
    },

    /// A positional reference points past the provided type arguments.
    #[error("Missing type argument at position {index} (types arguments are {arguments})")]
    OutOfBoundsGenericIndex { index: usize, arguments: String },

    /// A class property failed to convert.
    #[error("Failed to {direction} property '{property}' of class '{class}'")]
    PropertyConversion {
        class: String,
        property: String,
        direction: Direction,
        #[source]
        cause: Box<Error>,
    },

    /// No enum case matches the given value.
    #[error("Invalid enum case '{value}' for enum '{enum_name}'")]
    EnumCaseNotFound { enum_name: String, value: String },

    /// A reference hinted as an enum resolved to something else.
    #[error("Type '{name}' is not an enum")]
    NotAnEnum { name: String },

    /// A proxy was requested for a class that is not an interface.
    #[error("Expected an interface schema, got class '{class}'")]
    ExpectedInterfaceSchema { class: String },

    /// An error raised by the host while servicing a call.
    #[error("{message}")]
    HostCall {
        message: String,
        stack: Option<String>,
    },

    /// The context configuration was rejected.
    #[error("Invalid marshalling configuration")]
    Config(#[source] Arc<ConfigError>),

    /// Schema text could not be parsed.
    #[error("{0}")]
    SchemaParse(String),

    /// A value had the wrong dynamic type.
    #[error("Cannot convert type '{actual}' to type '{expected}'")]
    TypeMismatch {
        actual: &'static str,
        expected: &'static str,
    },

    /// The operation's promise was cancelled.
    #[error("Promise was cancelled")]
    Cancelled,

    /// Free-form failure.
    #[error("{0}")]
    Message(String),

    /// A failure annotated with the operation that was in progress.
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        cause: Box<Error>,
    },
}

impl Error {
    /// Free-form error.
    pub fn message(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Error raised inside a host call.
    pub fn host_call(message: impl Into<String>) -> Self {
        Error::HostCall {
            message: message.into(),
            stack: None,
        }
    }

    /// Error raised inside a host call, with the host's stack trace.
    pub fn host_call_with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Error::HostCall {
            message: message.into(),
            stack: Some(stack.into()),
        }
    }

    /// Type mismatch between an actual and an expected type name.
    pub fn type_mismatch(actual: &'static str, expected: &'static str) -> Self {
        Error::TypeMismatch { actual, expected }
    }

    /// Wrap `self` under a context message.
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Self {
        Error::Context {
            message: message.into(),
            cause: Box::new(self),
        }
    }

    /// Wrap `self` as the cause of a failing class property.
    #[must_use]
    pub fn in_property(self, class: &str, property: &str, direction: Direction) -> Self {
        Error::PropertyConversion {
            class: class.to_string(),
            property: property.to_string(),
            direction,
            cause: Box::new(self),
        }
    }

    /// Whether this error reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The whole causal chain, one message per link.
    pub fn full_message(&self) -> String {
        let mut out = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str(CAUSED_BY_SEPARATOR);
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }

    /// Innermost error of the chain.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::UnresolvedTypeReference { cause, .. }
            | Error::PropertyConversion { cause, .. }
            | Error::Context { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(Arc::new(err))
    }
}

/// Attach context to fallible results.
pub trait ResultExt<T> {
    /// Wrap the error under `message`.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Wrap the error under a lazily built message.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.context(message))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.context(f()))
    }
}
