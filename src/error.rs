use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenError>;

/// Errors produced by a generation run.
///
/// `Parse` and `UnresolvedReference` abort the whole run. `UnsupportedOperation`
/// only ever describes a single operation and is normally collected as a
/// diagnostic instead of being returned.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("malformed schema document at {location}: {reason}")]
    Parse { location: String, reason: String },

    #[error("unresolved reference `{name}` at {location}")]
    UnresolvedReference { name: String, location: String },

    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperation),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to emit generated source: {0}")]
    Emit(#[from] syn::Error),
}

impl GenError {
    pub(crate) fn parse(location: impl Into<String>, reason: impl Into<String>) -> Self {
        GenError::Parse {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(name: impl Into<String>, location: impl Into<String>) -> Self {
        GenError::UnresolvedReference {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Schema location the error originates from, if it has one.
    pub fn location(&self) -> Option<&str> {
        match self {
            GenError::Parse { location, .. } | GenError::UnresolvedReference { location, .. } => {
                Some(location)
            }
            GenError::UnsupportedOperation(skipped) => Some(&skipped.operation),
            GenError::Io { .. } | GenError::Emit(_) => None,
        }
    }
}

/// An operation the synthesizer could not express; it is skipped and reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skipped operation {operation}: {reason}")]
pub struct UnsupportedOperation {
    /// Operation label, e.g. `POST /pet/{petId}/uploadImage (uploadFile)`.
    pub operation: String,
    pub reason: String,
}

impl UnsupportedOperation {
    pub(crate) fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        UnsupportedOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
