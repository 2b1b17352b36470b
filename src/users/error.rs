use std::fmt;

use mongodb::bson::oid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Storage operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    FindOne,
    FindAll,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::FindOne => "find one",
            Operation::FindAll => "find all",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Errors returned by every `UserStorage` operation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{op}: invalid user id {id:?}")]
    InvalidIdentifier {
        op: Operation,
        id: String,
        #[source]
        source: oid::Error,
    },
    #[error("{op}: user(id: {id}) not found")]
    NotFound { op: Operation, id: String },
    #[error("{op}: failed to convert inserted id {inserted} to hex")]
    Conversion { op: Operation, inserted: String },
    #[error("failed to {op} {target}: {source}")]
    Persistence {
        op: Operation,
        target: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    pub fn not_found(op: Operation, id: impl Into<String>) -> Self {
        Self::NotFound { op, id: id.into() }
    }

    pub fn persistence(op: Operation, id: Option<&str>, source: impl Into<BoxError>) -> Self {
        let target = match id {
            Some(id) => format!("user(id: {id})"),
            None => "users".to_string(),
        };
        Self::Persistence {
            op,
            target,
            source: source.into(),
        }
    }
}
