//! Error types for the storage engine.

use std::io;

use thiserror::Error;

use crate::pager::PageNum;
use crate::row::{COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE};

/// Result type alias using [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;

/// A row rejected before it reaches the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("id {0} is negative")]
    NegativeId(i64),

    #[error("id {0} does not fit in 32 bits")]
    IdOutOfRange(i64),

    #[error("username is {len} bytes (max {max})", max = COLUMN_USERNAME_SIZE)]
    UsernameTooLong { len: usize },

    #[error("email is {len} bytes (max {max})", max = COLUMN_EMAIL_SIZE)]
    EmailTooLong { len: usize },

    #[error("{field} contains a NUL byte")]
    EmbeddedNul { field: &'static str },
}

/// Errors raised by the pager, the B+tree and the table.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt database file: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("duplicate key {0}")]
    DuplicateKey(u32),

    #[error("table full: page limit of {max_pages} reached")]
    TableFull { max_pages: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cursor is past the end of the table")]
    CursorAtEnd,
}

impl StorageError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub(crate) fn unknown_node_type(page_num: PageNum, tag: u8) -> Self {
        Self::Corrupt(format!("page {page_num} has unknown node type {tag}"))
    }
}
