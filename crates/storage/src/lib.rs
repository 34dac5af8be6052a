//! Storage engine: pager, B+tree, and on-disk format.
//!
//! This crate provides:
//! - File header management (magic, page size, root page pointer)
//! - Page cache over a single file, bounded by a page limit (pager)
//! - Fixed-width row codec
//! - B+tree of rows keyed by id, with leaf and internal splits
//! - Cursors over the leaf chain
//! - `Table`, which ties the above together behind open/insert/select/close

pub mod btree;
pub mod config;
pub mod cursor;
pub mod error;
pub mod header;
pub mod node;
pub mod pager;
pub mod row;
pub mod table;

pub use btree::BTree;
pub use config::{TableConfig, TABLE_MAX_PAGES};
pub use cursor::Cursor;
pub use error::{Result, StorageError, ValidationError};
pub use header::FileHeader;
pub use pager::{PageNum, Pager};
pub use row::Row;
pub use table::Table;
