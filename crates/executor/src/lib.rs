/// Statement executor: runs parsed statements against a `Table`.
///
/// Inserts build and validate a `Row` before touching storage, so a rejected
/// statement never changes the table. Selects walk a cursor over the leaf
/// chain and return rows in ascending id order.

use thiserror::Error;
use tracing::debug;

use tabula_parser::ast::Statement;
use tabula_storage::node::{
    COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS,
};
use tabula_storage::row::ROW_SIZE;
use tabula_storage::{Row, StorageError, Table, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Inserted,
    Rows(Vec<Row>),
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("duplicate key {0}")]
    DuplicateKey(u32),

    #[error("table full: page limit of {max_pages} reached")]
    TableFull { max_pages: u32 },

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ExecuteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(err) => Self::Validation(err),
            StorageError::DuplicateKey(key) => Self::DuplicateKey(key),
            StorageError::TableFull { max_pages } => Self::TableFull { max_pages },
            other => Self::Storage(other),
        }
    }
}

pub type ExecResult<T> = Result<T, ExecuteError>;

pub fn execute(statement: &Statement, table: &mut Table) -> ExecResult<ExecuteOutcome> {
    match statement {
        Statement::Insert {
            id,
            username,
            email,
        } => {
            let row = Row::new(*id, username.as_str(), email.as_str())?;
            table.insert(&row)?;
            debug!(id = row.id, "inserted row");
            Ok(ExecuteOutcome::Inserted)
        }
        Statement::Select => {
            let rows = table
                .start()?
                .collect::<Result<Vec<_>, StorageError>>()?;
            Ok(ExecuteOutcome::Rows(rows))
        }
    }
}

/// The `.btree` rendering of the table.
pub fn render_tree(table: &mut Table) -> ExecResult<String> {
    Ok(table.render_tree()?)
}

/// The `.constants` listing: the node layout sizes, one `NAME: value` per line.
pub fn constants() -> String {
    let mut out = String::new();
    for (name, value) in [
        ("ROW_SIZE", ROW_SIZE),
        ("COMMON_NODE_HEADER_SIZE", COMMON_NODE_HEADER_SIZE),
        ("LEAF_NODE_HEADER_SIZE", LEAF_NODE_HEADER_SIZE),
        ("LEAF_NODE_CELL_SIZE", LEAF_NODE_CELL_SIZE),
        ("LEAF_NODE_SPACE_FOR_CELLS", LEAF_NODE_SPACE_FOR_CELLS),
        ("LEAF_NODE_MAX_CELLS", LEAF_NODE_MAX_CELLS),
    ] {
        out.push_str(&format!("{name}: {value}\n"));
    }
    out
}
