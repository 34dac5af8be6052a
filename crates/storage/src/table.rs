//! The single table: a pager plus the B+tree rooted where the header says.

use std::path::Path;

use tracing::{info, warn};

use crate::btree::BTree;
use crate::config::TableConfig;
use crate::cursor::Cursor;
use crate::error::{Result, StorageError};
use crate::pager::{PageNum, Pager};
use crate::row::Row;

/// An open table file. Dirty pages are written back on [`Table::close`], or on
/// drop if the table was never closed explicitly.
pub struct Table {
    pager: Pager,
    config: TableConfig,
    closed: bool,
}

impl Table {
    /// Open or create a table with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, TableConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: TableConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let mut pager = Pager::open_with_max_pages(path, config.max_pages)?;

        let stored_root = pager.header().root_page;
        let root_page = match stored_root {
            0 => BTree::create(&mut pager)?,
            root if root >= pager.page_count() => {
                return Err(StorageError::Corrupt(format!(
                    "root page {root} is past the end of the file ({} pages)",
                    pager.page_count()
                )));
            }
            root => root,
        };

        info!(
            path = %path.display(),
            root_page,
            pages = pager.page_count(),
            "opened table"
        );
        Ok(Self {
            pager,
            config,
            closed: false,
        })
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn root_page(&self) -> PageNum {
        self.pager.header().root_page
    }

    pub fn page_count(&self) -> u32 {
        self.pager.page_count()
    }

    /// Insert a row. Fails with `DuplicateKey` or `TableFull` without
    /// changing the table.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        self.tree().insert(row)
    }

    /// Cursor at the first row in id order.
    pub fn start(&mut self) -> Result<Cursor<'_>> {
        let root = self.root_page();
        Cursor::table_start(&mut self.pager, root)
    }

    pub fn select_all(&mut self) -> Result<Vec<Row>> {
        self.start()?.collect()
    }

    pub fn lookup(&mut self, id: u32) -> Result<Option<Row>> {
        self.tree().lookup(id)
    }

    /// Rows with `min <= id <= max`, ascending.
    pub fn select_range(&mut self, min: u32, max: u32) -> Result<Vec<Row>> {
        self.tree().scan_range(min, max)
    }

    pub fn render_tree(&mut self) -> Result<String> {
        self.tree().render()
    }

    pub fn verify(&mut self) -> Result<()> {
        self.tree().verify()
    }

    /// Write every dirty page and the header back to the file.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.pager.flush_all()?;
        info!(pages = self.pager.page_count(), "closed table");
        Ok(())
    }

    fn tree(&mut self) -> BTree<'_> {
        let root = self.root_page();
        BTree::new(&mut self.pager, root, self.config.internal_max_keys)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.pager.flush_all() {
            warn!(error = %err, "failed to flush table on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::row::{COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE};

    use tempfile::TempDir;

    fn row(id: u32) -> Row {
        Row::new(id as i64, format!("user{id}"), format!("person{id}@example.com")).unwrap()
    }

    fn ids(rows: &[Row]) -> Vec<u32> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn new_file_gets_empty_root_leaf() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path().join("t.db")).unwrap();

        assert_eq!(table.root_page(), 1);
        assert_eq!(table.page_count(), 2);
        assert!(table.select_all().unwrap().is_empty());
        assert_eq!(table.render_tree().unwrap(), "- leaf (size 0)\n");
    }

    #[test]
    fn capacity_limit_with_default_config() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path().join("t.db")).unwrap();

        for id in 0..=691 {
            table.insert(&row(id)).unwrap();
        }
        assert_eq!(table.page_count(), 100);

        let before = table.render_tree().unwrap();
        assert!(matches!(
            table.insert(&row(692)),
            Err(StorageError::TableFull { max_pages: 100 })
        ));
        assert_eq!(table.render_tree().unwrap(), before);
        assert_eq!(table.select_all().unwrap().len(), 692);
        table.verify().unwrap();
    }

    #[test]
    fn rows_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");

        {
            let mut table = Table::open(&path).unwrap();
            table
                .insert(&Row::new(1, "user1", "person1@example.com").unwrap())
                .unwrap();
            table.close().unwrap();
        }

        let mut table = Table::open(&path).unwrap();
        assert_eq!(
            table.select_all().unwrap(),
            vec![Row::new(1, "user1", "person1@example.com").unwrap()]
        );
    }

    #[test]
    fn drop_flushes_unclosed_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");

        {
            let mut table = Table::open(&path).unwrap();
            for id in [5, 2, 9] {
                table.insert(&row(id)).unwrap();
            }
        }

        let mut table = Table::open(&path).unwrap();
        assert_eq!(ids(&table.select_all().unwrap()), vec![2, 5, 9]);
    }

    #[test]
    fn reopen_after_root_splits_finds_every_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        let config = TableConfig {
            max_pages: 400,
            internal_max_keys: 3,
        };

        let root = {
            let mut table = Table::open_with_config(&path, config).unwrap();
            for id in (0..150).map(|i| (i * 37) % 150) {
                table.insert(&row(id)).unwrap();
            }
            table.verify().unwrap();
            let root = table.root_page();
            table.close().unwrap();
            root
        };
        assert_ne!(root, 1);

        let mut table = Table::open_with_config(&path, config).unwrap();
        assert_eq!(table.root_page(), root);
        table.verify().unwrap();
        assert_eq!(ids(&table.select_all().unwrap()), (0..150).collect::<Vec<_>>());
        assert_eq!(table.lookup(77).unwrap(), Some(row(77)));
        assert_eq!(table.lookup(150).unwrap(), None);
        assert_eq!(ids(&table.select_range(10, 14).unwrap()), vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn string_bounds() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path().join("t.db")).unwrap();

        let longest = Row::new(
            1,
            "a".repeat(COLUMN_USERNAME_SIZE),
            "a".repeat(COLUMN_EMAIL_SIZE),
        )
        .unwrap();
        table.insert(&longest).unwrap();

        assert_eq!(
            Row::new(2, "a".repeat(COLUMN_USERNAME_SIZE + 1), "e").unwrap_err(),
            ValidationError::UsernameTooLong { len: 33 }
        );
        assert_eq!(
            Row::new(2, "u", "a".repeat(COLUMN_EMAIL_SIZE + 1)).unwrap_err(),
            ValidationError::EmailTooLong { len: 256 }
        );
        assert_eq!(
            Row::new(-1, "u", "e").unwrap_err(),
            ValidationError::NegativeId(-1)
        );

        // a row mutated past its bounds is caught again at encode time
        let mut sneaky = row(3);
        sneaky.username = "b".repeat(40);
        assert!(matches!(
            table.insert(&sneaky),
            Err(StorageError::Validation(ValidationError::UsernameTooLong { len: 40 }))
        ));

        assert_eq!(table.select_all().unwrap(), vec![longest]);
    }

    #[test]
    fn invalid_config_is_rejected_before_opening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        let config = TableConfig {
            max_pages: 100,
            internal_max_keys: 1,
        };

        assert!(matches!(
            Table::open_with_config(&path, config),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn root_past_end_of_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            pager.header_mut().root_page = 42;
            pager.flush_all().unwrap();
        }

        assert!(matches!(
            Table::open(&path),
            Err(StorageError::Corrupt(_))
        ));
    }
}
