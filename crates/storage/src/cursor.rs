//! Cursor: a position over the leaf level of the B+tree.
//!
//! A cursor is a page number, a cell index and an end flag. It never holds
//! node references; every step goes back through the pager, whose pages stay
//! cached for the session.

use crate::error::{Result, StorageError};
use crate::node::{
    internal_child, internal_search, leaf_key, leaf_num_cells, leaf_search, leaf_value,
    next_leaf, node_type, NodeType,
};
use crate::pager::{PageNum, Pager};
use crate::row::Row;

pub struct Cursor<'a> {
    pager: &'a mut Pager,
    page_num: PageNum,
    cell_num: usize,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Position at the first cell of the leftmost leaf.
    pub fn table_start(pager: &'a mut Pager, root_page: PageNum) -> Result<Self> {
        let mut page_num = root_page;
        loop {
            let page = pager.read_page(page_num)?;
            match node_type(page, page_num)? {
                NodeType::Leaf => {
                    let end_of_table = leaf_num_cells(page) == 0;
                    return Ok(Self {
                        pager,
                        page_num,
                        cell_num: 0,
                        end_of_table,
                    });
                }
                NodeType::Internal => page_num = internal_child(page, 0),
            }
        }
    }

    /// Position at `key` if it is stored, otherwise at the cell where it would
    /// be inserted.
    pub fn find(pager: &'a mut Pager, root_page: PageNum, key: u32) -> Result<Self> {
        let mut page_num = root_page;
        loop {
            let page = pager.read_page(page_num)?;
            match node_type(page, page_num)? {
                NodeType::Leaf => {
                    let cell_num = match leaf_search(page, key) {
                        Ok(idx) | Err(idx) => idx,
                    };
                    let end_of_table = cell_num >= leaf_num_cells(page);
                    return Ok(Self {
                        pager,
                        page_num,
                        cell_num,
                        end_of_table,
                    });
                }
                NodeType::Internal => page_num = internal_child(page, internal_search(page, key)),
            }
        }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn cell_num(&self) -> usize {
        self.cell_num
    }

    pub fn is_at_end(&self) -> bool {
        self.end_of_table
    }

    /// Key under the cursor, or `None` when the position is past the last cell
    /// of its leaf.
    pub fn key(&mut self) -> Result<Option<u32>> {
        let page = self.pager.read_page(self.page_num)?;
        if self.cell_num < leaf_num_cells(page) {
            Ok(Some(leaf_key(page, self.cell_num)))
        } else {
            Ok(None)
        }
    }

    /// Decode the row under the cursor.
    pub fn value(&mut self) -> Result<Row> {
        if self.end_of_table {
            return Err(StorageError::CursorAtEnd);
        }
        let page = self.pager.read_page(self.page_num)?;
        if self.cell_num >= leaf_num_cells(page) {
            return Err(StorageError::CursorAtEnd);
        }
        Ok(Row::decode(leaf_value(page, self.cell_num)))
    }

    /// Step to the next cell, following the sibling link at the end of a leaf.
    pub fn advance(&mut self) -> Result<()> {
        let page = self.pager.read_page(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= leaf_num_cells(page) {
            match next_leaf(page) {
                0 => self.end_of_table = true,
                next => {
                    self.page_num = next;
                    self.cell_num = 0;
                }
            }
        }
        Ok(())
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_of_table {
            return None;
        }
        let row = self.value().and_then(|row| self.advance().map(|()| row));
        if row.is_err() {
            self.end_of_table = true;
        }
        Some(row)
    }
}
