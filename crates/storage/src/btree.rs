//! B+tree keyed by row id.
//!
//! Nodes live in pages and refer to each other only by page number: children
//! through internal-node cells, parents through the back-reference in every
//! node header, and leaves through their `next_leaf` sibling link. Internal
//! cells store the maximum key of the child's subtree, so descending for a key
//! means picking the first child whose max key is `>= key`.
//!
//! The root moves to a new page whenever it splits. Its page number is kept in
//! the file header so a reopened database finds it again.

use std::collections::HashSet;

use tracing::debug;

use crate::cursor::Cursor;
use crate::error::{Result, StorageError};
use crate::node::{
    init_internal, init_leaf, insert_leaf_cell, internal_child_index, internal_key,
    internal_num_keys, is_root, leaf_key, leaf_num_cells, make_leaf_cell, next_leaf, node_type,
    parent, read_internal_node, read_leaf_cells, right_child, set_internal_key, set_next_leaf,
    set_parent, set_root, write_internal_node, write_leaf_cells, InternalNode, NodeType,
    LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
};
use crate::pager::{PageNum, Pager};
use crate::row::Row;

/// A B+tree handle, rooted at a given page.
pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page: PageNum,
    internal_max_keys: usize,
}

impl<'a> BTree<'a> {
    /// Create a new B+tree handle. The `root_page` must already be allocated
    /// and initialized (see `create`).
    pub fn new(pager: &'a mut Pager, root_page: PageNum, internal_max_keys: usize) -> Self {
        Self {
            pager,
            root_page,
            internal_max_keys,
        }
    }

    /// Allocate a new root page, initialize it as an empty leaf and record it
    /// in the file header.
    pub fn create(pager: &mut Pager) -> Result<PageNum> {
        let page_num = pager.allocate_page()?;
        {
            let page = pager.write_page(page_num)?;
            init_leaf(page);
            set_root(page, true);
        }
        pager.header_mut().root_page = page_num;
        debug!(root = page_num, "created empty tree");
        Ok(page_num)
    }

    /// Returns the current root page number. This may change after insert
    /// if the root was split.
    pub fn root_page(&self) -> PageNum {
        self.root_page
    }

    /// Cursor at the first row in key order.
    pub fn table_start(&mut self) -> Result<Cursor<'_>> {
        Cursor::table_start(self.pager, self.root_page)
    }

    /// Cursor at `key`, or at its insertion point.
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>> {
        Cursor::find(self.pager, self.root_page, key)
    }

    /// Insert a row keyed by its id.
    ///
    /// Fails without touching any page if the id is already present or if a
    /// split would need more pages than the pager may still allocate.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        let key = row.id;
        let encoded = row.to_bytes()?;

        let (leaf, cell_num) = {
            let cursor = Cursor::find(self.pager, self.root_page, key)?;
            (cursor.page_num(), cursor.cell_num())
        };

        let num_cells = {
            let page = self.pager.read_page(leaf)?;
            let num_cells = leaf_num_cells(page);
            if cell_num < num_cells && leaf_key(page, cell_num) == key {
                return Err(StorageError::DuplicateKey(key));
            }
            num_cells
        };

        let target = if num_cells < LEAF_NODE_MAX_CELLS {
            let page = self.pager.write_page(leaf)?;
            insert_leaf_cell(page, cell_num, key, &encoded);
            leaf
        } else {
            let needed = self.pages_needed_for_split(leaf)?;
            if !self.pager.has_room_for(needed) {
                return Err(StorageError::TableFull {
                    max_pages: self.pager.max_pages(),
                });
            }
            self.split_leaf_and_insert(leaf, cell_num, key, &encoded)?
        };

        self.refresh_max_keys(target)
    }

    /// Look up a single row by id.
    pub fn lookup(&mut self, key: u32) -> Result<Option<Row>> {
        let mut cursor = self.find(key)?;
        if cursor.key()? == Some(key) {
            cursor.value().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Return every row in key order via the leaf chain.
    pub fn scan_all(&mut self) -> Result<Vec<Row>> {
        self.table_start()?.collect()
    }

    /// Range scan: return rows where `min_key <= id <= max_key`.
    pub fn scan_range(&mut self, min_key: u32, max_key: u32) -> Result<Vec<Row>> {
        let mut results = Vec::new();
        if min_key > max_key {
            return Ok(results);
        }
        let mut cursor = self.find(min_key)?;
        while !cursor.is_at_end() {
            match cursor.key()? {
                Some(key) if key <= max_key => {
                    results.push(cursor.value()?);
                    cursor.advance()?;
                }
                _ => break,
            }
        }
        Ok(results)
    }

    /// Render the tree structure, one node per line, indented by depth.
    pub fn render(&mut self) -> Result<String> {
        let mut out = String::new();
        self.render_node(self.root_page, 0, &mut out)?;
        Ok(out)
    }

    /// Walk the whole tree and check its structural invariants: node tags,
    /// a single root, parent back-references, strictly ascending keys, stored
    /// max keys and the leaf sibling chain.
    pub fn verify(&mut self) -> Result<()> {
        {
            let page = self.pager.read_page(self.root_page)?;
            if !is_root(page) {
                return Err(StorageError::Corrupt(format!(
                    "root page {} is missing its root flag",
                    self.root_page
                )));
            }
        }

        let mut leaves = Vec::new();
        let mut visited = HashSet::new();
        self.verify_node(self.root_page, None, &mut leaves, &mut visited)?;

        for (idx, &leaf) in leaves.iter().enumerate() {
            let expected = leaves.get(idx + 1).copied().unwrap_or(0);
            let actual = next_leaf(self.pager.read_page(leaf)?);
            if actual != expected {
                return Err(StorageError::Corrupt(format!(
                    "leaf {leaf} links to {actual}, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    // ─── Internal helpers ────────────────────────────────────────────────

    /// Pages a split starting at `leaf` will allocate: the new leaf, one per
    /// full ancestor that has to split as well, and a new root if the split
    /// reaches it.
    fn pages_needed_for_split(&mut self, leaf: PageNum) -> Result<u32> {
        let mut needed = 1;
        let mut node = leaf;
        loop {
            let (node_is_root, parent_page) = {
                let page = self.pager.read_page(node)?;
                (is_root(page), parent(page))
            };
            if node_is_root {
                return Ok(needed + 1);
            }
            let parent_full = {
                let page = self.pager.read_page(parent_page)?;
                internal_num_keys(page) >= self.internal_max_keys
            };
            if !parent_full {
                return Ok(needed);
            }
            needed += 1;
            node = parent_page;
        }
    }

    /// Split a full leaf around the new cell. The upper half moves into a new
    /// right sibling. Returns the page that ends up holding `key`.
    fn split_leaf_and_insert(
        &mut self,
        page_num: PageNum,
        cell_num: usize,
        key: u32,
        row: &[u8],
    ) -> Result<PageNum> {
        let (mut cells, old_next_leaf, parent_page, was_root) = {
            let page = self.pager.read_page(page_num)?;
            (
                read_leaf_cells(page),
                next_leaf(page),
                parent(page),
                is_root(page),
            )
        };
        cells.insert(cell_num, make_leaf_cell(key, row));
        let right_cells = cells.split_off(LEAF_NODE_LEFT_SPLIT_COUNT);

        let new_page = self.pager.allocate_page()?;
        {
            let page = self.pager.write_page(new_page)?;
            init_leaf(page);
            set_parent(page, parent_page);
            set_next_leaf(page, old_next_leaf);
            write_leaf_cells(page, &right_cells);
        }
        {
            let page = self.pager.write_page(page_num)?;
            set_next_leaf(page, new_page);
            write_leaf_cells(page, &cells);
        }
        debug!(
            left = page_num,
            right = new_page,
            left_cells = cells.len(),
            right_cells = right_cells.len(),
            "split leaf"
        );

        if was_root {
            self.create_new_root(page_num, new_page)?;
        } else {
            self.internal_insert(parent_page, page_num, new_page)?;
        }

        Ok(if cell_num < LEAF_NODE_LEFT_SPLIT_COUNT {
            page_num
        } else {
            new_page
        })
    }

    /// Register `new_child`, the freshly split right sibling of `old_child`,
    /// with their parent. Splits the parent if it overflows.
    fn internal_insert(
        &mut self,
        parent_page: PageNum,
        old_child: PageNum,
        new_child: PageNum,
    ) -> Result<()> {
        let old_max = self.node_max_key(old_child)?;
        let new_max = self.node_max_key(new_child)?;

        let mut node = read_internal_node(self.pager.read_page(parent_page)?);
        let pos = node
            .children
            .iter()
            .position(|&child| child == old_child)
            .ok_or_else(|| {
                StorageError::Corrupt(format!(
                    "page {old_child} is not a child of its parent {parent_page}"
                ))
            })?;

        if pos < node.keys.len() {
            node.keys[pos] = old_max;
            node.keys.insert(pos + 1, new_max);
        } else {
            // old_child was the right child; it now gets a key of its own.
            node.keys.push(old_max);
        }
        node.children.insert(pos + 1, new_child);

        if node.keys.len() <= self.internal_max_keys {
            write_internal_node(self.pager.write_page(parent_page)?, &node);
            return Ok(());
        }
        self.split_internal(parent_page, node)
    }

    /// Split an overflowing internal node: the upper half of its children
    /// moves into a new sibling, and the left node's max key becomes the
    /// separator in the grandparent.
    fn split_internal(&mut self, page_num: PageNum, mut node: InternalNode) -> Result<()> {
        let (parent_page, was_root) = {
            let page = self.pager.read_page(page_num)?;
            (parent(page), is_root(page))
        };

        let left_len = node.children.len().div_ceil(2);
        let right = InternalNode {
            children: node.children.split_off(left_len),
            keys: node.keys.split_off(left_len),
        };
        // keys[left_len - 1] is the max of the left node's new right child.
        node.keys.pop();

        let new_page = self.pager.allocate_page()?;
        {
            let page = self.pager.write_page(new_page)?;
            init_internal(page);
            set_parent(page, parent_page);
            write_internal_node(page, &right);
        }
        for &child in &right.children {
            set_parent(self.pager.write_page(child)?, new_page);
        }
        write_internal_node(self.pager.write_page(page_num)?, &node);
        debug!(
            left = page_num,
            right = new_page,
            left_keys = node.keys.len(),
            right_keys = right.keys.len(),
            "split internal node"
        );

        if was_root {
            self.create_new_root(page_num, new_page)
        } else {
            self.internal_insert(parent_page, page_num, new_page)
        }
    }

    /// Allocate a new internal root above the old root and its new sibling.
    fn create_new_root(&mut self, left: PageNum, right: PageNum) -> Result<()> {
        let left_max = self.node_max_key(left)?;
        let root = self.pager.allocate_page()?;
        {
            let page = self.pager.write_page(root)?;
            init_internal(page);
            set_root(page, true);
            write_internal_node(
                page,
                &InternalNode {
                    keys: vec![left_max],
                    children: vec![left, right],
                },
            );
        }
        for child in [left, right] {
            let page = self.pager.write_page(child)?;
            set_root(page, false);
            set_parent(page, root);
        }

        self.root_page = root;
        self.pager.header_mut().root_page = root;
        debug!(old_root = left, new_root = root, "promoted new root");
        Ok(())
    }

    /// Walk from `page_num` up to the root, rewriting each ancestor's stored
    /// key for the child on the path to the subtree's current max.
    fn refresh_max_keys(&mut self, page_num: PageNum) -> Result<()> {
        let mut child = page_num;
        loop {
            let (child_is_root, parent_page) = {
                let page = self.pager.read_page(child)?;
                (is_root(page), parent(page))
            };
            if child_is_root {
                return Ok(());
            }

            let child_max = self.node_max_key(child)?;
            let stale_slot = {
                let page = self.pager.read_page(parent_page)?;
                let idx = internal_child_index(page, child).ok_or_else(|| {
                    StorageError::Corrupt(format!(
                        "page {child} is not a child of its parent {parent_page}"
                    ))
                })?;
                (idx < internal_num_keys(page) && internal_key(page, idx) != child_max)
                    .then_some(idx)
            };
            if let Some(idx) = stale_slot {
                set_internal_key(self.pager.write_page(parent_page)?, idx, child_max);
            }
            child = parent_page;
        }
    }

    /// Largest key in the subtree rooted at `page_num`, found by following
    /// right children down to a leaf.
    fn node_max_key(&mut self, page_num: PageNum) -> Result<u32> {
        let mut current = page_num;
        loop {
            let page = self.pager.read_page(current)?;
            match node_type(page, current)? {
                NodeType::Internal => current = right_child(page),
                NodeType::Leaf => {
                    let num_cells = leaf_num_cells(page);
                    if num_cells == 0 {
                        return Err(StorageError::Corrupt(format!(
                            "leaf {current} is empty and has no max key"
                        )));
                    }
                    return Ok(leaf_key(page, num_cells - 1));
                }
            }
        }
    }

    fn render_node(&mut self, page_num: PageNum, depth: usize, out: &mut String) -> Result<()> {
        let indent = "  ".repeat(depth);
        let page = self.pager.read_page(page_num)?;
        match node_type(page, page_num)? {
            NodeType::Leaf => {
                let num_cells = leaf_num_cells(page);
                out.push_str(&format!("{indent}- leaf (size {num_cells})\n"));
                for idx in 0..num_cells {
                    out.push_str(&format!("{indent}  - {}\n", leaf_key(page, idx)));
                }
            }
            NodeType::Internal => {
                let node = read_internal_node(page);
                out.push_str(&format!("{indent}- internal (size {})\n", node.keys.len()));
                for (&child, &key) in node.children.iter().zip(&node.keys) {
                    self.render_node(child, depth + 1, out)?;
                    out.push_str(&format!("{indent}  - key {key}\n"));
                }
                if let Some(&right) = node.children.last() {
                    self.render_node(right, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    /// Check the subtree at `page_num` and return its (min, max) keys, or
    /// `None` for an empty root leaf.
    fn verify_node(
        &mut self,
        page_num: PageNum,
        expected_parent: Option<PageNum>,
        leaves: &mut Vec<PageNum>,
        visited: &mut HashSet<PageNum>,
    ) -> Result<Option<(u32, u32)>> {
        if !visited.insert(page_num) {
            return Err(StorageError::Corrupt(format!(
                "duplicate or cyclic B+tree page reference: {page_num}"
            )));
        }

        let page = self.pager.read_page(page_num)?;
        if let Some(expected) = expected_parent {
            if is_root(page) {
                return Err(StorageError::Corrupt(format!(
                    "non-root page {page_num} has its root flag set"
                )));
            }
            if parent(page) != expected {
                return Err(StorageError::Corrupt(format!(
                    "page {page_num} points to parent {}, expected {expected}",
                    parent(page)
                )));
            }
        }

        match node_type(page, page_num)? {
            NodeType::Leaf => {
                let num_cells = leaf_num_cells(page);
                let keys: Vec<u32> = (0..num_cells).map(|idx| leaf_key(page, idx)).collect();
                if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(StorageError::Corrupt(format!(
                        "leaf {page_num} keys are not strictly ascending"
                    )));
                }
                leaves.push(page_num);
                match (keys.first(), keys.last()) {
                    (Some(&min), Some(&max)) => Ok(Some((min, max))),
                    _ if expected_parent.is_none() => Ok(None),
                    _ => Err(StorageError::Corrupt(format!(
                        "non-root leaf {page_num} is empty"
                    ))),
                }
            }
            NodeType::Internal => {
                let node = read_internal_node(page);
                let mut bounds: Option<(u32, u32)> = None;
                for (idx, &child) in node.children.iter().enumerate() {
                    let (min, max) = self
                        .verify_node(child, Some(page_num), leaves, visited)?
                        .ok_or_else(|| {
                            StorageError::Corrupt(format!("child {child} of {page_num} is empty"))
                        })?;
                    if let Some((_, prev_max)) = bounds {
                        if min <= prev_max {
                            return Err(StorageError::Corrupt(format!(
                                "child {child} of {page_num} overlaps its left sibling"
                            )));
                        }
                    }
                    if let Some(&stored) = node.keys.get(idx) {
                        if stored != max {
                            return Err(StorageError::Corrupt(format!(
                                "page {page_num} stores max key {stored} for child {child}, \
                                 actual max is {max}"
                            )));
                        }
                    }
                    bounds = Some((bounds.map_or(min, |(first, _)| first), max));
                }
                Ok(bounds)
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
