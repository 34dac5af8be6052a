//! On-page node layout.
//!
//! Every node occupies exactly one page. All integers are big-endian.
//!
//! ### Common header (6 bytes)
//! ```text
//! [0]     node_type: u8 (1 = internal, 2 = leaf)
//! [1]     is_root: u8
//! [2..6]  parent: u32 (page number, 0 for the root)
//! ```
//!
//! ### Leaf node
//! ```text
//! [6..10]   num_cells: u32
//! [10..14]  next_leaf: u32 (0 = rightmost leaf)
//! [14..]    cells: key u32 + row [u8; ROW_SIZE]
//! ```
//!
//! ### Internal node
//! ```text
//! [6..10]   num_keys: u32
//! [10..14]  right_child: u32
//! [14..]    cells: child u32 + key u32, key = max key of that child's subtree
//! ```
//!
//! Page 0 holds the file header, so 0 is free to mean "no page" in the parent
//! and next-leaf fields.

use crate::error::{Result, StorageError};
use crate::header::PAGE_SIZE;
use crate::pager::PageNum;
use crate::row::ROW_SIZE;

const NODE_TYPE_INTERNAL: u8 = 1;
const NODE_TYPE_LEAF: u8 = 2;

const NODE_TYPE_OFFSET: usize = 0;
const IS_ROOT_OFFSET: usize = 1;
const PARENT_POINTER_OFFSET: usize = 2;
pub const COMMON_NODE_HEADER_SIZE: usize = 6;

const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + 4;
pub const LEAF_NODE_HEADER_SIZE: usize = COMMON_NODE_HEADER_SIZE + 8;

const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + ROW_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// Cells that move to the new right sibling when a full leaf takes one more.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
/// Cells that stay behind in the leaf being split.
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize = INTERNAL_NODE_NUM_KEYS_OFFSET + 4;
pub const INTERNAL_NODE_HEADER_SIZE: usize = COMMON_NODE_HEADER_SIZE + 8;
pub const INTERNAL_NODE_CELL_SIZE: usize = 8;
/// Most keys an internal page can physically hold.
pub const INTERNAL_NODE_MAX_KEYS: usize =
    (PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE) / INTERNAL_NODE_CELL_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

/// Decoded routing entries of an internal node. `keys[i]` is the max key
/// under `children[i]`; the last child is the right child and has no key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InternalNode {
    pub keys: Vec<u32>,
    pub children: Vec<PageNum>,
}

// ─── Common header ───────────────────────────────────────────────────────────

pub(crate) fn node_type(page: &[u8], page_num: PageNum) -> Result<NodeType> {
    match page[NODE_TYPE_OFFSET] {
        NODE_TYPE_INTERNAL => Ok(NodeType::Internal),
        NODE_TYPE_LEAF => Ok(NodeType::Leaf),
        other => Err(StorageError::unknown_node_type(page_num, other)),
    }
}

fn set_node_type(page: &mut [u8], node_type: NodeType) {
    page[NODE_TYPE_OFFSET] = match node_type {
        NodeType::Internal => NODE_TYPE_INTERNAL,
        NodeType::Leaf => NODE_TYPE_LEAF,
    };
}

pub(crate) fn is_root(page: &[u8]) -> bool {
    page[IS_ROOT_OFFSET] != 0
}

pub(crate) fn set_root(page: &mut [u8], is_root: bool) {
    page[IS_ROOT_OFFSET] = u8::from(is_root);
}

pub(crate) fn parent(page: &[u8]) -> PageNum {
    get_u32(page, PARENT_POINTER_OFFSET)
}

pub(crate) fn set_parent(page: &mut [u8], parent: PageNum) {
    set_u32(page, PARENT_POINTER_OFFSET, parent);
}

// ─── Leaf nodes ──────────────────────────────────────────────────────────────

pub(crate) fn init_leaf(page: &mut [u8]) {
    page.fill(0);
    set_node_type(page, NodeType::Leaf);
}

pub(crate) fn leaf_num_cells(page: &[u8]) -> usize {
    get_u32(page, LEAF_NODE_NUM_CELLS_OFFSET) as usize
}

pub(crate) fn set_leaf_num_cells(page: &mut [u8], count: usize) {
    set_u32(page, LEAF_NODE_NUM_CELLS_OFFSET, count as u32);
}

pub(crate) fn next_leaf(page: &[u8]) -> PageNum {
    get_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET)
}

pub(crate) fn set_next_leaf(page: &mut [u8], next: PageNum) {
    set_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET, next);
}

fn leaf_cell_offset(idx: usize) -> usize {
    LEAF_NODE_HEADER_SIZE + idx * LEAF_NODE_CELL_SIZE
}

pub(crate) fn leaf_key(page: &[u8], idx: usize) -> u32 {
    get_u32(page, leaf_cell_offset(idx))
}

pub(crate) fn leaf_value(page: &[u8], idx: usize) -> &[u8; ROW_SIZE] {
    let start = leaf_cell_offset(idx) + LEAF_NODE_KEY_SIZE;
    page[start..start + ROW_SIZE].try_into().unwrap()
}

/// Raw bytes of one whole cell (key + row).
fn leaf_cell(page: &[u8], idx: usize) -> &[u8] {
    let start = leaf_cell_offset(idx);
    &page[start..start + LEAF_NODE_CELL_SIZE]
}

/// Write the cell at `idx` without touching the cell count.
pub(crate) fn write_leaf_cell(page: &mut [u8], idx: usize, key: u32, row: &[u8]) {
    let start = leaf_cell_offset(idx);
    set_u32(page, start, key);
    page[start + LEAF_NODE_KEY_SIZE..start + LEAF_NODE_CELL_SIZE].copy_from_slice(&row[..ROW_SIZE]);
}

/// Shift the cells at `idx..` one slot right and write the new cell at `idx`.
/// The caller guarantees the leaf has a free slot.
pub(crate) fn insert_leaf_cell(page: &mut [u8], idx: usize, key: u32, row: &[u8]) {
    let num_cells = leaf_num_cells(page);
    debug_assert!(num_cells < LEAF_NODE_MAX_CELLS, "leaf has no free slot");
    if idx < num_cells {
        page.copy_within(
            leaf_cell_offset(idx)..leaf_cell_offset(num_cells),
            leaf_cell_offset(idx + 1),
        );
    }
    write_leaf_cell(page, idx, key, row);
    set_leaf_num_cells(page, num_cells + 1);
}

/// Copy out every cell of a leaf, in key order.
pub(crate) fn read_leaf_cells(page: &[u8]) -> Vec<Vec<u8>> {
    (0..leaf_num_cells(page))
        .map(|idx| leaf_cell(page, idx).to_vec())
        .collect()
}

/// Replace a leaf's cells with `cells`, keeping its header fields.
pub(crate) fn write_leaf_cells(page: &mut [u8], cells: &[Vec<u8>]) {
    for (idx, cell) in cells.iter().enumerate() {
        let start = leaf_cell_offset(idx);
        page[start..start + LEAF_NODE_CELL_SIZE].copy_from_slice(cell);
    }
    page[leaf_cell_offset(cells.len())..].fill(0);
    set_leaf_num_cells(page, cells.len());
}

/// Build a raw cell from a key and an encoded row.
pub(crate) fn make_leaf_cell(key: u32, row: &[u8]) -> Vec<u8> {
    let mut cell = Vec::with_capacity(LEAF_NODE_CELL_SIZE);
    cell.extend_from_slice(&key.to_be_bytes());
    cell.extend_from_slice(&row[..ROW_SIZE]);
    cell
}

/// Binary search a leaf. Returns the cell index of `key` if present, otherwise
/// the index it would be inserted at.
pub(crate) fn leaf_search(page: &[u8], key: u32) -> std::result::Result<usize, usize> {
    let mut lo = 0;
    let mut hi = leaf_num_cells(page);
    while lo < hi {
        let mid = (lo + hi) / 2;
        let key_at_mid = leaf_key(page, mid);
        if key == key_at_mid {
            return Ok(mid);
        }
        if key < key_at_mid {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Err(lo)
}

// ─── Internal nodes ──────────────────────────────────────────────────────────

pub(crate) fn init_internal(page: &mut [u8]) {
    page.fill(0);
    set_node_type(page, NodeType::Internal);
}

pub(crate) fn internal_num_keys(page: &[u8]) -> usize {
    get_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET) as usize
}

fn set_internal_num_keys(page: &mut [u8], count: usize) {
    set_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET, count as u32);
}

pub(crate) fn right_child(page: &[u8]) -> PageNum {
    get_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
}

fn set_right_child(page: &mut [u8], child: PageNum) {
    set_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET, child);
}

fn internal_cell_offset(idx: usize) -> usize {
    INTERNAL_NODE_HEADER_SIZE + idx * INTERNAL_NODE_CELL_SIZE
}

/// Child at `idx`; `idx == num_keys` selects the right child.
pub(crate) fn internal_child(page: &[u8], idx: usize) -> PageNum {
    if idx >= internal_num_keys(page) {
        right_child(page)
    } else {
        get_u32(page, internal_cell_offset(idx))
    }
}

pub(crate) fn internal_key(page: &[u8], idx: usize) -> u32 {
    get_u32(page, internal_cell_offset(idx) + 4)
}

pub(crate) fn set_internal_key(page: &mut [u8], idx: usize, key: u32) {
    set_u32(page, internal_cell_offset(idx) + 4, key);
}

/// Index of the child whose subtree may contain `key`: the first entry whose
/// max key is `>= key`, or the right child when there is none.
pub(crate) fn internal_search(page: &[u8], key: u32) -> usize {
    let mut lo = 0;
    let mut hi = internal_num_keys(page);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if internal_key(page, mid) >= key {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Position of `child` among the node's children, right child included.
pub(crate) fn internal_child_index(page: &[u8], child: PageNum) -> Option<usize> {
    (0..=internal_num_keys(page)).find(|&idx| internal_child(page, idx) == child)
}

pub(crate) fn read_internal_node(page: &[u8]) -> InternalNode {
    let num_keys = internal_num_keys(page);
    let keys = (0..num_keys).map(|idx| internal_key(page, idx)).collect();
    let children = (0..=num_keys).map(|idx| internal_child(page, idx)).collect();
    InternalNode { keys, children }
}

/// Rewrite an internal node's routing entries, keeping its header fields.
pub(crate) fn write_internal_node(page: &mut [u8], node: &InternalNode) {
    debug_assert_eq!(node.keys.len() + 1, node.children.len());
    let num_keys = node.keys.len();
    for (idx, (&child, &key)) in node.children.iter().zip(&node.keys).enumerate() {
        let offset = internal_cell_offset(idx);
        set_u32(page, offset, child);
        set_u32(page, offset + 4, key);
    }
    page[internal_cell_offset(num_keys)..].fill(0);
    set_internal_num_keys(page, num_keys);
    set_right_child(page, node.children[num_keys]);
}

// ─── Byte helpers ────────────────────────────────────────────────────────────

fn get_u32(page: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(page[offset..offset + 4].try_into().unwrap())
}

fn set_u32(page: &mut [u8], offset: usize, val: u32) {
    page[offset..offset + 4].copy_from_slice(&val.to_be_bytes());
}
