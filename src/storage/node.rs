//! Page layout and byte-level accessors.
//!
//! A page is a fixed 4096-byte buffer holding either a leaf node or an
//! internal node. `NodeView` borrows that buffer and exposes typed
//! accessors over it; nothing here owns or copies page data.
use crate::storage::row::{Row, ROW_SIZE};

pub const PAGE_SIZE: usize = 4096;
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

// Common header: node_type(1) + is_root(1) + parent_page_num(4)
const NODE_TYPE_OFFSET: usize = 0;
const IS_ROOT_OFFSET: usize = 1;
const PARENT_POINTER_OFFSET: usize = 2;
pub const COMMON_NODE_HEADER_SIZE: usize = 6;

// Leaf header: num_cells(4) + next_leaf(4)
const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + 4;
pub const LEAF_NODE_HEADER_SIZE: usize = LEAF_NODE_NEXT_LEAF_OFFSET + 4;

pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal header: num_keys(4) + right_child(4)
const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize = INTERNAL_NODE_NUM_KEYS_OFFSET + 4;
pub const INTERNAL_NODE_HEADER_SIZE: usize = INTERNAL_NODE_RIGHT_CHILD_OFFSET + 4;

pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;
pub const INTERNAL_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_MAX_CELLS: usize = INTERNAL_NODE_SPACE_FOR_CELLS / INTERNAL_NODE_CELL_SIZE;
pub const INTERNAL_NODE_RIGHT_SPLIT_COUNT: usize = (INTERNAL_NODE_MAX_CELLS + 1) / 2;
pub const INTERNAL_NODE_LEFT_SPLIT_COUNT: usize =
    (INTERNAL_NODE_MAX_CELLS + 1) - INTERNAL_NODE_RIGHT_SPLIT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Internal,
}

impl From<u8> for NodeType {
    fn from(b: u8) -> Self {
        match b {
            1 => NodeType::Internal,
            _ => NodeType::Leaf,
        }
    }
}

impl From<NodeType> for u8 {
    fn from(t: NodeType) -> Self {
        match t {
            NodeType::Leaf => 0,
            NodeType::Internal => 1,
        }
    }
}

/// A borrowed view over one page's raw bytes.
pub struct NodeView<'a> {
    buf: &'a mut [u8; PAGE_SIZE],
}

impl<'a> NodeView<'a> {
    pub fn new(buf: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { buf }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Replace this page's bytes wholesale — used when promoting the old
    /// root into a new left child during root creation.
    pub fn overwrite(&mut self, bytes: &[u8; PAGE_SIZE]) {
        self.buf.copy_from_slice(bytes);
    }

    // --- common header ---

    pub fn node_type(&self) -> NodeType {
        NodeType::from(self.buf[NODE_TYPE_OFFSET])
    }

    pub fn set_node_type(&mut self, t: NodeType) {
        self.buf[NODE_TYPE_OFFSET] = t.into();
    }

    pub fn is_root(&self) -> bool {
        self.buf[IS_ROOT_OFFSET] != 0
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.buf[IS_ROOT_OFFSET] = is_root as u8;
    }

    pub fn parent(&self) -> u32 {
        read_u32(self.buf, PARENT_POINTER_OFFSET)
    }

    pub fn set_parent(&mut self, page_num: u32) {
        write_u32(self.buf, PARENT_POINTER_OFFSET, page_num);
    }

    // --- leaf node ---

    pub fn leaf_num_cells(&self) -> u32 {
        read_u32(self.buf, LEAF_NODE_NUM_CELLS_OFFSET)
    }

    pub fn set_leaf_num_cells(&mut self, n: u32) {
        write_u32(self.buf, LEAF_NODE_NUM_CELLS_OFFSET, n);
    }

    pub fn leaf_next_leaf(&self) -> u32 {
        read_u32(self.buf, LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    pub fn set_leaf_next_leaf(&mut self, page_num: u32) {
        write_u32(self.buf, LEAF_NODE_NEXT_LEAF_OFFSET, page_num);
    }

    fn leaf_cell_offset(cell_num: u32) -> usize {
        LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE
    }

    pub fn leaf_key(&self, cell_num: u32) -> u32 {
        read_u32(self.buf, Self::leaf_cell_offset(cell_num))
    }

    pub fn set_leaf_key(&mut self, cell_num: u32, key: u32) {
        write_u32(self.buf, Self::leaf_cell_offset(cell_num), key);
    }

    pub fn leaf_value(&self, cell_num: u32) -> Row {
        let offset = Self::leaf_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
        Row::deserialize(&self.buf[offset..offset + LEAF_NODE_VALUE_SIZE])
    }

    pub fn set_leaf_value(&mut self, cell_num: u32, row: &Row) {
        let offset = Self::leaf_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
        row.serialize(&mut self.buf[offset..offset + LEAF_NODE_VALUE_SIZE]);
    }

    /// Copy one whole leaf cell (key + value) from `src` to `dst` within
    /// this page.
    pub fn copy_leaf_cell(&mut self, src: u32, dst: u32) {
        let src_off = Self::leaf_cell_offset(src);
        let dst_off = Self::leaf_cell_offset(dst);
        let mut tmp = [0u8; LEAF_NODE_CELL_SIZE];
        tmp.copy_from_slice(&self.buf[src_off..src_off + LEAF_NODE_CELL_SIZE]);
        self.buf[dst_off..dst_off + LEAF_NODE_CELL_SIZE].copy_from_slice(&tmp);
    }

    // --- internal node ---

    pub fn internal_num_keys(&self) -> u32 {
        read_u32(self.buf, INTERNAL_NODE_NUM_KEYS_OFFSET)
    }

    pub fn set_internal_num_keys(&mut self, n: u32) {
        write_u32(self.buf, INTERNAL_NODE_NUM_KEYS_OFFSET, n);
    }

    pub fn internal_right_child(&self) -> u32 {
        read_u32(self.buf, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    pub fn set_internal_right_child(&mut self, page_num: u32) {
        write_u32(self.buf, INTERNAL_NODE_RIGHT_CHILD_OFFSET, page_num);
    }

    fn internal_cell_offset(cell_num: u32) -> usize {
        INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE
    }

    pub fn internal_child(&self, cell_num: u32) -> u32 {
        read_u32(self.buf, Self::internal_cell_offset(cell_num))
    }

    pub fn set_internal_child(&mut self, cell_num: u32, page_num: u32) {
        write_u32(self.buf, Self::internal_cell_offset(cell_num), page_num);
    }

    pub fn internal_key(&self, cell_num: u32) -> u32 {
        read_u32(
            self.buf,
            Self::internal_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE,
        )
    }

    pub fn set_internal_key(&mut self, cell_num: u32, key: u32) {
        write_u32(
            self.buf,
            Self::internal_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE,
            key,
        );
    }

    /// The child page at `child_num`, where `child_num == num_keys`
    /// resolves to the rightmost child pointer.
    pub fn internal_child_at(&self, child_num: u32) -> u32 {
        let num_keys = self.internal_num_keys();
        if child_num == num_keys {
            self.internal_right_child()
        } else {
            self.internal_child(child_num)
        }
    }

    pub fn set_internal_child_at(&mut self, child_num: u32, page_num: u32) {
        let num_keys = self.internal_num_keys();
        if child_num == num_keys {
            self.set_internal_right_child(page_num);
        } else {
            self.set_internal_child(child_num, page_num);
        }
    }

    pub fn copy_internal_cell(&mut self, src: u32, dst: u32) {
        let src_off = Self::internal_cell_offset(src);
        let dst_off = Self::internal_cell_offset(dst);
        let mut tmp = [0u8; INTERNAL_NODE_CELL_SIZE];
        tmp.copy_from_slice(&self.buf[src_off..src_off + INTERNAL_NODE_CELL_SIZE]);
        self.buf[dst_off..dst_off + INTERNAL_NODE_CELL_SIZE].copy_from_slice(&tmp);
    }

    /// The index of the first child whose subtree might contain `key`,
    /// via binary search lower bound over the node's keys.
    pub fn internal_find_child(&self, key: u32) -> u32 {
        let num_keys = self.internal_num_keys();
        let mut min = 0u32;
        let mut max = num_keys;
        while min != max {
            let mid = (min + max) / 2;
            let key_to_right = self.internal_key(mid);
            if key_to_right >= key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }

    /// The maximum key reachable under this node (rightmost leaf key for
    /// a leaf, or the max under the rightmost child for an internal
    /// node — resolved by the caller, which has pager access).
    pub fn max_key_if_leaf(&self) -> Option<u32> {
        match self.node_type() {
            NodeType::Leaf => {
                let n = self.leaf_num_cells();
                if n == 0 {
                    None
                } else {
                    Some(self.leaf_key(n - 1))
                }
            }
            NodeType::Internal => None,
        }
    }

    pub fn initialize_leaf(&mut self) {
        self.set_node_type(NodeType::Leaf);
        self.set_is_root(false);
        self.set_leaf_num_cells(0);
        self.set_leaf_next_leaf(0);
    }

    pub fn initialize_internal(&mut self) {
        self.set_node_type(NodeType::Internal);
        self.set_is_root(false);
        self.set_internal_num_keys(0);
        self.set_internal_right_child(INVALID_PAGE_NUM);
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(b)
}

fn write_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_header_and_cell_roundtrip() {
        let mut page = [0u8; PAGE_SIZE];
        let mut view = NodeView::new(&mut page);
        view.initialize_leaf();
        view.set_leaf_num_cells(1);
        view.set_leaf_key(0, 42);
        let row = Row::new(42, "bob", "bob@example.com").unwrap();
        view.set_leaf_value(0, &row);

        assert_eq!(view.leaf_num_cells(), 1);
        assert_eq!(view.leaf_key(0), 42);
        assert_eq!(view.leaf_value(0), row);
    }

    #[test]
    fn internal_child_at_rightmost() {
        let mut page = [0u8; PAGE_SIZE];
        let mut view = NodeView::new(&mut page);
        view.initialize_internal();
        view.set_internal_num_keys(1);
        view.set_internal_child(0, 3);
        view.set_internal_key(0, 10);
        view.set_internal_right_child(7);

        assert_eq!(view.internal_child_at(0), 3);
        assert_eq!(view.internal_child_at(1), 7);
    }

    #[test]
    fn max_cells_fit_within_page() {
        assert!(LEAF_NODE_HEADER_SIZE + LEAF_NODE_MAX_CELLS * LEAF_NODE_CELL_SIZE <= PAGE_SIZE);
        assert!(
            INTERNAL_NODE_HEADER_SIZE + INTERNAL_NODE_MAX_CELLS * INTERNAL_NODE_CELL_SIZE
                <= PAGE_SIZE
        );
    }
}
