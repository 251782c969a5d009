//! The open table: root page tracking, split/root-promotion logic, and
//! whole-table operations (select, diagnostics).
use crate::errors::{err, Error};
use crate::storage::cursor::Cursor;
use crate::storage::node::{
    NodeType, INTERNAL_NODE_MAX_CELLS, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE,
    LEAF_NODE_MAX_CELLS, PAGE_SIZE,
};
use crate::storage::pager::Pager;
use crate::storage::row::{Row, ROW_SIZE};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct Table {
    pub(crate) pager: Pager,
    pub root_page_num: u32,
}

impl Table {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;

        if pager.num_pages() == 0 {
            let mut root = pager.get_page(0)?;
            root.initialize_leaf();
            root.set_is_root(true);
        }

        info!(path = %path.display(), "table opened");
        Ok(Self {
            pager,
            root_page_num: 0,
        })
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.flush_all()?;
        info!("table closed");
        Ok(())
    }

    pub fn insert(&mut self, row: Row) -> Result<(), Error> {
        let key = row.id;
        let mut cursor = Cursor::find(self, key)?;

        if cursor.key_here()? == Some(key) {
            return Err(Error::DuplicateKey);
        }

        cursor.leaf_insert(key, row)
    }

    pub fn select(&mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        let mut cursor = Cursor::start(self)?;

        while !cursor.end_of_table {
            rows.push(cursor.read()?);
            cursor.advance()?;
        }

        Ok(rows)
    }

    /// Maximum key reachable from `page_num`'s subtree.
    pub(crate) fn get_node_max_key(&mut self, page_num: u32) -> Result<u32, Error> {
        let node = self.pager.get_page(page_num)?;
        match node.node_type() {
            NodeType::Leaf => Ok(node.max_key_if_leaf().unwrap_or(0)),
            NodeType::Internal => {
                let right_child = node.internal_right_child();
                self.get_node_max_key(right_child)
            }
        }
    }

    /// Replace the root (page 0) with a fresh internal node whose two
    /// children are a copy of the old root (moved to a new page) and
    /// `right_child_page_num`.
    pub(crate) fn create_new_root(&mut self, right_child_page_num: u32) -> Result<(), Error> {
        let left_child_page_num = self.pager.unused_page_num();

        // Move the old root's bytes, wholesale, into the new left child.
        let mut old_root_bytes = [0u8; PAGE_SIZE];
        old_root_bytes.copy_from_slice(self.pager.get_page(self.root_page_num)?.as_slice());

        let left_child_children: Vec<u32> = {
            let mut left_child = self.pager.get_page(left_child_page_num)?;
            left_child.overwrite(&old_root_bytes);
            left_child.set_is_root(false);

            match left_child.node_type() {
                NodeType::Internal => {
                    let num_keys = left_child.internal_num_keys();
                    let mut children = Vec::with_capacity(num_keys as usize + 1);
                    for i in 0..num_keys {
                        children.push(left_child.internal_child(i));
                    }
                    children.push(left_child.internal_right_child());
                    children
                }
                NodeType::Leaf => Vec::new(),
            }
        };

        // The old root's bytes just moved to a new page number; any
        // grandchildren still have their parent pointer set to the old
        // page number (0) and need to be repointed here.
        for child_page_num in left_child_children {
            let mut child = self.pager.get_page(child_page_num)?;
            child.set_parent(left_child_page_num);
        }

        let left_child_max_key = self.get_node_max_key(left_child_page_num)?;

        {
            let mut root = self.pager.get_page(self.root_page_num)?;
            root.initialize_internal();
            root.set_is_root(true);
            root.set_internal_num_keys(1);
            root.set_internal_child(0, left_child_page_num);
            root.set_internal_key(0, left_child_max_key);
            root.set_internal_right_child(right_child_page_num);
        }

        {
            let mut left_child = self.pager.get_page(left_child_page_num)?;
            left_child.set_parent(self.root_page_num);
        }
        {
            let mut right_child = self.pager.get_page(right_child_page_num)?;
            right_child.set_parent(self.root_page_num);
        }

        debug!(
            left_child_page_num,
            right_child_page_num, "created new root"
        );
        Ok(())
    }

    /// Insert `child_page_num` under `parent_page_num`, splitting the
    /// parent if it is already full.
    pub(crate) fn internal_insert(
        &mut self,
        parent_page_num: u32,
        child_page_num: u32,
    ) -> Result<(), Error> {
        let child_max_key = self.get_node_max_key(child_page_num)?;

        let (original_num_keys, right_child_page_num) = {
            let parent = self.pager.get_page(parent_page_num)?;
            (parent.internal_num_keys(), parent.internal_right_child())
        };

        if original_num_keys as usize >= INTERNAL_NODE_MAX_CELLS {
            return self.internal_split_and_insert(parent_page_num, child_page_num);
        }

        let right_max_key = self.get_node_max_key(right_child_page_num)?;

        let mut parent = self.pager.get_page(parent_page_num)?;
        if child_max_key > right_max_key {
            // New child becomes the rightmost.
            parent.set_internal_child(original_num_keys, right_child_page_num);
            parent.set_internal_key(original_num_keys, right_max_key);
            parent.set_internal_right_child(child_page_num);
        } else {
            let index = parent.internal_find_child(child_max_key);
            let mut i = original_num_keys;
            while i > index {
                parent.copy_internal_cell(i - 1, i);
                i -= 1;
            }
            parent.set_internal_child(index, child_page_num);
            parent.set_internal_key(index, child_max_key);
        }
        parent.set_internal_num_keys(original_num_keys + 1);
        Ok(())
    }

    /// Split a full internal node into two, promoting the split point
    /// into the parent (creating a new root if this was the root).
    fn internal_split_and_insert(
        &mut self,
        old_page_num: u32,
        child_page_num: u32,
    ) -> Result<(), Error> {
        warn!(old_page_num, "internal node full, splitting");

        let old_max = self.get_node_max_key(old_page_num)?;
        let (old_is_root, old_parent) = {
            let old = self.pager.get_page(old_page_num)?;
            (old.is_root(), old.parent())
        };

        let new_page_num = self.pager.unused_page_num();
        {
            let mut new_node = self.pager.get_page(new_page_num)?;
            new_node.initialize_internal();
        }

        // Gather the old node's existing children + keys, plus the new
        // child, as one virtual sequence of MAX_CELLS + 1 entries keyed
        // by max-key-of-child, then redistribute left/right.
        let mut entries: Vec<(u32, u32)> = Vec::with_capacity(INTERNAL_NODE_MAX_CELLS + 2);
        {
            let old = self.pager.get_page(old_page_num)?;
            let num_keys = old.internal_num_keys();
            for i in 0..num_keys {
                entries.push((old.internal_child(i), old.internal_key(i)));
            }
            entries.push((old.internal_right_child(), old_max));
        }
        let child_max = self.get_node_max_key(child_page_num)?;
        let pos = entries.partition_point(|(_, key)| *key < child_max);
        entries.insert(pos, (child_page_num, child_max));

        // `entries` holds one (child, upper-bound-key) pair per child
        // pointer, including the old right child — split the pointers
        // themselves evenly; each half's last entry becomes that half's
        // right child, and the rest become keyed cells. `internal_insert`
        // only calls this once the node is full, so there are always at
        // least `INTERNAL_NODE_MAX_CELLS + 2 >= 2` entries here.
        if entries.len() < 2 {
            return Err(err!(
                Corrupt,
                "Internal node split with too few entries: {}.",
                entries.len()
            ));
        }
        let split_at = entries.len() / 2;
        let (left_entries, right_entries) = entries.split_at(split_at);

        let left_right_child = left_entries
            .last()
            .ok_or_else(|| err!(Corrupt, "Internal node split produced an empty left half."))?
            .0;
        let right_right_child = right_entries
            .last()
            .ok_or_else(|| err!(Corrupt, "Internal node split produced an empty right half."))?
            .0;

        {
            let mut old = self.pager.get_page(old_page_num)?;
            old.initialize_internal();
            old.set_internal_num_keys(left_entries.len() as u32 - 1);
            for (i, (child, key)) in left_entries[..left_entries.len() - 1].iter().enumerate() {
                old.set_internal_child(i as u32, *child);
                old.set_internal_key(i as u32, *key);
            }
            old.set_internal_right_child(left_right_child);
        }

        {
            let mut new_node = self.pager.get_page(new_page_num)?;
            new_node.set_internal_num_keys(right_entries.len() as u32 - 1);
            for (i, (child, key)) in right_entries[..right_entries.len() - 1].iter().enumerate() {
                new_node.set_internal_child(i as u32, *child);
                new_node.set_internal_key(i as u32, *key);
            }
            new_node.set_internal_right_child(right_right_child);
        }

        for (child, _) in left_entries {
            let mut c = self.pager.get_page(*child)?;
            c.set_parent(old_page_num);
        }
        for (child, _) in right_entries {
            let mut c = self.pager.get_page(*child)?;
            c.set_parent(new_page_num);
        }

        if old_is_root {
            self.create_new_root(new_page_num)
        } else {
            let new_max = self.get_node_max_key(old_page_num)?;
            self.update_internal_key(old_parent, old_max, new_max)?;
            self.internal_insert(old_parent, new_page_num)
        }
    }

    /// Update the key in `page_num` that used to point at `old_key` to
    /// `new_key`, after a child's max key changed.
    pub(crate) fn update_internal_key(
        &mut self,
        page_num: u32,
        old_key: u32,
        new_key: u32,
    ) -> Result<(), Error> {
        let mut node = self.pager.get_page(page_num)?;
        let old_child_index = node.internal_find_child(old_key);
        if old_child_index < node.internal_num_keys() {
            node.set_internal_key(old_child_index, new_key);
        }
        Ok(())
    }

    /// Dump the tree structure, indented by depth, the way `.btree`
    /// does in the original tutorial.
    pub fn describe_tree(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        self.describe_node(self.root_page_num, 0, &mut out)?;
        Ok(out)
    }

    fn describe_node(&mut self, page_num: u32, indent: usize, out: &mut String) -> Result<(), Error> {
        let pad = "  ".repeat(indent);
        let node = self.pager.get_page(page_num)?;
        match node.node_type() {
            NodeType::Leaf => {
                let num_cells = node.leaf_num_cells();
                out.push_str(&format!("{pad}- leaf (size {num_cells})\n"));
                for i in 0..num_cells {
                    out.push_str(&format!("{pad}  - {}\n", node.leaf_key(i)));
                }
            }
            NodeType::Internal => {
                let num_keys = node.internal_num_keys();
                out.push_str(&format!("{pad}- internal (size {num_keys})\n"));
                let mut children = Vec::with_capacity(num_keys as usize + 1);
                for i in 0..num_keys {
                    children.push(node.internal_child(i));
                }
                let right_child = node.internal_right_child();
                drop(node);
                for (i, child) in children.iter().enumerate() {
                    self.describe_node(*child, indent + 1, out)?;
                    let key = {
                        let node = self.pager.get_page(page_num)?;
                        node.internal_key(i as u32)
                    };
                    out.push_str(&format!("{pad}- key {key}\n"));
                }
                self.describe_node(right_child, indent + 1, out)?;
            }
        }
        Ok(())
    }
}

/// Rendering for the `.constants` meta-command.
pub fn describe_constants() -> String {
    format!(
        "ROW_SIZE: {ROW_SIZE}\n\
         COMMON_NODE_HEADER_SIZE: 6\n\
         LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}\n\
         LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}\n\
         LEAF_NODE_SPACE_FOR_CELLS: {}\n\
         LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}\n",
        PAGE_SIZE - LEAF_NODE_HEADER_SIZE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_table() -> Table {
        let tmp = NamedTempFile::new().unwrap();
        Table::open(tmp.path()).unwrap()
    }

    /// A freestanding one-row leaf page, for building internal-node
    /// fixtures without going through real inserts/splits.
    fn leaf_page_with_max_key(table: &mut Table, max_key: u32) -> u32 {
        let page_num = table.pager.unused_page_num();
        let row = Row::new(max_key, "user", "user@example.com").unwrap();
        let mut page = table.pager.get_page(page_num).unwrap();
        page.initialize_leaf();
        page.set_leaf_num_cells(1);
        page.set_leaf_key(0, max_key);
        page.set_leaf_value(0, &row);
        page_num
    }

    #[test]
    fn internal_insert_appends_new_rightmost_child() {
        let mut table = open_table();
        let left = leaf_page_with_max_key(&mut table, 10);
        let right = leaf_page_with_max_key(&mut table, 20);
        let new_child = leaf_page_with_max_key(&mut table, 30);

        {
            let mut root = table.pager.get_page(table.root_page_num).unwrap();
            root.initialize_internal();
            root.set_internal_num_keys(1);
            root.set_internal_child(0, left);
            root.set_internal_key(0, 10);
            root.set_internal_right_child(right);
        }

        table
            .internal_insert(table.root_page_num, new_child)
            .unwrap();

        let root = table.pager.get_page(table.root_page_num).unwrap();
        assert_eq!(root.internal_num_keys(), 2);
        assert_eq!(root.internal_child(0), left);
        assert_eq!(root.internal_key(0), 10);
        assert_eq!(root.internal_child(1), right);
        assert_eq!(root.internal_key(1), 20);
        assert_eq!(root.internal_right_child(), new_child);
    }

    #[test]
    fn internal_insert_shifts_cells_to_make_room_in_the_middle() {
        let mut table = open_table();
        let a = leaf_page_with_max_key(&mut table, 10);
        let b = leaf_page_with_max_key(&mut table, 20);
        let c = leaf_page_with_max_key(&mut table, 30);
        let new_child = leaf_page_with_max_key(&mut table, 15);

        {
            let mut root = table.pager.get_page(table.root_page_num).unwrap();
            root.initialize_internal();
            root.set_internal_num_keys(2);
            root.set_internal_child(0, a);
            root.set_internal_key(0, 10);
            root.set_internal_child(1, b);
            root.set_internal_key(1, 20);
            root.set_internal_right_child(c);
        }

        table
            .internal_insert(table.root_page_num, new_child)
            .unwrap();

        let root = table.pager.get_page(table.root_page_num).unwrap();
        assert_eq!(root.internal_num_keys(), 3);
        assert_eq!(root.internal_child(0), a);
        assert_eq!(root.internal_key(0), 10);
        assert_eq!(root.internal_child(1), new_child);
        assert_eq!(root.internal_key(1), 15);
        assert_eq!(root.internal_child(2), b);
        assert_eq!(root.internal_key(2), 20);
        assert_eq!(root.internal_right_child(), c);
    }
}
