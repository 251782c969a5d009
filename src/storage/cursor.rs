//! Ordered traversal over a table's leaves.
use crate::errors::Error;
use crate::storage::node::{
    NodeType, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
};
use crate::storage::row::Row;
use crate::storage::table::Table;
use tracing::{trace, warn};

pub struct Cursor<'a> {
    table: &'a mut Table,
    page_num: u32,
    pub cell_num: u32,
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        let mut cursor = Self::find(table, 0)?;
        let node = cursor.table.pager.get_page(cursor.page_num)?;
        cursor.end_of_table = node.leaf_num_cells() == 0;
        Ok(cursor)
    }

    /// Locate the cell holding `key`, or the cell it should be inserted
    /// before if absent.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let root_page_num = table.root_page_num;
        let root = table.pager.get_page(root_page_num)?;

        match root.node_type() {
            NodeType::Leaf => Self::leaf_find(table, root_page_num, key),
            NodeType::Internal => Self::internal_find(table, root_page_num, key),
        }
    }

    fn leaf_find(table: &'a mut Table, page_num: u32, key: u32) -> Result<Self, Error> {
        let node = table.pager.get_page(page_num)?;
        let num_cells = node.leaf_num_cells();

        let mut min = 0u32;
        let mut max = num_cells;
        while min != max {
            let mid = (min + max) / 2;
            let key_at_mid = node.leaf_key(mid);
            if key == key_at_mid {
                return Ok(Self {
                    table,
                    page_num,
                    cell_num: mid,
                    end_of_table: false,
                });
            } else if key < key_at_mid {
                max = mid;
            } else {
                min = mid + 1;
            }
        }

        Ok(Self {
            table,
            page_num,
            cell_num: min,
            end_of_table: false,
        })
    }

    /// Descend into the child subtree that could hold `key`. Recurses
    /// into the resolved child page, never the node we just read.
    fn internal_find(table: &'a mut Table, page_num: u32, key: u32) -> Result<Self, Error> {
        let node = table.pager.get_page(page_num)?;
        let child_index = node.internal_find_child(key);
        let child_page_num = node.internal_child_at(child_index);

        let child = table.pager.get_page(child_page_num)?;
        match child.node_type() {
            NodeType::Leaf => Self::leaf_find(table, child_page_num, key),
            NodeType::Internal => Self::internal_find(table, child_page_num, key),
        }
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn read(&mut self) -> Result<Row, Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        Ok(node.leaf_value(self.cell_num))
    }

    /// The key at this cursor's exact position, if it points at an
    /// existing cell rather than a gap.
    pub fn key_here(&mut self) -> Result<Option<u32>, Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        if self.cell_num < node.leaf_num_cells() {
            Ok(Some(node.leaf_key(self.cell_num)))
        } else {
            Ok(None)
        }
    }

    /// Move to the next cell, crossing into the sibling leaf via
    /// `next_leaf` when the current one is exhausted.
    pub fn advance(&mut self) -> Result<(), Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        let num_cells = node.leaf_num_cells();
        let next_leaf = node.leaf_next_leaf();

        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }

    /// Insert `row` at this cursor's position, shifting existing cells
    /// right to make room, or splitting the leaf if it's already full.
    pub fn leaf_insert(&mut self, key: u32, row: Row) -> Result<(), Error> {
        let num_cells = {
            let node = self.table.pager.get_page(self.page_num)?;
            node.leaf_num_cells()
        };

        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return self.leaf_split_and_insert(key, row);
        }

        let mut node = self.table.pager.get_page(self.page_num)?;
        if self.cell_num < num_cells {
            trace!(cell_num = self.cell_num, num_cells, "shifting leaf cells");
            let mut i = num_cells;
            while i > self.cell_num {
                node.copy_leaf_cell(i - 1, i);
                i -= 1;
            }
        }
        node.set_leaf_num_cells(num_cells + 1);
        node.set_leaf_key(self.cell_num, key);
        node.set_leaf_value(self.cell_num, &row);
        Ok(())
    }

    /// Split a full leaf in two, keeping both in the `next_leaf` chain,
    /// then update or create the parent as needed.
    fn leaf_split_and_insert(&mut self, key: u32, row: Row) -> Result<(), Error> {
        warn!(page_num = self.page_num, "leaf full, splitting");

        let new_page_num = self.table.pager.unused_page_num();
        let old_max = self.table.get_node_max_key(self.page_num)?;

        let (old_next_leaf, old_parent) = {
            let old_node = self.table.pager.get_page(self.page_num)?;
            (old_node.leaf_next_leaf(), old_node.parent())
        };

        // Snapshot every existing cell plus the new one, in key order,
        // as one virtual sequence of LEAF_NODE_MAX_CELLS + 1 entries.
        let mut cells: Vec<(u32, Row)> = Vec::with_capacity(LEAF_NODE_MAX_CELLS + 1);
        {
            let old_node = self.table.pager.get_page(self.page_num)?;
            for i in 0..LEAF_NODE_MAX_CELLS as u32 {
                if i == self.cell_num {
                    cells.push((key, row.clone()));
                }
                cells.push((old_node.leaf_key(i), old_node.leaf_value(i)));
            }
            if self.cell_num == LEAF_NODE_MAX_CELLS as u32 {
                cells.push((key, row));
            }
        }

        let (left_cells, right_cells) = cells.split_at(LEAF_NODE_LEFT_SPLIT_COUNT);
        debug_assert_eq!(right_cells.len(), LEAF_NODE_RIGHT_SPLIT_COUNT);

        {
            let mut old_node = self.table.pager.get_page(self.page_num)?;
            old_node.set_leaf_num_cells(left_cells.len() as u32);
            for (i, (k, v)) in left_cells.iter().enumerate() {
                old_node.set_leaf_key(i as u32, *k);
                old_node.set_leaf_value(i as u32, v);
            }
            old_node.set_leaf_next_leaf(new_page_num);
        }

        {
            let mut new_node = self.table.pager.get_page(new_page_num)?;
            new_node.initialize_leaf();
            new_node.set_parent(old_parent);
            new_node.set_leaf_next_leaf(old_next_leaf);
            new_node.set_leaf_num_cells(right_cells.len() as u32);
            for (i, (k, v)) in right_cells.iter().enumerate() {
                new_node.set_leaf_key(i as u32, *k);
                new_node.set_leaf_value(i as u32, v);
            }
        }

        let was_root = {
            let old_node = self.table.pager.get_page(self.page_num)?;
            old_node.is_root()
        };

        if was_root {
            self.table.create_new_root(new_page_num)
        } else {
            let new_max = self.table.get_node_max_key(self.page_num)?;
            self.table.update_internal_key(old_parent, old_max, new_max)?;
            self.table.internal_insert(old_parent, new_page_num)
        }
    }
}
