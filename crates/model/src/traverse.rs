use std::collections::VecDeque;

use crate::tree::{ItemTree, NodeHandle};

/// A node visited during a level-order walk, with its depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelItem {
    pub level: usize,
    pub handle: NodeHandle,
}

/// Breadth-first iterator: every node at depth `d` before any at `d + 1`,
/// and each parent before its children.
/// 層序（廣度優先）走訪：父節點一定先於其子節點出現。
#[derive(Debug)]
pub struct LevelOrder<'a> {
    tree: &'a ItemTree,
    queue: VecDeque<LevelItem>,
}

impl Iterator for LevelOrder<'_> {
    type Item = LevelItem;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.queue.pop_front()?;
        // Files (and anything else without a child collection) contribute nothing.
        self.queue.extend(self.tree.children(current.handle).map(|handle| LevelItem {
            level: current.level + 1,
            handle,
        }));
        Some(current)
    }
}

pub fn level_order(tree: &ItemTree) -> LevelOrder<'_> {
    let mut queue = VecDeque::new();
    queue.push_back(LevelItem {
        level: 0,
        handle: tree.root(),
    });
    LevelOrder { tree, queue }
}
