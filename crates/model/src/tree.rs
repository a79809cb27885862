use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::collection::{CollectionError, SortableKeyedCollection};
use crate::item::{sort_key, validate_display_name, ItemError, ItemId, ItemType};
use crate::traverse::level_order;

/// Arena index of a node inside an [`ItemTree`].
/// [`ItemTree`] 內節點的索引。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Single node stored in the arena.
/// 儲存在樹狀結構中的單一節點。
#[derive(Debug, Clone)]
pub struct ItemNode {
    id: Option<ItemId>,
    name: String,
    item_type: ItemType,
    parent: Option<NodeHandle>,
    children: Option<SortableKeyedCollection<NodeHandle>>,
}

impl ItemNode {
    fn new(name: String, item_type: ItemType, parent: Option<NodeHandle>) -> Self {
        Self {
            id: None,
            name,
            item_type,
            parent,
            children: item_type.is_container().then(SortableKeyedCollection::new),
        }
    }

    pub fn id(&self) -> Option<ItemId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn sort_key(&self) -> String {
        sort_key(self.item_type, &self.name)
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, |children| children.len())
    }
}

/// Tree-manipulation errors.
/// 樹狀結構操作錯誤類型。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("item '{name}' already exists below '{parent}'")]
    DuplicateName { parent: String, name: String },
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error("'{0}' cannot have children")]
    NotAContainer(String),
    #[error("a {child} cannot be added below a {parent}")]
    InvalidChild { parent: ItemType, child: ItemType },
    #[error("node {0} not found")]
    NodeNotFound(NodeHandle),
    #[error("the root item cannot be removed")]
    RootRemoval,
}

/// Typed item hierarchy with exactly one root.
/// 只有單一根節點的型別化項目樹。
///
/// Containers own their children through a [`SortableKeyedCollection`];
/// the parent link is a plain handle. Removing a child frees its whole
/// subtree; a handle stays valid until its item is removed, after which the
/// slot may be handed to a later [`ItemTree::add_child`].
#[derive(Debug, Clone)]
pub struct ItemTree {
    nodes: Vec<Option<ItemNode>>,
    free: Vec<usize>,
    root: NodeHandle,
    live: usize,
}

impl ItemTree {
    /// Constructs a tree holding only a root item.
    /// 建立僅含根節點的樹。
    pub fn new(root_name: impl Into<String>) -> Result<Self, TreeError> {
        let root_name = root_name.into();
        validate_display_name(&root_name)?;
        Ok(Self {
            nodes: vec![Some(ItemNode::new(root_name, ItemType::RootItem, None))],
            free: Vec::new(),
            root: NodeHandle(0),
            live: 1,
        })
    }

    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Number of reachable nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&ItemNode> {
        self.nodes.get(handle.0).and_then(Option::as_ref)
    }

    fn node(&self, handle: NodeHandle) -> Result<&ItemNode, TreeError> {
        self.get(handle).ok_or(TreeError::NodeNotFound(handle))
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut ItemNode, TreeError> {
        self.nodes
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::NodeNotFound(handle))
    }

    fn collection_mut(
        &mut self,
        handle: NodeHandle,
    ) -> Result<&mut SortableKeyedCollection<NodeHandle>, TreeError> {
        let path = self.stack_path(handle);
        self.node_mut(handle)?
            .children
            .as_mut()
            .ok_or(TreeError::NotAContainer(path))
    }

    /// Adds a new child below `parent`.
    /// 在指定的父節點下方新增子節點。
    pub fn add_child(
        &mut self,
        parent: NodeHandle,
        name: impl Into<String>,
        item_type: ItemType,
    ) -> Result<NodeHandle, TreeError> {
        let name = name.into();
        let parent_node = self.node(parent)?;
        let Some(children) = parent_node.children.as_ref() else {
            return Err(TreeError::NotAContainer(self.stack_path(parent)));
        };
        if !parent_node.item_type.can_contain(item_type) {
            return Err(TreeError::InvalidChild {
                parent: parent_node.item_type,
                child: item_type,
            });
        }
        validate_display_name(&name)?;
        if children.contains(&name) {
            return Err(TreeError::DuplicateName {
                parent: self.stack_path(parent),
                name,
            });
        }

        let reused = self.free.last().copied();
        let handle = NodeHandle(reused.unwrap_or(self.nodes.len()));
        self.collection_mut(parent)?
            .add(name.clone(), item_type, handle)
            .map_err(|_| TreeError::NodeNotFound(parent))?;
        let node = Some(ItemNode::new(name, item_type, Some(parent)));
        match reused {
            Some(index) => {
                self.free.pop();
                self.nodes[index] = node;
            }
            None => self.nodes.push(node),
        }
        self.live += 1;
        Ok(handle)
    }

    /// Finds a direct child by display name.
    /// 依顯示名稱尋找直接子節點。
    pub fn find_child(&self, parent: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.get(parent)?.children.as_ref()?.get(name)
    }

    /// Children in display order; files yield nothing.
    pub fn children(&self, parent: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        self.get(parent)
            .and_then(|node| node.children.as_ref())
            .into_iter()
            .flat_map(|children| children.values())
    }

    pub fn child_count(&self, parent: NodeHandle) -> usize {
        self.get(parent).map_or(0, ItemNode::child_count)
    }

    pub fn child_at(&self, parent: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.get(parent)?
            .children
            .as_ref()?
            .at(index)
            .map(|entry| entry.value)
    }

    pub fn position_of(&self, child: NodeHandle) -> Option<usize> {
        let parent = self.get(child)?.parent?;
        self.get(parent)?.children.as_ref()?.position(child)
    }

    /// Detaches `child` from `parent` and frees its subtree.
    /// 將子節點自父節點分離並釋放整個子樹。
    ///
    /// Returns the position the child occupied in the parent's display order.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<usize, TreeError> {
        if child == self.root {
            return Err(TreeError::RootRemoval);
        }
        let node = self.node(child)?;
        if node.parent != Some(parent) {
            return Err(TreeError::NodeNotFound(child));
        }
        let name = node.name.clone();
        let (position, _) = self
            .collection_mut(parent)?
            .remove(&name)
            .ok_or(TreeError::NodeNotFound(child))?;
        self.free_subtree(child);
        Ok(position)
    }

    /// Removes every child of `parent`.
    /// 移除父節點的所有子節點。
    pub fn clear_children(&mut self, parent: NodeHandle) -> Result<(), TreeError> {
        let children: Vec<NodeHandle> = self.children(parent).collect();
        self.collection_mut(parent)?.clear();
        for child in children {
            self.free_subtree(child);
        }
        Ok(())
    }

    fn free_subtree(&mut self, top: NodeHandle) {
        let mut pending = vec![top];
        while let Some(handle) = pending.pop() {
            pending.extend(self.children(handle));
            if let Some(slot) = self.nodes.get_mut(handle.0) {
                if slot.take().is_some() {
                    self.live -= 1;
                    self.free.push(handle.0);
                }
            }
        }
    }

    /// Renames an item. Siblings must not already use `new_name`; the root has
    /// no siblings and renames itself. Display order is not refreshed.
    /// 重新命名項目；兄弟節點不得重名，根節點則直接改名。顯示順序不會自動更新。
    pub fn rename(&mut self, handle: NodeHandle, new_name: impl Into<String>) -> Result<(), TreeError> {
        let new_name = new_name.into();
        validate_display_name(&new_name)?;
        let node = self.node(handle)?;
        let old_name = node.name.clone();
        if let Some(parent) = node.parent {
            let parent_path = self.stack_path(parent);
            self.collection_mut(parent)?
                .rename(&old_name, &new_name)
                .map_err(|err| match err {
                    CollectionError::DuplicateName(name) => TreeError::DuplicateName {
                        parent: parent_path,
                        name,
                    },
                    CollectionError::NotFound(_) => TreeError::NodeNotFound(handle),
                })?;
        }
        self.node_mut(handle)?.name = new_name;
        Ok(())
    }

    /// Re-sorts the children of `parent` by sort key.
    pub fn sort_children(&mut self, parent: NodeHandle) -> Result<(), TreeError> {
        self.collection_mut(parent)?.sort();
        Ok(())
    }

    /// Re-sorts every container in the tree.
    pub fn sort_all(&mut self) {
        let containers: Vec<NodeHandle> = level_order(self)
            .map(|item| item.handle)
            .filter(|handle| self.get(*handle).is_some_and(ItemNode::is_container))
            .collect();
        for handle in containers {
            if let Some(children) = self
                .nodes
                .get_mut(handle.0)
                .and_then(Option::as_mut)
                .and_then(|node| node.children.as_mut())
            {
                children.sort();
            }
        }
    }

    /// Proposes a free child name for a new item of `item_type` below `parent`.
    pub fn suggest_child_name(&self, parent: NodeHandle, item_type: ItemType) -> Option<String> {
        self.get(parent)?
            .children
            .as_ref()?
            .suggest_next_name(item_type)
    }

    /// Joins the display names from the root down to `handle` (`/Root/Folder/file`).
    /// 由根節點至指定節點串接顯示名稱，僅供診斷輸出使用。
    pub fn stack_path(&self, handle: NodeHandle) -> String {
        let mut segments = Vec::new();
        let mut current = self.get(handle);
        while let Some(node) = current {
            segments.push(node.name.as_str());
            current = node.parent.and_then(|parent| self.get(parent));
        }
        segments
            .iter()
            .rev()
            .fold(String::new(), |mut path, segment| {
                path.push('/');
                path.push_str(segment);
                path
            })
    }

    /// Resolves a `/Root/Folder/file` style path back to a node.
    /// Items whose names contain '/' cannot be reached this way.
    pub fn resolve_path(&self, path: &str) -> Option<NodeHandle> {
        let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');
        let root = self.get(self.root)?;
        if segments.next()? != root.name {
            return None;
        }
        segments
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root, |current, segment| self.find_child(current, segment))
    }

    /// Distance from the root (the root has depth 0).
    pub fn depth(&self, handle: NodeHandle) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.get(handle)?;
        while let Some(parent) = current.parent {
            current = self.get(parent)?;
            depth += 1;
        }
        Some(depth)
    }

    pub fn set_id(&mut self, handle: NodeHandle, id: ItemId) -> Result<(), TreeError> {
        self.node_mut(handle)?.id = Some(id);
        Ok(())
    }

    /// Overwrites every id with its sequential level-order position, root = 0.
    /// 依層序走訪重新指派所有識別碼，根節點為 0。
    pub fn assign_level_order_ids(&mut self) {
        let order: Vec<NodeHandle> = level_order(self).map(|item| item.handle).collect();
        for (index, handle) in order.into_iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(handle.0).and_then(Option::as_mut) {
                node.id = Some(ItemId(index as i64));
            }
        }
        debug!(items = self.live, "assigned level-order ids");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ItemTree, NodeHandle, NodeHandle) {
        let mut tree = ItemTree::new("S").unwrap();
        let folder = tree.add_child(tree.root(), "F", ItemType::Folder).unwrap();
        let file = tree.add_child(folder, "a.txt", ItemType::File).unwrap();
        (tree, folder, file)
    }

    #[test]
    fn add_child_links_parent_and_path() {
        let (tree, folder, file) = sample();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(file).unwrap().parent(), Some(folder));
        assert_eq!(tree.stack_path(file), "/S/F/a.txt");
        assert_eq!(tree.find_child(folder, "a.txt"), Some(file));
        assert_eq!(tree.resolve_path("/S/F/a.txt"), Some(file));
        assert_eq!(tree.resolve_path("/S"), Some(tree.root()));
        assert_eq!(tree.resolve_path("/Other/F"), None);
        assert_eq!(tree.depth(file), Some(2));
    }

    #[test]
    fn add_child_errors_on_non_container_parent() {
        let (mut tree, _, file) = sample();
        let err = tree.add_child(file, "x", ItemType::File).unwrap_err();
        assert_eq!(err, TreeError::NotAContainer("/S/F/a.txt".into()));
    }

    #[test]
    fn duplicate_names_are_rejected_across_types() {
        let mut tree = ItemTree::new("S").unwrap();
        let root = tree.root();
        let file = tree.add_child(root, "x", ItemType::File).unwrap();
        let err = tree.add_child(root, "x", ItemType::Folder).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateName { .. }));
        assert_eq!(tree.get(file).unwrap().item_type(), ItemType::File);
        assert_eq!(tree.child_count(root), 1);
    }

    #[test]
    fn projects_cannot_nest_and_root_cannot_be_a_child() {
        let mut tree = ItemTree::new("S").unwrap();
        let project = tree.add_child(tree.root(), "P", ItemType::Project).unwrap();
        assert_eq!(
            tree.add_child(project, "Q", ItemType::Project),
            Err(TreeError::InvalidChild {
                parent: ItemType::Project,
                child: ItemType::Project
            })
        );
        assert!(tree.add_child(project, "src", ItemType::Folder).is_ok());
        assert!(matches!(
            tree.add_child(tree.root(), "R", ItemType::RootItem),
            Err(TreeError::InvalidChild { .. })
        ));
    }

    #[test]
    fn rename_collision_keeps_original() {
        let mut tree = ItemTree::new("S").unwrap();
        let root = tree.root();
        let a = tree.add_child(root, "a", ItemType::File).unwrap();
        tree.add_child(root, "b", ItemType::File).unwrap();

        assert!(matches!(
            tree.rename(a, "b"),
            Err(TreeError::DuplicateName { .. })
        ));
        assert_eq!(tree.get(a).unwrap().name(), "a");
        assert_eq!(tree.position_of(a), Some(0));

        tree.rename(a, "c").unwrap();
        assert_eq!(tree.find_child(root, "c"), Some(a));
        assert_eq!(tree.get(a).unwrap().sort_key(), "666_c");
        // not re-sorted until asked
        assert_eq!(tree.position_of(a), Some(0));
        tree.sort_children(root).unwrap();
        assert_eq!(tree.position_of(a), Some(1));
    }

    #[test]
    fn rename_checks_length_and_allows_root() {
        let (mut tree, folder, _) = sample();
        assert!(matches!(tree.rename(folder, ""), Err(TreeError::Item(_))));
        assert!(matches!(
            tree.rename(folder, "x".repeat(255)),
            Err(TreeError::Item(ItemError::InvalidNameLength { len: 255 }))
        ));
        tree.rename(folder, "y".repeat(254)).unwrap();
        tree.rename(tree.root(), "Renamed").unwrap();
        assert_eq!(tree.get(tree.root()).unwrap().name(), "Renamed");
    }

    #[test]
    fn remove_child_frees_subtree() {
        let (mut tree, folder, file) = sample();
        let root = tree.root();
        let position = tree.remove_child(root, folder).unwrap();
        assert_eq!(position, 0);
        assert_eq!(tree.len(), 1);
        assert!(tree.get(folder).is_none());
        assert!(tree.get(file).is_none());
        assert_eq!(tree.remove_child(root, root), Err(TreeError::RootRemoval));
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut tree = ItemTree::new("S").unwrap();
        let root = tree.root();
        let keep = tree.add_child(root, "keep", ItemType::File).unwrap();
        for _ in 0..1000 {
            let folder = tree.add_child(root, "F", ItemType::Folder).unwrap();
            tree.add_child(folder, "a.txt", ItemType::File).unwrap();
            tree.remove_child(root, folder).unwrap();
        }
        assert_eq!(tree.len(), 2);
        assert!(tree.nodes.len() <= 4);
        assert_eq!(tree.stack_path(keep), "/S/keep");

        let file = tree.add_child(root, "b.txt", ItemType::File).unwrap();
        assert!(file.index() < 4);
        assert_eq!(tree.get(file).unwrap().name(), "b.txt");
        assert_eq!(tree.find_child(root, "b.txt"), Some(file));
    }

    #[test]
    fn failed_add_does_not_consume_a_freed_slot() {
        let (mut tree, folder, file) = sample();
        tree.remove_child(folder, file).unwrap();
        assert!(tree.add_child(folder, "", ItemType::File).is_err());
        let again = tree.add_child(folder, "a.txt", ItemType::File).unwrap();
        assert_eq!(again, file);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn clear_children_empties_container() {
        let (mut tree, folder, _) = sample();
        tree.add_child(folder, "b.txt", ItemType::File).unwrap();
        tree.clear_children(folder).unwrap();
        assert_eq!(tree.child_count(folder), 0);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn sort_all_orders_every_container() {
        let mut tree = ItemTree::new("S").unwrap();
        let root = tree.root();
        tree.add_child(root, "z.txt", ItemType::File).unwrap();
        let project = tree.add_child(root, "App", ItemType::Project).unwrap();
        tree.add_child(root, "docs", ItemType::Folder).unwrap();
        tree.add_child(project, "main.rs", ItemType::File).unwrap();
        tree.add_child(project, "src", ItemType::Folder).unwrap();

        tree.sort_all();
        let names = |parent| {
            tree.children(parent)
                .map(|child| tree.get(child).unwrap().name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(root), ["docs", "App", "z.txt"]);
        assert_eq!(names(project), ["src", "main.rs"]);
    }

    #[test]
    fn level_order_ids_start_at_root() {
        let (mut tree, folder, file) = sample();
        tree.assign_level_order_ids();
        assert_eq!(tree.get(tree.root()).unwrap().id(), Some(ItemId(0)));
        assert_eq!(tree.get(folder).unwrap().id(), Some(ItemId(1)));
        assert_eq!(tree.get(file).unwrap().id(), Some(ItemId(2)));
    }
}
