use std::collections::HashMap;

use solutree_model::{
    validate_display_name, ItemError, ItemTree, ItemType, NodeHandle, TreeError, MAX_NAME_LEN,
};
use thiserror::Error;
use tracing::debug;

/// Root name used by a freshly reset browser.
pub const DEFAULT_SOLUTION_NAME: &str = "New Solution";

/// 瀏覽器命令失敗時的錯誤。 / Errors raised by browser commands.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("no free name left for a new {0} below {1}")]
    NoFreeName(ItemType, String),
    #[error("item {0} is read-only")]
    ReadOnly(NodeHandle),
}

/// 項目的介面狀態。 / Per-item UI state kept beside the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiState {
    pub is_expanded: bool,
    pub is_selected: bool,
    pub is_read_only: bool,
    pub edit_requested: bool,
}

/// User-facing message produced by a rejected command.
/// 命令被拒絕時提供給使用者的訊息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    InvalidNameLength { len: usize },
    DuplicateName { name: String },
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self {
            Notification::InvalidNameLength { .. } => "Invalid length of name",
            Notification::DuplicateName { .. } => "Item Already Exists",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notification::InvalidNameLength { .. } => {
                format!("A name must be between 1 and {MAX_NAME_LEN} characters long.")
            }
            Notification::DuplicateName { .. } => {
                "An item with this name exists already. All names must be unique.".to_string()
            }
        }
    }
}

/// Interactive view of a solution tree.
/// 解決方案樹的互動檢視，包含選取、展開與重新命名等命令。
///
/// UI state lives in a side table keyed by node handle; the tree itself
/// carries only durable data.
#[derive(Debug, Clone)]
pub struct SolutionBrowser {
    tree: ItemTree,
    ui: HashMap<NodeHandle, UiState>,
    selected: Option<NodeHandle>,
    notifications: Vec<Notification>,
}

impl SolutionBrowser {
    pub fn new(root_name: impl Into<String>) -> Result<Self, BrowserError> {
        Ok(Self::from_tree(ItemTree::new(root_name)?))
    }

    /// Wraps an existing tree; the root starts expanded.
    pub fn from_tree(tree: ItemTree) -> Self {
        let mut browser = Self {
            tree,
            ui: HashMap::new(),
            selected: None,
            notifications: Vec::new(),
        };
        let root = browser.tree.root();
        browser.state_mut(root).is_expanded = true;
        browser
    }

    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    pub fn into_tree(self) -> ItemTree {
        self.tree
    }

    pub fn root(&self) -> NodeHandle {
        self.tree.root()
    }

    /// Drops the current tree and starts over with an empty "New Solution".
    /// 捨棄目前的樹並以空白的 "New Solution" 重新開始。
    pub fn reset_to_defaults(&mut self) -> Result<(), BrowserError> {
        *self = Self::new(DEFAULT_SOLUTION_NAME)?;
        let root = self.tree.root();
        self.select(root);
        Ok(())
    }

    /// Replaces the whole tree with a new root.
    pub fn add_solution_root_item(&mut self, display_name: impl Into<String>) -> Result<NodeHandle, BrowserError> {
        let tree = ItemTree::new(display_name)?;
        *self = Self::from_tree(tree);
        Ok(self.tree.root())
    }

    pub fn add_root_child(&mut self, name: impl Into<String>, item_type: ItemType) -> Result<NodeHandle, BrowserError> {
        let root = self.tree.root();
        self.add_child(name, item_type, root)
    }

    pub fn add_child(
        &mut self,
        name: impl Into<String>,
        item_type: ItemType,
        parent: NodeHandle,
    ) -> Result<NodeHandle, BrowserError> {
        Ok(self.tree.add_child(parent, name, item_type)?)
    }

    /// Whether a new item of `item_type` may be added below `parent`.
    pub fn can_add_item(&self, parent: NodeHandle, item_type: ItemType) -> bool {
        self.tree
            .get(parent)
            .is_some_and(|node| node.item_type().can_contain(item_type))
    }

    /// Adds an item with a suggested name, then selects it for editing.
    /// 以建議名稱新增項目，並選取該項目進入編輯。
    pub fn add_item(&mut self, parent: NodeHandle, item_type: ItemType) -> Result<NodeHandle, BrowserError> {
        let name = self
            .tree
            .suggest_child_name(parent, item_type)
            .ok_or_else(|| BrowserError::NoFreeName(item_type, self.tree.stack_path(parent)))?;
        let handle = self.tree.add_child(parent, name, item_type)?;
        self.set_expanded(parent, true);
        self.tree.sort_children(parent)?;
        self.select(handle);
        self.state_mut(handle).edit_requested = true;
        debug!(path = %self.tree.stack_path(handle), "added item");
        Ok(handle)
    }

    /// The root can never be removed.
    pub fn can_remove_item(&self, handle: NodeHandle) -> bool {
        handle != self.tree.root() && self.tree.get(handle).is_some()
    }

    /// Removes an item. When the selection was inside the removed subtree,
    /// the previous sibling is selected, or the parent for a first child.
    /// 移除項目；若選取項目位於被移除的子樹中，改選前一個兄弟節點，若無則選取父節點。
    pub fn remove_item(&mut self, handle: NodeHandle) -> Result<(), BrowserError> {
        if handle == self.tree.root() {
            return Err(TreeError::RootRemoval.into());
        }
        let parent = self
            .tree
            .get(handle)
            .and_then(|node| node.parent())
            .ok_or(TreeError::NodeNotFound(handle))?;
        let selection_removed = self
            .selected
            .is_some_and(|selected| self.is_within(selected, handle));
        let path = self.tree.stack_path(handle);
        let position = self.tree.remove_child(parent, handle)?;
        self.forget_removed();

        if selection_removed {
            let next = position
                .checked_sub(1)
                .and_then(|previous| self.tree.child_at(parent, previous))
                .unwrap_or(parent);
            self.select(next);
        }
        debug!(%path, selection_removed, "removed item");
        Ok(())
    }

    /// Whether `node` is `ancestor` or lies below it.
    fn is_within(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.tree.get(handle).and_then(|node| node.parent());
        }
        false
    }

    pub fn remove_all_children(&mut self, parent: NodeHandle) -> Result<(), BrowserError> {
        self.tree.clear_children(parent)?;
        self.forget_removed();
        if self.selected.is_none() {
            self.select(parent);
        }
        Ok(())
    }

    pub fn can_start_rename(&self, handle: NodeHandle) -> bool {
        self.tree.get(handle).is_some() && !self.ui_state(handle).is_read_only
    }

    /// Puts `handle` into edit mode.
    pub fn start_rename(&mut self, handle: NodeHandle) -> Result<(), BrowserError> {
        if self.tree.get(handle).is_none() {
            return Err(TreeError::NodeNotFound(handle).into());
        }
        if self.ui_state(handle).is_read_only {
            return Err(BrowserError::ReadOnly(handle));
        }
        self.select(handle);
        self.state_mut(handle).edit_requested = true;
        Ok(())
    }

    /// Applies an edited name.
    /// 套用使用者輸入的新名稱。
    ///
    /// Returns `Ok(false)` when the name was rejected; a [`Notification`] is
    /// queued and the item is put back into edit mode. On success the parent
    /// is expanded and re-sorted and the item stays selected.
    pub fn rename_item(&mut self, handle: NodeHandle, new_name: &str) -> Result<bool, BrowserError> {
        let node = self.tree.get(handle).ok_or(TreeError::NodeNotFound(handle))?;
        if self.ui_state(handle).is_read_only {
            return Err(BrowserError::ReadOnly(handle));
        }
        let parent = node.parent();
        let unchanged = node.name() == new_name;
        if let Err(ItemError::InvalidNameLength { len }) = validate_display_name(new_name) {
            return Ok(self.reject(handle, Notification::InvalidNameLength { len }));
        }
        if let Some(parent) = parent {
            if !unchanged && self.tree.find_child(parent, new_name).is_some() {
                let name = new_name.to_string();
                return Ok(self.reject(handle, Notification::DuplicateName { name }));
            }
        }

        self.tree.rename(handle, new_name)?;
        self.state_mut(handle).edit_requested = false;
        if let Some(parent) = parent {
            self.select(parent);
            self.set_expanded(parent, true);
            self.tree.sort_children(parent)?;
        }
        self.select(handle);
        Ok(true)
    }

    fn reject(&mut self, handle: NodeHandle, notification: Notification) -> bool {
        debug!(?notification, "rename rejected");
        self.notifications.push(notification);
        self.state_mut(handle).edit_requested = true;
        false
    }

    pub fn sort_children(&mut self, parent: NodeHandle) -> Result<(), BrowserError> {
        Ok(self.tree.sort_children(parent)?)
    }

    /// Selects `handle`, clearing the previous selection.
    pub fn select(&mut self, handle: NodeHandle) {
        if self.tree.get(handle).is_none() {
            return;
        }
        if let Some(previous) = self.selected.take() {
            if let Some(state) = self.ui.get_mut(&previous) {
                state.is_selected = false;
            }
        }
        self.state_mut(handle).is_selected = true;
        self.selected = Some(handle);
    }

    pub fn set_expanded(&mut self, handle: NodeHandle, expanded: bool) {
        if self.tree.get(handle).is_some() {
            self.state_mut(handle).is_expanded = expanded;
        }
    }

    pub fn set_read_only(&mut self, handle: NodeHandle, read_only: bool) {
        if self.tree.get(handle).is_some() {
            self.state_mut(handle).is_read_only = read_only;
        }
    }

    pub fn selected(&self) -> Option<NodeHandle> {
        self.selected
    }

    pub fn ui_state(&self, handle: NodeHandle) -> UiState {
        self.ui.get(&handle).copied().unwrap_or_default()
    }

    /// Drains queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn state_mut(&mut self, handle: NodeHandle) -> &mut UiState {
        self.ui.entry(handle).or_default()
    }

    fn forget_removed(&mut self) {
        let tree = &self.tree;
        self.ui.retain(|handle, _| tree.get(*handle).is_some());
        if self.selected.is_some_and(|handle| tree.get(handle).is_none()) {
            self.selected = None;
        }
    }
}
