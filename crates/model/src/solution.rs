use crate::item::ItemType;
use crate::tree::{ItemTree, NodeHandle, TreeError};

/// Major version of the persisted solution layout understood by this build.
pub const FORMAT_VERSION_MAJOR: u32 = 1;
/// Minor version written alongside [`FORMAT_VERSION_MAJOR`].
pub const FORMAT_VERSION_MINOR: u32 = 0;

/// Version pair recorded in saved solutions.
/// 儲存檔中記錄的版本資訊。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion {
        major: FORMAT_VERSION_MAJOR,
        minor: FORMAT_VERSION_MINOR,
    };

    /// Older or equal majors load; newer majors come from an incompatible writer.
    pub fn is_supported(&self) -> bool {
        self.major <= FORMAT_VERSION_MAJOR
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Persistence-side solution tree, free of any UI state.
/// 儲存用的解決方案樹，不包含任何介面狀態。
#[derive(Debug, Clone)]
pub struct SolutionModel {
    version: FormatVersion,
    tree: ItemTree,
}

impl SolutionModel {
    pub fn new(root_name: impl Into<String>) -> Result<Self, TreeError> {
        Ok(Self::from_tree(ItemTree::new(root_name)?))
    }

    pub fn from_tree(tree: ItemTree) -> Self {
        Self {
            version: FormatVersion::CURRENT,
            tree,
        }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn set_version(&mut self, version: FormatVersion) {
        self.version = version;
    }

    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ItemTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> ItemTree {
        self.tree
    }

    pub fn root(&self) -> NodeHandle {
        self.tree.root()
    }

    /// Replaces the whole tree with a fresh root named `display_name`.
    /// 以新的根節點取代整棵樹。
    pub fn add_solution_root_item(&mut self, display_name: impl Into<String>) -> Result<NodeHandle, TreeError> {
        self.tree = ItemTree::new(display_name)?;
        Ok(self.tree.root())
    }

    pub fn add_root_child(&mut self, name: impl Into<String>, item_type: ItemType) -> Result<NodeHandle, TreeError> {
        let root = self.tree.root();
        self.tree.add_child(root, name, item_type)
    }

    pub fn add_child(
        &mut self,
        name: impl Into<String>,
        item_type: ItemType,
        parent: NodeHandle,
    ) -> Result<NodeHandle, TreeError> {
        self.tree.add_child(parent, name, item_type)
    }

    pub fn find_child(&self, parent: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.tree.find_child(parent, name)
    }

    pub fn stack_path(&self, handle: NodeHandle) -> String {
        self.tree.stack_path(handle)
    }
}
