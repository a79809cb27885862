//! Structural copies between the persistence tree and the browser tree.
//! 儲存用樹與瀏覽器樹之間的結構複製。

use std::collections::HashMap;

use solutree_model::{level_order, ItemId, ItemTree, NodeHandle, SolutionModel, TreeError};
use thiserror::Error;
use tracing::debug;

use crate::browser::SolutionBrowser;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("item '{0}' was visited before its parent")]
    MissingParent(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Copies `source` into a fresh tree, numbering nodes 0.. in level order.
/// 以層序走訪將樹複製為全新結構，並自 0 起依序重新編號。
///
/// Every node is attached to the image of its own parent, looked up through
/// the id that parent received a moment earlier. Ids already present on
/// either side are ignored.
pub fn rebuild_level_order(source: &ItemTree) -> Result<ItemTree, ConvertError> {
    let mut walk = level_order(source);
    let root = walk
        .next()
        .and_then(|item| source.get(item.handle))
        .ok_or(TreeError::NodeNotFound(source.root()))?;

    let mut dest = ItemTree::new(root.name())?;
    let dest_root = dest.root();
    dest.set_id(dest_root, ItemId(0))?;

    let mut assigned: HashMap<NodeHandle, i64> = HashMap::from([(source.root(), 0)]);
    let mut images: HashMap<i64, NodeHandle> = HashMap::from([(0, dest_root)]);

    for (offset, item) in walk.enumerate() {
        let id = offset as i64 + 1;
        let Some(node) = source.get(item.handle) else {
            continue;
        };
        let dest_parent = node
            .parent()
            .and_then(|parent| assigned.get(&parent))
            .and_then(|parent_id| images.get(parent_id))
            .copied()
            .ok_or_else(|| ConvertError::MissingParent(source.stack_path(item.handle)))?;

        let handle = dest.add_child(dest_parent, node.name(), node.item_type())?;
        dest.set_id(handle, ItemId(id))?;
        assigned.insert(item.handle, id);
        images.insert(id, handle);
    }
    debug!(items = dest.len(), "rebuilt tree in level order");
    Ok(dest)
}

/// Persistence image of the browser, without UI state.
pub fn to_model(browser: &SolutionBrowser) -> Result<SolutionModel, ConvertError> {
    Ok(SolutionModel::from_tree(rebuild_level_order(browser.tree())?))
}

/// Fresh browser over a copy of `model`.
pub fn to_browser(model: &SolutionModel) -> Result<SolutionBrowser, ConvertError> {
    Ok(SolutionBrowser::from_tree(rebuild_level_order(model.tree())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solutree_model::ItemType;

    fn three_levels() -> SolutionBrowser {
        let mut browser = SolutionBrowser::new("S").unwrap();
        let folder = browser.add_root_child("F", ItemType::Folder).unwrap();
        let project = browser.add_root_child("P", ItemType::Project).unwrap();
        browser.add_child("a.txt", ItemType::File, folder).unwrap();
        browser.add_child("src", ItemType::Folder, project).unwrap();
        browser.add_child("b.txt", ItemType::File, folder).unwrap();
        browser
    }

    #[test]
    fn ids_are_sequential_in_level_order() {
        let browser = three_levels();
        let model = to_model(&browser).unwrap();
        let ids: Vec<(String, i64)> = level_order(model.tree())
            .map(|item| {
                let node = model.tree().get(item.handle).unwrap();
                (node.name().to_string(), node.id().unwrap().as_i64())
            })
            .collect();
        let expected = [("S", 0), ("F", 1), ("P", 2), ("a.txt", 3), ("b.txt", 4), ("src", 5)];
        let expected: Vec<(String, i64)> = expected
            .iter()
            .map(|(name, id)| (name.to_string(), *id))
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn every_node_keeps_its_parent() {
        let browser = three_levels();
        let model = to_model(&browser).unwrap();
        for item in level_order(browser.tree()) {
            let path = browser.tree().stack_path(item.handle);
            let image = model.tree().resolve_path(&path).unwrap();
            let source_parent = browser
                .tree()
                .get(item.handle)
                .unwrap()
                .parent()
                .map(|parent| browser.tree().stack_path(parent));
            let image_parent = model
                .tree()
                .get(image)
                .unwrap()
                .parent()
                .map(|parent| model.tree().stack_path(parent));
            assert_eq!(source_parent, image_parent);
        }
    }

    #[test]
    fn copy_is_independent_of_source() {
        let browser = three_levels();
        let mut model = to_model(&browser).unwrap();
        let root = model.root();
        model.add_root_child("extra", ItemType::File).unwrap();
        model.tree_mut().rename(root, "Other").unwrap();
        assert_eq!(browser.tree().len(), 6);
        assert_eq!(browser.tree().stack_path(browser.root()), "/S");
    }

    #[test]
    fn files_are_childless_during_the_walk() {
        let mut browser = SolutionBrowser::new("S").unwrap();
        browser.add_root_child("only.txt", ItemType::File).unwrap();
        let copy = rebuild_level_order(browser.tree()).unwrap();
        assert_eq!(copy.len(), 2);
    }
}
