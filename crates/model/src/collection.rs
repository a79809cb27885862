use std::collections::HashMap;

use thiserror::Error;

use crate::item::{sort_key, ItemType};

/// One member of a [`SortableKeyedCollection`].
/// 集合中的單一成員。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    pub name: String,
    pub item_type: ItemType,
    pub sort_key: String,
    pub value: V,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("item '{0}' already exists")]
    DuplicateName(String),
    #[error("item '{0}' not found")]
    NotFound(String),
}

/// Ordered sequence with unique name lookup and on-demand re-sorting.
/// 具有唯一名稱索引、可依需求重新排序的有序集合。
///
/// New entries are appended; the display order only changes when [`sort`]
/// is called.
///
/// [`sort`]: SortableKeyedCollection::sort
#[derive(Debug, Clone)]
pub struct SortableKeyedCollection<V> {
    order: Vec<Entry<V>>,
    lookup: HashMap<String, V>,
}

impl<V> Default for SortableKeyedCollection<V> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<V: Copy + PartialEq> SortableKeyedCollection<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Constant-time lookup by display name.
    /// 依顯示名稱進行常數時間查詢。
    pub fn get(&self, name: &str) -> Option<V> {
        self.lookup.get(name).copied()
    }

    pub fn entry(&self, name: &str) -> Option<&Entry<V>> {
        self.order.iter().find(|entry| entry.name == name)
    }

    pub fn position(&self, value: V) -> Option<usize> {
        self.order.iter().position(|entry| entry.value == value)
    }

    pub fn at(&self, index: usize) -> Option<&Entry<V>> {
        self.order.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<V>> + '_ {
        self.order.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.order.iter().map(|entry| entry.value)
    }

    /// Appends a new entry, rejecting names already present.
    /// 新增項目至尾端；名稱重複時回傳錯誤。
    pub fn add(
        &mut self,
        name: impl Into<String>,
        item_type: ItemType,
        value: V,
    ) -> Result<&Entry<V>, CollectionError> {
        let name = name.into();
        if self.lookup.contains_key(&name) {
            return Err(CollectionError::DuplicateName(name));
        }
        self.lookup.insert(name.clone(), value);
        self.order.push(Entry {
            sort_key: sort_key(item_type, &name),
            name,
            item_type,
            value,
        });
        Ok(&self.order[self.order.len() - 1])
    }

    /// Removes the entry keyed by `name`, returning its former position.
    /// 移除指定名稱的項目並回傳其原本位置。
    pub fn remove(&mut self, name: &str) -> Option<(usize, Entry<V>)> {
        self.lookup.remove(name)?;
        let index = self.order.iter().position(|entry| entry.name == name)?;
        Some((index, self.order.remove(index)))
    }

    /// Re-keys an entry. The display order is left untouched until [`Self::sort`].
    /// 重新命名項目；顯示順序須另行呼叫 [`Self::sort`] 才會更新。
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<&Entry<V>, CollectionError> {
        let index = self
            .order
            .iter()
            .position(|entry| entry.name == old_name)
            .ok_or_else(|| CollectionError::NotFound(old_name.to_string()))?;
        if old_name == new_name {
            return Ok(&self.order[index]);
        }
        if self.lookup.contains_key(new_name) {
            return Err(CollectionError::DuplicateName(new_name.to_string()));
        }

        let entry = &mut self.order[index];
        self.lookup.remove(old_name);
        self.lookup.insert(new_name.to_string(), entry.value);
        entry.name = new_name.to_string();
        entry.sort_key = sort_key(entry.item_type, new_name);
        Ok(&self.order[index])
    }

    /// Stable ascending sort by sort key.
    pub fn sort(&mut self) {
        self.order.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.lookup.clear();
    }

    /// Proposes an unused name for a new entry of `item_type`.
    /// 為新項目建議一個尚未使用的名稱。
    ///
    /// Tries `"New <Type>"`, then `"New <Type> 1"`, `"New <Type> 2"`, … for up
    /// to `len + 100` candidates. Returns `None` if every candidate collides.
    /// 最多嘗試 `len + 100` 個候選名稱。
    pub fn suggest_next_name(&self, item_type: ItemType) -> Option<String> {
        let stem = item_type.suggestion_stem();
        if !self.contains(stem) {
            return Some(stem.to_string());
        }
        (1..self.len() + 100)
            .map(|index| format!("{stem} {index}"))
            .find(|candidate| !self.contains(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<V: Copy + PartialEq>(collection: &SortableKeyedCollection<V>) -> Vec<&str> {
        collection.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[test]
    fn add_rejects_duplicate_names() {
        let mut collection = SortableKeyedCollection::new();
        collection.add("x", ItemType::File, 1u32).unwrap();
        let err = collection.add("x", ItemType::Folder, 2).unwrap_err();
        assert_eq!(err, CollectionError::DuplicateName("x".into()));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.entry("x").unwrap().item_type, ItemType::File);
    }

    #[test]
    fn add_appends_until_sorted() {
        let mut collection = SortableKeyedCollection::new();
        collection.add("b.txt", ItemType::File, 1u32).unwrap();
        collection.add("src", ItemType::Folder, 2).unwrap();
        collection.add("App", ItemType::Project, 3).unwrap();
        collection.add("a.txt", ItemType::File, 4).unwrap();
        assert_eq!(names(&collection), ["b.txt", "src", "App", "a.txt"]);

        collection.sort();
        assert_eq!(names(&collection), ["src", "App", "a.txt", "b.txt"]);
        collection.sort();
        assert_eq!(names(&collection), ["src", "App", "a.txt", "b.txt"]);
    }

    #[test]
    fn rename_rekeys_without_resorting() {
        let mut collection = SortableKeyedCollection::new();
        collection.add("a", ItemType::File, 1u32).unwrap();
        collection.add("b", ItemType::File, 2).unwrap();
        collection.add("c", ItemType::File, 3).unwrap();

        let entry = collection.rename("a", "z").unwrap();
        assert_eq!(entry.sort_key, "666_z");
        assert_eq!(collection.get("z"), Some(1));
        assert_eq!(collection.get("a"), None);
        assert_eq!(names(&collection), ["z", "b", "c"]);

        collection.sort();
        assert_eq!(names(&collection), ["b", "c", "z"]);
    }

    #[test]
    fn rename_collision_keeps_name_and_position() {
        let mut collection = SortableKeyedCollection::new();
        collection.add("a", ItemType::File, 1u32).unwrap();
        collection.add("b", ItemType::File, 2).unwrap();

        let err = collection.rename("a", "b").unwrap_err();
        assert_eq!(err, CollectionError::DuplicateName("b".into()));
        assert_eq!(collection.get("a"), Some(1));
        assert_eq!(collection.position(1), Some(0));
    }

    #[test]
    fn remove_reports_position() {
        let mut collection = SortableKeyedCollection::new();
        collection.add("a", ItemType::File, 1u32).unwrap();
        collection.add("b", ItemType::File, 2).unwrap();
        let (index, entry) = collection.remove("b").unwrap();
        assert_eq!(index, 1);
        assert_eq!(entry.value, 2);
        assert!(collection.remove("b").is_none());
        assert!(!collection.contains("b"));
    }

    #[test]
    fn suggest_next_name_tries_numbered_candidates() {
        let mut collection = SortableKeyedCollection::new();
        assert_eq!(
            collection.suggest_next_name(ItemType::Folder).as_deref(),
            Some("New Folder")
        );
        collection.add("New Folder", ItemType::Folder, 1u32).unwrap();
        collection.add("New Folder 1", ItemType::Folder, 2).unwrap();
        assert_eq!(
            collection.suggest_next_name(ItemType::Folder).as_deref(),
            Some("New Folder 2")
        );
        assert_eq!(
            collection.suggest_next_name(ItemType::File).as_deref(),
            Some("New File")
        );
    }

    #[test]
    fn suggest_next_name_skips_a_dense_run() {
        let mut collection = SortableKeyedCollection::new();
        collection.add("New File", ItemType::File, 0u32).unwrap();
        for index in 1..200u32 {
            collection
                .add(format!("New File {index}"), ItemType::File, index)
                .unwrap();
        }
        assert_eq!(
            collection.suggest_next_name(ItemType::File).as_deref(),
            Some("New File 200")
        );
    }
}
