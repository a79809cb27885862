use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Longest display name accepted for any item, counted in characters.
/// 項目顯示名稱允許的最大字元數。
pub const MAX_NAME_LEN: usize = 254;

/// Kind of an item in the solution tree. Discriminants are persisted verbatim.
/// 解決方案樹中項目的類型；數值會原樣寫入儲存檔。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemType {
    RootItem = 0,
    File = 100,
    Folder = 200,
    Project = 300,
}

impl ItemType {
    /// Every item type, in enumeration-value order.
    pub const ALL: [ItemType; 4] = [
        ItemType::RootItem,
        ItemType::File,
        ItemType::Folder,
        ItemType::Project,
    ];

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Result<Self, ItemError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_i64() == value)
            .ok_or(ItemError::UnknownType(value))
    }

    /// Canonical name used for XML element names and the `itemtype` table.
    /// XML 元素與 `itemtype` 資料表使用的標準名稱。
    pub fn name(self) -> &'static str {
        match self {
            ItemType::RootItem => "RootItem",
            ItemType::File => "File",
            ItemType::Folder => "Folder",
            ItemType::Project => "Project",
        }
    }

    pub fn is_container(self) -> bool {
        !matches!(self, ItemType::File)
    }

    /// Display group: root first, then folders, projects, files.
    pub fn rank(self) -> u32 {
        match self {
            ItemType::RootItem => 0,
            ItemType::Folder => 222,
            ItemType::Project => 444,
            ItemType::File => 666,
        }
    }

    /// Stem used when proposing a free name for a new item of this type.
    pub fn suggestion_stem(self) -> &'static str {
        match self {
            ItemType::RootItem => "New Solution",
            ItemType::File => "New File",
            ItemType::Folder => "New Folder",
            ItemType::Project => "New Project",
        }
    }

    /// Returns `true` when an item of this type may own a child of type `child`.
    /// 判斷此類型的項目能否擁有 `child` 類型的子項目。
    pub fn can_contain(self, child: ItemType) -> bool {
        match (self, child) {
            (_, ItemType::RootItem) => false,
            (ItemType::File, _) => false,
            (ItemType::Project, ItemType::Project) => false,
            _ => true,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ItemType {
    type Err = ItemError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| ItemError::UnknownTypeName(value.to_string()))
    }
}

/// Numeric identity of an item, assigned when a tree is serialized or converted.
/// 項目的數字識別碼，於序列化或轉換時指派。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Parent column value stored for the root row.
    pub const NONE_PARENT: ItemId = ItemId(-1);

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("item type value {0} is out of range")]
    UnknownType(i64),
    #[error("unknown item type '{0}'")]
    UnknownTypeName(String),
    #[error("a name must be between 1 and {max} characters long (got {len})", max = MAX_NAME_LEN)]
    InvalidNameLength { len: usize },
}

/// Checks the 1..=254 character rule for display names.
/// 檢查顯示名稱長度是否介於 1 到 254 個字元。
pub fn validate_display_name(name: &str) -> Result<(), ItemError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ItemError::InvalidNameLength { len });
    }
    Ok(())
}

/// Ordering key grouping items by type rank, alphabetic within a group.
pub fn sort_key(item_type: ItemType, name: &str) -> String {
    format!("{:03}_{}", item_type.rank(), name)
}
