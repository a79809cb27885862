//! Flattened parent-pointer storage of a solution in SQLite.
//! 以父節點指標表格將解決方案存入 SQLite。
//!
//! Rows are written in level order with fresh sequential ids, so a row's
//! parent always has a smaller `(level, id)` than the row itself. Reading
//! relies on that ordering and treats any violation as corruption.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::StorageOptions;
use crate::item::{ItemId, ItemType};
use crate::solution::{SolutionModel, FORMAT_VERSION_MAJOR};
use crate::traverse::level_order;
use crate::tree::{NodeHandle, TreeError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored item types do not match this version: {0}")]
    SchemaMismatch(String),
    #[error("solution data is corrupted: {0}")]
    CorruptData(String),
    #[error("solution store version {0} is newer than supported version {max}", max = FORMAT_VERSION_MAJOR)]
    UnsupportedVersion(i64),
    #[error("invalid solution tree: {0}")]
    Tree(#[from] TreeError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("solution store IO error: {0}")]
    Io(#[from] io::Error),
}

/// One flattened node as stored in the `solution` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionRow {
    pub id: i64,
    pub parent: i64,
    pub level: i64,
    pub name: String,
    pub item_type_id: i64,
}

/// SQLite-backed solution store.
/// 以 SQLite 為後端的解決方案儲存器。
pub struct SolutionDb {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SolutionDb {
    /// Opens (or creates) the database at `path` and applies `options`.
    /// 開啟（或建立）指定路徑的資料庫並套用選項。
    pub fn open(path: impl AsRef<Path>, options: &StorageOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(conn, options, Some(path.to_path_buf()))
    }

    pub fn open_in_memory(options: &StorageOptions) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn, options, None)
    }

    fn configure(conn: Connection, options: &StorageOptions, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", options.enforce_foreign_keys)?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            options.journal_mode.as_pragma(),
            |row| row.get(0),
        )?;
        debug!(
            path = ?path,
            journal_mode = %mode,
            foreign_keys = options.enforce_foreign_keys,
            "opened solution database"
        );
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn user_version(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    pub fn journal_mode(&self) -> Result<String, StoreError> {
        Ok(self
            .conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))?)
    }

    /// Replaces the stored solution with `model` in a single transaction.
    /// 以單一交易取代資料庫中的解決方案。
    ///
    /// Every node receives a fresh level-order id, which is also written back
    /// into `model`. Returns the number of node rows written.
    pub fn save(&mut self, model: &mut SolutionModel) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        recreate_tables(&tx)?;
        insert_item_types(&tx)?;
        let rows = insert_solution(&tx, model)?;
        tx.pragma_update(None, "user_version", i64::from(FORMAT_VERSION_MAJOR))?;
        tx.commit()?;
        debug!(path = ?self.path, rows, "saved solution rows");
        Ok(rows)
    }

    /// Loads the stored solution. No partial tree is ever returned.
    /// 載入資料庫中的解決方案；失敗時不會回傳部分結果。
    pub fn load(&mut self) -> Result<SolutionModel, StoreError> {
        let tx = self.conn.transaction()?;
        let version: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > i64::from(FORMAT_VERSION_MAJOR) {
            return Err(StoreError::UnsupportedVersion(version));
        }
        if !table_exists(&tx, "itemtype")? {
            return Err(StoreError::SchemaMismatch("missing itemtype table".into()));
        }
        if !table_exists(&tx, "solution")? {
            return Err(StoreError::CorruptData("missing solution table".into()));
        }
        let item_types = read_item_types(&tx)?;
        verify_item_types(&item_types)?;
        let model = read_solution(&tx)?;
        tx.commit()?;
        debug!(path = ?self.path, items = model.tree().len(), "loaded solution rows");
        Ok(model)
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Creates both tables when missing and empties them.
/// 建立缺少的資料表並清空內容。
pub fn recreate_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS itemtype (
            id   INTEGER      NOT NULL PRIMARY KEY,
            name VARCHAR(256) NOT NULL
        );

        CREATE TABLE IF NOT EXISTS solution (
            id         INTEGER      NOT NULL PRIMARY KEY,
            parent     INTEGER      NOT NULL,
            level      INTEGER      NOT NULL,
            name       VARCHAR(256) NOT NULL,
            itemtypeid INTEGER      NOT NULL,
            FOREIGN KEY (itemtypeid) REFERENCES itemtype(id)
        );

        DELETE FROM solution;
        DELETE FROM itemtype;
        ",
    )?;
    Ok(())
}

/// Rewrites the item-type enumeration table from [`ItemType::ALL`].
pub fn insert_item_types(conn: &Connection) -> Result<usize, StoreError> {
    conn.execute("DELETE FROM itemtype", [])?;
    let mut stmt = conn.prepare("INSERT INTO itemtype (id, name) VALUES (?1, ?2)")?;
    let mut written = 0;
    for item_type in ItemType::ALL {
        written += stmt.execute(params![item_type.as_i64(), item_type.name()])?;
    }
    Ok(written)
}

/// Flattens `model` into `solution` rows in level order.
/// 以層序走訪將樹狀結構攤平成資料列。
pub fn insert_solution(conn: &Connection, model: &mut SolutionModel) -> Result<usize, StoreError> {
    model.tree_mut().assign_level_order_ids();
    let tree = model.tree();

    let mut stmt = conn.prepare(
        "INSERT INTO solution (id, parent, level, name, itemtypeid) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut written = 0;
    for item in level_order(tree) {
        let Some(node) = tree.get(item.handle) else {
            continue;
        };
        let id = node.id().unwrap_or(ItemId(item.handle.index() as i64));
        let parent = node
            .parent()
            .and_then(|parent| tree.get(parent))
            .and_then(|parent| parent.id())
            .unwrap_or(ItemId::NONE_PARENT);
        written += stmt.execute(params![
            id.as_i64(),
            parent.as_i64(),
            item.level as i64,
            node.name(),
            node.item_type().as_i64(),
        ])?;
    }
    Ok(written)
}

/// Reads the `itemtype` table into an `id -> name` map.
pub fn read_item_types(conn: &Connection) -> Result<BTreeMap<i64, String>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name FROM itemtype ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
    Ok(rows)
}

/// Ensures every known item type is present with the expected name.
/// 確認每個已知項目類型都存在且名稱相符。
pub fn verify_item_types(stored: &BTreeMap<i64, String>) -> Result<(), StoreError> {
    for item_type in ItemType::ALL {
        match stored.get(&item_type.as_i64()) {
            Some(name) if name == item_type.name() => {}
            Some(name) => {
                warn!(value = item_type.as_i64(), stored = %name, "item type name mismatch");
                return Err(StoreError::SchemaMismatch(format!(
                    "value {} is named '{}', expected '{}'",
                    item_type.as_i64(),
                    name,
                    item_type.name()
                )));
            }
            None => {
                warn!(value = item_type.as_i64(), "item type missing from store");
                return Err(StoreError::SchemaMismatch(format!(
                    "missing '{}' = {}",
                    item_type.name(),
                    item_type.as_i64()
                )));
            }
        }
    }
    Ok(())
}

pub fn read_rows(conn: &Connection) -> Result<Vec<SolutionRow>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, parent, level, name, itemtypeid FROM solution ORDER BY level, id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SolutionRow {
                id: row.get(0)?,
                parent: row.get(1)?,
                level: row.get(2)?,
                name: row.get(3)?,
                item_type_id: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Rebuilds the tree from `solution` rows.
/// 由資料列重建樹狀結構。
pub fn read_solution(conn: &Connection) -> Result<SolutionModel, StoreError> {
    rebuild_from_rows(read_rows(conn)?)
}

/// Rebuilds a tree from rows sorted by `(level, id)`.
///
/// The first row becomes the root. Each later row must name a parent that
/// was already materialized as a container.
pub fn rebuild_from_rows(rows: Vec<SolutionRow>) -> Result<SolutionModel, StoreError> {
    let mut rows = rows.into_iter();
    let Some(first) = rows.next() else {
        return Err(StoreError::CorruptData("solution table holds no root row".into()));
    };
    if first.item_type_id != ItemType::RootItem.as_i64() {
        return Err(StoreError::CorruptData(format!(
            "first row {} has item type {} instead of the root type",
            first.id, first.item_type_id
        )));
    }

    let mut model = SolutionModel::new(first.name)?;
    let root = model.root();
    model.tree_mut().set_id(root, ItemId(first.id))?;
    let mut containers: HashMap<i64, NodeHandle> = HashMap::new();
    containers.insert(first.id, root);

    for row in rows {
        let Some(&parent) = containers.get(&row.parent) else {
            warn!(id = row.id, parent = row.parent, "row references an unknown parent");
            return Err(StoreError::CorruptData(format!(
                "row {} references parent {} which was not read before it",
                row.id, row.parent
            )));
        };
        let item_type = ItemType::from_i64(row.item_type_id).map_err(|err| {
            StoreError::CorruptData(format!("row {}: {err}", row.id))
        })?;
        let handle = model.add_child(row.name, item_type, parent)?;
        model.tree_mut().set_id(handle, ItemId(row.id))?;
        if item_type.is_container() {
            containers.insert(row.id, handle);
        }
    }
    Ok(model)
}
