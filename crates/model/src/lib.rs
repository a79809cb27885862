//! Solution tree model and its XML / SQLite persistence for Solutree.
//! Solutree 的解決方案樹模型與 XML／SQLite 儲存層。

mod util;

pub mod collection;
pub mod config;
pub mod item;
pub mod solution;
pub mod sqlite;
pub mod store;
pub mod traverse;
pub mod tree;
pub mod xml;

pub use collection::{CollectionError, Entry, SortableKeyedCollection};
pub use config::{JournalMode, OptionsError, StorageOptions, StorageOptionsStore};
pub use item::{sort_key, validate_display_name, ItemError, ItemId, ItemType, MAX_NAME_LEN};
pub use solution::{FormatVersion, SolutionModel, FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR};
pub use sqlite::{SolutionDb, SolutionRow, StoreError};
pub use store::{
    load_solution, load_with, save_solution, save_with, LabelRenderer, PathChooser, PlainLabels,
    SolutionFileError, SolutionFormat, SOLUTION_FILE_FILTER, SQLITE_EXTENSION, XML_EXTENSION,
};
pub use traverse::{level_order, LevelItem, LevelOrder};
pub use tree::{ItemNode, ItemTree, NodeHandle, TreeError};
pub use xml::XmlError;
pub use util::write_atomic;
