use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::StorageOptions;
use crate::sqlite::{SolutionDb, StoreError};
use crate::solution::SolutionModel;
use crate::tree::{ItemTree, NodeHandle};
use crate::xml::{self, XmlError};

/// Extension of solutions stored as nested XML.
pub const XML_EXTENSION: &str = "solxml";
/// Extension of solutions stored as SQLite tables.
pub const SQLITE_EXTENSION: &str = "solsqlite";
/// Filter specification handed to file choosers.
pub const SOLUTION_FILE_FILTER: &str =
    "SQLite solution (*.solsqlite)|*.solsqlite|XML solution (*.solxml)|*.solxml|All Files (*.*)|*.*";

/// On-disk representation of a solution.
/// 解決方案的儲存格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionFormat {
    Xml,
    Sqlite,
}

impl SolutionFormat {
    /// Picks the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case(XML_EXTENSION) || extension.eq_ignore_ascii_case("xml") {
            Some(SolutionFormat::Xml)
        } else if extension.eq_ignore_ascii_case(SQLITE_EXTENSION)
            || extension.eq_ignore_ascii_case("sqlite")
            || extension.eq_ignore_ascii_case("db")
        {
            Some(SolutionFormat::Sqlite)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SolutionFormat::Xml => XML_EXTENSION,
            SolutionFormat::Sqlite => SQLITE_EXTENSION,
        }
    }
}

#[derive(Debug, Error)]
pub enum SolutionFileError {
    #[error("cannot tell the solution format of '{0}' (expected .solxml or .solsqlite)")]
    UnknownFormat(PathBuf),
    #[error("solution file '{0}' does not exist")]
    NotFound(PathBuf),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("solution file IO error: {0}")]
    Io(#[from] io::Error),
}

fn detect(path: &Path) -> Result<SolutionFormat, SolutionFileError> {
    SolutionFormat::from_path(path).ok_or_else(|| SolutionFileError::UnknownFormat(path.to_path_buf()))
}

/// Saves `model` to `path`, choosing the format from the extension.
/// 依副檔名選擇格式並儲存解決方案。
pub fn save_solution(
    path: &Path,
    model: &mut SolutionModel,
    options: &StorageOptions,
) -> Result<(), SolutionFileError> {
    match detect(path)? {
        SolutionFormat::Xml => xml::write_file(path, model)?,
        SolutionFormat::Sqlite => {
            let mut db = SolutionDb::open(path, options)?;
            db.save(model)?;
        }
    }
    info!(path = %path.display(), items = model.tree().len(), "saved solution");
    Ok(())
}

/// Loads a solution from `path`, choosing the format from the extension.
/// 依副檔名選擇格式並載入解決方案。
pub fn load_solution(path: &Path, options: &StorageOptions) -> Result<SolutionModel, SolutionFileError> {
    let format = detect(path)?;
    if !path.exists() {
        return Err(SolutionFileError::NotFound(path.to_path_buf()));
    }
    let result = match format {
        SolutionFormat::Xml => xml::read_file(path).map_err(SolutionFileError::from),
        SolutionFormat::Sqlite => SolutionDb::open(path, options)
            .and_then(|mut db| db.load())
            .map_err(SolutionFileError::from),
    };
    match &result {
        Ok(model) => info!(path = %path.display(), items = model.tree().len(), "loaded solution"),
        Err(err) => warn!(path = %path.display(), error = %err, "solution load aborted"),
    }
    result
}

/// Asks the user for file locations. Returning `None` means cancelled.
/// 向使用者詢問檔案位置；回傳 `None` 代表取消。
pub trait PathChooser {
    fn choose_save_path(&mut self, default_path: Option<&Path>, filter: &str) -> Option<PathBuf>;
    fn choose_open_path(&mut self, filter: &str) -> Option<PathBuf>;
}

/// Saves through a [`PathChooser`]; `Ok(None)` when the user cancels.
pub fn save_with(
    chooser: &mut dyn PathChooser,
    default_path: Option<&Path>,
    model: &mut SolutionModel,
    options: &StorageOptions,
) -> Result<Option<PathBuf>, SolutionFileError> {
    let Some(path) = chooser.choose_save_path(default_path, SOLUTION_FILE_FILTER) else {
        return Ok(None);
    };
    save_solution(&path, model, options)?;
    Ok(Some(path))
}

/// Loads through a [`PathChooser`]; `Ok(None)` when the user cancels.
pub fn load_with(
    chooser: &mut dyn PathChooser,
    options: &StorageOptions,
) -> Result<Option<(PathBuf, SolutionModel)>, SolutionFileError> {
    let Some(path) = chooser.choose_open_path(SOLUTION_FILE_FILTER) else {
        return Ok(None);
    };
    let model = load_solution(&path, options)?;
    Ok(Some((path, model)))
}

/// Produces the text shown for an item.
pub trait LabelRenderer {
    fn label(&self, tree: &ItemTree, handle: NodeHandle) -> String;
}

/// Renders the display name, followed by the type in brackets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainLabels;

impl LabelRenderer for PlainLabels {
    fn label(&self, tree: &ItemTree, handle: NodeHandle) -> String {
        match tree.get(handle) {
            Some(node) => format!("{} [{}]", node.name(), node.item_type()),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemType;
    use tempfile::tempdir;

    struct FixedChooser(Option<PathBuf>);

    impl PathChooser for FixedChooser {
        fn choose_save_path(&mut self, _default_path: Option<&Path>, filter: &str) -> Option<PathBuf> {
            assert!(filter.contains("*.solxml"));
            self.0.clone()
        }

        fn choose_open_path(&mut self, _filter: &str) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    fn sample() -> SolutionModel {
        let mut model = SolutionModel::new("S").unwrap();
        let folder = model.add_root_child("F", ItemType::Folder).unwrap();
        model.add_child("a.txt", ItemType::File, folder).unwrap();
        model
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(SolutionFormat::from_path(Path::new("a.solxml")), Some(SolutionFormat::Xml));
        assert_eq!(SolutionFormat::from_path(Path::new("a.SOLSQLITE")), Some(SolutionFormat::Sqlite));
        assert_eq!(SolutionFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(SolutionFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn both_formats_round_trip() {
        let dir = tempdir().unwrap();
        for name in ["tree.solxml", "tree.solsqlite"] {
            let path = dir.path().join(name);
            save_solution(&path, &mut sample(), &StorageOptions::default()).unwrap();
            let loaded = load_solution(&path, &StorageOptions::default()).unwrap();
            let file = loaded.tree().resolve_path("/S/F/a.txt").unwrap();
            assert_eq!(loaded.tree().get(file).unwrap().item_type(), ItemType::File);
        }
    }

    #[test]
    fn unknown_extension_and_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            save_solution(&dir.path().join("x.txt"), &mut sample(), &StorageOptions::default()),
            Err(SolutionFileError::UnknownFormat(_))
        ));
        assert!(matches!(
            load_solution(&dir.path().join("absent.solsqlite"), &StorageOptions::default()),
            Err(SolutionFileError::NotFound(_))
        ));
    }

    #[test]
    fn chooser_cancel_is_not_an_error() {
        let mut cancelled = FixedChooser(None);
        let saved = save_with(&mut cancelled, None, &mut sample(), &StorageOptions::default()).unwrap();
        assert!(saved.is_none());
        assert!(load_with(&mut cancelled, &StorageOptions::default()).unwrap().is_none());
    }

    #[test]
    fn chooser_path_is_used() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chosen.solxml");
        let mut chooser = FixedChooser(Some(path.clone()));
        let saved = save_with(&mut chooser, None, &mut sample(), &StorageOptions::default()).unwrap();
        assert_eq!(saved.as_deref(), Some(path.as_path()));
        let (loaded_path, model) = load_with(&mut chooser, &StorageOptions::default()).unwrap().unwrap();
        assert_eq!(loaded_path, path);
        assert_eq!(model.tree().len(), 3);
    }

    #[test]
    fn plain_labels_show_type() {
        let model = sample();
        let tree = model.tree();
        let folder = tree.resolve_path("/S/F").unwrap();
        assert_eq!(PlainLabels.label(tree, folder), "F [Folder]");
    }
}
