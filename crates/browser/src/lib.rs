//! Interactive solution browser built on top of `solutree_model`.
//! 建構於 `solutree_model` 之上的互動式解決方案瀏覽器。

pub mod background;
pub mod browser;
pub mod convert;
pub mod demo;

pub use background::{spawn_load, spawn_save, BackgroundError, BackgroundTask};
pub use browser::{BrowserError, Notification, SolutionBrowser, UiState, DEFAULT_SOLUTION_NAME};
pub use convert::{rebuild_level_order, to_browser, to_model, ConvertError};
pub use demo::populate_demo;
