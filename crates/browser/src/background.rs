use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use solutree_model::{load_solution, save_solution, SolutionFileError, SolutionModel, StorageOptions};
use thiserror::Error;
use tracing::debug;

/// 背景工作可能回傳的錯誤。 / Errors reported by a background load or save.
#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error(transparent)]
    File(#[from] SolutionFileError),
    #[error("background worker stopped without reporting a result")]
    WorkerLost,
}

/// 在背景執行緒中進行的載入或儲存。 / A load or save running on a worker thread.
///
/// The worker owns its model until it reports back, so the caller cannot
/// touch the tree while the operation is in flight.
pub struct BackgroundTask<T> {
    rx: Receiver<Result<T, SolutionFileError>>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl<T: Send + 'static> BackgroundTask<T> {
    fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> Result<T, SolutionFileError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let _ = tx.send(job());
        });
        Self {
            rx,
            worker: Some(worker),
            finished: false,
        }
    }

    /// 嘗試取得結果（非阻塞）。 / Polls for the result without blocking.
    ///
    /// Yields the result exactly once; later calls return `None`.
    pub fn try_result(&mut self) -> Option<Result<T, BackgroundError>> {
        if self.finished {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(result) => result.map_err(BackgroundError::from),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(BackgroundError::WorkerLost),
        };
        self.finish();
        Some(outcome)
    }

    /// 阻塞直到工作完成。 / Blocks until the worker reports.
    pub fn wait(mut self) -> Result<T, BackgroundError> {
        if self.finished {
            return Err(BackgroundError::WorkerLost);
        }
        let outcome = self.rx.recv().map_err(|_| BackgroundError::WorkerLost)?;
        self.finish();
        outcome.map_err(BackgroundError::from)
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Loads `path` on a worker thread.
pub fn spawn_load(path: PathBuf, options: StorageOptions) -> BackgroundTask<SolutionModel> {
    debug!(path = %path.display(), "starting background load");
    BackgroundTask::spawn(move || load_solution(&path, &options))
}

/// Saves `model` to `path` on a worker thread and hands the model back.
/// 在背景儲存解決方案，完成後交還模型（其識別碼已重新編號）。
pub fn spawn_save(
    path: PathBuf,
    mut model: SolutionModel,
    options: StorageOptions,
) -> BackgroundTask<SolutionModel> {
    debug!(path = %path.display(), "starting background save");
    BackgroundTask::spawn(move || {
        save_solution(&path, &mut model, &options)?;
        Ok(model)
    })
}
