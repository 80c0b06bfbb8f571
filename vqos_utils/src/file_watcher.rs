use notify::{Config, RecursiveMode, Watcher};
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{error, info};

const SLEEP_UNTIL_EXISTS_SECONDS: u64 = 10;
const SLEEP_AFTER_CREATION_SECONDS: u64 = 3;
const SLEEP_AFTER_CHANGE_SECONDS: u64 = 3;
const SLEEP_DEBOUNCE_DURATION: u64 = 1;

/// Watches a single file for changes. On Linux this uses `inotify`;
/// other platforms use whatever `notify` selects.
///
/// Create with `new()`, attach the callbacks you care about, then call
/// `watch()` from a dedicated thread - it blocks until the watched file
/// changes (at which point the change callback runs and `watch` returns
/// so the caller can restart it) or an error occurs.
pub struct FileWatcher {
    nice_name: String,
    path: PathBuf,
    file_created_callback: Option<Box<dyn FnMut() + Send>>,
    file_exists_callback: Option<Box<dyn FnMut() + Send>>,
    file_changed_callback: Option<Box<dyn FnMut() + Send>>,
}

impl FileWatcher {
    /// Creates a new `FileWatcher`.
    ///
    /// ## Arguments
    ///
    /// * `nice_name` - the print-friendly (short) name of the file to watch.
    /// * `path` - the file to watch.
    pub fn new<S: ToString>(nice_name: S, path: PathBuf) -> Self {
        Self {
            nice_name: nice_name.to_string(),
            path,
            file_created_callback: None,
            file_exists_callback: None,
            file_changed_callback: None,
        }
    }

    /// Callback to run if the file did not exist initially and has been
    /// created since watching started.
    pub fn set_file_created_callback<F: FnMut() + Send + 'static>(&mut self, callback: F) {
        self.file_created_callback = Some(Box::new(callback));
    }

    /// Callback to run if the file already exists when watching starts.
    pub fn set_file_exists_callback<F: FnMut() + Send + 'static>(&mut self, callback: F) {
        self.file_exists_callback = Some(Box::new(callback));
    }

    /// Callback to run whenever the file changes.
    pub fn set_file_changed_callback<F: FnMut() + Send + 'static>(&mut self, callback: F) {
        self.file_changed_callback = Some(Box::new(callback));
    }

    /// Start watching the file. Blocks the calling thread. Returns after
    /// the change callback has fired (so the caller can re-arm the watch)
    /// or when the watcher cannot be created.
    pub fn watch(&mut self) -> Result<(), WatchedFileError> {
        // Handle the case in which the file does not yet exist
        if !self.path.exists() {
            info!(
                "{} does not exist yet. Waiting for it to appear.",
                self.nice_name
            );
            loop {
                std::thread::sleep(Duration::from_secs(SLEEP_UNTIL_EXISTS_SECONDS));
                if self.path.exists() {
                    info!("{} has been created. Waiting a moment.", self.nice_name);
                    std::thread::sleep(Duration::from_secs(SLEEP_AFTER_CREATION_SECONDS));
                    if let Some(callback) = &mut self.file_created_callback {
                        callback();
                    }
                    break;
                }
            }
        } else if let Some(callback) = &mut self.file_exists_callback {
            callback();
        }

        // Build the watcher
        let (tx, rx) = std::sync::mpsc::channel();
        let watcher = notify::RecommendedWatcher::new(tx, Config::default());
        let Ok(mut watcher) = watcher else {
            error!("Unable to create watcher for {}", self.nice_name);
            return Err(WatchedFileError::CreateWatcherError);
        };

        if let Err(e) = watcher.watch(&self.path, RecursiveMode::NonRecursive) {
            error!("Unable to start watcher for {}: {e:?}", self.nice_name);
            return Err(WatchedFileError::StartWatcherError);
        }

        let mut last_event: Option<Instant> = None;
        loop {
            let ret = rx.recv();
            if ret.is_err() {
                error!("Error from monitor thread, watching {}", self.nice_name);
                error!("{:?}", ret);
            }

            // A change event has arrived. Debounce duplicates that fire
            // in quick succession for a single logical edit.
            let debounced = matches!(
                last_event,
                Some(seen) if seen.elapsed().as_secs() < SLEEP_DEBOUNCE_DURATION
            );

            if !debounced {
                std::thread::sleep(Duration::from_secs(SLEEP_AFTER_CHANGE_SECONDS));
                last_event = Some(Instant::now());
                info!("{} changed", self.nice_name);
                if let Some(callback) = &mut self.file_changed_callback {
                    callback();
                    return Ok(()); // Bail out to restart
                }
            }
        }
    }
}

/// Errors that can occur when watching a file.
#[derive(Error, Debug)]
pub enum WatchedFileError {
    /// Unable to create the file watcher.
    #[error("Unable to create watcher")]
    CreateWatcherError,

    /// Unable to start the file watcher system.
    #[error("Unable to start watcher")]
    StartWatcherError,
}
