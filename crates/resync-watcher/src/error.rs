use std::path::PathBuf;
use thiserror::Error;

/// Failures attaching to or reading from the watch facility.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Could not attach a watcher to the root. Fatal at startup.
    #[error("failed to watch '{root}': {source}")]
    Setup {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The watch thread could not be started.
    #[error("failed to start watch thread: {0}")]
    Spawn(#[source] std::io::Error),
}
