use std::time::Duration;

use thiserror::Error;

/// Errors raised while producing or reading a dump.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The dump tool could not be started.
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The dump tool refused to talk to a newer (or older) server.
    #[error(
        "dump tool is incompatible with the server version.\n\
         dump tool version: {tool_version}\n\
         Upgrade the dump tool or use the version matching the server.\n\
         Server details: {detail}"
    )]
    VersionMismatch { tool_version: String, detail: String },

    /// The dump tool exited unsuccessfully.
    #[error("dump failed ({status}):\n{stderr}")]
    Failed { status: String, stderr: String },

    /// The dump tool ran longer than the configured limit and was killed.
    #[error("dump timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("dump i/o error: {0}")]
    Io(#[from] std::io::Error),
}
