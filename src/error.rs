//! Error types for job supervision
//!
//! Only pre-spawn failures surface to callers as errors. Once a worker has
//! been spawned, every abnormal condition (timeout, signal death, failed kill
//! attempt) is absorbed into the job's [`ExitOutcome`](crate::supervisor::ExitOutcome)
//! and logged, so cleanup and completion notification always run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpawnerError {
    /// Malformed zoom range or an empty required job field. Rejected before
    /// any process is created.
    #[error("invalid job configuration: {0}")]
    Configuration(String),

    /// The worker executable (or its interpreter) does not exist on PATH.
    #[error("worker command not found: {0}")]
    WorkerNotFound(String),

    /// The worker executable exists but could not be started.
    #[error("failed to spawn worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnerError {
    /// Map a spawn-time IO error, distinguishing missing executables the way
    /// callers want to report them.
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            SpawnerError::WorkerNotFound(program.to_string())
        } else {
            SpawnerError::Spawn {
                program: program.to_string(),
                source: err,
            }
        }
    }
}
