use std::{io, path::PathBuf};

use thiserror::Error;

/// Everything the engine reports back to the user.
///
/// None of these end the session; the dispatcher prints them as a single
/// line on the output sink and carries on.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("{verb}: {job}: no such job")]
    NoSuchJob { verb: &'static str, job: String },

    #[error("syntax error: empty pipeline stage")]
    EmptyStage,

    #[error("syntax error: missing redirection target")]
    MissingTarget,

    #[error("syntax error: missing command before redirection")]
    MissingCommand,

    #[error("syntax error: missing command before '&'")]
    MissingBackgroundCommand,

    #[error("{0}: permission denied")]
    PermissionDenied(String),

    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program}: exited with status {code}")]
    ExitStatus { program: String, code: i32 },

    #[error("{program}: terminated by signal")]
    Killed { program: String },

    #[error("{}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid PID: {0}")]
    InvalidPid(String),

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: i32, reason: String },

    #[error("{0} not supported on this platform")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Classifies a failed spawn the way users expect to read it.
    pub fn spawn(program: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => ShellError::CommandNotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => ShellError::PermissionDenied(program.to_string()),
            _ => ShellError::Spawn {
                program: program.to_string(),
                source,
            },
        }
    }

    pub fn path(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ShellError::Path {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_spawn_reads_as_command_not_found() {
        let err = ShellError::spawn("nope", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.to_string(), "nope: command not found");
    }

    #[test]
    fn permission_spawn_reads_as_permission_denied() {
        let err = ShellError::spawn("x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), "x: permission denied");
    }
}
