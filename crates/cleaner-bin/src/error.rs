//! The CLI-layer error taxonomy (spec §7's `(kind, message)` contract,
//! narrowed to the three non-zero exit codes spec §6.1 defines).

use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Bad option syntax, unknown option, missing value — exit code 1. The
    /// active subcommand's dense help is printed alongside this.
    Parse(String),
    /// A runtime failure unrelated to I/O — exit code 2.
    Runtime(anyhow::Error),
    /// A filesystem failure — exit code 3.
    Io(anyhow::Error),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Parse(_) => 1,
            AppError::Runtime(_) => 2,
            AppError::Io(_) => 3,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Parse(msg) => write!(f, "{msg}"),
            AppError::Runtime(err) => write!(f, "{err}"),
            AppError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl From<core_cli::Error> for AppError {
    fn from(err: core_cli::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<core_harvest::Error> for AppError {
    fn from(err: core_harvest::Error) -> Self {
        match err {
            core_harvest::Error::Io { .. } => AppError::Io(anyhow::Error::new(err)),
            core_harvest::Error::Cancelled => AppError::Runtime(anyhow::Error::new(err)),
        }
    }
}

impl From<core_search::Error> for AppError {
    fn from(err: core_search::Error) -> Self {
        match err {
            core_search::Error::Io { .. } => AppError::Io(anyhow::Error::new(err)),
            core_search::Error::Regex(_) => AppError::Runtime(anyhow::Error::new(err)),
            core_search::Error::Syntax(_) => AppError::Runtime(anyhow::Error::new(err)),
            core_search::Error::Cancelled => AppError::Runtime(anyhow::Error::new(err)),
        }
    }
}

impl From<core_repo::Error> for AppError {
    fn from(err: core_repo::Error) -> Self {
        AppError::Io(anyhow::Error::new(err))
    }
}

impl From<core_config::Error> for AppError {
    fn from(err: core_config::Error) -> Self {
        AppError::Io(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_spec_taxonomy() {
        assert_eq!(AppError::Parse("bad option".into()).exit_code(), 1);
        assert_eq!(AppError::Runtime(anyhow::anyhow!("boom")).exit_code(), 2);
        assert_eq!(AppError::Io(anyhow::anyhow!("disk full")).exit_code(), 3);
    }

    #[test]
    fn io_error_maps_to_exit_code_three() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let app_err: AppError = io_err.into();
        assert_eq!(app_err.exit_code(), 3);
    }
}
