pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing object: {0}")]
    MissingObject(String),

    #[error("Ambiguous reference {name}: candidates are {}", .candidates.join(", "))]
    AmbiguousRef {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git2 error: {0}")]
    Git2(git2::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Coarse classification callers match on instead of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingObject,
    AmbiguousRef,
    InvalidArgument,
    IoFailure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingObject(_) => ErrorKind::MissingObject,
            Error::AmbiguousRef { .. } => ErrorKind::AmbiguousRef,
            Error::InvalidArgument(_) | Error::Config(_) => ErrorKind::InvalidArgument,
            Error::Io(_) | Error::Git2(_) => ErrorKind::IoFailure,
        }
    }

    pub fn invalid_argument(description: impl Into<String>) -> Self {
        Self::InvalidArgument(description.into())
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => Error::MissingObject(err.message().to_string()),
            git2::ErrorCode::Ambiguous => Error::AmbiguousRef {
                name: err.message().to_string(),
                candidates: Vec::new(),
            },
            _ => Error::Git2(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_missing_object() {
        let err: Error = git2::Error::new(
            git2::ErrorCode::NotFound,
            git2::ErrorClass::Odb,
            "object not found",
        )
        .into();
        assert_eq!(err.kind(), ErrorKind::MissingObject);
    }

    #[test]
    fn ambiguous_maps_to_ambiguous_ref() {
        let err: Error = git2::Error::new(
            git2::ErrorCode::Ambiguous,
            git2::ErrorClass::Odb,
            "ambiguous short id",
        )
        .into();
        assert_eq!(err.kind(), ErrorKind::AmbiguousRef);
    }

    #[test]
    fn other_git_errors_are_io_failures() {
        let err: Error = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Os,
            "disk on fire",
        )
        .into();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(err.to_string().contains("disk on fire"));
    }
}
