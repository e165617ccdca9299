use std::fmt;

/// The fixed set of storage error kinds.
///
/// Backends translate their native failures into one of these at their
/// boundary, so callers never see backend-specific error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested bucket has not been created
    BucketNotFound,
    /// The requested key is not in the specified bucket (or is unreadable)
    ReadFailed,
    /// The underlying engine failed to write
    WriteFailed,
    /// Closing the underlying engine is not possible
    CloseFailed,
    /// Opening the underlying engine is not possible
    InitFailed,
}

impl ErrorKind {
    fn message(&self) -> &'static str {
        match self {
            ErrorKind::BucketNotFound => "bucket not found",
            ErrorKind::ReadFailed => "key not found",
            ErrorKind::WriteFailed => "write failed",
            ErrorKind::CloseFailed => "close failed",
            ErrorKind::InitFailed => "init failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A storage error: one of the fixed [`ErrorKind`]s plus zero or more
/// wrapped underlying causes.
#[derive(Debug, thiserror::Error)]
#[error("{}{}", .kind, fmt_causes(.causes))]
pub struct StoreError {
    kind: ErrorKind,
    causes: Vec<anyhow::Error>,
}

fn fmt_causes(causes: &[anyhow::Error]) -> String {
    if causes.is_empty() {
        return String::new();
    }
    let list = causes
        .iter()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!(": {list}")
}

impl StoreError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            causes: Vec::new(),
        }
    }

    pub fn with(kind: ErrorKind, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            kind,
            causes: vec![cause.into()],
        }
    }

    pub fn with_all(kind: ErrorKind, causes: Vec<anyhow::Error>) -> Self {
        Self { kind, causes }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn causes(&self) -> &[anyhow::Error] {
        &self.causes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_without_causes() {
        let err = StoreError::new(ErrorKind::BucketNotFound);
        assert_eq!(err.to_string(), "bucket not found");
    }

    #[test]
    fn test_display_with_causes() {
        let err = StoreError::with_all(
            ErrorKind::WriteFailed,
            vec![anyhow::anyhow!("first level fail"), anyhow::anyhow!("disk full")],
        );
        assert_eq!(err.to_string(), "write failed: first level fail; disk full");
    }

    #[test]
    fn test_kind_is_preserved() {
        let err = StoreError::with(ErrorKind::ReadFailed, anyhow::anyhow!("boom"));
        assert_eq!(err.kind(), ErrorKind::ReadFailed);
        assert_eq!(err.causes().len(), 1);
    }
}
