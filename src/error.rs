use thiserror::Error;

#[derive(Error, Debug)]
pub enum SparkError {
    #[error("[{0}] is not a valid version")]
    InvalidVersion(String),

    #[error("unable to find a version matching [{0}]")]
    NoMatch(String),

    #[error("version catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("an abnormal operation result was detected, the operation may have been cancelled: {0}")]
    OperationCancelled(String),

    #[error("[{0}] is not installed")]
    NotInstalled(String),

    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("module [{0}] is illegal")]
    UnknownModule(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SparkError {
    /// Permission failures are the only errors worth an elevated retry.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SparkError::Io(err) if err.kind() == std::io::ErrorKind::PermissionDenied)
    }
}

/// Walks an `anyhow` chain looking for a permission failure at any depth.
pub fn is_permission_denied(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(spark) = cause.downcast_ref::<SparkError>() {
            return spark.is_permission_denied();
        }
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::PermissionDenied)
    })
}
