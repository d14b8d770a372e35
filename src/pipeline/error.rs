use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Android SDK not found; set ANDROID_SDK_ROOT or ANDROID_HOME")]
    SdkNotFound,

    #[error("required toolchain binary '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("command '{argv}' exited with status {status}: {stderr}")]
    CommandFailed {
        argv: String,
        status: i32,
        stderr: String,
    },

    #[error("command '{0}' timed out")]
    CommandTimedOut(String),

    #[error("no project root found in extracted archive (missing package.json or index.html)")]
    ProjectRootNotFound,

    #[error("expected build output directory '{0}' not found after project build")]
    OutputDirMissing(String),

    #[error("artifact size mismatch: expected {expected}, got {actual}")]
    ArtifactSizeMismatch { expected: u64, actual: u64 },

    #[error("offlineify: no <script type=\"text/babel\"> block found")]
    NoBabelScript,

    #[error("offlineify: failed to fetch vendor file '{0}': {1}")]
    VendorFetchFailed(String, String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
