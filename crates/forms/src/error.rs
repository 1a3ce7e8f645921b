use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("failed to open PDF {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("failed to save PDF {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("malformed PDF structure: {0}")]
    Malformed(String),

    #[error("widget {0:?} is not an indirect object")]
    InlineWidget(String),
}
