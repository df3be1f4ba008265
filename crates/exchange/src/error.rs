//! Exchange error model.
//!
//! Only failures that abort a whole import or export live here. Problems with
//! a single row are values inside [`crate::ImportReport`].

use std::path::PathBuf;

use shopledger_store::StoreError;
use thiserror::Error;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Required sheets are absent; nothing was written.
    #[error("workbook is missing required sheet(s): {}", missing.join(", "))]
    Structural { missing: Vec<String> },

    /// A required sheet lacks its key column; nothing was written.
    #[error("workbook is missing required column(s): {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// The source could not be opened as a workbook.
    #[error("unreadable workbook at {}: {reason}", path.display())]
    Source { path: PathBuf, reason: String },

    #[error("csv error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExchangeError {
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. } | Self::MissingColumns { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
