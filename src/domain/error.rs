use thiserror::Error;

/// Field-level constraint violation detected before any storage write.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("blank title")]
    BlankTitle,
}
