use shared::error::OrderError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("order index is inconsistent: {0}")]
    Order(#[from] OrderError),
}

impl BoardError {
    pub fn is_corruption(&self) -> bool {
        match self {
            BoardError::Order(error) => error.is_corruption(),
        }
    }
}
