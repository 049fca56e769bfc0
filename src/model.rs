pub mod database;
pub mod network;

use crate::tree::TreeError;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// No page, sub-route or archive matches the request. Malformed archive
    /// dates end up here too.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("page tree")]
    Tree(#[from] TreeError),

    #[error("template")]
    Template(#[from] tera::Error),

    #[error("sqlx")]
    Sqlx(#[from] sqlx::Error),

    #[error("database: {0}")]
    Database(String),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
