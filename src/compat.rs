use std::error::Error;

use crate::model;
use axum::{
    extract::{rejection::QueryRejection, FromRequestParts},
    http::StatusCode,
    response::IntoResponse,
};

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(model::ApiError))]
pub struct MyQuery<T>(pub T);

/// An error followed by each of its sources, separated by `: `.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut next = err.source();
    while let Some(source) = next {
        message.push_str(": ");
        message.push_str(&source.to_string());
        next = source.source();
    }
    message
}

impl From<QueryRejection> for model::ApiError {
    fn from(rejection: QueryRejection) -> Self {
        model::ApiError::InvalidQuery(error_chain(&rejection))
    }
}

impl IntoResponse for model::ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            model::ApiError::NotFound(what) => {
                tracing::debug!(%what, "not found");
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }

            model::ApiError::InvalidQuery(err) => (StatusCode::UNPROCESSABLE_ENTITY, err),

            err @ (model::ApiError::Tree(_)
            | model::ApiError::Template(_)
            | model::ApiError::Sqlx(_)
            | model::ApiError::Database(_)) => {
                tracing::error!(error = %error_chain(&err), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response = model::ApiError::not_found("/nowhere/").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_query_maps_to_422() {
        let response = model::ApiError::InvalidQuery("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn error_chain_lists_sources() {
        let err = model::ApiError::Tree(crate::tree::TreeError::InvalidPath("0x".to_string()));
        assert_eq!(
            error_chain(&err),
            "page tree: invalid tree path \"0x\""
        );
    }

    #[test]
    fn database_errors_map_to_500() {
        let response = model::ApiError::Database("broken".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
