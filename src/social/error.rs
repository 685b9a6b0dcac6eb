// Domain outcomes that end a request early. The web layer maps each variant
// to an HTTP status; anything unexpected rides along as `Internal`.

use thiserror::Error;

use super::validation::FieldError;

#[derive(Debug, Error)]
pub enum SocialError {
    /// `"User"` or `"Post"`
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("invalid input")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<crate::media::MediaRejection> for SocialError {
    fn from(rejection: crate::media::MediaRejection) -> Self {
        SocialError::BadRequest(rejection.to_string())
    }
}
