use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid id `{0}`: expected `class_name.unique_id`")]
    InvalidIdFormat(String),

    #[error("invalid id part `{0}`: must be non-empty, lowercase, with no spaces or dots")]
    InvalidIdPart(String),
}
