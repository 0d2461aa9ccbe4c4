use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitbotError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
