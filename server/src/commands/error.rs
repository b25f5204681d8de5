use hyper::StatusCode;
use thiserror::Error;

/// A rejected or failed command. The display text is what the caller sees.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(
        "Invalid image URL. Please provide an HTTPS URL ending with .jpg, .jpeg, .png or .gif."
    )]
    InvalidImageUrl,

    #[error("A character named '{0}' already exists!")]
    DuplicateName(String),

    #[error("Invalid character name or password.")]
    InvalidCredentials,

    #[error("Character not found.")]
    NotFound,

    #[error("No changes were supplied.")]
    NothingToChange,

    #[error("Unknown autocomplete field '{0}'.")]
    UnknownField(String),

    #[error("An error occurred while processing your request.")]
    Database(#[from] sqlx::Error),

    #[error("An error occurred while processing your request.")]
    Task(#[from] tokio::task::JoinError),
}

impl CommandError {
    /// Machine-readable code for the JSON error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::InvalidImageUrl => "INVALID_IMAGE_URL",
            CommandError::DuplicateName(_) => "DUPLICATE_NAME",
            CommandError::InvalidCredentials => "INVALID_CREDENTIALS",
            CommandError::NotFound => "NOT_FOUND",
            CommandError::NothingToChange => "NOTHING_TO_CHANGE",
            CommandError::UnknownField(_) => "UNKNOWN_FIELD",
            CommandError::Database(_) | CommandError::Task(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CommandError::InvalidImageUrl | CommandError::NothingToChange => {
                StatusCode::BAD_REQUEST
            }
            CommandError::DuplicateName(_) => StatusCode::CONFLICT,
            CommandError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            CommandError::NotFound | CommandError::UnknownField(_) => StatusCode::NOT_FOUND,
            CommandError::Database(_) | CommandError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
