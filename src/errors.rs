use crate::models::UserType;

/// Failure taxonomy for the store layer. Validation and permission variants
/// are ordinary outcomes the presentation layer turns into user-facing
/// messages; only `Db`/`Json` indicate something actually broke.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email '{0}' is already registered")]
    EmailTaken(String),

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("only {required}s can do that")]
    WrongUserType { required: UserType },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("a list named '{0}' already exists")]
    DuplicateName(String),

    #[error("storage error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Validation/permission conditions the CLI reports without a nonzero
    /// exit, as opposed to genuine storage failures.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            StoreError::Db(_) | StoreError::Json(_) | StoreError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
