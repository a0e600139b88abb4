//! Error type for `chime-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] chime_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A subscription referenced a template that does not exist.
  #[error("template not found: {0}")]
  TemplateNotFound(uuid::Uuid),
}

/// Errors raised inside a `Connection::call` closure travel back boxed in
/// [`tokio_rusqlite::Error::Other`]; unwrap them so callers see the original
/// variant instead of an opaque database error.
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(inner) => {
        match inner.downcast::<chime_core::Error>() {
          Ok(core) => Self::Core(*core),
          Err(inner) => match inner.downcast::<Error>() {
            Ok(own) => *own,
            Err(inner) => Self::Database(tokio_rusqlite::Error::Other(inner)),
          },
        }
      }
      other => Self::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Box an error for transport out of a `Connection::call` closure.
pub(crate) fn boxed<E>(err: E) -> tokio_rusqlite::Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  tokio_rusqlite::Error::Other(Box::new(err))
}
