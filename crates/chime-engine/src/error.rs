//! Error type for `chime-engine`.

use chime_core::phone::PhoneNumber;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Opaque error from the store backend.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Core(#[from] chime_core::Error),

  #[error("no subscriber for {0}")]
  RecipientNotFound(PhoneNumber),

  #[error("nothing has been sent to {0}")]
  NothingToAnswer(PhoneNumber),

  #[error("malformed inbound message: {0}")]
  MalformedInbound(&'static str),

  #[error("subscriber already exists: {0}")]
  SubscriberExists(PhoneNumber),

  #[error("no template registered for {0}")]
  MissingTemplate(String),
}

impl Error {
  pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }

  /// The domain error behind this one, looking through store wrappers.
  ///
  /// Failures raised inside a delivery come back from the store wrapped in
  /// its own error type; this walks the source chain to find them.
  pub fn core(&self) -> Option<&chime_core::Error> {
    match self {
      Self::Core(err) => Some(err),
      Self::Store(err) => {
        let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(err.as_ref());
        while let Some(err) = cause {
          if let Some(core) = err.downcast_ref::<chime_core::Error>() {
            return Some(core);
          }
          cause = err.source();
        }
        None
      }
      _ => None,
    }
  }

  /// Lift a duplicate-subscriber failure reported by the store to
  /// [`Error::SubscriberExists`].
  pub(crate) fn into_conflict(self) -> Self {
    if let Some(chime_core::Error::SubscriberExists(phone)) = self.core() {
      return Self::SubscriberExists(phone.clone());
    }
    self
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
