//! Communications (the append-only message log) and journal entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::phone::PhoneNumber;

/// One sent or received message. Never updated or deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Communication {
  pub comms_id:    Uuid,
  /// Template that produced the message; `None` for inbound messages.
  pub template_id: Option<Uuid>,
  pub from:        PhoneNumber,
  pub to:          PhoneNumber,
  pub body:        String,
  /// Store-assigned.
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::NotificationStore::record_communication`].
#[derive(Debug, Clone)]
pub struct NewCommunication {
  pub template_id: Option<Uuid>,
  pub from:        PhoneNumber,
  pub to:          PhoneNumber,
  pub body:        String,
}

/// A reply paired with the message it answers.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
  pub journal_id:   Uuid,
  /// The inbound communication that carried the reply, when it was logged.
  pub comms_id:     Option<Uuid>,
  pub phone_number: PhoneNumber,
  pub prompt:       String,
  pub entry:        String,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJournalEntry {
  pub comms_id:     Option<Uuid>,
  pub phone_number: PhoneNumber,
  pub prompt:       String,
  pub entry:        String,
}
