//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! fraction, so lexical order in SQL matches chronological order. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use chime_core::{
  message::{Communication, JournalEntry},
  phone::PhoneNumber,
  subscription::{Subscriber, Subscription},
  template::{NotificationKind, Template},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawTemplate::from_row`].
pub const TEMPLATE_COLUMNS: &str = "template_id, name, kind, body, created_at";

/// Raw strings read directly from a `templates` row.
pub struct RawTemplate {
  pub template_id: String,
  pub name:        String,
  pub kind:        String,
  pub body:        String,
  pub created_at:  String,
}

impl RawTemplate {
  /// Read five template columns starting at `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      template_id: row.get(offset)?,
      name:        row.get(offset + 1)?,
      kind:        row.get(offset + 2)?,
      body:        row.get(offset + 3)?,
      created_at:  row.get(offset + 4)?,
    })
  }

  pub fn into_template(self) -> Result<Template> {
    Ok(Template {
      template_id: decode_uuid(&self.template_id)?,
      kind:        NotificationKind::classify(&self.kind, &self.name),
      name:        self.name,
      body:        self.body,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawSubscription::from_row`]; expects `subscriptions
/// s JOIN templates t`.
pub const SUBSCRIPTION_COLUMNS: &str = "s.subscription_id, s.phone_number, \
   s.next_trigger_time, s.frequency, s.created_at, t.template_id, t.name, \
   t.kind, t.body, t.created_at";

/// A `subscriptions` row joined with its template.
pub struct RawSubscription {
  pub subscription_id:   String,
  pub phone_number:      String,
  pub next_trigger_time: String,
  pub frequency:         Option<String>,
  pub created_at:        String,
  pub template:          RawTemplate,
}

impl RawSubscription {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subscription_id:   row.get(0)?,
      phone_number:      row.get(1)?,
      next_trigger_time: row.get(2)?,
      frequency:         row.get(3)?,
      created_at:        row.get(4)?,
      template:          RawTemplate::from_row(row, 5)?,
    })
  }

  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      subscription_id:   decode_uuid(&self.subscription_id)?,
      phone_number:      PhoneNumber::canonical(&self.phone_number),
      template:          self.template.into_template()?,
      next_trigger_time: decode_dt(&self.next_trigger_time)?,
      frequency:         self.frequency,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub const SUBSCRIBER_COLUMNS: &str = "phone_number, name, verified, created_at";

pub struct RawSubscriber {
  pub phone_number: String,
  pub name:         String,
  pub verified:     bool,
  pub created_at:   String,
}

impl RawSubscriber {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      phone_number: row.get(0)?,
      name:         row.get(1)?,
      verified:     row.get(2)?,
      created_at:   row.get(3)?,
    })
  }

  pub fn into_subscriber(self) -> Result<Subscriber> {
    Ok(Subscriber {
      phone_number: PhoneNumber::canonical(&self.phone_number),
      name:         self.name,
      verified:     self.verified,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const COMMUNICATION_COLUMNS: &str =
  "comms_id, template_id, from_phone, to_phone, body, created_at";

pub struct RawCommunication {
  pub comms_id:    String,
  pub template_id: Option<String>,
  pub from:        String,
  pub to:          String,
  pub body:        String,
  pub created_at:  String,
}

impl RawCommunication {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comms_id:    row.get(0)?,
      template_id: row.get(1)?,
      from:        row.get(2)?,
      to:          row.get(3)?,
      body:        row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_communication(self) -> Result<Communication> {
    Ok(Communication {
      comms_id:    decode_uuid(&self.comms_id)?,
      template_id: self.template_id.as_deref().map(decode_uuid).transpose()?,
      from:        PhoneNumber::canonical(&self.from),
      to:          PhoneNumber::canonical(&self.to),
      body:        self.body,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const JOURNAL_COLUMNS: &str =
  "journal_id, comms_id, phone_number, prompt, entry, created_at";

pub struct RawJournalEntry {
  pub journal_id:   String,
  pub comms_id:     Option<String>,
  pub phone_number: String,
  pub prompt:       String,
  pub entry:        String,
  pub created_at:   String,
}

impl RawJournalEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      journal_id:   row.get(0)?,
      comms_id:     row.get(1)?,
      phone_number: row.get(2)?,
      prompt:       row.get(3)?,
      entry:        row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<JournalEntry> {
    Ok(JournalEntry {
      journal_id:   decode_uuid(&self.journal_id)?,
      comms_id:     self.comms_id.as_deref().map(decode_uuid).transpose()?,
      phone_number: PhoneNumber::canonical(&self.phone_number),
      prompt:       self.prompt,
      entry:        self.entry,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}
