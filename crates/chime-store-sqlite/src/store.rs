//! [`SqliteStore`], the SQLite implementation of [`NotificationStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use chime_core::{
  clock::Clock,
  message::{Communication, JournalEntry, NewCommunication, NewJournalEntry},
  phone::PhoneNumber,
  store::{Delivery, NotificationStore, ScheduleChange},
  subscription::{NewSubscriber, NewSubscription, Subscriber, Subscription},
  template::{NewTemplate, NotificationKind, Template},
};

use crate::{
  Error, Result,
  encode::{
    COMMUNICATION_COLUMNS, JOURNAL_COLUMNS, RawCommunication, RawJournalEntry,
    RawSubscriber, RawSubscription, RawTemplate, SUBSCRIBER_COLUMNS,
    SUBSCRIPTION_COLUMNS, TEMPLATE_COLUMNS, decode_dt, encode_dt, encode_uuid,
  },
  error::boxed,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A chime notification store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// timestamp the store assigns comes from SQLite's own clock unless a
/// [`Clock`] override is installed with [`SqliteStore::with_clock`].
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Option<Arc<dyn Clock>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// Take "now" from `clock` instead of the database.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// The authoritative current time, read on the connection thread.
fn current_time(
  conn: &rusqlite::Connection,
  clock: Option<&dyn Clock>,
) -> tokio_rusqlite::Result<DateTime<Utc>> {
  if let Some(clock) = clock {
    return Ok(clock.now());
  }
  let raw: String = conn.query_row(
    "SELECT strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
    [],
    |r| r.get(0),
  )?;
  decode_dt(&raw).map_err(boxed)
}

fn insert_communication(
  conn: &rusqlite::Connection,
  comms_id: &str,
  input: &NewCommunication,
  created_at: &str,
) -> rusqlite::Result<usize> {
  conn.execute(
    "INSERT INTO communications (
       comms_id, template_id, from_phone, to_phone, body, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      comms_id,
      input.template_id.map(encode_uuid),
      input.from.as_str(),
      input.to.as_str(),
      input.body,
      created_at,
    ],
  )
}

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  type Error = Error;

  async fn now(&self) -> Result<DateTime<Utc>> {
    let clock = self.clock.clone();
    Ok(
      self
        .conn
        .call(move |conn| current_time(conn, clock.as_deref()))
        .await?,
    )
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  async fn add_template(&self, input: NewTemplate) -> Result<Template> {
    let template_id = Uuid::new_v4();

    let id_str   = encode_uuid(template_id);
    let name     = input.name.clone();
    let kind_str = input.kind.discriminant().to_owned();
    let body     = input.body.clone();
    let clock    = self.clock.clone();

    let created_at = self
      .conn
      .call(move |conn| {
        let now = current_time(conn, clock.as_deref())?;
        conn.execute(
          "INSERT INTO templates (template_id, name, kind, body, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, kind_str, body, encode_dt(now)],
        )?;
        Ok(now)
      })
      .await?;

    Ok(Template {
      template_id,
      name: input.name,
      kind: input.kind,
      body: input.body,
      created_at,
    })
  }

  async fn get_template(&self, id: Uuid) -> Result<Option<Template>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTemplate> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE template_id = ?1"),
            rusqlite::params![id_str],
            |row| RawTemplate::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTemplate::into_template).transpose()
  }

  async fn find_template(&self, kind: &NotificationKind) -> Result<Option<Template>> {
    let kind_str = kind.discriminant().to_owned();
    let name = kind.registration_name().map(str::to_owned);

    let raw: Option<RawTemplate> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {TEMPLATE_COLUMNS} FROM templates
               WHERE kind = ?1 AND (?2 IS NULL OR name = ?2)
               ORDER BY created_at ASC, rowid ASC
               LIMIT 1"
            ),
            rusqlite::params![kind_str, name],
            |row| RawTemplate::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTemplate::into_template).transpose()
  }

  async fn list_templates(&self) -> Result<Vec<Template>> {
    let raws: Vec<RawTemplate> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map([], |row| RawTemplate::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTemplate::into_template).collect()
  }

  // ── Subscribers ───────────────────────────────────────────────────────────

  async fn add_subscriber(&self, input: NewSubscriber) -> Result<Subscriber> {
    let phone = input.phone_number.as_str().to_owned();
    let name  = input.name.clone();
    let clock = self.clock.clone();

    let created_at: Option<DateTime<Utc>> = self
      .conn
      .call(move |conn| {
        let now = current_time(conn, clock.as_deref())?;
        let at_str = encode_dt(now);
        let inserted = conn.execute(
          "INSERT INTO subscribers (phone_number, name, verified, created_at, updated_at)
           VALUES (?1, ?2, 0, ?3, ?3)
           ON CONFLICT (phone_number) DO NOTHING",
          rusqlite::params![phone, name, at_str],
        )?;
        Ok((inserted > 0).then_some(now))
      })
      .await?;

    let Some(created_at) = created_at else {
      return Err(chime_core::Error::SubscriberExists(input.phone_number).into());
    };

    Ok(Subscriber {
      phone_number: input.phone_number,
      name: input.name,
      verified: false,
      created_at,
    })
  }

  async fn find_subscriber(&self, phone: &PhoneNumber) -> Result<Option<Subscriber>> {
    let phone = phone.as_str().to_owned();

    let raw: Option<RawSubscriber> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE phone_number = ?1"
            ),
            rusqlite::params![phone],
            RawSubscriber::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubscriber::into_subscriber).transpose()
  }

  async fn mark_verified(&self, phone: &PhoneNumber) -> Result<bool> {
    let phone = phone.as_str().to_owned();
    let clock = self.clock.clone();

    let changed = self
      .conn
      .call(move |conn| {
        let now = current_time(conn, clock.as_deref())?;
        Ok(conn.execute(
          "UPDATE subscribers SET verified = 1, updated_at = ?2
           WHERE phone_number = ?1 AND verified = 0",
          rusqlite::params![phone, encode_dt(now)],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  async fn add_subscription(&self, input: NewSubscription) -> Result<Subscription> {
    let subscription_id = Uuid::new_v4();

    let id_str          = encode_uuid(subscription_id);
    let template_id     = input.template_id;
    let template_id_str = encode_uuid(template_id);
    let phone           = input.phone_number.as_str().to_owned();
    let due_str         = encode_dt(input.next_trigger_time);
    let frequency       = input.frequency.clone();
    let clock           = self.clock.clone();

    let (raw_template, created_at) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw_template = tx
          .query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE template_id = ?1"),
            rusqlite::params![template_id_str],
            |row| RawTemplate::from_row(row, 0),
          )
          .optional()?
          .ok_or_else(|| boxed(Error::TemplateNotFound(template_id)))?;

        let now = current_time(&tx, clock.as_deref())?;
        let at_str = encode_dt(now);
        tx.execute(
          "INSERT INTO subscriptions (
             subscription_id, phone_number, template_id, next_trigger_time,
             frequency, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![id_str, phone, template_id_str, due_str, frequency, at_str],
        )?;
        tx.commit()?;
        Ok((raw_template, now))
      })
      .await?;

    Ok(Subscription {
      subscription_id,
      phone_number: input.phone_number,
      template: raw_template.into_template()?,
      next_trigger_time: input.next_trigger_time,
      frequency: input.frequency,
      created_at,
    })
  }

  async fn remove_subscription(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM subscriptions WHERE subscription_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  async fn subscriptions_for(&self, phone: &PhoneNumber) -> Result<Vec<Subscription>> {
    let phone = phone.as_str().to_owned();

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBSCRIPTION_COLUMNS}
           FROM subscriptions s
           JOIN templates t ON t.template_id = s.template_id
           WHERE s.phone_number = ?1
           ORDER BY s.next_trigger_time ASC, s.rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![phone], RawSubscription::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }

  async fn due_subscriptions(&self, before: DateTime<Utc>) -> Result<Vec<Subscription>> {
    let before_str = encode_dt(before);

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBSCRIPTION_COLUMNS}
           FROM subscriptions s
           JOIN templates t ON t.template_id = s.template_id
           WHERE s.next_trigger_time <= ?1
           ORDER BY s.next_trigger_time ASC, s.rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![before_str], RawSubscription::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }

  async fn deliver<D: Delivery>(&self, delivery: D) -> Result<Option<Communication>> {
    let subscription_id = delivery.subscription_id();
    let id_str          = encode_uuid(subscription_id);
    let comms_id        = Uuid::new_v4();
    let comms_id_str    = encode_uuid(comms_id);
    let clock           = self.clock.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Another firing may have consumed or advanced the row since it was
        // selected.
        let stored: Option<String> = tx
          .query_row(
            "SELECT next_trigger_time FROM subscriptions WHERE subscription_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let still_due = match stored {
          Some(raw) => decode_dt(&raw).map_err(boxed)? == delivery.due(),
          None => false,
        };
        if !still_due {
          return Ok(None);
        }

        let now = current_time(&tx, clock.as_deref())?;
        match delivery.reschedule(now).map_err(boxed)? {
          ScheduleChange::Consume => tx.execute(
            "DELETE FROM subscriptions WHERE subscription_id = ?1",
            rusqlite::params![id_str],
          )?,
          ScheduleChange::Advance(next) => tx.execute(
            "UPDATE subscriptions SET next_trigger_time = ?2, updated_at = ?3
             WHERE subscription_id = ?1",
            rusqlite::params![id_str, encode_dt(next), encode_dt(now)],
          )?,
        };

        let sent = delivery.dispatch().map_err(boxed)?;

        let sent_at = current_time(&tx, clock.as_deref())?;
        insert_communication(&tx, &comms_id_str, &sent, &encode_dt(sent_at))?;
        tx.commit()?;
        Ok(Some((sent, sent_at)))
      })
      .await?;

    let Some((sent, created_at)) = outcome else {
      tracing::debug!(%subscription_id, "subscription no longer due, skipping");
      return Ok(None);
    };

    Ok(Some(Communication {
      comms_id,
      template_id: sent.template_id,
      from: sent.from,
      to: sent.to,
      body: sent.body,
      created_at,
    }))
  }

  // ── Communications ────────────────────────────────────────────────────────

  async fn record_communication(&self, input: NewCommunication) -> Result<Communication> {
    let comms_id     = Uuid::new_v4();
    let comms_id_str = encode_uuid(comms_id);
    let clock        = self.clock.clone();

    let (input, created_at) = self
      .conn
      .call(move |conn| {
        let now = current_time(conn, clock.as_deref())?;
        insert_communication(conn, &comms_id_str, &input, &encode_dt(now))?;
        Ok((input, now))
      })
      .await?;

    Ok(Communication {
      comms_id,
      template_id: input.template_id,
      from: input.from,
      to: input.to,
      body: input.body,
      created_at,
    })
  }

  async fn last_sent_to(&self, phone: &PhoneNumber) -> Result<Option<Communication>> {
    let phone = phone.as_str().to_owned();

    let raw: Option<RawCommunication> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {COMMUNICATION_COLUMNS} FROM communications
               WHERE to_phone = ?1
               ORDER BY created_at DESC, rowid DESC
               LIMIT 1"
            ),
            rusqlite::params![phone],
            RawCommunication::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCommunication::into_communication).transpose()
  }

  // ── Journal ───────────────────────────────────────────────────────────────

  async fn add_journal_entry(&self, input: NewJournalEntry) -> Result<JournalEntry> {
    let journal_id   = Uuid::new_v4();
    let id_str       = encode_uuid(journal_id);
    let comms_id_str = input.comms_id.map(encode_uuid);
    let phone        = input.phone_number.as_str().to_owned();
    let prompt       = input.prompt.clone();
    let entry        = input.entry.clone();
    let clock        = self.clock.clone();

    let created_at = self
      .conn
      .call(move |conn| {
        let now = current_time(conn, clock.as_deref())?;
        conn.execute(
          "INSERT INTO journal_entries (
             journal_id, comms_id, phone_number, prompt, entry, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, comms_id_str, phone, prompt, entry, encode_dt(now)],
        )?;
        Ok(now)
      })
      .await?;

    Ok(JournalEntry {
      journal_id,
      comms_id: input.comms_id,
      phone_number: input.phone_number,
      prompt: input.prompt,
      entry: input.entry,
      created_at,
    })
  }

  async fn journal_entries(&self, phone: &PhoneNumber) -> Result<Vec<JournalEntry>> {
    let phone = phone.as_str().to_owned();

    let raws: Vec<RawJournalEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {JOURNAL_COLUMNS} FROM journal_entries
           WHERE phone_number = ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![phone], RawJournalEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawJournalEntry::into_entry).collect()
  }
}
