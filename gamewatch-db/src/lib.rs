mod classify;
mod error;
mod models;

pub use classify::{Alert, Classification, HEARTBEAT_WINDOW_SECS, classify, split_server_url};
pub use error::{DbError, Result};
pub use models::{
  Channel, DeliveryError, EventKind, EventLogEntry, GameTrackingState, Ping, ServerTrackingState,
  Subscriber,
};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, params};
use tracing::{debug, info};

/// Database wrapper for all Gamewatch operations.
///
/// A single connection worker serializes every call, so each
/// `apply_update` transaction observes and mutates tracking state without
/// interleaving with concurrent pings for the same (or any) server URL.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        // Enable WAL mode for better concurrent read/write performance
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
          r#"
          -- Append-only log of every ping/deletion received
          CREATE TABLE IF NOT EXISTS game_events (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created INTEGER NOT NULL,
              kind TEXT NOT NULL CHECK (kind IN ('update', 'delete')),
              game TEXT,
              appkey INTEGER,
              server TEXT,
              region TEXT,
              server_url TEXT NOT NULL,
              status TEXT,
              max_players INTEGER,
              cur_players INTEGER
          );

          -- Last known state per server URL
          CREATE TABLE IF NOT EXISTS server_tracking (
              server_url TEXT PRIMARY KEY,
              current_players INTEGER NOT NULL,
              last_sync_at INTEGER NOT NULL,
              total_updates INTEGER NOT NULL DEFAULT 0,
              created_at INTEGER NOT NULL
          );

          -- Last known state per game name
          CREATE TABLE IF NOT EXISTS game_tracking (
              game TEXT PRIMARY KEY,
              current_players INTEGER NOT NULL,
              total_players INTEGER NOT NULL DEFAULT 0,
              created_at INTEGER NOT NULL
          );

          -- Alert recipients, one row per phone/channel pair
          CREATE TABLE IF NOT EXISTS subscribers (
              phone TEXT NOT NULL,
              channel TEXT NOT NULL CHECK (channel IN ('sms', 'whatsapp')),
              opted_in INTEGER NOT NULL DEFAULT 1,
              created_at INTEGER NOT NULL,
              PRIMARY KEY (phone, channel)
          );

          -- Delivery failures reported back by the messaging provider
          CREATE TABLE IF NOT EXISTS delivery_errors (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created INTEGER NOT NULL,
              resource_sid TEXT,
              service_sid TEXT,
              error_code TEXT,
              error_message TEXT,
              callback_url TEXT,
              request_method TEXT,
              payload TEXT
          );

          -- Index for the two-most-recent-counts query
          CREATE INDEX IF NOT EXISTS idx_game_events_server ON game_events(server_url, id);
          "#,
        )?;
        Ok(())
      })
      .await?;

    info!("database initialized");
    Ok(())
  }

  // ========================================================================
  // Ping application
  // ========================================================================

  /// Apply one update ping as a single atomic unit: append the log entry,
  /// upsert both trackers, classify the transition against the pre-update
  /// state, and advance the heartbeat window when the classifier says to.
  ///
  /// Returns the alert to dispatch, if the ping was noteworthy. On error the
  /// transaction rolls back and nothing is recorded; the caller must reject
  /// the ping so the upstream server retries.
  pub async fn apply_update(&self, ping: Ping, now: i64) -> Result<Option<Alert>> {
    let server_url_log = ping.server_url.clone();

    let alert = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Tracking state as it was before this ping; the classifier diffs
        // against it.
        let previous: Option<ServerTrackingState> = tx
          .prepare_cached(
            "SELECT server_url, current_players, last_sync_at, total_updates, created_at
             FROM server_tracking WHERE server_url = ?1",
          )?
          .query_row(params![&ping.server_url], |row| {
            Ok(ServerTrackingState {
              server_url: row.get(0)?,
              current_players: row.get(1)?,
              last_sync_at: row.get(2)?,
              total_updates: row.get(3)?,
              created_at: row.get(4)?,
            })
          })
          .optional()?;

        tx.prepare_cached(
          "INSERT INTO game_events
             (created, kind, game, appkey, server, region, server_url, status, max_players, cur_players)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?
        .execute(params![
          now,
          EventKind::Update.as_str(),
          &ping.game,
          ping.appkey,
          &ping.server,
          &ping.region,
          &ping.server_url,
          &ping.status,
          ping.max_players,
          ping.cur_players
        ])?;

        tx.prepare_cached(
          "INSERT INTO game_tracking (game, current_players, total_players, created_at)
           VALUES (?1, ?2, 1, ?3)
           ON CONFLICT(game) DO UPDATE SET
             current_players = excluded.current_players,
             total_players = total_players + 1",
        )?
        .execute(params![&ping.game, ping.cur_players, now])?;

        // last_sync_at is seeded at creation so a brand-new idle server
        // starts inside the suppression window.
        tx.prepare_cached(
          "INSERT INTO server_tracking
             (server_url, current_players, last_sync_at, total_updates, created_at)
           VALUES (?1, ?2, ?3, 1, ?3)
           ON CONFLICT(server_url) DO UPDATE SET
             current_players = excluded.current_players,
             total_updates = total_updates + 1",
        )?
        .execute(params![&ping.server_url, ping.cur_players, now])?;

        // Two most recent update counts for this server, newest first,
        // including the row just appended. Zero rows stay in the diff so a
        // server refilling after an empty spell reads as players arriving.
        let recent: Vec<u32> = {
          let mut stmt = tx.prepare_cached(
            "SELECT cur_players FROM game_events
             WHERE server_url = ?1 AND kind = 'update'
             ORDER BY id DESC LIMIT 2",
          )?;
          let counts = stmt
            .query_map(params![&ping.server_url], |row| row.get(0))?
            .collect::<std::result::Result<Vec<u32>, _>>()?;
          counts
        };

        // Number of non-zero counts ever logged, saturating at two. One
        // means this ping is the first sighting of players on this server.
        let occupied_rows: u32 = tx
          .prepare_cached(
            "SELECT COUNT(*) FROM (
               SELECT 1 FROM game_events
               WHERE server_url = ?1 AND kind = 'update' AND cur_players > 0
               LIMIT 2)",
          )?
          .query_row(params![&ping.server_url], |row| row.get(0))?;

        let decision = classify(&ping, previous.as_ref(), &recent, occupied_rows, now);

        if decision.advance_sync {
          tx.prepare_cached("UPDATE server_tracking SET last_sync_at = ?1 WHERE server_url = ?2")?
            .execute(params![now, &ping.server_url])?;
        }

        tx.commit()?;
        Ok(decision.alert)
      })
      .await?;

    debug!(server_url = %server_url_log, alerted = alert.is_some(), "applied update ping");
    Ok(alert)
  }

  /// Record an explicit server removal. Deletions bypass classification and
  /// always produce exactly one alert.
  pub async fn apply_deletion(&self, server_url: String, now: i64) -> Result<Alert> {
    let server_url_log = server_url.clone();

    let alert = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "INSERT INTO game_events (created, kind, server_url) VALUES (?1, ?2, ?3)",
          )?
          .execute(params![now, EventKind::Delete.as_str(), &server_url])?;

        Ok(Alert::ServerDeleted { server_url })
      })
      .await?;

    debug!(server_url = %server_url_log, "applied deletion");
    Ok(alert)
  }

  // ========================================================================
  // Tracking state
  // ========================================================================

  /// Get the tracking state for a server URL.
  pub async fn server_state(&self, server_url: String) -> Result<Option<ServerTrackingState>> {
    let state = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT server_url, current_players, last_sync_at, total_updates, created_at
             FROM server_tracking WHERE server_url = ?1",
          )?
          .query_row(params![&server_url], |row| {
            Ok(ServerTrackingState {
              server_url: row.get(0)?,
              current_players: row.get(1)?,
              last_sync_at: row.get(2)?,
              total_updates: row.get(3)?,
              created_at: row.get(4)?,
            })
          })
          .optional()
      })
      .await?;

    Ok(state)
  }

  /// Get the tracking state for a game name.
  pub async fn game_state(&self, game: String) -> Result<Option<GameTrackingState>> {
    let state = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT game, current_players, total_players, created_at
             FROM game_tracking WHERE game = ?1",
          )?
          .query_row(params![&game], |row| {
            Ok(GameTrackingState {
              game: row.get(0)?,
              current_players: row.get(1)?,
              total_players: row.get(2)?,
              created_at: row.get(3)?,
            })
          })
          .optional()
      })
      .await?;

    Ok(state)
  }

  // ========================================================================
  // Event log
  // ========================================================================

  /// All log entries for a server URL, oldest first.
  pub async fn events_for_server(&self, server_url: String) -> Result<Vec<EventLogEntry>> {
    let events = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT id, created, kind, game, server_url, cur_players
           FROM game_events WHERE server_url = ?1 ORDER BY id",
        )?;

        let events = stmt
          .query_map(params![&server_url], |row| {
            let kind: String = row.get(2)?;
            Ok(EventLogEntry {
              id: row.get(0)?,
              created: row.get(1)?,
              kind: parse_event_kind(kind)?,
              game: row.get(3)?,
              server_url: row.get(4)?,
              cur_players: row.get(5)?,
            })
          })?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
      })
      .await?;

    Ok(events)
  }

  /// Total number of rows in the event log.
  pub async fn event_count(&self) -> Result<u64> {
    let count = self
      .conn
      .call(|conn| {
        conn
          .prepare_cached("SELECT COUNT(*) FROM game_events")?
          .query_row([], |row| row.get(0))
      })
      .await?;

    Ok(count)
  }

  // ========================================================================
  // Subscribers
  // ========================================================================

  /// Opted-in recipients for one delivery channel.
  pub async fn opted_in_subscribers(&self, channel: Channel) -> Result<Vec<Subscriber>> {
    let subscribers = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT phone, channel, opted_in FROM subscribers
           WHERE opted_in = 1 AND channel = ?1 ORDER BY phone",
        )?;

        let subscribers = stmt
          .query_map(params![channel.as_str()], |row| {
            let channel: String = row.get(1)?;
            Ok(Subscriber {
              phone: row.get(0)?,
              channel: parse_channel(channel)?,
              opted_in: row.get(2)?,
            })
          })?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscribers)
      })
      .await?;

    Ok(subscribers)
  }

  /// Create or update a recipient row.
  pub async fn upsert_subscriber(
    &self,
    phone: String,
    channel: Channel,
    opted_in: bool,
    now: i64,
  ) -> Result<()> {
    let phone_log = phone.clone();

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "INSERT INTO subscribers (phone, channel, opted_in, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(phone, channel) DO UPDATE SET opted_in = excluded.opted_in",
          )?
          .execute(params![&phone, channel.as_str(), opted_in, now])?;
        Ok(())
      })
      .await?;

    debug!(phone = %phone_log, %channel, opted_in, "upserted subscriber");
    Ok(())
  }

  // ========================================================================
  // Delivery errors
  // ========================================================================

  /// Persist a delivery-error callback from the messaging provider.
  pub async fn record_delivery_error(&self, error: DeliveryError, now: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "INSERT INTO delivery_errors
               (created, resource_sid, service_sid, error_code, error_message,
                callback_url, request_method, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?
          .execute(params![
            now,
            error.resource_sid,
            error.service_sid,
            error.error_code,
            error.error_message,
            error.callback_url,
            error.request_method,
            error.payload
          ])?;
        Ok(())
      })
      .await?;

    debug!("recorded delivery error");
    Ok(())
  }

  /// Number of recorded delivery errors.
  pub async fn delivery_error_count(&self) -> Result<u64> {
    let count = self
      .conn
      .call(|conn| {
        conn
          .prepare_cached("SELECT COUNT(*) FROM delivery_errors")?
          .query_row([], |row| row.get(0))
      })
      .await?;

    Ok(count)
  }
}

fn parse_event_kind(value: String) -> rusqlite::Result<EventKind> {
  EventKind::parse(&value).ok_or_else(|| {
    rusqlite::Error::FromSqlConversionFailure(
      2,
      rusqlite::types::Type::Text,
      format!("unknown event kind: {value}").into(),
    )
  })
}

fn parse_channel(value: String) -> rusqlite::Result<Channel> {
  Channel::parse(&value).ok_or_else(|| {
    rusqlite::Error::FromSqlConversionFailure(
      1,
      rusqlite::types::Type::Text,
      format!("unknown channel: {value}").into(),
    )
  })
}
