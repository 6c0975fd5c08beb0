/// Kind of a recorded game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
  /// Periodic state update from a running server.
  Update,
  /// Explicit removal of a server from the lobby.
  Delete,
}

impl EventKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      EventKind::Update => "update",
      EventKind::Delete => "delete",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "update" => Some(EventKind::Update),
      "delete" => Some(EventKind::Delete),
      _ => None,
    }
  }
}

/// An inbound state update from a game server.
#[derive(Debug, Clone)]
pub struct Ping {
  /// Game name (e.g. "5 Card Stud")
  pub game: String,
  /// App/lobby key
  pub appkey: i64,
  /// Human-readable server label
  pub server: String,
  /// Region label
  pub region: String,
  /// Server URL - the unique server identity key
  pub server_url: String,
  /// Status string reported by the server
  pub status: String,
  /// Maximum player capacity
  pub max_players: u32,
  /// Current player count
  pub cur_players: u32,
}

/// One row of the append-only event log.
#[derive(Debug, Clone)]
pub struct EventLogEntry {
  pub id: i64,
  /// Unix timestamp of receipt
  pub created: i64,
  pub kind: EventKind,
  pub game: Option<String>,
  pub server_url: String,
  pub cur_players: Option<u32>,
}

/// Durable per-server-URL tracking state.
#[derive(Debug, Clone)]
pub struct ServerTrackingState {
  pub server_url: String,
  /// Last observed player count
  pub current_players: u32,
  /// Anchor of the 24-hour heartbeat suppression window.
  /// Seeded at row creation, advanced only when a heartbeat alert fires.
  pub last_sync_at: i64,
  /// Number of pings received for this server
  pub total_updates: u64,
  pub created_at: i64,
}

/// Durable per-game-name tracking state.
///
/// `total_players` counts ping observations, not unique players.
#[derive(Debug, Clone)]
pub struct GameTrackingState {
  pub game: String,
  pub current_players: u32,
  pub total_players: u64,
  pub created_at: i64,
}

/// Delivery channel for direct subscriber messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
  Sms,
  Whatsapp,
}

impl Channel {
  pub fn as_str(&self) -> &'static str {
    match self {
      Channel::Sms => "sms",
      Channel::Whatsapp => "whatsapp",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "sms" => Some(Channel::Sms),
      "whatsapp" => Some(Channel::Whatsapp),
      _ => None,
    }
  }
}

impl std::fmt::Display for Channel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An alert recipient.
#[derive(Debug, Clone)]
pub struct Subscriber {
  /// Phone number in E.164 form, without any channel prefix
  pub phone: String,
  pub channel: Channel,
  pub opted_in: bool,
}

/// A delivery failure reported back by the messaging provider.
#[derive(Debug, Clone, Default)]
pub struct DeliveryError {
  pub resource_sid: Option<String>,
  pub service_sid: Option<String>,
  pub error_code: Option<String>,
  pub error_message: Option<String>,
  pub callback_url: Option<String>,
  pub request_method: Option<String>,
  /// Raw callback payload, kept for debugging
  pub payload: Option<String>,
}
