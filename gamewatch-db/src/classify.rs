//! Decision logic that collapses the noisy ping stream into the handful of
//! transitions worth announcing: someone joined, someone left, a server
//! emptied, a server is still alive after a day of silence, a server was
//! removed.
//!
//! `classify` is a pure function over its inputs; the receipt time is passed
//! in explicitly so the 24-hour window is testable without a real clock.

use url::Url;

use crate::models::{Ping, ServerTrackingState};

/// Length of the heartbeat suppression window for idle servers.
pub const HEARTBEAT_WINDOW_SECS: i64 = 24 * 60 * 60;

/// A meaningful state transition, destined for the chat webhook and all
/// opted-in subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
  /// Player count went up.
  PlayerJoined {
    game: String,
    server: String,
    count: u32,
  },
  /// Player count went down but the server is not empty yet.
  PlayerLeft {
    game: String,
    server: String,
    count: u32,
  },
  /// The server just transitioned into empty.
  LastPlayerLeft { game: String },
  /// An idle server is still alive after 24 hours of silence.
  DailyHeartbeat { game: String },
  /// First-ever sighting of a server, reporting zero players.
  NewIdleServer { game: String, server_url: String },
  /// The server was explicitly removed from the lobby.
  ServerDeleted { server_url: String },
}

impl Alert {
  /// Render the outbound message text.
  pub fn render(&self) -> String {
    match self {
      Alert::PlayerJoined {
        game,
        server,
        count,
      } => format!(
        "🎮 Player event- Game: [{game}] on Server: [{server}] gained a player, \
         {count} player(s) currently online."
      ),
      Alert::PlayerLeft {
        game,
        server,
        count,
      } => format!(
        "🎮 Player event- Game: [{game}] on Server: [{server}] lost a player, \
         {count} player(s) currently online."
      ),
      Alert::LastPlayerLeft { game } => {
        format!("🌐 Server event- GameServer: [{game}] the last player has left the game.")
      }
      Alert::DailyHeartbeat { game } => {
        format!("🌐 Server event- GameServer: game [{game}] 24 hour sync.")
      }
      Alert::NewIdleServer { game, server_url } => format!(
        "🌐 Server event- GameServer: [{server_url}] running game [{game}] has 0 players currently."
      ),
      Alert::ServerDeleted { server_url } => {
        let (base_url, table) = split_server_url(server_url);
        format!(
          "🌐 Server event- GameServer: [{base_url}] running game [{}] has been deleted from Lobby.",
          table.as_deref().unwrap_or("unknown")
        )
      }
    }
  }
}

/// Outcome of classifying one update ping.
#[derive(Debug, Clone)]
pub struct Classification {
  /// Zero-or-one alert to dispatch.
  pub alert: Option<Alert>,
  /// Whether `last_sync_at` must be advanced to the receipt time.
  pub advance_sync: bool,
}

/// Classify an update ping against the server's prior state.
///
/// `previous` is the tracking row as it was *before* this ping was applied;
/// `recent_counts` are the two most recent update counts logged for this
/// server URL, newest first, including this ping's entry; `occupied_rows` is
/// the number of non-zero counts ever logged, saturating at two.
pub fn classify(
  ping: &Ping,
  previous: Option<&ServerTrackingState>,
  recent_counts: &[u32],
  occupied_rows: u32,
  now: i64,
) -> Classification {
  if ping.cur_players > 0 {
    // Silent until a second non-zero count exists: the first sighting of
    // players has nothing real to diff against. A re-sync ping carrying the
    // same count stays quiet too.
    let alert = match recent_counts {
      [newest, prior] if occupied_rows >= 2 && newest != prior => {
        if newest > prior {
          Some(Alert::PlayerJoined {
            game: ping.game.clone(),
            server: ping.server.clone(),
            count: *newest,
          })
        } else {
          Some(Alert::PlayerLeft {
            game: ping.game.clone(),
            server: ping.server.clone(),
            count: *newest,
          })
        }
      }
      _ => None,
    };
    return Classification {
      alert,
      advance_sync: false,
    };
  }

  match previous {
    Some(prev) if prev.current_players != 0 => Classification {
      alert: Some(Alert::LastPlayerLeft {
        game: ping.game.clone(),
      }),
      advance_sync: false,
    },
    Some(prev) => {
      if now - prev.last_sync_at < HEARTBEAT_WINDOW_SECS {
        // Pure idle re-sync inside the window.
        Classification {
          alert: None,
          advance_sync: false,
        }
      } else {
        Classification {
          alert: Some(Alert::DailyHeartbeat {
            game: ping.game.clone(),
          }),
          advance_sync: true,
        }
      }
    }
    // First-ever sighting of this server, already empty. The tracker insert
    // seeds the window, so the next idle ping falls under suppression.
    None => Classification {
      alert: Some(Alert::NewIdleServer {
        game: ping.game.clone(),
        server_url: ping.server_url.clone(),
      }),
      advance_sync: false,
    },
  }
}

/// Split a server URL into its base form and the `table` query parameter,
/// which carries the game identity in lobby deletion requests.
pub fn split_server_url(server_url: &str) -> (String, Option<String>) {
  match Url::parse(server_url) {
    Ok(mut parsed) => {
      let table = parsed
        .query_pairs()
        .find(|(key, _)| key == "table")
        .map(|(_, value)| value.into_owned());
      parsed.set_query(None);
      parsed.set_fragment(None);
      (parsed.to_string(), table)
    }
    Err(_) => (server_url.to_string(), None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ping(count: u32) -> Ping {
    Ping {
      game: "5 Card Stud".to_string(),
      appkey: 1,
      server: "Poker Alpha".to_string(),
      region: "us".to_string(),
      server_url: "http://poker.example.com:6502/?table=stud5".to_string(),
      status: "online".to_string(),
      max_players: 8,
      cur_players: count,
    }
  }

  fn tracked(current_players: u32, last_sync_at: i64) -> ServerTrackingState {
    ServerTrackingState {
      server_url: "http://poker.example.com:6502/?table=stud5".to_string(),
      current_players,
      last_sync_at,
      total_updates: 10,
      created_at: 0,
    }
  }

  #[test]
  fn count_increase_is_a_join() {
    let result = classify(&ping(5), Some(&tracked(3, 0)), &[5, 3], 2, 100);
    assert_eq!(
      result.alert,
      Some(Alert::PlayerJoined {
        game: "5 Card Stud".to_string(),
        server: "Poker Alpha".to_string(),
        count: 5,
      })
    );
    assert!(!result.advance_sync);
  }

  #[test]
  fn count_decrease_is_a_leave() {
    let result = classify(&ping(1), Some(&tracked(3, 0)), &[1, 3], 2, 100);
    assert_eq!(
      result.alert,
      Some(Alert::PlayerLeft {
        game: "5 Card Stud".to_string(),
        server: "Poker Alpha".to_string(),
        count: 1,
      })
    );
  }

  #[test]
  fn identical_counts_are_silent() {
    let result = classify(&ping(3), Some(&tracked(3, 0)), &[3, 3], 2, 100);
    assert!(result.alert.is_none());
  }

  #[test]
  fn first_nonzero_sighting_is_silent() {
    // Only one log entry exists: the one for this ping.
    let result = classify(&ping(3), None, &[3], 1, 100);
    assert!(result.alert.is_none());

    // Same when the only prior history is idle rows.
    let result = classify(&ping(3), Some(&tracked(0, 0)), &[3, 0], 1, 100);
    assert!(result.alert.is_none());
  }

  #[test]
  fn reoccupancy_after_empty_is_a_join() {
    // The server has held players before, emptied, and players returned:
    // the diff against the zero row points up, never down.
    let result = classify(&ping(2), Some(&tracked(0, 0)), &[2, 0], 2, 100);
    assert_eq!(
      result.alert,
      Some(Alert::PlayerJoined {
        game: "5 Card Stud".to_string(),
        server: "Poker Alpha".to_string(),
        count: 2,
      })
    );
  }

  #[test]
  fn transition_to_empty_alerts() {
    let result = classify(&ping(0), Some(&tracked(2, 0)), &[0, 2], 2, 100);
    assert_eq!(
      result.alert,
      Some(Alert::LastPlayerLeft {
        game: "5 Card Stud".to_string(),
      })
    );
    assert!(!result.advance_sync);
  }

  #[test]
  fn idle_ping_inside_window_is_suppressed() {
    let result = classify(
      &ping(0),
      Some(&tracked(0, 1000)),
      &[0, 0],
      0,
      1000 + HEARTBEAT_WINDOW_SECS - 1,
    );
    assert!(result.alert.is_none());
    assert!(!result.advance_sync);
  }

  #[test]
  fn idle_ping_past_window_heartbeats_and_advances() {
    let result = classify(
      &ping(0),
      Some(&tracked(0, 1000)),
      &[0, 0],
      0,
      1000 + HEARTBEAT_WINDOW_SECS,
    );
    assert_eq!(
      result.alert,
      Some(Alert::DailyHeartbeat {
        game: "5 Card Stud".to_string(),
      })
    );
    assert!(result.advance_sync);
  }

  #[test]
  fn unknown_empty_server_alerts() {
    let result = classify(&ping(0), None, &[0], 0, 100);
    assert_eq!(
      result.alert,
      Some(Alert::NewIdleServer {
        game: "5 Card Stud".to_string(),
        server_url: "http://poker.example.com:6502/?table=stud5".to_string(),
      })
    );
  }

  #[test]
  fn split_extracts_base_and_table() {
    let (base, table) = split_server_url("http://poker.example.com:6502/?table=stud5");
    assert_eq!(base, "http://poker.example.com:6502/");
    assert_eq!(table.as_deref(), Some("stud5"));
  }

  #[test]
  fn split_tolerates_unparseable_urls() {
    let (base, table) = split_server_url("not a url");
    assert_eq!(base, "not a url");
    assert!(table.is_none());
  }

  #[test]
  fn deletion_render_names_base_and_game() {
    let alert = Alert::ServerDeleted {
      server_url: "http://poker.example.com:6502/?table=stud5".to_string(),
    };
    let text = alert.render();
    assert!(text.contains("http://poker.example.com:6502/"));
    assert!(text.contains("[stud5]"));
    assert!(text.contains("deleted from Lobby"));
  }
}
