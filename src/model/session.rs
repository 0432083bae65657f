use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One player inside a session, keyed upstream by an ephemeral slot id.
///
/// The friend code is the only stable identifier the upstream exposes.
/// `ev` is the player's rating; absent means "no rating yet", which is
/// not the same thing as zero.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Player {
    #[serde(default)]
    pub fc: String,
    #[serde(default)]
    pub ev: Option<i64>,
}

/// One open game room as reported by the upstream group list.
///
/// Unknown upstream fields are ignored; absent fields fall back to
/// defaults so a sparse payload still decodes.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Session {
    /// Room kind code (e.g. `vs_10`). The upstream occasionally omits it.
    #[serde(default = "Session::default_rk")]
    pub rk: String,
    /// Set to 1 while the room is between races (track selection).
    #[serde(default)]
    pub suspend: i64,
    /// Slot id -> player. Slot ids are ephemeral and only unique per session.
    #[serde(default)]
    pub players: BTreeMap<String, Player>,
}

impl Session {
    pub const UNKNOWN_RK: &'static str = "unknown";

    fn default_rk() -> String {
        Self::UNKNOWN_RK.to_string()
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            rk: Self::default_rk(),
            suspend: 0,
            players: BTreeMap::new(),
        }
    }
}

/// An immutable capture of one successful poll.
///
/// Published behind an [`Arc`] and replaced wholesale on the next
/// successful refresh, so every derivation in a cycle observes the same
/// session list.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PollSnapshot {
    sessions: Vec<Session>,
}

impl PollSnapshot {
    #[must_use]
    pub const fn from_sessions(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }

    #[must_use]
    pub fn shared(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(Self::from_sessions(sessions))
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Find the session and player entry for a friend code.
    ///
    /// Sessions are scanned in list order, players in slot order. A friend
    /// code should appear at most once per snapshot; if the upstream ever
    /// violates that, the first match wins. `None` simply means the player
    /// is not online right now.
    #[must_use]
    pub fn find_player(&self, friend_code: &str) -> Option<(&Session, &Player)> {
        self.sessions.iter().find_map(|session| {
            session
                .players
                .values()
                .find(|player| player.fc == friend_code)
                .map(|player| (session, player))
        })
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::*;

    fn player(fc: &str, ev: Option<i64>) -> Player {
        Player {
            fc: fc.to_string(),
            ev,
        }
    }

    #[test]
    fn session_defaults_apply_to_sparse_payloads() {
        let session: Session = serde_json::from_str("{}").unwrap();

        assert_eq!(session.rk, "unknown");
        assert_eq!(session.suspend, 0);
        assert!(session.players.is_empty());
    }

    #[test]
    fn session_ignores_unknown_fields() {
        let session: Session = serde_json::from_str(
            r#"{"rk":"vs_10","suspend":0,"players":{},"host":"abcd","extra":[1,2]}"#,
        )
        .unwrap();

        assert_eq!(session.rk, "vs_10");
    }

    #[test]
    fn player_ev_is_optional() {
        let player: Player = serde_json::from_str(r#"{"fc":"1234"}"#).unwrap();

        assert_eq!(player.fc, "1234");
        assert_eq!(player.ev, None);
    }

    #[test]
    fn find_player_scans_in_session_order() {
        let snapshot = PollSnapshot::from_sessions(vec![
            Session {
                rk: "vs_10".to_string(),
                players: btreemap! {
                    "0".to_string() => player("1111", Some(5000)),
                },
                ..Session::default()
            },
            Session {
                rk: "vs_20".to_string(),
                players: btreemap! {
                    "0".to_string() => player("1111", Some(9999)),
                    "1".to_string() => player("2222", None),
                },
                ..Session::default()
            },
        ]);

        // duplicated friend code: first session in list order wins
        let (session, player) = snapshot.find_player("1111").unwrap();
        assert_eq!(session.rk, "vs_10");
        assert_eq!(player.ev, Some(5000));

        let (session, _) = snapshot.find_player("2222").unwrap();
        assert_eq!(session.rk, "vs_20");
    }

    #[test]
    fn find_player_prefers_lowest_slot_within_a_session() {
        let snapshot = PollSnapshot::from_sessions(vec![Session {
            players: btreemap! {
                "0".to_string() => player("3333", Some(1)),
                "1".to_string() => player("3333", Some(2)),
            },
            ..Session::default()
        }]);

        let (_, player) = snapshot.find_player("3333").unwrap();
        assert_eq!(player.ev, Some(1));
    }

    #[test]
    fn find_player_misses_are_not_errors() {
        let snapshot = PollSnapshot::default();

        assert!(snapshot.find_player("9999").is_none());
    }
}
