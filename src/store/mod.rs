//! State storage with SQLite
//!
//! Holds the materialized portal/player/action/MU state. The collector is the
//! only writer; every write is keyed so replaying a record is harmless:
//! - portals: (lat_e6, lng_e6)
//! - players: id
//! - actions, mu, messages: guid, inserted with INSERT OR IGNORE

mod schema;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

use crate::plext::{PortalRef, Team};

pub use schema::SCHEMA;

pub const MAX_PORTAL_LEVEL: i64 = 8;

pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Start a transaction covering every write made through this store until
    /// it is committed. Dropping it rolls back.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    // ============================================
    // PORTALS
    // ============================================

    pub fn get_portal(&self, lat_e6: i64, lng_e6: i64) -> Result<Option<PortalRow>> {
        let row = self
            .conn
            .query_row(
                r#"SELECT guid, name, team, owner, lat_e6, lng_e6, level, capture_count,
                          last_captured
                   FROM portals WHERE lat_e6 = ? AND lng_e6 = ?"#,
                params![lat_e6, lng_e6],
                map_portal,
            )
            .optional()?;
        Ok(row)
    }

    pub fn insert_portal(&self, portal: &PortalRef) -> Result<PortalRow> {
        let guid = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            r#"INSERT INTO portals (lat_e6, lng_e6, guid, name, team, added)
               VALUES (?, ?, ?, ?, ?, datetime('now'))"#,
            params![portal.lat_e6, portal.lng_e6, guid, portal.name, portal.team.code()],
        )?;

        Ok(PortalRow {
            guid,
            name: portal.name.clone(),
            team: portal.team.code().to_string(),
            owner: String::new(),
            lat_e6: portal.lat_e6,
            lng_e6: portal.lng_e6,
            level: 0,
            capture_count: 0,
            last_captured: None,
        })
    }

    /// Write back the mutable portal attributes. Level is clamped to 0..=8.
    pub fn update_portal(&self, portal: &PortalRow) -> Result<()> {
        self.conn.execute(
            r#"UPDATE portals
               SET team = ?, owner = ?, level = ?, capture_count = ?, last_captured = ?
               WHERE lat_e6 = ? AND lng_e6 = ?"#,
            params![
                portal.team,
                portal.owner,
                portal.level.clamp(0, MAX_PORTAL_LEVEL),
                portal.capture_count,
                portal.last_captured,
                portal.lat_e6,
                portal.lng_e6,
            ],
        )?;
        Ok(())
    }

    // ============================================
    // PLAYERS
    // ============================================

    pub fn get_player(&self, id: &str) -> Result<Option<PlayerRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, team, portal_count, over_lv8 FROM players WHERE id = ?",
                params![id],
                map_player,
            )
            .optional()?;
        Ok(row)
    }

    pub fn insert_player(&self, id: &str, team: Team) -> Result<PlayerRow> {
        self.conn.execute(
            "INSERT OR IGNORE INTO players (id, team, added) VALUES (?, ?, datetime('now'))",
            params![id, team.code()],
        )?;
        Ok(PlayerRow {
            id: id.to_string(),
            team: team.code().to_string(),
            portal_count: 0,
            over_lv8: false,
        })
    }

    pub fn set_player_team(&self, id: &str, team: Team) -> Result<()> {
        self.conn.execute(
            "UPDATE players SET team = ? WHERE id = ?",
            params![team.code(), id],
        )?;
        Ok(())
    }

    /// Never cleared once set
    pub fn mark_over_lv8(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE players SET over_lv8 = TRUE WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    // ============================================
    // ACTIONS, MU, MESSAGES
    // ============================================

    pub fn action_exists(&self, guid: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM actions WHERE guid = ?", guid)
    }

    /// Returns false when an action with this guid was already recorded
    pub fn insert_action(&self, action: &NewAction) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"INSERT OR IGNORE INTO actions
               (guid, player_id, name, resonator, portal_guid, portal_to_guid, timestamp, added)
               VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))"#,
            params![
                action.guid,
                action.player_id,
                action.name,
                action.resonator,
                action.portal_guid,
                action.portal_to_guid,
                action.timestamp_ms,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn mu_exists(&self, guid: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM mu WHERE guid = ?", guid)
    }

    pub fn insert_mu(&self, mu: &NewMu) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"INSERT OR IGNORE INTO mu (guid, player_id, points, timestamp, team, added)
               VALUES (?, ?, ?, ?, ?, datetime('now'))"#,
            params![mu.guid, mu.player_id, mu.points, mu.timestamp_ms, mu.team],
        )?;
        Ok(inserted > 0)
    }

    pub fn message_exists(&self, guid: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM messages WHERE guid = ?", guid)
    }

    pub fn insert_message(&self, message: &NewMessage) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"INSERT OR IGNORE INTO messages (guid, text, player, team, timestamp, is_secure, added)
               VALUES (?, ?, ?, ?, ?, ?, datetime('now'))"#,
            params![
                message.guid,
                message.text,
                message.player,
                message.team,
                message.timestamp_ms,
                message.is_secure,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn exists(&self, sql: &str, key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    // ============================================
    // QUERIES
    // ============================================

    /// Origin timestamp of the newest recorded action
    pub fn latest_action_timestamp(&self) -> Result<Option<i64>> {
        let ts: Option<i64> = self
            .conn
            .query_row("SELECT MAX(timestamp) FROM actions", [], |row| row.get(0))?;
        Ok(ts)
    }

    pub fn list_portals(&self, team: Option<&str>, limit: usize) -> Result<Vec<PortalRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT guid, name, team, owner, lat_e6, lng_e6, level, capture_count,
                      last_captured
               FROM portals
               WHERE ?1 IS NULL OR team = ?1
               ORDER BY level DESC, capture_count DESC, name
               LIMIT ?2"#,
        )?;

        let rows = stmt.query_map(params![team, limit as i64], map_portal)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_actions(&self, player: Option<&str>, limit: usize) -> Result<Vec<ActionRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT a.guid, a.player_id, pl.team, a.name, a.resonator,
                      p.name, pt.name, a.timestamp
               FROM actions a
               JOIN players pl ON a.player_id = pl.id
               LEFT JOIN portals p ON a.portal_guid = p.guid
               LEFT JOIN portals pt ON a.portal_to_guid = pt.guid
               WHERE ?1 IS NULL OR a.player_id = ?1
               ORDER BY a.timestamp DESC
               LIMIT ?2"#,
        )?;

        let rows = stmt.query_map(params![player, limit as i64], |row| {
            Ok(ActionRow {
                guid: row.get(0)?,
                player_id: row.get(1)?,
                team: row.get(2)?,
                name: row.get(3)?,
                resonator: row.get(4)?,
                portal_name: row.get(5)?,
                portal_to_name: row.get(6)?,
                timestamp_ms: row.get(7)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_players(&self, over_lv8_only: bool) -> Result<Vec<PlayerRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, team, portal_count, over_lv8
               FROM players
               WHERE ?1 = FALSE OR over_lv8 = TRUE
               ORDER BY team, id"#,
        )?;

        let rows = stmt.query_map(params![over_lv8_only], map_player)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Total MU per team code
    pub fn mu_totals(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT team, SUM(points) FROM mu GROUP BY team ORDER BY team")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<i64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n)
        };

        Ok(StoreCounts {
            portals: count("portals")?,
            players: count("players")?,
            actions: count("actions")?,
            mu: count("mu")?,
            messages: count("messages")?,
        })
    }
}

fn map_portal(row: &rusqlite::Row) -> rusqlite::Result<PortalRow> {
    Ok(PortalRow {
        guid: row.get(0)?,
        name: row.get(1)?,
        team: row.get(2)?,
        owner: row.get(3)?,
        lat_e6: row.get(4)?,
        lng_e6: row.get(5)?,
        level: row.get(6)?,
        capture_count: row.get(7)?,
        last_captured: row.get(8)?,
    })
}

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<PlayerRow> {
    Ok(PlayerRow {
        id: row.get(0)?,
        team: row.get(1)?,
        portal_count: row.get(2)?,
        over_lv8: row.get(3)?,
    })
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRow {
    pub guid: String,
    pub name: String,
    pub team: String,
    pub owner: String,
    pub lat_e6: i64,
    pub lng_e6: i64,
    pub level: i64,
    pub capture_count: i64,
    pub last_captured: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRow {
    pub id: String,
    pub team: String,
    pub portal_count: i64,
    pub over_lv8: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRow {
    pub guid: String,
    pub player_id: String,
    pub team: String,
    pub name: String,
    pub resonator: i64,
    pub portal_name: Option<String>,
    pub portal_to_name: Option<String>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub portals: i64,
    pub players: i64,
    pub actions: i64,
    pub mu: i64,
    pub messages: i64,
}

#[derive(Debug, Clone)]
pub struct NewAction {
    pub guid: String,
    pub player_id: String,
    pub name: String,
    pub resonator: i64,
    pub portal_guid: Option<String>,
    pub portal_to_guid: Option<String>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct NewMu {
    pub guid: String,
    pub player_id: String,
    pub points: i64,
    pub timestamp_ms: i64,
    pub team: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub guid: String,
    pub text: String,
    pub player: String,
    pub team: String,
    pub timestamp_ms: i64,
    pub is_secure: bool,
}

#[cfg(test)]
impl StateStore {
    /// Break the store underneath an open connection
    pub(crate) fn drop_table(&self, table: &str) {
        self.conn
            .execute_batch(&format!("DROP TABLE {}", table))
            .unwrap();
    }
}

#[cfg(test)]
pub(crate) fn open_temp() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(&dir.path().join("state.db")).unwrap();
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal_ref(name: &str) -> PortalRef {
        PortalRef {
            name: name.to_string(),
            team: Team::Resistance,
            lat_e6: 40_000_000,
            lng_e6: 116_000_000,
        }
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.db");
        StateStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_portal_insert_and_lookup_by_coords() {
        let (_dir, store) = open_temp();
        assert!(store.get_portal(40_000_000, 116_000_000).unwrap().is_none());

        let created = store.insert_portal(&portal_ref("Alpha")).unwrap();
        let loaded = store.get_portal(40_000_000, 116_000_000).unwrap().unwrap();
        assert_eq!(created, loaded);
        assert_eq!(loaded.level, 0);
        assert_eq!(loaded.team, "R");
        assert!(store.get_portal(40_000_000, 116_000_001).unwrap().is_none());
    }

    #[test]
    fn test_update_portal_clamps_level() {
        let (_dir, store) = open_temp();
        let mut portal = store.insert_portal(&portal_ref("Alpha")).unwrap();
        portal.level = 12;
        store.update_portal(&portal).unwrap();
        assert_eq!(store.get_portal(40_000_000, 116_000_000).unwrap().unwrap().level, 8);

        portal.level = -3;
        store.update_portal(&portal).unwrap();
        assert_eq!(store.get_portal(40_000_000, 116_000_000).unwrap().unwrap().level, 0);
    }

    #[test]
    fn test_insert_action_ignores_duplicate_guid() {
        let (_dir, store) = open_temp();
        store.insert_player("P1", Team::Enlightened).unwrap();
        let action = NewAction {
            guid: "g1".to_string(),
            player_id: "P1".to_string(),
            name: "linked".to_string(),
            resonator: 0,
            portal_guid: None,
            portal_to_guid: None,
            timestamp_ms: 100,
        };
        assert!(store.insert_action(&action).unwrap());
        assert!(!store.insert_action(&action).unwrap());
        assert!(store.action_exists("g1").unwrap());
        assert_eq!(store.counts().unwrap().actions, 1);
    }

    #[test]
    fn test_latest_action_timestamp() {
        let (_dir, store) = open_temp();
        assert_eq!(store.latest_action_timestamp().unwrap(), None);

        store.insert_player("P1", Team::Resistance).unwrap();
        for (guid, ts) in [("a", 300), ("b", 100), ("c", 200)] {
            store
                .insert_action(&NewAction {
                    guid: guid.to_string(),
                    player_id: "P1".to_string(),
                    name: "deployed".to_string(),
                    resonator: 1,
                    portal_guid: None,
                    portal_to_guid: None,
                    timestamp_ms: ts,
                })
                .unwrap();
        }
        assert_eq!(store.latest_action_timestamp().unwrap(), Some(300));
    }

    #[test]
    fn test_player_flags_and_team() {
        let (_dir, store) = open_temp();
        store.insert_player("P1", Team::Resistance).unwrap();
        store.insert_player("P2", Team::Enlightened).unwrap();
        store.mark_over_lv8("P1").unwrap();

        let over = store.list_players(true).unwrap();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].id, "P1");
        assert_eq!(store.list_players(false).unwrap().len(), 2);

        store.set_player_team("P2", Team::Resistance).unwrap();
        assert_eq!(store.get_player("P2").unwrap().unwrap().team, "R");
    }

    #[test]
    fn test_mu_totals_by_team() {
        let (_dir, store) = open_temp();
        store.insert_player("P1", Team::Resistance).unwrap();
        for (guid, points, team) in [("m1", 10, "R"), ("m2", 5, "R"), ("m3", 7, "E")] {
            store
                .insert_mu(&NewMu {
                    guid: guid.to_string(),
                    player_id: "P1".to_string(),
                    points,
                    timestamp_ms: 1,
                    team: team.to_string(),
                })
                .unwrap();
        }
        assert_eq!(
            store.mu_totals().unwrap(),
            vec![("E".to_string(), 7), ("R".to_string(), 15)]
        );
    }

    #[test]
    fn test_rollback_discards_writes() {
        let (_dir, store) = open_temp();
        {
            let _tx = store.begin().unwrap();
            store.insert_player("P1", Team::Resistance).unwrap();
        }
        assert!(store.get_player("P1").unwrap().is_none());

        let tx = store.begin().unwrap();
        store.insert_player("P1", Team::Resistance).unwrap();
        tx.commit().unwrap();
        assert!(store.get_player("P1").unwrap().is_some());
    }
}
