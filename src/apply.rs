//! Applies parsed plexts to the store
//!
//! Every record is applied inside one transaction and is keyed by its guid:
//! once an action with that guid exists the record is a no-op, so feeding the
//! same page twice leaves the store unchanged.
//!
//! Portal level rules:
//! - a capture always sets the level to 1 (from 0, or down from anything)
//! - destroying a resonator on a level 8 portal drops it to 7; other levels
//!   are left for a separate leveling job to correct

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::geofence::Geofence;
use crate::plext::{ActionKind, Actor, Plext, PortalRef};
use crate::store::{
    NewAction, NewMessage, NewMu, PlayerRow, PortalRow, StateStore, MAX_PORTAL_LEVEL,
};

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New action written, plus an MU row for fields
    Recorded { kind: ActionKind, mu: bool },
    /// Action guid already recorded; nothing written
    Duplicate,
    /// Chat message; `persisted` is false unless message storage is enabled
    Message { persisted: bool },
    /// Actor and portal present but no recognizable action
    Unclassified,
    /// A portal in the record lies outside the geofence
    OutOfRange,
    /// Missing actor or portal
    Incomplete,
}

pub struct Applier<'a> {
    store: &'a StateStore,
    geofence: &'a Geofence,
    policy: &'a PolicyConfig,
}

impl<'a> Applier<'a> {
    pub fn new(store: &'a StateStore, geofence: &'a Geofence, policy: &'a PolicyConfig) -> Self {
        Self {
            store,
            geofence,
            policy,
        }
    }

    pub fn apply(&self, plext: &Plext) -> Result<Applied> {
        let tx = self.store.begin()?;
        let applied = self.apply_record(plext)?;
        tx.commit()?;
        Ok(applied)
    }

    fn apply_record(&self, plext: &Plext) -> Result<Applied> {
        let (actor, portal) = match (&plext.actor, &plext.portal) {
            (Some(actor), None) => return self.apply_message(plext, actor),
            (Some(actor), Some(portal)) => (actor, portal),
            _ => return Ok(Applied::Incomplete),
        };

        let Some(kind) = plext.kind else {
            debug!(guid = %plext.guid, kind = %ActionKind::Unknown, text = %plext.text, "dropped");
            return Ok(Applied::Unclassified);
        };

        if self.store.action_exists(&plext.guid)? {
            return Ok(Applied::Duplicate);
        }

        for p in std::iter::once(portal).chain(plext.portal_to.as_ref()) {
            if !self.geofence.within_range(p.lat_e6, p.lng_e6) {
                info!(portal = %p.name, lat_e6 = p.lat_e6, lng_e6 = p.lng_e6,
                    "found a portal outside the geofence, ignored");
                return Ok(Applied::OutOfRange);
            }
        }

        let mut portal_row = self.resolve_portal(portal)?;
        match kind {
            ActionKind::Captured => {
                portal_row.owner = actor.id.clone();
                portal_row.capture_count += 1;
                portal_row.last_captured = Some(origin_time(plext.timestamp_ms));
                portal_row.level = 1;
                self.store.update_portal(&portal_row)?;
            }
            ActionKind::Destroyed if portal_row.level == MAX_PORTAL_LEVEL => {
                portal_row.level -= 1;
                self.store.update_portal(&portal_row)?;
            }
            _ => {}
        }

        let portal_to_row = match &plext.portal_to {
            Some(p) => Some(self.resolve_portal(p)?),
            None => None,
        };

        let player = self.resolve_player(actor)?;
        if kind == ActionKind::Deployed && plext.resonator >= 8 && !player.over_lv8 {
            self.store.mark_over_lv8(&player.id)?;
        }

        self.store.insert_action(&NewAction {
            guid: plext.guid.clone(),
            player_id: player.id.clone(),
            name: kind.as_str().to_string(),
            resonator: plext.resonator,
            portal_guid: Some(portal_row.guid.clone()),
            portal_to_guid: portal_to_row.map(|p| p.guid),
            timestamp_ms: plext.timestamp_ms,
        })?;

        let mut mu = false;
        if kind == ActionKind::Field && !self.store.mu_exists(&plext.guid)? {
            mu = self.store.insert_mu(&NewMu {
                guid: plext.guid.clone(),
                player_id: player.id.clone(),
                points: plext.mu_points,
                timestamp_ms: plext.timestamp_ms,
                team: player.team.clone(),
            })?;
        }

        info!(
            player = %actor.id,
            %kind,
            resonator = plext.resonator,
            portal = %portal.name,
            "recorded"
        );
        Ok(Applied::Recorded { kind, mu })
    }

    fn apply_message(&self, plext: &Plext, actor: &Actor) -> Result<Applied> {
        self.resolve_player(actor)?;

        if self.store.message_exists(&plext.guid)? {
            return Ok(Applied::Message { persisted: false });
        }

        let message = NewMessage {
            guid: plext.guid.clone(),
            text: plext
                .text
                .chars()
                .take(self.policy.message_max_chars)
                .collect(),
            player: actor.id.clone(),
            team: actor.team.code().to_string(),
            timestamp_ms: plext.timestamp_ms,
            is_secure: plext.secure,
        };

        if !self.policy.persist_messages {
            debug!(guid = %message.guid, player = %message.player, "message not persisted");
            return Ok(Applied::Message { persisted: false });
        }

        let persisted = self.store.insert_message(&message)?;
        Ok(Applied::Message { persisted })
    }

    /// Look up a portal by coordinates, creating it on first sight. An
    /// existing portal takes the team reported by the record.
    fn resolve_portal(&self, portal: &PortalRef) -> Result<PortalRow> {
        match self.store.get_portal(portal.lat_e6, portal.lng_e6)? {
            Some(mut row) => {
                if row.team != portal.team.code() {
                    row.team = portal.team.code().to_string();
                    self.store.update_portal(&row)?;
                }
                Ok(row)
            }
            None => self.store.insert_portal(portal),
        }
    }

    /// First-seen team sticks unless `update_player_team` is set
    fn resolve_player(&self, actor: &Actor) -> Result<PlayerRow> {
        match self.store.get_player(&actor.id)? {
            Some(mut row) => {
                if self.policy.update_player_team && row.team != actor.team.code() {
                    self.store.set_player_team(&actor.id, actor.team)?;
                    row.team = actor.team.code().to_string();
                }
                Ok(row)
            }
            None => self.store.insert_player(&actor.id, actor.team),
        }
    }
}

fn origin_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}
