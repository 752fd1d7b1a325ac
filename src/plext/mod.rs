//! Plext parsing
//!
//! A plext is one activity-feed entry. Its payload carries a display text and
//! a markup list of `[KIND, {fields}]` pairs scanned strictly left to right:
//!
//! - `PLAYER` / `SENDER` set the acting agent
//! - `SECURE` marks faction-only chat
//! - `PORTAL` sets the primary portal, or the target once linking mode is on
//! - `TEXT` fragments drive the [`Classifier`]
//!
//! Other kinds are ignored.

mod classify;

pub use classify::{ActionKind, Classifier};

use serde_json::Value;

use crate::feed::RawRecord;

/// Faction codes as stored: the first letter of the feed's team name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Resistance,
    Enlightened,
    Machina,
    Neutral,
}

impl Team {
    /// Accepts a full team name ("RESISTANCE") or a bare code ("R")
    pub fn from_name(name: &str) -> Self {
        match name.chars().next() {
            Some('R') => Team::Resistance,
            // the feed names the Enlightened "ALIENS"
            Some('E') | Some('A') => Team::Enlightened,
            Some('M') => Team::Machina,
            _ => Team::Neutral,
        }
    }

    /// Team field as it appears in markup: a string or a list whose first
    /// element is the name.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::from_name(s)),
            Value::Array(arr) => arr.first().and_then(|v| v.as_str()).map(Self::from_name),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Team::Resistance => "R",
            Team::Enlightened => "E",
            Team::Machina => "M",
            Team::Neutral => "N",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Acting agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub team: Team,
}

/// Portal as referenced by a plext. Identity is the coordinate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRef {
    pub name: String,
    pub team: Team,
    pub lat_e6: i64,
    pub lng_e6: i64,
}

/// Structured result of parsing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plext {
    pub guid: String,
    pub timestamp_ms: i64,
    pub actor: Option<Actor>,
    pub portal: Option<PortalRef>,
    pub portal_to: Option<PortalRef>,
    pub kind: Option<ActionKind>,
    pub resonator: i64,
    pub mu_points: i64,
    pub secure: bool,
    pub text: String,
}

/// Parse a raw record. Returns `None` when the record has no display text.
pub fn parse(record: &RawRecord) -> Option<Plext> {
    let plext = record.payload.get("plext");
    let text = plext.and_then(|p| p.get("text")).and_then(|t| t.as_str())?;

    let markup = plext
        .and_then(|p| p.get("markup"))
        .and_then(|m| m.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut actor = None;
    let mut portal = None;
    let mut portal_to = None;
    let mut secure = false;
    let mut classifier = Classifier::new();

    for entry in markup {
        let Some((kind, fields)) = markup_entry(entry) else {
            continue;
        };

        match kind {
            "PLAYER" => {
                if let Some(a) = parse_actor(fields, false) {
                    actor = Some(a);
                }
            }
            "SENDER" => {
                if let Some(a) = parse_actor(fields, true) {
                    actor = Some(a);
                }
            }
            "SECURE" => secure = true,
            "PORTAL" => {
                if let Some(p) = parse_portal(fields) {
                    if classifier.linking {
                        portal_to = Some(p);
                    } else {
                        portal = Some(p);
                    }
                }
            }
            "TEXT" => {
                if let Some(plain) = fields.get("plain").and_then(|v| v.as_str()) {
                    classifier.feed(plain);
                }
            }
            _ => {}
        }
    }

    Some(Plext {
        guid: record.guid.clone(),
        timestamp_ms: record.timestamp_ms,
        actor,
        portal,
        portal_to,
        kind: classifier.kind,
        resonator: classifier.resonator,
        mu_points: classifier.mana_points,
        secure,
        text: text.to_string(),
    })
}

fn markup_entry(entry: &Value) -> Option<(&str, &Value)> {
    let pair = entry.as_array()?;
    let kind = pair.first()?.as_str()?;
    let fields = pair.get(1)?;
    Some((kind, fields))
}

/// Sender ids carry routing data after the first ':'
fn parse_actor(fields: &Value, is_sender: bool) -> Option<Actor> {
    let plain = fields.get("plain")?.as_str()?;
    let team = Team::from_value(fields.get("team")?)?;
    let id = if is_sender {
        plain.split(':').next().unwrap_or(plain)
    } else {
        plain
    };
    Some(Actor {
        id: id.to_string(),
        team,
    })
}

fn parse_portal(fields: &Value) -> Option<PortalRef> {
    Some(PortalRef {
        name: fields
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        team: fields
            .get("team")
            .and_then(Team::from_value)
            .unwrap_or(Team::Neutral),
        lat_e6: fields.get("latE6")?.as_i64()?,
        lng_e6: fields.get("lngE6")?.as_i64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(markup: Value, text: &str) -> RawRecord {
        RawRecord {
            guid: "g1".to_string(),
            timestamp_ms: 1_500_000_000_000,
            payload: json!({ "plext": { "text": text, "markup": markup } }),
        }
    }

    fn portal(name: &str, lat: i64, lng: i64) -> Value {
        json!(["PORTAL", { "name": name, "team": "RESISTANCE", "latE6": lat, "lngE6": lng }])
    }

    #[test]
    fn test_missing_text_is_skipped() {
        let rec = RawRecord {
            guid: "g1".to_string(),
            timestamp_ms: 1,
            payload: json!({ "plext": { "markup": [] } }),
        };
        assert_eq!(parse(&rec), None);
    }

    #[test]
    fn test_deploy_record() {
        let rec = record(
            json!([
                ["PLAYER", { "plain": "P1", "team": "RESISTANCE" }],
                ["TEXT", { "plain": " deployed an " }],
                ["TEXT", { "plain": "L8" }],
                ["TEXT", { "plain": " Resonator on " }],
                portal("Alpha", 40_000_000, 116_000_000),
            ]),
            "P1 deployed an L8 Resonator on Alpha",
        );
        let plext = parse(&rec).unwrap();
        assert_eq!(
            plext.actor,
            Some(Actor {
                id: "P1".to_string(),
                team: Team::Resistance
            })
        );
        assert_eq!(plext.kind, Some(ActionKind::Deployed));
        assert_eq!(plext.resonator, 8);
        assert_eq!(plext.portal.unwrap().name, "Alpha");
        assert!(plext.portal_to.is_none());
        assert!(!plext.secure);
    }

    #[test]
    fn test_linking_mode_splits_portals() {
        let rec = record(
            json!([
                ["PLAYER", { "plain": "P1", "team": "ENLIGHTENED" }],
                ["TEXT", { "plain": " linked " }],
                portal("From", 1, 1),
                ["TEXT", { "plain": " to " }],
                portal("To", 2, 2),
            ]),
            "P1 linked From to To",
        );
        let plext = parse(&rec).unwrap();
        assert_eq!(plext.portal.unwrap().name, "From");
        assert_eq!(plext.portal_to.unwrap().name, "To");
        assert_eq!(plext.kind, Some(ActionKind::Linked));
    }

    #[test]
    fn test_later_portal_overwrites_primary_without_linking() {
        let rec = record(
            json!([portal("First", 1, 1), portal("Second", 2, 2)]),
            "x",
        );
        let plext = parse(&rec).unwrap();
        assert_eq!(plext.portal.unwrap().name, "Second");
        assert!(plext.portal_to.is_none());
    }

    #[test]
    fn test_field_with_mana() {
        let rec = record(
            json!([
                ["PLAYER", { "plain": "P2", "team": "ENLIGHTENED" }],
                ["TEXT", { "plain": " created a Control Field @" }],
                portal("Beta", 3, 3),
                ["TEXT", { "plain": " +" }],
                ["TEXT", { "plain": "420" }],
                ["TEXT", { "plain": " MUs" }],
            ]),
            "P2 created a Control Field @Beta +420 MUs",
        );
        let plext = parse(&rec).unwrap();
        assert_eq!(plext.kind, Some(ActionKind::Field));
        assert_eq!(plext.mu_points, 420);
        assert_eq!(plext.actor.unwrap().team, Team::Enlightened);
    }

    #[test]
    fn test_secure_sender_strips_routing() {
        let rec = record(
            json!([
                ["SECURE", { "plain": "[faction]" }],
                ["SENDER", { "plain": "P3: ", "team": "RESISTANCE" }],
                ["TEXT", { "plain": "hello" }],
            ]),
            "[faction] P3: hello",
        );
        let plext = parse(&rec).unwrap();
        assert!(plext.secure);
        assert_eq!(plext.actor.unwrap().id, "P3");
        assert!(plext.portal.is_none());
        assert!(plext.kind.is_none());
    }

    #[test]
    fn test_unknown_kinds_and_bad_entries_are_ignored() {
        let rec = record(
            json!([
                ["FACTION", { "team": "RESISTANCE" }],
                "not-a-pair",
                ["PLAYER", { "plain": "NoTeam" }],
                ["PORTAL", { "name": "NoCoords" }],
                ["TEXT", {}],
            ]),
            "noise",
        );
        let plext = parse(&rec).unwrap();
        assert!(plext.actor.is_none());
        assert!(plext.portal.is_none());
        assert!(plext.kind.is_none());
        assert_eq!(plext.text, "noise");
    }

    #[test]
    fn test_team_from_value() {
        assert_eq!(Team::from_value(&json!(["R"])), Some(Team::Resistance));
        assert_eq!(Team::from_value(&json!("ENLIGHTENED")), Some(Team::Enlightened));
        assert_eq!(Team::from_value(&json!(["ALIENS"])), Some(Team::Enlightened));
        assert_eq!(Team::from_value(&json!("NEUTRAL")), Some(Team::Neutral));
        assert_eq!(Team::from_value(&json!(3)), None);
    }
}
