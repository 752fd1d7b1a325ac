//! Action classification from TEXT markup fragments
//!
//! The feed describes each action in loose English split across several
//! fragments. Fragments are matched against an ordered rule list; the first
//! rule that matches decides what the fragment means. Order matters because
//! several phrases overlap ("destroyed an" / "destroyed a Control Field").

/// Closed set of actions recorded against portals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Destroyed,
    Unfield,
    Unlinked,
    Deployed,
    Captured,
    Field,
    Linked,
    Unknown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Destroyed => "destroyed",
            ActionKind::Unfield => "unfield",
            ActionKind::Unlinked => "unlinked",
            ActionKind::Deployed => "deployed",
            ActionKind::Captured => "captured",
            ActionKind::Field => "field",
            ActionKind::Linked => "linked",
            ActionKind::Unknown => "unknown",
        }
    }

    #[cfg(test)]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "destroyed" => Some(ActionKind::Destroyed),
            "unfield" => Some(ActionKind::Unfield),
            "unlinked" => Some(ActionKind::Unlinked),
            "deployed" => Some(ActionKind::Deployed),
            "captured" => Some(ActionKind::Captured),
            "field" => Some(ActionKind::Field),
            "linked" => Some(ActionKind::Linked),
            "unknown" => Some(ActionKind::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Contains(&'static str),
    Exact(&'static str),
    /// Purely numeric fragment while accumulating mana
    ManaDigits,
    /// Compact level tag such as "L8"
    LevelTag,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Kind(ActionKind),
    EnterLinking,
    EnterMana,
    ManaPoints,
    Resonator,
}

const RULES: &[(Pattern, Outcome)] = &[
    (Pattern::Contains("destroyed an"), Outcome::Kind(ActionKind::Destroyed)),
    (Pattern::Contains("destroyed a Control Field"), Outcome::Kind(ActionKind::Unfield)),
    (Pattern::Contains("destroyed the Link"), Outcome::Kind(ActionKind::Unlinked)),
    (Pattern::Contains("deployed an"), Outcome::Kind(ActionKind::Deployed)),
    (Pattern::Contains("captured"), Outcome::Kind(ActionKind::Captured)),
    (Pattern::Contains("created a Control"), Outcome::Kind(ActionKind::Field)),
    (Pattern::Contains("linked"), Outcome::Kind(ActionKind::Linked)),
    (Pattern::Exact(" to "), Outcome::EnterLinking),
    (Pattern::Exact(" +"), Outcome::EnterMana),
    (Pattern::ManaDigits, Outcome::ManaPoints),
    (Pattern::LevelTag, Outcome::Resonator),
];

/// Classification state for one record. Never shared across records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    pub kind: Option<ActionKind>,
    /// Set once " to " is seen; later PORTAL entries are link/field targets
    pub linking: bool,
    /// Set once " +" is seen; a following number is the mana total
    pub adding_mana: bool,
    pub mana_points: i64,
    pub resonator: i64,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one TEXT fragment
    pub fn feed(&mut self, plain: &str) {
        let Some((_, outcome)) = RULES.iter().find(|(pattern, _)| self.matches(*pattern, plain))
        else {
            return;
        };

        match *outcome {
            Outcome::Kind(kind) => self.kind = Some(kind),
            Outcome::EnterLinking => self.linking = true,
            Outcome::EnterMana => self.adding_mana = true,
            Outcome::ManaPoints => {
                if let Ok(points) = plain.parse::<i64>() {
                    self.mana_points = points;
                }
            }
            Outcome::Resonator => {
                if let Ok(level) = plain.trim().replace('L', "").parse::<i64>() {
                    self.resonator = level;
                }
            }
        }
    }

    fn matches(&self, pattern: Pattern, plain: &str) -> bool {
        match pattern {
            Pattern::Contains(needle) => plain.contains(needle),
            Pattern::Exact(expected) => plain == expected,
            Pattern::ManaDigits => {
                self.adding_mana && !plain.is_empty() && plain.chars().all(|c| c.is_ascii_digit())
            }
            Pattern::LevelTag => plain.chars().count() <= 3 && plain.contains('L'),
        }
    }
}
