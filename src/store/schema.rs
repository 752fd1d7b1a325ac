//! SQLite schema definition
//!
//! Nothing here is ever deleted by the collector; all writes are inserts or
//! in-place updates keyed as below.

pub const SCHEMA: &str = r#"
-- ============================================
-- PORTALS
-- ============================================

-- Identity is the coordinate pair; guid is an incidental unique id that
-- actions reference.
CREATE TABLE IF NOT EXISTS portals (
    lat_e6 INTEGER NOT NULL,
    lng_e6 INTEGER NOT NULL,
    guid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    team TEXT NOT NULL,                    -- 'R', 'E', 'M', 'N'
    owner TEXT NOT NULL DEFAULT '',
    level INTEGER NOT NULL DEFAULT 0 CHECK (level BETWEEN 0 AND 8),
    capture_count INTEGER NOT NULL DEFAULT 0,
    last_captured DATETIME,
    added DATETIME DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (lat_e6, lng_e6)
);

-- ============================================
-- PLAYERS
-- ============================================

CREATE TABLE IF NOT EXISTS players (
    id TEXT PRIMARY KEY,
    team TEXT NOT NULL,                    -- first-seen team
    portal_count INTEGER NOT NULL DEFAULT 0,
    over_lv8 BOOLEAN NOT NULL DEFAULT FALSE,
    added DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- ============================================
-- ACTIONS
-- ============================================

CREATE TABLE IF NOT EXISTS actions (
    guid TEXT PRIMARY KEY,
    player_id TEXT NOT NULL,
    name TEXT NOT NULL,                    -- 'destroyed', 'captured', 'field', ...
    resonator INTEGER NOT NULL DEFAULT 0,
    portal_guid TEXT,
    portal_to_guid TEXT,
    timestamp INTEGER NOT NULL,            -- origin time, epoch ms
    added DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY(player_id) REFERENCES players(id),
    FOREIGN KEY(portal_guid) REFERENCES portals(guid),
    FOREIGN KEY(portal_to_guid) REFERENCES portals(guid)
);

-- ============================================
-- MU (mana accrued by control fields)
-- ============================================

CREATE TABLE IF NOT EXISTS mu (
    guid TEXT PRIMARY KEY,
    player_id TEXT NOT NULL,
    points INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    team TEXT NOT NULL,
    added DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY(player_id) REFERENCES players(id)
);

-- ============================================
-- MESSAGES (chat, written only when enabled)
-- ============================================

CREATE TABLE IF NOT EXISTS messages (
    guid TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    player TEXT NOT NULL DEFAULT '',
    team TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    is_secure BOOLEAN NOT NULL DEFAULT FALSE,
    added DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_portals_team ON portals(team);
CREATE INDEX IF NOT EXISTS idx_players_team ON players(team);
CREATE INDEX IF NOT EXISTS idx_actions_timestamp ON actions(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_actions_player ON actions(player_id);
CREATE INDEX IF NOT EXISTS idx_mu_team ON mu(team);
"#;
