//! Actions command implementation

use anyhow::Result;
use chrono::DateTime;

use crate::store::StateStore;

pub fn run(store: &StateStore, player: Option<String>, limit: usize) -> Result<()> {
    let actions = store.list_actions(player.as_deref(), limit)?;

    if actions.is_empty() {
        println!("No actions found. Run 'plextwatch collect' first.");
        return Ok(());
    }

    println!(
        "{:<17} {:<16} {:<5} {:<10} {:<4} {}",
        "Time (UTC)", "Player", "Team", "Action", "Res", "Portal"
    );
    println!("{}", "-".repeat(90));

    for action in actions {
        let time = DateTime::from_timestamp_millis(action.timestamp_ms)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        let resonator = if action.resonator > 0 {
            format!("L{}", action.resonator)
        } else {
            "-".to_string()
        };

        let portal = match (&action.portal_name, &action.portal_to_name) {
            (Some(from), Some(to)) => format!("{} -> {}", from, to),
            (Some(from), None) => from.clone(),
            _ => "-".to_string(),
        };

        println!(
            "{:<17} {:<16} {:<5} {:<10} {:<4} {}",
            time, action.player_id, action.team, action.name, resonator, portal,
        );
    }

    Ok(())
}
