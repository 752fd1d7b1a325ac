//! Players command implementation

use anyhow::Result;

use crate::store::StateStore;

pub fn run(store: &StateStore, over_lv8: bool) -> Result<()> {
    let players = store.list_players(over_lv8)?;

    if players.is_empty() {
        println!("No players found.");
        return Ok(());
    }

    println!("{:<20} {:<5} {}", "Player", "Team", "L8");
    println!("{}", "-".repeat(32));
    for p in players {
        println!(
            "{:<20} {:<5} {}",
            p.id,
            p.team,
            if p.over_lv8 { "yes" } else { "" }
        );
    }
    Ok(())
}
