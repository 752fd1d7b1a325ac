//! Portals command implementation

use anyhow::Result;

use crate::store::StateStore;

pub fn run(store: &StateStore, team: Option<String>, limit: usize) -> Result<()> {
    let portals = store.list_portals(team.as_deref(), limit)?;

    if portals.is_empty() {
        println!("No portals found. Run 'plextwatch collect' first.");
        return Ok(());
    }

    println!(
        "{:<30} {:<5} {:<6} {:<9} {:<16} {}",
        "Name", "Team", "Level", "Captures", "Owner", "Location"
    );
    println!("{}", "-".repeat(90));

    for portal in portals {
        let name = if portal.name.chars().count() > 28 {
            format!("{}...", portal.name.chars().take(25).collect::<String>())
        } else {
            portal.name.clone()
        };

        println!(
            "{:<30} {:<5} {:<6} {:<9} {:<16} {:.6},{:.6}",
            name,
            portal.team,
            portal.level,
            portal.capture_count,
            if portal.owner.is_empty() { "-" } else { &portal.owner },
            portal.lat_e6 as f64 / 1_000_000.0,
            portal.lng_e6 as f64 / 1_000_000.0,
        );
    }

    Ok(())
}
