//! Stats command implementation

use anyhow::Result;

use crate::store::StateStore;

pub fn run(store: &StateStore) -> Result<()> {
    let counts = store.counts()?;

    println!("Portals:  {}", counts.portals);
    println!("Players:  {}", counts.players);
    println!("Actions:  {}", counts.actions);
    println!("Fields:   {}", counts.mu);
    println!("Messages: {}", counts.messages);

    match store.latest_action_timestamp()? {
        Some(ts) => println!("Newest action at {} ms", ts),
        None => println!("No actions recorded yet"),
    }

    let totals = store.mu_totals()?;
    if !totals.is_empty() {
        println!("\nMU by team:");
        for (team, points) in totals {
            println!("  {:<3} {}", team, points);
        }
    }

    Ok(())
}
