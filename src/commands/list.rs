// src/commands/list.rs
//! Listing build records

use super::Session;
use anyhow::Result;
use brigade::hash::short;

pub fn cmd_list(session: &Session, package: Option<&str>) -> Result<()> {
    let store = session.store()?;
    let records: Vec<_> = store
        .list()?
        .into_iter()
        .filter(|r| package.is_none_or(|p| r.name == p))
        .collect();

    if records.is_empty() {
        println!("No build records");
        return Ok(());
    }

    for record in &records {
        println!(
            "[{}]  {:<32} {:<10} {}",
            short(&record.hash),
            format!("{}@{}", record.name, record.version),
            record.status.to_string(),
            record.prefix.display()
        );
        if let Some(error) = &record.error {
            let first = error.lines().next().unwrap_or_default();
            println!("           {}", first);
        }
    }
    Ok(())
}
