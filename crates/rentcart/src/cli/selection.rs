//! Selection commands: add, remove, qty, list, clear, info

use anyhow::{bail, Context, Result};
use rentcart::{AddOutcome, ItemCandidate, ItemKey, QuantityChange};
use rentcart_ids::{EquipmentId, SerialNumber};
use std::process::ExitCode;

use super::output::{
    format_date, format_money, format_size, parse_amount, parse_when, print_json, print_table,
};
use super::Session;

#[derive(Debug)]
pub struct AddArgs {
    pub equipment_id: String,
    pub name: String,
    pub serial: Option<String>,
    pub quantity: Option<u32>,
    pub rate: String,
    pub replacement_cost: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

pub fn add(session: &mut Session, args: AddArgs) -> Result<ExitCode> {
    let mut candidate = match args.serial {
        Some(serial) => ItemCandidate::unit(args.equipment_id, args.name, serial),
        None => ItemCandidate::new(args.equipment_id, args.name),
    };
    if let Some(quantity) = args.quantity {
        candidate = candidate.quantity(quantity);
    }
    candidate = candidate
        .daily_rate(parse_amount(&args.rate).context("Invalid --rate")?)
        .replacement_cost(parse_amount(&args.replacement_cost).context("Invalid --replacement-cost")?);

    match (args.start, args.end) {
        (Some(start), Some(end)) => {
            candidate = candidate.period(parse_when(&start)?, parse_when(&end)?);
        }
        (None, None) => {}
        _ => bail!("--start and --end must be given together"),
    }

    match session.engine.add_item(candidate)? {
        AddOutcome::Inserted(key) => println!("Added {}", key),
        AddOutcome::Merged { key, quantity, .. } => println!("{} now x{}", key, quantity),
        AddOutcome::AlreadySelected(key) => println!("{} is already selected", key),
    }
    Ok(ExitCode::SUCCESS)
}

pub fn remove(session: &mut Session, equipment_id: &str, serial: Option<&str>) -> Result<ExitCode> {
    let key = parse_key(equipment_id, serial)?;
    match session.engine.remove_item(&key) {
        Some(item) => {
            println!("Removed {} ({})", key, item.name);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("{} is not in the selection", key);
            Ok(ExitCode::FAILURE)
        }
    }
}

pub fn set_quantity(
    session: &mut Session,
    equipment_id: &str,
    serial: Option<&str>,
    quantity: i64,
) -> Result<ExitCode> {
    let key = parse_key(equipment_id, serial)?;
    match session.engine.update_quantity(&key, quantity)? {
        QuantityChange::Updated { previous, current } => {
            println!("{}: {} -> {}", key, previous, current)
        }
        QuantityChange::Removed(item) => println!("Removed {} ({})", key, item.name),
    }
    Ok(ExitCode::SUCCESS)
}

pub fn list(session: &Session, json: bool) -> Result<ExitCode> {
    let engine = &session.engine;
    if json {
        print_json(&serde_json::json!({
            "scope": session.scope.to_string(),
            "items": engine.items(),
            "summary": engine.summary(),
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    if engine.is_empty() {
        println!("Selection ({}) is empty", session.scope);
        return Ok(ExitCode::SUCCESS);
    }

    let rows = engine
        .items()
        .into_iter()
        .map(|item| {
            let period = match (item.start_date, item.end_date) {
                (Some(start), Some(end)) => format!("{} - {}", format_date(start), format_date(end)),
                _ => String::new(),
            };
            vec![
                item.key().to_string(),
                item.name.clone(),
                item.quantity.to_string(),
                format_money(item.daily_rate),
                format_money(item.daily_total()),
                period,
            ]
        })
        .collect();
    print_table(&["Entry", "Name", "Qty", "Rate/day", "Total/day", "Period"], rows);

    let summary = engine.summary();
    println!(
        "{} entries, {} units, {}/day, replacement value {}",
        summary.entries,
        summary.units,
        format_money(summary.daily_total),
        format_money(summary.replacement_total)
    );
    Ok(ExitCode::SUCCESS)
}

pub fn clear(session: &mut Session) -> Result<ExitCode> {
    let count = session.engine.clear();
    println!("Cleared {} entries from {}", count, session.scope);
    Ok(ExitCode::SUCCESS)
}

pub fn info(session: &Session, json: bool) -> Result<ExitCode> {
    let Some(info) = session.engine.storage_info() else {
        println!("Persistence is disabled for this preset");
        return Ok(ExitCode::SUCCESS);
    };
    if json {
        print_json(&info)?;
        return Ok(ExitCode::SUCCESS);
    }

    print_table(
        &["Field", "Value"],
        vec![
            vec!["Key".to_string(), info.key.clone()],
            vec!["Available".to_string(), info.available.to_string()],
            vec!["Record size".to_string(), format_size(info.record_bytes)],
            vec!["Records".to_string(), info.record_count.to_string()],
            vec!["Total size".to_string(), format_size(info.total_bytes)],
            vec!["Limit".to_string(), format_size(info.max_bytes)],
            vec!["Usage".to_string(), format!("{:.1}%", info.usage_percent)],
        ],
    );
    Ok(ExitCode::SUCCESS)
}

fn parse_key(equipment_id: &str, serial: Option<&str>) -> Result<ItemKey> {
    let equipment_id = EquipmentId::parse(equipment_id).context("Invalid equipment id")?;
    Ok(match serial {
        Some(serial) => ItemKey::unit(
            equipment_id,
            SerialNumber::parse(serial).context("Invalid serial number")?,
        ),
        None => ItemKey::fungible(equipment_id),
    })
}
