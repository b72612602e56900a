//! Booking commands: quote and submit

use std::process::ExitCode;

use anyhow::{Context, Result};
use rentcart::{
    BookingError, BookingRequest, BookingSubmitter, HttpBookingBackend, Quote, RentcartConfig,
};
use rentcart_ids::ClientId;
use tracing::info;

use super::output::{format_date, format_days, format_money, parse_when, print_json, print_table};
use super::Session;

#[derive(Debug)]
pub struct SubmitArgs {
    pub client: String,
    pub start: String,
    pub end: String,
    pub check_availability: bool,
    pub json: bool,
}

pub fn quote(session: &Session, start: &str, end: &str, json: bool) -> Result<ExitCode> {
    let request = BookingRequest {
        start_date: Some(parse_when(start)?),
        end_date: Some(parse_when(end)?),
        ..BookingRequest::default()
    };
    let quote = rentcart::booking::preview(&session.engine, &request)?;

    if json {
        print_json(&quote)?;
    } else {
        print_quote(&quote);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn submit(
    session: &mut Session,
    config: &RentcartConfig,
    args: SubmitArgs,
) -> Result<ExitCode> {
    let client_id = ClientId::parse(&args.client).context("Invalid --client")?;
    let start = parse_when(&args.start)?;
    let end = parse_when(&args.end)?;
    let mut request =
        BookingRequest::new(client_id, start, end).check_availability(args.check_availability);
    if let Some(project) = session.scope.project() {
        request = request.project(project.clone());
    }

    let backend = HttpBookingBackend::new(&config.api_base_url)?;
    let mut submitter = BookingSubmitter::with_config(backend, config.submitter_config());
    info!(api = %config.api_base_url, scope = %session.scope, "Submitting selection");

    match submitter.submit(&mut session.engine, &request).await {
        Ok(report) => {
            if args.json {
                print_json(&report)?;
            } else {
                print_quote(&report.quote);
                println!(
                    "Booked: {} created, {} failed (run {})",
                    report.created_count, report.failed_count, report.run_id
                );
                if let Some(message) = &report.message {
                    println!("{}", message);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(BookingError::AvailabilityConflict { items }) => {
            eprintln!("Not booked: {} entries are unavailable", items.len());
            let rows = items
                .iter()
                .map(|u| {
                    vec![
                        u.equipment_id.clone(),
                        u.name.clone(),
                        u.requested.to_string(),
                        u.available.to_string(),
                    ]
                })
                .collect();
            print_table(&["Equipment", "Name", "Requested", "Available"], rows);
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).context("Booking failed; the selection was kept"),
    }
}

fn print_quote(quote: &Quote) {
    let rows = quote
        .lines
        .iter()
        .map(|line| {
            vec![
                line.key.to_string(),
                line.name.clone(),
                line.quantity.to_string(),
                format!("{} - {}", format_date(line.start_date), format_date(line.end_date)),
                format_days(line.duration_days),
                format_money(line.daily_rate),
                format_money(line.total_amount),
            ]
        })
        .collect();
    print_table(
        &["Entry", "Name", "Qty", "Period", "Days", "Rate/day", "Amount"],
        rows,
    );
    println!("Total: {}", format_money(quote.total_amount));
}

