//! Stay commands: add, edit, delete, show and list.

use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use hut_core::{
    CounterRange, MemberId, OverlapSegment, Period, SavedStay, Stay, StayDraft, StayService,
    StayStore,
};
use hut_db::Database;
use serde::Serialize;

use super::util::{
    format_cascade, format_datetime, format_hours, parse_datetime, parse_member, parse_stay_id,
};
use crate::{EditArgs, StayArgs};

/// A stay with the segments it owns, for JSON output.
#[derive(Debug, Serialize)]
pub struct StayDetail {
    pub stay: Stay,
    pub segments: Vec<OverlapSegment>,
}

fn draft_from_args(args: &StayArgs) -> Result<StayDraft> {
    Ok(StayDraft {
        id: None,
        member_id: parse_member(&args.member)?,
        period: Period::new(parse_datetime(&args.arrival)?, parse_datetime(&args.departure)?),
        counter: CounterRange::new(args.counter_start, args.counter_end),
        member_nights: args.members,
        guest_nights: args.guests,
    })
}

fn apply_changes(draft: &mut StayDraft, changes: &EditArgs) -> Result<()> {
    if let Some(member) = &changes.member {
        draft.member_id = parse_member(member)?;
    }
    if let Some(arrival) = &changes.arrival {
        draft.period.arrival = parse_datetime(arrival)?;
    }
    if let Some(departure) = &changes.departure {
        draft.period.departure = parse_datetime(departure)?;
    }
    if let Some(start) = changes.counter_start {
        draft.counter.start = start;
    }
    if let Some(end) = changes.counter_end {
        draft.counter.end = end;
    }
    if let Some(members) = changes.members {
        draft.member_nights = members;
    }
    if let Some(guests) = changes.guests {
        draft.guest_nights = guests;
    }
    Ok(())
}

/// Records a new stay.
pub fn add<W: Write>(
    writer: &mut W,
    service: &mut StayService<Database>,
    args: &StayArgs,
) -> Result<()> {
    let draft = draft_from_args(args)?;
    let saved = service
        .create_or_update_stay(draft)
        .context("stay not saved")?;
    write!(writer, "{}", format_saved(&saved)?)?;
    Ok(())
}

/// Changes fields of a stored stay.
pub fn edit<W: Write>(
    writer: &mut W,
    service: &mut StayService<Database>,
    id: &str,
    changes: &EditArgs,
) -> Result<()> {
    let id = parse_stay_id(id)?;
    let stay = service
        .store()
        .get_stay(&id)?
        .with_context(|| format!("stay not found: {id}"))?;

    let mut draft = StayDraft::editing(&stay);
    apply_changes(&mut draft, changes)?;
    let saved = service
        .create_or_update_stay(draft)
        .context("stay not saved")?;
    write!(writer, "{}", format_saved(&saved)?)?;
    Ok(())
}

/// Removes a stay.
pub fn delete<W: Write>(
    writer: &mut W,
    service: &mut StayService<Database>,
    id: &str,
) -> Result<()> {
    let id = parse_stay_id(id)?;
    let deleted = service.delete_stay(&id).context("stay not deleted")?;
    writeln!(writer, "Deleted stay {}.", deleted.stay.id)?;
    write!(writer, "{}", format_cascade(&deleted.cascade)?)?;
    Ok(())
}

/// Shows one stay.
pub fn show<W: Write>(writer: &mut W, db: &Database, id: &str, json: bool) -> Result<()> {
    let id = parse_stay_id(id)?;
    let stay = db
        .get_stay(&id)?
        .with_context(|| format!("stay not found: {id}"))?;
    let segments = db.overlap_segments(&id)?;

    if json {
        let detail = StayDetail { stay, segments };
        writeln!(writer, "{}", serde_json::to_string_pretty(&detail)?)?;
    } else {
        write!(writer, "{}", format_stay(&stay, &segments)?)?;
    }
    Ok(())
}

/// Lists stays.
pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    member: Option<&str>,
    year: Option<i32>,
    json: bool,
) -> Result<()> {
    let member: Option<MemberId> = member.map(parse_member).transpose()?;
    let stays = db
        .list_stays(member.as_ref(), year)
        .context("failed to list stays")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stays)?)?;
    } else {
        write!(writer, "{}", format_list(&stays)?)?;
    }
    Ok(())
}

pub fn format_saved(saved: &SavedStay) -> Result<String, fmt::Error> {
    let mut output = String::new();
    writeln!(output, "Stay {}.", saved.change)?;
    output.push_str(&format_stay(&saved.stay, &saved.segments)?);
    output.push_str(&format_cascade(&saved.cascade)?);
    Ok(output)
}

pub fn format_stay(stay: &Stay, segments: &[OverlapSegment]) -> Result<String, fmt::Error> {
    let mut output = String::new();
    writeln!(output, "Stay {}", stay.id)?;
    writeln!(output, "  Member:    {}", stay.member_id)?;
    writeln!(output, "  Arrival:   {}", format_datetime(stay.period.arrival))?;
    writeln!(output, "  Departure: {}", format_datetime(stay.period.departure))?;
    writeln!(
        output,
        "  Counter:   {} to {} ({} h)",
        format_hours(stay.counter.start),
        format_hours(stay.counter.end),
        format_hours(stay.raw_hours())
    )?;
    let shared = if stay.has_overlaps { " (shared)" } else { "" };
    writeln!(
        output,
        "  Billable:  {} h{shared}",
        format_hours(stay.billable_hours())
    )?;
    writeln!(
        output,
        "  Nights:    {} member, {} guest",
        stay.member_nights, stay.guest_nights
    )?;

    if !segments.is_empty() {
        writeln!(output, "  Shared segments:")?;
        for segment in segments {
            let with: Vec<&str> = segment.co_present.iter().map(|id| id.short()).collect();
            writeln!(
                output,
                "    {} to {}: {} h with {}",
                format_hours(segment.counter.start),
                format_hours(segment.counter.end),
                format_hours(segment.shared_hours),
                with.join(", ")
            )?;
        }
    }
    Ok(output)
}

pub fn format_list(stays: &[Stay]) -> Result<String, fmt::Error> {
    let mut output = String::new();
    if stays.is_empty() {
        writeln!(output, "No stays recorded.")?;
        return Ok(output);
    }

    writeln!(
        output,
        "{:<8}  {:<12}  {:<10}  {:<10}  {:>15}  {:>8}",
        "ID", "MEMBER", "ARRIVAL", "DEPARTURE", "COUNTER", "HOURS"
    )?;
    for stay in stays {
        let counter = format!(
            "{}-{}",
            format_hours(stay.counter.start),
            format_hours(stay.counter.end)
        );
        let marker = if stay.has_overlaps { "*" } else { "" };
        let hours = format!("{marker}{}", format_hours(stay.billable_hours()));
        writeln!(
            output,
            "{:<8}  {:<12}  {:<10}  {:<10}  {:>15}  {:>8}",
            stay.id.short(),
            stay.member_id.as_str(),
            stay.period.first_day(),
            stay.period.last_day(),
            counter,
            hours
        )?;
    }
    if stays.iter().any(|s| s.has_overlaps) {
        writeln!(output)?;
        writeln!(output, "* hours shared with co-present stays")?;
    }
    Ok(output)
}
