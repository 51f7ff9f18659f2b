// src/attendance.rs
//
// Attendance reconciliation: raw clock-device rows → per-day worked-hours
// summaries → monthly aggregates, plus identity resolution against the
// employee directory. The clock export is the usual badge-machine CSV with
// French column headers; rows that cannot be timestamped are skipped.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::employee::{EmployeeDirectory, EmployeeId};
use crate::payslip::PeriodKey;
use crate::tables::round_amount;

/// A day longer than this gets the fixed lunch break deducted.
const BREAK_THRESHOLD_HOURS: Decimal = dec!(6);
const LUNCH_BREAK_HOURS: Decimal = dec!(1);
/// Standard day length used to derive overtime from monthly totals.
const STANDARD_DAILY_HOURS: Decimal = dec!(8);

const SECONDS_PER_HOUR: Decimal = dec!(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockDirection {
    In,
    Out,
}

impl ClockDirection {
    /// Case-insensitive substring match on the device's status tag. The
    /// device firmware writes variants like "C/In", "Check-In", "OverTime
    /// Out"; "in" is tried first, mirroring how the exports are read.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.to_lowercase();
        if tag.contains("in") {
            Some(ClockDirection::In)
        } else if tag.contains("out") {
            Some(ClockDirection::Out)
        } else {
            None
        }
    }
}

/// One clock action, already timestamped and classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceEvent {
    pub timestamp: NaiveDateTime,
    pub direction: ClockDirection,
    pub device: String,
}

/// Raw identity carried by the clock export, before database matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceIdentity {
    pub name: String,
    pub card_number: String,
}

/// One row of the badge-machine export.
#[derive(Debug, Deserialize)]
struct RawClockRow {
    #[serde(rename = "Time", default)]
    time: String,
    #[serde(rename = "Prénom", default)]
    first_name: String,
    #[serde(rename = "Last Name", default)]
    last_name: String,
    #[serde(rename = "Nombre du personnel", default)]
    personnel_name: String,
    #[serde(rename = "Numéro de carte", default)]
    card_number: String,
    #[serde(rename = "In / Out Status", default)]
    in_out_status: String,
    #[serde(rename = "Device", default)]
    device: String,
}

impl RawClockRow {
    fn identity(&self) -> SourceIdentity {
        let mut name = format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string();
        if name.is_empty() {
            name = self.personnel_name.trim().to_string();
        }
        SourceIdentity {
            name,
            card_number: self.card_number.trim().to_string(),
        }
    }

    fn timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.time.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M:%S"))
            .ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub first_in: NaiveDateTime,
    pub last_out: NaiveDateTime,
    /// Hours after break deduction, unrounded.
    pub worked_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct MonthlyAggregate {
    pub days_worked: u32,
    pub total_hours: Decimal,
    pub overtime_hours: Decimal,
}

/// Parse a clock export, keeping only rows with a usable timestamp and
/// direction tag.
pub fn read_clock_rows<R: io::Read>(reader: R) -> Result<Vec<(SourceIdentity, AttendanceEvent)>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut events = Vec::new();
    let mut skipped = 0usize;

    for row in rdr.deserialize::<RawClockRow>() {
        let row = row.context("Malformed clock export row")?;
        let Some(timestamp) = row.timestamp() else {
            skipped += 1;
            continue;
        };
        let Some(direction) = ClockDirection::parse(&row.in_out_status) else {
            skipped += 1;
            continue;
        };
        events.push((
            row.identity(),
            AttendanceEvent {
                timestamp,
                direction,
                device: row.device.trim().to_string(),
            },
        ));
    }

    if skipped > 0 {
        debug!(skipped, "clock rows without usable timestamp/direction skipped");
    }
    Ok(events)
}

pub fn load_clock_file(path: &Path) -> Result<Vec<(SourceIdentity, AttendanceEvent)>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open clock export {}", path.display()))?;
    let events = read_clock_rows(file)?;
    info!(count = events.len(), path = %path.display(), "clock export loaded");
    Ok(events)
}

fn in_period(timestamp: NaiveDateTime, period: &PeriodKey) -> bool {
    timestamp.date().month() == period.month() && timestamp.date().year() == period.year()
}

/// Collapse one employee's events for one calendar day. A day needs at least
/// one in and one out; hours run from the earliest in to the latest out, with
/// the lunch break deducted past the threshold. Days that net out to zero or
/// less are discarded.
fn summarize_day(date: NaiveDate, events: &[&AttendanceEvent]) -> Option<DailySummary> {
    let first_in = events
        .iter()
        .filter(|e| e.direction == ClockDirection::In)
        .map(|e| e.timestamp)
        .min()?;
    let last_out = events
        .iter()
        .filter(|e| e.direction == ClockDirection::Out)
        .map(|e| e.timestamp)
        .max()?;

    let seconds = (last_out - first_in).num_seconds();
    let mut worked_hours = Decimal::from(seconds) / SECONDS_PER_HOUR;
    if worked_hours > BREAK_THRESHOLD_HOURS {
        worked_hours -= LUNCH_BREAK_HOURS;
    }
    if worked_hours <= Decimal::ZERO {
        return None;
    }

    Some(DailySummary {
        date,
        first_in,
        last_out,
        worked_hours,
    })
}

/// Per-day summaries for one employee's events, ordered by date.
pub fn daily_summaries(events: &[AttendanceEvent]) -> Vec<DailySummary> {
    let mut by_date: HashMap<NaiveDate, Vec<&AttendanceEvent>> = HashMap::new();
    for event in events {
        by_date.entry(event.timestamp.date()).or_default().push(event);
    }

    let mut summaries: Vec<DailySummary> = by_date
        .into_iter()
        .filter_map(|(date, day_events)| summarize_day(date, &day_events))
        .collect();
    summaries.sort_by_key(|s| s.date);
    summaries
}

/// Monthly aggregate over one employee's events. Overtime is the excess of
/// the total over `days_worked × 8`, never negative.
pub fn monthly_aggregate(events: &[AttendanceEvent]) -> MonthlyAggregate {
    let summaries = daily_summaries(events);
    let days_worked = summaries.len() as u32;
    let raw_total: Decimal = summaries.iter().map(|s| s.worked_hours).sum();
    let total_hours = round_amount(raw_total);

    let standard = STANDARD_DAILY_HOURS * Decimal::from(days_worked);
    let overtime_hours = if raw_total > standard {
        round_amount(raw_total - standard)
    } else {
        Decimal::ZERO
    };

    MonthlyAggregate {
        days_worked,
        total_hours,
        overtime_hours,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedAttendance {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub attendance_name: String,
    pub card_number: String,
    pub aggregate: MonthlyAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedIdentity {
    pub name: String,
    pub card_number: String,
    pub aggregate: MonthlyAggregate,
}

/// Outcome of one reconciliation pass. Unmatched identities are reported,
/// not dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub total_identities: usize,
    pub matched: Vec<MatchedAttendance>,
    pub unmatched: Vec<UnmatchedIdentity>,
}

impl ReconciliationReport {
    /// Aggregates keyed by resolved employee, ready to feed the calculator.
    pub fn facts_by_employee(&self) -> HashMap<EmployeeId, MonthlyAggregate> {
        self.matched
            .iter()
            .map(|m| (m.employee_id, m.aggregate.clone()))
            .collect()
    }
}

/// Reconcile a clock export against the directory for an optional period.
pub fn reconcile(
    rows: Vec<(SourceIdentity, AttendanceEvent)>,
    directory: &EmployeeDirectory,
    period: Option<&PeriodKey>,
) -> ReconciliationReport {
    let mut by_identity: HashMap<SourceIdentity, Vec<AttendanceEvent>> = HashMap::new();
    for (identity, event) in rows {
        if let Some(period) = period {
            if !in_period(event.timestamp, period) {
                continue;
            }
        }
        by_identity.entry(identity).or_default().push(event);
    }

    let total_identities = by_identity.len();
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for (identity, events) in by_identity {
        let aggregate = monthly_aggregate(&events);
        match directory.match_identity(&identity.name, &identity.card_number) {
            Some(employee) => matched.push(MatchedAttendance {
                employee_id: employee.id,
                employee_name: employee.name,
                attendance_name: identity.name,
                card_number: identity.card_number,
                aggregate,
            }),
            None => {
                debug!(name = %identity.name, card = %identity.card_number, "unmatched clock identity");
                unmatched.push(UnmatchedIdentity {
                    name: identity.name,
                    card_number: identity.card_number,
                    aggregate,
                });
            }
        }
    }

    matched.sort_by_key(|m| m.employee_id);
    unmatched.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        total_identities,
        matched = matched.len(),
        unmatched = unmatched.len(),
        "attendance reconciliation finished"
    );

    ReconciliationReport {
        total_identities,
        matched,
        unmatched,
    }
}
