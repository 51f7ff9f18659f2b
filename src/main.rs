// src/main.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod attendance;
mod clock;
mod config;
mod employee;
mod payroll;
mod payroll_tests;
mod payslip;
mod tables;

use clock::{Clock, FixedClock, SystemClock};
use config::Config;
use employee::{AdvanceBook, EmployeeDirectory, RetirementLog};
use payroll::{AttendanceFacts, OvertimeFacts, PayrollCalculator, PeriodFacts};
use payslip::{PayslipLedger, PeriodKey};
use tables::STANDARD_WORKING_DAYS;

#[derive(Parser)]
#[command(
    name = "paie-core",
    version,
    about = "Moroccan labor-law payroll engine: attendance reconciliation and payslip calculation"
)]
struct Cli {
    /// CSV roster of employee salary profiles
    #[arg(long, global = true)]
    employees: Option<PathBuf>,

    /// CSV of employee cash advances
    #[arg(long, global = true)]
    advances: Option<PathBuf>,

    /// Pin "today" for reproducible runs (YYYY-MM-DD)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile a clock-device export against the roster
    Reconcile {
        /// Clock export CSV
        #[arg(long)]
        events: PathBuf,

        /// Restrict to one MM/YYYY period; an unparseable value processes
        /// all dates
        #[arg(long)]
        month: Option<String>,
    },

    /// Calculate one employee's payslip for a period
    Calculate {
        #[arg(long)]
        employee: u32,

        /// Salary period, MM/YYYY
        #[arg(long)]
        month: String,

        /// Actor recorded on the ledger write
        #[arg(long)]
        actor: u32,

        #[arg(long)]
        days_worked: Option<u32>,

        #[arg(long, default_value_t = 0)]
        holiday_days: u32,

        #[arg(long, default_value_t = 0)]
        leave_days: u32,

        /// Paid public holidays in the period
        #[arg(long, default_value_t = 0)]
        paid_holidays: u32,

        #[arg(long)]
        worked_on_holidays: bool,

        #[arg(long, default_value_t = Decimal::ZERO)]
        overtime_regular: Decimal,

        #[arg(long, default_value_t = Decimal::ZERO)]
        overtime_weekend: Decimal,

        #[arg(long, default_value_t = Decimal::ZERO)]
        overtime_holiday: Decimal,
    },

    /// Run payroll for every active employee
    Batch {
        /// Salary period, MM/YYYY
        #[arg(long)]
        month: String,

        /// Actor recorded on the ledger writes
        #[arg(long)]
        actor: u32,

        /// Clock export to reconcile into per-employee attendance facts
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to read PAIE_* configuration")?;

    let directory = Arc::new(EmployeeDirectory::new());
    if let Some(path) = cli.employees.as_ref().or(config.employees_file.as_ref()) {
        directory.load_csv(path)?;
    }
    let advances = Arc::new(AdvanceBook::new());
    if let Some(path) = cli.advances.as_ref().or(config.advances_file.as_ref()) {
        advances.load_csv(path)?;
    }

    let clock: Arc<dyn Clock> = match cli.as_of {
        Some(date) => Arc::new(FixedClock::new(date)),
        None => Arc::new(SystemClock),
    };
    let ledger = Arc::new(PayslipLedger::new());
    let retirements = Arc::new(RetirementLog::new());
    let calculator = PayrollCalculator::new(
        directory.clone(),
        advances,
        ledger.clone(),
        retirements.clone(),
        clock,
        config.retirement_policy(),
    );

    match cli.command {
        Command::Reconcile { events, month } => {
            let period = parse_optional_period(month.as_deref());
            let rows = attendance::load_clock_file(&events)?;
            let report = attendance::reconcile(rows, &directory, period.as_ref());
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Calculate {
            employee,
            month,
            actor,
            days_worked,
            holiday_days,
            leave_days,
            paid_holidays,
            worked_on_holidays,
            overtime_regular,
            overtime_weekend,
            overtime_holiday,
        } => {
            let period: PeriodKey = month
                .parse()
                .with_context(|| format!("Invalid --month value '{month}'"))?;

            let attendance_facts = (days_worked.is_some() || holiday_days > 0).then(|| {
                AttendanceFacts {
                    days_worked: days_worked.unwrap_or(STANDARD_WORKING_DAYS),
                    holiday_days,
                }
            });
            let leave_facts = (leave_days > 0 || paid_holidays > 0).then(|| payroll::LeaveFacts {
                approved_leave_days: leave_days,
                holiday_days: paid_holidays,
                worked_on_holidays,
            });
            let overtime_facts = (overtime_regular > Decimal::ZERO
                || overtime_weekend > Decimal::ZERO
                || overtime_holiday > Decimal::ZERO)
                .then(|| OvertimeFacts {
                    regular_hours: overtime_regular,
                    weekend_hours: overtime_weekend,
                    holiday_hours: overtime_holiday,
                });
            let facts = PeriodFacts {
                attendance: attendance_facts,
                leave: leave_facts,
                overtime: overtime_facts,
            };

            let record = calculator.calculate(employee, period, &facts, actor)?;
            let output = serde_json::json!({
                "payslip": record,
                "retirement_events": retirements.events_for(employee),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Batch {
            month,
            actor,
            events,
        } => {
            let period: PeriodKey = month
                .parse()
                .with_context(|| format!("Invalid --month value '{month}'"))?;

            let mut facts_by_employee: HashMap<u32, PeriodFacts> = HashMap::new();
            if let Some(events) = events {
                let rows = attendance::load_clock_file(&events)?;
                let report = attendance::reconcile(rows, &directory, Some(&period));
                for (employee_id, aggregate) in report.facts_by_employee() {
                    // Reconciled overtime carries no weekend/holiday split,
                    // so it is billed at the regular premium
                    facts_by_employee.insert(
                        employee_id,
                        PeriodFacts {
                            attendance: Some(AttendanceFacts {
                                days_worked: aggregate.days_worked,
                                holiday_days: 0,
                            }),
                            overtime: Some(OvertimeFacts {
                                regular_hours: aggregate.overtime_hours,
                                ..OvertimeFacts::default()
                            }),
                            ..PeriodFacts::default()
                        },
                    );
                }
            }

            let summary = calculator.run_batch(period, &facts_by_employee, actor);
            let output = serde_json::json!({
                "summary": summary,
                "payslips": ledger.records_for_period(period),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Parse an optional `MM/YYYY` filter. This is a non-strict context: a bad
/// value logs a warning and the data stays unfiltered.
fn parse_optional_period(month: Option<&str>) -> Option<PeriodKey> {
    let month = month?;
    match month.parse::<PeriodKey>() {
        Ok(period) => Some(period),
        Err(err) => {
            warn!(%err, "ignoring period filter, processing all dates");
            None
        }
    }
}
