// src/payslip.rs
//
// The system of record for computed payslips: the `MM/YYYY` period key, the
// full per-period record, and the upsert-by-key ledger.

use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::employee::EmployeeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid salary period '{0}', expected MM/YYYY")]
pub struct PeriodParseError(pub String);

/// One pay period, keyed as `MM/YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn new(month: u32, year: i32) -> Result<Self, PeriodParseError> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return Err(PeriodParseError(format!("{month:02}/{year}")));
        }
        Ok(Self { year, month })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl FromStr for PeriodKey {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PeriodParseError(s.to_string());
        let (month, year) = s.trim().split_once('/').ok_or_else(err)?;
        let month: u32 = month.trim().parse().map_err(|_| err())?;
        let year: i32 = year.trim().parse().map_err(|_| err())?;
        PeriodKey::new(month, year).map_err(|_| err())
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = PeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(value: PeriodKey) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayslipStatus {
    Draft,
    Calculated,
}

/// Every intermediate and final amount of one payslip calculation. Field
/// semantics are explicit; nothing is overloaded onto an unrelated column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayslipComputation {
    pub base_salary: Decimal,
    pub days_worked: u32,
    pub holiday_days: u32,
    pub actual_working_hours: Decimal,
    pub monthly_salary: Decimal,

    pub leave_days: u32,
    pub paid_leave_amount: Decimal,
    pub paid_holiday_amount: Decimal,

    pub overtime_regular_hours: Decimal,
    pub overtime_weekend_hours: Decimal,
    pub overtime_holiday_hours: Decimal,
    pub overtime_regular_amount: Decimal,
    pub overtime_weekend_amount: Decimal,
    pub overtime_holiday_amount: Decimal,
    pub total_overtime_amount: Decimal,

    pub taxable_basic_salary: Decimal,

    pub years_of_service: i32,
    pub seniority_bonus_rate: Decimal,
    pub seniority_bonus_amount: Decimal,

    pub taxable_allowances: Decimal,
    pub non_taxable_allowances: Decimal,
    pub gross_salary: Decimal,
    pub gross_taxable_salary: Decimal,

    pub cnss_amount: Decimal,
    pub amo_amount: Decimal,
    pub cimr_amount: Decimal,
    pub professional_expenses_rate: Decimal,
    pub professional_expenses_amount: Decimal,

    pub net_taxable_salary: Decimal,

    pub gross_ir: Decimal,
    pub family_allowance: Decimal,
    pub net_ir: Decimal,

    pub advance_payments: Decimal,
    pub loan_deductions: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    pub net_payable: Decimal,
}

/// One employee × one pay period. Created on first calculation, overwritten
/// in place on recalculation, never deleted by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayslipRecord {
    pub employee_id: EmployeeId,
    pub period: PeriodKey,
    pub status: PayslipStatus,
    #[serde(flatten)]
    pub computation: PayslipComputation,
    pub created_by: u32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Keyed store of payslips. At most one record per (employee, period): the
/// keyed entry under the store lock is what serializes two concurrent
/// calculations of the same slip — a SQL backing would carry the same
/// guarantee as a unique constraint with find-or-create semantics.
#[derive(Default)]
pub struct PayslipLedger {
    slips: Mutex<HashMap<(EmployeeId, PeriodKey), PayslipRecord>>,
}

impl PayslipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite-or-create the slip for (employee, period). Idempotent for
    /// identical inputs; the creation marker and creating actor survive
    /// recalculation.
    pub fn upsert(
        &self,
        employee_id: EmployeeId,
        period: PeriodKey,
        computation: PayslipComputation,
        actor: u32,
    ) -> PayslipRecord {
        let now = Utc::now().naive_utc();
        let mut guard = self.slips.lock().unwrap();
        match guard.entry((employee_id, period)) {
            Entry::Occupied(mut slot) => {
                debug!(employee_id, period = %period, "updating existing payslip");
                let record = slot.get_mut();
                record.computation = computation;
                record.status = PayslipStatus::Calculated;
                record.updated_at = now;
                record.clone()
            }
            Entry::Vacant(slot) => {
                debug!(employee_id, period = %period, "creating payslip");
                slot.insert(PayslipRecord {
                    employee_id,
                    period,
                    status: PayslipStatus::Calculated,
                    computation,
                    created_by: actor,
                    created_at: now,
                    updated_at: now,
                })
                .clone()
            }
        }
    }

    pub fn records_for_period(&self, period: PeriodKey) -> Vec<PayslipRecord> {
        let mut records: Vec<PayslipRecord> = self
            .slips
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.period == period)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.employee_id);
        records
    }
}
