// src/payroll.rs
//
// The payroll calculator: one complete payslip per (employee, period) from
// the salary profile plus the period's attendance/leave/overtime facts.
// Every monetary stage result is rounded to 2 decimal places half-up before
// it feeds the next stage.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::employee::{AdvanceBook, Employee, EmployeeDirectory, EmployeeId, RetirementLog};
use crate::payslip::{PayslipComputation, PayslipLedger, PayslipRecord, PeriodKey, PeriodParseError};
use crate::tables::{
    amo_contribution, cimr_contribution, cnss_contribution, gross_income_tax,
    professional_expense_rate, round_amount, seniority_rate, years_of_service,
    FAMILY_ALLOWANCE_UNIT, HOURS_PER_WORKING_DAY, OVERTIME_HOLIDAY, OVERTIME_REGULAR,
    OVERTIME_WEEKEND, STANDARD_MONTHLY_HOURS, STANDARD_WORKING_DAYS,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayrollError {
    #[error("Employee {0} not found")]
    EmployeeNotFound(EmployeeId),
    #[error(transparent)]
    InvalidPeriod(#[from] PeriodParseError),
    #[error("Invalid calculation input: {0}")]
    InvalidInput(String),
}

/// Attendance facts for the period. Absent facts default to a full standard
/// month (26 days, no holidays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceFacts {
    pub days_worked: u32,
    pub holiday_days: u32,
}

impl Default for AttendanceFacts {
    fn default() -> Self {
        Self {
            days_worked: STANDARD_WORKING_DAYS,
            holiday_days: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaveFacts {
    pub approved_leave_days: u32,
    pub holiday_days: u32,
    pub worked_on_holidays: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OvertimeFacts {
    pub regular_hours: Decimal,
    pub weekend_hours: Decimal,
    pub holiday_hours: Decimal,
}

/// All period inputs for one employee's calculation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeriodFacts {
    pub attendance: Option<AttendanceFacts>,
    pub leave: Option<LeaveFacts>,
    pub overtime: Option<OvertimeFacts>,
}

/// Fixed retirement age and how far ahead of the retirement date an event is
/// raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetirementPolicy {
    pub age_years: u32,
    pub lookahead_days: i64,
}

impl Default for RetirementPolicy {
    fn default() -> Self {
        Self {
            age_years: 60,
            lookahead_days: 60,
        }
    }
}

/// Retirement date: birth date shifted by the retirement age, same
/// month/day. A Feb 29 birth date rolls forward to Mar 1.
pub fn retirement_date(date_of_birth: NaiveDate, age_years: u32) -> NaiveDate {
    let year = date_of_birth.year() + age_years as i32;
    NaiveDate::from_ymd_opt(year, date_of_birth.month(), date_of_birth.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 3, 1).expect("March 1 is always valid"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub error: String,
}

/// Partial-success summary of a payroll run. One employee's failure never
/// aborts the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: u32,
    pub failures: Vec<BatchFailure>,
}

pub struct PayrollCalculator {
    directory: Arc<EmployeeDirectory>,
    advances: Arc<AdvanceBook>,
    ledger: Arc<PayslipLedger>,
    retirements: Arc<RetirementLog>,
    clock: Arc<dyn Clock>,
    retirement: RetirementPolicy,
}

impl PayrollCalculator {
    pub fn new(
        directory: Arc<EmployeeDirectory>,
        advances: Arc<AdvanceBook>,
        ledger: Arc<PayslipLedger>,
        retirements: Arc<RetirementLog>,
        clock: Arc<dyn Clock>,
        retirement: RetirementPolicy,
    ) -> Self {
        Self {
            directory,
            advances,
            ledger,
            retirements,
            clock,
            retirement,
        }
    }

    fn validate(employee: &Employee, facts: &PeriodFacts) -> Result<(), PayrollError> {
        if employee.base_salary < Decimal::ZERO {
            return Err(PayrollError::InvalidInput(format!(
                "negative base salary for {}",
                employee.name
            )));
        }
        if let Some(attendance) = facts.attendance {
            if attendance.holiday_days > attendance.days_worked {
                return Err(PayrollError::InvalidInput(format!(
                    "holiday days ({}) exceed days worked ({})",
                    attendance.holiday_days, attendance.days_worked
                )));
            }
        }
        if let Some(overtime) = facts.overtime {
            if overtime.regular_hours < Decimal::ZERO
                || overtime.weekend_hours < Decimal::ZERO
                || overtime.holiday_hours < Decimal::ZERO
            {
                return Err(PayrollError::InvalidInput(
                    "negative overtime hours".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Run the full pipeline for one employee. Pure with respect to stores:
    /// nothing is written here.
    pub fn compute(
        &self,
        employee: &Employee,
        facts: &PeriodFacts,
    ) -> Result<PayslipComputation, PayrollError> {
        Self::validate(employee, facts)?;

        let today = self.clock.today();
        let base_salary = employee.base_salary;
        let hourly_rate = base_salary / STANDARD_MONTHLY_HOURS;

        // 1. Basic salary from attendance
        let attendance = facts.attendance.unwrap_or_default();
        let effective_days = attendance.days_worked - attendance.holiday_days;
        let actual_working_hours = Decimal::from(effective_days) * HOURS_PER_WORKING_DAY;
        let monthly_salary = round_amount(hourly_rate * actual_working_hours);

        // 2. Paid leave and holidays
        let leave = facts.leave.unwrap_or_default();
        let day_rate = base_salary / Decimal::from(STANDARD_WORKING_DAYS);
        let paid_leave_amount = if leave.approved_leave_days > 0 {
            round_amount(Decimal::from(leave.approved_leave_days) * day_rate)
        } else {
            Decimal::ZERO
        };
        // Holiday pay is owed only when the holiday was not worked
        let paid_holiday_amount = if leave.holiday_days > 0 && !leave.worked_on_holidays {
            round_amount(Decimal::from(leave.holiday_days) * day_rate)
        } else {
            Decimal::ZERO
        };

        // 3. Overtime, three independently rated categories
        let overtime = facts.overtime.unwrap_or_default();
        let overtime_regular_amount =
            round_amount(overtime.regular_hours * hourly_rate * (Decimal::ONE + OVERTIME_REGULAR));
        let overtime_weekend_amount =
            round_amount(overtime.weekend_hours * hourly_rate * (Decimal::ONE + OVERTIME_WEEKEND));
        let overtime_holiday_amount =
            round_amount(overtime.holiday_hours * hourly_rate * (Decimal::ONE + OVERTIME_HOLIDAY));
        let total_overtime_amount =
            overtime_regular_amount + overtime_weekend_amount + overtime_holiday_amount;

        // 4. Taxable basic salary
        let taxable_basic_salary =
            monthly_salary + paid_leave_amount + paid_holiday_amount + total_overtime_amount;

        // 5. Seniority bonus
        let (service_years, seniority_bonus_rate) = match employee.hire_date {
            Some(hire_date) => {
                let years = years_of_service(hire_date, today);
                (years, seniority_rate(years))
            }
            None => (0, Decimal::ZERO),
        };
        let seniority_bonus_amount = round_amount(taxable_basic_salary * seniority_bonus_rate);

        // 6. Gross salary; allowances are extension points, currently zero
        let taxable_allowances = Decimal::ZERO;
        let non_taxable_allowances = Decimal::ZERO;
        let gross_salary =
            round_amount(taxable_basic_salary + seniority_bonus_amount + taxable_allowances);
        let gross_taxable_salary = round_amount(gross_salary - non_taxable_allowances);

        // 7. Social contributions and professional expenses
        let cnss_amount = round_amount(cnss_contribution(gross_taxable_salary));
        let amo_amount = round_amount(amo_contribution(gross_taxable_salary));
        let cimr_amount = round_amount(cimr_contribution(gross_taxable_salary));
        // The rate threshold looks at the taxable basic salary, the amount
        // applies to the gross taxable salary
        let professional_expenses_rate = professional_expense_rate(taxable_basic_salary);
        let professional_expenses_amount =
            round_amount(gross_taxable_salary * professional_expenses_rate);

        // 8. Net taxable salary
        let net_taxable_salary = round_amount(
            gross_taxable_salary
                - cnss_amount
                - amo_amount
                - cimr_amount
                - professional_expenses_amount,
        );

        // 9. Income tax, reduced by family allowances, never below zero
        let gross_ir = round_amount(gross_income_tax(net_taxable_salary));
        let mut family_allowance = Decimal::ZERO;
        if employee.marital_status.is_married() {
            family_allowance += FAMILY_ALLOWANCE_UNIT;
        }
        family_allowance += Decimal::from(employee.dependent_children) * FAMILY_ALLOWANCE_UNIT;
        let net_ir = round_amount((gross_ir - family_allowance).max(Decimal::ZERO));

        // 10. Final net
        let advance_payments = self.advances.active_total(employee.id);
        let loan_deductions = Decimal::ZERO; // extension point
        let total_deductions = round_amount(cnss_amount + amo_amount + cimr_amount + net_ir);
        let net_salary = round_amount(gross_taxable_salary - total_deductions);
        let net_payable = round_amount(net_salary - advance_payments - loan_deductions);

        Ok(PayslipComputation {
            base_salary,
            days_worked: attendance.days_worked,
            holiday_days: attendance.holiday_days,
            actual_working_hours: round_amount(actual_working_hours),
            monthly_salary,
            leave_days: leave.approved_leave_days,
            paid_leave_amount,
            paid_holiday_amount,
            overtime_regular_hours: overtime.regular_hours,
            overtime_weekend_hours: overtime.weekend_hours,
            overtime_holiday_hours: overtime.holiday_hours,
            overtime_regular_amount,
            overtime_weekend_amount,
            overtime_holiday_amount,
            total_overtime_amount,
            taxable_basic_salary,
            years_of_service: service_years,
            seniority_bonus_rate,
            seniority_bonus_amount,
            taxable_allowances,
            non_taxable_allowances,
            gross_salary,
            gross_taxable_salary,
            cnss_amount,
            amo_amount,
            cimr_amount,
            professional_expenses_rate,
            professional_expenses_amount,
            net_taxable_salary,
            gross_ir,
            family_allowance,
            net_ir,
            advance_payments,
            loan_deductions,
            total_deductions,
            net_salary,
            net_payable,
        })
    }

    /// Calculate and persist one payslip, then run the retirement check.
    /// Fails fast with no partial writes when the employee is unknown or the
    /// inputs are invalid.
    pub fn calculate(
        &self,
        employee_id: EmployeeId,
        period: PeriodKey,
        facts: &PeriodFacts,
        actor: u32,
    ) -> Result<PayslipRecord, PayrollError> {
        let employee = self
            .directory
            .get(employee_id)
            .ok_or(PayrollError::EmployeeNotFound(employee_id))?;
        let computation = self.compute(&employee, facts)?;
        let record = self.ledger.upsert(employee_id, period, computation, actor);
        self.check_retirement(&employee);
        info!(
            employee_id,
            period = %period,
            net_payable = %record.computation.net_payable,
            "payslip calculated"
        );
        Ok(record)
    }

    /// Payroll run over all active employees. Per-employee failures are
    /// collected with the employee's display name; the run always finishes.
    pub fn run_batch(
        &self,
        period: PeriodKey,
        facts_by_employee: &HashMap<EmployeeId, PeriodFacts>,
        actor: u32,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for employee in self.directory.active_employees() {
            let facts = facts_by_employee
                .get(&employee.id)
                .copied()
                .unwrap_or_default();
            match self.calculate(employee.id, period, &facts, actor) {
                Ok(_) => summary.succeeded += 1,
                Err(err) => {
                    warn!(employee_id = employee.id, error = %err, "payslip calculation failed");
                    summary.failures.push(BatchFailure {
                        employee_id: employee.id,
                        employee_name: employee.name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            period = %period,
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "payroll batch finished"
        );
        summary
    }

    fn check_retirement(&self, employee: &Employee) {
        let Some(date_of_birth) = employee.date_of_birth else {
            return;
        };
        let retirement_date = retirement_date(date_of_birth, self.retirement.age_years);
        let today = self.clock.today();
        let days_left = (retirement_date - today).num_days();
        if !(0..=self.retirement.lookahead_days).contains(&days_left) {
            return;
        }
        let notes = format!("Employee approaching retirement in {days_left} days");
        if self
            .retirements
            .record_once(employee.id, retirement_date, today, notes)
        {
            info!(
                employee_id = employee.id,
                %retirement_date,
                days_left,
                "retirement event recorded"
            );
        }
    }
}
