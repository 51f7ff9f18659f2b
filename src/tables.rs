// src/tables.rs
//
// Statutory schedules for Moroccan payroll: progressive income-tax brackets,
// social-contribution rates and ceilings, seniority-bonus brackets and the
// professional-expense thresholds. Everything here is a pure lookup over
// `Decimal`; rounding of stage results is the caller's job.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

// Working-time constants
pub const STANDARD_MONTHLY_HOURS: Decimal = dec!(191);
pub const STANDARD_WORKING_DAYS: u32 = 26;
// 191 hours spread over 26 working days
pub const HOURS_PER_WORKING_DAY: Decimal = dec!(7.3461538462);

// Social contributions
pub const CNSS_RATE: Decimal = dec!(0.0448);
pub const CNSS_CEILING: Decimal = dec!(6000);
pub const AMO_RATE: Decimal = dec!(0.0226);
pub const CIMR_RATE: Decimal = dec!(0.07);

// Professional expenses (deemed-expense deduction)
pub const PROFESSIONAL_EXPENSES_HIGH: Decimal = dec!(0.35);
pub const PROFESSIONAL_EXPENSES_LOW: Decimal = dec!(0.25);
pub const PROFESSIONAL_EXPENSES_THRESHOLD: Decimal = dec!(6500);

// Family allowance, per marriage and per dependent child
pub const FAMILY_ALLOWANCE_UNIT: Decimal = dec!(30);

// Overtime premiums
pub const OVERTIME_REGULAR: Decimal = dec!(0.25);
pub const OVERTIME_WEEKEND: Decimal = dec!(0.50);
pub const OVERTIME_HOLIDAY: Decimal = dec!(1.00);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxBracket {
    pub min: Decimal,
    /// Upper bound of the bracket; `None` for the top bracket.
    pub max: Option<Decimal>,
    pub rate: Decimal,
    pub deduction: Decimal,
}

static TAX_BRACKETS: Lazy<[TaxBracket; 6]> = Lazy::new(|| {
    [
        TaxBracket { min: dec!(0), max: Some(dec!(2500)), rate: dec!(0), deduction: dec!(0) },
        TaxBracket { min: dec!(2501), max: Some(dec!(4166)), rate: dec!(0.10), deduction: dec!(250) },
        TaxBracket { min: dec!(4167), max: Some(dec!(5000)), rate: dec!(0.20), deduction: dec!(666.67) },
        TaxBracket { min: dec!(5001), max: Some(dec!(6666)), rate: dec!(0.30), deduction: dec!(1166.67) },
        TaxBracket { min: dec!(6667), max: Some(dec!(15000)), rate: dec!(0.34), deduction: dec!(1433.33) },
        TaxBracket { min: dec!(15001), max: None, rate: dec!(0.38), deduction: dec!(2033.33) },
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeniorityBracket {
    min_years: i32,
    max_years: i32,
    rate: Decimal,
}

static SENIORITY_BRACKETS: Lazy<[SeniorityBracket; 5]> = Lazy::new(|| {
    [
        SeniorityBracket { min_years: 2, max_years: 4, rate: dec!(0.05) },
        SeniorityBracket { min_years: 5, max_years: 11, rate: dec!(0.10) },
        SeniorityBracket { min_years: 12, max_years: 19, rate: dec!(0.15) },
        SeniorityBracket { min_years: 20, max_years: 24, rate: dec!(0.20) },
        SeniorityBracket { min_years: 25, max_years: 99, rate: dec!(0.25) },
    ]
});

/// Round a monetary amount to 2 decimal places, half-up.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Locate the income-tax bracket for a taxable base.
///
/// The brackets are published with inclusive integer boundaries; the lookup
/// picks the first bracket whose upper bound covers the base, so every
/// non-negative amount (including fractional values between two published
/// boundaries) maps to exactly one bracket.
pub fn income_tax_bracket(base: Decimal) -> &'static TaxBracket {
    TAX_BRACKETS
        .iter()
        .find(|b| match b.max {
            Some(max) => base <= max,
            None => true,
        })
        .expect("the top tax bracket is unbounded")
}

/// Gross income tax before family allowances: `base * rate - deduction`.
pub fn gross_income_tax(base: Decimal) -> Decimal {
    let bracket = income_tax_bracket(base);
    base * bracket.rate - bracket.deduction
}

/// CNSS contribution: capped at the statutory ceiling.
pub fn cnss_contribution(gross_taxable: Decimal) -> Decimal {
    gross_taxable.min(CNSS_CEILING) * CNSS_RATE
}

/// AMO contribution, uncapped.
pub fn amo_contribution(gross_taxable: Decimal) -> Decimal {
    gross_taxable * AMO_RATE
}

/// CIMR contribution, uncapped.
pub fn cimr_contribution(gross_taxable: Decimal) -> Decimal {
    gross_taxable * CIMR_RATE
}

/// Professional-expense rate keyed on the reference salary.
pub fn professional_expense_rate(reference_salary: Decimal) -> Decimal {
    if reference_salary <= PROFESSIONAL_EXPENSES_THRESHOLD {
        PROFESSIONAL_EXPENSES_HIGH
    } else {
        PROFESSIONAL_EXPENSES_LOW
    }
}

/// Seniority bonus rate for whole years of continuous service.
pub fn seniority_rate(years_of_service: i32) -> Decimal {
    SENIORITY_BRACKETS
        .iter()
        .find(|b| b.min_years <= years_of_service && years_of_service <= b.max_years)
        .map(|b| b.rate)
        .unwrap_or(Decimal::ZERO)
}

/// Whole years of service: calendar-year delta, minus one if the hire
/// anniversary has not been reached yet this year.
pub fn years_of_service(hire_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - hire_date.year();
    if today.month() < hire_date.month()
        || (today.month() == hire_date.month() && today.day() < hire_date.day())
    {
        years -= 1;
    }
    years
}
