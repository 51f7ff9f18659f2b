// src/employee.rs
//
// Employee salary profiles and the small in-memory stores around them: the
// directory the calculator resolves identifiers against, the advance book it
// reads deductions from, and the retirement-event log it writes to.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::tables::round_amount;

pub type EmployeeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaritalStatus {
    #[default]
    Single,
    // The clock-device exports and legacy rosters carry the French label.
    #[serde(alias = "marié", alias = "Marié")]
    Married,
    Divorced,
    Widowed,
}

impl MaritalStatus {
    pub fn is_married(self) -> bool {
        self == MaritalStatus::Married
    }
}

/// Immutable-per-period snapshot of an employee's salary profile. The
/// calculator reads it, never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    /// External identifier printed on the clock badge ("Numéro de carte").
    #[serde(default)]
    pub badge_number: Option<String>,
    pub base_salary: Decimal,
    /// Start-of-service date used for seniority.
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub dependent_children: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// In-memory organizational directory. Lookup by identifier plus the two
/// identity-resolution paths the attendance reconciler needs: name-substring
/// and badge number. Only active employees participate in matching.
#[derive(Default)]
pub struct EmployeeDirectory {
    employees: Mutex<HashMap<EmployeeId, Employee>>,
}

impl EmployeeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, employee: Employee) {
        debug!(employee_id = employee.id, name = %employee.name, "registering employee");
        self.employees.lock().unwrap().insert(employee.id, employee);
    }

    pub fn get(&self, id: EmployeeId) -> Option<Employee> {
        self.employees.lock().unwrap().get(&id).cloned()
    }

    pub fn active_employees(&self) -> Vec<Employee> {
        let mut list: Vec<Employee> = self
            .employees
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.is_active)
            .cloned()
            .collect();
        list.sort_by_key(|e| e.id);
        list
    }

    /// Resolve a raw attendance identity to a known employee: first a
    /// case-insensitive substring match of the attendance name inside the
    /// employee's full name, then an exact badge-number match.
    pub fn match_identity(&self, name: &str, badge_number: &str) -> Option<Employee> {
        let guard = self.employees.lock().unwrap();
        let name = name.trim().to_lowercase();

        if !name.is_empty() {
            if let Some(found) = guard
                .values()
                .filter(|e| e.is_active)
                .find(|e| e.name.to_lowercase().contains(&name))
            {
                return Some(found.clone());
            }
        }

        let badge = badge_number.trim();
        if !badge.is_empty() {
            if let Some(found) = guard
                .values()
                .filter(|e| e.is_active)
                .find(|e| e.badge_number.as_deref() == Some(badge))
            {
                return Some(found.clone());
            }
        }

        None
    }

    /// Load profiles from a CSV roster. Returns the number of rows loaded.
    pub fn load_csv(&self, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open employee roster {}", path.display()))?;
        let count = self.read_csv(file)?;
        info!(count, path = %path.display(), "employee roster loaded");
        Ok(count)
    }

    pub fn read_csv<R: io::Read>(&self, reader: R) -> Result<usize> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut count = 0;
        for row in rdr.deserialize::<Employee>() {
            let employee = row.context("Malformed employee roster row")?;
            self.insert(employee);
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceStatus {
    #[default]
    Active,
    Deducted,
}

/// A standing cash advance. The calculator reads the active total as a
/// payroll deduction; transitioning active → deducted is owned by the
/// administrative process that granted the advance, never by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceRecord {
    pub employee_id: EmployeeId,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: AdvanceStatus,
}

#[derive(Default)]
pub struct AdvanceBook {
    records: Mutex<Vec<AdvanceRecord>>,
}

impl AdvanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: AdvanceRecord) {
        self.records.lock().unwrap().push(record);
    }

    /// Sum of the employee's active advances, rounded to 2 decimal places.
    pub fn active_total(&self, employee_id: EmployeeId) -> Decimal {
        let total: Decimal = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.employee_id == employee_id && a.status == AdvanceStatus::Active)
            .map(|a| a.amount)
            .sum();
        round_amount(total)
    }

    pub fn load_csv(&self, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open advance book {}", path.display()))?;
        let count = self.read_csv(file)?;
        info!(count, path = %path.display(), "advance book loaded");
        Ok(count)
    }

    pub fn read_csv<R: io::Read>(&self, reader: R) -> Result<usize> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut count = 0;
        for row in rdr.deserialize::<AdvanceRecord>() {
            let record = row.context("Malformed advance row")?;
            self.insert(record);
            count += 1;
        }
        Ok(count)
    }
}

/// Side-effect record emitted when a calculation finds an employee inside the
/// retirement lookahead window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementEvent {
    pub employee_id: EmployeeId,
    pub retirement_date: NaiveDate,
    pub notification_date: NaiveDate,
    pub notes: String,
    pub created_at: NaiveDateTime,
}

/// Log of retirement events, unique per (employee, retirement_date) so that
/// recalculation never duplicates a notification.
#[derive(Default)]
pub struct RetirementLog {
    events: Mutex<HashMap<(EmployeeId, NaiveDate), RetirementEvent>>,
}

impl RetirementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event unless one already exists for the key. Returns true
    /// if a new event was created.
    pub fn record_once(
        &self,
        employee_id: EmployeeId,
        retirement_date: NaiveDate,
        notification_date: NaiveDate,
        notes: String,
    ) -> bool {
        let mut guard = self.events.lock().unwrap();
        match guard.entry((employee_id, retirement_date)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(RetirementEvent {
                    employee_id,
                    retirement_date,
                    notification_date,
                    notes,
                    created_at: Utc::now().naive_utc(),
                });
                true
            }
        }
    }

    pub fn events_for(&self, employee_id: EmployeeId) -> Vec<RetirementEvent> {
        let mut events: Vec<RetirementEvent> = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.employee_id == employee_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.retirement_date);
        events
    }
}
