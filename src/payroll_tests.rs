// src/payroll_tests.rs

#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::employee::{
        AdvanceBook, AdvanceRecord, AdvanceStatus, Employee, EmployeeDirectory, MaritalStatus,
        RetirementLog,
    };
    use crate::payroll::*;
    use crate::payslip::{PayslipLedger, PayslipStatus, PeriodKey};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn period(s: &str) -> PeriodKey {
        s.parse().unwrap()
    }

    struct Harness {
        directory: Arc<EmployeeDirectory>,
        advances: Arc<AdvanceBook>,
        ledger: Arc<PayslipLedger>,
        retirements: Arc<RetirementLog>,
        calculator: PayrollCalculator,
    }

    fn harness(today: &str) -> Harness {
        let directory = Arc::new(EmployeeDirectory::new());
        let advances = Arc::new(AdvanceBook::new());
        let ledger = Arc::new(PayslipLedger::new());
        let retirements = Arc::new(RetirementLog::new());
        let calculator = PayrollCalculator::new(
            directory.clone(),
            advances.clone(),
            ledger.clone(),
            retirements.clone(),
            Arc::new(FixedClock::new(d(today))),
            RetirementPolicy::default(),
        );
        Harness {
            directory,
            advances,
            ledger,
            retirements,
            calculator,
        }
    }

    fn profile(id: u32, name: &str, base_salary: Decimal) -> Employee {
        Employee {
            id,
            name: name.to_string(),
            badge_number: None,
            base_salary,
            hire_date: None,
            date_of_birth: None,
            marital_status: MaritalStatus::Single,
            dependent_children: 0,
            is_active: true,
        }
    }

    /// Reference profile for the end-to-end scenario: 8000 base, hired
    /// exactly five years before the pinned date, married, no children.
    fn reference_profile() -> Employee {
        Employee {
            hire_date: Some(d("2020-06-15")),
            marital_status: MaritalStatus::Married,
            ..profile(1, "Amina Berrada", dec!(8000))
        }
    }

    #[test]
    fn end_to_end_standard_full_month() {
        let h = harness("2025-06-15");
        h.directory.insert(reference_profile());

        let record = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 42)
            .unwrap();
        let c = &record.computation;

        // Full standard month at 26 days collapses to the base salary
        assert_eq!(c.days_worked, 26);
        assert_eq!(c.monthly_salary, dec!(8000.00));
        assert_eq!(c.taxable_basic_salary, dec!(8000.00));

        // Five full years of service pay 10%
        assert_eq!(c.years_of_service, 5);
        assert_eq!(c.seniority_bonus_rate, dec!(0.10));
        assert_eq!(c.seniority_bonus_amount, dec!(800.00));
        assert_eq!(c.gross_taxable_salary, dec!(8800.00));

        // CNSS hits the ceiling, the rest is uncapped
        assert_eq!(c.cnss_amount, dec!(268.80));
        assert_eq!(c.amo_amount, dec!(198.88));
        assert_eq!(c.cimr_amount, dec!(616.00));
        assert_eq!(c.professional_expenses_rate, dec!(0.25));
        assert_eq!(c.professional_expenses_amount, dec!(2200.00));
        assert_eq!(c.net_taxable_salary, dec!(5516.32));

        // 30% bracket with its 1166.67 deduction, minus the marriage unit
        assert_eq!(c.gross_ir, dec!(488.23));
        assert_eq!(c.family_allowance, dec!(30));
        assert_eq!(c.net_ir, dec!(458.23));

        assert_eq!(c.total_deductions, dec!(1541.91));
        assert_eq!(c.net_salary, dec!(7258.09));
        assert_eq!(c.net_payable, dec!(7258.09));

        assert_eq!(record.status, PayslipStatus::Calculated);
        assert_eq!(record.created_by, 42);
    }

    #[test]
    fn net_payable_identity_holds() {
        let h = harness("2025-06-15");
        h.directory.insert(reference_profile());
        h.advances.insert(AdvanceRecord {
            employee_id: 1,
            amount: dec!(500),
            date: d("2025-05-02"),
            reason: None,
            status: AdvanceStatus::Active,
        });

        let record = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        let c = &record.computation;

        let expected = c.gross_taxable_salary
            - c.cnss_amount
            - c.amo_amount
            - c.cimr_amount
            - c.net_ir
            - c.advance_payments
            - c.loan_deductions;
        assert_eq!(c.net_payable, expected);
        assert_eq!(c.advance_payments, dec!(500.00));
        assert_eq!(c.net_payable, dec!(6758.09));
    }

    #[test]
    fn deducted_advances_are_not_withheld_again() {
        let h = harness("2025-06-15");
        h.directory.insert(reference_profile());
        h.advances.insert(AdvanceRecord {
            employee_id: 1,
            amount: dec!(500),
            date: d("2025-01-02"),
            reason: Some("settled last period".to_string()),
            status: AdvanceStatus::Deducted,
        });

        let record = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        assert_eq!(record.computation.advance_payments, Decimal::ZERO);
    }

    #[test]
    fn cnss_never_exceeds_the_ceiling_contribution() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Cadre Supérieur", dec!(50000)));

        let record = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        assert_eq!(record.computation.cnss_amount, dec!(268.80));
    }

    #[test]
    fn seniority_boundary_at_two_years() {
        let h = harness("2025-06-15");
        let mut on_the_day = profile(1, "Deux Ans", dec!(5000));
        on_the_day.hire_date = Some(d("2023-06-15"));
        let mut one_day_short = profile(2, "Presque Deux Ans", dec!(5000));
        one_day_short.hire_date = Some(d("2023-06-16"));
        h.directory.insert(on_the_day);
        h.directory.insert(one_day_short);

        let a = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        assert_eq!(a.computation.years_of_service, 2);
        assert_eq!(a.computation.seniority_bonus_rate, dec!(0.05));

        let b = h
            .calculator
            .calculate(2, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        assert_eq!(b.computation.years_of_service, 1);
        assert_eq!(b.computation.seniority_bonus_rate, Decimal::ZERO);
    }

    #[test]
    fn missing_hire_date_earns_no_seniority() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Sans Date", dec!(5000)));

        let record = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        assert_eq!(record.computation.years_of_service, 0);
        assert_eq!(record.computation.seniority_bonus_amount, Decimal::ZERO);
    }

    #[test]
    fn family_allowance_counts_marriage_and_children() {
        let h = harness("2025-06-15");
        let mut married = reference_profile();
        married.dependent_children = 2;
        h.directory.insert(married);
        h.directory
            .insert(profile(2, "Célibataire", dec!(8000)));

        let with_family = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        let single = h
            .calculator
            .calculate(2, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();

        // One marriage unit plus two child units
        assert_eq!(with_family.computation.family_allowance, dec!(90));
        assert_eq!(with_family.computation.gross_ir, dec!(488.23));
        assert_eq!(with_family.computation.net_ir, dec!(398.23));

        assert_eq!(single.computation.family_allowance, Decimal::ZERO);
        assert_eq!(single.computation.net_ir, single.computation.gross_ir);
    }

    #[test]
    fn attendance_facts_prorate_the_month() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Temps Partiel", dec!(8000)));

        let facts = PeriodFacts {
            attendance: Some(AttendanceFacts {
                days_worked: 20,
                holiday_days: 0,
            }),
            ..PeriodFacts::default()
        };
        let record = h
            .calculator
            .calculate(1, period("06/2025"), &facts, 1)
            .unwrap();
        assert_eq!(record.computation.monthly_salary, dec!(6153.85));
    }

    #[test]
    fn overtime_categories_have_distinct_premiums() {
        let h = harness("2025-06-15");
        // 1910 base makes the hourly rate exactly 10
        h.directory.insert(profile(1, "Heures Sup", dec!(1910)));

        let facts = PeriodFacts {
            overtime: Some(OvertimeFacts {
                regular_hours: dec!(4),
                weekend_hours: dec!(2),
                holiday_hours: dec!(1),
            }),
            ..PeriodFacts::default()
        };
        let record = h
            .calculator
            .calculate(1, period("06/2025"), &facts, 1)
            .unwrap();
        let c = &record.computation;
        assert_eq!(c.overtime_regular_amount, dec!(50.00));
        assert_eq!(c.overtime_weekend_amount, dec!(30.00));
        assert_eq!(c.overtime_holiday_amount, dec!(20.00));
        assert_eq!(c.total_overtime_amount, dec!(100.00));
    }

    #[test]
    fn leave_and_unworked_holidays_are_paid_at_the_day_rate() {
        let h = harness("2025-06-15");
        // 2600 base makes the day rate exactly 100
        h.directory.insert(profile(1, "En Congé", dec!(2600)));

        let facts = PeriodFacts {
            leave: Some(LeaveFacts {
                approved_leave_days: 2,
                holiday_days: 1,
                worked_on_holidays: false,
            }),
            ..PeriodFacts::default()
        };
        let record = h
            .calculator
            .calculate(1, period("06/2025"), &facts, 1)
            .unwrap();
        assert_eq!(record.computation.paid_leave_amount, dec!(200.00));
        assert_eq!(record.computation.paid_holiday_amount, dec!(100.00));
        assert_eq!(record.computation.taxable_basic_salary, dec!(2900.00));
    }

    #[test]
    fn working_the_holiday_forfeits_holiday_pay() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Jour Férié", dec!(2600)));

        let facts = PeriodFacts {
            leave: Some(LeaveFacts {
                approved_leave_days: 0,
                holiday_days: 1,
                worked_on_holidays: true,
            }),
            ..PeriodFacts::default()
        };
        let record = h
            .calculator
            .calculate(1, period("06/2025"), &facts, 1)
            .unwrap();
        assert_eq!(record.computation.paid_holiday_amount, Decimal::ZERO);
    }

    #[test]
    fn unknown_employee_fails_fast_without_writes() {
        let h = harness("2025-06-15");
        let err = h
            .calculator
            .calculate(99, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap_err();
        assert_eq!(err, PayrollError::EmployeeNotFound(99));
        assert!(h.ledger.records_for_period(period("06/2025")).is_empty());
    }

    #[test]
    fn invalid_attendance_facts_are_rejected() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Données Cassées", dec!(5000)));

        let facts = PeriodFacts {
            attendance: Some(AttendanceFacts {
                days_worked: 10,
                holiday_days: 12,
            }),
            ..PeriodFacts::default()
        };
        let err = h
            .calculator
            .calculate(1, period("06/2025"), &facts, 1)
            .unwrap_err();
        assert!(matches!(err, PayrollError::InvalidInput(_)));
        assert!(h.ledger.records_for_period(period("06/2025")).is_empty());
    }

    #[test]
    fn recalculation_is_idempotent_and_never_duplicates() {
        let h = harness("2025-06-15");
        h.directory.insert(reference_profile());

        let first = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        let second = h
            .calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 7)
            .unwrap();

        assert_eq!(first.computation, second.computation);
        // The creation marker and creating actor survive recalculation
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.created_by, 1);
        assert_eq!(h.ledger.records_for_period(period("06/2025")).len(), 1);
    }

    #[test]
    fn recalculation_overwrites_stored_values_in_place() {
        let h = harness("2025-06-15");
        h.directory.insert(reference_profile());

        h.calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        let facts = PeriodFacts {
            attendance: Some(AttendanceFacts {
                days_worked: 20,
                holiday_days: 0,
            }),
            ..PeriodFacts::default()
        };
        h.calculator
            .calculate(1, period("06/2025"), &facts, 1)
            .unwrap();

        let records = h.ledger.records_for_period(period("06/2025"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].employee_id, 1);
        assert_eq!(records[0].computation.days_worked, 20);
    }

    #[test]
    fn separate_periods_keep_separate_records() {
        let h = harness("2025-06-15");
        h.directory.insert(reference_profile());

        h.calculator
            .calculate(1, period("05/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        h.calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();

        assert_eq!(h.ledger.records_for_period(period("05/2025")).len(), 1);
        assert_eq!(h.ledger.records_for_period(period("06/2025")).len(), 1);
    }

    #[test]
    fn retirement_event_raised_once_inside_the_window() {
        let h = harness("2025-06-15");
        let mut retiring = reference_profile();
        // Turns 60 on 2025-07-15, 30 days out
        retiring.date_of_birth = Some(d("1965-07-15"));
        h.directory.insert(retiring);

        h.calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        let events = h.retirements.events_for(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].retirement_date, d("2025-07-15"));
        assert_eq!(events[0].notification_date, d("2025-06-15"));

        // Recalculating must not duplicate the event
        h.calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        assert_eq!(h.retirements.events_for(1).len(), 1);
    }

    #[test]
    fn no_retirement_event_outside_the_window() {
        let h = harness("2025-06-15");
        let mut far_off = reference_profile();
        // Turns 60 more than 60 days out
        far_off.date_of_birth = Some(d("1965-10-01"));
        h.directory.insert(far_off);
        let mut already_past = profile(2, "Déjà Retraité", dec!(5000));
        already_past.date_of_birth = Some(d("1965-06-01"));
        h.directory.insert(already_past);

        h.calculator
            .calculate(1, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();
        h.calculator
            .calculate(2, period("06/2025"), &PeriodFacts::default(), 1)
            .unwrap();

        assert!(h.retirements.events_for(1).is_empty());
        assert!(h.retirements.events_for(2).is_empty());
    }

    #[test]
    fn retirement_date_rolls_leap_day_forward() {
        // 1964 + 60 lands on a leap year, so Feb 29 survives
        assert_eq!(retirement_date(d("1964-02-29"), 60), d("2024-02-29"));
        // 1964 + 61 does not
        assert_eq!(retirement_date(d("1964-02-29"), 61), d("2025-03-01"));
        assert_eq!(retirement_date(d("1965-07-15"), 60), d("2025-07-15"));
    }

    #[test]
    fn batch_collects_failures_and_keeps_going() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Amina Berrada", dec!(8000)));
        h.directory.insert(profile(2, "Karim El Fassi", dec!(6000)));

        let mut facts = HashMap::new();
        facts.insert(
            2,
            PeriodFacts {
                overtime: Some(OvertimeFacts {
                    regular_hours: dec!(-3),
                    ..OvertimeFacts::default()
                }),
                ..PeriodFacts::default()
            },
        );

        let summary = h.calculator.run_batch(period("06/2025"), &facts, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].employee_id, 2);
        assert_eq!(summary.failures[0].employee_name, "Karim El Fassi");
        assert!(summary.failures[0].error.contains("negative overtime"));

        // Only the successful employee reached the ledger
        let records = h.ledger.records_for_period(period("06/2025"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].employee_id, 1);
    }

    #[test]
    fn batch_skips_inactive_employees() {
        let h = harness("2025-06-15");
        h.directory.insert(profile(1, "Active", dec!(5000)));
        let mut former = profile(2, "Partie", dec!(5000));
        former.is_active = false;
        h.directory.insert(former);

        let summary = h
            .calculator
            .run_batch(period("06/2025"), &HashMap::new(), 1);
        assert_eq!(summary.succeeded, 1);
        assert!(summary.failures.is_empty());
    }
}
