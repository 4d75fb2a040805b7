//! Gas accounting
//!
//! A [`GasMeter`] lives for exactly one `initialize`/`process_events` call.
//! Costs come from a [`GasSchedule`]; a charge that would push consumption
//! past the budget fails and leaves the meter untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a charge would exceed the budget
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GasError {
    #[error("gas budget exceeded: budget {budget}, consumed {consumed}, requested {requested}")]
    BudgetExceeded {
        budget: u64,
        consumed: u64,
        requested: u64,
    },
}

/// Cost table for metered work
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Flat cost of any sandboxed evaluation
    pub evaluation_base: u64,
    /// Cost per byte of evaluated source
    pub per_source_byte: u64,
    /// Cost per exposed binding
    pub per_binding: u64,
    /// Cost per module resolved from inside a script
    pub module_resolution: u64,
    /// Cost per executed task
    pub handler_overhead: u64,
    /// Cost per checkpoint entry written at batch end
    pub checkpoint_update: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            evaluation_base: 100,
            per_source_byte: 1,
            per_binding: 10,
            module_resolution: 250,
            handler_overhead: 50,
            checkpoint_update: 20,
        }
    }
}

impl GasSchedule {
    /// base + per_source_byte * len + per_binding * bindings
    pub fn evaluation_cost(&self, source_len: usize, binding_count: usize) -> u64 {
        self.evaluation_base
            .saturating_add(self.per_source_byte.saturating_mul(source_len as u64))
            .saturating_add(self.per_binding.saturating_mul(binding_count as u64))
    }
}

/// Accumulates cost against an optional budget
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasMeter {
    budget: Option<u64>,
    consumed: u64,
}

impl GasMeter {
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            consumed: 0,
        }
    }

    /// A meter that never fails
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn with_budget(budget: u64) -> Self {
        Self::new(Some(budget))
    }

    pub fn charge(&mut self, units: u64) -> Result<(), GasError> {
        let next = self.consumed.saturating_add(units);
        if let Some(budget) = self.budget {
            if next > budget {
                return Err(GasError::BudgetExceeded {
                    budget,
                    consumed: self.consumed,
                    requested: units,
                });
            }
        }
        self.consumed = next;
        Ok(())
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    pub fn remaining(&self) -> Option<u64> {
        self.budget.map(|b| b.saturating_sub(self.consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_budget_succeeds() {
        let mut meter = GasMeter::with_budget(100);
        meter.charge(60).unwrap();
        meter.charge(40).unwrap();
        assert_eq!(meter.consumed(), 100);
        assert_eq!(meter.remaining(), Some(0));
    }

    #[test]
    fn test_overrun_fails_without_consuming() {
        let mut meter = GasMeter::with_budget(99);
        meter.charge(60).unwrap();
        let err = meter.charge(40).unwrap_err();
        assert_eq!(
            err,
            GasError::BudgetExceeded {
                budget: 99,
                consumed: 60,
                requested: 40
            }
        );
        assert_eq!(meter.consumed(), 60);
    }

    #[test]
    fn test_unlimited_never_fails() {
        let mut meter = GasMeter::unlimited();
        meter.charge(u64::MAX).unwrap();
        meter.charge(1).unwrap();
        assert_eq!(meter.remaining(), None);
    }

    #[test]
    fn test_evaluation_cost_formula() {
        let schedule = GasSchedule::default();
        assert_eq!(schedule.evaluation_cost(0, 0), 100);
        assert_eq!(schedule.evaluation_cost(20, 3), 100 + 20 + 30);
    }

    #[test]
    fn test_schedule_partial_json() {
        let schedule: GasSchedule =
            serde_json::from_str(r#"{ "evaluation_base": 7 }"#).unwrap();
        assert_eq!(schedule.evaluation_base, 7);
        assert_eq!(schedule.per_binding, GasSchedule::default().per_binding);
    }
}
