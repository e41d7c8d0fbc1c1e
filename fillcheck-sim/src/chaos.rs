//! Coverage assertions for simulation runs.
//!
//! `sometimes_assert!` records how often an interesting condition held, so a
//! test can prove that a code path (an inline callback, a short write, a
//! stalled read) was actually exercised instead of silently never happening.
//! Results live in thread-local storage, which keeps parallel tests isolated.

use std::cell::RefCell;
use std::collections::HashMap;

/// Statistics for a tracked assertion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssertionStats {
    /// Total number of times this assertion was evaluated
    pub total_checks: usize,
    /// Number of times the assertion condition was true
    pub successes: usize,
}

impl AssertionStats {
    /// Create new assertion statistics starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the success rate as a percentage (0.0 to 100.0).
    ///
    /// Returns 0.0 if no checks have been performed yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            (self.successes as f64 / self.total_checks as f64) * 100.0
        }
    }

    /// Record a new assertion check with the given result.
    pub fn record(&mut self, success: bool) {
        self.total_checks += 1;
        if success {
            self.successes += 1;
        }
    }
}

thread_local! {
    static ASSERTION_RESULTS: RefCell<HashMap<String, AssertionStats>> = RefCell::new(HashMap::new());
}

/// Record an assertion result. Used by [`sometimes_assert!`](crate::sometimes_assert).
pub fn record_assertion(name: &str, success: bool) {
    ASSERTION_RESULTS.with(|results| {
        results
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .record(success);
    });
}

/// Get a snapshot of all assertion statistics collected on this thread.
pub fn get_assertion_results() -> HashMap<String, AssertionStats> {
    ASSERTION_RESULTS.with(|results| results.borrow().clone())
}

/// Clear all assertion statistics on this thread.
pub fn reset_assertion_results() {
    ASSERTION_RESULTS.with(|results| results.borrow_mut().clear());
}

/// Assertions that were checked but never held.
///
/// A `sometimes_assert!` with a 0% success rate means the condition it
/// watches for was never reached.
pub fn validate_assertion_contracts() -> Vec<String> {
    let mut violations: Vec<String> = get_assertion_results()
        .iter()
        .filter(|(_, stats)| stats.total_checks > 0 && stats.successes == 0)
        .map(|(name, stats)| {
            format!(
                "sometimes_assert!('{}') never held in {} checks",
                name, stats.total_checks
            )
        })
        .collect();
    violations.sort();
    violations
}

/// Record whether `condition` held at this point.
///
/// ```ignore
/// sometimes_assert!(write_partial, accepted < requested);
/// ```
#[macro_export]
macro_rules! sometimes_assert {
    ($name:ident, $condition:expr) => {
        $crate::chaos::record_assertion(stringify!($name), $condition)
    };
}
