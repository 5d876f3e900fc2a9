//! Budgeted DPLL search.
//!
//! Unit propagation plus chronological backtracking. Branching always picks
//! a variable from the first unsatisfied clause and tries `false` first,
//! which finds the small configurations typical of feature models quickly.
//! Every branch counts as one decision; the search gives up with
//! [`SolverError::BudgetExhausted`] once the budget is spent.

use fm_core::FeatureModel;

use crate::cnf::{encode, Cnf};
use crate::{ConsistencyChecker, ProductCount, SolverError};

/// Default decision budget per solver call.
pub const DEFAULT_DECISIONS_MAX: u64 = 1_000_000;

/// DPLL-based consistency checker.
#[derive(Debug, Clone)]
pub struct DpllSolver {
    decisions_max: u64,
}

impl Default for DpllSolver {
    fn default() -> Self {
        Self::new(DEFAULT_DECISIONS_MAX)
    }
}

impl DpllSolver {
    #[must_use]
    pub fn new(decisions_max: u64) -> Self {
        debug_assert!(decisions_max > 0, "Decision budget must be positive");
        Self { decisions_max }
    }

    #[must_use]
    pub fn decisions_max(&self) -> u64 {
        self.decisions_max
    }

    /// Find a satisfying assignment, if any.
    pub fn solve(&self, cnf: &Cnf) -> Result<Option<Vec<bool>>, SolverError> {
        let mut search = Search::new(cnf, self.decisions_max);
        if search.satisfy()? {
            // Unassigned variables are free; deselect them.
            let assignment: Vec<bool> = search
                .assignment
                .iter()
                .map(|value| value.unwrap_or(false))
                .collect();
            debug_assert!(cnf.is_satisfied_by(&assignment));
            Ok(Some(assignment))
        } else {
            Ok(None)
        }
    }

    /// Count the products of a model, enumerating at most `limit` of them.
    pub fn count_products(
        &self,
        model: &FeatureModel,
        limit: u64,
    ) -> Result<ProductCount, SolverError> {
        let cnf = encode(model)?;
        let mut search = Search::new(&cnf, self.decisions_max);
        let cap = limit.saturating_add(1);
        let counted = search.count(cap)?;

        tracing::trace!(counted, decisions = search.decisions, "product count");

        if counted > limit {
            Ok(ProductCount::AtLeast(limit))
        } else {
            Ok(ProductCount::Exact(counted))
        }
    }
}

impl ConsistencyChecker for DpllSolver {
    fn is_consistent(&self, model: &FeatureModel) -> Result<bool, SolverError> {
        let cnf = encode(model)?;
        Ok(self.solve(&cnf)?.is_some())
    }
}

/// State of one solver call.
struct Search<'a> {
    cnf: &'a Cnf,
    assignment: Vec<Option<bool>>,
    decisions: u64,
    decisions_max: u64,
}

enum ClauseState {
    Satisfied,
    Conflict,
    Unit(usize, bool),
    Open(usize),
}

impl<'a> Search<'a> {
    fn new(cnf: &'a Cnf, decisions_max: u64) -> Self {
        Self {
            cnf,
            assignment: vec![None; cnf.vars_count],
            decisions: 0,
            decisions_max,
        }
    }

    fn clause_state(&self, clause_index: usize) -> ClauseState {
        let mut unassigned: Option<(usize, bool)> = None;
        let mut unassigned_count = 0;

        for lit in &self.cnf.clauses[clause_index] {
            match self.assignment[lit.var] {
                Some(value) if lit.eval(value) => return ClauseState::Satisfied,
                Some(_) => {}
                None => {
                    unassigned_count += 1;
                    unassigned = Some((lit.var, lit.positive));
                }
            }
        }

        match (unassigned_count, unassigned) {
            (0, _) => ClauseState::Conflict,
            (1, Some((var, value))) => ClauseState::Unit(var, value),
            (_, Some((var, _))) => ClauseState::Open(var),
            (_, None) => ClauseState::Conflict,
        }
    }

    /// Assign all unit literals. Returns false on conflict; assigned
    /// variables are recorded on `trail` either way.
    fn propagate(&mut self, trail: &mut Vec<usize>) -> bool {
        loop {
            let mut changed = false;
            for clause_index in 0..self.cnf.clauses.len() {
                match self.clause_state(clause_index) {
                    ClauseState::Conflict => return false,
                    ClauseState::Unit(var, value) => {
                        self.assignment[var] = Some(value);
                        trail.push(var);
                        changed = true;
                    }
                    ClauseState::Satisfied | ClauseState::Open(_) => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }

    /// A variable of the first unsatisfied clause, or `None` when every
    /// clause is satisfied.
    fn branch_var(&self) -> Option<usize> {
        (0..self.cnf.clauses.len()).find_map(|i| match self.clause_state(i) {
            ClauseState::Open(var) | ClauseState::Unit(var, _) => Some(var),
            ClauseState::Satisfied | ClauseState::Conflict => None,
        })
    }

    fn undo(&mut self, trail: &[usize]) {
        for &var in trail {
            self.assignment[var] = None;
        }
    }

    fn decide(&mut self) -> Result<(), SolverError> {
        self.decisions += 1;
        if self.decisions > self.decisions_max {
            return Err(SolverError::BudgetExhausted(self.decisions_max));
        }
        Ok(())
    }

    /// Search for a satisfying assignment. On success the assignment is
    /// left in place.
    fn satisfy(&mut self) -> Result<bool, SolverError> {
        let mut trail = Vec::new();
        if !self.propagate(&mut trail) {
            self.undo(&trail);
            return Ok(false);
        }

        let var = match self.branch_var() {
            Some(var) => var,
            None => return Ok(true),
        };

        for value in [false, true] {
            self.decide()?;
            self.assignment[var] = Some(value);
            if self.satisfy()? {
                return Ok(true);
            }
            self.assignment[var] = None;
        }

        self.undo(&trail);
        Ok(false)
    }

    /// Count satisfying assignments, stopping once `cap` is reached.
    fn count(&mut self, cap: u64) -> Result<u64, SolverError> {
        let mut trail = Vec::new();
        if !self.propagate(&mut trail) {
            self.undo(&trail);
            return Ok(0);
        }

        let var = match self.branch_var() {
            Some(var) => var,
            None => {
                let free = self.assignment.iter().filter(|v| v.is_none()).count();
                self.undo(&trail);
                let models = if free >= 64 { u64::MAX } else { 1u64 << free };
                return Ok(models.min(cap));
            }
        };

        let mut total = 0u64;
        for value in [false, true] {
            if total >= cap {
                break;
            }
            self.decide()?;
            self.assignment[var] = Some(value);
            let counted = self.count(cap - total);
            self.assignment[var] = None;
            total += counted?;
        }

        self.undo(&trail);
        Ok(total.min(cap))
    }
}
