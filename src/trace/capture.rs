use std::sync::{Mutex, MutexGuard};

use crossbeam::sync::ShardedLock;
use log::debug;

use crate::{
    error::CaptureError,
    tensor::{Tensor, Variable},
};

/// Variables a function created during its first successful trace.
///
/// Later traces of the same function get the same variables back, by creation
/// order, so retracing for a new signature never forks captured state. The
/// ledger outlives cache resets.
pub(crate) struct CreationLedger {
    function: String,
    committed: ShardedLock<Option<Vec<Variable>>>,
    first_trace: Mutex<()>,
}

impl CreationLedger {
    pub(crate) fn new(function: &str) -> Self {
        CreationLedger {
            function: function.to_string(),
            committed: ShardedLock::new(None),
            first_trace: Mutex::new(()),
        }
    }

    pub(crate) fn snapshot(&self) -> Option<Vec<Variable>> {
        match self.committed.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Serialise traces until one has committed, so concurrent first traces
    /// cannot each create their own variables.
    pub(crate) fn begin_trace(&self) -> (Option<MutexGuard<'_, ()>>, Option<Vec<Variable>>) {
        if let Some(prior) = self.snapshot() {
            return (None, Some(prior));
        }
        let guard = self
            .first_trace
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (Some(guard), self.snapshot())
    }

    pub(crate) fn commit(&self, created: Vec<Variable>) {
        let mut committed = match self.committed.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if committed.is_none() {
            debug!(
                "{} committed {} created variables",
                self.function,
                created.len()
            );
            *committed = Some(created);
        }
    }
}

/// Capture bookkeeping of a single trace.
pub(crate) struct CaptureSet {
    function: String,
    captures: Vec<Variable>,
    prior: Option<Vec<Variable>>,
    created: Vec<Variable>,
}

impl CaptureSet {
    pub(crate) fn new(function: &str, prior: Option<Vec<Variable>>) -> Self {
        CaptureSet {
            function: function.to_string(),
            captures: vec![],
            prior,
            created: vec![],
        }
    }

    /// Index of `variable` in the capture list, adding it on first use.
    pub(crate) fn capture(&mut self, variable: &Variable) -> usize {
        match self.captures.iter().position(|held| held.same_as(variable)) {
            Some(index) => index,
            None => {
                self.captures.push(variable.clone());
                self.captures.len() - 1
            }
        }
    }

    /// Create a variable, or hand back the one created at the same position by
    /// the first trace.
    pub(crate) fn create(&mut self, initial: Tensor) -> Result<Variable, CaptureError> {
        let ordinal = self.created.len();
        let variable = match &self.prior {
            None => Variable::new(initial),
            Some(prior) => match prior.get(ordinal) {
                Some(existing) if existing.spec() == &initial.spec() => existing.clone(),
                Some(existing) => {
                    return Err(CaptureError::CreationSpecMismatch {
                        function: self.function.clone(),
                        ordinal,
                        expected: existing.spec().clone(),
                        found: initial.spec(),
                    })
                }
                None => {
                    return Err(CaptureError::CreationCountMismatch {
                        function: self.function.clone(),
                        expected: prior.len(),
                        found: ordinal + 1,
                    })
                }
            },
        };
        self.created.push(variable.clone());
        Ok(variable)
    }

    /// Check the creation count against the first trace and split into
    /// (captures, created).
    pub(crate) fn finish(self) -> Result<(Vec<Variable>, Vec<Variable>), CaptureError> {
        if let Some(prior) = &self.prior {
            if prior.len() != self.created.len() {
                return Err(CaptureError::CreationCountMismatch {
                    function: self.function,
                    expected: prior.len(),
                    found: self.created.len(),
                });
            }
        }
        Ok((self.captures, self.created))
    }
}
