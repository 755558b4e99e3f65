use std::{fmt, sync::Arc};

use crossbeam::sync::ShardedLock;
use log::debug;

use super::{Tensor, TensorSpec};
use crate::{error::ExecutionError, ArcLock};

pub type VariableId = uuid::Uuid;

/// Externally owned mutable tensor.
///
/// A trace never copies a variable's value into the graph: it records a
/// reference, so every invocation of the compiled unit reads (and may assign)
/// whatever the variable holds at that moment. Clones share the same storage.
#[derive(Clone)]
pub struct Variable {
    id: VariableId,
    spec: TensorSpec,
    value: ArcLock<Tensor>,
}

impl Variable {
    pub fn new(initial: Tensor) -> Self {
        let id = uuid::Uuid::new_v4();
        debug!("Creating Variable {} with spec {}", id, initial.spec());
        Variable {
            id,
            spec: initial.spec(),
            value: Arc::new(ShardedLock::new(initial)),
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn read(&self) -> Tensor {
        match self.value.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the held value. Element type and shape are fixed at creation.
    pub fn assign(&self, value: Tensor) -> Result<(), ExecutionError> {
        if !self.spec.accepts_tensor(&value) {
            return Err(ExecutionError::AssignMismatch {
                id: self.id,
                expected: self.spec.clone(),
                found: value.spec(),
            });
        }
        match self.value.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
        Ok(())
    }

    pub(crate) fn same_as(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl PartialEq for Variable {
    fn eq(&self, rhs: &Variable) -> bool {
        self.same_as(rhs)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .finish()
    }
}
