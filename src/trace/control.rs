use log::debug;

use super::{Pred, Sym, Tracer};
use crate::{
    error::CompilationError,
    graph::{Block, NodeId, NodeKind},
    tensor::TensorSpec,
};

/// A loop traced into header, condition and body blocks, not yet recorded.
struct TracedLoop {
    params: Vec<NodeId>,
    cond_block: Block,
    body_block: Block,
    results: Vec<TensorSpec>,
}

enum CarriedCheck {
    Accepted,
    Widen(Vec<TensorSpec>),
    Mismatch(String),
}

fn structure_mismatch(construct: &'static str, reason: String) -> CompilationError {
    CompilationError::StructureMismatch { construct, reason }
}

/// Specs that accept the results of both branches of a conditional.
fn join_branches(then_out: &[Sym], else_out: &[Sym]) -> Result<Vec<TensorSpec>, CompilationError> {
    if then_out.len() != else_out.len() {
        return Err(structure_mismatch(
            "cond",
            format!(
                "then branch yields {} values, else branch yields {}",
                then_out.len(),
                else_out.len()
            ),
        ));
    }
    then_out
        .iter()
        .zip(else_out.iter())
        .enumerate()
        .map(|(index, (lhs, rhs))| {
            let joined = if lhs.dtype() == rhs.dtype() {
                lhs.shape().join(rhs.shape())
            } else {
                None
            };
            joined
                .map(|shape| TensorSpec::new(lhs.dtype(), shape))
                .ok_or_else(|| {
                    structure_mismatch(
                        "cond",
                        format!("result {} is {} in one branch and {} in the other", index, lhs.spec(), rhs.spec()),
                    )
                })
        })
        .collect()
}

fn check_carried(carried: &[TensorSpec], results: &[TensorSpec]) -> CarriedCheck {
    if carried.len() != results.len() {
        return CarriedCheck::Mismatch(format!(
            "loop carries {} values, body yields {}",
            carried.len(),
            results.len()
        ));
    }
    let mut widened = Vec::with_capacity(carried.len());
    for (index, (carried, result)) in carried.iter().zip(results.iter()).enumerate() {
        let joined = if carried.dtype == result.dtype {
            carried.shape.join(&result.shape)
        } else {
            None
        };
        match joined {
            Some(shape) => widened.push(TensorSpec::new(carried.dtype, shape)),
            None => {
                return CarriedCheck::Mismatch(format!(
                    "loop value {} enters as {} and leaves the body as {}",
                    index, carried, result
                ))
            }
        }
    }
    if carried.iter().zip(results.iter()).all(|(carried, result)| carried.accepts(result)) {
        CarriedCheck::Accepted
    } else {
        CarriedCheck::Widen(widened)
    }
}

impl Tracer {
    /// Trace `f` inside a fresh scope and close it as a block.
    fn trace_block<F>(&self, f: F) -> (Block, Vec<Sym>)
    where
        F: FnOnce(&Tracer) -> Vec<Sym>,
    {
        self.builder.borrow_mut().open_scope();
        let results = f(self);
        let ids = results.iter().filter_map(|sym| self.input_node(sym)).collect();
        let block = self.builder.borrow_mut().close_block(ids);
        (block, results)
    }

    fn check_predicate(&self, pred: &Sym) -> Option<NodeId> {
        if !pred.spec().is_scalar_bool() {
            self.record_error(CompilationError::InvalidPredicate {
                found: pred.spec().clone(),
            });
        }
        self.input_node(pred)
    }

    fn record_outputs(&self, node: NodeId, specs: Vec<TensorSpec>) -> Vec<Sym> {
        specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                let output = self.builder.borrow_mut().add_node(
                    NodeKind::Output { index },
                    vec![node],
                    Some(spec.clone()),
                );
                self.sym(output, spec)
            })
            .collect()
    }

    /// Two-way conditional.
    ///
    /// With a constant predicate only the taken closure runs, and nothing of
    /// the other branch reaches the graph. With a traced predicate both
    /// closures run and the graph selects a branch at run time; the branches
    /// must then yield the same number of values with matching element types
    /// and ranks.
    pub fn cond<P, T, E>(&self, pred: P, then_branch: T, else_branch: E) -> Vec<Sym>
    where
        P: Into<Pred>,
        T: FnOnce(&Tracer) -> Vec<Sym>,
        E: FnOnce(&Tracer) -> Vec<Sym>,
    {
        let pred = match pred.into() {
            Pred::Const(true) => return then_branch(self),
            Pred::Const(false) => return else_branch(self),
            Pred::Traced(pred) => pred,
        };
        let pred_node = self.check_predicate(&pred);
        let (then_block, then_out) = self.trace_block(then_branch);
        let (else_block, else_out) = self.trace_block(else_branch);
        let specs = match join_branches(&then_out, &else_out) {
            Ok(specs) => specs,
            Err(error) => {
                self.record_error(error);
                return then_out;
            }
        };
        let pred_node = match pred_node {
            Some(node) => node,
            None => return then_out,
        };
        let cond = self.builder.borrow_mut().add_node(
            NodeKind::Cond {
                then_block,
                else_block,
            },
            vec![pred_node],
            None,
        );
        self.record_outputs(cond, specs)
    }

    /// Loop while `cond` holds, threading `state` through `body`.
    ///
    /// Constant predicates unroll the loop during tracing, up to the configured
    /// iteration limit. The first traced predicate lowers the remaining loop
    /// into a `While` node. `cond` runs once per evaluated predicate and `body`
    /// once per unrolled or lowered iteration, except that both run a second
    /// time when the body changes the shape of a carried value.
    pub fn while_loop<C, B>(&self, init: Vec<Sym>, mut cond: C, mut body: B) -> Vec<Sym>
    where
        C: FnMut(&Tracer, &[Sym]) -> Pred,
        B: FnMut(&Tracer, &[Sym]) -> Vec<Sym>,
    {
        let mut state = init;
        let mut unrolled = 0;
        loop {
            let carried: Vec<TensorSpec> = state.iter().map(|sym| sym.spec().clone()).collect();
            let (params, header) = self.open_header(&carried);
            match cond(self, &header) {
                Pred::Const(false) => {
                    self.abandon_header();
                    return state;
                }
                Pred::Const(true) => {
                    self.abandon_header();
                    if unrolled == self.max_unroll_iterations {
                        self.record_error(CompilationError::UnrollLimit {
                            limit: self.max_unroll_iterations,
                        });
                        return state;
                    }
                    unrolled += 1;
                    let next = body(self, &state);
                    if next.len() != state.len() {
                        self.record_error(structure_mismatch(
                            "while",
                            format!("loop carries {} values, body yields {}", state.len(), next.len()),
                        ));
                        return state;
                    }
                    state = next;
                }
                Pred::Traced(pred) => {
                    if unrolled > 0 {
                        debug!("Unrolled {} iterations before lowering a loop", unrolled);
                    }
                    let traced = self.close_header(params, header, pred, &mut body);
                    return self.lower_while(state, carried, traced, &mut cond, &mut body);
                }
            }
        }
    }

    /// Open the loop header scope with one parameter per carried value, then
    /// the scope of the condition block.
    fn open_header(&self, carried: &[TensorSpec]) -> (Vec<NodeId>, Vec<Sym>) {
        let params: Vec<NodeId> = {
            let mut builder = self.builder.borrow_mut();
            builder.open_scope();
            carried
                .iter()
                .enumerate()
                .map(|(index, spec)| builder.add_loop_param(index, spec.clone()))
                .collect()
        };
        let header = params
            .iter()
            .zip(carried.iter())
            .map(|(node, spec)| self.sym(*node, spec.clone()))
            .collect();
        self.builder.borrow_mut().open_scope();
        (params, header)
    }

    /// Drop a header whose condition turned out constant.
    fn abandon_header(&self) {
        let mut builder = self.builder.borrow_mut();
        builder.close_scope();
        builder.close_scope();
    }

    /// Close the condition block on `pred`, trace the body against the header
    /// parameters and close the header scope.
    fn close_header<B>(&self, params: Vec<NodeId>, header: Vec<Sym>, pred: Sym, body: &mut B) -> TracedLoop
    where
        B: FnMut(&Tracer, &[Sym]) -> Vec<Sym>,
    {
        let pred_node = self.check_predicate(&pred);
        let cond_block = self
            .builder
            .borrow_mut()
            .close_block(pred_node.into_iter().collect());
        let (body_block, results) = self.trace_block(|tracer| body(tracer, &header));
        self.builder.borrow_mut().close_scope();
        TracedLoop {
            params,
            cond_block,
            body_block,
            results: results.iter().map(|sym| sym.spec().clone()).collect(),
        }
    }

    fn lower_while<C, B>(
        &self,
        init: Vec<Sym>,
        carried: Vec<TensorSpec>,
        traced: TracedLoop,
        cond: &mut C,
        body: &mut B,
    ) -> Vec<Sym>
    where
        C: FnMut(&Tracer, &[Sym]) -> Pred,
        B: FnMut(&Tracer, &[Sym]) -> Vec<Sym>,
    {
        let widened = match check_carried(&carried, &traced.results) {
            CarriedCheck::Accepted => return self.record_while(init, carried, traced),
            CarriedCheck::Widen(widened) => widened,
            CarriedCheck::Mismatch(reason) => {
                self.record_error(structure_mismatch("while", reason));
                return init;
            }
        };
        debug!("Retracing loop with carried specs widened to {:?}", widened);
        let (params, header) = self.open_header(&widened);
        let pred = match cond(self, &header) {
            Pred::Traced(pred) => pred,
            Pred::Const(value) => self.constant(value),
        };
        let retraced = self.close_header(params, header, pred, body);
        match check_carried(&widened, &retraced.results) {
            CarriedCheck::Accepted => self.record_while(init, widened, retraced),
            CarriedCheck::Widen(_) => {
                self.record_error(structure_mismatch(
                    "while",
                    "loop values change shape on every retrace".to_string(),
                ));
                init
            }
            CarriedCheck::Mismatch(reason) => {
                self.record_error(structure_mismatch("while", reason));
                init
            }
        }
    }

    fn record_while(&self, init: Vec<Sym>, carried: Vec<TensorSpec>, traced: TracedLoop) -> Vec<Sym> {
        let inputs: Option<Vec<NodeId>> = init.iter().map(|sym| self.input_node(sym)).collect();
        let inputs = match inputs {
            Some(inputs) => inputs,
            None => return init,
        };
        let node = self.builder.borrow_mut().add_node(
            NodeKind::While {
                params: traced.params,
                cond_block: traced.cond_block,
                body_block: traced.body_block,
            },
            inputs,
            None,
        );
        self.record_outputs(node, carried)
    }
}
