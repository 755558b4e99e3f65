use std::collections::HashSet;

use super::{Block, Graph, Node, NodeId, NodeKind};

impl Graph {
    /// Visit every node reachable from the body, nested blocks included, in
    /// execution order.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&Node),
    {
        self.walk_block(&self.body, &mut visit);
    }

    fn walk_block<F>(&self, block: &Block, visit: &mut F)
    where
        F: FnMut(&Node),
    {
        for id in block.nodes.iter() {
            let node = match self.get(*id) {
                Some(node) => node,
                None => continue,
            };
            visit(node);
            match &node.kind {
                NodeKind::Cond {
                    then_block,
                    else_block,
                } => {
                    self.walk_block(then_block, visit);
                    self.walk_block(else_block, visit);
                }
                NodeKind::While {
                    cond_block,
                    body_block,
                    ..
                } => {
                    self.walk_block(cond_block, visit);
                    self.walk_block(body_block, visit);
                }
                _ => {}
            }
        }
    }

    /// Names of the recorded operations, in execution order.
    pub fn operation_names(&self) -> Vec<String> {
        let mut names = vec![];
        self.walk(|node| {
            if let NodeKind::Op(op) = &node.kind {
                names.push(op.name());
            }
        });
        names
    }

    pub fn count_ops(&self, name: &str) -> usize {
        self.operation_names()
            .iter()
            .filter(|op| op.as_str() == name)
            .count()
    }

    pub fn count_nodes<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&NodeKind) -> bool,
    {
        let mut count = 0;
        self.walk(|node| {
            if predicate(&node.kind) {
                count += 1;
            }
        });
        count
    }

    pub fn has_control_flow(&self) -> bool {
        self.count_nodes(|kind| matches!(kind, NodeKind::Cond { .. } | NodeKind::While { .. })) > 0
    }

    /// Nodes recorded during tracing that no block executes.
    pub fn unreachable_nodes(&self) -> Vec<NodeId> {
        let mut reachable: HashSet<NodeId> = self.inputs.iter().cloned().collect();
        self.walk(|node| {
            reachable.insert(node.id);
            if let NodeKind::While { params, .. } = &node.kind {
                reachable.extend(params.iter().cloned());
            }
        });
        self.nodes
            .iter()
            .map(|node| node.id)
            .filter(|id| !reachable.contains(id))
            .collect()
    }
}
