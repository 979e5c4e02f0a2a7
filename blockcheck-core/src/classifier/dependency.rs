// Dependency analysis over class rules.
//
// Nested rules are flattened into one node list; a child keeps a
// back-reference to its parent because it can only run inside the parent's
// resolved range. Edges point from a rule to every rule it needs first.

use super::ClassRule;
use crate::error::ConfigError;
use crate::matchers::MatchSpec;
use crate::types::BlockKind;
use std::collections::HashMap;

/// One rule of the flattened rule tree
#[derive(Debug, Clone)]
pub struct RuleNode {
    pub class_name: String,
    pub match_spec: MatchSpec,
    pub kind: Option<BlockKind>,
    /// Content filter ANDed with the positional predicate
    pub pattern: Option<String>,
    pub parent: Option<usize>,
    /// Class names from the top-level ancestor down to this rule
    pub path: Vec<String>,
}

/// Flatten nested rules depth-first, parents before their children
pub fn flatten_rules(rules: &[ClassRule]) -> Vec<RuleNode> {
    let mut nodes: Vec<RuleNode> = Vec::new();
    // popped in declaration order, so roots and siblings are pushed reversed
    let mut pending: Vec<(&ClassRule, Option<usize>)> =
        rules.iter().rev().map(|rule| (rule, None)).collect();

    while let Some((rule, parent)) = pending.pop() {
        let mut path = parent
            .map(|p| nodes[p].path.clone())
            .unwrap_or_default();
        path.push(rule.class_name.clone());

        let id = nodes.len();
        nodes.push(RuleNode {
            class_name: rule.class_name.clone(),
            match_spec: rule.match_spec.clone(),
            kind: rule.kind,
            pattern: rule.pattern.clone(),
            parent,
            path,
        });
        pending.extend(rule.children.iter().rev().map(|child| (child, Some(id))));
    }
    nodes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

pub struct DependencyAnalyzer<'a> {
    nodes: &'a [RuleNode],
    edges: Vec<Vec<usize>>,
}

impl<'a> DependencyAnalyzer<'a> {
    /// Build the reference graph. Fails if a rule names a class no rule assigns.
    pub fn new(nodes: &'a [RuleNode]) -> Result<Self, ConfigError> {
        let mut targets: HashMap<&str, Vec<usize>> = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            targets.entry(node.class_name.as_str()).or_default().push(id);
        }

        let mut edges = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut deps: Vec<usize> = Vec::new();
            if let Some(parent) = node.parent {
                deps.push(parent);
            }
            for class_name in node.match_spec.referenced_classes() {
                let Some(providers) = targets.get(class_name) else {
                    return Err(ConfigError::UnknownClass {
                        rule: node.path.clone(),
                        class: class_name.to_string(),
                    });
                };
                for &provider in providers {
                    if !deps.contains(&provider) {
                        deps.push(provider);
                    }
                }
            }
            edges.push(deps);
        }

        Ok(Self { nodes, edges })
    }

    /// Node ids ordered so every node comes after everything it depends on.
    ///
    /// Roots and edges are walked in declaration order, so rules without a
    /// dependency relation keep their declared order. The walk keeps its own
    /// stack of `(node, next edge)` frames, so chain length is not bounded by
    /// the thread stack.
    pub fn evaluation_order(&self) -> Result<Vec<usize>, ConfigError> {
        let mut state = vec![VisitState::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.nodes.len() {
            if state[root] != VisitState::Unvisited {
                continue;
            }
            state[root] = VisitState::InProgress;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (id, next_edge) = *frame;
                match self.edges[id].get(next_edge) {
                    Some(&dep) => {
                        frame.1 += 1;
                        match state[dep] {
                            VisitState::InProgress => return Err(self.cycle_error(&stack, dep)),
                            VisitState::Unvisited => {
                                state[dep] = VisitState::InProgress;
                                stack.push((dep, 0));
                            }
                            VisitState::Done => {}
                        }
                    }
                    None => {
                        stack.pop();
                        state[id] = VisitState::Done;
                        order.push(id);
                    }
                }
            }
        }
        Ok(order)
    }

    fn cycle_error(&self, stack: &[(usize, usize)], repeated: usize) -> ConfigError {
        let start = stack.iter().position(|&(id, _)| id == repeated).unwrap_or(0);
        let cycle = stack[start..]
            .iter()
            .map(|&(id, _)| id)
            .chain(std::iter::once(repeated))
            .map(|id| self.nodes[id].class_name.clone())
            .collect();
        ConfigError::CyclicDependency { cycle }
    }
}
