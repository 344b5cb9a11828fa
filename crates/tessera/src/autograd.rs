//! Minimal reverse-mode gradient tape.
//!
//! The codecs are not differentiable, so the layer registers each stage as a
//! [`StraightThrough`] node: the gradient w.r.t. the stage input is the
//! gradient w.r.t. its output, unchanged. Callers that build a larger graph
//! can record their own [`BackwardNode`]s on the same tape.
//!
//! Gradients are host `f32` vectors with one entry per element of the node's
//! layout.

use std::fmt;

use tessera_core::{Error, Result, TensorLayout};

/// Handle to a node on a [`Tape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A recorded operation that can propagate gradients to its inputs.
pub trait BackwardNode: Send {
    fn name(&self) -> &'static str;

    /// Input nodes, in the order `backward` returns their gradients.
    fn parents(&self) -> &[NodeId];

    /// Gradients w.r.t. each parent, given the gradient w.r.t. this node.
    fn backward(&self, grad_output: &[f32]) -> Result<Vec<Vec<f32>>>;
}

/// Identity gradient through a non-differentiable stage.
#[derive(Debug, Clone)]
pub struct StraightThrough {
    name: &'static str,
    input: [NodeId; 1],
}

impl StraightThrough {
    pub fn new(name: &'static str, input: NodeId) -> Self {
        StraightThrough {
            name,
            input: [input],
        }
    }
}

impl BackwardNode for StraightThrough {
    fn name(&self) -> &'static str {
        self.name
    }

    fn parents(&self) -> &[NodeId] {
        &self.input
    }

    fn backward(&self, grad_output: &[f32]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![grad_output.to_vec()])
    }
}

struct Node {
    layout: TensorLayout,
    op: Option<Box<dyn BackwardNode>>,
}

/// Append-only record of operations, replayed in reverse by [`Tape::backward`].
#[derive(Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input with no producer.
    pub fn leaf(&mut self, layout: TensorLayout) -> NodeId {
        self.push(layout, None)
    }

    /// Register the output of `op`.
    pub fn record(&mut self, layout: TensorLayout, op: Box<dyn BackwardNode>) -> NodeId {
        self.push(layout, Some(op))
    }

    fn push(&mut self, layout: TensorLayout, op: Option<Box<dyn BackwardNode>>) -> NodeId {
        self.nodes.push(Node { layout, op });
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Layout registered for `id`.
    pub fn layout(&self, id: NodeId) -> Option<&TensorLayout> {
        self.nodes.get(id.0).map(|n| &n.layout)
    }

    /// Name of the op that produced `id`, or `None` for leaves.
    pub fn op_name(&self, id: NodeId) -> Option<&'static str> {
        self.nodes.get(id.0)?.op.as_ref().map(|op| op.name())
    }

    /// Backpropagate `seed` (the gradient w.r.t. `output`) to every node
    /// recorded at or before `output`.
    pub fn backward(&self, output: NodeId, seed: Vec<f32>) -> Result<Gradients> {
        let node = self
            .nodes
            .get(output.0)
            .ok_or_else(|| Error::codec("tape", format!("unknown node {}", output.0)))?;
        if seed.len() != node.layout.numel() {
            return Err(Error::shape_mismatch(node.layout.numel(), seed.len()));
        }

        let mut grads: Vec<Option<Vec<f32>>> = vec![None; output.0 + 1];
        grads[output.0] = Some(seed);

        for index in (0..=output.0).rev() {
            let (Some(op), Some(grad)) = (&self.nodes[index].op, &grads[index]) else {
                continue;
            };
            let parent_grads = op.backward(grad)?;
            if parent_grads.len() != op.parents().len() {
                return Err(Error::codec(
                    "tape",
                    format!(
                        "{} returned {} gradients for {} inputs",
                        op.name(),
                        parent_grads.len(),
                        op.parents().len()
                    ),
                ));
            }
            for (parent, g) in op.parents().iter().zip(parent_grads) {
                if parent.0 >= index {
                    return Err(Error::codec(
                        "tape",
                        format!("{} depends on later node {}", op.name(), parent.0),
                    ));
                }
                let expected = self.nodes[parent.0].layout.numel();
                if g.len() != expected {
                    return Err(Error::shape_mismatch(expected, g.len()));
                }
                match &mut grads[parent.0] {
                    Some(acc) => acc.iter_mut().zip(&g).for_each(|(a, b)| *a += b),
                    slot @ None => *slot = Some(g),
                }
            }
        }

        Ok(Gradients { grads })
    }
}

impl fmt::Debug for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops: Vec<&str> = self
            .nodes
            .iter()
            .map(|n| n.op.as_ref().map_or("leaf", |op| op.name()))
            .collect();
        f.debug_struct("Tape").field("nodes", &ops).finish()
    }
}

/// Result of [`Tape::backward`].
#[derive(Debug, Clone)]
pub struct Gradients {
    grads: Vec<Option<Vec<f32>>>,
}

impl Gradients {
    /// Gradient w.r.t. `id`, or `None` if `id` does not influence the output.
    pub fn wrt(&self, id: NodeId) -> Option<&[f32]> {
        self.grads.get(id.0)?.as_deref()
    }
}
