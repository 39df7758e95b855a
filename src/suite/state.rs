use tracing::trace;

use crate::tree::{BlockTree, NodeId};

use super::Phase;

/// One open block on the cursor stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub node: NodeId,
    /// Index of the next stored child to match during Run.
    pub next_child: usize,
}

/// Per-suite execution state: phase, tree and the `current node` cursor.
#[derive(Debug)]
pub struct ExecutionState {
    pub phase: Phase,
    pub tree: BlockTree,
    frames: Vec<Frame>,
}

impl ExecutionState {
    pub fn new(suite: &str) -> Self {
        Self {
            phase: Phase::Discovery,
            tree: BlockTree::new(suite),
            frames: Vec::new(),
        }
    }

    pub fn current(&self) -> NodeId {
        self.frames
            .last()
            .map(|f| f.node)
            .unwrap_or_else(|| self.tree.root())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(crate) fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub(crate) fn push(&mut self, node: NodeId) {
        trace!(node = %node, depth = self.frames.len() + 1, "push cursor");
        self.frames.push(Frame {
            node,
            next_child: 0,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();
        if let Some(f) = &frame {
            trace!(node = %f.node, depth = self.frames.len(), "pop cursor");
        }
        frame
    }

    /// Switches to `phase` with an empty cursor stack.
    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.frames.clear();
    }
}
