//! Unbalanced binary search tree keyed by request id.
//!
//! Nodes live in a dense arena and refer to each other by index. Every
//! operation walks the tree with a loop or an explicit stack, so a
//! degenerate chain built from sorted ids costs time but never call stack.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::request::ServiceRequest;

type NodeIndex = usize;

#[derive(Debug, Clone)]
struct Node {
    request: ServiceRequest,
    left: Option<NodeIndex>,
    right: Option<NodeIndex>,
}

/// The link a node hangs from.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Root,
    Left(NodeIndex),
    Right(NodeIndex),
}

/// Baseline ordered index with no rebalancing.
#[derive(Debug, Clone, Default)]
pub struct SearchTree {
    nodes: Vec<Node>,
    root: Option<NodeIndex>,
}

impl SearchTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    fn key(&self, index: NodeIndex) -> u64 {
        self.nodes[index].request.id
    }

    fn link(&self, slot: Slot) -> Option<NodeIndex> {
        match slot {
            Slot::Root => self.root,
            Slot::Left(parent) => self.nodes[parent].left,
            Slot::Right(parent) => self.nodes[parent].right,
        }
    }

    fn set_link(&mut self, slot: Slot, child: Option<NodeIndex>) {
        match slot {
            Slot::Root => self.root = child,
            Slot::Left(parent) => self.nodes[parent].left = child,
            Slot::Right(parent) => self.nodes[parent].right = child,
        }
    }

    /// Finds the slot holding `id`, or the empty slot where it would go.
    fn locate(&self, id: u64) -> Slot {
        let mut slot = Slot::Root;
        while let Some(index) = self.link(slot) {
            slot = match id.cmp(&self.key(index)) {
                Ordering::Less => Slot::Left(index),
                Ordering::Greater => Slot::Right(index),
                Ordering::Equal => return slot,
            };
        }
        slot
    }

    /// Inserts a request. A duplicate id replaces the stored record in place.
    ///
    /// Returns true when the id was not present before.
    pub fn insert(&mut self, request: ServiceRequest) -> bool {
        let slot = self.locate(request.id);
        match self.link(slot) {
            Some(index) => {
                self.nodes[index].request = request;
                false
            }
            None => {
                let index = self.nodes.len();
                self.nodes.push(Node {
                    request,
                    left: None,
                    right: None,
                });
                self.set_link(slot, Some(index));
                true
            }
        }
    }

    pub fn search(&self, id: u64) -> Option<&ServiceRequest> {
        self.link(self.locate(id)).map(|index| &self.nodes[index].request)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.search(id).is_some()
    }

    /// Removes `id`, returning its record if it was present.
    pub fn delete(&mut self, id: u64) -> Option<ServiceRequest> {
        let slot = self.locate(id);
        let target = self.link(slot)?;

        let (victim_slot, victim) = match (self.nodes[target].left, self.nodes[target].right) {
            (Some(_), Some(right)) => {
                // Two children: the in-order successor takes the target's place.
                let mut successor_slot = Slot::Right(target);
                let mut successor = right;
                while let Some(left) = self.nodes[successor].left {
                    successor_slot = Slot::Left(successor);
                    successor = left;
                }
                self.swap_requests(target, successor);
                (successor_slot, successor)
            }
            _ => (slot, target),
        };

        // The victim has at most one child here.
        let child = self.nodes[victim].left.or(self.nodes[victim].right);
        self.set_link(victim_slot, child);
        Some(self.release(victim))
    }

    fn swap_requests(&mut self, a: NodeIndex, b: NodeIndex) {
        let (low, high) = (a.min(b), a.max(b));
        let (head, tail) = self.nodes.split_at_mut(high);
        std::mem::swap(&mut head[low].request, &mut tail[0].request);
    }

    /// Drops an already unlinked node from the arena, keeping it dense.
    fn release(&mut self, index: NodeIndex) -> ServiceRequest {
        let removed = self.nodes.swap_remove(index);
        let moved_from = self.nodes.len();
        if index < moved_from {
            // The last node now lives at `index`; repoint whoever linked to it.
            let key = self.key(index);
            let mut slot = Slot::Root;
            while let Some(current) = self.link(slot) {
                if current == moved_from {
                    self.set_link(slot, Some(index));
                    break;
                }
                slot = if key < self.key(current) {
                    Slot::Left(current)
                } else {
                    Slot::Right(current)
                };
            }
        }
        removed.request
    }

    pub fn in_order(&self) -> Vec<&ServiceRequest> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = Vec::new();
        let mut current = self.root;
        loop {
            while let Some(index) = current {
                stack.push(index);
                current = self.nodes[index].left;
            }
            let Some(index) = stack.pop() else { break };
            out.push(&self.nodes[index].request);
            current = self.nodes[index].right;
        }
        out
    }

    pub fn pre_order(&self) -> Vec<&ServiceRequest> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeIndex> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            out.push(&node.request);
            stack.extend(node.right);
            stack.extend(node.left);
        }
        out
    }

    pub fn post_order(&self) -> Vec<&ServiceRequest> {
        // Node-right-left preorder, reversed, is left-right-node.
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeIndex> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            out.push(&node.request);
            stack.extend(node.left);
            stack.extend(node.right);
        }
        out.reverse();
        out
    }

    /// All records with `min <= id <= max`, ascending.
    pub fn range_search(&self, min: u64, max: u64) -> Vec<&ServiceRequest> {
        let mut out = Vec::new();
        if min > max {
            return out;
        }
        let mut stack = Vec::new();
        let mut current = self.root;
        loop {
            while let Some(index) = current {
                stack.push(index);
                current = if self.key(index) > min {
                    self.nodes[index].left
                } else {
                    None
                };
            }
            let Some(index) = stack.pop() else { break };
            let key = self.key(index);
            if (min..=max).contains(&key) {
                out.push(&self.nodes[index].request);
            }
            current = if key < max { self.nodes[index].right } else { None };
        }
        out
    }

    pub fn min(&self) -> Option<&ServiceRequest> {
        let mut index = self.root?;
        while let Some(left) = self.nodes[index].left {
            index = left;
        }
        Some(&self.nodes[index].request)
    }

    pub fn max(&self) -> Option<&ServiceRequest> {
        let mut index = self.root?;
        while let Some(right) = self.nodes[index].right {
            index = right;
        }
        Some(&self.nodes[index].request)
    }

    /// Edges on the longest root-to-leaf path; -1 when empty.
    pub fn height(&self) -> i32 {
        let mut height = -1;
        let mut level: VecDeque<NodeIndex> = self.root.into_iter().collect();
        while !level.is_empty() {
            height += 1;
            for _ in 0..level.len() {
                if let Some(index) = level.pop_front() {
                    level.extend(self.nodes[index].left);
                    level.extend(self.nodes[index].right);
                }
            }
        }
        height
    }
}
