//! Height-balanced (AVL) search tree keyed by request id.
//!
//! Each node owns its children outright and caches its height and subtree
//! size. Rotations run bottom-up on the way out of every insert and delete,
//! so height stays logarithmic and recursion depth with it.

use std::cmp::Ordering;

use crate::request::ServiceRequest;

type Link = Option<Box<AvlNode>>;

#[derive(Debug, Clone)]
struct AvlNode {
    request: ServiceRequest,
    /// Leaf height is 0.
    height: i32,
    size: usize,
    left: Link,
    right: Link,
}

impl AvlNode {
    fn leaf(request: ServiceRequest) -> Box<Self> {
        Box::new(Self {
            request,
            height: 0,
            size: 1,
            left: None,
            right: None,
        })
    }

    fn id(&self) -> u64 {
        self.request.id
    }

    fn update(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.size = 1 + size(&self.left) + size(&self.right);
    }

    fn balance_factor(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height(link: &Link) -> i32 {
    link.as_ref().map_or(-1, |node| node.height)
}

fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn rotate_right(mut node: Box<AvlNode>) -> Box<AvlNode> {
    let Some(mut pivot) = node.left.take() else {
        return node;
    };
    node.left = pivot.right.take();
    node.update();
    pivot.right = Some(node);
    pivot.update();
    pivot
}

fn rotate_left(mut node: Box<AvlNode>) -> Box<AvlNode> {
    let Some(mut pivot) = node.right.take() else {
        return node;
    };
    node.right = pivot.left.take();
    node.update();
    pivot.left = Some(node);
    pivot.update();
    pivot
}

/// Restores |balance| <= 1 at `node`, assuming both subtrees already satisfy it.
fn rebalance(mut node: Box<AvlNode>) -> Box<AvlNode> {
    node.update();
    let balance = node.balance_factor();
    if balance > 1 {
        if node.left.as_ref().is_some_and(|left| left.balance_factor() < 0) {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }
    if balance < -1 {
        if node.right.as_ref().is_some_and(|right| right.balance_factor() > 0) {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }
    node
}

fn insert_at(link: Link, request: ServiceRequest, inserted: &mut bool) -> Box<AvlNode> {
    let Some(mut node) = link else {
        *inserted = true;
        return AvlNode::leaf(request);
    };
    match request.id.cmp(&node.id()) {
        Ordering::Less => node.left = Some(insert_at(node.left.take(), request, inserted)),
        Ordering::Greater => node.right = Some(insert_at(node.right.take(), request, inserted)),
        Ordering::Equal => {
            node.request = request;
            return node;
        }
    }
    rebalance(node)
}

fn delete_at(link: Link, id: u64, removed: &mut Option<ServiceRequest>) -> Link {
    let mut node = link?;
    match id.cmp(&node.id()) {
        Ordering::Less => node.left = delete_at(node.left.take(), id, removed),
        Ordering::Greater => node.right = delete_at(node.right.take(), id, removed),
        Ordering::Equal => match (node.left.take(), node.right.take()) {
            (None, None) => {
                *removed = Some(node.request);
                return None;
            }
            (Some(child), None) | (None, Some(child)) => {
                *removed = Some(node.request);
                return Some(child);
            }
            (left, Some(right)) => {
                let (rest, successor) = take_min(right);
                node.left = left;
                node.right = rest;
                *removed = Some(std::mem::replace(&mut node.request, successor));
            }
        },
    }
    Some(rebalance(node))
}

/// Detaches the smallest record of a subtree, returning what remains.
fn take_min(mut node: Box<AvlNode>) -> (Link, ServiceRequest) {
    match node.left.take() {
        None => {
            let AvlNode { request, right, .. } = *node;
            (right, request)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn collect_in_order<'a>(link: &'a Link, out: &mut Vec<&'a ServiceRequest>) {
    if let Some(node) = link {
        collect_in_order(&node.left, out);
        out.push(&node.request);
        collect_in_order(&node.right, out);
    }
}

fn collect_pre_order<'a>(link: &'a Link, out: &mut Vec<&'a ServiceRequest>) {
    if let Some(node) = link {
        out.push(&node.request);
        collect_pre_order(&node.left, out);
        collect_pre_order(&node.right, out);
    }
}

fn collect_post_order<'a>(link: &'a Link, out: &mut Vec<&'a ServiceRequest>) {
    if let Some(node) = link {
        collect_post_order(&node.left, out);
        collect_post_order(&node.right, out);
        out.push(&node.request);
    }
}

fn collect_range<'a>(link: &'a Link, min: u64, max: u64, out: &mut Vec<&'a ServiceRequest>) {
    let Some(node) = link else { return };
    let id = node.id();
    if id > min {
        collect_range(&node.left, min, max, out);
    }
    if (min..=max).contains(&id) {
        out.push(&node.request);
    }
    if id < max {
        collect_range(&node.right, min, max, out);
    }
}

/// Height of a subtree if every node in it is balanced.
fn checked_height(link: &Link) -> Option<i32> {
    let Some(node) = link else { return Some(-1) };
    let left = checked_height(&node.left)?;
    let right = checked_height(&node.right)?;
    ((left - right).abs() <= 1).then_some(1 + left.max(right))
}

/// Ordered index with guaranteed O(log n) height and rank queries.
#[derive(Debug, Clone, Default)]
pub struct BalancedTree {
    root: Link,
}

impl BalancedTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Inserts a request, replacing the record of an existing id.
    ///
    /// Returns true when the id was not present before.
    pub fn insert(&mut self, request: ServiceRequest) -> bool {
        let mut inserted = false;
        self.root = Some(insert_at(self.root.take(), request, &mut inserted));
        inserted
    }

    pub fn delete(&mut self, id: u64) -> Option<ServiceRequest> {
        let mut removed = None;
        self.root = delete_at(self.root.take(), id, &mut removed);
        removed
    }

    pub fn search(&self, id: u64) -> Option<&ServiceRequest> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match id.cmp(&node.id()) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.request),
            };
        }
        None
    }

    pub fn contains(&self, id: u64) -> bool {
        self.search(id).is_some()
    }

    pub fn in_order(&self) -> Vec<&ServiceRequest> {
        let mut out = Vec::with_capacity(self.len());
        collect_in_order(&self.root, &mut out);
        out
    }

    pub fn pre_order(&self) -> Vec<&ServiceRequest> {
        let mut out = Vec::with_capacity(self.len());
        collect_pre_order(&self.root, &mut out);
        out
    }

    pub fn post_order(&self) -> Vec<&ServiceRequest> {
        let mut out = Vec::with_capacity(self.len());
        collect_post_order(&self.root, &mut out);
        out
    }

    /// All records with `min <= id <= max`, ascending.
    pub fn range_search(&self, min: u64, max: u64) -> Vec<&ServiceRequest> {
        let mut out = Vec::new();
        if min <= max {
            collect_range(&self.root, min, max, &mut out);
        }
        out
    }

    pub fn min(&self) -> Option<&ServiceRequest> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Some(&node.request)
    }

    pub fn max(&self) -> Option<&ServiceRequest> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        Some(&node.request)
    }

    /// -1 when empty.
    pub fn height(&self) -> i32 {
        height(&self.root)
    }

    /// The k-th smallest record, 1-indexed.
    pub fn kth_smallest(&self, k: usize) -> Option<&ServiceRequest> {
        if k == 0 || k > self.len() {
            return None;
        }
        let mut rank = k;
        let mut node = self.root.as_deref()?;
        loop {
            let left = size(&node.left);
            match rank.cmp(&(left + 1)) {
                Ordering::Less => node = node.left.as_deref()?,
                Ordering::Equal => return Some(&node.request),
                Ordering::Greater => {
                    rank -= left + 1;
                    node = node.right.as_deref()?;
                }
            }
        }
    }

    /// Largest record with id strictly below `id`; `id` need not be present.
    pub fn predecessor(&self, id: u64) -> Option<&ServiceRequest> {
        let mut best = None;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            if node.id() < id {
                best = Some(&node.request);
                current = node.right.as_deref();
            } else {
                current = node.left.as_deref();
            }
        }
        best
    }

    /// Smallest record with id strictly above `id`; `id` need not be present.
    pub fn successor(&self, id: u64) -> Option<&ServiceRequest> {
        let mut best = None;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            if node.id() > id {
                best = Some(&node.request);
                current = node.left.as_deref();
            } else {
                current = node.right.as_deref();
            }
        }
        best
    }

    /// Recomputes every height from scratch and checks the AVL invariant.
    pub fn is_balanced(&self) -> bool {
        checked_height(&self.root).is_some()
    }
}
