//! Interval balanced search tree
//!
//! An AVL tree keyed on the low bound of closed `[low, high]` intervals. Every
//! node caches the largest `high` found in its subtree, which lets overlap
//! queries skip whole branches.
//!
//! Items are located by identity (`PartialEq` on the stored item) rather than
//! by their bounds, so two items with the same interval can be told apart.

use std::cmp::{max, Ordering};

/// Closed bit interval `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub low: usize,
    pub high: usize,
}

impl Interval {
    pub fn new(low: usize, high: usize) -> Self {
        Self { low, high }
    }

    /// Interval covering `size` bits starting at `start`
    ///
    /// `size` must be at least 1. The high bound saturates at `usize::MAX`.
    pub fn from_start_size(start: usize, size: usize) -> Self {
        Self {
            low: start,
            high: start.saturating_add(size.saturating_sub(1)),
        }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

type Link<T> = Option<Box<Node<T>>>;

#[derive(Debug, Clone)]
struct Node<T> {
    interval: Interval,
    max: usize,
    height: usize,
    item: T,
    left: Link<T>,
    right: Link<T>,
}

impl<T> Node<T> {
    fn new(interval: Interval, item: T) -> Box<Self> {
        Box::new(Self {
            interval,
            max: interval.high,
            height: 1,
            item,
            left: None,
            right: None,
        })
    }

    fn update(&mut self) {
        self.height = 1 + max(height(&self.left), height(&self.right));
        let mut m = self.interval.high;
        if let Some(left) = &self.left {
            m = max(m, left.max);
        }
        if let Some(right) = &self.right {
            m = max(m, right.max);
        }
        self.max = m;
    }

    fn balance_factor(&self) -> isize {
        height(&self.left) as isize - height(&self.right) as isize
    }
}

fn height<T>(link: &Link<T>) -> usize {
    link.as_ref().map_or(0, |n| n.height)
}

fn rotate_right<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    match node.left.take() {
        Some(mut pivot) => {
            node.left = pivot.right.take();
            node.update();
            pivot.right = Some(node);
            pivot.update();
            pivot
        }
        None => node,
    }
}

fn rotate_left<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    match node.right.take() {
        Some(mut pivot) => {
            node.right = pivot.left.take();
            node.update();
            pivot.left = Some(node);
            pivot.update();
            pivot
        }
        None => node,
    }
}

fn rebalance<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    node.update();
    let bf = node.balance_factor();

    if bf > 1 {
        if let Some(left) = node.left.take() {
            node.left = Some(if left.balance_factor() < 0 {
                rotate_left(left)
            } else {
                left
            });
        }
        return rotate_right(node);
    }

    if bf < -1 {
        if let Some(right) = node.right.take() {
            node.right = Some(if right.balance_factor() > 0 {
                rotate_right(right)
            } else {
                right
            });
        }
        return rotate_left(node);
    }

    node
}

fn insert_node<T>(link: Link<T>, interval: Interval, item: T) -> Box<Node<T>> {
    match link {
        None => Node::new(interval, item),
        Some(mut node) => {
            // Equal lows go right
            if interval.low < node.interval.low {
                node.left = Some(insert_node(node.left.take(), interval, item));
            } else {
                node.right = Some(insert_node(node.right.take(), interval, item));
            }
            rebalance(node)
        }
    }
}

/// Detach the leftmost node of a subtree, returning the rest and the node
fn take_min<T>(mut node: Box<Node<T>>) -> (Link<T>, Box<Node<T>>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn delete_node<T: PartialEq>(
    link: Link<T>,
    low: usize,
    item: &T,
    removed: &mut Option<(Interval, T)>,
) -> Link<T> {
    let mut node = link?;

    match low.cmp(&node.interval.low) {
        Ordering::Less => {
            node.left = delete_node(node.left.take(), low, item, removed);
        }
        Ordering::Greater => {
            node.right = delete_node(node.right.take(), low, item, removed);
        }
        Ordering::Equal if node.item == *item => {
            let Node {
                interval,
                item: found,
                left,
                right,
                ..
            } = *node;
            *removed = Some((interval, found));

            return match (left, right) {
                (None, None) => None,
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (Some(l), Some(r)) => {
                    let (rest, mut successor) = take_min(r);
                    successor.left = Some(l);
                    successor.right = rest;
                    Some(rebalance(successor))
                }
            };
        }
        Ordering::Equal => {
            // Rotations can leave equal lows on either side
            node.left = delete_node(node.left.take(), low, item, removed);
            if removed.is_none() {
                node.right = delete_node(node.right.take(), low, item, removed);
            }
        }
    }

    Some(rebalance(node))
}

fn find<'a, T: PartialEq>(
    link: &'a Link<T>,
    query: Interval,
    skip: Option<&T>,
) -> Option<(Interval, &'a T)> {
    let node = link.as_deref()?;
    if node.max < query.low {
        return None;
    }

    if let Some(hit) = find(&node.left, query, skip) {
        return Some(hit);
    }

    if node.interval.overlaps(&query) && skip != Some(&node.item) {
        return Some((node.interval, &node.item));
    }

    // Everything on the right starts at or after this node
    if node.interval.low > query.high {
        return None;
    }

    find(&node.right, query, skip)
}

/// Self-balancing interval tree
#[derive(Debug, Clone)]
pub struct IntervalTree<T> {
    root: Link<T>,
    len: usize,
}

impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<T: PartialEq> IntervalTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree, 0 when empty
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    /// Largest `high` bound stored in the tree
    pub fn max_high(&self) -> Option<usize> {
        self.root.as_ref().map(|n| n.max)
    }

    /// Insert an item. Intervals with `low > high` are silently dropped.
    pub fn insert(&mut self, interval: Interval, item: T) {
        if interval.low > interval.high {
            return;
        }
        self.root = Some(insert_node(self.root.take(), interval, item));
        self.len += 1;
    }

    /// Remove the item stored with the given low bound
    pub fn delete(&mut self, low: usize, item: &T) -> Option<(Interval, T)> {
        let mut removed = None;
        self.root = delete_node(self.root.take(), low, item, &mut removed);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Any stored item overlapping `query`
    pub fn intersects(&self, query: Interval) -> Option<&T> {
        find(&self.root, query, None).map(|(_, item)| item)
    }

    /// Any stored item other than `skip` overlapping `query`
    pub fn intersects_except(&self, query: Interval, skip: &T) -> Option<&T> {
        find(&self.root, query, Some(skip)).map(|(_, item)| item)
    }

    /// Whether `item` could move to `interval` without overlapping another item
    pub fn can_update(&self, item: &T, interval: Interval) -> bool {
        if self.len <= 1 {
            return true;
        }
        self.intersects_except(interval, item).is_none()
    }

    /// Move `item`, currently stored at `old_low`, to `interval`
    ///
    /// Returns false if the item was not found.
    pub fn update(&mut self, old_low: usize, item: &T, interval: Interval) -> bool {
        match self.delete(old_low, item) {
            Some((_, found)) => {
                self.insert(interval, found);
                true
            }
            None => false,
        }
    }

    /// Left-root-right traversal
    pub fn in_order(&self) -> Iter<'_, T> {
        Iter::new(&self.root, false)
    }

    /// Right-root-left traversal
    pub fn reverse_order(&self) -> Iter<'_, T> {
        Iter::new(&self.root, true)
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }
}

/// Lazy traversal over an [`IntervalTree`]
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
    reverse: bool,
}

impl<'a, T> Iter<'a, T> {
    fn new(root: &'a Link<T>, reverse: bool) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            reverse,
        };
        iter.push_branch(root.as_deref());
        iter
    }

    fn push_branch(&mut self, mut node: Option<&'a Node<T>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = if self.reverse {
                n.right.as_deref()
            } else {
                n.left.as_deref()
            };
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Interval, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let next = if self.reverse {
            node.left.as_deref()
        } else {
            node.right.as_deref()
        };
        self.push_branch(next);
        Some((node.interval, &node.item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_start_size_saturates() {
        let interval = Interval::from_start_size(usize::MAX - 2, 8);
        assert_eq!(interval.low, usize::MAX - 2);
        assert_eq!(interval.high, usize::MAX);
        assert_eq!(Interval::from_start_size(8, 8), Interval::new(8, 15));
    }

    fn lows(tree: &IntervalTree<u32>) -> Vec<usize> {
        tree.in_order().map(|(i, _)| i.low).collect()
    }

    fn check_invariants<T>(link: &Link<T>) -> (usize, usize) {
        match link {
            None => (0, 0),
            Some(node) => {
                let (lh, lmax) = check_invariants(&node.left);
                let (rh, rmax) = check_invariants(&node.right);
                assert!((lh as isize - rh as isize).abs() <= 1, "unbalanced node");
                assert_eq!(node.height, 1 + lh.max(rh));
                assert_eq!(node.max, node.interval.high.max(lmax).max(rmax));
                (node.height, node.max)
            }
        }
    }

    #[test]
    fn test_insert_keeps_order_and_balance() {
        let mut tree = IntervalTree::new();
        for i in 0..64u32 {
            tree.insert(Interval::new(i as usize * 8, i as usize * 8 + 7), i);
        }
        assert_eq!(tree.len(), 64);
        assert_eq!(lows(&tree), (0..64).map(|i| i * 8).collect::<Vec<_>>());
        check_invariants(&tree.root);
        // 1.44 * log2(64) = 8.64
        assert!(tree.height() <= 8);
        assert_eq!(tree.max_high(), Some(511));
    }

    #[test]
    fn test_inverted_interval_is_dropped() {
        let mut tree = IntervalTree::new();
        tree.insert(Interval::new(5, 4), 1u32);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_intersects() {
        let mut tree = IntervalTree::new();
        tree.insert(Interval::new(0, 7), 1u32);
        tree.insert(Interval::new(16, 31), 2);
        tree.insert(Interval::new(40, 47), 3);

        assert_eq!(tree.intersects(Interval::new(8, 15)), None);
        assert_eq!(tree.intersects(Interval::new(7, 8)), Some(&1));
        assert_eq!(tree.intersects(Interval::new(20, 21)), Some(&2));
        assert_eq!(tree.intersects(Interval::new(32, 63)), Some(&3));
        assert_eq!(tree.intersects(Interval::new(48, 63)), None);
    }

    #[test]
    fn test_intersects_finds_long_interval_in_left_subtree() {
        let mut tree = IntervalTree::new();
        tree.insert(Interval::new(0, 40), 1u32);
        tree.insert(Interval::new(50, 51), 2);
        tree.insert(Interval::new(60, 61), 3);

        // The wide interval sits left of the root after rotation
        assert_eq!(tree.intersects(Interval::new(38, 39)), Some(&1));
    }

    #[test]
    fn test_delete_by_identity() {
        let mut tree = IntervalTree::new();
        for i in 0..16u32 {
            tree.insert(Interval::new(i as usize * 4, i as usize * 4 + 3), i);
        }

        let removed = tree.delete(20, &5);
        assert_eq!(removed, Some((Interval::new(20, 23), 5)));
        assert_eq!(tree.len(), 15);
        assert!(!lows(&tree).contains(&20));
        check_invariants(&tree.root);

        // Wrong identity at a valid low is not removed
        assert_eq!(tree.delete(24, &99), None);
        assert_eq!(tree.len(), 15);
    }

    #[test]
    fn test_delete_equal_lows() {
        let mut tree = IntervalTree::new();
        for i in 0..8u32 {
            tree.insert(Interval::new(10, 10 + i as usize), i);
        }
        for i in (0..8u32).rev() {
            assert!(tree.delete(10, &i).is_some());
            check_invariants(&tree.root);
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn test_can_update_skips_self() {
        let mut tree = IntervalTree::new();
        tree.insert(Interval::new(0, 7), 1u32);
        tree.insert(Interval::new(8, 15), 2);

        // Growing over itself is fine, growing into the neighbour is not
        assert!(tree.can_update(&1, Interval::new(0, 3)));
        assert!(!tree.can_update(&1, Interval::new(0, 8)));
        assert!(tree.can_update(&2, Interval::new(8, 20)));
    }

    #[test]
    fn test_update_relocates() {
        let mut tree = IntervalTree::new();
        tree.insert(Interval::new(0, 7), 1u32);
        tree.insert(Interval::new(8, 15), 2);

        assert!(tree.update(0, &1, Interval::new(16, 23)));
        assert_eq!(lows(&tree), vec![8, 16]);
        assert!(!tree.update(0, &1, Interval::new(0, 1)));
    }

    #[test]
    fn test_reverse_order() {
        let mut tree = IntervalTree::new();
        for i in [3u32, 1, 2, 0] {
            tree.insert(Interval::new(i as usize * 10, i as usize * 10 + 1), i);
        }
        let items: Vec<u32> = tree.reverse_order().map(|(_, &i)| i).collect();
        assert_eq!(items, vec![3, 2, 1, 0]);

        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.in_order().count(), 0);
    }
}
