//! Fibonacci heap over dense item identifiers.
//!
//! Items are small integers (typically vertex indices) and the heap stores
//! its nodes in an arena indexed by item, so no item is ever allocated on its
//! own. `add`, `min`, `decrease` run in amortized O(1); `pop_min` and `del`
//! in amortized O(log n).
//!
//! Ties between equal keys are resolved by structure, not by item number; callers
//! that need a stable order should fold a tie breaker into the key.

const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Node<K> {
    key: K,
    parent: usize,
    child: usize,
    left: usize,
    right: usize,
    degree: usize,
    mark: bool,
    present: bool,
}

impl<K: Default> Default for Node<K> {
    fn default() -> Self {
        Node {
            key: K::default(),
            parent: NIL,
            child: NIL,
            left: NIL,
            right: NIL,
            degree: 0,
            mark: false,
            present: false,
        }
    }
}

/// Min-ordered Fibonacci heap keyed by `K`.
#[derive(Debug, Clone)]
pub struct FiboHeap<K> {
    nodes: Vec<Node<K>>,
    min: usize,
    len: usize,
    degrtab: Vec<usize>,
}

impl<K: Copy + Ord + Default> Default for FiboHeap<K> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<K: Copy + Ord + Default> FiboHeap<K> {
    /// Heap with arena room for items `0..capacity`. The arena grows on demand.
    pub fn new(capacity: usize) -> Self {
        FiboHeap {
            nodes: vec![Node::default(); capacity],
            min: NIL,
            len: 0,
            degrtab: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, item: usize) -> bool {
        self.nodes.get(item).is_some_and(|n| n.present)
    }

    /// Current key of `item`, if it is in the heap.
    pub fn key(&self, item: usize) -> Option<K> {
        self.nodes.get(item).filter(|n| n.present).map(|n| n.key)
    }

    /// Remove every item. The arena is kept.
    pub fn clear(&mut self) {
        for n in &mut self.nodes {
            *n = Node::default();
        }
        self.min = NIL;
        self.len = 0;
    }

    /// Insert `item` with `key`. The item must not already be in the heap.
    pub fn add(&mut self, item: usize, key: K) {
        debug_assert!(!self.contains(item), "item {item} already in heap");
        if item >= self.nodes.len() {
            self.nodes.resize(item + 1, Node::default());
        }
        self.nodes[item] = Node {
            key,
            left: item,
            right: item,
            present: true,
            ..Node::default()
        };
        if self.min == NIL {
            self.min = item;
        } else {
            self.splice_after(self.min, item);
            if key < self.nodes[self.min].key {
                self.min = item;
            }
        }
        self.len += 1;
    }

    /// Item with the smallest key.
    pub fn min(&self) -> Option<(usize, K)> {
        (self.min != NIL).then(|| (self.min, self.nodes[self.min].key))
    }

    /// Remove and return the item with the smallest key.
    pub fn pop_min(&mut self) -> Option<(usize, K)> {
        let z = self.min;
        if z == NIL {
            return None;
        }
        let key = self.nodes[z].key;
        self.promote_children(z);
        let next = self.nodes[z].right;
        self.unlink(z);
        self.nodes[z].present = false;
        self.len -= 1;
        if next == z {
            self.min = NIL;
        } else {
            self.min = next;
            self.consolidate();
        }
        Some((z, key))
    }

    /// Lower the key of `item` to `key`.
    pub fn decrease(&mut self, item: usize, key: K) {
        debug_assert!(self.contains(item));
        debug_assert!(key <= self.nodes[item].key);
        self.nodes[item].key = key;
        let parent = self.nodes[item].parent;
        if parent != NIL && key < self.nodes[parent].key {
            self.cut(item, parent);
            self.cascading_cut(parent);
        }
        if key < self.nodes[self.min].key {
            self.min = item;
        }
    }

    /// Set the key of `item`, whichever direction it moves.
    pub fn update(&mut self, item: usize, key: K) {
        if key <= self.nodes[item].key {
            self.decrease(item, key);
        } else {
            self.del(item);
            self.add(item, key);
        }
    }

    /// Remove `item` from the heap.
    pub fn del(&mut self, item: usize) {
        debug_assert!(self.contains(item));
        if item == self.min {
            self.pop_min();
            return;
        }
        let parent = self.nodes[item].parent;
        if parent != NIL {
            self.cut(item, parent);
            self.cascading_cut(parent);
        }
        self.promote_children(item);
        self.unlink(item);
        self.nodes[item].present = false;
        self.len -= 1;
    }

    /// Insert `x` in the circular list right after `a`.
    fn splice_after(&mut self, a: usize, x: usize) {
        let b = self.nodes[a].right;
        self.nodes[x].left = a;
        self.nodes[x].right = b;
        self.nodes[b].left = x;
        self.nodes[a].right = x;
    }

    fn unlink(&mut self, x: usize) {
        let (l, r) = (self.nodes[x].left, self.nodes[x].right);
        self.nodes[l].right = r;
        self.nodes[r].left = l;
        self.nodes[x].left = x;
        self.nodes[x].right = x;
    }

    /// Move all children of `z` into the root list next to `z`.
    fn promote_children(&mut self, z: usize) {
        let first = self.nodes[z].child;
        if first == NIL {
            return;
        }
        let mut children = Vec::with_capacity(self.nodes[z].degree);
        let mut c = first;
        loop {
            children.push(c);
            c = self.nodes[c].right;
            if c == first {
                break;
            }
        }
        for c in children {
            self.unlink(c);
            self.nodes[c].parent = NIL;
            self.nodes[c].mark = false;
            self.splice_after(z, c);
        }
        self.nodes[z].child = NIL;
        self.nodes[z].degree = 0;
    }

    /// Make root `y` a child of root `x`.
    fn link(&mut self, y: usize, x: usize) {
        self.unlink(y);
        self.nodes[y].parent = x;
        self.nodes[y].mark = false;
        let child = self.nodes[x].child;
        if child == NIL {
            self.nodes[x].child = y;
        } else {
            self.splice_after(child, y);
        }
        self.nodes[x].degree += 1;
    }

    fn cut(&mut self, x: usize, parent: usize) {
        if self.nodes[parent].child == x {
            let r = self.nodes[x].right;
            self.nodes[parent].child = if r == x { NIL } else { r };
        }
        self.unlink(x);
        self.nodes[parent].degree -= 1;
        self.nodes[x].parent = NIL;
        self.nodes[x].mark = false;
        self.splice_after(self.min, x);
    }

    fn cascading_cut(&mut self, mut y: usize) {
        loop {
            let z = self.nodes[y].parent;
            if z == NIL {
                return;
            }
            if !self.nodes[y].mark {
                self.nodes[y].mark = true;
                return;
            }
            self.cut(y, z);
            y = z;
        }
    }

    fn consolidate(&mut self) {
        let mut roots = Vec::new();
        let start = self.min;
        let mut w = start;
        loop {
            roots.push(w);
            w = self.nodes[w].right;
            if w == start {
                break;
            }
        }
        self.degrtab.clear();
        for w in roots {
            let mut x = w;
            let mut d = self.nodes[x].degree;
            loop {
                if d >= self.degrtab.len() {
                    self.degrtab.resize(d + 1, NIL);
                }
                let y = self.degrtab[d];
                if y == NIL {
                    break;
                }
                let (mut hi, mut lo) = (y, x);
                if self.nodes[hi].key < self.nodes[lo].key {
                    std::mem::swap(&mut hi, &mut lo);
                }
                self.link(hi, lo);
                x = lo;
                self.degrtab[d] = NIL;
                d += 1;
            }
            self.degrtab[d] = x;
        }
        self.min = NIL;
        for &r in &self.degrtab {
            if r != NIL && (self.min == NIL || self.nodes[r].key < self.nodes[self.min].key) {
                self.min = r;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn pops_in_key_order() {
        let mut h = FiboHeap::new(8);
        for (i, k) in [5, 3, 9, 1, 7, 2, 8, 6].into_iter().enumerate() {
            h.add(i, k);
        }
        let mut out = Vec::new();
        while let Some((_, k)) = h.pop_min() {
            out.push(k);
        }
        assert_eq!(out, vec![1, 2, 3, 5, 6, 7, 8, 9]);
        assert!(h.is_empty());
    }

    #[test]
    fn decrease_and_delete() {
        let mut h = FiboHeap::new(0);
        for i in 0..10 {
            h.add(i, 100 + i as i64);
        }
        assert_eq!(h.pop_min(), Some((0, 100)));
        h.decrease(7, 1);
        assert_eq!(h.min(), Some((7, 1)));
        h.del(7);
        h.del(3);
        assert!(!h.contains(3));
        h.update(9, 50);
        h.update(1, 500);
        let items: Vec<usize> = std::iter::from_fn(|| h.pop_min().map(|(i, _)| i)).collect();
        assert_eq!(items, vec![9, 2, 4, 5, 6, 8, 1]);
    }

    #[test]
    fn matches_sorted_model_under_random_ops() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut h = FiboHeap::new(64);
        let mut model: Vec<Option<i64>> = vec![None; 64];
        for _ in 0..2000 {
            let item = rng.gen_range(0..64);
            match (model[item], rng.gen_range(0..3)) {
                (None, _) => {
                    let k = rng.gen_range(-50..50);
                    h.add(item, k);
                    model[item] = Some(k);
                }
                (Some(k), 0) => {
                    let nk = k - rng.gen_range(0..10);
                    h.decrease(item, nk);
                    model[item] = Some(nk);
                }
                (Some(_), 1) => {
                    h.del(item);
                    model[item] = None;
                }
                (Some(_), _) => {
                    let (i, k) = h.pop_min().unwrap();
                    let best = model.iter().flatten().min().copied().unwrap();
                    assert_eq!(k, best);
                    assert_eq!(model[i], Some(k));
                    model[i] = None;
                }
            }
            assert_eq!(h.len(), model.iter().flatten().count());
        }
    }
}
