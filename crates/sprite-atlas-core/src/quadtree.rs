use crate::model::Rect;

const NODE_CAPACITY: usize = 16;
const MAX_DEPTH: u32 = 6;

/// Spatial index over the rectangles already placed in one atlas canvas.
///
/// Rectangles live at the deepest node whose quadrant fully contains them;
/// straddling rectangles stay on the parent. Collision queries only visit
/// quadrants overlapping the candidate.
pub struct Quadtree {
    root: Node,
    len: usize,
}

struct Node {
    bounds: Rect,
    depth: u32,
    items: Vec<Rect>,
    children: Option<Box<[Node; 4]>>,
}

impl Quadtree {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            root: Node {
                bounds: Rect::new(0, 0, width, height),
                depth: 0,
                items: Vec::new(),
                children: None,
            },
            len: 0,
        }
    }

    /// Inserts `rect` and returns `None` if it overlaps nothing already
    /// placed; otherwise returns a colliding rectangle without mutating
    /// state. The caller uses the collider's bounds to jump its scan cursor.
    pub fn insert_if_no_collision(&mut self, rect: Rect) -> Option<Rect> {
        if let Some(hit) = self.root.find_collision(&rect) {
            return Some(hit);
        }
        self.root.insert(rect);
        self.len += 1;
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All placed rectangles, for replaying the final occupancy state.
    pub fn rects(&self) -> Vec<Rect> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }
}

impl Node {
    fn find_collision(&self, rect: &Rect) -> Option<Rect> {
        if !self.bounds.intersects(rect) {
            return None;
        }
        for item in &self.items {
            if item.intersects(rect) {
                return Some(*item);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                if let Some(hit) = child.find_collision(rect) {
                    return Some(hit);
                }
            }
        }
        None
    }

    fn insert(&mut self, rect: Rect) {
        if self.children.is_none()
            && self.items.len() >= NODE_CAPACITY
            && self.depth < MAX_DEPTH
        {
            self.subdivide();
        }
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.bounds.contains(&rect) {
                    child.insert(rect);
                    return;
                }
            }
        }
        self.items.push(rect);
    }

    fn subdivide(&mut self) {
        let b = self.bounds;
        let w1 = b.w / 2;
        let h1 = b.h / 2;
        let w2 = b.w - w1;
        let h2 = b.h - h1;
        if w1 == 0 || h1 == 0 {
            return;
        }
        let quads = [
            Rect::new(b.x, b.y, w1, h1),
            Rect::new(b.x + w1, b.y, w2, h1),
            Rect::new(b.x, b.y + h1, w1, h2),
            Rect::new(b.x + w1, b.y + h1, w2, h2),
        ];
        let depth = self.depth + 1;
        let mut children = Box::new(quads.map(|bounds| Node {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }));
        // Push down items that fit entirely in one quadrant.
        let mut keep = Vec::new();
        for item in self.items.drain(..) {
            let mut placed = false;
            for child in children.iter_mut() {
                if child.bounds.contains(&item) {
                    child.items.push(item);
                    placed = true;
                    break;
                }
            }
            if !placed {
                keep.push(item);
            }
        }
        self.items = keep;
        self.children = Some(children);
    }

    fn collect(&self, out: &mut Vec<Rect>) {
        out.extend_from_slice(&self.items);
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_collider_and_leaves_state_unchanged() {
        let mut q = Quadtree::new(128, 128);
        assert_eq!(q.insert_if_no_collision(Rect::new(10, 10, 20, 20)), None);
        let hit = q.insert_if_no_collision(Rect::new(15, 15, 5, 5));
        assert_eq!(hit, Some(Rect::new(10, 10, 20, 20)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn disjoint_inserts_all_succeed() {
        let mut q = Quadtree::new(256, 256);
        for i in 0..8 {
            for j in 0..8 {
                assert_eq!(
                    q.insert_if_no_collision(Rect::new(i * 32, j * 32, 32, 32)),
                    None
                );
            }
        }
        assert_eq!(q.len(), 64);
        // full now
        assert!(q.insert_if_no_collision(Rect::new(1, 1, 4, 4)).is_some());
    }

    #[test]
    fn replay_matches_inserts_after_subdivision() {
        let mut q = Quadtree::new(512, 512);
        let mut expected = Vec::new();
        for i in 0..20 {
            let r = Rect::new((i % 5) * 100, (i / 5) * 100, 7 + i, 9);
            assert_eq!(q.insert_if_no_collision(r), None);
            expected.push(r);
        }
        let mut got = q.rects();
        got.sort_by_key(|r| (r.x, r.y));
        expected.sort_by_key(|r| (r.x, r.y));
        assert_eq!(got, expected);
    }
}
