//! Intrusive list of loaded tiles.

use super::TileId;

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<TileId>,
    next: Option<TileId>,
    linked: bool,
}

/// Doubly linked list threaded through tile ids.
///
/// Links live in a side table indexed by [`TileId`], so insertion, removal
/// and neighbour lookups are O(1) and tiles never move.
#[derive(Debug, Clone, Default)]
pub struct LoadedTileList {
    links: Vec<Links>,
    head: Option<TileId>,
    tail: Option<TileId>,
    len: usize,
}

impl LoadedTileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<TileId> {
        self.head
    }

    pub fn tail(&self) -> Option<TileId> {
        self.tail
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.links.get(id.index()).is_some_and(|l| l.linked)
    }

    pub fn next(&self, id: TileId) -> Option<TileId> {
        self.links.get(id.index()).and_then(|l| l.next)
    }

    pub fn prev(&self, id: TileId) -> Option<TileId> {
        self.links.get(id.index()).and_then(|l| l.prev)
    }

    /// Append `id`, moving it to the tail if it is already linked.
    pub fn push_back(&mut self, id: TileId) {
        self.remove(id);

        if self.links.len() <= id.index() {
            self.links.resize(id.index() + 1, Links::default());
        }

        self.links[id.index()] = Links {
            prev: self.tail,
            next: None,
            linked: true,
        };
        match self.tail {
            Some(tail) => self.links[tail.index()].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Unlink `id`. Returns false if it was not linked.
    pub fn remove(&mut self, id: TileId) -> bool {
        if !self.contains(id) {
            return false;
        }

        let Links { prev, next, .. } = std::mem::take(&mut self.links[id.index()]);
        match prev {
            Some(prev) => self.links[prev.index()].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.links[next.index()].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        true
    }

    /// Ids from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = TileId> + '_ {
        std::iter::successors(self.head, move |id| self.next(*id))
    }
}
