/// Stable reference to an entry of a [`WorkQueue`]. Stays valid while
/// other entries are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

#[derive(Debug, Clone)]
struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered work list with O(1) removal of any entry.
///
/// Entries live in an arena and are linked in arrival order. Removing an
/// entry unlinks it and leaves a tombstone, so handles held on sibling
/// entries keep pointing at the same values. Slots are never reused.
#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    slots: Vec<Slot<T>>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn push_back(&mut self, value: T) -> Handle {
        let idx = self.slots.len();
        self.slots.push(Slot {
            value: Some(value),
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.slots[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
        Handle(idx)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<Handle> {
        self.head.map(Handle)
    }

    /// Entry after `handle`, `None` at the end or if `handle` was removed.
    pub fn next(&self, handle: Handle) -> Option<Handle> {
        let slot = self.slots.get(handle.0)?;
        slot.value.as_ref()?;
        slot.next.map(Handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots.get(handle.0)?.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots.get_mut(handle.0)?.value.as_mut()
    }

    /// Unlink and return the entry. Removing twice yields `None`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.0)?;
        let value = slot.value.take()?;
        let (prev, next) = (slot.prev.take(), slot.next.take());
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        Some(value)
    }

    /// Remove `handle` and return the entry that followed it.
    pub fn remove_and_next(&mut self, handle: Handle) -> Option<Handle> {
        let next = self.next(handle);
        self.remove(handle);
        next
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.front()?;
        self.remove(head)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            queue: self,
            cursor: self.head,
        }
    }
}

impl<T> FromIterator<T> for WorkQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = WorkQueue::new();
        for value in iter {
            queue.push_back(value);
        }
        queue
    }
}

pub struct Iter<'a, T> {
    queue: &'a WorkQueue<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let slot = &self.queue.slots[idx];
        self.cursor = slot.next;
        slot.value.as_ref()
    }
}
