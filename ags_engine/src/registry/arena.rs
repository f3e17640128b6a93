use serde::{Deserialize, Serialize};

/// Index into an [`Arena`], invalidated once its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArenaKey {
    pub index: usize,
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u64,
    item: Option<T>,
}

/// Slot storage with generation-checked keys. Stale keys read as absent.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_slots: Vec<usize>,
    generation: u64,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            generation: 0,
            len: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> ArenaKey {
        self.generation += 1;
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    item: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.generation = self.generation;
        slot.item = Some(item);
        self.len += 1;
        ArenaKey {
            index,
            generation: self.generation,
        }
    }

    pub fn get(&self, key: ArenaKey) -> Option<&T> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.item.as_ref()
    }

    pub fn get_mut(&mut self, key: ArenaKey) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.item.as_mut()
    }

    pub fn contains(&self, key: ArenaKey) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: ArenaKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        let item = slot.item.take()?;
        self.free_slots.push(key.index);
        self.len -= 1;
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.item.take().is_some() {
                self.free_slots.push(index);
            }
        }
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArenaKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.item.as_ref().map(|item| {
                (
                    ArenaKey {
                        index,
                        generation: slot.generation,
                    },
                    item,
                )
            })
        })
    }
}
