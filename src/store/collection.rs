//! Ordered entity list with per-slot revisions

use super::entity::Entity;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct Slot<E> {
    entity: E,
    /// Stamped by every write, including position shifts
    revision: u64,
    /// Stamped only by writes to the entity's own content
    edit: u64,
}

/// The canonical, ordered list of entities held by a store.
///
/// Every write stamps the touched slot with a fresh revision, and every full
/// replace bumps the generation. Content writes also stamp the slot's edit
/// counter; [`shift_at`](Self::shift_at) and [`shift_where`](Self::shift_where)
/// don't, so renumbering a column leaves the edits of its members alone.
/// Background confirmations record these before they await, so a late
/// rollback can tell whether someone wrote after it.
#[derive(Debug, Clone)]
pub struct Collection<E> {
    slots: Vec<Slot<E>>,
    clock: u64,
    generation: u64,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            clock: 0,
            generation: 0,
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<E>) -> Self {
        let mut collection = Self::new();
        collection.replace_all(items);
        collection
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn slot(&mut self, entity: E) -> Slot<E> {
        let revision = self.tick();
        Slot {
            entity,
            revision,
            edit: revision,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.slots.iter().map(|s| &s.entity)
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.slots.iter().map(|s| &s.entity).find(|e| e.id() == id)
    }

    pub fn at(&self, index: usize) -> Option<&E> {
        self.slots.get(index).map(|s| &s.entity)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.entity.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Revision of the slot holding `id`
    pub fn revision(&self, id: &str) -> Option<u64> {
        self.slots
            .iter()
            .find(|s| s.entity.id() == id)
            .map(|s| s.revision)
    }

    /// Last content write to the slot holding `id`
    pub fn edit(&self, id: &str) -> Option<u64> {
        self.slots
            .iter()
            .find(|s| s.entity.id() == id)
            .map(|s| s.edit)
    }

    /// Number of full replaces so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn count_where(&self, mut pred: impl FnMut(&E) -> bool) -> usize {
        self.slots.iter().filter(|s| pred(&s.entity)).count()
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Replace every entity, as after a full fetch
    pub fn replace_all(&mut self, items: Vec<E>) {
        self.generation += 1;
        let slots: Vec<Slot<E>> = items.into_iter().map(|e| self.slot(e)).collect();
        self.slots = slots;
    }

    pub fn push(&mut self, entity: E) {
        let slot = self.slot(entity);
        self.slots.push(slot);
    }

    pub fn prepend(&mut self, entity: E) {
        self.insert(0, entity);
    }

    /// Insert at `index`, clamped to the end
    pub fn insert(&mut self, index: usize, entity: E) {
        let slot = self.slot(entity);
        let index = index.min(self.slots.len());
        self.slots.insert(index, slot);
    }

    /// Put `entity` in the slot currently holding `id`
    pub fn replace(&mut self, id: &str, entity: E) -> bool {
        match self.position(id) {
            Some(index) => {
                let slot = self.slot(entity);
                self.slots[index] = slot;
                true
            }
            None => false,
        }
    }

    /// Insert or replace by id, appending when absent
    pub fn upsert(&mut self, entity: E) {
        let id = entity.id().to_string();
        if !self.replace(&id, entity.clone()) {
            self.push(entity);
        }
    }

    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut E)) -> bool {
        match self.position(id) {
            Some(index) => {
                self.update_at(index, f);
                true
            }
            None => false,
        }
    }

    pub fn update_at(&mut self, index: usize, f: impl FnOnce(&mut E)) {
        let revision = self.tick();
        if let Some(slot) = self.slots.get_mut(index) {
            f(&mut slot.entity);
            slot.revision = revision;
            slot.edit = revision;
        }
    }

    /// Reposition the entity at `index` without counting it as an edit
    pub fn shift_at(&mut self, index: usize, f: impl FnOnce(&mut E)) {
        let revision = self.tick();
        if let Some(slot) = self.slots.get_mut(index) {
            f(&mut slot.entity);
            slot.revision = revision;
        }
    }

    pub fn shift(&mut self, id: &str, f: impl FnOnce(&mut E)) -> bool {
        match self.position(id) {
            Some(index) => {
                self.shift_at(index, f);
                true
            }
            None => false,
        }
    }

    /// [`shift_at`](Self::shift_at) every entity matching `pred`
    pub fn shift_where(&mut self, mut pred: impl FnMut(&E) -> bool, mut f: impl FnMut(&mut E)) -> usize {
        let mut touched = 0;
        for index in 0..self.slots.len() {
            if pred(&self.slots[index].entity) {
                self.shift_at(index, &mut f);
                touched += 1;
            }
        }
        touched
    }

    /// Apply `f` to every entity matching `pred`; returns how many were touched
    pub fn update_where(&mut self, mut pred: impl FnMut(&E) -> bool, mut f: impl FnMut(&mut E)) -> usize {
        let mut touched = 0;
        for index in 0..self.slots.len() {
            if pred(&self.slots[index].entity) {
                self.update_at(index, &mut f);
                touched += 1;
            }
        }
        touched
    }

    /// Remove by id, returning where it was
    pub fn remove(&mut self, id: &str) -> Option<(usize, E)> {
        let index = self.position(id)?;
        Some((index, self.slots.remove(index).entity))
    }

    /// Stable sort; revisions travel with their entities
    pub fn sort_by(&mut self, mut cmp: impl FnMut(&E, &E) -> Ordering) {
        self.slots.sort_by(|a, b| cmp(&a.entity, &b.entity));
    }
}
