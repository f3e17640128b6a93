//! Managed-object registry: the handle table the VM uses to reach native
//! engine objects, plus the table of script-visible global symbols.
//!
//! Handles are plain `i32`s starting at 1; 0 is the null handle. A handle
//! is never reused within a session, even after its object is released.
//! The registry stores only [`ObjectTarget`]s; the objects themselves live
//! in an [`ObjectStore`] owned by the session.

pub mod arena;
pub mod static_array;
pub mod symbols;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::objects::{DynamicObject, EntityRef, ObjectStore, ObjectTarget, ScriptType};

pub use arena::{Arena, ArenaKey};
pub use static_array::StaticArray;
pub use symbols::{ExternalSymbol, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Owned by the game data for the whole session; never released.
    Static,
    /// Allocated at runtime; destroyed when its last reference goes.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Unregistered,
    Registered,
    Referenced(u32),
    Released,
}

#[derive(Debug, Clone)]
struct ManagedEntry {
    ty: ScriptType,
    /// `None` once a dynamic object has been released.
    target: Option<ObjectTarget>,
    refs: u32,
}

impl ManagedEntry {
    fn ownership(&self) -> Ownership {
        match self.target {
            Some(ObjectTarget::Static(_)) => Ownership::Static,
            _ => Ownership::Dynamic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SavedTarget {
    Static(EntityRef),
    Dynamic(DynamicObject),
    Released,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub handle: i32,
    pub type_name: String,
    pub ty: ScriptType,
    pub target: SavedTarget,
    pub refs: u32,
}

/// Save-game image of the handle table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub next_handle: i32,
    pub entries: Vec<SavedEntry>,
}

#[derive(Debug)]
pub struct ManagedObjectRegistry {
    entries: BTreeMap<i32, ManagedEntry>,
    by_target: HashMap<(ObjectTarget, ScriptType), i32>,
    next_handle: i32,
    symbols: SymbolTable,
}

impl Default for ManagedObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedObjectRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_target: HashMap::new(),
            next_handle: 1,
            symbols: SymbolTable::new(),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Number of handles ever issued, released ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_of_type(&self, ty: ScriptType) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.ty == ty && entry.target.is_some())
            .count()
    }

    pub fn handles_of_type(&self, ty: ScriptType) -> impl Iterator<Item = i32> + '_ {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.ty == ty && entry.target.is_some())
            .map(|(&handle, _)| handle)
    }

    /// Returns the handle for `target`, creating one if the target is not
    /// registered under `ty` yet.
    pub fn register_managed_object(&mut self, target: ObjectTarget, ty: ScriptType) -> i32 {
        if let Some(&handle) = self.by_target.get(&(target, ty)) {
            return handle;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.entries.insert(
            handle,
            ManagedEntry {
                ty,
                target: Some(target),
                refs: 0,
            },
        );
        self.by_target.insert((target, ty), handle);
        handle
    }

    pub fn handle_for(&self, target: ObjectTarget, ty: ScriptType) -> Option<i32> {
        self.by_target.get(&(target, ty)).copied()
    }

    fn live_entry(&self, handle: i32) -> Result<&ManagedEntry, RegistryError> {
        let entry = self
            .entries
            .get(&handle)
            .ok_or(RegistryError::InvalidHandle(handle))?;
        if entry.target.is_none() {
            return Err(RegistryError::StaleHandle(handle));
        }
        Ok(entry)
    }

    pub fn resolve(&self, handle: i32) -> Result<(ObjectTarget, ScriptType), RegistryError> {
        let entry = self.live_entry(handle)?;
        let target = entry.target.ok_or(RegistryError::StaleHandle(handle))?;
        Ok((target, entry.ty))
    }

    pub fn ownership(&self, handle: i32) -> Result<Ownership, RegistryError> {
        Ok(self.live_entry(handle)?.ownership())
    }

    pub fn handle_state(&self, handle: i32) -> HandleState {
        match self.entries.get(&handle) {
            None => HandleState::Unregistered,
            Some(entry) if entry.target.is_none() => HandleState::Released,
            Some(entry) if entry.refs == 0 => HandleState::Registered,
            Some(entry) => HandleState::Referenced(entry.refs),
        }
    }

    pub fn add_reference(&mut self, handle: i32) -> Result<u32, RegistryError> {
        self.live_entry(handle)?;
        let entry = self
            .entries
            .get_mut(&handle)
            .ok_or(RegistryError::InvalidHandle(handle))?;
        entry.refs += 1;
        Ok(entry.refs)
    }

    /// Drops one reference. A dynamic object losing its last reference is
    /// handed to the store's destroy hook; static objects stay registered.
    pub fn release_reference(
        &mut self,
        handle: i32,
        store: &mut dyn ObjectStore,
    ) -> Result<HandleState, RegistryError> {
        self.live_entry(handle)?;
        let entry = self
            .entries
            .get_mut(&handle)
            .ok_or(RegistryError::InvalidHandle(handle))?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 || entry.ownership() == Ownership::Static {
            return Ok(self.handle_state(handle));
        }
        if let Some(ObjectTarget::Dynamic(key)) = entry.target.take() {
            self.by_target.remove(&(ObjectTarget::Dynamic(key), entry.ty));
            if store.dispose(key).is_none() {
                log::warn!("handle {handle} released an object that was already gone");
            }
        }
        Ok(HandleState::Released)
    }

    pub fn read_i32(
        &self,
        handle: i32,
        offset: i32,
        store: &dyn ObjectStore,
    ) -> Result<i32, RegistryError> {
        let (target, _) = self.resolve(handle)?;
        store
            .accessor(target)
            .ok_or(RegistryError::StaleHandle(handle))?
            .read_i32(offset)
    }

    pub fn write_i32(
        &self,
        handle: i32,
        offset: i32,
        value: i32,
        store: &mut dyn ObjectStore,
    ) -> Result<(), RegistryError> {
        let (target, _) = self.resolve(handle)?;
        store
            .accessor_mut(target)
            .ok_or(RegistryError::StaleHandle(handle))?
            .write_i32(offset, value)
    }

    /// Binds an already registered handle to a global script name.
    pub fn add_external_dynamic_object(
        &mut self,
        name: &str,
        handle: i32,
    ) -> Result<(), RegistryError> {
        let (_, ty) = self.resolve(handle)?;
        self.symbols
            .bind(name, ExternalSymbol::DynamicObject { handle, ty })
    }

    /// Registers `target` and exposes it as `name`. Nothing is registered
    /// when the name is already taken.
    pub fn register_external_object(
        &mut self,
        name: &str,
        target: ObjectTarget,
        ty: ScriptType,
    ) -> Result<i32, RegistryError> {
        if self.symbols.contains(name) {
            return Err(RegistryError::DuplicateSymbol(name.to_string()));
        }
        let handle = self.register_managed_object(target, ty);
        self.add_external_dynamic_object(name, handle)?;
        Ok(handle)
    }

    pub fn add_external_static_object(
        &mut self,
        name: &str,
        target: EntityRef,
    ) -> Result<(), RegistryError> {
        self.symbols
            .bind(name, ExternalSymbol::StaticObject { target })
    }

    pub fn add_external_static_array(
        &mut self,
        name: &str,
        array: StaticArray,
    ) -> Result<(), RegistryError> {
        self.symbols.bind(name, ExternalSymbol::StaticArray(array))
    }

    pub fn add_external_function(&mut self, name: &str) -> Result<(), RegistryError> {
        self.symbols.bind(name, ExternalSymbol::Function)
    }

    /// Unbinds a global name. The object behind it stays registered.
    pub fn remove_external_symbol(&mut self, name: &str) -> Option<ExternalSymbol> {
        self.symbols.unbind(name)
    }

    pub fn snapshot(&self, store: &dyn ObjectStore) -> RegistrySnapshot {
        let entries = self
            .entries
            .iter()
            .map(|(&handle, entry)| {
                let target = match entry.target {
                    Some(ObjectTarget::Static(entity)) => SavedTarget::Static(entity),
                    Some(ObjectTarget::Dynamic(key)) => match store.dynamic_object(key) {
                        Some(object) => SavedTarget::Dynamic(object.clone()),
                        None => SavedTarget::Released,
                    },
                    None => SavedTarget::Released,
                };
                SavedEntry {
                    handle,
                    type_name: entry.ty.type_name().to_string(),
                    ty: entry.ty,
                    target,
                    refs: entry.refs,
                }
            })
            .collect();
        RegistrySnapshot {
            next_handle: self.next_handle,
            entries,
        }
    }

    pub fn to_save_bytes(&self, store: &dyn ObjectStore) -> Result<Vec<u8>, RegistryError> {
        Ok(rmp_serde::to_vec_named(&self.snapshot(store))?)
    }

    /// Replaces the handle table with a saved one. Live dynamic objects are
    /// disposed and the saved ones recreated in `store`; symbols are kept.
    pub fn restore_snapshot(&mut self, snapshot: RegistrySnapshot, store: &mut dyn ObjectStore) {
        for entry in self.entries.values_mut() {
            if let Some(ObjectTarget::Dynamic(key)) = entry.target.take() {
                store.dispose(key);
            }
        }
        self.entries.clear();
        self.by_target.clear();

        for saved in snapshot.entries {
            let target = match saved.target {
                SavedTarget::Static(entity) => Some(ObjectTarget::Static(entity)),
                SavedTarget::Dynamic(object) => {
                    Some(ObjectTarget::Dynamic(store.insert_dynamic(object)))
                }
                SavedTarget::Released => None,
            };
            if let Some(target) = target {
                self.by_target.insert((target, saved.ty), saved.handle);
            }
            self.entries.insert(
                saved.handle,
                ManagedEntry {
                    ty: saved.ty,
                    target,
                    refs: saved.refs,
                },
            );
        }
        let highest = self.entries.keys().next_back().copied().unwrap_or(0);
        self.next_handle = snapshot.next_handle.max(highest + 1);
    }

    pub fn restore_from_save_bytes(
        &mut self,
        bytes: &[u8],
        store: &mut dyn ObjectStore,
    ) -> Result<(), RegistryError> {
        let snapshot: RegistrySnapshot = rmp_serde::from_slice(bytes)?;
        self.restore_snapshot(snapshot, store);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{ScriptDrawingSurface, ScriptHotspot};
    use crate::world::World;
    use ags_formats::game::GameSetup;

    fn world() -> World {
        let mut world = World::new(GameSetup::default());
        world.allocate_wrappers();
        world
    }

    fn hotspot(index: usize) -> ObjectTarget {
        ObjectTarget::Static(EntityRef::new(ScriptType::Hotspot, index))
    }

    #[test]
    fn distinct_targets_get_distinct_handles() {
        let mut registry = ManagedObjectRegistry::new();
        let handles: Vec<i32> = (0..10)
            .map(|i| registry.register_managed_object(hotspot(i), ScriptType::Hotspot))
            .collect();
        let mut unique = handles.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 10);
        assert!(handles.iter().all(|&h| h >= 1));
        assert_eq!(
            registry.register_managed_object(hotspot(3), ScriptType::Hotspot),
            handles[3]
        );
    }

    #[test]
    fn bad_offset_does_not_disturb_other_handles() {
        let mut world = world();
        let mut registry = ManagedObjectRegistry::new();
        let first = registry.register_managed_object(hotspot(0), ScriptType::Hotspot);
        let second = registry.register_managed_object(hotspot(1), ScriptType::Hotspot);

        registry.write_i32(second, 4, 99, &mut world).unwrap();
        let err = registry.write_i32(first, 12, 5, &mut world).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidFieldOffset { type_name: "Hotspot", offset: 12 }
        ));
        assert_eq!(registry.read_i32(second, 4, &world).unwrap(), 99);
        assert_eq!(world.hotspots[0], ScriptHotspot::new(0));
        assert!(matches!(
            registry.read_i32(0, 0, &world),
            Err(RegistryError::InvalidHandle(0))
        ));
    }

    #[test]
    fn dynamic_object_lifecycle() {
        let mut world = world();
        let mut registry = ManagedObjectRegistry::new();
        let key = world.insert_dynamic(DynamicObject::DrawingSurface(
            ScriptDrawingSurface::linked(320, 200),
        ));
        let handle =
            registry.register_managed_object(ObjectTarget::Dynamic(key), ScriptType::DrawingSurface);

        assert_eq!(registry.handle_state(handle), HandleState::Registered);
        assert_eq!(registry.add_reference(handle).unwrap(), 1);
        assert_eq!(registry.add_reference(handle).unwrap(), 2);
        assert_eq!(
            registry.release_reference(handle, &mut world).unwrap(),
            HandleState::Referenced(1)
        );
        assert_eq!(
            registry.release_reference(handle, &mut world).unwrap(),
            HandleState::Released
        );
        assert!(world.dynamic.is_empty());
        assert!(matches!(
            registry.read_i32(handle, 0, &world),
            Err(RegistryError::StaleHandle(_))
        ));

        let next = registry.register_managed_object(hotspot(0), ScriptType::Hotspot);
        assert!(next > handle);
    }

    #[test]
    fn static_objects_survive_release() {
        let mut world = world();
        let mut registry = ManagedObjectRegistry::new();
        let handle = registry.register_managed_object(hotspot(2), ScriptType::Hotspot);
        registry.add_reference(handle).unwrap();
        registry.release_reference(handle, &mut world).unwrap();
        assert_eq!(
            registry.release_reference(handle, &mut world).unwrap(),
            HandleState::Registered
        );
        assert_eq!(registry.read_i32(handle, 0, &world).unwrap(), 2);
    }

    #[test]
    fn external_names_are_unique() {
        let mut registry = ManagedObjectRegistry::new();
        registry
            .register_external_object("hDoor", hotspot(1), ScriptType::Hotspot)
            .unwrap();
        let err = registry
            .register_external_object("hDoor", hotspot(2), ScriptType::Hotspot)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSymbol(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn save_image_restores_handles_and_payloads() {
        let mut world = world();
        let mut registry = ManagedObjectRegistry::new();
        let static_handle = registry.register_managed_object(hotspot(5), ScriptType::Hotspot);
        let key = world.insert_dynamic(DynamicObject::DrawingSurface(
            ScriptDrawingSurface::linked(64, 48),
        ));
        let surface =
            registry.register_managed_object(ObjectTarget::Dynamic(key), ScriptType::DrawingSurface);
        registry.add_reference(surface).unwrap();
        registry.write_i32(surface, 0, 4, &mut world).unwrap();

        let bytes = registry.to_save_bytes(&world).unwrap();

        let mut restored_world = self::world();
        let mut restored = ManagedObjectRegistry::new();
        restored
            .restore_from_save_bytes(&bytes, &mut restored_world)
            .unwrap();
        assert_eq!(restored.read_i32(static_handle, 0, &restored_world).unwrap(), 5);
        assert_eq!(restored.read_i32(surface, 0, &restored_world).unwrap(), 4);
        assert_eq!(restored.read_i32(surface, 4, &restored_world).unwrap(), 64);
        assert_eq!(restored.handle_state(surface), HandleState::Referenced(1));

        let fresh = restored.register_managed_object(hotspot(6), ScriptType::Hotspot);
        assert!(fresh > surface);
    }
}
