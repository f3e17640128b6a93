use std::path::Path;

use ags_formats::{fix_room_masks, read_room_file, upscale_room_background, RoomStruct, StringIMap};

use crate::error::{RegistryError, RoomLoadError};
use crate::objects::{EntityRef, ObjectTarget, ScriptObject, ScriptType};
use crate::registry::ExternalSymbol;
use crate::session::GameSession;

/// Runtime state of the current room that scripts may change. Discarded
/// with the room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStatus {
    pub hotspot_props: Vec<StringIMap>,
    pub object_props: Vec<StringIMap>,
    pub region_props: Vec<StringIMap>,
    pub room_props: StringIMap,
}

impl RoomStatus {
    pub fn for_room(room: &RoomStruct) -> Self {
        Self {
            hotspot_props: vec![StringIMap::new(); room.hotspot_count()],
            object_props: vec![StringIMap::new(); room.objects.len()],
            region_props: vec![StringIMap::new(); room.region_count()],
            room_props: StringIMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct LoadedRoom {
    pub number: i32,
    pub data: RoomStruct,
    pub status: RoomStatus,
    /// Global names bound for this room's hotspots and objects.
    pub bound_names: Vec<String>,
}

struct RoomBinding {
    name: String,
    handle: i32,
    ty: ScriptType,
}

impl GameSession {
    pub fn current_room(&self) -> Option<&LoadedRoom> {
        self.room.as_ref()
    }

    /// Script names of the room's hotspots and objects, paired with the
    /// handles registered for them at game init.
    fn room_bindings(&self, room: &RoomStruct) -> Result<Vec<RoomBinding>, RegistryError> {
        let hotspots = room
            .hotspots
            .iter()
            .enumerate()
            .map(|(i, hotspot)| (ScriptType::Hotspot, i, &hotspot.script_name));
        let objects = room
            .objects
            .iter()
            .enumerate()
            .map(|(i, object)| (ScriptType::Object, i, &object.script_name));

        hotspots
            .chain(objects)
            .filter(|(_, _, name)| !name.is_empty())
            .map(|(ty, index, name)| -> Result<RoomBinding, RegistryError> {
                let target = ObjectTarget::Static(EntityRef::new(ty, index));
                let handle = self
                    .registry
                    .handle_for(target, ty)
                    .ok_or_else(|| RegistryError::UnknownSymbol(name.clone()))?;
                Ok(RoomBinding {
                    name: name.clone(),
                    handle,
                    ty,
                })
            })
            .collect()
    }

    /// Makes `room` the current room.
    ///
    /// Everything that can fail is checked before the previous room is
    /// touched: validation, the game id, fixups, entity name bindings and
    /// the room script link. On error the previous room stays current.
    pub fn enter_room(&mut self, number: i32, mut room: RoomStruct) -> Result<(), RoomLoadError> {
        if !self.is_ready() {
            return Err(RoomLoadError::NotInitialized(number));
        }
        room.validate()?;
        let game_id = self.world.game.unique_id;
        if self.config.strict_room_game_id && !room.accepts_game_id(game_id) {
            return Err(RoomLoadError::GameIdMismatch {
                room: room.game_id,
                game: game_id,
            });
        }

        if upscale_room_background(&mut room, self.world.game.is_hires())? {
            log::debug!("room {number} upscaled to {}x{}", room.width, room.height);
        }
        fix_room_masks(&mut room);

        let bindings = self.room_bindings(&room)?;
        let mut symbols = self.registry.symbols().clone();
        if let Some(previous) = &self.room {
            for name in &previous.bound_names {
                symbols.unbind(name);
            }
        }
        for binding in &bindings {
            symbols.bind(
                &binding.name,
                ExternalSymbol::DynamicObject {
                    handle: binding.handle,
                    ty: binding.ty,
                },
            )?;
        }
        let instance = match &room.compiled_script {
            Some(module) => Some(
                self.scripts
                    .link_room(&symbols, module, number)
                    .map_err(RoomLoadError::ScriptLinkFailed)?,
            ),
            None => None,
        };

        self.leave_room();
        for binding in &bindings {
            self.registry
                .add_external_dynamic_object(&binding.name, binding.handle)?;
        }
        self.scripts.set_room(instance);
        for (i, slot) in self.world.objects.iter_mut().enumerate() {
            *slot = if i < room.objects.len() {
                ScriptObject::new(i)
            } else {
                ScriptObject::unbound()
            };
        }
        log::info!(
            "entered room {number}: {} hotspots, {} objects, {} regions",
            room.hotspot_count(),
            room.objects.len(),
            room.region_count()
        );
        self.room = Some(LoadedRoom {
            number,
            status: RoomStatus::for_room(&room),
            data: room,
            bound_names: bindings.into_iter().map(|binding| binding.name).collect(),
        });
        Ok(())
    }

    /// Frees the current room, its script and its runtime status. Returns
    /// the number of the room left.
    pub fn leave_room(&mut self) -> Option<i32> {
        let mut previous = self.room.take()?;
        for name in &previous.bound_names {
            self.registry.remove_external_symbol(name);
        }
        self.scripts.unlink_room();
        previous.data.free();
        self.world.objects.fill(ScriptObject::unbound());
        log::debug!("left room {}", previous.number);
        Some(previous.number)
    }

    pub fn load_room_file(&mut self, number: i32, path: &Path) -> Result<(), RoomLoadError> {
        let room = read_room_file(path)?;
        self.enter_room(number, room)
    }
}
