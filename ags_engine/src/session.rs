//! The per-game session: everything the engine keeps between game load and
//! game unload, in one place instead of process globals.

use std::rc::Rc;

use ags_formats::room::Point;
use ags_formats::{GameSetup, SharedBitmap, StringIMap};

use crate::config::EngineConfig;
use crate::error::{PropertyError, ScriptError};
use crate::plugins::PluginHost;
use crate::properties::PropertyStore;
use crate::registry::{HandleState, ManagedObjectRegistry};
use crate::room_loader::LoadedRoom;
use crate::scripts::GameScripts;
use crate::world::World;

static NO_PROPERTIES: StringIMap = StringIMap::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, game not loaded yet.
    Empty,
    Ready,
    /// Initialization stopped part way; the session must be discarded.
    Failed,
}

/// Per-character state the engine tracks next to the authored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterExtras {
    pub width: i32,
    pub height: i32,
    pub zoom: i32,
    pub xwas: i32,
    pub ywas: i32,
    pub animwait: i32,
    pub process_idle_this_time: bool,
}

impl Default for CharacterExtras {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            zoom: 100,
            xwas: i32::MIN,
            ywas: i32::MIN,
            animwait: 0,
            process_idle_this_time: false,
        }
    }
}

/// Last rendered frame of a character, reused while nothing changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterCache {
    pub in_use: bool,
    pub sprite: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveList {
    pub path: Vec<Point>,
    pub stage: usize,
    pub done: bool,
}

/// Runtime arrays that run parallel to the authored entity arrays.
#[derive(Debug, Clone, Default)]
pub struct RuntimeArrays {
    pub character_extras: Vec<CharacterExtras>,
    pub character_cache: Vec<CharacterCache>,
    /// One per character, one per room object, plus slot 0.
    pub move_lists: Vec<MoveList>,
    pub sprite_cache_slots: Vec<Option<SharedBitmap>>,
    pub char_props: Vec<StringIMap>,
    pub inv_props: Vec<StringIMap>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayState {
    pub game_paused: bool,
    /// GUI currently popped up, -1 for none.
    pub ifacepopped: i32,
    pub save_game_suffix: String,
    pub score_sound: i32,
    pub fade_effect: i32,
    pub gui_draw_order: Vec<usize>,
    pub reserved_channel_count: usize,
    pub player_character: usize,
}

impl Default for PlayState {
    fn default() -> Self {
        Self {
            game_paused: false,
            ifacepopped: -1,
            save_game_suffix: String::new(),
            score_sound: -1,
            fade_effect: 0,
            gui_draw_order: Vec::new(),
            reserved_channel_count: 0,
            player_character: 0,
        }
    }
}

/// Entity whose custom properties a script is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOwner {
    Character(usize),
    Inventory(usize),
    Hotspot(usize),
    Object(usize),
    Region(usize),
    Room,
}

impl PropertyOwner {
    fn missing(self) -> PropertyError {
        let what = match self {
            PropertyOwner::Character(i) => format!("character {i}"),
            PropertyOwner::Inventory(i) => format!("inventory item {i}"),
            PropertyOwner::Hotspot(i) => format!("hotspot {i}"),
            PropertyOwner::Object(i) => format!("object {i}"),
            PropertyOwner::Region(i) => format!("region {i}"),
            PropertyOwner::Room => "current room".to_string(),
        };
        PropertyError::InvalidEntity(what)
    }
}

#[derive(Debug)]
pub struct GameSession {
    pub config: EngineConfig,
    pub(crate) phase: SessionPhase,
    pub world: World,
    pub registry: ManagedObjectRegistry,
    pub runtime: RuntimeArrays,
    pub play: PlayState,
    pub scripts: GameScripts,
    pub plugins: PluginHost,
    pub old_dialog_scripts: Vec<Rc<[u8]>>,
    pub old_speech_lines: Vec<String>,
    pub room: Option<LoadedRoom>,
    /// Handle of the surface shared with dialog option rendering scripts.
    pub dialog_options_surface: i32,
    script_errors: Vec<String>,
}

impl GameSession {
    pub fn new(config: EngineConfig) -> Self {
        let alive_timer = config.script_timeout_loops;
        Self {
            config,
            phase: SessionPhase::Empty,
            world: World::new(GameSetup::default()),
            registry: ManagedObjectRegistry::new(),
            runtime: RuntimeArrays::default(),
            play: PlayState::default(),
            scripts: GameScripts::new(alive_timer),
            plugins: PluginHost::new(),
            old_dialog_scripts: Vec::new(),
            old_speech_lines: Vec::new(),
            room: None,
            dialog_options_surface: 0,
            script_errors: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    pub fn game(&self) -> &GameSetup {
        &self.world.game
    }

    /// Records a script-level failure. The caller aborts the current script
    /// call; the session keeps running.
    fn report<T, E: Into<ScriptError>>(&mut self, result: Result<T, E>) -> Result<T, ScriptError> {
        result.map_err(|err| {
            let err = err.into();
            log::warn!("script error: {err}");
            self.script_errors.push(err.to_string());
            err
        })
    }

    /// Drains the messages reported since the last call.
    pub fn take_script_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.script_errors)
    }

    fn with_property_maps<R>(
        &mut self,
        owner: PropertyOwner,
        op: impl FnOnce(PropertyStore<'_>, &StringIMap, &mut StringIMap) -> Result<R, PropertyError>,
    ) -> Result<R, PropertyError> {
        let game = &self.world.game;
        let store = PropertyStore::new(&game.prop_schema);
        let (static_props, runtime_props) = match owner {
            PropertyOwner::Character(i) => {
                if i >= game.characters.len() {
                    return Err(owner.missing());
                }
                let runtime = self
                    .runtime
                    .char_props
                    .get_mut(i)
                    .ok_or_else(|| owner.missing())?;
                (game.char_props.get(i).unwrap_or(&NO_PROPERTIES), runtime)
            }
            PropertyOwner::Inventory(i) => {
                let runtime = self
                    .runtime
                    .inv_props
                    .get_mut(i)
                    .ok_or_else(|| owner.missing())?;
                (game.inv_props.get(i).unwrap_or(&NO_PROPERTIES), runtime)
            }
            PropertyOwner::Hotspot(i) => {
                let LoadedRoom { data, status, .. } =
                    self.room.as_mut().ok_or_else(|| owner.missing())?;
                let authored = data.hotspots.get(i).ok_or_else(|| owner.missing())?;
                let runtime = status
                    .hotspot_props
                    .get_mut(i)
                    .ok_or_else(|| owner.missing())?;
                (&authored.properties, runtime)
            }
            PropertyOwner::Object(i) => {
                let LoadedRoom { data, status, .. } =
                    self.room.as_mut().ok_or_else(|| owner.missing())?;
                let authored = data.objects.get(i).ok_or_else(|| owner.missing())?;
                let runtime = status
                    .object_props
                    .get_mut(i)
                    .ok_or_else(|| owner.missing())?;
                (&authored.properties, runtime)
            }
            PropertyOwner::Region(i) => {
                let LoadedRoom { data, status, .. } =
                    self.room.as_mut().ok_or_else(|| owner.missing())?;
                let authored = data.regions.get(i).ok_or_else(|| owner.missing())?;
                let runtime = status
                    .region_props
                    .get_mut(i)
                    .ok_or_else(|| owner.missing())?;
                (&authored.properties, runtime)
            }
            PropertyOwner::Room => {
                let LoadedRoom { data, status, .. } =
                    self.room.as_mut().ok_or_else(|| owner.missing())?;
                (&data.properties, &mut status.room_props)
            }
        };
        op(store, static_props, runtime_props)
    }

    pub fn get_property(&mut self, owner: PropertyOwner, name: &str) -> Result<i32, ScriptError> {
        let result = self.with_property_maps(owner, |store, authored, runtime| {
            store.get_int(authored, runtime, name)
        });
        self.report(result)
    }

    pub fn get_text_property(
        &mut self,
        owner: PropertyOwner,
        name: &str,
        out: &mut String,
        capacity: usize,
    ) -> Result<(), ScriptError> {
        let result = self.with_property_maps(owner, |store, authored, runtime| {
            store.get_text(authored, runtime, name, out, capacity)
        });
        self.report(result)
    }

    pub fn get_text_property_dynamic(
        &mut self,
        owner: PropertyOwner,
        name: &str,
    ) -> Result<String, ScriptError> {
        let result = self.with_property_maps(owner, |store, authored, runtime| {
            store.get_text_dynamic(authored, runtime, name)
        });
        self.report(result)
    }

    pub fn set_property(
        &mut self,
        owner: PropertyOwner,
        name: &str,
        value: i32,
    ) -> Result<(), ScriptError> {
        let result = self.with_property_maps(owner, |store, _, runtime| {
            store.set_int(runtime, name, value)
        });
        self.report(result)
    }

    pub fn set_text_property(
        &mut self,
        owner: PropertyOwner,
        name: &str,
        value: &str,
    ) -> Result<(), ScriptError> {
        let result = self.with_property_maps(owner, |store, _, runtime| {
            store.set_text(runtime, name, value)
        });
        self.report(result)
    }

    pub fn read_field(&mut self, handle: i32, offset: i32) -> Result<i32, ScriptError> {
        let result = self.registry.read_i32(handle, offset, &self.world);
        self.report(result)
    }

    pub fn write_field(&mut self, handle: i32, offset: i32, value: i32) -> Result<(), ScriptError> {
        let result = self
            .registry
            .write_i32(handle, offset, value, &mut self.world);
        self.report(result)
    }

    /// Reads through a whole-array export such as `character`.
    pub fn read_array(&mut self, symbol: &str, byte_offset: i64) -> Result<i32, ScriptError> {
        let result = self
            .registry
            .static_array(symbol)
            .and_then(|array| array.read_i32(byte_offset, &self.world));
        self.report(result)
    }

    pub fn write_array(
        &mut self,
        symbol: &str,
        byte_offset: i64,
        value: i32,
    ) -> Result<(), ScriptError> {
        let result = self
            .registry
            .static_array(symbol)
            .and_then(|array| array.write_i32(byte_offset, value, &mut self.world));
        self.report(result)
    }

    pub fn add_reference(&mut self, handle: i32) -> Result<u32, ScriptError> {
        let result = self.registry.add_reference(handle);
        self.report(result)
    }

    pub fn release_reference(&mut self, handle: i32) -> Result<HandleState, ScriptError> {
        let result = self.registry.release_reference(handle, &mut self.world);
        self.report(result)
    }

    /// Managed-object section of a save game, runtime property overrides
    /// are saved elsewhere.
    pub fn save_objects(&self) -> Result<Vec<u8>, ScriptError> {
        Ok(self.registry.to_save_bytes(&self.world)?)
    }

    pub fn restore_objects(&mut self, bytes: &[u8]) -> Result<(), ScriptError> {
        self.registry
            .restore_from_save_bytes(bytes, &mut self.world)?;
        Ok(())
    }
}
