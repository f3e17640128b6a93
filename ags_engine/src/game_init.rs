//! One-time bring-up of a freshly loaded game.
//!
//! The order of the steps matters: nothing is allocated before the game
//! data has been validated, every entity is registered before fonts and
//! scripts are loaded, and plugins start last. A failure part way leaves
//! the session in [`SessionPhase::Failed`]; it is not rolled back.

use ags_formats::game::{
    GameResolutionType, GameSetup, GuiControlKind, LoadedGameEntities, MAX_AUDIO_TYPES, MAX_INV,
    MAX_SOUND_CHANNELS,
};
use ags_formats::room::{MAX_ROOM_HOTSPOTS, MAX_ROOM_OBJECTS, MAX_ROOM_REGIONS};
use ags_formats::{GameDataVersion, StringIMap};

use crate::config::EngineConfig;
use crate::error::{GameInitError, RegistryError};
use crate::fonts::{load_fonts, FontLoader};
use crate::objects::{
    DynamicObject, EntityRef, ObjectStore, ObjectTarget, ScriptDrawingSurface, ScriptGui,
    ScriptType,
};
use crate::plugins::{PluginContext, PluginHost};
use crate::registry::ManagedObjectRegistry;
use crate::scripts::{setup_script_exports, GameScripts};
use crate::session::{
    CharacterCache, CharacterExtras, GameSession, MoveList, RuntimeArrays, SessionPhase,
};
use crate::world::World;

/// Spare character cache entries kept past the character count.
const CHARACTER_CACHE_SPARE: usize = 5;

fn validate_game_data(
    ents: &LoadedGameEntities,
    config: &EngineConfig,
) -> Result<(), GameInitError> {
    let game = &ents.game;
    if game.fonts.is_empty() {
        return Err(GameInitError::NoFonts);
    }
    if game.audio_clip_types.len() > MAX_AUDIO_TYPES {
        return Err(GameInitError::TooManyAudioTypes {
            count: game.audio_clip_types.len(),
            max: MAX_AUDIO_TYPES,
        });
    }
    if !game.characters.is_empty() && game.player_character >= game.characters.len() {
        return Err(GameInitError::InvalidPlayerCharacter {
            index: game.player_character,
            count: game.characters.len(),
        });
    }
    PluginHost::validate(&ents.plugin_infos, config.max_plugins)
}

/// Legacy upscaling: low resolution games run at twice their size.
pub fn apply_override_upscale(game: &mut GameSetup, override_upscale: bool) {
    if !override_upscale {
        return;
    }
    game.default_resolution = match game.default_resolution {
        GameResolutionType::R320x200 => GameResolutionType::R640x400,
        GameResolutionType::R320x240 => GameResolutionType::R640x480,
        other => other,
    };
}

fn allocate_runtime_arrays(game: &GameSetup) -> RuntimeArrays {
    let numchars = game.num_characters();
    RuntimeArrays {
        character_extras: vec![CharacterExtras::default(); numchars],
        character_cache: vec![CharacterCache::default(); numchars + CHARACTER_CACHE_SPARE],
        move_lists: vec![MoveList::default(); numchars + MAX_ROOM_OBJECTS + 1],
        sprite_cache_slots: vec![None; numchars + MAX_ROOM_OBJECTS + 2],
        char_props: vec![StringIMap::new(); numchars],
        inv_props: vec![StringIMap::new(); game.inventory.len()],
    }
}

fn static_target(ty: ScriptType, index: usize) -> ObjectTarget {
    ObjectTarget::Static(EntityRef::new(ty, index))
}

/// Registers `index` of `ty`, exposing it as `name` unless the name is
/// empty.
fn register_entity(
    registry: &mut ManagedObjectRegistry,
    ty: ScriptType,
    index: usize,
    name: &str,
) -> Result<i32, RegistryError> {
    let target = static_target(ty, index);
    if name.is_empty() {
        Ok(registry.register_managed_object(target, ty))
    } else {
        registry.register_external_object(name, target, ty)
    }
}

/// Binds every fixed entity for scripting. Returns the handle of the
/// dialog options rendering surface.
fn register_game_entities(
    world: &mut World,
    registry: &mut ManagedObjectRegistry,
) -> Result<i32, RegistryError> {
    for index in 0..world.audio_channels.len() {
        registry.register_managed_object(
            static_target(ScriptType::AudioChannel, index),
            ScriptType::AudioChannel,
        );
    }
    for (index, clip) in world.game.audio_clips.iter_mut().enumerate() {
        clip.id = index as i32;
        register_entity(registry, ScriptType::AudioClip, index, &clip.script_name)?;
    }

    for (index, character) in world.game.characters.iter_mut().enumerate() {
        character.reset_runtime_state(index);
        register_entity(registry, ScriptType::Character, index, &character.script_name)?;
    }

    for (index, dialog) in world.game.dialogs.iter().enumerate() {
        register_entity(registry, ScriptType::Dialog, index, &dialog.script_name)?;
    }

    registry.register_managed_object(
        static_target(ScriptType::DialogOptionsRendering, 0),
        ScriptType::DialogOptionsRendering,
    );
    let surface = world.insert_dynamic(DynamicObject::DrawingSurface(
        ScriptDrawingSurface::linked(0, 0),
    ));
    let surface_handle = registry
        .register_managed_object(ObjectTarget::Dynamic(surface), ScriptType::DrawingSurface);
    registry.add_reference(surface_handle)?;
    world.dialog_options_rendering.surface_handle = surface_handle;

    let mut control_index = 0;
    for (index, gui) in world.game.guis.iter_mut().enumerate() {
        gui.rebuild_array();
        gui.visible = gui.initially_visible();
        for control in &gui.controls {
            register_entity(registry, ScriptType::GuiControl, control_index, &control.name)?;
            control_index += 1;
        }
        world.guis[index] = ScriptGui::new(index);
        register_entity(registry, ScriptType::Gui, index, &gui.name)?;
    }

    for index in 0..MAX_INV {
        let name = world
            .game
            .inventory
            .get(index)
            .map_or("", |item| item.script_name.as_str());
        register_entity(registry, ScriptType::Inventory, index, name)?;
    }
    for index in 0..MAX_ROOM_HOTSPOTS {
        register_entity(registry, ScriptType::Hotspot, index, "")?;
    }
    for index in 0..MAX_ROOM_REGIONS {
        register_entity(registry, ScriptType::Region, index, "")?;
    }
    for index in 0..MAX_ROOM_OBJECTS {
        register_entity(registry, ScriptType::Object, index, "")?;
    }

    let arrays = [
        ("character", ScriptType::Character, world.game.characters.len()),
        ("object", ScriptType::Object, MAX_ROOM_OBJECTS),
        ("gui", ScriptType::Gui, world.game.guis.len()),
        ("hotspot", ScriptType::Hotspot, MAX_ROOM_HOTSPOTS),
        ("region", ScriptType::Region, MAX_ROOM_REGIONS),
        ("inventory", ScriptType::Inventory, MAX_INV),
        ("dialog", ScriptType::Dialog, world.game.dialogs.len()),
    ];
    for (symbol, ty, count) in arrays {
        registry.export_array(symbol, 0, ty, ty.natural_size(), count)?;
    }

    if world.game.data_version >= GameDataVersion::V270 && !world.game.characters.is_empty() {
        let player = EntityRef::new(ScriptType::Character, world.game.player_character);
        registry.add_external_static_object("player", player)?;
    }
    Ok(surface_handle)
}

impl GameSession {
    /// Brings `ents` into a fully scriptable state. May run once per
    /// session; any failure is fatal for the session.
    pub fn init_game(
        &mut self,
        ents: LoadedGameEntities,
        fonts: &mut dyn FontLoader,
        plugins: PluginHost,
    ) -> Result<(), GameInitError> {
        if self.phase != SessionPhase::Empty {
            return Err(GameInitError::AlreadyInitialized);
        }
        match self.run_init(ents, fonts, plugins) {
            Ok(()) => {
                self.phase = SessionPhase::Ready;
                log::info!(
                    "game '{}' initialized: {} handles, {} symbols, {} scripts",
                    self.world.game.game_name,
                    self.registry.len(),
                    self.registry.symbols().len(),
                    self.scripts.linked_names().len()
                );
                Ok(())
            }
            Err(err) => {
                self.phase = SessionPhase::Failed;
                log::error!("game initialization failed: {err}");
                Err(err)
            }
        }
    }

    fn run_init(
        &mut self,
        ents: LoadedGameEntities,
        fonts: &mut dyn FontLoader,
        plugins: PluginHost,
    ) -> Result<(), GameInitError> {
        validate_game_data(&ents, &self.config)?;
        let LoadedGameEntities {
            mut game,
            global_script,
            dialog_script,
            script_modules,
            plugin_infos,
            old_dialog_scripts,
            old_speech_lines,
        } = ents;

        apply_override_upscale(&mut game, self.config.override_upscale);
        log::debug!("game resolution {:?}", game.resolution());

        self.runtime = allocate_runtime_arrays(&game);
        self.old_dialog_scripts = old_dialog_scripts;
        self.old_speech_lines = old_speech_lines;
        self.world = World::new(game);
        self.world.allocate_wrappers();
        self.dialog_options_surface = register_game_entities(&mut self.world, &mut self.registry)?;
        log::debug!("registered {} managed objects", self.registry.len());

        load_fonts(&self.world.game, fonts)?;

        setup_script_exports(&mut self.registry)?;
        self.scripts = GameScripts::new(self.config.script_timeout_loops);
        self.scripts
            .bind(
                self.registry.symbols(),
                global_script.as_ref(),
                dialog_script.as_ref(),
                &script_modules,
            )
            .map_err(GameInitError::ScriptLinkFailed)?;

        self.init_runtime_state();

        self.plugins = plugins;
        self.plugins.register_plugins(&plugin_infos)?;
        self.plugins.startup_plugins(&mut PluginContext {
            world: &mut self.world,
            registry: &mut self.registry,
        })?;
        Ok(())
    }

    fn init_runtime_state(&mut self) {
        let game = &mut self.world.game;
        self.play.game_paused = false;
        self.play.ifacepopped = -1;
        self.play.save_game_suffix = if game.save_game_extension.is_empty() {
            String::new()
        } else {
            format!(".{}", game.save_game_extension)
        };
        self.play.score_sound = game.score_clip_id;
        self.play.fade_effect = game.options.fade_type;
        self.play.player_character = game.player_character;

        for control in game.guis.iter_mut().flat_map(|gui| gui.controls.iter_mut()) {
            if control.kind == GuiControlKind::Label {
                control.clickable = false;
            }
        }

        let mut order: Vec<usize> = (0..game.guis.len()).collect();
        order.sort_by_key(|&index| game.guis[index].z_order);
        self.play.gui_draw_order = order;

        let reserved = game
            .audio_clip_types
            .iter()
            .map(|clip_type| clip_type.reserved_channels.max(0) as usize)
            .fold(0usize, usize::saturating_add);
        self.play.reserved_channel_count = reserved.min(MAX_SOUND_CHANNELS - 1);
    }
}
