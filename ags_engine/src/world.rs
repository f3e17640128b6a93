use ags_formats::game::{GameSetup, MAX_INV, MAX_SOUND_CHANNELS};
use ags_formats::room::{MAX_ROOM_HOTSPOTS, MAX_ROOM_OBJECTS, MAX_ROOM_REGIONS};

use crate::objects::{
    DynamicObject, EntityRef, FieldAccessor, ObjectStore, ObjectTarget, ScriptAudioChannel,
    ScriptDialog, ScriptDialogOptionsRendering, ScriptGui, ScriptHotspot, ScriptInvItem,
    ScriptMouse, ScriptObject, ScriptRegion, ScriptType,
};
use crate::registry::arena::{Arena, ArenaKey};

/// Native storage for everything the VM can address: the game's authored
/// arrays plus the engine-side script wrappers. Lives for the whole
/// session; the registry only holds indices into it.
#[derive(Debug, Default)]
pub struct World {
    pub game: GameSetup,
    pub audio_channels: Vec<ScriptAudioChannel>,
    pub dialogs: Vec<ScriptDialog>,
    pub guis: Vec<ScriptGui>,
    /// Flat control index to `(gui, control)`.
    pub gui_controls: Vec<(usize, usize)>,
    pub inventory: Vec<ScriptInvItem>,
    pub hotspots: Vec<ScriptHotspot>,
    pub regions: Vec<ScriptRegion>,
    pub objects: Vec<ScriptObject>,
    pub dialog_options_rendering: ScriptDialogOptionsRendering,
    pub mouse: ScriptMouse,
    pub dynamic: Arena<DynamicObject>,
}

fn as_accessor<T: FieldAccessor>(object: &T) -> &dyn FieldAccessor {
    object
}

fn as_accessor_mut<T: FieldAccessor>(object: &mut T) -> &mut dyn FieldAccessor {
    object
}

impl World {
    pub fn new(game: GameSetup) -> Self {
        Self {
            game,
            ..Self::default()
        }
    }

    /// Builds the fixed wrapper arrays. Room object slots stay unbound
    /// until a room is entered.
    pub fn allocate_wrappers(&mut self) {
        self.audio_channels = (0..=MAX_SOUND_CHANNELS).map(ScriptAudioChannel::new).collect();
        self.dialogs = (0..self.game.dialogs.len()).map(ScriptDialog::new).collect();
        self.guis = vec![ScriptGui::unbound(); self.game.guis.len()];
        self.gui_controls = self
            .game
            .guis
            .iter()
            .enumerate()
            .flat_map(|(gui, g)| (0..g.controls.len()).map(move |control| (gui, control)))
            .collect();
        self.inventory = (0..MAX_INV).map(ScriptInvItem::new).collect();
        self.hotspots = (0..MAX_ROOM_HOTSPOTS).map(ScriptHotspot::new).collect();
        self.regions = (0..MAX_ROOM_REGIONS).map(ScriptRegion::new).collect();
        self.objects = vec![ScriptObject::unbound(); MAX_ROOM_OBJECTS];
    }

    /// Number of entities of `ty` addressable by index.
    pub fn count(&self, ty: ScriptType) -> usize {
        match ty {
            ScriptType::AudioChannel => self.audio_channels.len(),
            ScriptType::AudioClip => self.game.audio_clips.len(),
            ScriptType::Character => self.game.characters.len(),
            ScriptType::Dialog => self.dialogs.len(),
            ScriptType::DialogOptionsRendering | ScriptType::Mouse => 1,
            ScriptType::DrawingSurface => 0,
            ScriptType::Gui => self.guis.len(),
            ScriptType::GuiControl => self.gui_controls.len(),
            ScriptType::Hotspot => self.hotspots.len(),
            ScriptType::Inventory => self.inventory.len(),
            ScriptType::Object => self.objects.len(),
            ScriptType::Region => self.regions.len(),
        }
    }

    /// Flat index of a GUI control, as used by `EntityRef`.
    pub fn gui_control_index(&self, gui: usize, control: usize) -> Option<usize> {
        self.gui_controls
            .iter()
            .position(|&entry| entry == (gui, control))
    }

    fn static_accessor(&self, entity: EntityRef) -> Option<&dyn FieldAccessor> {
        let index = entity.index;
        match entity.ty {
            ScriptType::AudioChannel => self.audio_channels.get(index).map(as_accessor),
            ScriptType::AudioClip => self.game.audio_clips.get(index).map(as_accessor),
            ScriptType::Character => self.game.characters.get(index).map(as_accessor),
            ScriptType::Dialog => self.dialogs.get(index).map(as_accessor),
            ScriptType::DialogOptionsRendering => {
                (index == 0).then_some(as_accessor(&self.dialog_options_rendering))
            }
            ScriptType::DrawingSurface => None,
            ScriptType::Gui => self.guis.get(index).map(as_accessor),
            ScriptType::GuiControl => {
                let &(gui, control) = self.gui_controls.get(index)?;
                self.game
                    .guis
                    .get(gui)?
                    .controls
                    .get(control)
                    .map(as_accessor)
            }
            ScriptType::Hotspot => self.hotspots.get(index).map(as_accessor),
            ScriptType::Inventory => self.inventory.get(index).map(as_accessor),
            ScriptType::Mouse => (index == 0).then_some(as_accessor(&self.mouse)),
            ScriptType::Object => self.objects.get(index).map(as_accessor),
            ScriptType::Region => self.regions.get(index).map(as_accessor),
        }
    }

    fn static_accessor_mut(&mut self, entity: EntityRef) -> Option<&mut dyn FieldAccessor> {
        let index = entity.index;
        match entity.ty {
            ScriptType::AudioChannel => self.audio_channels.get_mut(index).map(as_accessor_mut),
            ScriptType::AudioClip => self.game.audio_clips.get_mut(index).map(as_accessor_mut),
            ScriptType::Character => self.game.characters.get_mut(index).map(as_accessor_mut),
            ScriptType::Dialog => self.dialogs.get_mut(index).map(as_accessor_mut),
            ScriptType::DialogOptionsRendering => {
                (index == 0).then_some(as_accessor_mut(&mut self.dialog_options_rendering))
            }
            ScriptType::DrawingSurface => None,
            ScriptType::Gui => self.guis.get_mut(index).map(as_accessor_mut),
            ScriptType::GuiControl => {
                let &(gui, control) = self.gui_controls.get(index)?;
                self.game
                    .guis
                    .get_mut(gui)?
                    .controls
                    .get_mut(control)
                    .map(as_accessor_mut)
            }
            ScriptType::Hotspot => self.hotspots.get_mut(index).map(as_accessor_mut),
            ScriptType::Inventory => self.inventory.get_mut(index).map(as_accessor_mut),
            ScriptType::Mouse => (index == 0).then_some(as_accessor_mut(&mut self.mouse)),
            ScriptType::Object => self.objects.get_mut(index).map(as_accessor_mut),
            ScriptType::Region => self.regions.get_mut(index).map(as_accessor_mut),
        }
    }
}

impl ObjectStore for World {
    fn accessor(&self, target: ObjectTarget) -> Option<&dyn FieldAccessor> {
        match target {
            ObjectTarget::Static(entity) => self.static_accessor(entity),
            ObjectTarget::Dynamic(key) => self.dynamic.get(key).map(DynamicObject::accessor),
        }
    }

    fn accessor_mut(&mut self, target: ObjectTarget) -> Option<&mut dyn FieldAccessor> {
        match target {
            ObjectTarget::Static(entity) => self.static_accessor_mut(entity),
            ObjectTarget::Dynamic(key) => {
                self.dynamic.get_mut(key).map(DynamicObject::accessor_mut)
            }
        }
    }

    fn dynamic_object(&self, key: ArenaKey) -> Option<&DynamicObject> {
        self.dynamic.get(key)
    }

    fn insert_dynamic(&mut self, object: DynamicObject) -> ArenaKey {
        self.dynamic.insert(object)
    }

    fn dispose(&mut self, key: ArenaKey) -> Option<DynamicObject> {
        let object = self.dynamic.remove(key)?;
        log::debug!(
            "disposed {} at slot {}",
            object.script_type().type_name(),
            key.index
        );
        Some(object)
    }
}
