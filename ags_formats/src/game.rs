use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::properties::{PropertySchema, StringIMap};
use crate::script::ScriptModule;

pub const MAX_AUDIO_TYPES: usize = 30;
pub const MAX_SOUND_CHANNELS: usize = 8;
pub const MAX_INV: usize = 301;
pub const MAX_PLUGINS: usize = 20;
pub const PLUGIN_FILENAME_MAX: usize = 20;
pub const MAX_MAXSTRLEN: usize = 200;

/// Low bits of a font's flags hold its authored point size.
pub const FFLG_SIZEMASK: u32 = 0x3f;

/// Game data revision the bundle was compiled with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameDataVersion(pub u32);

impl GameDataVersion {
    pub const V250: Self = Self(32);
    pub const V270: Self = Self(37);
    pub const V300: Self = Self(40);
    pub const V330: Self = Self(46);
    pub const V350: Self = Self(50);
    pub const V360: Self = Self(60);
    pub const CURRENT: Self = Self::V360;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameResolutionType {
    #[serde(rename = "undefined")]
    Undefined,
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "320x200")]
    R320x200,
    #[serde(rename = "320x240")]
    R320x240,
    #[serde(rename = "640x400")]
    R640x400,
    #[serde(rename = "640x480")]
    R640x480,
    #[serde(rename = "800x600")]
    R800x600,
    #[serde(rename = "1024x768")]
    R1024x768,
    #[serde(rename = "1280x720")]
    R1280x720,
    #[serde(rename = "custom")]
    Custom,
}

impl GameResolutionType {
    /// Pixel size for the fixed classes; `None` for custom and undefined.
    pub fn size(self) -> Option<(u32, u32)> {
        match self {
            GameResolutionType::Undefined | GameResolutionType::Custom => None,
            GameResolutionType::Default | GameResolutionType::R320x200 => Some((320, 200)),
            GameResolutionType::R320x240 => Some((320, 240)),
            GameResolutionType::R640x400 => Some((640, 400)),
            GameResolutionType::R640x480 => Some((640, 480)),
            GameResolutionType::R800x600 => Some((800, 600)),
            GameResolutionType::R1024x768 => Some((1024, 768)),
            GameResolutionType::R1280x720 => Some((1280, 720)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    pub no_scale_fonts: bool,
    pub fade_type: i32,
    pub no_walk_mode: bool,
    pub legacy_hires_sprites: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontInfo {
    pub flags: u32,
    pub outline: i32,
}

impl FontInfo {
    pub fn with_size(size: u32) -> Self {
        Self {
            flags: size & FFLG_SIZEMASK,
            outline: -1,
        }
    }

    pub fn authored_size(&self) -> u32 {
        self.flags & FFLG_SIZEMASK
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioClipType {
    pub id: i32,
    pub reserved_channels: i32,
    pub volume_reduction_while_speech_playing: i32,
    pub crossfade_speed: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioClip {
    pub id: i32,
    pub script_name: String,
    pub file_name: String,
    pub bundling_type: i32,
    pub clip_type: i32,
    pub file_type: i32,
    pub default_repeat: i32,
    pub default_priority: i32,
    pub default_volume: i32,
}

/// Authored character record. The scalar block is what scripts address
/// by byte offset; its layout is fixed by the engine accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterInfo {
    pub name: String,
    pub script_name: String,
    pub defview: i32,
    pub talkview: i32,
    pub view: i32,
    pub room: i32,
    pub prevroom: i32,
    pub x: i32,
    pub y: i32,
    pub wait: i32,
    pub flags: i32,
    pub following: i32,
    pub followinfo: i32,
    pub idleview: i32,
    pub idletime: i32,
    pub idleleft: i32,
    pub transparency: i32,
    pub baseline: i32,
    pub activeinv: i32,
    pub talkcolor: i32,
    pub thinkview: i32,
    pub blinkview: i32,
    pub blinkinterval: i32,
    pub blinktimer: i32,
    pub blinkframe: i32,
    pub walkspeed_y: i32,
    pub pic_yoffs: i32,
    pub z: i32,
    pub walkwait: i32,
    pub speech_anim_speed: i32,
    pub idle_anim_speed: i32,
    pub blocking_width: i32,
    pub blocking_height: i32,
    pub index_id: i32,
    pub pic_xoffs: i32,
    pub loop_: i32,
    pub frame: i32,
    pub walking: i32,
    pub animating: i32,
    pub walkspeed: i32,
    pub animspeed: i32,
    /// Item counts, indexed by inventory id.
    pub inventory: Vec<i32>,
}

impl Default for CharacterInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            script_name: String::new(),
            defview: 0,
            talkview: -1,
            view: 0,
            room: 0,
            prevroom: -1,
            x: 0,
            y: 0,
            wait: 0,
            flags: 0,
            following: -1,
            followinfo: 0,
            idleview: -1,
            idletime: 20,
            idleleft: 20,
            transparency: 0,
            baseline: -1,
            activeinv: -1,
            talkcolor: 0,
            thinkview: -1,
            blinkview: -1,
            blinkinterval: 140,
            blinktimer: 0,
            blinkframe: 0,
            walkspeed_y: 0,
            pic_yoffs: 0,
            z: 0,
            walkwait: -1,
            speech_anim_speed: 5,
            idle_anim_speed: 5,
            blocking_width: 0,
            blocking_height: 0,
            index_id: 0,
            pic_xoffs: 0,
            loop_: 0,
            frame: 0,
            walking: 0,
            animating: 0,
            walkspeed: 3,
            animspeed: 5,
            inventory: Vec::new(),
        }
    }
}

impl CharacterInfo {
    pub fn named(name: impl Into<String>, script_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script_name: script_name.into(),
            ..Self::default()
        }
    }

    /// Resets walking/animation state at session start.
    pub fn reset_runtime_state(&mut self, index: usize) {
        self.walking = 0;
        self.animating = 0;
        self.pic_xoffs = 0;
        self.pic_yoffs = 0;
        self.blinkinterval = 140;
        self.blinktimer = self.blinkinterval;
        self.index_id = index as i32;
        self.blocking_width = 0;
        self.blocking_height = 0;
        self.prevroom = -1;
        self.loop_ = 0;
        self.frame = 0;
        self.walkwait = -1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogTopic {
    pub script_name: String,
    pub options: Vec<String>,
    pub topic_flags: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuiPopupStyle {
    /// Always shown.
    #[default]
    None,
    /// Shown when the mouse moves to the top of the screen.
    MouseY,
    /// Shown on demand and pauses the game.
    Modal,
    /// Initially shown, stays shown while the game is paused.
    NoAutoRemove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuiControlKind {
    #[default]
    Button,
    Label,
    InvWindow,
    Slider,
    TextBox,
    ListBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiControl {
    pub name: String,
    pub kind: GuiControlKind,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub z_order: i32,
    pub visible: bool,
    pub enabled: bool,
    pub clickable: bool,
}

impl Default for GuiControl {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: GuiControlKind::Button,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            z_order: 0,
            visible: true,
            enabled: true,
            clickable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gui {
    /// Script-visible name, e.g. `gInventory`.
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub popup_style: GuiPopupStyle,
    pub popup_at_mouse_y: i32,
    pub background_color: i32,
    pub transparency: i32,
    pub z_order: i32,
    pub clickable: bool,
    pub visible: bool,
    pub controls: Vec<GuiControl>,
    /// Control indices in drawing order, rebuilt from `controls`.
    #[serde(skip)]
    pub control_draw_order: Vec<usize>,
}

impl Default for Gui {
    fn default() -> Self {
        Self {
            name: String::new(),
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            popup_style: GuiPopupStyle::None,
            popup_at_mouse_y: -1,
            background_color: 8,
            transparency: 0,
            z_order: 0,
            clickable: true,
            visible: true,
            controls: Vec::new(),
            control_draw_order: Vec::new(),
        }
    }
}

impl Gui {
    /// Recomputes the control drawing order. Ties keep declaration order.
    pub fn rebuild_array(&mut self) {
        let mut order: Vec<usize> = (0..self.controls.len()).collect();
        order.sort_by_key(|&index| self.controls[index].z_order);
        self.control_draw_order = order;
    }

    /// Popup styles that start out visible.
    pub fn initially_visible(&self) -> bool {
        matches!(
            self.popup_style,
            GuiPopupStyle::None | GuiPopupStyle::NoAutoRemove
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryItem {
    pub name: String,
    pub script_name: String,
    pub pic: i32,
    pub cursor_pic: i32,
    pub hotx: i32,
    pub hoty: i32,
    pub flags: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginInfo {
    pub name: String,
    /// Opaque plugin save data carried in the game file.
    pub data: Vec<u8>,
}

/// Game-wide authored data, decoded from the main game file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSetup {
    pub game_name: String,
    pub unique_id: i32,
    pub data_version: GameDataVersion,
    pub default_resolution: GameResolutionType,
    pub custom_size: Option<(u32, u32)>,
    pub options: GameOptions,
    pub fonts: Vec<FontInfo>,
    pub audio_clip_types: Vec<AudioClipType>,
    pub audio_clips: Vec<AudioClip>,
    pub characters: Vec<CharacterInfo>,
    pub dialogs: Vec<DialogTopic>,
    pub guis: Vec<Gui>,
    pub inventory: Vec<InventoryItem>,
    pub prop_schema: PropertySchema,
    /// Authored property values per character, indexed like `characters`.
    pub char_props: Vec<StringIMap>,
    /// Authored property values per inventory item, indexed like `inventory`.
    pub inv_props: Vec<StringIMap>,
    pub save_game_extension: String,
    pub score_clip_id: i32,
    pub player_character: usize,
}

impl Default for GameSetup {
    fn default() -> Self {
        Self {
            game_name: String::new(),
            unique_id: 0,
            data_version: GameDataVersion::CURRENT,
            default_resolution: GameResolutionType::R320x200,
            custom_size: None,
            options: GameOptions::default(),
            fonts: Vec::new(),
            audio_clip_types: Vec::new(),
            audio_clips: Vec::new(),
            characters: Vec::new(),
            dialogs: Vec::new(),
            guis: Vec::new(),
            inventory: Vec::new(),
            prop_schema: PropertySchema::new(),
            char_props: Vec::new(),
            inv_props: Vec::new(),
            save_game_extension: String::new(),
            score_clip_id: -1,
            player_character: 0,
        }
    }
}

impl GameSetup {
    pub fn resolution(&self) -> (u32, u32) {
        match self.default_resolution {
            GameResolutionType::Custom => self.custom_size.unwrap_or((320, 200)),
            other => other.size().unwrap_or((320, 200)),
        }
    }

    /// Games larger than 320x240 count as high resolution.
    pub fn is_hires(&self) -> bool {
        let (width, height) = self.resolution();
        width * height > 320 * 240
    }

    pub fn num_characters(&self) -> usize {
        self.characters.len()
    }
}

/// Everything the game file loader hands over to engine initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadedGameEntities {
    pub game: GameSetup,
    pub global_script: Option<ScriptModule>,
    pub dialog_script: Option<ScriptModule>,
    pub script_modules: Vec<ScriptModule>,
    pub plugin_infos: Vec<PluginInfo>,
    /// Pre-3.0 compiled dialog bytecode, shared with the dialog runner.
    #[serde(with = "shared_blobs")]
    pub old_dialog_scripts: Vec<Rc<[u8]>>,
    pub old_speech_lines: Vec<String>,
}

impl LoadedGameEntities {
    pub fn new(game: GameSetup) -> Self {
        Self {
            game,
            ..Self::default()
        }
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("parsing game bundle JSON")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading game bundle {}", path.display()))?;
        Self::from_json_slice(&data)
            .with_context(|| format!("loading game bundle {}", path.display()))
    }
}

mod shared_blobs {
    use std::rc::Rc;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(blobs: &[Rc<[u8]>], serializer: S) -> Result<S::Ok, S::Error> {
        let plain: Vec<&[u8]> = blobs.iter().map(|blob| &blob[..]).collect();
        plain.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Rc<[u8]>>, D::Error> {
        let plain: Vec<Vec<u8>> = Vec::deserialize(deserializer)?;
        Ok(plain.into_iter().map(|blob| Rc::<[u8]>::from(blob)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_json_fills_defaults() {
        let json = br#"{
            "game": {
                "game_name": "Demo",
                "unique_id": 42,
                "default_resolution": "640x400",
                "fonts": [{"flags": 0}],
                "characters": [{"name": "Roger", "script_name": "cRoger"}],
                "prop_schema": [{"name": "Weight", "type": "integer", "default_value": "2"}]
            },
            "global_script": {"name": "GlobalScript", "exports": ["game_start"]},
            "old_dialog_scripts": [[1, 2, 3]]
        }"#;
        let ents = LoadedGameEntities::from_json_slice(json).unwrap();
        assert_eq!(ents.game.unique_id, 42);
        assert!(ents.game.is_hires());
        assert_eq!(ents.game.characters[0].talkview, -1);
        assert_eq!(ents.game.prop_schema.len(), 1);
        assert_eq!(&ents.old_dialog_scripts[0][..], &[1, 2, 3]);
        assert!(ents.dialog_script.is_none());
    }

    #[test]
    fn resolution_classes() {
        let mut game = GameSetup::default();
        assert!(!game.is_hires());
        game.default_resolution = GameResolutionType::R320x240;
        assert!(!game.is_hires());
        game.default_resolution = GameResolutionType::Custom;
        game.custom_size = Some((1920, 1080));
        assert!(game.is_hires());
    }

    #[test]
    fn gui_draw_order_follows_z_order() {
        let mut gui = Gui::default();
        for z in [3, 1, 2, 1] {
            gui.controls.push(GuiControl {
                z_order: z,
                ..GuiControl::default()
            });
        }
        gui.rebuild_array();
        assert_eq!(gui.control_draw_order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn runtime_reset_keeps_authored_fields() {
        let mut character = CharacterInfo::named("Roger", "cRoger");
        character.x = 100;
        character.walking = 4;
        character.reset_runtime_state(3);
        assert_eq!(character.x, 100);
        assert_eq!(character.walking, 0);
        assert_eq!(character.index_id, 3);
        assert_eq!(character.blinktimer, 140);
    }
}
