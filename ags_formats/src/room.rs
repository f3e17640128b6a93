//! Initial room data as authored in the editor.
//!
//! Only part of this data may change while a room is running, and those
//! changes are lost once the room is unloaded. State that must survive a
//! room transition is kept by the engine in its own status records.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Result, bail, ensure};

use crate::bitmap::{Bitmap, SharedBitmap};
use crate::capped::CappedVec;
use crate::properties::StringIMap;
use crate::script::ScriptModule;

/// Walkable area without continuous zoom.
pub const NOT_VECTOR_SCALED: i32 = -10000;
/// Room may run inside any game.
pub const NO_GAME_ID_IN_ROOM_FILE: i32 = 16325;

pub const MAX_ROOM_BGFRAMES: usize = 5;
pub const MAX_ROOM_HOTSPOTS: usize = 50;
pub const MAX_ROOM_OBJECTS_V300: usize = 40;
pub const MAX_ROOM_OBJECTS: usize = 256;
pub const MAX_ROOM_REGIONS: usize = 16;
pub const MAX_WALK_AREAS: usize = 16;
pub const MAX_WALK_BEHINDS: usize = 16;
pub const MAX_MESSAGES: usize = 100;
/// Longest serialized message in rooms older than 2.61.
pub const MAX_MESSAGE_PRE261_LEN: usize = 3000;

/// Mask resolution given to high-res rooms saved by very old editors.
pub const LEGACY_MASK_HIRES_FACTOR: i32 = 2;

/// Largest room side accepted from data, before any upscaling.
pub const MAX_ROOM_DIMENSION: i32 = 8192;

pub const ROOM_FLAG_BKG_FRAME_LOCKED: i32 = 0x01;

pub const MSG_DISPLAYNEXT: u8 = 0x01;
pub const MSG_TIMELIMIT: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAreaMask {
    None,
    Hotspot,
    WalkBehind,
    Walkable,
    Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomVolumeMod {
    Quietest,
    Quieter,
    Quiet,
    #[default]
    Normal,
    Loud,
    Louder,
    Loudest,
    // only reachable through the runtime music volume call
    Extra1,
    Extra2,
}

impl RoomVolumeMod {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            -3 => RoomVolumeMod::Quietest,
            -2 => RoomVolumeMod::Quieter,
            -1 => RoomVolumeMod::Quiet,
            0 => RoomVolumeMod::Normal,
            1 => RoomVolumeMod::Loud,
            2 => RoomVolumeMod::Louder,
            3 => RoomVolumeMod::Loudest,
            4 => RoomVolumeMod::Extra1,
            5 => RoomVolumeMod::Extra2,
            _ => return None,
        })
    }

    pub fn as_i32(self) -> i32 {
        match self {
            RoomVolumeMod::Quietest => -3,
            RoomVolumeMod::Quieter => -2,
            RoomVolumeMod::Quiet => -1,
            RoomVolumeMod::Normal => 0,
            RoomVolumeMod::Loud => 1,
            RoomVolumeMod::Louder => 2,
            RoomVolumeMod::Loudest => 3,
            RoomVolumeMod::Extra1 => 4,
            RoomVolumeMod::Extra2 => 5,
        }
    }
}

/// Pixel density class the room was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum RoomResolutionType {
    /// Used as-is regardless of the game resolution.
    #[default]
    Real,
    Low,
    High,
    /// Larger than high-res; would need downscaling.
    OverHigh,
}

impl RoomResolutionType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => RoomResolutionType::Real,
            1 => RoomResolutionType::Low,
            2 => RoomResolutionType::High,
            3 => RoomResolutionType::OverHigh,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            RoomResolutionType::Real => 0,
            RoomResolutionType::Low => 1,
            RoomResolutionType::High => 2,
            RoomResolutionType::OverHigh => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomOptions {
    /// Legacy audio API startup music index.
    pub startup_music: i32,
    pub save_load_disabled: bool,
    pub player_char_off: bool,
    pub player_view: i32,
    pub music_volume: RoomVolumeMod,
    pub flags: i32,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            startup_music: 0,
            save_load_disabled: false,
            player_char_off: false,
            player_view: 0,
            music_volume: RoomVolumeMod::Normal,
            flags: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomBgFrame {
    pub graphic: Option<SharedBitmap>,
    /// Only meaningful for 8-bit games.
    pub palette: Vec<Rgb>,
    pub is_palette_shared: bool,
}

impl Default for RoomBgFrame {
    fn default() -> Self {
        Self {
            graphic: None,
            palette: vec![Rgb::default(); 256],
            is_palette_shared: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomEdges {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl RoomEdges {
    pub fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionCommand {
    pub kind: i32,
    pub args: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionEvent {
    pub event: i32,
    pub commands: Vec<InteractionCommand>,
}

/// Pre-3.0 "interaction editor" command lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Interaction {
    pub events: Vec<InteractionEvent>,
}

/// Script function names bound to an entity's events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionEvents {
    pub script_module: String,
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionVariable {
    pub name: String,
    pub ty: u8,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomHotspot {
    pub name: String,
    /// Empty when the hotspot is not exposed to scripts.
    pub script_name: String,
    pub properties: StringIMap,
    pub interaction: Interaction,
    pub event_handlers: InteractionEvents,
    /// Where the player walks before interacting.
    pub walk_to: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomObjectInfo {
    pub room: i32,
    pub x: i32,
    pub y: i32,
    pub sprite: i32,
    pub is_on: bool,
    /// Z-order, or -1 to sort by y.
    pub baseline: i32,
    pub flags: i32,
    pub name: String,
    pub script_name: String,
    pub properties: StringIMap,
    pub interaction: Interaction,
    pub event_handlers: InteractionEvents,
}

impl Default for RoomObjectInfo {
    fn default() -> Self {
        Self {
            room: -1,
            x: 0,
            y: 0,
            sprite: 0,
            is_on: false,
            baseline: 0xFF,
            flags: 0,
            name: String::new(),
            script_name: String::new(),
            properties: StringIMap::new(),
            interaction: Interaction::default(),
            event_handlers: InteractionEvents::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomRegion {
    /// Light level (-100..100), or tint luminance when a tint is set.
    pub light: i32,
    /// Packed tint, zero when the region uses a light level.
    pub tint: i32,
    pub properties: StringIMap,
    pub interaction: Interaction,
    pub event_handlers: InteractionEvents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkArea {
    pub character_view: i32,
    /// Uniform scaling, or scaling at the far edge.
    pub scaling_far: i32,
    /// `NOT_VECTOR_SCALED` for uniform scaling.
    pub scaling_near: i32,
    pub player_view: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Default for WalkArea {
    fn default() -> Self {
        Self {
            character_view: 0,
            scaling_far: 0,
            scaling_near: NOT_VECTOR_SCALED,
            player_view: 0,
            top: -1,
            bottom: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkBehind {
    pub baseline: i32,
}

/// Legacy numbered room message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomMessage {
    pub text: String,
    /// 0 shows in the standard window, >= 1 as that character's speech.
    pub display_as: u8,
    pub flags: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomStruct {
    /// Owning game's unique id, or `NO_GAME_ID_IN_ROOM_FILE`.
    pub game_id: i32,
    pub data_version: u16,
    /// Mask point = room point / mask_resolution. Must be >= 1.
    pub mask_resolution: i32,
    pub width: i32,
    pub height: i32,
    pub palette: Vec<Rgb>,
    pub options: RoomOptions,
    pub background_bpp: u8,
    pub bg_frames: CappedVec<RoomBgFrame, MAX_ROOM_BGFRAMES>,
    pub bg_anim_speed: i32,
    pub edges: RoomEdges,
    pub hotspot_mask: Option<SharedBitmap>,
    pub region_mask: Option<SharedBitmap>,
    pub walk_area_mask: Option<SharedBitmap>,
    pub walk_behind_mask: Option<SharedBitmap>,
    pub hotspots: CappedVec<RoomHotspot, MAX_ROOM_HOTSPOTS>,
    pub objects: Vec<RoomObjectInfo>,
    pub regions: CappedVec<RoomRegion, MAX_ROOM_REGIONS>,
    pub walk_areas: CappedVec<WalkArea, MAX_WALK_AREAS>,
    pub walk_behinds: CappedVec<WalkBehind, MAX_WALK_BEHINDS>,
    pub messages: CappedVec<RoomMessage, MAX_MESSAGES>,
    pub properties: StringIMap,
    pub local_variables: Vec<InteractionVariable>,
    pub interaction: Interaction,
    pub event_handlers: InteractionEvents,
    pub compiled_script: Option<Rc<ScriptModule>>,
    pub str_options: BTreeMap<String, String>,
    legacy_resolution: RoomResolutionType,
    upscaled: bool,
}

impl Default for RoomStruct {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStruct {
    pub fn new() -> Self {
        let mut bg_frames = CappedVec::new();
        let _ = bg_frames.push(RoomBgFrame::default());
        Self {
            game_id: NO_GAME_ID_IN_ROOM_FILE,
            data_version: 0,
            mask_resolution: 1,
            width: 320,
            height: 200,
            palette: vec![Rgb::default(); 256],
            options: RoomOptions::default(),
            background_bpp: 1,
            bg_frames,
            bg_anim_speed: 5,
            edges: RoomEdges::default(),
            hotspot_mask: None,
            region_mask: None,
            walk_area_mask: None,
            walk_behind_mask: None,
            hotspots: CappedVec::new(),
            objects: Vec::new(),
            regions: CappedVec::new(),
            walk_areas: CappedVec::new(),
            walk_behinds: CappedVec::new(),
            messages: CappedVec::new(),
            properties: StringIMap::new(),
            local_variables: Vec::new(),
            interaction: Interaction::default(),
            event_handlers: InteractionEvents::default(),
            compiled_script: None,
            str_options: BTreeMap::new(),
            legacy_resolution: RoomResolutionType::Real,
            upscaled: false,
        }
    }

    pub fn init_defaults(&mut self) {
        *self = RoomStruct::new();
    }

    /// Releases bitmaps, entity data, messages and the script.
    pub fn free(&mut self) {
        for frame in self.bg_frames.iter_mut() {
            frame.graphic = None;
        }
        self.hotspot_mask = None;
        self.region_mask = None;
        self.walk_area_mask = None;
        self.walk_behind_mask = None;
        self.hotspots.clear();
        self.objects.clear();
        self.regions.clear();
        self.walk_areas.clear();
        self.walk_behinds.clear();
        self.properties.clear();
        self.local_variables.clear();
        self.interaction = Interaction::default();
        self.event_handlers = InteractionEvents::default();
        self.str_options.clear();
        self.free_messages();
        self.free_scripts();
    }

    pub fn free_messages(&mut self) {
        self.messages.clear();
    }

    pub fn free_scripts(&mut self) {
        self.compiled_script = None;
    }

    pub fn is_relative_res(&self) -> bool {
        self.legacy_resolution > RoomResolutionType::Real
    }

    pub fn legacy_resolution(&self) -> RoomResolutionType {
        self.legacy_resolution
    }

    pub fn set_legacy_resolution(&mut self, resolution: RoomResolutionType) {
        self.legacy_resolution = resolution;
    }

    pub fn is_upscaled(&self) -> bool {
        self.upscaled
    }

    pub fn hotspot_count(&self) -> usize {
        self.hotspots.len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn walk_area_count(&self) -> usize {
        self.walk_areas.len()
    }

    pub fn walk_behind_count(&self) -> usize {
        self.walk_behinds.len()
    }

    pub fn primary_background(&self) -> Option<&SharedBitmap> {
        self.bg_frames.first().and_then(|frame| frame.graphic.as_ref())
    }

    pub fn mask(&self, mask: RoomAreaMask) -> Option<&SharedBitmap> {
        match mask {
            RoomAreaMask::None => None,
            RoomAreaMask::Hotspot => self.hotspot_mask.as_ref(),
            RoomAreaMask::WalkBehind => self.walk_behind_mask.as_ref(),
            RoomAreaMask::Walkable => self.walk_area_mask.as_ref(),
            RoomAreaMask::Region => self.region_mask.as_ref(),
        }
    }

    /// Mask scale relative to the room background.
    pub fn mask_scale(&self, mask: RoomAreaMask) -> f32 {
        match mask {
            RoomAreaMask::None => 0.0,
            RoomAreaMask::WalkBehind => 1.0,
            RoomAreaMask::Hotspot | RoomAreaMask::Walkable | RoomAreaMask::Region => {
                1.0 / self.mask_resolution.max(1) as f32
            }
        }
    }

    pub fn has_region_light_level(&self, id: usize) -> bool {
        self.regions.get(id).map(|r| r.tint == 0).unwrap_or(false)
    }

    pub fn has_region_tint(&self, id: usize) -> bool {
        self.regions.get(id).map(|r| r.tint != 0).unwrap_or(false)
    }

    pub fn region_light_level(&self, id: usize) -> i32 {
        if self.has_region_light_level(id) {
            self.regions[id].light
        } else {
            0
        }
    }

    /// Tint luminance rescaled into 0..100.
    pub fn region_tint_luminance(&self, id: usize) -> i32 {
        if self.has_region_tint(id) {
            (self.regions[id].light * 10) / 25
        } else {
            0
        }
    }

    pub fn accepts_game_id(&self, game_unique_id: i32) -> bool {
        self.game_id == NO_GAME_ID_IN_ROOM_FILE || self.game_id == game_unique_id
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mask_resolution >= 1,
            "mask resolution must be at least 1, got {}",
            self.mask_resolution
        );
        ensure!(
            self.objects.len() <= MAX_ROOM_OBJECTS,
            "room has {} objects, limit is {MAX_ROOM_OBJECTS}",
            self.objects.len()
        );
        ensure!(
            self.width > 0 && self.height > 0,
            "room size {}x{} is empty",
            self.width,
            self.height
        );
        ensure!(
            self.width <= MAX_ROOM_DIMENSION && self.height <= MAX_ROOM_DIMENSION,
            "room size {}x{} exceeds {MAX_ROOM_DIMENSION}x{MAX_ROOM_DIMENSION}",
            self.width,
            self.height
        );
        if let Some(background) = self.primary_background() {
            let (width, height) = background.size();
            ensure!(
                i64::from(width) == i64::from(self.width)
                    && i64::from(height) == i64::from(self.height),
                "room size {}x{} does not match its {width}x{height} background",
                self.width,
                self.height
            );
        }
        Ok(())
    }
}

/// Returns `bmp` itself when it is already `width`x`height`, otherwise a
/// freshly allocated nearest-neighbour copy. The input is never mutated,
/// since other owners may still hold it.
pub fn fix_bitmap(bmp: SharedBitmap, width: u32, height: u32) -> SharedBitmap {
    if bmp.size() == (width, height) {
        return bmp;
    }
    Rc::new(bmp.resized_nearest(width, height))
}

fn fix_mask(mask: &mut Option<SharedBitmap>, width: u32, height: u32) {
    if let Some(bmp) = mask.take() {
        *mask = Some(fix_bitmap(bmp, width, height));
    }
}

/// Makes every mask agree with the primary background and `mask_resolution`.
/// Walk-behinds are always 1:1 with the background; the other masks are
/// 1:`mask_resolution`.
pub fn fix_room_masks(room: &mut RoomStruct) {
    if room.mask_resolution < 1 {
        return;
    }
    let Some((base_width, base_height)) = room.primary_background().map(|bmp| bmp.size()) else {
        return;
    };
    let resolution = room.mask_resolution as u32;
    let low_width = base_width / resolution;
    let low_height = base_height / resolution;

    fix_mask(&mut room.walk_behind_mask, base_width, base_height);
    fix_mask(&mut room.walk_area_mask, low_width, low_height);
    fix_mask(&mut room.hotspot_mask, low_width, low_height);
    fix_mask(&mut room.region_mask, low_width, low_height);
}

/// Doubles a low-res room's backgrounds and masks for a hi-res game.
/// Runs at most once per room instance; object coordinates are left alone.
/// Returns whether anything was rescaled.
pub fn upscale_room_background(room: &mut RoomStruct, game_is_hires: bool) -> Result<bool> {
    if room.upscaled || !game_is_hires || room.legacy_resolution != RoomResolutionType::Low {
        return Ok(false);
    }
    let (Some(width), Some(height)) = (room.width.checked_mul(2), room.height.checked_mul(2))
    else {
        bail!("room size {}x{} is too large to upscale", room.width, room.height);
    };
    ensure!(
        width > 0 && height > 0,
        "room size {}x{} cannot be upscaled",
        room.width,
        room.height
    );
    room.width = width;
    room.height = height;
    let (width, height) = (width as u32, height as u32);
    for frame in room.bg_frames.iter_mut() {
        if let Some(graphic) = frame.graphic.take() {
            frame.graphic = Some(fix_bitmap(graphic, width, height));
        }
    }
    fix_room_masks(room);
    room.upscaled = true;
    Ok(true)
}

/// Blank mask helper for rooms assembled in code.
pub fn blank_mask(width: u32, height: u32) -> SharedBitmap {
    Bitmap::new(width, height, 1).into_shared()
}
