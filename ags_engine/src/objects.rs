//! Script-visible object types and their offset-addressed fields.
//!
//! The VM addresses native objects as `(handle, byte offset)`. Each type
//! implements [`FieldAccessor`] with a fixed offset table; offsets outside
//! the table are rejected rather than reinterpreted.

use serde::{Deserialize, Serialize};

use ags_formats::game::{AudioClip, CharacterInfo, GuiControl};

use crate::error::RegistryError;
use crate::registry::arena::ArenaKey;

/// Type descriptor tag for every kind of object the VM can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptType {
    AudioChannel,
    AudioClip,
    Character,
    Dialog,
    DialogOptionsRendering,
    DrawingSurface,
    Gui,
    GuiControl,
    Hotspot,
    Inventory,
    Mouse,
    Object,
    Region,
}

impl ScriptType {
    pub const ALL: [ScriptType; 13] = [
        ScriptType::AudioChannel,
        ScriptType::AudioClip,
        ScriptType::Character,
        ScriptType::Dialog,
        ScriptType::DialogOptionsRendering,
        ScriptType::DrawingSurface,
        ScriptType::Gui,
        ScriptType::GuiControl,
        ScriptType::Hotspot,
        ScriptType::Inventory,
        ScriptType::Mouse,
        ScriptType::Object,
        ScriptType::Region,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            ScriptType::AudioChannel => "AudioChannel",
            ScriptType::AudioClip => "AudioClip",
            ScriptType::Character => "Character",
            ScriptType::Dialog => "Dialog",
            ScriptType::DialogOptionsRendering => "DialogOptionsRendering",
            ScriptType::DrawingSurface => "DrawingSurface",
            ScriptType::Gui => "GUI",
            ScriptType::GuiControl => "GUIControl",
            ScriptType::Hotspot => "Hotspot",
            ScriptType::Inventory => "Inventory",
            ScriptType::Mouse => "ScriptMouse",
            ScriptType::Object => "Object",
            ScriptType::Region => "Region",
        }
    }

    /// Size in bytes of the addressable field block.
    pub fn natural_size(self) -> usize {
        match self {
            ScriptType::Character => CHARACTER_FIELD_COUNT * 4,
            ScriptType::AudioClip => 24,
            ScriptType::GuiControl => 32,
            ScriptType::DialogOptionsRendering => 48,
            ScriptType::DrawingSurface => 16,
            ScriptType::AudioChannel
            | ScriptType::Dialog
            | ScriptType::Gui
            | ScriptType::Hotspot
            | ScriptType::Inventory
            | ScriptType::Mouse
            | ScriptType::Object
            | ScriptType::Region => 8,
        }
    }
}

/// A statically owned native entity: its kind plus its index in the
/// owning array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub ty: ScriptType,
    pub index: usize,
}

impl EntityRef {
    pub fn new(ty: ScriptType, index: usize) -> Self {
        Self { ty, index }
    }
}

/// What a managed handle points at. The registry never owns either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectTarget {
    Static(EntityRef),
    Dynamic(ArenaKey),
}

impl ObjectTarget {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ObjectTarget::Dynamic(_))
    }
}

pub trait FieldAccessor {
    fn type_name(&self) -> &'static str;
    fn read_i32(&self, offset: i32) -> Result<i32, RegistryError>;
    fn write_i32(&mut self, offset: i32, value: i32) -> Result<(), RegistryError>;
}

/// Owner of the objects handles point at.
pub trait ObjectStore {
    fn accessor(&self, target: ObjectTarget) -> Option<&dyn FieldAccessor>;
    fn accessor_mut(&mut self, target: ObjectTarget) -> Option<&mut dyn FieldAccessor>;
    fn dynamic_object(&self, key: ArenaKey) -> Option<&DynamicObject>;
    fn insert_dynamic(&mut self, object: DynamicObject) -> ArenaKey;
    /// Destroy hook for dynamic objects whose last reference went away.
    fn dispose(&mut self, key: ArenaKey) -> Option<DynamicObject>;
}

/// Implements [`FieldAccessor`] for a struct whose script fields are all
/// `i32`, laid out at the listed byte offsets.
macro_rules! int_field_accessor {
    (
        $target:ty, $type_name:literal,
        read_only: [$($ro:literal),* $(,)?],
        fields: [$($offset:literal => $field:ident),* $(,)?]
    ) => {
        impl FieldAccessor for $target {
            fn type_name(&self) -> &'static str {
                $type_name
            }

            fn read_i32(&self, offset: i32) -> Result<i32, RegistryError> {
                match offset {
                    $($offset => Ok(self.$field),)*
                    _ => Err(RegistryError::invalid_offset($type_name, offset)),
                }
            }

            fn write_i32(&mut self, offset: i32, value: i32) -> Result<(), RegistryError> {
                let read_only: &[i32] = &[$($ro),*];
                match offset {
                    $($offset => {
                        if read_only.contains(&offset) {
                            return Err(RegistryError::read_only($type_name, offset));
                        }
                        self.$field = value;
                        Ok(())
                    })*
                    _ => Err(RegistryError::invalid_offset($type_name, offset)),
                }
            }
        }
    };
}

/// Script wrapper that only carries the entity id; behaviour lives in the
/// engine API functions that receive it.
macro_rules! id_wrapper {
    ($(#[$meta:meta])* $name:ident, $type_name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub id: i32,
            pub reserved: i32,
        }

        impl $name {
            pub fn new(id: usize) -> Self {
                Self {
                    id: id as i32,
                    reserved: 0,
                }
            }

            /// Slot not yet bound to an entity.
            pub fn unbound() -> Self {
                Self { id: -1, reserved: 0 }
            }
        }

        int_field_accessor!($name, $type_name, read_only: [0], fields: [0 => id, 4 => reserved]);
    };
}

id_wrapper!(ScriptAudioChannel, "AudioChannel");
id_wrapper!(ScriptDialog, "Dialog");
id_wrapper!(ScriptGui, "GUI");
id_wrapper!(ScriptInvItem, "Inventory");
id_wrapper!(ScriptHotspot, "Hotspot");
id_wrapper!(ScriptRegion, "Region");
id_wrapper!(
    /// Room object slot; bound to an object index when a room is entered.
    ScriptObject,
    "Object"
);

const CHARACTER_FIELD_COUNT: usize = 39;

int_field_accessor!(CharacterInfo, "Character",
    read_only: [124],
    fields: [
        0 => defview, 4 => talkview, 8 => view, 12 => room, 16 => prevroom,
        20 => x, 24 => y, 28 => wait, 32 => flags, 36 => following,
        40 => followinfo, 44 => idleview, 48 => idletime, 52 => idleleft,
        56 => transparency, 60 => baseline, 64 => activeinv, 68 => talkcolor,
        72 => thinkview, 76 => blinkview, 80 => blinkinterval, 84 => blinktimer,
        88 => blinkframe, 92 => walkspeed_y, 96 => pic_yoffs, 100 => z,
        104 => walkwait, 108 => speech_anim_speed, 112 => idle_anim_speed,
        116 => blocking_width, 120 => blocking_height, 124 => index_id,
        128 => pic_xoffs, 132 => loop_, 136 => frame, 140 => walking,
        144 => animating, 148 => walkspeed, 152 => animspeed,
    ]
);

int_field_accessor!(AudioClip, "AudioClip",
    read_only: [0, 4, 8],
    fields: [
        0 => id, 4 => clip_type, 8 => file_type,
        12 => default_repeat, 16 => default_priority, 20 => default_volume,
    ]
);

impl FieldAccessor for GuiControl {
    fn type_name(&self) -> &'static str {
        "GUIControl"
    }

    fn read_i32(&self, offset: i32) -> Result<i32, RegistryError> {
        match offset {
            0 => Ok(self.x),
            4 => Ok(self.y),
            8 => Ok(self.width),
            12 => Ok(self.height),
            16 => Ok(self.z_order),
            20 => Ok(self.visible as i32),
            24 => Ok(self.enabled as i32),
            28 => Ok(self.clickable as i32),
            _ => Err(RegistryError::invalid_offset("GUIControl", offset)),
        }
    }

    fn write_i32(&mut self, offset: i32, value: i32) -> Result<(), RegistryError> {
        match offset {
            0 => self.x = value,
            4 => self.y = value,
            8 => self.width = value,
            12 => self.height = value,
            16 => self.z_order = value,
            20 => self.visible = value != 0,
            24 => self.enabled = value != 0,
            28 => self.clickable = value != 0,
            _ => return Err(RegistryError::invalid_offset("GUIControl", offset)),
        }
        Ok(())
    }
}

/// State shared with custom dialog option rendering scripts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptDialogOptionsRendering {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub has_alpha_channel: i32,
    pub parser_text_box_x: i32,
    pub parser_text_box_y: i32,
    pub parser_text_box_width: i32,
    pub active_option_id: i32,
    pub needs_repaint: i32,
    /// Handle of the linked drawing surface.
    pub surface_handle: i32,
    pub dialog_id: i32,
}

int_field_accessor!(ScriptDialogOptionsRendering, "DialogOptionsRendering",
    read_only: [40, 44],
    fields: [
        0 => x, 4 => y, 8 => width, 12 => height, 16 => has_alpha_channel,
        20 => parser_text_box_x, 24 => parser_text_box_y,
        28 => parser_text_box_width, 32 => active_option_id,
        36 => needs_repaint, 40 => surface_handle, 44 => dialog_id,
    ]
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptMouse {
    pub x: i32,
    pub y: i32,
}

impl FieldAccessor for ScriptMouse {
    fn type_name(&self) -> &'static str {
        "ScriptMouse"
    }

    fn read_i32(&self, offset: i32) -> Result<i32, RegistryError> {
        match offset {
            0 => Ok(self.x),
            4 => Ok(self.y),
            _ => Err(RegistryError::invalid_offset("ScriptMouse", offset)),
        }
    }

    fn write_i32(&mut self, offset: i32, _value: i32) -> Result<(), RegistryError> {
        match offset {
            0 | 4 => Err(RegistryError::read_only("ScriptMouse", offset)),
            _ => Err(RegistryError::invalid_offset("ScriptMouse", offset)),
        }
    }
}

/// Script drawing surface. Linked surfaces draw straight onto a bitmap
/// owned elsewhere and have no backing sprite of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDrawingSurface {
    pub drawing_color: i32,
    pub width: i32,
    pub height: i32,
    pub high_resolution_coordinates: i32,
    pub linked_bitmap_only: bool,
    pub modified: bool,
}

impl ScriptDrawingSurface {
    pub fn linked(width: i32, height: i32) -> Self {
        Self {
            drawing_color: 15,
            width,
            height,
            high_resolution_coordinates: 0,
            linked_bitmap_only: true,
            modified: false,
        }
    }
}

impl FieldAccessor for ScriptDrawingSurface {
    fn type_name(&self) -> &'static str {
        "DrawingSurface"
    }

    fn read_i32(&self, offset: i32) -> Result<i32, RegistryError> {
        match offset {
            0 => Ok(self.drawing_color),
            4 => Ok(self.width),
            8 => Ok(self.height),
            12 => Ok(self.high_resolution_coordinates),
            _ => Err(RegistryError::invalid_offset("DrawingSurface", offset)),
        }
    }

    fn write_i32(&mut self, offset: i32, value: i32) -> Result<(), RegistryError> {
        match offset {
            0 => self.drawing_color = value,
            4 | 8 => return Err(RegistryError::read_only("DrawingSurface", offset)),
            12 => self.high_resolution_coordinates = value,
            _ => return Err(RegistryError::invalid_offset("DrawingSurface", offset)),
        }
        self.modified = true;
        Ok(())
    }
}

/// Objects allocated at runtime and owned through the registry's
/// reference counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicObject {
    DrawingSurface(ScriptDrawingSurface),
}

impl DynamicObject {
    pub fn script_type(&self) -> ScriptType {
        match self {
            DynamicObject::DrawingSurface(_) => ScriptType::DrawingSurface,
        }
    }

    pub fn accessor(&self) -> &dyn FieldAccessor {
        match self {
            DynamicObject::DrawingSurface(surface) => surface,
        }
    }

    pub fn accessor_mut(&mut self) -> &mut dyn FieldAccessor {
        match self {
            DynamicObject::DrawingSurface(surface) => surface,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_offsets_cover_the_natural_size() {
        let mut character = CharacterInfo::named("Roger", "cRoger");
        character.animspeed = 9;
        let last = ScriptType::Character.natural_size() as i32 - 4;
        assert_eq!(character.read_i32(last).unwrap(), 9);
        assert!(matches!(
            character.read_i32(last + 4),
            Err(RegistryError::InvalidFieldOffset { type_name: "Character", .. })
        ));
        assert!(matches!(
            character.write_i32(124, 3),
            Err(RegistryError::ReadOnlyField { offset: 124, .. })
        ));
        character.write_i32(20, 160).unwrap();
        assert_eq!(character.x, 160);
    }

    #[test]
    fn mouse_is_read_only() {
        let mut mouse = ScriptMouse { x: 12, y: 34 };
        assert_eq!(mouse.read_i32(4).unwrap(), 34);
        let err = mouse.write_i32(0, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ScriptMouse: attempt to write readonly variable at offset 0"
        );
        let err = mouse.read_i32(8).unwrap_err();
        assert_eq!(err.to_string(), "ScriptMouse: unsupported variable offset 8");
    }

    #[test]
    fn id_wrappers_protect_their_id() {
        let mut hotspot = ScriptHotspot::new(3);
        assert_eq!(hotspot.read_i32(0).unwrap(), 3);
        assert!(hotspot.write_i32(0, 9).is_err());
        hotspot.write_i32(4, 1).unwrap();
        assert_eq!(hotspot.reserved, 1);
        assert_eq!(ScriptObject::unbound().id, -1);
    }

    #[test]
    fn surface_writes_mark_it_modified() {
        let mut surface = DynamicObject::DrawingSurface(ScriptDrawingSurface::linked(320, 200));
        assert_eq!(surface.script_type(), ScriptType::DrawingSurface);
        assert!(surface.accessor_mut().write_i32(4, 10).is_err());
        surface.accessor_mut().write_i32(0, 7).unwrap();
        assert_eq!(surface.accessor().read_i32(0).unwrap(), 7);
        let DynamicObject::DrawingSurface(inner) = &surface;
        assert!(inner.modified);
    }
}
