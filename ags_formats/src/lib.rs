pub mod bitmap;
pub mod capped;
pub mod game;
pub mod properties;
pub mod room;
pub mod room_file;
pub mod script;

pub use bitmap::{Bitmap, SharedBitmap};
pub use capped::CappedVec;
pub use game::{
    AudioClip, AudioClipType, CharacterInfo, DialogTopic, FontInfo, GameDataVersion,
    GameOptions, GameResolutionType, GameSetup, Gui, GuiControl, GuiControlKind, GuiPopupStyle,
    InventoryItem, LoadedGameEntities, PluginInfo,
};
pub use properties::{PropertyDesc, PropertySchema, PropertyType, StringIMap};
pub use room::{
    RoomAreaMask, RoomResolutionType, RoomStruct, fix_bitmap, fix_room_masks,
    upscale_room_background,
};
pub use room_file::{RoomFileVersion, read_room, read_room_file, write_room, write_room_file};
pub use script::ScriptModule;
