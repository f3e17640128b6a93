use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bitmap::{Bitmap, SharedBitmap};
use crate::properties::StringIMap;
use crate::room::{
    InteractionEvents, LEGACY_MASK_HIRES_FACTOR, MAX_MESSAGE_PRE261_LEN, MAX_MESSAGES,
    MAX_ROOM_BGFRAMES, MAX_ROOM_HOTSPOTS, MAX_ROOM_OBJECTS, MAX_ROOM_OBJECTS_V300,
    MAX_ROOM_REGIONS, MAX_WALK_AREAS, MAX_WALK_BEHINDS, NO_GAME_ID_IN_ROOM_FILE,
    NOT_VECTOR_SCALED, Point, Rgb, RoomBgFrame, RoomEdges, RoomHotspot, RoomMessage,
    RoomObjectInfo, RoomOptions, RoomRegion, RoomResolutionType, RoomStruct, RoomVolumeMod,
    WalkArea, WalkBehind,
};
use crate::script::ScriptModule;

const ROOM_MAGIC: &[u8; 4] = b"AGSR";
const PALETTE_SIZE: usize = 256;

/// Room file format revision. Older revisions lack fields that later
/// editors write; the reader fills those in with the historical defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomFileVersion(pub u16);

impl RoomFileVersion {
    pub const V208: Self = Self(18);
    pub const V214: Self = Self(19);
    pub const V240: Self = Self(20);
    pub const V241: Self = Self(21);
    pub const V250A: Self = Self(22);
    pub const V250B: Self = Self(23);
    pub const V251: Self = Self(24);
    pub const V253: Self = Self(25);
    pub const V255A: Self = Self(26);
    pub const V255B: Self = Self(27);
    pub const V261: Self = Self(28);
    pub const V262: Self = Self(29);
    pub const V270: Self = Self(30);
    pub const V272: Self = Self(31);
    pub const V300A: Self = Self(32);
    pub const V300B: Self = Self(33);
    pub const V303A: Self = Self(34);
    pub const V303B: Self = Self(35);
    pub const V3404: Self = Self(36);
    pub const V3415: Self = Self(37);
    pub const V350: Self = Self(38);
    pub const V3508: Self = Self(39);
    pub const V360: Self = Self(40);
    pub const CURRENT: Self = Self::V360;

    pub fn is_supported(self) -> bool {
        self >= Self::V208 && self <= Self::CURRENT
    }

    pub fn max_hotspots(self) -> usize {
        if self < Self::V262 {
            20
        } else if self < Self::V300A {
            30
        } else {
            MAX_ROOM_HOTSPOTS
        }
    }

    pub fn max_objects(self) -> usize {
        if self < Self::V360 {
            MAX_ROOM_OBJECTS_V300
        } else {
            MAX_ROOM_OBJECTS
        }
    }
}

pub fn read_room_file(path: &Path) -> Result<RoomStruct> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading room file {}", path.display()))?;
    read_room(&bytes).with_context(|| format!("decoding room file {}", path.display()))
}

pub fn write_room_file(path: &Path, room: &RoomStruct, version: RoomFileVersion) -> Result<()> {
    let bytes = write_room(room, version)?;
    std::fs::write(path, bytes).with_context(|| format!("writing room file {}", path.display()))
}

pub fn read_room(bytes: &[u8]) -> Result<RoomStruct> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).context("reading room magic")?;
    ensure!(&magic == ROOM_MAGIC, "not a room file (magic {magic:02x?})");

    let version = RoomFileVersion(cursor.read_u16::<LittleEndian>()?);
    ensure!(
        version.is_supported(),
        "unsupported room file version {} (supported {}..={})",
        version.0,
        RoomFileVersion::V208.0,
        RoomFileVersion::CURRENT.0
    );

    let mut room = RoomStruct::new();
    room.data_version = version.0;

    room.background_bpp = if version >= RoomFileVersion::V208 {
        cursor.read_u8()?
    } else {
        1
    };

    let walk_behind_count = read_count(&mut cursor, MAX_WALK_BEHINDS, "walk-behind")?;
    for _ in 0..walk_behind_count {
        let baseline = cursor.read_i32::<LittleEndian>()?;
        push_capped(&mut room.walk_behinds, WalkBehind { baseline }, "walk-behind")?;
    }

    let hotspot_count = read_count(&mut cursor, version.max_hotspots(), "hotspot")?;
    for _ in 0..hotspot_count {
        let hotspot = read_hotspot(&mut cursor, version)?;
        push_capped(&mut room.hotspots, hotspot, "hotspot")?;
    }

    let object_count = read_count(&mut cursor, version.max_objects(), "object")?;
    room.objects.reserve(object_count);
    for _ in 0..object_count {
        room.objects.push(read_object(&mut cursor, version)?);
    }

    let region_count = read_count(&mut cursor, MAX_ROOM_REGIONS, "region")?;
    for _ in 0..region_count {
        let region = read_region(&mut cursor, version)?;
        push_capped(&mut room.regions, region, "region")?;
    }

    let walk_area_count = read_count(&mut cursor, MAX_WALK_AREAS, "walkable area")?;
    for _ in 0..walk_area_count {
        let area = read_walk_area(&mut cursor, version)?;
        push_capped(&mut room.walk_areas, area, "walkable area")?;
    }

    room.edges = RoomEdges::new(
        cursor.read_i32::<LittleEndian>()?,
        cursor.read_i32::<LittleEndian>()?,
        cursor.read_i32::<LittleEndian>()?,
        cursor.read_i32::<LittleEndian>()?,
    );
    room.options = read_options(&mut cursor)?;

    let message_count = read_count(&mut cursor, MAX_MESSAGES, "message")?;
    for _ in 0..message_count {
        let display_as = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let text = if version < RoomFileVersion::V261 {
            read_c_string(&mut cursor, MAX_MESSAGE_PRE261_LEN)?
        } else {
            read_string(&mut cursor)?
        };
        push_capped(
            &mut room.messages,
            RoomMessage {
                text,
                display_as,
                flags,
            },
            "message",
        )?;
    }

    room.game_id = if version >= RoomFileVersion::V250B {
        cursor.read_i32::<LittleEndian>()?
    } else {
        NO_GAME_ID_IN_ROOM_FILE
    };

    let resolution = if version >= RoomFileVersion::V240 {
        let raw = cursor.read_u8()?;
        RoomResolutionType::from_u8(raw)
            .with_context(|| format!("unknown room resolution type {raw}"))?
    } else {
        RoomResolutionType::Low
    };
    room.set_legacy_resolution(resolution);

    room.mask_resolution = if version >= RoomFileVersion::V3508 {
        cursor.read_i32::<LittleEndian>()?
    } else if version < RoomFileVersion::V303B && resolution == RoomResolutionType::High {
        LEGACY_MASK_HIRES_FACTOR
    } else {
        1
    };

    room.width = cursor.read_i32::<LittleEndian>()?;
    room.height = cursor.read_i32::<LittleEndian>()?;

    let (frame_count, anim_speed) = if version >= RoomFileVersion::V255A {
        (cursor.read_u8()? as usize, cursor.read_u8()? as i32)
    } else {
        (1, 5)
    };
    ensure!(
        (1..=MAX_ROOM_BGFRAMES).contains(&frame_count),
        "room declares {frame_count} background frames, expected 1..={MAX_ROOM_BGFRAMES}"
    );
    room.bg_anim_speed = anim_speed;
    room.bg_frames.clear();
    for index in 0..frame_count {
        let is_palette_shared = if version >= RoomFileVersion::V255A {
            cursor.read_u8()? != 0
        } else {
            false
        };
        let palette = read_palette(&mut cursor)?;
        let graphic = read_bitmap(&mut cursor)
            .with_context(|| format!("background frame {index}"))?;
        push_capped(
            &mut room.bg_frames,
            RoomBgFrame {
                graphic,
                palette,
                is_palette_shared,
            },
            "background frame",
        )?;
    }
    if let Some(frame) = room.bg_frames.first() {
        room.palette = frame.palette.clone();
    }

    room.walk_behind_mask = read_bitmap(&mut cursor).context("walk-behind mask")?;
    room.hotspot_mask = read_bitmap(&mut cursor).context("hotspot mask")?;
    room.walk_area_mask = read_bitmap(&mut cursor).context("walkable area mask")?;
    room.region_mask = read_bitmap(&mut cursor).context("region mask")?;

    if version >= RoomFileVersion::V255B {
        room.properties = read_properties(&mut cursor)?;
    }
    if version >= RoomFileVersion::V300A {
        room.event_handlers = read_event_handlers(&mut cursor)?;
    }

    if cursor.read_u8()? != 0 {
        room.compiled_script = Some(Rc::new(read_script(&mut cursor)?));
    }

    room.validate()?;
    Ok(room)
}

pub fn write_room(room: &RoomStruct, version: RoomFileVersion) -> Result<Vec<u8>> {
    ensure!(
        version.is_supported(),
        "cannot write room file version {}",
        version.0
    );
    ensure!(
        room.hotspots.len() <= version.max_hotspots(),
        "room has {} hotspots, version {} allows {}",
        room.hotspots.len(),
        version.0,
        version.max_hotspots()
    );
    ensure!(
        room.objects.len() <= version.max_objects(),
        "room has {} objects, version {} allows {}",
        room.objects.len(),
        version.0,
        version.max_objects()
    );
    if version < RoomFileVersion::V255A {
        ensure!(
            room.bg_frames.len() == 1,
            "version {} stores exactly one background frame",
            version.0
        );
    }

    let mut out = Vec::new();
    out.write_all(ROOM_MAGIC)?;
    out.write_u16::<LittleEndian>(version.0)?;
    out.write_u8(room.background_bpp)?;

    write_count(&mut out, room.walk_behinds.len())?;
    for walk_behind in room.walk_behinds.iter() {
        out.write_i32::<LittleEndian>(walk_behind.baseline)?;
    }

    write_count(&mut out, room.hotspots.len())?;
    for hotspot in room.hotspots.iter() {
        write_hotspot(&mut out, hotspot, version)?;
    }

    write_count(&mut out, room.objects.len())?;
    for object in &room.objects {
        write_object(&mut out, object, version)?;
    }

    write_count(&mut out, room.regions.len())?;
    for region in room.regions.iter() {
        write_region(&mut out, region, version)?;
    }

    write_count(&mut out, room.walk_areas.len())?;
    for area in room.walk_areas.iter() {
        out.write_i32::<LittleEndian>(area.character_view)?;
        out.write_i32::<LittleEndian>(area.scaling_far)?;
        if version >= RoomFileVersion::V251 {
            out.write_i32::<LittleEndian>(area.scaling_near)?;
        }
        out.write_i32::<LittleEndian>(area.player_view)?;
        out.write_i32::<LittleEndian>(area.top)?;
        out.write_i32::<LittleEndian>(area.bottom)?;
    }

    for edge in [room.edges.left, room.edges.right, room.edges.top, room.edges.bottom] {
        out.write_i32::<LittleEndian>(edge)?;
    }
    write_options(&mut out, &room.options)?;

    write_count(&mut out, room.messages.len())?;
    for (index, message) in room.messages.iter().enumerate() {
        out.write_u8(message.display_as)?;
        out.write_u8(message.flags)?;
        if version < RoomFileVersion::V261 {
            ensure!(
                message.text.len() < MAX_MESSAGE_PRE261_LEN && !message.text.contains('\0'),
                "message {index} cannot be stored in version {}",
                version.0
            );
            out.write_all(message.text.as_bytes())?;
            out.write_u8(0)?;
        } else {
            write_string(&mut out, &message.text)?;
        }
    }

    if version >= RoomFileVersion::V250B {
        out.write_i32::<LittleEndian>(room.game_id)?;
    }
    if version >= RoomFileVersion::V240 {
        out.write_u8(room.legacy_resolution().as_u8())?;
    }
    if version >= RoomFileVersion::V3508 {
        out.write_i32::<LittleEndian>(room.mask_resolution)?;
    }
    out.write_i32::<LittleEndian>(room.width)?;
    out.write_i32::<LittleEndian>(room.height)?;

    if version >= RoomFileVersion::V255A {
        out.write_u8(room.bg_frames.len() as u8)?;
        out.write_u8(room.bg_anim_speed.clamp(0, u8::MAX as i32) as u8)?;
    }
    for frame in room.bg_frames.iter() {
        if version >= RoomFileVersion::V255A {
            out.write_u8(frame.is_palette_shared as u8)?;
        }
        write_palette(&mut out, &frame.palette)?;
        write_bitmap(&mut out, frame.graphic.as_ref())?;
    }

    write_bitmap(&mut out, room.walk_behind_mask.as_ref())?;
    write_bitmap(&mut out, room.hotspot_mask.as_ref())?;
    write_bitmap(&mut out, room.walk_area_mask.as_ref())?;
    write_bitmap(&mut out, room.region_mask.as_ref())?;

    if version >= RoomFileVersion::V255B {
        write_properties(&mut out, &room.properties)?;
    }
    if version >= RoomFileVersion::V300A {
        write_event_handlers(&mut out, &room.event_handlers)?;
    }

    match &room.compiled_script {
        Some(script) => {
            out.write_u8(1)?;
            write_script(&mut out, script)?;
        }
        None => out.write_u8(0)?,
    }
    Ok(out)
}

fn read_count(cursor: &mut Cursor<&[u8]>, max: usize, what: &str) -> Result<usize> {
    let count = cursor.read_u32::<LittleEndian>()? as usize;
    if count > max {
        bail!("room declares {count} {what} entries, limit is {max}");
    }
    Ok(count)
}

fn write_count(out: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count).context("entry count does not fit u32")?;
    out.write_u32::<LittleEndian>(count)?;
    Ok(())
}

fn push_capped<T, const N: usize>(
    list: &mut crate::capped::CappedVec<T, N>,
    item: T,
    what: &str,
) -> Result<()> {
    if list.push(item).is_err() {
        bail!("too many {what} entries, limit is {N}");
    }
    Ok(())
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    ensure!(
        len <= remaining,
        "string of {len} bytes runs past the end of the data"
    );
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    String::from_utf8(buf).context("string is not valid UTF-8")
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    write_count(out, value.len())?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_c_string(cursor: &mut Cursor<&[u8]>, max_len: usize) -> Result<String> {
    let mut buf = Vec::new();
    loop {
        let byte = cursor.read_u8().context("unterminated legacy string")?;
        if byte == 0 {
            break;
        }
        ensure!(
            buf.len() < max_len,
            "legacy string exceeds {max_len} bytes"
        );
        buf.push(byte);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_properties(cursor: &mut Cursor<&[u8]>) -> Result<StringIMap> {
    let count = cursor.read_u32::<LittleEndian>()?;
    let mut map = StringIMap::new();
    for _ in 0..count {
        let key = read_string(cursor)?;
        let value = read_string(cursor)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn write_properties(out: &mut Vec<u8>, map: &StringIMap) -> Result<()> {
    write_count(out, map.len())?;
    for (key, value) in map.iter() {
        write_string(out, key)?;
        write_string(out, value)?;
    }
    Ok(())
}

fn read_event_handlers(cursor: &mut Cursor<&[u8]>) -> Result<InteractionEvents> {
    let script_module = read_string(cursor)?;
    let count = cursor.read_u32::<LittleEndian>()?;
    let mut handlers = Vec::new();
    for _ in 0..count {
        handlers.push(read_string(cursor)?);
    }
    Ok(InteractionEvents {
        script_module,
        handlers,
    })
}

fn write_event_handlers(out: &mut Vec<u8>, events: &InteractionEvents) -> Result<()> {
    write_string(out, &events.script_module)?;
    write_count(out, events.handlers.len())?;
    for handler in &events.handlers {
        write_string(out, handler)?;
    }
    Ok(())
}

fn read_hotspot(cursor: &mut Cursor<&[u8]>, version: RoomFileVersion) -> Result<RoomHotspot> {
    let walk_to = Point {
        x: cursor.read_i32::<LittleEndian>()?,
        y: cursor.read_i32::<LittleEndian>()?,
    };
    let name = read_string(cursor)?;
    let script_name = if version >= RoomFileVersion::V270 {
        read_string(cursor)?
    } else {
        String::new()
    };
    let properties = if version >= RoomFileVersion::V255B {
        read_properties(cursor)?
    } else {
        StringIMap::new()
    };
    let event_handlers = if version >= RoomFileVersion::V300A {
        read_event_handlers(cursor)?
    } else {
        InteractionEvents::default()
    };
    Ok(RoomHotspot {
        name,
        script_name,
        properties,
        event_handlers,
        walk_to,
        ..RoomHotspot::default()
    })
}

fn write_hotspot(out: &mut Vec<u8>, hotspot: &RoomHotspot, version: RoomFileVersion) -> Result<()> {
    out.write_i32::<LittleEndian>(hotspot.walk_to.x)?;
    out.write_i32::<LittleEndian>(hotspot.walk_to.y)?;
    write_string(out, &hotspot.name)?;
    if version >= RoomFileVersion::V270 {
        write_string(out, &hotspot.script_name)?;
    }
    if version >= RoomFileVersion::V255B {
        write_properties(out, &hotspot.properties)?;
    }
    if version >= RoomFileVersion::V300A {
        write_event_handlers(out, &hotspot.event_handlers)?;
    }
    Ok(())
}

fn read_object(cursor: &mut Cursor<&[u8]>, version: RoomFileVersion) -> Result<RoomObjectInfo> {
    let mut object = RoomObjectInfo {
        sprite: cursor.read_i32::<LittleEndian>()?,
        x: cursor.read_i32::<LittleEndian>()?,
        y: cursor.read_i32::<LittleEndian>()?,
        room: cursor.read_i32::<LittleEndian>()?,
        is_on: cursor.read_u8()? != 0,
        baseline: cursor.read_i32::<LittleEndian>()?,
        flags: cursor.read_i32::<LittleEndian>()?,
        name: read_string(cursor)?,
        ..RoomObjectInfo::default()
    };
    if version >= RoomFileVersion::V270 {
        object.script_name = read_string(cursor)?;
    }
    if version >= RoomFileVersion::V255B {
        object.properties = read_properties(cursor)?;
    }
    if version >= RoomFileVersion::V300A {
        object.event_handlers = read_event_handlers(cursor)?;
    }
    Ok(object)
}

fn write_object(
    out: &mut Vec<u8>,
    object: &RoomObjectInfo,
    version: RoomFileVersion,
) -> Result<()> {
    out.write_i32::<LittleEndian>(object.sprite)?;
    out.write_i32::<LittleEndian>(object.x)?;
    out.write_i32::<LittleEndian>(object.y)?;
    out.write_i32::<LittleEndian>(object.room)?;
    out.write_u8(object.is_on as u8)?;
    out.write_i32::<LittleEndian>(object.baseline)?;
    out.write_i32::<LittleEndian>(object.flags)?;
    write_string(out, &object.name)?;
    if version >= RoomFileVersion::V270 {
        write_string(out, &object.script_name)?;
    }
    if version >= RoomFileVersion::V255B {
        write_properties(out, &object.properties)?;
    }
    if version >= RoomFileVersion::V300A {
        write_event_handlers(out, &object.event_handlers)?;
    }
    Ok(())
}

fn read_region(cursor: &mut Cursor<&[u8]>, version: RoomFileVersion) -> Result<RoomRegion> {
    let mut region = RoomRegion {
        light: cursor.read_i32::<LittleEndian>()?,
        tint: cursor.read_i32::<LittleEndian>()?,
        ..RoomRegion::default()
    };
    if version >= RoomFileVersion::V255B {
        region.properties = read_properties(cursor)?;
    }
    if version >= RoomFileVersion::V300A {
        region.event_handlers = read_event_handlers(cursor)?;
    }
    Ok(region)
}

fn write_region(out: &mut Vec<u8>, region: &RoomRegion, version: RoomFileVersion) -> Result<()> {
    out.write_i32::<LittleEndian>(region.light)?;
    out.write_i32::<LittleEndian>(region.tint)?;
    if version >= RoomFileVersion::V255B {
        write_properties(out, &region.properties)?;
    }
    if version >= RoomFileVersion::V300A {
        write_event_handlers(out, &region.event_handlers)?;
    }
    Ok(())
}

fn read_walk_area(cursor: &mut Cursor<&[u8]>, version: RoomFileVersion) -> Result<WalkArea> {
    let character_view = cursor.read_i32::<LittleEndian>()?;
    let scaling_far = cursor.read_i32::<LittleEndian>()?;
    let scaling_near = if version >= RoomFileVersion::V251 {
        cursor.read_i32::<LittleEndian>()?
    } else {
        NOT_VECTOR_SCALED
    };
    Ok(WalkArea {
        character_view,
        scaling_far,
        scaling_near,
        player_view: cursor.read_i32::<LittleEndian>()?,
        top: cursor.read_i32::<LittleEndian>()?,
        bottom: cursor.read_i32::<LittleEndian>()?,
    })
}

fn read_options(cursor: &mut Cursor<&[u8]>) -> Result<RoomOptions> {
    let startup_music = cursor.read_i32::<LittleEndian>()?;
    let save_load_disabled = cursor.read_u8()? != 0;
    let player_char_off = cursor.read_u8()? != 0;
    let player_view = cursor.read_i32::<LittleEndian>()?;
    let raw_volume = cursor.read_i8()?;
    let music_volume = RoomVolumeMod::from_i32(raw_volume as i32)
        .with_context(|| format!("invalid room music volume {raw_volume}"))?;
    let flags = cursor.read_i32::<LittleEndian>()?;
    Ok(RoomOptions {
        startup_music,
        save_load_disabled,
        player_char_off,
        player_view,
        music_volume,
        flags,
    })
}

fn write_options(out: &mut Vec<u8>, options: &RoomOptions) -> Result<()> {
    out.write_i32::<LittleEndian>(options.startup_music)?;
    out.write_u8(options.save_load_disabled as u8)?;
    out.write_u8(options.player_char_off as u8)?;
    out.write_i32::<LittleEndian>(options.player_view)?;
    out.write_i8(options.music_volume.as_i32() as i8)?;
    out.write_i32::<LittleEndian>(options.flags)?;
    Ok(())
}

fn read_palette(cursor: &mut Cursor<&[u8]>) -> Result<Vec<Rgb>> {
    let mut raw = [0u8; PALETTE_SIZE * 3];
    cursor.read_exact(&mut raw).context("reading palette")?;
    Ok(raw
        .chunks_exact(3)
        .map(|c| Rgb {
            r: c[0],
            g: c[1],
            b: c[2],
        })
        .collect())
}

fn write_palette(out: &mut Vec<u8>, palette: &[Rgb]) -> Result<()> {
    for index in 0..PALETTE_SIZE {
        let colour = palette.get(index).copied().unwrap_or_default();
        out.write_all(&[colour.r, colour.g, colour.b])?;
    }
    Ok(())
}

fn read_bitmap(cursor: &mut Cursor<&[u8]>) -> Result<Option<SharedBitmap>> {
    if cursor.read_u8()? == 0 {
        return Ok(None);
    }
    let width = cursor.read_u32::<LittleEndian>()?;
    let height = cursor.read_u32::<LittleEndian>()?;
    let bytes_per_pixel = cursor.read_u8()?;
    let len = width as usize * height as usize * bytes_per_pixel as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    ensure!(
        len <= remaining,
        "bitmap {width}x{height}x{bytes_per_pixel} runs past the end of the data"
    );
    let mut pixels = vec![0u8; len];
    cursor.read_exact(&mut pixels)?;
    Ok(Some(
        Bitmap::from_pixels(width, height, bytes_per_pixel, pixels)?.into_shared(),
    ))
}

fn write_bitmap(out: &mut Vec<u8>, bitmap: Option<&SharedBitmap>) -> Result<()> {
    let Some(bitmap) = bitmap else {
        out.write_u8(0)?;
        return Ok(());
    };
    out.write_u8(1)?;
    out.write_u32::<LittleEndian>(bitmap.width())?;
    out.write_u32::<LittleEndian>(bitmap.height())?;
    out.write_u8(bitmap.bytes_per_pixel())?;
    out.write_all(bitmap.pixels())?;
    Ok(())
}

fn read_script(cursor: &mut Cursor<&[u8]>) -> Result<ScriptModule> {
    let name = read_string(cursor)?;
    let export_count = cursor.read_u32::<LittleEndian>()?;
    let mut exports = Vec::new();
    for _ in 0..export_count {
        exports.push(read_string(cursor)?);
    }
    let import_count = cursor.read_u32::<LittleEndian>()?;
    let mut imports = Vec::new();
    for _ in 0..import_count {
        imports.push(read_string(cursor)?);
    }
    Ok(ScriptModule {
        name,
        exports,
        imports,
    })
}

fn write_script(out: &mut Vec<u8>, script: &ScriptModule) -> Result<()> {
    write_string(out, &script.name)?;
    write_count(out, script.exports.len())?;
    for export in &script.exports {
        write_string(out, export)?;
    }
    write_count(out, script.imports.len())?;
    for import in &script.imports {
        write_string(out, import)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::blank_mask;

    fn sample_room() -> RoomStruct {
        let mut room = RoomStruct::new();
        room.game_id = 0x1234;
        room.width = 320;
        room.height = 200;
        room.bg_frames[0].graphic = Some(Bitmap::new(320, 200, 1).into_shared());
        room.walk_behind_mask = Some(blank_mask(320, 200));
        room.hotspot_mask = Some(blank_mask(320, 200));
        room.walk_area_mask = Some(blank_mask(320, 200));
        room.region_mask = Some(blank_mask(320, 200));
        let _ = room.hotspots.push(RoomHotspot {
            name: "Door".into(),
            script_name: "hDoor".into(),
            properties: [("Locked", "1")].into_iter().collect(),
            walk_to: Point { x: 10, y: 150 },
            ..RoomHotspot::default()
        });
        room.objects.push(RoomObjectInfo {
            sprite: 7,
            x: 40,
            y: 120,
            is_on: true,
            script_name: "oKey".into(),
            ..RoomObjectInfo::default()
        });
        let _ = room.walk_areas.push(WalkArea {
            scaling_far: 80,
            scaling_near: 120,
            ..WalkArea::default()
        });
        let _ = room.messages.push(RoomMessage {
            text: "It's locked.".into(),
            display_as: 0,
            flags: crate::room::MSG_DISPLAYNEXT,
        });
        room.compiled_script = Some(Rc::new(
            ScriptModule::new("room1").with_exports(["hDoor_Interact"]),
        ));
        room
    }

    #[test]
    fn current_version_keeps_authored_data() {
        let room = sample_room();
        let bytes = write_room(&room, RoomFileVersion::CURRENT).unwrap();
        let decoded = read_room(&bytes).unwrap();

        assert_eq!(decoded.data_version, RoomFileVersion::CURRENT.0);
        assert_eq!(decoded.game_id, 0x1234);
        assert_eq!(decoded.hotspots[0].script_name, "hDoor");
        assert_eq!(decoded.hotspots[0].properties.get("locked"), Some("1"));
        assert_eq!(decoded.objects[0].sprite, 7);
        assert_eq!(decoded.walk_areas[0].scaling_near, 120);
        assert_eq!(decoded.messages[0].text, "It's locked.");
        assert_eq!(
            decoded.compiled_script.as_deref().map(|s| s.name.as_str()),
            Some("room1")
        );
        assert_eq!(decoded.primary_background().unwrap().size(), (320, 200));
    }

    #[test]
    fn old_versions_get_historical_defaults() {
        let mut room = sample_room();
        room.set_legacy_resolution(RoomResolutionType::High);
        let bytes = write_room(&room, RoomFileVersion::V250A).unwrap();
        let decoded = read_room(&bytes).unwrap();

        assert_eq!(decoded.game_id, NO_GAME_ID_IN_ROOM_FILE);
        assert_eq!(decoded.walk_areas[0].scaling_near, NOT_VECTOR_SCALED);
        assert!(decoded.hotspots[0].script_name.is_empty());
        assert!(decoded.hotspots[0].properties.is_empty());
        assert_eq!(decoded.legacy_resolution(), RoomResolutionType::High);
        assert_eq!(decoded.mask_resolution, LEGACY_MASK_HIRES_FACTOR);
        assert_eq!(decoded.messages[0].text, "It's locked.");
    }

    #[test]
    fn pre_240_rooms_are_low_resolution() {
        let bytes = write_room(&sample_room(), RoomFileVersion::V214).unwrap();
        let decoded = read_room(&bytes).unwrap();
        assert_eq!(decoded.legacy_resolution(), RoomResolutionType::Low);
        assert!(decoded.is_relative_res());
        assert_eq!(decoded.mask_resolution, 1);
    }

    #[test]
    fn hotspot_limit_depends_on_version() {
        let mut room = sample_room();
        for i in 1..25 {
            let _ = room.hotspots.push(RoomHotspot {
                name: format!("spot {i}"),
                ..RoomHotspot::default()
            });
        }
        assert!(write_room(&room, RoomFileVersion::V261).is_err());
        assert!(write_room(&room, RoomFileVersion::V262).is_ok());
    }

    #[test]
    fn file_helpers_name_the_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room1.crm");
        write_room_file(&path, &sample_room(), RoomFileVersion::V350).unwrap();
        let room = read_room_file(&path).unwrap();
        assert_eq!(room.data_version, RoomFileVersion::V350.0);

        let missing = dir.path().join("room2.crm");
        let err = read_room_file(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("room2.crm"));
    }

    #[test]
    fn rejects_future_and_truncated_files() {
        let mut bytes = write_room(&sample_room(), RoomFileVersion::CURRENT).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(read_room(truncated).is_err());

        bytes[4..6].copy_from_slice(&(RoomFileVersion::CURRENT.0 + 1).to_le_bytes());
        let err = read_room(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported room file version"));
    }
}
