use std::rc::Rc;

use ags_engine::objects::ScriptType;
use ags_engine::plugins::PluginHost;
use ags_engine::registry::ExternalSymbol;
use ags_engine::{EngineConfig, GameSession, PropertyOwner, RoomLoadError};
use ags_formats::game::{CharacterInfo, FontInfo, GameSetup, LoadedGameEntities};
use ags_formats::room::{RoomHotspot, RoomObjectInfo, RoomRegion, NO_GAME_ID_IN_ROOM_FILE};
use ags_formats::{
    write_room_file, Bitmap, GameResolutionType, PropertyDesc, PropertyType, RoomFileVersion,
    RoomResolutionType, RoomStruct, ScriptModule,
};
use tempfile::tempdir;

const GAME_ID: i32 = 0x0a65;

fn ready_session(resolution: GameResolutionType) -> GameSession {
    let mut game = GameSetup {
        unique_id: GAME_ID,
        default_resolution: resolution,
        fonts: vec![FontInfo::with_size(8)],
        characters: vec![CharacterInfo::named("Roger", "cRoger")],
        ..GameSetup::default()
    };
    game.prop_schema.insert(PropertyDesc::new("Locked", PropertyType::Boolean, "0"));
    game.prop_schema.insert(PropertyDesc::new("Label", PropertyType::String, ""));

    let mut ents = LoadedGameEntities::new(game);
    ents.global_script = Some(ScriptModule::new("GlobalScript").with_exports(["Global_Hint"]));

    let mut session = GameSession::new(EngineConfig::default());
    let mut fonts = |_: usize, _: u32| true;
    session
        .init_game(ents, &mut fonts, PluginHost::new())
        .expect("game should initialize");
    session
}

fn hotspot(script_name: &str) -> RoomHotspot {
    RoomHotspot {
        name: script_name.trim_start_matches('h').to_string(),
        script_name: script_name.to_string(),
        ..RoomHotspot::default()
    }
}

fn object(script_name: &str) -> RoomObjectInfo {
    RoomObjectInfo {
        script_name: script_name.to_string(),
        ..RoomObjectInfo::default()
    }
}

fn office() -> RoomStruct {
    let mut room = RoomStruct::new();
    room.game_id = GAME_ID;
    room.hotspots.push(hotspot("")).unwrap();
    room.hotspots.push(hotspot("hDoor")).unwrap();
    room.hotspots[1].properties = [("Locked", "1")].into_iter().collect();
    room.objects = vec![object("oLamp"), object("")];
    room.regions.push(RoomRegion::default()).unwrap();
    room.properties = [("Label", "Office")].into_iter().collect();
    room.compiled_script = Some(Rc::new(
        ScriptModule::new("room1")
            .with_imports(["hDoor", "oLamp", "cRoger", "Global_Hint", "Display"]),
    ));
    room
}

fn hallway() -> RoomStruct {
    let mut room = RoomStruct::new();
    room.game_id = NO_GAME_ID_IN_ROOM_FILE;
    room.hotspots.push(hotspot("")).unwrap();
    room.hotspots.push(hotspot("hStairs")).unwrap();
    room.compiled_script = Some(Rc::new(ScriptModule::new("room2").with_imports(["hStairs"])));
    room
}

#[test]
fn entering_a_room_binds_its_entity_names() {
    let mut session = ready_session(GameResolutionType::R320x200);
    session.enter_room(1, office()).unwrap();

    let symbols = session.registry.symbols();
    match symbols.get("hDoor") {
        Some(ExternalSymbol::DynamicObject { ty, .. }) => assert_eq!(*ty, ScriptType::Hotspot),
        other => panic!("hDoor bound to {other:?}"),
    }
    assert!(symbols.contains("oLamp"));
    assert_eq!(
        session.scripts.linked_names(),
        vec!["GlobalScript".to_string(), "room1".to_string()]
    );
    assert_eq!(session.world.objects[0].id, 0);
    assert_eq!(session.world.objects[1].id, 1);
    assert!(session.world.objects[2].id < 0);

    let room = session.current_room().unwrap();
    assert_eq!(room.number, 1);
    assert_eq!(room.bound_names, vec!["hDoor", "oLamp"]);
}

#[test]
fn room_properties_live_and_die_with_the_room() {
    let mut session = ready_session(GameResolutionType::R320x200);
    session.enter_room(1, office()).unwrap();

    let door = PropertyOwner::Hotspot(1);
    assert_eq!(session.get_property(door, "Locked").unwrap(), 1);
    assert_eq!(session.get_property(PropertyOwner::Hotspot(0), "locked").unwrap(), 0);
    session.set_property(door, "Locked", 0).unwrap();
    assert_eq!(session.get_property(door, "Locked").unwrap(), 0);
    assert_eq!(
        session
            .get_text_property_dynamic(PropertyOwner::Room, "label")
            .unwrap(),
        "Office"
    );
    session
        .set_text_property(PropertyOwner::Object(0), "Label", "brass lamp")
        .unwrap();
    assert_eq!(
        session
            .get_text_property_dynamic(PropertyOwner::Object(0), "Label")
            .unwrap(),
        "brass lamp"
    );
    assert_eq!(session.get_property(PropertyOwner::Region(0), "Locked").unwrap(), 0);
    assert!(session.get_property(PropertyOwner::Region(1), "Locked").is_err());

    session.enter_room(1, office()).unwrap();
    assert_eq!(session.get_property(door, "Locked").unwrap(), 1);
}

#[test]
fn changing_rooms_swaps_the_bound_names() {
    let mut session = ready_session(GameResolutionType::R320x200);
    session.enter_room(1, office()).unwrap();
    session.enter_room(2, hallway()).unwrap();

    let symbols = session.registry.symbols();
    assert!(!symbols.contains("hDoor"));
    assert!(!symbols.contains("oLamp"));
    assert!(symbols.contains("hStairs"));
    assert!(symbols.contains("cRoger"));
    assert_eq!(session.current_room().map(|room| room.number), Some(2));
    assert!(session.world.objects.iter().all(|object| object.id < 0));
}

#[test]
fn a_failed_link_keeps_the_previous_room() {
    let mut session = ready_session(GameResolutionType::R320x200);
    session.enter_room(1, office()).unwrap();

    let mut broken = hallway();
    broken.compiled_script = Some(Rc::new(
        ScriptModule::new("room2").with_imports(["hStairs", "hDoor"]),
    ));
    let err = session.enter_room(2, broken).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Script link failed: unresolved import 'hDoor' in script 'room2'"
    );

    assert_eq!(session.current_room().map(|room| room.number), Some(1));
    assert!(session.registry.symbols().contains("hDoor"));
    assert!(!session.registry.symbols().contains("hStairs"));
    assert_eq!(session.scripts.linked_names().last().map(String::as_str), Some("room1"));
}

#[test]
fn rooms_from_another_game_are_refused() {
    let mut session = ready_session(GameResolutionType::R320x200);
    let mut foreign = office();
    foreign.game_id = 0x7777;
    assert!(matches!(
        session.enter_room(1, foreign),
        Err(RoomLoadError::GameIdMismatch { room: 0x7777, game: GAME_ID })
    ));
    assert!(session.current_room().is_none());

    let mut lenient = GameSession::new(EngineConfig {
        strict_room_game_id: false,
        ..EngineConfig::default()
    });
    let mut fonts = |_: usize, _: u32| true;
    let game = GameSetup {
        unique_id: GAME_ID,
        fonts: vec![FontInfo::with_size(8)],
        ..GameSetup::default()
    };
    lenient
        .init_game(LoadedGameEntities::new(game), &mut fonts, PluginHost::new())
        .unwrap();
    let mut foreign = hallway();
    foreign.game_id = 0x7777;
    lenient.enter_room(2, foreign).unwrap();
}

#[test]
fn rooms_need_an_initialized_game() {
    let mut session = GameSession::new(EngineConfig::default());
    assert!(matches!(
        session.enter_room(1, office()),
        Err(RoomLoadError::NotInitialized(1))
    ));
}

#[test]
fn invalid_rooms_are_rejected_before_the_switch() {
    let mut session = ready_session(GameResolutionType::R320x200);
    session.enter_room(1, office()).unwrap();
    let mut broken = hallway();
    broken.mask_resolution = 0;
    assert!(matches!(
        session.enter_room(2, broken),
        Err(RoomLoadError::Decode(_))
    ));
    assert_eq!(session.current_room().map(|room| room.number), Some(1));
}

#[test]
fn low_res_rooms_are_upscaled_for_hires_games() {
    let mut session = ready_session(GameResolutionType::R640x400);
    let mut room = hallway();
    room.set_legacy_resolution(RoomResolutionType::Low);
    room.bg_frames[0].graphic = Some(Bitmap::new(320, 200, 1).into_shared());
    session.enter_room(2, room).unwrap();

    let room = &session.current_room().unwrap().data;
    assert_eq!((room.width, room.height), (640, 400));
    assert!(room.is_upscaled());
    assert_eq!(room.primary_background().map(|bmp| bmp.size()), Some((640, 400)));
}

#[test]
fn leaving_frees_the_room() {
    let mut session = ready_session(GameResolutionType::R320x200);
    session.enter_room(1, office()).unwrap();
    assert_eq!(session.leave_room(), Some(1));
    assert_eq!(session.leave_room(), None);
    assert!(!session.registry.symbols().contains("hDoor"));
    assert_eq!(session.scripts.linked_names(), vec!["GlobalScript"]);
    assert!(session.get_property(PropertyOwner::Room, "Label").is_err());
}

#[test]
fn rooms_load_from_disk() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("room1.crm");
    write_room_file(&path, &office(), RoomFileVersion::CURRENT)?;

    let mut session = ready_session(GameResolutionType::R320x200);
    session.load_room_file(1, &path)?;
    let room = session.current_room().expect("room should be current");
    assert_eq!(room.bound_names, vec!["hDoor", "oLamp"]);
    assert_eq!(session.get_property(PropertyOwner::Hotspot(1), "Locked")?, 1);

    let garbage = dir.path().join("room2.crm");
    std::fs::write(&garbage, b"not a room")?;
    assert!(matches!(
        session.load_room_file(2, &garbage),
        Err(RoomLoadError::Decode(_))
    ));
    assert_eq!(session.current_room().map(|room| room.number), Some(1));
    Ok(())
}

#[test]
fn oversized_room_files_are_rejected() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("room3.crm");
    let mut huge = hallway();
    huge.width = 0x4000_0001;
    huge.set_legacy_resolution(RoomResolutionType::Low);
    write_room_file(&path, &huge, RoomFileVersion::CURRENT)?;

    let mut session = ready_session(GameResolutionType::R640x400);
    session.enter_room(2, hallway())?;
    assert!(matches!(
        session.load_room_file(3, &path),
        Err(RoomLoadError::Decode(_))
    ));
    assert_eq!(session.current_room().map(|room| room.number), Some(2));
    Ok(())
}
