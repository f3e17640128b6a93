use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use ags_formats::game::{CharacterInfo, FontInfo, GameSetup, LoadedGameEntities};
use ags_formats::room::RoomHotspot;
use ags_formats::{write_room_file, RoomFileVersion, RoomStruct, ScriptModule};
use serde_json::Value;
use tempfile::tempdir;

fn write_bundle(dir: &Path, fonts: usize) -> Result<()> {
    let game = GameSetup {
        game_name: "Cli Quest".into(),
        unique_id: 77,
        fonts: vec![FontInfo::with_size(8); fonts],
        characters: vec![CharacterInfo::named("Roger", "cRoger")],
        ..GameSetup::default()
    };
    let mut ents = LoadedGameEntities::new(game);
    ents.global_script = Some(ScriptModule::new("GlobalScript").with_imports(["cRoger"]));
    let json = serde_json::to_vec_pretty(&ents)?;
    fs::write(dir.join("game.json"), json)?;
    for slot in 0..fonts {
        fs::write(dir.join(format!("agsfnt{slot}.wfn")), b"font")?;
    }
    Ok(())
}

fn run(args: &[&str]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_ags_engine"))
        .args(args)
        .output()
        .context("running ags_engine binary")
}

#[test]
fn cli_initializes_and_reports_rooms() -> Result<()> {
    let dir = tempdir()?;
    write_bundle(dir.path(), 2)?;

    let mut room = RoomStruct::new();
    room.game_id = 77;
    room.hotspots
        .push(RoomHotspot {
            script_name: "hWindow".into(),
            ..RoomHotspot::default()
        })
        .map_err(|_| anyhow::anyhow!("hotspot capacity"))?;
    room.compiled_script = Some(ScriptModule::new("room4").with_imports(["hWindow"]).into());
    let room_path = dir.path().join("room4.crm");
    write_room_file(&room_path, &room, RoomFileVersion::CURRENT)?;

    let game = dir.path().join("game.json");
    let summary = dir.path().join("summary.json");
    let room_arg = format!("4={}", room_path.display());
    let output = run(&[
        "--game",
        game.to_str().context("utf-8 path")?,
        "--room",
        &room_arg,
        "--summary-json",
        summary.to_str().context("utf-8 path")?,
    ])?;
    assert!(
        output.status.success(),
        "cli failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Game: Cli Quest (320x200)"));
    assert!(stdout.contains("Room 4"));

    let report: Value = serde_json::from_slice(&fs::read(&summary)?)?;
    assert_eq!(report["game_name"], "Cli Quest");
    assert_eq!(report["handles_by_type"]["Character"], 1);
    assert_eq!(report["linked_scripts"], serde_json::json!(["GlobalScript", "room4"]));
    assert_eq!(report["rooms"][0]["number"], 4);
    assert_eq!(report["rooms"][0]["bound_names"], serde_json::json!(["hWindow"]));
    let arrays = report["static_arrays"].as_array().context("static_arrays")?;
    assert_eq!(arrays.len(), 7);
    Ok(())
}

#[test]
fn cli_exits_with_the_init_diagnostic() -> Result<()> {
    let dir = tempdir()?;
    write_bundle(dir.path(), 0)?;
    let game = dir.path().join("game.json");

    let output = run(&["--game", game.to_str().context("utf-8 path")?])?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("[ags_engine] No fonts specified to be used in this game"));
    Ok(())
}

#[test]
fn cli_reports_missing_font_files() -> Result<()> {
    let dir = tempdir()?;
    write_bundle(dir.path(), 1)?;
    let game = dir.path().join("game.json");
    let empty_fonts = tempdir()?;

    let output = run(&[
        "--game",
        game.to_str().context("utf-8 path")?,
        "--fonts-dir",
        empty_fonts.path().to_str().context("utf-8 path")?,
    ])?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Unable to load font 0"));
    Ok(())
}

#[test]
fn cli_config_and_flag_enable_upscaling() -> Result<()> {
    let dir = tempdir()?;
    write_bundle(dir.path(), 1)?;
    let game = dir.path().join("game.json");
    let config = dir.path().join("engine.json");
    fs::write(&config, r#"{ "script_timeout_loops": 1000 }"#)?;

    let output = run(&[
        "--game",
        game.to_str().context("utf-8 path")?,
        "--config",
        config.to_str().context("utf-8 path")?,
        "--override-upscale",
    ])?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Game: Cli Quest (640x400)"));
    Ok(())
}
