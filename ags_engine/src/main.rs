use std::process;

use anyhow::{Context, Result};
use ags_engine::fonts::DirectoryFontLoader;
use ags_engine::plugins::PluginHost;
use ags_engine::summary::{RoomSummary, SessionSummary};
use ags_engine::{EngineConfig, GameSession};
use ags_formats::LoadedGameEntities;

mod cli;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::parse()?;

    let mut config =
        EngineConfig::from_json_file(args.config.as_deref()).context("loading engine config")?;
    if args.override_upscale {
        config.override_upscale = true;
    }
    let ents = LoadedGameEntities::from_json_file(&args.game)?;

    let mut session = GameSession::new(config);
    let mut fonts = DirectoryFontLoader::new(args.fonts_dir());
    if let Err(err) = session.init_game(ents, &mut fonts, PluginHost::new()) {
        eprintln!("[ags_engine] {}", err.diagnostic());
        process::exit(1);
    }

    let mut rooms = Vec::with_capacity(args.rooms.len());
    for (number, path) in &args.rooms {
        session
            .load_room_file(*number, path)
            .with_context(|| format!("entering room {number} from {}", path.display()))?;
        if let Some(room) = session.current_room() {
            rooms.push(RoomSummary::from_loaded(room));
        }
    }

    let summary = SessionSummary::collect(&session, rooms);
    summary.print();
    if let Some(path) = args.summary_json.as_ref() {
        summary.write_json(path)?;
        println!("\nSaved session summary to {}", path.display());
    }
    Ok(())
}
