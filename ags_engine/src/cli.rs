use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Initializes an adventure game bundle and walks through its rooms",
    version
)]
pub struct Args {
    /// Path to the game bundle JSON
    #[arg(long)]
    pub game: PathBuf,

    /// Optional engine config JSON; defaults apply when it does not exist
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding agsfnt*.ttf / agsfnt*.wfn (default: the bundle's directory)
    #[arg(long)]
    pub fonts_dir: Option<PathBuf>,

    /// Room to enter after init, as NUMBER=PATH; repeat to enter several in order
    #[arg(long = "room", value_name = "N=PATH", value_parser = parse_room_arg)]
    pub rooms: Vec<(i32, PathBuf)>,

    /// Run 320x200 and 320x240 games at double resolution
    #[arg(long)]
    pub override_upscale: bool,

    /// Path to write the session summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

fn parse_room_arg(raw: &str) -> Result<(i32, PathBuf), String> {
    let (number, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected N=PATH, got '{raw}'"))?;
    let number = number
        .trim()
        .parse::<i32>()
        .map_err(|err| format!("invalid room number '{number}': {err}"))?;
    if path.is_empty() {
        return Err(format!("missing room file path in '{raw}'"));
    }
    Ok((number, PathBuf::from(path)))
}

pub fn parse() -> Result<Args> {
    let args = Args::parse();
    if args.game.as_os_str().is_empty() {
        bail!("--game must not be empty");
    }
    Ok(args)
}

impl Args {
    pub fn fonts_dir(&self) -> PathBuf {
        match &self.fonts_dir {
            Some(dir) => dir.clone(),
            None => self
                .game
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_args_split_on_the_first_equals() {
        assert_eq!(
            parse_room_arg("3=rooms/room3.crm").unwrap(),
            (3, PathBuf::from("rooms/room3.crm"))
        );
        assert_eq!(
            parse_room_arg("-1=a=b.crm").unwrap(),
            (-1, PathBuf::from("a=b.crm"))
        );
        assert!(parse_room_arg("room3.crm").is_err());
        assert!(parse_room_arg("x=room3.crm").is_err());
        assert!(parse_room_arg("4=").is_err());
    }

    #[test]
    fn fonts_default_to_the_bundle_directory() {
        let args = Args::parse_from(["ags_engine", "--game", "data/game.json"]);
        assert_eq!(args.fonts_dir(), PathBuf::from("data"));
        let args = Args::parse_from(["ags_engine", "--game", "data/game.json", "--fonts-dir", "f"]);
        assert_eq!(args.fonts_dir(), PathBuf::from("f"));
    }
}
