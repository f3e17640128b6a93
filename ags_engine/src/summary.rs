use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::objects::ScriptType;
use crate::registry::ExternalSymbol;
use crate::room_loader::LoadedRoom;
use crate::session::GameSession;

#[derive(Debug, Clone, Serialize)]
pub struct StaticArraySummary {
    pub symbol: String,
    pub type_name: &'static str,
    pub element_stride: usize,
    pub element_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub number: i32,
    pub width: i32,
    pub height: i32,
    pub hotspots: usize,
    pub objects: usize,
    pub regions: usize,
    pub bound_names: Vec<String>,
    pub has_script: bool,
}

impl RoomSummary {
    pub fn from_loaded(room: &LoadedRoom) -> Self {
        Self {
            number: room.number,
            width: room.data.width,
            height: room.data.height,
            hotspots: room.data.hotspot_count(),
            objects: room.data.objects.len(),
            regions: room.data.region_count(),
            bound_names: room.bound_names.clone(),
            has_script: room.data.compiled_script.is_some(),
        }
    }
}

/// What a session looks like after init and room entry, for the CLI report.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub game_name: String,
    pub resolution: (u32, u32),
    pub handles: usize,
    pub handles_by_type: BTreeMap<&'static str, usize>,
    pub symbols: usize,
    pub static_arrays: Vec<StaticArraySummary>,
    pub functions: usize,
    pub linked_scripts: Vec<String>,
    pub plugins: Vec<String>,
    pub rooms: Vec<RoomSummary>,
}

impl SessionSummary {
    pub fn collect(session: &GameSession, rooms: Vec<RoomSummary>) -> Self {
        let registry = &session.registry;
        let handles_by_type = ScriptType::ALL
            .iter()
            .map(|&ty| (ty.type_name(), registry.count_of_type(ty)))
            .filter(|&(_, count)| count > 0)
            .collect();
        let static_arrays = registry
            .symbols()
            .static_arrays()
            .map(|array| StaticArraySummary {
                symbol: array.symbol.clone(),
                type_name: array.ty.type_name(),
                element_stride: array.element_stride,
                element_count: array.element_count,
            })
            .collect();
        let functions = registry
            .symbols()
            .iter()
            .filter(|(_, symbol)| matches!(symbol, ExternalSymbol::Function))
            .count();

        Self {
            game_name: session.game().game_name.clone(),
            resolution: session.game().resolution(),
            handles: registry.len(),
            handles_by_type,
            symbols: registry.symbols().len(),
            static_arrays,
            functions,
            linked_scripts: session.scripts.linked_names(),
            plugins: session.plugins.loaded_names(),
            rooms,
        }
    }

    pub fn print(&self) {
        let (width, height) = self.resolution;
        println!("Game: {} ({width}x{height})", self.game_name);
        println!(
            "Registered handles: {} | global symbols: {} | engine functions: {}",
            self.handles, self.symbols, self.functions
        );
        for (type_name, count) in &self.handles_by_type {
            println!("  {type_name:<24} {count:>5}");
        }

        println!("\nStatic arrays:");
        for array in &self.static_arrays {
            println!(
                "  - {:<12} {:<12} {:>4} x {:>3} bytes",
                array.symbol, array.type_name, array.element_count, array.element_stride
            );
        }

        if !self.linked_scripts.is_empty() {
            println!("\nLinked scripts (in order):");
            for name in &self.linked_scripts {
                println!("  - {name}");
            }
        }
        if !self.plugins.is_empty() {
            println!("\nPlugins: {}", self.plugins.join(", "));
        }

        for room in &self.rooms {
            println!(
                "\nRoom {}: {}x{} | hotspots: {} | objects: {} | regions: {}{}",
                room.number,
                room.width,
                room.height,
                room.hotspots,
                room.objects,
                room.regions,
                if room.has_script { " | scripted" } else { "" }
            );
            if !room.bound_names.is_empty() {
                println!("  names: {}", room.bound_names.join(", "));
            }
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("serializing session summary to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing session summary to {}", path.display()))
    }
}
