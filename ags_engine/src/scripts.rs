use std::collections::BTreeMap;

use ags_formats::ScriptModule;

use crate::error::RegistryError;
use crate::objects::{EntityRef, ScriptType};
use crate::registry::{ManagedObjectRegistry, SymbolTable};

/// Engine API functions every script may import.
pub const ENGINE_EXPORTS: &[&str] = &[
    "Character::GetProperty^1",
    "Character::GetTextProperty^1",
    "Character::SetProperty^2",
    "Character::SetTextProperty^2",
    "Hotspot::GetProperty^1",
    "Hotspot::GetTextProperty^1",
    "Hotspot::SetProperty^2",
    "Hotspot::SetTextProperty^2",
    "InventoryItem::GetProperty^1",
    "InventoryItem::GetTextProperty^1",
    "InventoryItem::SetProperty^2",
    "InventoryItem::SetTextProperty^2",
    "Object::GetProperty^1",
    "Object::GetTextProperty^1",
    "Object::SetProperty^2",
    "Object::SetTextProperty^2",
    "Region::GetProperty^1",
    "Region::GetTextProperty^1",
    "Region::SetProperty^2",
    "Region::SetTextProperty^2",
    "Room::GetProperty^1",
    "Room::GetTextProperty^1",
    "Room::SetProperty^2",
    "Room::SetTextProperty^2",
    "Display",
    "Wait",
    "QuitGame",
];

pub fn setup_script_exports(registry: &mut ManagedObjectRegistry) -> Result<(), RegistryError> {
    for name in ENGINE_EXPORTS {
        registry.add_external_function(name)?;
    }
    registry.add_external_static_object("mouse", EntityRef::new(ScriptType::Mouse, 0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Global,
    Dialog,
    Module(usize),
    Room(i32),
}

/// A linked script: what the VM would execute, reduced to its name and the
/// symbols it provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInstance {
    pub name: String,
    pub kind: ModuleKind,
    pub exports: Vec<String>,
}

impl ScriptInstance {
    pub fn implements(&self, function: &str) -> bool {
        self.exports.iter().any(|export| export == function)
    }
}

/// Optional per-module entry points looked up once at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScriptHook {
    RepeatedlyExecuteAlways,
    LateRepeatedlyExecuteAlways,
    DialogOptionsGetDimensions,
    DialogOptionsRender,
    DialogOptionsGetActive,
    DialogOptionsMouseClick,
    DialogOptionsKeyPress,
    DialogOptionsRepexec,
}

impl ScriptHook {
    pub const ALL: [ScriptHook; 8] = [
        ScriptHook::RepeatedlyExecuteAlways,
        ScriptHook::LateRepeatedlyExecuteAlways,
        ScriptHook::DialogOptionsGetDimensions,
        ScriptHook::DialogOptionsRender,
        ScriptHook::DialogOptionsGetActive,
        ScriptHook::DialogOptionsMouseClick,
        ScriptHook::DialogOptionsKeyPress,
        ScriptHook::DialogOptionsRepexec,
    ];

    pub fn function_name(self) -> &'static str {
        match self {
            ScriptHook::RepeatedlyExecuteAlways => "repeatedly_execute_always",
            ScriptHook::LateRepeatedlyExecuteAlways => "late_repeatedly_execute_always",
            ScriptHook::DialogOptionsGetDimensions => "dialog_options_get_dimensions",
            ScriptHook::DialogOptionsRender => "dialog_options_render",
            ScriptHook::DialogOptionsGetActive => "dialog_options_get_active",
            ScriptHook::DialogOptionsMouseClick => "dialog_options_mouse_click",
            ScriptHook::DialogOptionsKeyPress => "dialog_options_key_press",
            ScriptHook::DialogOptionsRepexec => "dialog_options_repexec",
        }
    }
}

const REP_EXEC_NAME: &str = "repeatedly_execute";

/// Which scripts implement each hook, by position in hook call order:
/// auxiliary modules by index, then the global script.
#[derive(Debug, Clone, Default)]
pub struct ModuleFunctionCache {
    implementors: BTreeMap<ScriptHook, Vec<usize>>,
}

impl ModuleFunctionCache {
    fn build<'a>(scripts: impl Iterator<Item = &'a ScriptInstance> + Clone) -> Self {
        let implementors = ScriptHook::ALL
            .iter()
            .map(|&hook| {
                let indices = scripts
                    .clone()
                    .enumerate()
                    .filter(|(_, module)| module.implements(hook.function_name()))
                    .map(|(index, _)| index)
                    .collect();
                (hook, indices)
            })
            .collect();
        Self { implementors }
    }

    pub fn implementors(&self, hook: ScriptHook) -> &[usize] {
        self.implementors
            .get(&hook)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GameScripts {
    pub global: Option<ScriptInstance>,
    pub dialog: Option<ScriptInstance>,
    pub modules: Vec<ScriptInstance>,
    pub room: Option<ScriptInstance>,
    /// VM loop budget before a script is considered hung.
    pub alive_timer: u32,
    hooks: ModuleFunctionCache,
    repexec: Vec<bool>,
    /// Exported symbol to the script that provides it.
    exported: BTreeMap<String, String>,
}

impl GameScripts {
    pub fn new(alive_timer: u32) -> Self {
        Self {
            alive_timer,
            ..Self::default()
        }
    }

    /// Links the game scripts: auxiliary modules first, then the global
    /// script, then the dialog script. Each script only sees the exports of
    /// scripts linked before it.
    pub fn bind(
        &mut self,
        symbols: &SymbolTable,
        global: Option<&ScriptModule>,
        dialog: Option<&ScriptModule>,
        modules: &[ScriptModule],
    ) -> Result<(), String> {
        self.global = None;
        self.dialog = None;
        self.modules.clear();
        self.room = None;
        self.exported.clear();

        for (index, module) in modules.iter().enumerate() {
            let instance = self.link(symbols, module, ModuleKind::Module(index))?;
            self.publish(&instance);
            self.modules.push(instance);
        }
        if let Some(module) = global {
            let instance = self.link(symbols, module, ModuleKind::Global)?;
            self.publish(&instance);
            self.global = Some(instance);
        }
        if let Some(module) = dialog {
            let instance = self.link(symbols, module, ModuleKind::Dialog)?;
            self.publish(&instance);
            self.dialog = Some(instance);
        }

        self.hooks = ModuleFunctionCache::build(self.hook_order());
        self.repexec = self
            .hook_order()
            .map(|script| script.implements(REP_EXEC_NAME))
            .collect();
        log::debug!(
            "linked {} modules, {} exported symbols",
            self.modules.len(),
            self.exported.len()
        );
        Ok(())
    }

    fn link(
        &self,
        symbols: &SymbolTable,
        module: &ScriptModule,
        kind: ModuleKind,
    ) -> Result<ScriptInstance, String> {
        if let Some(missing) = module
            .imports
            .iter()
            .find(|import| !symbols.contains(import) && !self.exported.contains_key(*import))
        {
            return Err(format!(
                "unresolved import '{missing}' in script '{}'",
                module.name
            ));
        }
        Ok(ScriptInstance {
            name: module.name.clone(),
            kind,
            exports: module.exports.clone(),
        })
    }

    fn publish(&mut self, instance: &ScriptInstance) {
        for export in &instance.exports {
            match self.exported.get(export) {
                Some(owner) => log::warn!(
                    "symbol '{export}' exported by both '{owner}' and '{}', keeping the first",
                    instance.name
                ),
                None => {
                    self.exported.insert(export.clone(), instance.name.clone());
                }
            }
        }
    }

    /// Links a room script against the engine, the room's own entities and
    /// every game script. Nothing is stored; see [`GameScripts::set_room`].
    pub fn link_room(
        &self,
        symbols: &SymbolTable,
        module: &ScriptModule,
        number: i32,
    ) -> Result<ScriptInstance, String> {
        self.link(symbols, module, ModuleKind::Room(number))
    }

    pub fn set_room(&mut self, instance: Option<ScriptInstance>) {
        self.room = instance;
    }

    pub fn unlink_room(&mut self) -> Option<ScriptInstance> {
        self.room.take()
    }

    pub fn exporter_of(&self, symbol: &str) -> Option<&str> {
        self.exported.get(symbol).map(String::as_str)
    }

    /// Scripts that receive engine hooks, in call order.
    fn hook_order(&self) -> impl Iterator<Item = &ScriptInstance> + Clone {
        self.modules.iter().chain(self.global.iter())
    }

    /// Scripts implementing `hook`, auxiliary modules first and the global
    /// script last.
    pub fn modules_with(&self, hook: ScriptHook) -> impl Iterator<Item = &ScriptInstance> {
        self.hooks
            .implementors(hook)
            .iter()
            .filter_map(move |&index| self.hook_order().nth(index))
    }

    pub fn modules_with_repexec(&self) -> impl Iterator<Item = &ScriptInstance> {
        self.hook_order()
            .zip(&self.repexec)
            .filter(|&(_, &has)| has)
            .map(|(module, _)| module)
    }

    /// Names of every linked script in link order, room script last.
    pub fn linked_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .chain(self.global.iter())
            .chain(self.dialog.iter())
            .chain(self.room.iter())
            .map(|instance| instance.name.clone())
            .collect()
    }
}
