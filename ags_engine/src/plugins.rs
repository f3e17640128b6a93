use std::collections::BTreeMap;

use ags_formats::game::{PluginInfo, PLUGIN_FILENAME_MAX};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GameInitError;
use crate::registry::ManagedObjectRegistry;
use crate::world::World;

static PLUGIN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("plugin name regex must compile"));

/// What a plugin may touch while starting up.
pub struct PluginContext<'a> {
    pub world: &'a mut World,
    pub registry: &'a mut ManagedObjectRegistry,
}

/// Engine-side half of a plugin. The loading mechanics behind it are not
/// the engine's concern; a host only knows plugins through their factories.
pub trait EnginePlugin {
    fn name(&self) -> &str;

    /// Receives the plugin's saved data blob from the game bundle.
    fn on_register(&mut self, _data: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_startup(&mut self, context: &mut PluginContext<'_>) -> anyhow::Result<()>;
}

pub type PluginFactory = Box<dyn Fn() -> Box<dyn EnginePlugin>>;

fn factory_key(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    match lower.strip_suffix(".dll") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

#[derive(Default)]
pub struct PluginHost {
    factories: BTreeMap<String, PluginFactory>,
    loaded: Vec<Box<dyn EnginePlugin>>,
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded_names())
            .finish()
    }
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a plugin available under `name`, matched without regard to
    /// case or a trailing `.dll`.
    pub fn add_factory<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn EnginePlugin> + 'static,
    {
        self.factories.insert(factory_key(name), Box::new(factory));
    }

    /// Checks plugin metadata before anything is allocated.
    pub fn validate(infos: &[PluginInfo], max_plugins: usize) -> Result<(), GameInitError> {
        if infos.len() > max_plugins {
            return Err(GameInitError::TooManyPlugins {
                count: infos.len(),
                max: max_plugins,
            });
        }
        if let Some(bad) = infos
            .iter()
            .find(|info| info.name.len() > PLUGIN_FILENAME_MAX || !PLUGIN_NAME.is_match(&info.name))
        {
            return Err(GameInitError::PluginNameInvalid(bad.name.clone()));
        }
        Ok(())
    }

    /// Instantiates the declared plugins in order. Plugins the host has no
    /// factory for are skipped.
    pub fn register_plugins(&mut self, infos: &[PluginInfo]) -> Result<(), GameInitError> {
        for info in infos {
            let Some(factory) = self.factories.get(&factory_key(&info.name)) else {
                log::warn!("plugin '{}' is not available, skipping", info.name);
                continue;
            };
            let mut plugin = factory();
            plugin
                .on_register(&info.data)
                .map_err(|err| GameInitError::PluginFailed {
                    name: info.name.clone(),
                    reason: format!("{err:#}"),
                })?;
            log::debug!("registered plugin '{}'", plugin.name());
            self.loaded.push(plugin);
        }
        Ok(())
    }

    pub fn startup_plugins(
        &mut self,
        context: &mut PluginContext<'_>,
    ) -> Result<(), GameInitError> {
        for plugin in &mut self.loaded {
            plugin
                .on_startup(context)
                .map_err(|err| GameInitError::PluginFailed {
                    name: plugin.name().to_string(),
                    reason: format!("{err:#}"),
                })?;
        }
        Ok(())
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.loaded.iter().map(|plugin| plugin.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ags_formats::game::GameSetup;

    struct Exporter;

    impl EnginePlugin for Exporter {
        fn name(&self) -> &str {
            "exporter"
        }

        fn on_startup(&mut self, context: &mut PluginContext<'_>) -> anyhow::Result<()> {
            context.registry.add_external_function("Exporter::Hello")?;
            Ok(())
        }
    }

    struct Picky;

    impl EnginePlugin for Picky {
        fn name(&self) -> &str {
            "picky"
        }

        fn on_register(&mut self, data: &[u8]) -> anyhow::Result<()> {
            anyhow::ensure!(!data.is_empty(), "missing settings blob");
            Ok(())
        }

        fn on_startup(&mut self, _context: &mut PluginContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn info(name: &str) -> PluginInfo {
        PluginInfo {
            name: name.to_string(),
            data: Vec::new(),
        }
    }

    #[test]
    fn validation_checks_count_and_names() {
        let infos: Vec<_> = (0..3).map(|i| info(&format!("p{i}.dll"))).collect();
        assert!(PluginHost::validate(&infos, 3).is_ok());
        assert!(matches!(
            PluginHost::validate(&infos, 2),
            Err(GameInitError::TooManyPlugins { count: 3, max: 2 })
        ));
        for bad in ["", "../evil.dll", "a_really_long_plugin_name.dll", "dir\\x.dll"] {
            assert!(
                matches!(
                    PluginHost::validate(&[info(bad)], 20),
                    Err(GameInitError::PluginNameInvalid(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn plugins_register_then_start_in_order() {
        let mut host = PluginHost::new();
        host.add_factory("Exporter", || Box::new(Exporter));
        host.register_plugins(&[info("missing.dll"), info("EXPORTER.DLL")])
            .unwrap();
        assert_eq!(host.loaded_names(), vec!["exporter"]);

        let mut world = World::new(GameSetup::default());
        let mut registry = ManagedObjectRegistry::new();
        host.startup_plugins(&mut PluginContext {
            world: &mut world,
            registry: &mut registry,
        })
        .unwrap();
        assert!(registry.symbols().contains("Exporter::Hello"));
    }

    #[test]
    fn registration_failure_names_the_plugin() {
        let mut host = PluginHost::new();
        host.add_factory("picky", || Box::new(Picky));
        let err = host.register_plugins(&[info("picky.dll")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Plugin 'picky.dll' failed to start: missing settings blob"
        );
    }
}
