//! Engine-side runtime core: game initialization, the managed-object
//! registry scripts address native objects through, custom properties and
//! room transitions.

pub mod config;
pub mod error;
pub mod fonts;
pub mod game_init;
pub mod objects;
pub mod plugins;
pub mod properties;
pub mod registry;
pub mod room_loader;
pub mod scripts;
pub mod session;
pub mod summary;
pub mod world;

pub use config::EngineConfig;
pub use error::{GameInitError, PropertyError, RegistryError, RoomLoadError, ScriptError};
pub use session::{GameSession, PropertyOwner, SessionPhase};
