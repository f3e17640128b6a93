use ags_formats::PropertyType;
use thiserror::Error;

/// Fatal failures of the one-time game initialization sequence.
#[derive(Debug, Error)]
pub enum GameInitError {
    #[error("No fonts specified to be used in this game")]
    NoFonts,
    #[error("Too many audio types for this engine to handle")]
    TooManyAudioTypes { count: usize, max: usize },
    #[error("Too many plugins for this engine to handle")]
    TooManyPlugins { count: usize, max: usize },
    #[error("Plugin name is invalid")]
    PluginNameInvalid(String),
    #[error("Player character {index} does not exist")]
    InvalidPlayerCharacter { index: usize, count: usize },
    #[error("Script link failed: {0}")]
    ScriptLinkFailed(String),
    #[error("Unable to load font {slot}, no renderer could load a matching file")]
    FontLoadFailed { slot: usize },
    #[error("Plugin '{name}' failed to start: {reason}")]
    PluginFailed { name: String, reason: String },
    #[error("Unable to register game entities: {0}")]
    Registration(#[from] RegistryError),
    #[error("Game is already initialized")]
    AlreadyInitialized,
}

impl GameInitError {
    /// Text shown to the player before the engine quits.
    pub fn diagnostic(&self) -> String {
        match self {
            GameInitError::TooManyAudioTypes { count, max } => {
                format!("{self} ({count} declared, limit is {max})")
            }
            GameInitError::TooManyPlugins { count, max } => {
                format!("{self} ({count} declared, limit is {max})")
            }
            GameInitError::PluginNameInvalid(name) => format!("{self}: '{name}'"),
            GameInitError::InvalidPlayerCharacter { count, .. } => {
                format!("{self} (game has {count} characters)")
            }
            _ => self.to_string(),
        }
    }
}

fn type_mismatch_message(name: &str, wanted: PropertyType) -> String {
    if wanted.is_text() {
        format!(
            "Property '{name}' isn't a text property.  Use GetProperty/SetProperty for non-text properties"
        )
    } else {
        format!(
            "Property '{name}' is a text property.  Use GetTextProperty/SetTextProperty for text properties"
        )
    }
}

/// Custom property lookups that a script got wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error(
        "Did not find property '{0}' in the schema. Make sure you are using the property's name, and not its description, when calling this command."
    )]
    UnknownProperty(String),
    #[error("{}", type_mismatch_message(.name, *.wanted))]
    TypeMismatch { name: String, wanted: PropertyType },
    #[error("{0} does not exist")]
    InvalidEntity(String),
}

/// Handle table, symbol table and field dispatch failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid managed object handle {0}")]
    InvalidHandle(i32),
    #[error("managed object handle {0} refers to a released object")]
    StaleHandle(i32),
    #[error("{type_name}: unsupported variable offset {offset}")]
    InvalidFieldOffset { type_name: &'static str, offset: i32 },
    #[error("{type_name}: attempt to write readonly variable at offset {offset}")]
    ReadOnlyField { type_name: &'static str, offset: i32 },
    #[error("symbol '{0}' is already registered")]
    DuplicateSymbol(String),
    #[error("index {index} out of range for array '{symbol}' of {count} elements")]
    IndexOutOfRange {
        symbol: String,
        index: i64,
        count: usize,
    },
    #[error("array '{symbol}' stride {stride} is smaller than its element size {natural}")]
    InvalidStride {
        symbol: String,
        stride: usize,
        natural: usize,
    },
    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),
    #[error("save image encode error: {0}")]
    SaveEncode(#[from] rmp_serde::encode::Error),
    #[error("save image decode error: {0}")]
    SaveDecode(#[from] rmp_serde::decode::Error),
}

impl RegistryError {
    pub fn invalid_offset(type_name: &'static str, offset: i32) -> Self {
        RegistryError::InvalidFieldOffset { type_name, offset }
    }

    pub fn read_only(type_name: &'static str, offset: i32) -> Self {
        RegistryError::ReadOnlyField { type_name, offset }
    }
}

/// Errors surfaced to the running script. They abort the current script
/// call, never the process.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum RoomLoadError {
    #[error("room belongs to game {room:#x}, running game is {game:#x}")]
    GameIdMismatch { room: i32, game: i32 },
    #[error("failed to decode room: {0:#}")]
    Decode(#[from] anyhow::Error),
    #[error("Script link failed: {0}")]
    ScriptLinkFailed(String),
    #[error("room {0} cannot be entered before the game is initialized")]
    NotInitialized(i32),
    #[error("room entity binding failed: {0}")]
    Registration(#[from] RegistryError),
}
