use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::objects::{EntityRef, ScriptType};
use crate::registry::static_array::StaticArray;

/// What a script-visible global name is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalSymbol {
    /// A managed object, addressed through its handle.
    DynamicObject { handle: i32, ty: ScriptType },
    /// A native object addressed directly, without a handle.
    StaticObject { target: EntityRef },
    StaticArray(StaticArray),
    /// Engine API function implemented natively.
    Function,
}

impl ExternalSymbol {
    pub fn kind(&self) -> &'static str {
        match self {
            ExternalSymbol::DynamicObject { .. } => "object",
            ExternalSymbol::StaticObject { .. } => "static object",
            ExternalSymbol::StaticArray(_) => "array",
            ExternalSymbol::Function => "function",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, ExternalSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`; names are never rebound.
    pub fn bind(&mut self, name: &str, symbol: ExternalSymbol) -> Result<(), RegistryError> {
        if self.symbols.contains_key(name) {
            return Err(RegistryError::DuplicateSymbol(name.to_string()));
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn unbind(&mut self, name: &str) -> Option<ExternalSymbol> {
        self.symbols.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ExternalSymbol> {
        self.symbols.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&ExternalSymbol, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownSymbol(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExternalSymbol)> {
        self.symbols.iter().map(|(name, symbol)| (name.as_str(), symbol))
    }

    pub fn static_arrays(&self) -> impl Iterator<Item = &StaticArray> {
        self.symbols.values().filter_map(|symbol| match symbol {
            ExternalSymbol::StaticArray(array) => Some(array),
            _ => None,
        })
    }
}
