use crate::error::RegistryError;
use crate::objects::{EntityRef, ObjectStore, ObjectTarget, ScriptType};
use crate::registry::symbols::ExternalSymbol;
use crate::registry::ManagedObjectRegistry;

/// A whole native array exposed under one script symbol.
///
/// Scripts address elements by byte offset from the array start. The
/// stride may exceed the element's natural size for legacy padded
/// layouts; the padding itself is not addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticArray {
    pub symbol: String,
    pub ty: ScriptType,
    /// Index of element 0 in the owning native array.
    pub base_index: usize,
    pub element_stride: usize,
    pub element_count: usize,
}

impl StaticArray {
    pub fn new(
        symbol: &str,
        ty: ScriptType,
        base_index: usize,
        element_stride: usize,
        element_count: usize,
    ) -> Result<Self, RegistryError> {
        let natural = ty.natural_size();
        if element_stride < natural {
            return Err(RegistryError::InvalidStride {
                symbol: symbol.to_string(),
                stride: element_stride,
                natural,
            });
        }
        Ok(Self {
            symbol: symbol.to_string(),
            ty,
            base_index,
            element_stride,
            element_count,
        })
    }

    fn out_of_range(&self, index: i64) -> RegistryError {
        RegistryError::IndexOutOfRange {
            symbol: self.symbol.clone(),
            index,
            count: self.element_count,
        }
    }

    pub fn element(&self, index: i64) -> Result<EntityRef, RegistryError> {
        if index < 0 || index as u64 >= self.element_count as u64 {
            return Err(self.out_of_range(index));
        }
        Ok(EntityRef::new(self.ty, self.base_index + index as usize))
    }

    /// Splits a byte offset from the array start into element and field.
    pub fn locate(&self, byte_offset: i64) -> Result<(EntityRef, i32), RegistryError> {
        let stride = self.element_stride as i64;
        let index = byte_offset.div_euclid(stride);
        let field = byte_offset.rem_euclid(stride);
        let entity = self.element(index)?;
        if field >= self.ty.natural_size() as i64 {
            return Err(RegistryError::invalid_offset(self.ty.type_name(), field as i32));
        }
        Ok((entity, field as i32))
    }

    pub fn read_i32(
        &self,
        byte_offset: i64,
        store: &dyn ObjectStore,
    ) -> Result<i32, RegistryError> {
        let (entity, field) = self.locate(byte_offset)?;
        let accessor = store
            .accessor(ObjectTarget::Static(entity))
            .ok_or_else(|| self.out_of_range(byte_offset / self.element_stride as i64))?;
        accessor.read_i32(field)
    }

    pub fn write_i32(
        &self,
        byte_offset: i64,
        value: i32,
        store: &mut dyn ObjectStore,
    ) -> Result<(), RegistryError> {
        let (entity, field) = self.locate(byte_offset)?;
        let accessor = store
            .accessor_mut(ObjectTarget::Static(entity))
            .ok_or_else(|| self.out_of_range(byte_offset / self.element_stride as i64))?;
        accessor.write_i32(field, value)
    }
}

impl ManagedObjectRegistry {
    /// Exposes `count` elements of type `ty`, starting at `base_index`, as
    /// the script array `symbol`.
    pub fn export_array(
        &mut self,
        symbol: &str,
        base_index: usize,
        ty: ScriptType,
        element_stride: usize,
        element_count: usize,
    ) -> Result<(), RegistryError> {
        let array = StaticArray::new(symbol, ty, base_index, element_stride, element_count)?;
        self.add_external_static_array(symbol, array)
    }

    pub fn static_array(&self, symbol: &str) -> Result<&StaticArray, RegistryError> {
        match self.symbols().resolve(symbol)? {
            ExternalSymbol::StaticArray(array) => Ok(array),
            _ => Err(RegistryError::UnknownSymbol(symbol.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;
    use ags_formats::game::{CharacterInfo, GameSetup};

    fn world_with_characters(count: usize) -> World {
        let mut game = GameSetup::default();
        game.characters = (0..count)
            .map(|i| CharacterInfo::named(format!("Char {i}"), format!("cChar{i}")))
            .collect();
        World::new(game)
    }

    #[test]
    fn indices_are_bounds_checked() {
        let array = StaticArray::new("character", ScriptType::Character, 0, 156, 3).unwrap();
        for index in 0..3 {
            assert_eq!(array.element(index).unwrap().index, index as usize);
        }
        assert!(matches!(
            array.element(3),
            Err(RegistryError::IndexOutOfRange { index: 3, count: 3, .. })
        ));
        assert!(matches!(
            array.element(-1),
            Err(RegistryError::IndexOutOfRange { index: -1, .. })
        ));
    }

    #[test]
    fn stride_below_natural_size_is_rejected() {
        let err = StaticArray::new("character", ScriptType::Character, 0, 100, 3).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidStride { stride: 100, natural: 156, .. }));
    }

    #[test]
    fn padded_stride_addresses_each_element() {
        let mut world = world_with_characters(3);
        let array = StaticArray::new("character", ScriptType::Character, 0, 200, 3).unwrap();

        // x of element 2
        array.write_i32(2 * 200 + 20, 77, &mut world).unwrap();
        assert_eq!(world.game.characters[2].x, 77);
        assert_eq!(array.read_i32(2 * 200 + 20, &world).unwrap(), 77);

        // padding between elements is not addressable
        assert!(matches!(
            array.read_i32(160, &world),
            Err(RegistryError::InvalidFieldOffset { .. })
        ));
        assert!(array.read_i32(-4, &world).is_err());
    }
}
