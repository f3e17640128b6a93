//! Custom property lookups against the game-wide schema.
//!
//! Values come in three layers: a runtime override written by scripts, the
//! static value authored on the entity, and the schema default.

use ags_formats::{PropertyDesc, PropertySchema, PropertyType, StringIMap};

use crate::error::PropertyError;

/// Resolves `name` through the value layers. The schema is not consulted.
pub fn get_value<'a>(
    static_props: &'a StringIMap,
    runtime_props: &'a StringIMap,
    name: &str,
    default: &'a str,
) -> &'a str {
    runtime_props
        .get(name)
        .or_else(|| static_props.get(name))
        .unwrap_or(default)
}

/// Parses the leading integer of `value` the way C `strtol` does with base
/// 0: optional sign, then `0x` hex, leading-zero octal or decimal digits.
/// Trailing text is ignored, out-of-range values saturate and a value with
/// no digits reads as 0.
fn string_to_int(value: &str) -> i32 {
    let text = value.trim_start();
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = match text.as_bytes() {
        [b'0', b'x' | b'X', next, ..] if next.is_ascii_hexdigit() => (16, &text[2..]),
        [b'0', ..] => (8, text),
        _ => (10, text),
    };
    let magnitude = digits
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(i64::from(radix)).saturating_add(i64::from(digit))
        });
    let signed = if negative { -magnitude } else { magnitude };
    signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Truncates `text` to fit a C buffer of `capacity` bytes, terminator
/// included, without splitting a character.
fn truncate_to_capacity(text: &str, capacity: usize) -> &str {
    let limit = capacity.saturating_sub(1);
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyStore<'a> {
    schema: &'a PropertySchema,
}

impl<'a> PropertyStore<'a> {
    pub fn new(schema: &'a PropertySchema) -> Self {
        Self { schema }
    }

    /// Looks up `name` and checks it against the accessor family in use.
    /// Booleans share the integer accessors.
    pub fn resolve_schema(
        &self,
        name: &str,
        wanted: PropertyType,
    ) -> Result<&'a PropertyDesc, PropertyError> {
        let desc = self
            .schema
            .find(name)
            .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()))?;
        if desc.ty.is_text() != wanted.is_text() {
            return Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                wanted,
            });
        }
        Ok(desc)
    }

    pub fn get_int(
        &self,
        static_props: &StringIMap,
        runtime_props: &StringIMap,
        name: &str,
    ) -> Result<i32, PropertyError> {
        let desc = self.resolve_schema(name, PropertyType::Integer)?;
        Ok(string_to_int(get_value(
            static_props,
            runtime_props,
            &desc.name,
            &desc.default_value,
        )))
    }

    /// Copies the value into `out`, truncated to `capacity`. `out` is left
    /// alone when the lookup fails.
    pub fn get_text(
        &self,
        static_props: &StringIMap,
        runtime_props: &StringIMap,
        name: &str,
        out: &mut String,
        capacity: usize,
    ) -> Result<(), PropertyError> {
        let desc = self.resolve_schema(name, PropertyType::String)?;
        let value = get_value(static_props, runtime_props, &desc.name, &desc.default_value);
        out.clear();
        out.push_str(truncate_to_capacity(value, capacity));
        Ok(())
    }

    pub fn get_text_dynamic(
        &self,
        static_props: &StringIMap,
        runtime_props: &StringIMap,
        name: &str,
    ) -> Result<String, PropertyError> {
        let desc = self.resolve_schema(name, PropertyType::String)?;
        Ok(get_value(static_props, runtime_props, &desc.name, &desc.default_value).to_string())
    }

    pub fn set_int(
        &self,
        runtime_props: &mut StringIMap,
        name: &str,
        value: i32,
    ) -> Result<(), PropertyError> {
        let desc = self.resolve_schema(name, PropertyType::Integer)?;
        runtime_props.insert(desc.name.as_str(), value.to_string());
        Ok(())
    }

    pub fn set_text(
        &self,
        runtime_props: &mut StringIMap,
        name: &str,
        value: &str,
    ) -> Result<(), PropertyError> {
        let desc = self.resolve_schema(name, PropertyType::String)?;
        runtime_props.insert(desc.name.as_str(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> PropertySchema {
        vec![
            PropertyDesc::new("Weight", PropertyType::Integer, "5"),
            PropertyDesc::new("Locked", PropertyType::Boolean, "0"),
            PropertyDesc::new("Label", PropertyType::String, "nothing"),
        ]
        .into()
    }

    fn props(pairs: &[(&str, &str)]) -> StringIMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn runtime_beats_static_beats_default() {
        let schema = schema();
        let store = PropertyStore::new(&schema);
        let authored = props(&[("Weight", "7")]);
        let runtime = props(&[("weight", "9")]);
        let empty = StringIMap::new();

        assert_eq!(store.get_int(&authored, &runtime, "Weight").unwrap(), 9);
        assert_eq!(store.get_int(&authored, &empty, "WEIGHT").unwrap(), 7);
        assert_eq!(store.get_int(&empty, &empty, "Weight").unwrap(), 5);
        assert_eq!(get_value(&empty, &empty, "Missing", "dflt"), "dflt");
    }

    #[test]
    fn unknown_property_leaves_output_alone() {
        let schema = schema();
        let store = PropertyStore::new(&schema);
        let empty = StringIMap::new();
        let mut out = String::from("untouched");

        let err = store
            .get_text(&empty, &empty, "Colour", &mut out, 200)
            .unwrap_err();
        assert_eq!(err, PropertyError::UnknownProperty("Colour".into()));
        assert_eq!(out, "untouched");
        assert!(matches!(
            store.get_int(&empty, &empty, "Colour"),
            Err(PropertyError::UnknownProperty(_))
        ));
    }

    #[test]
    fn accessor_family_must_match_declared_type() {
        let schema = schema();
        let store = PropertyStore::new(&schema);
        let empty = StringIMap::new();
        let mut out = String::new();

        assert!(matches!(
            store.get_text(&empty, &empty, "Weight", &mut out, 200),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.get_int(&empty, &empty, "Label"),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert_eq!(store.get_int(&empty, &empty, "Locked").unwrap(), 0);
    }

    #[test]
    fn rejected_writes_do_not_touch_overrides() {
        let schema = schema();
        let store = PropertyStore::new(&schema);
        let mut runtime = StringIMap::new();

        assert!(store.set_int(&mut runtime, "Label", 3).is_err());
        assert!(store.set_text(&mut runtime, "Weight", "x").is_err());
        assert!(store.set_int(&mut runtime, "Nope", 1).is_err());
        assert!(runtime.is_empty());

        store.set_int(&mut runtime, "weight", 12).unwrap();
        store.set_text(&mut runtime, "LABEL", "door").unwrap();
        assert_eq!(
            runtime.iter().collect::<Vec<_>>(),
            vec![("Label", "door"), ("Weight", "12")]
        );
    }

    #[test]
    fn text_is_truncated_to_buffer() {
        let schema = schema();
        let store = PropertyStore::new(&schema);
        let runtime = props(&[("Label", "héllo world")]);
        let empty = StringIMap::new();
        let mut out = String::new();

        store.get_text(&empty, &runtime, "Label", &mut out, 6).unwrap();
        assert_eq!(out, "héll");
        store.get_text(&empty, &runtime, "Label", &mut out, 3).unwrap();
        assert_eq!(out, "h");
        assert_eq!(
            store.get_text_dynamic(&empty, &runtime, "Label").unwrap(),
            "héllo world"
        );
    }

    #[test]
    fn garbage_integers_read_as_zero() {
        let schema = schema();
        let store = PropertyStore::new(&schema);
        let authored = props(&[("Weight", "heavy")]);
        assert_eq!(store.get_int(&authored, &StringIMap::new(), "Weight").unwrap(), 0);
    }

    #[test]
    fn integers_use_their_leading_digits() {
        assert_eq!(string_to_int("12abc"), 12);
        assert_eq!(string_to_int("  -7 kg"), -7);
        assert_eq!(string_to_int("0x1F"), 31);
        assert_eq!(string_to_int("010"), 8);
        assert_eq!(string_to_int("0x"), 0);
        assert_eq!(string_to_int("99999999999"), i32::MAX);
        assert_eq!(string_to_int(""), 0);

        let schema = schema();
        let store = PropertyStore::new(&schema);
        let authored = props(&[("Weight", "12abc")]);
        assert_eq!(store.get_int(&authored, &StringIMap::new(), "Weight").unwrap(), 12);
    }
}
