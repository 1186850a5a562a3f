use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Validate one half of a `class_name.unique_id` pair.
///
/// Parts must be non-empty, lowercase ASCII, and free of dots and
/// whitespace. Digits, `_` and `-` are allowed so UUIDs and map names
/// pass unchanged.
fn validate_part(part: &str) -> Result<(), TypeError> {
    if part.is_empty() {
        return Err(TypeError::InvalidIdPart(part.to_string()));
    }
    let ok = part
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !ok {
        return Err(TypeError::InvalidIdPart(part.to_string()));
    }
    Ok(())
}

fn split_id(s: &str) -> Result<(&str, &str), TypeError> {
    let (class_name, unique_id) = s
        .split_once('.')
        .ok_or_else(|| TypeError::InvalidIdFormat(s.to_string()))?;
    if unique_id.contains('.') {
        return Err(TypeError::InvalidIdFormat(s.to_string()));
    }
    validate_part(class_name)?;
    validate_part(unique_id)?;
    Ok((class_name, unique_id))
}

/// Stable identifier for a migratable game-world entity.
///
/// The string form is `class_name.unique_id`, e.g. `player.7f3a…` or
/// `region.overworld_12`. The class name groups entities of the same kind;
/// the unique part never repeats and is immutable after spawn.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    class_name: String,
    unique_id: String,
}

impl EntityId {
    /// Build an id from its two parts, validating both.
    pub fn new(class_name: &str, unique_id: &str) -> Result<Self, TypeError> {
        validate_part(class_name)?;
        validate_part(unique_id)?;
        Ok(Self {
            class_name: class_name.to_string(),
            unique_id: unique_id.to_string(),
        })
    }

    /// Mint a fresh id for the given class with a random unique part.
    pub fn generate(class_name: &str) -> Result<Self, TypeError> {
        Self::new(class_name, &Uuid::new_v4().to_string())
    }

    /// Parse the `class_name.unique_id` string form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (class_name, unique_id) = split_id(s)?;
        Ok(Self {
            class_name: class_name.to_string(),
            unique_id: unique_id.to_string(),
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.unique_id)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}.{})", self.class_name, self.unique_id)
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifier for a participating server process.
///
/// Same shape as [`EntityId`] (`class_name.unique_id`); by convention the
/// class name is `server`. Liveness for a `ServerId` is tracked by the
/// ownership registry via heartbeat records, not carried on the id itself.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId {
    class_name: String,
    unique_id: String,
}

impl ServerId {
    pub fn new(class_name: &str, unique_id: &str) -> Result<Self, TypeError> {
        validate_part(class_name)?;
        validate_part(unique_id)?;
        Ok(Self {
            class_name: class_name.to_string(),
            unique_id: unique_id.to_string(),
        })
    }

    /// Mint a fresh `server.<uuid>` id for this process.
    pub fn generate() -> Self {
        Self {
            class_name: "server".to_string(),
            unique_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (class_name, unique_id) = split_id(s)?;
        Ok(Self {
            class_name: class_name.to_string(),
            unique_id: unique_id.to_string(),
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.unique_id)
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({}.{})", self.class_name, self.unique_id)
    }
}

impl FromStr for ServerId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_valid_id() {
        let id = EntityId::parse("player.abc-123").unwrap();
        assert_eq!(id.class_name(), "player");
        assert_eq!(id.unique_id(), "abc-123");
    }

    #[test]
    fn display_is_dotted_form() {
        let id = EntityId::new("region", "overworld_12").unwrap();
        assert_eq!(id.to_string(), "region.overworld_12");
    }

    #[test]
    fn parse_rejects_missing_dot() {
        assert!(EntityId::parse("player").is_err());
    }

    #[test]
    fn parse_rejects_extra_dot() {
        assert!(EntityId::parse("player.a.b").is_err());
    }

    #[test]
    fn parse_rejects_uppercase_and_spaces() {
        assert!(EntityId::parse("Player.abc").is_err());
        assert!(EntityId::parse("player.a b").is_err());
    }

    #[test]
    fn parse_rejects_empty_parts() {
        assert!(EntityId::parse(".abc").is_err());
        assert!(EntityId::parse("player.").is_err());
    }

    #[test]
    fn generate_is_unique() {
        let a = EntityId::generate("npc").unwrap();
        let b = EntityId::generate("npc").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.class_name(), "npc");
    }

    #[test]
    fn server_id_generate_parses_back() {
        let id = ServerId::generate();
        let parsed = ServerId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let id = EntityId::new("player", "42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    proptest! {
        #[test]
        fn valid_ids_roundtrip_through_display(
            class in "[a-z][a-z0-9_-]{0,15}",
            unique in "[a-z0-9][a-z0-9_-]{0,31}",
        ) {
            let id = EntityId::new(&class, &unique).unwrap();
            let parsed = EntityId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(id, parsed);
        }
    }
}
