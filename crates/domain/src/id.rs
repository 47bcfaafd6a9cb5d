//! Content-addressed identifier newtypes.
//!
//! Every id is derived from the platform identity of the thing it names, so
//! the same device rediscovered tomorrow gets the same id. The textual form is
//! `stable:` followed by the first 12 hex characters of a SHA-256 digest over
//! a kind tag and the length-prefixed seed parts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix shared by every synthetic id.
pub const STABLE_PREFIX: &str = "stable:";

/// Number of hex characters kept from the seed digest.
pub const STABLE_ID_HEX_LENGTH: usize = 12;

/// Returned when a string is not a well-formed synthetic id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid synthetic id `{0}`")]
pub struct InvalidIdError(pub String);

fn derive_stable(kind: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{STABLE_PREFIX}{}", &digest[..STABLE_ID_HEX_LENGTH])
}

fn is_well_formed(value: &str) -> bool {
    value.strip_prefix(STABLE_PREFIX).is_some_and(|hex| {
        hex.len() == STABLE_ID_HEX_LENGTH
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident, $kind:literal) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Derive the id from its seed parts.
            fn from_seed(parts: &[&str]) -> Self {
                Self(derive_stable($kind, parts))
            }

            /// Borrow the textual form (`stable:<hex>`).
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The hex digest without the `stable:` prefix.
            #[must_use]
            pub fn digest(&self) -> &str {
                &self.0[STABLE_PREFIX.len()..]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if is_well_formed(s) {
                    Ok(Self(s.to_string()))
                } else {
                    Err(InvalidIdError(s.to_string()))
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if is_well_formed(&value) {
                    Ok(Self(value))
                } else {
                    Err(InvalidIdError(value))
                }
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Synthetic identifier for an [`Entity`](crate::entity::Entity).
    EntityId,
    "topomap/entity"
);

define_id!(
    /// Synthetic identifier for a [`Device`](crate::device::Device).
    DeviceId,
    "topomap/device"
);

define_id!(
    /// Synthetic identifier for an [`Area`](crate::area::Area).
    AreaId,
    "topomap/area"
);

impl EntityId {
    /// Id of the entity identified by `(domain, platform unique id)`.
    #[must_use]
    pub fn for_entity(domain: &str, unique_id: &str) -> Self {
        Self::from_seed(&[domain, unique_id])
    }
}

impl DeviceId {
    /// Id of the device with the given platform unique id.
    #[must_use]
    pub fn for_device(unique_id: &str) -> Self {
        Self::from_seed(&[unique_id])
    }
}

impl AreaId {
    /// Id of the area with the given platform unique id.
    #[must_use]
    pub fn for_area(unique_id: &str) -> Self {
        Self::from_seed(&[unique_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_derive_same_id_when_seed_is_unchanged() {
        let a = EntityId::for_entity("light", "kitchen_ceiling");
        let b = EntityId::for_entity("light", "kitchen_ceiling");
        assert_eq!(a, b);
    }

    #[test]
    fn should_derive_different_ids_when_domain_differs() {
        let light = EntityId::for_entity("light", "kitchen");
        let switch = EntityId::for_entity("switch", "kitchen");
        assert_ne!(light, switch);
    }

    #[test]
    fn should_not_collide_when_seed_parts_shift_boundaries() {
        let a = EntityId::for_entity("ab", "c");
        let b = EntityId::for_entity("a", "bc");
        assert_ne!(a, b);
    }

    #[test]
    fn should_separate_kinds_when_seed_is_shared() {
        let device = DeviceId::for_device("hue_1");
        let area = AreaId::for_area("hue_1");
        assert_ne!(device.as_str(), area.as_str());
    }

    #[test]
    fn should_render_stable_prefix_and_twelve_hex_chars() {
        let id = DeviceId::for_device("bridge");
        assert!(id.as_str().starts_with("stable:"));
        assert_eq!(id.digest().len(), STABLE_ID_HEX_LENGTH);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = AreaId::for_area("living_room");
        let parsed: AreaId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let id = EntityId::for_entity("sensor", "temp");
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_malformed_id() {
        assert!(EntityId::from_str("stable:XYZ").is_err());
        assert!(EntityId::from_str("abcdef012345").is_err());
        assert!(EntityId::from_str("stable:abcdef01234").is_err());
    }

    #[test]
    fn should_reject_malformed_id_when_deserializing() {
        let result: Result<DeviceId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(result.is_err());
    }
}
