// Strong Types - newtypes for the identities that flow through the portal
// Keeps item ids, user ids and comment ids from being mixed up at call sites

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw ID value
            pub fn value(self) -> i64 {
                self.0
            }

            /// Check if this is a valid ID (positive)
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }

        // Generated ids exceed 2^53, so the wire form is a decimal string
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Repr {
                    Number(i64),
                    Text(String),
                }

                match Repr::deserialize(deserializer)? {
                    Repr::Number(id) => Ok(Self(id)),
                    Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
                }
            }
        }
    };
}

id_newtype!(
    /// Identifier of an announcement, event or resource
    ItemId
);
id_newtype!(
    /// Identifier of a user in the directory
    UserId
);
id_newtype!(
    /// Identifier of a comment inside its parent item
    CommentId
);

/// Portal role carried by every authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_operations() {
        let id = ItemId::new(123);
        assert_eq!(id.value(), 123);
        assert!(id.is_valid());
        assert!(!UserId::new(-1).is_valid());
        assert_eq!("42".parse::<CommentId>().unwrap(), CommentId(42));
        assert!("abc".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let big = ItemId(7_300_000_000_000_000_001);
        let json = serde_json::to_string(&big).unwrap();
        assert_eq!(json, "\"7300000000000000001\"");
        assert_eq!(serde_json::from_str::<ItemId>(&json).unwrap(), big);
        assert_eq!(serde_json::from_str::<UserId>("7").unwrap(), UserId(7));
        assert!(serde_json::from_str::<UserId>("\"seven\"").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
        assert!(!Role::Faculty.is_admin());
        assert!(Role::Admin.is_admin());
        assert_eq!(serde_json::to_string(&Role::Faculty).unwrap(), "\"faculty\"");
    }
}
