//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the world has a strongly-typed ID so that a territory id
//! can never be passed where an army id is expected. On the wire every id is
//! an opaque string (the hyphenated UUID). App-side generation uses UUID v7
//! (time-ordered) so ids sort by creation time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a player.
    PlayerId
}

define_id! {
    /// Unique identifier for a territory (node in the adjacency graph).
    TerritoryId
}

define_id! {
    /// Unique identifier for an army.
    ArmyId
}

define_id! {
    /// Unique identifier for a unit stack inside an army.
    UnitId
}

define_id! {
    /// Unique identifier for a building attached to a territory.
    BuildingId
}

define_id! {
    /// Unique identifier for a defense attached to a territory.
    DefenseId
}

define_id! {
    /// Unique identifier for a battle.
    BattleId
}

define_id! {
    /// Unique identifier for an alliance of players.
    AllianceId
}

define_id! {
    /// Unique identifier for a world event (disaster, boom, pandemic...).
    GameEventId
}

define_id! {
    /// Unique identifier for a player notification.
    NotificationId
}

define_id! {
    /// Unique identifier for a chat message.
    ChatMessageId
}

define_id! {
    /// Client-generated identifier of an optimistic mutation awaiting
    /// authoritative confirmation.
    OperationId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let player = PlayerId::new();
        let territory = TerritoryId::new();
        assert_ne!(player.into_inner(), Uuid::nil());
        assert_ne!(territory.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = ArmyId::new();
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json, Some(format!("\"{id}\"")));
    }

    #[test]
    fn id_parses_from_display() {
        let id = BattleId::new();
        let parsed: Result<BattleId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
    }
}
