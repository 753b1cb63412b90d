//! Common type definitions shared across the crate.
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`RequesterId`]: person (or ephemeral guest) holding reservations
//! - [`VehicleId`]: registered vehicle
//! - [`UnitId`]: discrete parking unit
//! - [`PoolId`]: pooled capacity section
//! - [`ReservationId`]: reservation lifecycle entity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type RequesterId = Uuid;
pub type VehicleId = Uuid;
pub type UnitId = Uuid;
pub type PoolId = Uuid;
pub type ReservationId = Uuid;

/// Vehicle / capacity category. Stored as TEXT; incoming strings are
/// normalized through the synonym table ("ebike" and "bicycle" are the same
/// category for allocation purposes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VehicleCategory {
    Car,
    Motorcycle,
    Bicycle,
}

impl VehicleCategory {
    /// Whether a vehicle of this category may take a spot of category `other`.
    /// Categories are already normalized, so this is plain equality; the
    /// method exists so the allocation check reads as intent, not mechanism.
    pub fn matches(self, other: VehicleCategory) -> bool {
        self == other
    }
}

impl FromStr for VehicleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleCategory::Car),
            "motorcycle" | "motorbike" => Ok(VehicleCategory::Motorcycle),
            "bicycle" | "bike" | "ebike" | "e-bike" => Ok(VehicleCategory::Bicycle),
            other => Err(format!("unknown vehicle category: {other}")),
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleCategory::Car => write!(f, "car"),
            VehicleCategory::Motorcycle => write!(f, "motorcycle"),
            VehicleCategory::Bicycle => write!(f, "bicycle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_synonyms_normalize() {
        assert_eq!("ebike".parse::<VehicleCategory>().unwrap(), VehicleCategory::Bicycle);
        assert_eq!("e-bike".parse::<VehicleCategory>().unwrap(), VehicleCategory::Bicycle);
        assert_eq!("Bicycle".parse::<VehicleCategory>().unwrap(), VehicleCategory::Bicycle);
        assert_eq!("motorbike".parse::<VehicleCategory>().unwrap(), VehicleCategory::Motorcycle);
        assert!("hovercraft".parse::<VehicleCategory>().is_err());
    }

    #[test]
    fn test_category_matching() {
        assert!(VehicleCategory::Bicycle.matches("ebike".parse().unwrap()));
        assert!(!VehicleCategory::Car.matches(VehicleCategory::Motorcycle));
    }
}
