use serde::{Deserialize, Serialize};

/// The closed set of substances a cell can hold. Wall is immovable: no
/// Rules implementation may transfer mass out of a Wall cell, and it never
/// contributes a density to a fill-weighted mean (see
/// `Cell::effective_density`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    Air,
    Dirt,
    Water,
    Sand,
    Wood,
    Leaf,
    Metal,
    Wall,
}

pub const MATERIAL_COUNT: usize = 8;

impl MaterialType {
    pub const ALL: [MaterialType; MATERIAL_COUNT] = [
        MaterialType::Air,
        MaterialType::Dirt,
        MaterialType::Water,
        MaterialType::Sand,
        MaterialType::Wood,
        MaterialType::Leaf,
        MaterialType::Metal,
        MaterialType::Wall,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Density analogue in kg-per-unit-volume, used only to weight mixed
    /// cells. Wall has no meaningful density figure since it is never
    /// blended with other materials; callers must exclude it explicitly
    /// rather than read this value.
    pub fn density(self) -> f64 {
        match self {
            MaterialType::Air => 0.0,
            MaterialType::Dirt => 1.3,
            MaterialType::Water => 1.0,
            MaterialType::Sand => 1.8,
            MaterialType::Wood => 0.8,
            MaterialType::Leaf => 0.7,
            MaterialType::Metal => 2.0,
            MaterialType::Wall => 0.0,
        }
    }

    pub fn is_wall(self) -> bool {
        matches!(self, MaterialType::Wall)
    }

    pub fn name(self) -> &'static str {
        match self {
            MaterialType::Air => "Air",
            MaterialType::Dirt => "Dirt",
            MaterialType::Water => "Water",
            MaterialType::Sand => "Sand",
            MaterialType::Wood => "Wood",
            MaterialType::Leaf => "Leaf",
            MaterialType::Metal => "Metal",
            MaterialType::Wall => "Wall",
        }
    }

    pub fn from_name(name: &str) -> Option<MaterialType> {
        Some(match name {
            "Air" => MaterialType::Air,
            "Dirt" => MaterialType::Dirt,
            "Water" => MaterialType::Water,
            "Sand" => MaterialType::Sand,
            "Wood" => MaterialType::Wood,
            "Leaf" => MaterialType::Leaf,
            "Metal" => MaterialType::Metal,
            "Wall" => MaterialType::Wall,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips() {
        for m in MaterialType::ALL {
            assert_eq!(MaterialType::from_name(m.name()), Some(m));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(MaterialType::from_name("Plasma"), None);
    }
}
