//! Built-in Abyss vault templates
//!
//! A handful of small hand-built pieces, enough to exercise fragment
//! placement and preservation. Games with their own vault files plug in a
//! different [`VaultCatalog`].

use rand::{Rng, RngCore};

use super::types::VaultTemplate;
use super::VaultCatalog;
use crate::terrain::Feature;

/// Ruined chapel with an altar (7x7)
pub fn ruined_chapel() -> VaultTemplate {
    use Feature::*;
    VaultTemplate::new(
        "ruined_chapel",
        vec![
            vec![StoneWall, StoneWall, StoneWall, Floor, StoneWall, StoneWall, StoneWall],
            vec![StoneWall, Floor, Floor, Floor, Floor, Floor, StoneWall],
            vec![StoneWall, Floor, StoneWall, Floor, StoneWall, Floor, StoneWall],
            vec![Floor, Floor, Floor, Altar, Floor, Floor, Floor],
            vec![StoneWall, Floor, StoneWall, Floor, StoneWall, Floor, StoneWall],
            vec![StoneWall, Floor, Floor, Floor, Floor, Floor, StoneWall],
            vec![StoneWall, StoneWall, StoneWall, Floor, StoneWall, StoneWall, StoneWall],
        ],
        vec!["abyss", "sacred"],
    )
}

/// Ring of crystal around a pool (5x5)
pub fn crystal_pool() -> VaultTemplate {
    use Feature::*;
    VaultTemplate::new(
        "crystal_pool",
        vec![
            vec![Floor, CrystalWall, Floor, CrystalWall, Floor],
            vec![CrystalWall, ShallowWater, ShallowWater, ShallowWater, CrystalWall],
            vec![Floor, ShallowWater, DeepWater, ShallowWater, Floor],
            vec![CrystalWall, ShallowWater, ShallowWater, ShallowWater, CrystalWall],
            vec![Floor, CrystalWall, Floor, CrystalWall, Floor],
        ],
        vec!["abyss", "water"],
    )
}

/// Island in a lava moat (7x5)
pub fn lava_moat() -> VaultTemplate {
    use Feature::*;
    VaultTemplate::new(
        "lava_moat",
        vec![
            vec![Floor, Lava, Lava, Lava, Lava, Lava, Floor],
            vec![Lava, Lava, Floor, Floor, Floor, Lava, Lava],
            vec![Floor, Lava, Floor, MetalWall, Floor, Lava, Floor],
            vec![Lava, Lava, Floor, Floor, Floor, Lava, Lava],
            vec![Floor, Lava, Lava, Floor, Lava, Lava, Floor],
        ],
        vec!["abyss", "fire"],
    )
}

/// Four pillars (6x6)
pub fn pillar_hall() -> VaultTemplate {
    use Feature::*;
    VaultTemplate::new(
        "pillar_hall",
        vec![
            vec![Floor, Floor, Floor, Floor, Floor, Floor],
            vec![Floor, MetalWall, Floor, Floor, MetalWall, Floor],
            vec![Floor, Floor, Floor, Floor, Floor, Floor],
            vec![Floor, Floor, Floor, Floor, Floor, Floor],
            vec![Floor, MetalWall, Floor, Floor, MetalWall, Floor],
            vec![Floor, Floor, Floor, Floor, Floor, Floor],
        ],
        vec!["abyss"],
    )
}

/// Petrified grove that appears once per game (5x5)
pub fn petrified_grove() -> VaultTemplate {
    use Feature::*;
    VaultTemplate::new(
        "petrified_grove",
        vec![
            vec![Tree, Floor, Tree, Floor, Tree],
            vec![Floor, Tree, Floor, Tree, Floor],
            vec![Tree, Floor, CrystalWall, Floor, Tree],
            vec![Floor, Tree, Floor, Tree, Floor],
            vec![Tree, Floor, Tree, Floor, Tree],
        ],
        vec!["abyss", "grove"],
    )
    .unique()
}

/// Get all built-in vaults
pub fn all_vaults() -> Vec<VaultTemplate> {
    vec![
        ruined_chapel(),
        crystal_pool(),
        lava_moat(),
        pillar_hall(),
        petrified_grove(),
    ]
}

/// Catalogue over an in-memory list of templates
#[derive(Clone, Debug)]
pub struct PrefabCatalog {
    templates: Vec<VaultTemplate>,
}

impl PrefabCatalog {
    pub fn new(templates: Vec<VaultTemplate>) -> Self {
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for PrefabCatalog {
    fn default() -> Self {
        Self::new(all_vaults())
    }
}

impl VaultCatalog for PrefabCatalog {
    fn find_map_for_tag(&self, tag: &str, rng: &mut dyn RngCore) -> Option<&VaultTemplate> {
        let matching: Vec<&VaultTemplate> = self.templates.iter().filter(|t| t.has_tag(tag)).collect();
        if matching.is_empty() {
            None
        } else {
            Some(matching[rng.gen_range(0..matching.len())])
        }
    }
}
