use serde::{Deserialize, Serialize};

use crate::terrain::{Cloud, Feature};
use crate::vaults::FragmentId;

/// One cell of the Abyss window
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbyssTile {
    pub feature: Feature,
    /// Vault this tile belongs to; such tiles are never rewritten by the engine
    pub fragment: Option<FragmentId>,
    pub cloud: Option<Cloud>,
    /// Depth of the last sample written here; `None` means stale
    pub sampled_at: Option<u64>,
}

impl AbyssTile {
    pub fn sampled(feature: Feature, depth: u64) -> Self {
        AbyssTile {
            feature,
            sampled_at: Some(depth),
            ..Default::default()
        }
    }

    pub fn is_stale(&self) -> bool {
        self.sampled_at.is_none()
    }

    pub fn is_authored(&self) -> bool {
        self.fragment.is_some()
    }

    /// Back to unseen: terrain, cloud and vault metadata all cleared
    pub fn wipe(&mut self) {
        *self = AbyssTile::default();
    }
}
