use rand::Rng;
use uuid::Uuid;

use crate::MatchId;

/// Generate a deterministic v4-format UUID from a seeded RNG.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

impl MatchId {
    pub fn from_rng(rng: &mut impl Rng) -> Self {
        MatchId(format!("match_{}", generate_uuid(rng)))
    }
}
