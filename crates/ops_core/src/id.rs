use rand::Rng;
use uuid::Uuid;

/// v4-format UUID built from RNG bytes, so seeded runs reproduce anomaly ids.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
