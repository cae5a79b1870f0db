use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

const SECRET_PREFIX: &str = "kg_";
const SECRET_LEN: usize = 32;

/// A freshly minted secret and the digest the origin stores for it. The
/// plaintext leaves the process exactly once, in the creation response.
pub struct GeneratedSecret {
    pub secret: String,
    pub hash: String,
}

pub fn generate_secret() -> GeneratedSecret {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect();
    let secret = format!("{SECRET_PREFIX}{token}");
    let hash = hash_secret(&secret);
    GeneratedSecret { secret, hash }
}

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
