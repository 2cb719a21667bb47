use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::{pbkdf2, rand::{SecureRandom, SystemRandom}};
use std::num::NonZeroU32;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TOKEN_LEN: usize = 32;
const SCHEME: &str = "pbkdf2";

pub struct CryptoService;

impl CryptoService {
    /// Produces `pbkdf2:<iterations>:<salt>:<hash>` for storage.
    pub fn hash_secret(secret: &str) -> Result<String> {
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| anyhow!("Failed to generate salt"))?;

        let iterations = iterations(PBKDF2_ITERATIONS)?;
        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            secret.as_bytes(),
            &mut hash,
        );

        Ok(format!(
            "{}:{}:{}:{}",
            SCHEME,
            PBKDF2_ITERATIONS,
            general_purpose::STANDARD.encode(salt),
            general_purpose::STANDARD.encode(hash)
        ))
    }

    /// Constant-time check of `secret` against a stored hash. Malformed
    /// hashes never verify.
    pub fn verify_secret(secret: &str, stored: &str) -> bool {
        match parse_stored(stored) {
            Ok((iterations, salt, hash)) => pbkdf2::verify(
                pbkdf2::PBKDF2_HMAC_SHA256,
                iterations,
                &salt,
                secret.as_bytes(),
                &hash,
            )
            .is_ok(),
            Err(err) => {
                tracing::warn!(error = %err, "unreadable secret hash");
                false
            }
        }
    }

    pub fn generate_token() -> Result<String> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; TOKEN_LEN];
        rng.fill(&mut bytes)
            .map_err(|_| anyhow!("Failed to generate session token"))?;
        Ok(hex::encode(bytes))
    }
}

fn parse_stored(stored: &str) -> Result<(NonZeroU32, Vec<u8>, Vec<u8>)> {
    let parts: Vec<&str> = stored.split(':').collect();
    if parts.len() != 4 || parts[0] != SCHEME {
        return Err(anyhow!("Invalid secret hash"));
    }
    let count: u32 = parts[1]
        .parse()
        .map_err(|e| anyhow!("Parse iterations: {}", e))?;
    let salt = general_purpose::STANDARD
        .decode(parts[2])
        .map_err(|e| anyhow!("Decode salt: {}", e))?;
    let hash = general_purpose::STANDARD
        .decode(parts[3])
        .map_err(|e| anyhow!("Decode hash: {}", e))?;
    Ok((iterations(count)?, salt, hash))
}

fn iterations(count: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(count).ok_or_else(|| anyhow!("Invalid iterations"))
}
