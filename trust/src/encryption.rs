//! Session Transcript Encryption at rest.
//!
//! `encrypt`/`decrypt` are total: any failure degrades to pass-through rather
//! than raising, matching the spec's availability-over-confidentiality
//! choice for this boundary. The AEAD itself is AES-256-GCM with a 16-byte
//! IV (the crate's own `Aes256Gcm` alias is pinned to a 12-byte nonce, so
//! the cipher is parameterized by hand); the crate has no crypto dependency
//! of its own for this concern, so `aes-gcm`, `aes` and `rand` are drawn in
//! from the wider pack's crypto-at-rest examples.

use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::AesGcm;
use base64::Engine;
use generic_array::{typenum::U16, GenericArray};
use rand::RngCore;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use wardline_core::config::{loader::env_bool, StateDirConfig};

/// AES-256-GCM with a 16-byte nonce, matching the spec's IV length rather
/// than the crate default `Aes256Gcm` alias (which is 12 bytes).
type Cipher = AesGcm<Aes256, U16>;

const PREFIX: &str = "enc:v1:";
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

fn encryption_enabled() -> bool {
    env_bool("SESSION_ENCRYPTION", &[], true)
}

struct KeyCache {
    key_path: PathBuf,
    key: Mutex<Option<[u8; KEY_LEN]>>,
}

static CACHE: OnceLock<KeyCache> = OnceLock::new();

fn cache() -> &'static KeyCache {
    CACHE.get_or_init(|| KeyCache {
        key_path: StateDirConfig::from_env().session_key_path(),
        key: Mutex::new(None),
    })
}

/// Load the cached key, generating and persisting it on first use.
fn load_or_create_key(key_path: &Path) -> std::io::Result<[u8; KEY_LEN]> {
    if let Ok(bytes) = std::fs::read(key_path) {
        if bytes.len() == KEY_LEN {
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(&bytes);
            return Ok(key);
        }
    }

    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);

    if let Some(parent) = key_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write atomically: temp file in the same directory, then rename.
    let tmp_path = key_path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&key)?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, key_path)?;

    Ok(key)
}

fn current_key() -> Option<[u8; KEY_LEN]> {
    let c = cache();
    let mut guard = c.key.lock().ok()?;
    if let Some(key) = *guard {
        return Some(key);
    }
    match load_or_create_key(&c.key_path) {
        Ok(key) => {
            *guard = Some(key);
            Some(key)
        }
        Err(err) => {
            tracing::warn!(error = %err, "session key unavailable, encryption disabled for this call");
            None
        }
    }
}

/// Encrypt `plaintext`, returning `enc:v1:<base64(iv‖tag‖ct)>`. On any
/// failure (encryption disabled, key unavailable) returns `plaintext`
/// unchanged.
pub fn encrypt(plaintext: &str) -> String {
    if !encryption_enabled() {
        return plaintext.to_string();
    }
    let Some(key_bytes) = current_key() else {
        return plaintext.to_string();
    };

    let key = GenericArray::from_slice(&key_bytes);
    let cipher = Cipher::new(key);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let nonce = GenericArray::<u8, U16>::from_slice(&iv);

    match cipher.encrypt(nonce, plaintext.as_bytes()) {
        Ok(ct_and_tag) => {
            // `aes-gcm` appends the tag to the ciphertext; split it back out
            // so the envelope matches the spec's iv‖tag‖ct layout.
            if ct_and_tag.len() < TAG_LEN {
                return plaintext.to_string();
            }
            let split = ct_and_tag.len() - TAG_LEN;
            let (ct, tag) = ct_and_tag.split_at(split);
            let mut buf = Vec::with_capacity(IV_LEN + TAG_LEN + ct.len());
            buf.extend_from_slice(&iv);
            buf.extend_from_slice(tag);
            buf.extend_from_slice(ct);
            format!("{PREFIX}{}", base64::engine::general_purpose::STANDARD.encode(buf))
        }
        Err(err) => {
            tracing::warn!(error = %err, "transcript encryption failed, storing plaintext");
            plaintext.to_string()
        }
    }
}

/// Decrypt `data`. Input without the `enc:v1:` prefix, or malformed
/// prefixed input, is returned unchanged.
pub fn decrypt(data: &str) -> String {
    let Some(encoded) = data.strip_prefix(PREFIX) else {
        return data.to_string();
    };
    if !encryption_enabled() {
        return data.to_string();
    }
    let Some(key_bytes) = current_key() else {
        return data.to_string();
    };

    let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        return data.to_string();
    };
    if raw.len() < IV_LEN + TAG_LEN {
        return data.to_string();
    }
    let (iv, rest) = raw.split_at(IV_LEN);
    let (tag, ct) = rest.split_at(TAG_LEN);

    let key = GenericArray::from_slice(&key_bytes);
    let cipher = Cipher::new(key);
    let nonce = GenericArray::<u8, U16>::from_slice(iv);

    let mut ct_and_tag = Vec::with_capacity(ct.len() + tag.len());
    ct_and_tag.extend_from_slice(ct);
    ct_and_tag.extend_from_slice(tag);

    match cipher.decrypt(nonce, ct_and_tag.as_ref()) {
        Ok(plain) => String::from_utf8(plain).unwrap_or_else(|_| data.to_string()),
        Err(_) => data.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wardline_core::config::loader::set_env_var;

    // `SESSION_ENCRYPTION` is process-global; serialize every test that
    // touches it so cargo's default multi-threaded test runner can't
    // interleave two tests' toggling of the same env var.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn decrypt_of_unprefixed_input_is_identity() {
        let _guard = ENV_LOCK.lock().unwrap();
        assert_eq!(decrypt("hello world"), "hello world");
    }

    #[test]
    fn decrypt_of_malformed_prefixed_input_is_identity() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_env_var("SESSION_ENCRYPTION", "on");
        assert_eq!(decrypt("enc:v1:not-base64!!!"), "enc:v1:not-base64!!!");
    }

    #[test]
    fn encrypt_is_identity_when_globally_disabled() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_env_var("SESSION_ENCRYPTION", "off");
        assert_eq!(encrypt("hello"), "hello");
        set_env_var("SESSION_ENCRYPTION", "on");
    }

    #[test]
    fn round_trip_when_enabled() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_env_var("SESSION_ENCRYPTION", "on");
        let ciphertext = encrypt("hello");
        assert!(ciphertext.starts_with(PREFIX));
        assert_eq!(decrypt(&ciphertext), "hello");
    }
}
