//! PDF encryption algorithms.
//!
//! This module implements the cryptographic algorithms specified in the PDF specification
//! for key derivation and password validation. They are pure functions over
//! byte slices; the security handlers in [`super::handler`] combine them.
//!
//! PDF Spec: Section 7.6.3 - Standard Security Handler
//! PDF 2.0 Spec (ISO 32000-2:2020): Section 7.6.4.3.3 - Algorithm 2.A-13 for R>=5

use super::aes;
use super::rc4::{rc4_chain, rc4_chain_inverse, rc4_crypt};
use crate::error::Result;
use md5::{Digest, Md5};
use sha2::{Sha256, Sha384, Sha512};

/// Padding string used in PDF encryption (32 bytes).
///
/// PDF Spec: Algorithm 2, step 1
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Longest password used by the R5/R6 handlers.
pub const MAX_PASSWORD_LEN: usize = 127;

/// Pad or truncate a password to 32 bytes using the standard padding.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

// ============================================================================
// Revisions 2-4 (MD5 + RC4)
// ============================================================================

/// Compute the file encryption key from a password (Algorithm 2).
///
/// `key_len` is in bytes: 5 for R2, `/Length / 8` otherwise (at most 16).
pub fn compute_file_key(
    password: &[u8],
    owner_entry: &[u8],
    permissions: u32,
    id0: &[u8],
    revision: u32,
    key_len: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let key_len = key_len.min(16);

    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(owner_entry);
    hasher.update(permissions.to_le_bytes());
    hasher.update(id0);
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_len]).to_vec();
        }
    }

    hash.truncate(key_len);
    hash
}

/// RC4 key protecting the `/O` entry (Algorithm 3, steps a-d).
pub fn compute_owner_rc4_key(password: &[u8], revision: u32, key_len: usize) -> Vec<u8> {
    let mut hash = Md5::digest(pad_password(password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash).to_vec();
        }
    }
    hash.truncate(if revision == 2 { 5 } else { key_len.min(16) });
    hash
}

/// Compute the `/O` entry (Algorithm 3).
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_entry(owner: &[u8], user: &[u8], revision: u32, key_len: usize) -> Vec<u8> {
    let password = if owner.is_empty() { user } else { owner };
    let key = compute_owner_rc4_key(password, revision, key_len);
    let padded_user = pad_password(user);
    if revision >= 3 {
        rc4_chain(&key, &padded_user)
    } else {
        rc4_crypt(&key, &padded_user)
    }
}

/// Compute the `/U` entry for R2 (Algorithm 4).
pub fn compute_user_entry_r2(file_key: &[u8]) -> Vec<u8> {
    rc4_crypt(file_key, &PADDING)
}

/// Compute the significant 16 bytes of the `/U` entry for R3 and R4
/// (Algorithm 5). Writers pad the entry to 32 bytes with arbitrary data.
pub fn compute_user_entry_r3(file_key: &[u8], id0: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(id0);
    let hash = hasher.finalize();

    rc4_chain(file_key, &hash)
}

/// Recover the padded user password from the `/O` entry with an owner
/// password (Algorithm 7, steps a-b).
pub fn recover_user_password(
    owner_password: &[u8],
    owner_entry: &[u8],
    revision: u32,
    key_len: usize,
) -> Vec<u8> {
    let key = compute_owner_rc4_key(owner_password, revision, key_len);
    if revision >= 3 {
        rc4_chain_inverse(&key, owner_entry)
    } else {
        rc4_crypt(&key, owner_entry)
    }
}

// ============================================================================
// Revisions 5-6 (SHA-2 + AES-256)
// ============================================================================

/// Truncate a password to the 127 bytes the R5/R6 handlers use.
pub fn truncate_password(password: &[u8]) -> &[u8] {
    &password[..password.len().min(MAX_PASSWORD_LEN)]
}

/// Password hash for R5/R6 (Algorithm 2.B).
///
/// R5 uses a single SHA-256. R6 runs at least 64 rounds that AES-encrypt
/// the password and previous hash and re-hash with SHA-256, -384 or -512
/// depending on the ciphertext; it stops once the last ciphertext byte is
/// no greater than the round number minus 32. `user_key` is the 48-byte
/// `/U` prefix when hashing an owner password, empty otherwise.
pub fn hash_2b(revision: u32, data: &[u8], password: &[u8], user_key: &[u8]) -> Result<Vec<u8>> {
    let mut k = Sha256::digest(data).to_vec();
    if revision == 5 {
        return Ok(k);
    }

    let mut round: u32 = 0;
    loop {
        let mut block = Vec::with_capacity(password.len() + k.len() + user_key.len());
        block.extend_from_slice(password);
        block.extend_from_slice(&k);
        block.extend_from_slice(user_key);
        let k1 = block.repeat(64);

        let e = aes::encrypt_cbc_raw(&k[..16], &k[16..32], &k1)?;

        let selector: u32 = e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3;
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        let last = e[e.len() - 1] as u32;
        if round >= 64 && last <= round - 32 {
            break;
        }
    }

    k.truncate(32);
    Ok(k)
}

/// Generate random bytes using UUID v4 and timestamp mixing.
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(len);

    while result.len() < len {
        let uuid = uuid::Uuid::new_v4();
        let mut hasher = Sha256::new();
        hasher.update(uuid.as_bytes());

        // Add timestamp for extra entropy
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        hasher.update(now.as_nanos().to_le_bytes());

        let hash = hasher.finalize();
        let remaining = len - result.len();
        result.extend_from_slice(&hash[..remaining.min(32)]);
    }

    result
}

/// Constant-time comparison to prevent timing attacks.
///
/// Returns true if the slices are equal.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
