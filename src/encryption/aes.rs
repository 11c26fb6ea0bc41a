//! AES encryption/decryption for PDF.
//!
//! AES (Advanced Encryption Standard) is used in PDF 1.6+ for stronger encryption.
//! Strings and streams are encrypted in CBC mode with a random 16-byte IV
//! written in front of the ciphertext and PKCS#5 padding.
//!
//! Supported algorithms:
//! - AES-128: 16-byte key (PDF 1.6+, V=4, R=4)
//! - AES-256: 32-byte key (PDF 2.0, V=5, R=5/6)
//!
//! The R6 security handler additionally needs unpadded CBC (key wrapping
//! and the hash rounds of algorithm 2.B) and single-block ECB (`/Perms`).
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

use super::algorithms::generate_random_bytes;
use crate::error::{Error, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

fn key_error(len: usize) -> Error {
    Error::Encryption(format!("AES key must be 16 or 32 bytes, got {}", len))
}

/// CBC-encrypt whole blocks in place, without padding.
fn cbc_encrypt_blocks(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    if buf.len() % BLOCK_SIZE != 0 {
        return Err(Error::Encryption(format!(
            "AES input of {} bytes is not a multiple of the block size",
            buf.len()
        )));
    }
    let len = buf.len();
    let result = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(|_| key_error(key.len()))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map(|_| ()),
        32 => Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|_| key_error(key.len()))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map(|_| ()),
        n => return Err(key_error(n)),
    };
    result.map_err(|_| Error::Encryption("AES encryption failed".to_string()))
}

/// CBC-decrypt whole blocks in place, without padding.
fn cbc_decrypt_blocks(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    if buf.len() % BLOCK_SIZE != 0 {
        return Err(Error::Encryption(format!(
            "AES input of {} bytes is not a multiple of the block size",
            buf.len()
        )));
    }
    let result = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| key_error(key.len()))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map(|_| ()),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| key_error(key.len()))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map(|_| ()),
        n => return Err(key_error(n)),
    };
    result.map_err(|_| Error::Encryption("AES decryption failed".to_string()))
}

/// Encrypt `data` for storage in a PDF: random IV, then the CBC ciphertext
/// of `data` with PKCS#5 padding (always 1-16 bytes).
pub fn encrypt_cbc(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let iv = generate_random_bytes(BLOCK_SIZE);
    encrypt_cbc_with_iv(key, &iv, data)
}

/// [`encrypt_cbc`] with a caller-chosen IV.
pub fn encrypt_cbc_with_iv(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut body = Vec::with_capacity(data.len() + pad);
    body.extend_from_slice(data);
    body.resize(data.len() + pad, pad as u8);

    cbc_encrypt_blocks(key, iv, &mut body)?;

    let mut out = Vec::with_capacity(BLOCK_SIZE + body.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt IV-prefixed CBC data and strip the padding.
///
/// Fewer than 16 bytes (no room for the IV) is an error, as is a body that
/// is not a whole number of blocks or a pad length outside 1..=16. An IV
/// with no body decrypts to nothing.
pub fn decrypt_cbc(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::Encryption(format!(
            "AES data too short: {} bytes",
            data.len()
        )));
    }
    let (iv, body) = data.split_at(BLOCK_SIZE);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body.len() % BLOCK_SIZE != 0 {
        return Err(Error::Encryption(format!(
            "AES data length {} is not a multiple of the block size",
            body.len()
        )));
    }

    let mut buf = body.to_vec();
    cbc_decrypt_blocks(key, iv, &mut buf)?;

    let pad = buf[buf.len() - 1] as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(Error::Encryption(format!("invalid AES padding length {}", pad)));
    }
    buf.truncate(buf.len() - pad);
    Ok(buf)
}

/// Unpadded CBC encryption with an explicit IV.
pub fn encrypt_cbc_raw(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut buf = data.to_vec();
    cbc_encrypt_blocks(key, iv, &mut buf)?;
    Ok(buf)
}

/// Unpadded CBC decryption with an explicit IV.
pub fn decrypt_cbc_raw(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut buf = data.to_vec();
    cbc_decrypt_blocks(key, iv, &mut buf)?;
    Ok(buf)
}

/// Encrypt one 16-byte block with AES-256 (ECB).
pub fn encrypt_block_256(key: &[u8], block: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
    let cipher = Aes256::new_from_slice(key).map_err(|_| key_error(key.len()))?;
    let mut b = block_array(block)?;
    cipher.encrypt_block(&mut b);
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&b);
    Ok(out)
}

/// Decrypt one 16-byte block with AES-256 (ECB).
pub fn decrypt_block_256(key: &[u8], block: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
    let cipher = Aes256::new_from_slice(key).map_err(|_| key_error(key.len()))?;
    let mut b = block_array(block)?;
    cipher.decrypt_block(&mut b);
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&b);
    Ok(out)
}

fn block_array(block: &[u8]) -> Result<GenericArray<u8, aes::cipher::consts::U16>> {
    if block.len() != BLOCK_SIZE {
        return Err(Error::Encryption(format!(
            "AES block must be 16 bytes, got {}",
            block.len()
        )));
    }
    Ok(GenericArray::clone_from_slice(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY128: &[u8; 16] = b"0123456789abcdef";
    const KEY256: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    // ========================================================================
    // IV-prefixed CBC
    // ========================================================================

    #[test]
    fn test_round_trip_both_key_sizes() {
        for key in [&KEY128[..], &KEY256[..]] {
            let ciphertext = encrypt_cbc(key, b"Hello, AES encryption!").unwrap();
            assert_eq!(ciphertext.len(), 16 + 32);
            assert_eq!(decrypt_cbc(key, &ciphertext).unwrap(), b"Hello, AES encryption!");
        }
    }

    #[test]
    fn test_block_aligned_input_gets_full_pad_block() {
        let ciphertext = encrypt_cbc(KEY128, b"Exactly16bytes!!").unwrap();
        assert_eq!(ciphertext.len(), 16 + 32);
        assert_eq!(decrypt_cbc(KEY128, &ciphertext).unwrap(), b"Exactly16bytes!!");
    }

    #[test]
    fn test_empty_plaintext() {
        let ciphertext = encrypt_cbc(KEY128, b"").unwrap();
        assert_eq!(ciphertext.len(), 32);
        assert!(decrypt_cbc(KEY128, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn test_iv_only_decrypts_to_empty() {
        assert!(decrypt_cbc(KEY128, &[7u8; 16]).unwrap().is_empty());
    }

    #[test]
    fn test_decrypt_rejects_malformed() {
        assert!(decrypt_cbc(KEY128, &[0u8; 15]).is_err());
        assert!(decrypt_cbc(KEY128, &[0u8; 20]).is_err());
    }

    #[test]
    fn test_decrypt_rejects_bad_pad_length() {
        // Last plaintext byte 0x00 is not a valid pad length
        let iv = [0u8; 16];
        let body = encrypt_cbc_raw(KEY128, &iv, &[0u8; 16]).unwrap();
        let mut data = iv.to_vec();
        data.extend_from_slice(&body);
        assert!(decrypt_cbc(KEY128, &data).is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(encrypt_cbc(b"short", b"data").is_err());
    }

    #[test]
    fn test_different_ivs() {
        let a = encrypt_cbc(KEY128, b"same").unwrap();
        let b = encrypt_cbc(KEY128, b"same").unwrap();
        assert_ne!(a, b);
    }

    // ========================================================================
    // Raw modes
    // ========================================================================

    #[test]
    fn test_raw_cbc_round_trip() {
        let iv = [0u8; 16];
        let data = [0x42u8; 32];
        let enc = encrypt_cbc_raw(KEY256, &iv, &data).unwrap();
        assert_eq!(enc.len(), 32);
        assert_eq!(decrypt_cbc_raw(KEY256, &iv, &enc).unwrap(), data);
        assert!(encrypt_cbc_raw(KEY256, &iv, &data[..17]).is_err());
    }

    #[test]
    fn test_ecb_block_round_trip() {
        let enc = encrypt_block_256(KEY256, b"0123456789ABCDEF").unwrap();
        assert_eq!(&decrypt_block_256(KEY256, &enc).unwrap(), b"0123456789ABCDEF");
        assert!(encrypt_block_256(KEY256, b"short").is_err());
    }
}
