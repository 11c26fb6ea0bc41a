//! Crypt filters (PDF 1.5+).
//!
//! A crypt filter names the cipher used for strings or streams and how the
//! per-object key is derived from the file key. Files with `/V` 1 or 2 have
//! a single implicit RC4 filter; `/V` 4 and 5 list them in `/CF`.
//!
//! PDF Spec: Section 7.6.5 - Crypt Filters

use super::{aes, rc4};
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use md5::{Digest, Md5};

/// When the application asks for the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthEvent {
    /// On opening the document
    #[default]
    DocOpen,
    /// On opening an embedded file stream
    EFOpen,
}

impl AuthEvent {
    /// PDF name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::DocOpen => "DocOpen",
            AuthEvent::EFOpen => "EFOpen",
        }
    }
}

/// One entry of the `/CF` dictionary, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDict {
    /// Cipher method (`/CFM`): None, V2, AESV2 or AESV3
    pub cfm: String,
    /// `/AuthEvent`, DocOpen when absent
    pub auth_event: AuthEvent,
    /// `/Length`, in bits or bytes depending on the writer
    pub length: Option<i64>,
}

impl FilterDict {
    /// Read a crypt filter dictionary.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        if let Some(ty) = dict.get("Type") {
            match ty.as_name() {
                Some("CryptFilter") => {},
                _ => {
                    return Err(Error::InvalidObjectType {
                        expected: "CryptFilter".to_string(),
                        found: format!("{:?}", ty),
                    })
                },
            }
        }

        let cfm = dict
            .get("CFM")
            .and_then(Object::as_name)
            .ok_or(Error::MissingKey("CFM"))?
            .to_string();

        let auth_event = match dict.get("AuthEvent").and_then(Object::as_name) {
            Some("EFOpen") => AuthEvent::EFOpen,
            Some("DocOpen") | None => AuthEvent::DocOpen,
            Some(other) => {
                log::warn!("Unknown crypt filter AuthEvent /{}, using DocOpen", other);
                AuthEvent::DocOpen
            },
        };

        let length = dict.get("Length").and_then(Object::as_integer);

        Ok(Self {
            cfm,
            auth_event,
            length,
        })
    }
}

/// A crypt filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptFilter {
    /// Data passes through unchanged
    Identity,
    /// RC4 with a `key_len`-byte file key (5..=16)
    V2 {
        /// Key length in bytes
        key_len: usize,
    },
    /// AES-128 in CBC mode
    AesV2,
    /// AES-256 in CBC mode
    AesV3,
}

impl CryptFilter {
    /// Build an RC4 filter. `length` is read as bits when it is a multiple of
    /// 8 in 40..=128 and as bytes when it is in 5..=16.
    pub fn v2(length: i64) -> Result<Self> {
        let key_len = if (40..=128).contains(&length) && length % 8 == 0 {
            length / 8
        } else if (5..=16).contains(&length) {
            length
        } else {
            return Err(Error::UnsupportedEncryption(format!(
                "RC4 key length {}",
                length
            )));
        };
        Ok(CryptFilter::V2 {
            key_len: key_len as usize,
        })
    }

    /// Build a filter from its dictionary. An RC4 filter without `/Length`
    /// uses `default_length` (the encryption dictionary's, in bits).
    pub fn from_filter_dict(dict: &FilterDict, default_length: i64) -> Result<Self> {
        match dict.cfm.as_str() {
            "V2" => Self::v2(dict.length.unwrap_or(default_length)),
            "AESV2" => match dict.length {
                None | Some(0) | Some(16) | Some(128) => Ok(CryptFilter::AesV2),
                Some(n) => Err(Error::UnsupportedEncryption(format!("AESV2 key length {}", n))),
            },
            "AESV3" => match dict.length {
                None | Some(0) | Some(32) | Some(256) => Ok(CryptFilter::AesV3),
                Some(n) => Err(Error::UnsupportedEncryption(format!("AESV3 key length {}", n))),
            },
            "None" => Ok(CryptFilter::Identity),
            other => Err(Error::UnsupportedEncryption(format!("crypt filter method /{}", other))),
        }
    }

    /// The `/CFM` name.
    pub fn cfm(&self) -> &'static str {
        match self {
            CryptFilter::Identity => "None",
            CryptFilter::V2 { .. } => "V2",
            CryptFilter::AesV2 => "AESV2",
            CryptFilter::AesV3 => "AESV3",
        }
    }

    /// File key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            CryptFilter::Identity => 0,
            CryptFilter::V2 { key_len } => *key_len,
            CryptFilter::AesV2 => 16,
            CryptFilter::AesV3 => 32,
        }
    }

    /// True for the pass-through filter.
    pub fn is_identity(&self) -> bool {
        matches!(self, CryptFilter::Identity)
    }

    fn is_aes(&self) -> bool {
        matches!(self, CryptFilter::AesV2 | CryptFilter::AesV3)
    }

    /// Per-object key (Algorithm 1).
    ///
    /// MD5 over the file key, the low three bytes of the object number and
    /// the low two bytes of the generation (plus `sAlT` for AES-128),
    /// truncated to `min(n + 5, 16)` bytes. AES-256 uses the file key as is.
    pub fn make_key(&self, file_key: &[u8], number: u32, generation: u16) -> Vec<u8> {
        match self {
            CryptFilter::Identity | CryptFilter::AesV3 => file_key.to_vec(),
            CryptFilter::V2 { .. } | CryptFilter::AesV2 => {
                let mut hasher = Md5::new();
                hasher.update(file_key);
                hasher.update(&number.to_le_bytes()[..3]);
                hasher.update(generation.to_le_bytes());
                if self.is_aes() {
                    hasher.update(b"sAlT");
                }
                let hash = hasher.finalize();
                hash[..(file_key.len() + 5).min(16)].to_vec()
            },
        }
    }

    /// Encrypt with an object key from [`make_key`](Self::make_key).
    pub fn encrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CryptFilter::Identity => Ok(data.to_vec()),
            CryptFilter::V2 { .. } => Ok(rc4::rc4_crypt(key, data)),
            CryptFilter::AesV2 | CryptFilter::AesV3 => aes::encrypt_cbc(key, data),
        }
    }

    /// Decrypt with an object key from [`make_key`](Self::make_key).
    pub fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CryptFilter::Identity => Ok(data.to_vec()),
            CryptFilter::V2 { .. } => Ok(rc4::rc4_crypt(key, data)),
            CryptFilter::AesV2 | CryptFilter::AesV3 => aes::decrypt_cbc(key, data),
        }
    }

    /// The `/CF` entry describing this filter.
    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("CryptFilter"));
        dict.insert("AuthEvent".to_string(), Object::name(AuthEvent::DocOpen.name()));
        dict.insert("CFM".to_string(), Object::name(self.cfm()));
        dict.insert("Length".to_string(), Object::Integer(self.key_length() as i64));
        dict
    }
}
