//! Document-level encryption state.
//!
//! [`Crypter`] is built from the trailer's `/Encrypt` dictionary. It holds
//! the crypt filters, the security handler and, after authentication, the
//! file key. Decryption walks an object tree and rewrites strings and
//! stream data in place; the walk remembers which object numbers it has
//! already processed so each object is decrypted exactly once.

use super::filters::{AuthEvent, CryptFilter, FilterDict};
use super::handler::{handler_for, SecurityHandler, StdEncryptDict};
use super::{algorithms, Permissions};
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use md5::{Digest, Md5};
use std::collections::{HashMap, HashSet};

/// Name of the default crypt filter.
pub const STD_CF: &str = "StdCF";

/// Name of the pass-through crypt filter.
pub const IDENTITY: &str = "Identity";

/// Keys whose values are never descended into: they point back up or
/// sideways in the tree and are reached on their own.
const SKIPPED_KEYS: [&str; 3] = ["Parent", "Prev", "Last"];

/// Encryption state of a document.
#[derive(Debug)]
pub struct Crypter {
    version: u32,
    length: u32,
    std: StdEncryptDict,
    handler: Box<dyn SecurityHandler>,
    filters: HashMap<String, CryptFilter>,
    auth_events: HashMap<String, AuthEvent>,
    str_filter: String,
    stm_filter: String,
    id0: Vec<u8>,
    key: Option<Vec<u8>>,
    permissions: Permissions,
    decrypted: HashSet<u32>,
    encrypted: HashSet<u32>,
}

/// Entries produced when encrypting a new document.
#[derive(Debug, Clone)]
pub struct EncryptionInfo {
    /// Minimum PDF version (major, minor) for the chosen cipher
    pub version: (u8, u8),
    /// The `/Encrypt` dictionary
    pub encrypt: Dict,
    /// First element of the trailer `/ID`
    pub id0: Vec<u8>,
    /// Second element of the trailer `/ID`
    pub id1: Vec<u8>,
}

impl Crypter {
    /// Build the encryption state from an `/Encrypt` dictionary.
    ///
    /// `resolve` dereferences indirect `/CF` entries and an indirect `/ID`.
    ///
    /// # Errors
    ///
    /// - `/Filter` other than `Standard`, or `/V` other than 1, 2, 4 or 5
    /// - `/Length` not a multiple of 8
    /// - malformed handler entries (see [`StdEncryptDict::from_dict`])
    /// - `/StrF` or `/StmF` naming a filter that `/CF` does not define
    pub fn from_encrypt_dict<F>(encrypt: &Dict, trailer: &Dict, mut resolve: F) -> Result<Self>
    where
        F: FnMut(ObjectRef) -> Result<Object>,
    {
        match encrypt.get("Filter").and_then(Object::as_name) {
            Some("Standard") => {},
            Some(other) => {
                return Err(Error::UnsupportedEncryption(format!(
                    "security handler /{}",
                    other
                )))
            },
            None => return Err(Error::MissingKey("Filter")),
        }

        let version = encrypt
            .get("V")
            .and_then(Object::as_integer)
            .ok_or_else(|| Error::UnsupportedEncryption("missing /V".to_string()))?;

        let length = match encrypt.get("Length").and_then(Object::as_integer) {
            Some(n) if n <= 0 || n % 8 != 0 => {
                return Err(Error::Encryption(format!(
                    "/Length {} is not a positive multiple of 8",
                    n
                )))
            },
            Some(n) => n,
            None if version >= 4 => 128,
            None => 40,
        };

        let std = StdEncryptDict::from_dict(encrypt)?;
        let id0 = first_id(trailer, &mut resolve)?;

        let mut filters = HashMap::new();
        let mut auth_events = HashMap::new();
        let (str_filter, stm_filter) = match version {
            1 | 2 => {
                filters.insert(STD_CF.to_string(), CryptFilter::v2(length)?);
                (STD_CF.to_string(), STD_CF.to_string())
            },
            4 | 5 => {
                (filters, auth_events) = load_crypt_filters(encrypt, length, &mut resolve)?;
                let select = |key: &'static str| -> Result<String> {
                    let name = encrypt
                        .get(key)
                        .and_then(Object::as_name)
                        .unwrap_or(IDENTITY)
                        .to_string();
                    if !filters.contains_key(&name) {
                        return Err(Error::Encryption(format!(
                            "/{} names undefined crypt filter /{}",
                            key, name
                        )));
                    }
                    Ok(name)
                };
                (select("StrF")?, select("StmF")?)
            },
            v => {
                return Err(Error::UnsupportedEncryption(format!(
                    "encryption algorithm /V {}",
                    v
                )))
            },
        };

        let handler = handler_for(std.revision, &id0, length as u32)?;

        log::info!(
            "Document is encrypted (V={}, R={}, Length={}, StrF={}, StmF={})",
            version,
            std.revision,
            length,
            str_filter,
            stm_filter
        );

        Ok(Self {
            version: version as u32,
            length: length as u32,
            std,
            handler,
            filters,
            auth_events,
            str_filter,
            stm_filter,
            id0,
            key: None,
            permissions: Permissions::empty(),
            decrypted: HashSet::new(),
            encrypted: HashSet::new(),
        })
    }

    /// Set up encryption for a new document.
    ///
    /// `cfm` selects the cipher (`V2`, `AESV2` or `AESV3`). `revision`
    /// defaults to 3 for RC4, 4 for AES-128 and 6 for AES-256; RC4 also
    /// accepts 2 (40-bit) and 4, AES-256 also accepts 5.
    pub fn new_encryption(
        cfm: &str,
        revision: Option<u32>,
        owner: &[u8],
        user: &[u8],
        permissions: Permissions,
    ) -> Result<(Self, EncryptionInfo)> {
        let (version, revision, filter, pdf_version) = match (cfm, revision) {
            ("V2", Some(2)) => (1, 2, CryptFilter::V2 { key_len: 5 }, (1, 3)),
            ("V2", None | Some(3)) => (2, 3, CryptFilter::V2 { key_len: 16 }, (1, 4)),
            ("V2", Some(4)) => (4, 4, CryptFilter::V2 { key_len: 16 }, (1, 5)),
            ("AESV2", None | Some(4)) => (4, 4, CryptFilter::AesV2, (1, 6)),
            ("AESV3", Some(5)) => (5, 5, CryptFilter::AesV3, (1, 7)),
            ("AESV3", None | Some(6)) => (5, 6, CryptFilter::AesV3, (2, 0)),
            (cfm, r) => {
                return Err(Error::UnsupportedEncryption(format!(
                    "cannot encrypt with /{} at revision {:?}",
                    cfm, r
                )))
            },
        };
        let length = filter.key_length() as u32 * 8;

        // Reserved bits must be set
        let permissions = permissions | Permissions::from_bits_retain(0xFFFF_F0C0);

        let id0 = Md5::digest(algorithms::generate_random_bytes(16)).to_vec();
        let id1 = Md5::digest(algorithms::generate_random_bytes(16)).to_vec();

        let handler = handler_for(revision, &id0, length)?;
        let mut std = StdEncryptDict::new(revision, permissions);
        let key = handler.generate_params(&mut std, owner, user)?;

        let mut encrypt = Dict::new();
        encrypt.insert("Filter".to_string(), Object::name("Standard"));
        encrypt.insert("V".to_string(), Object::Integer(version as i64));
        encrypt.insert("Length".to_string(), Object::Integer(length as i64));
        std.write_to(&mut encrypt);

        let mut filters = HashMap::new();
        filters.insert(STD_CF.to_string(), filter);
        filters.insert(IDENTITY.to_string(), CryptFilter::Identity);
        if version >= 4 {
            let mut cf = Dict::new();
            cf.insert(STD_CF.to_string(), Object::Dictionary(filter.to_dict()));
            encrypt.insert("CF".to_string(), Object::Dictionary(cf));
            encrypt.insert("StrF".to_string(), Object::name(STD_CF));
            encrypt.insert("StmF".to_string(), Object::name(STD_CF));
        }

        log::debug!("New encryption with /{} (V={}, R={})", cfm, version, revision);

        let crypter = Self {
            version,
            length,
            std,
            handler,
            filters,
            auth_events: HashMap::new(),
            str_filter: STD_CF.to_string(),
            stm_filter: STD_CF.to_string(),
            id0: id0.clone(),
            key: Some(key),
            permissions: Permissions::OWNER,
            decrypted: HashSet::new(),
            encrypted: HashSet::new(),
        };
        let info = EncryptionInfo {
            version: pdf_version,
            encrypt,
            id0,
            id1,
        };
        Ok((crypter, info))
    }

    /// Try `password` as owner, then user password. On success the file key
    /// is kept for decryption.
    pub fn authenticate(&mut self, password: &[u8]) -> Result<bool> {
        match self.handler.authenticate(&self.std, password)? {
            Some((key, permissions)) if !key.is_empty() => {
                log::info!("Authenticated (owner access: {})", permissions == Permissions::OWNER);
                self.key = Some(key);
                self.permissions = permissions;
                Ok(true)
            },
            _ => {
                log::debug!("Password rejected");
                Ok(false)
            },
        }
    }

    /// The permissions `password` would grant, without changing the state.
    pub fn check_access(&self, password: &[u8]) -> Result<(bool, Permissions)> {
        match self.handler.authenticate(&self.std, password)? {
            Some((key, permissions)) if !key.is_empty() => {
                Ok((true, permissions))
            },
            _ => Ok((false, Permissions::empty())),
        }
    }

    /// True once a password has been accepted.
    pub fn is_authenticated(&self) -> bool {
        self.key.is_some()
    }

    /// Permissions granted by the accepted password.
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Encryption algorithm version (`/V`).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Security handler revision (`/R`).
    pub fn revision(&self) -> u32 {
        self.std.revision
    }

    /// Key length in bits (`/Length`).
    pub fn length(&self) -> u32 {
        self.length
    }

    /// First element of the trailer `/ID`.
    pub fn file_id(&self) -> &[u8] {
        &self.id0
    }

    /// The crypt filter registered under `name`.
    pub fn filter(&self, name: &str) -> Option<&CryptFilter> {
        self.filters.get(name)
    }

    /// When the password for crypt filter `name` is asked for. Filters
    /// without an `/AuthEvent` use DocOpen.
    pub fn auth_event(&self, name: &str) -> AuthEvent {
        self.auth_events.get(name).copied().unwrap_or_default()
    }

    /// Record an object number as needing no decryption.
    pub fn mark_decrypted(&mut self, number: u32) {
        self.decrypted.insert(number);
    }

    /// Forget which objects have been processed. Called when the objects
    /// will be read from the file again, e.g. after the xref table changes.
    pub fn reset_processed(&mut self) {
        self.decrypted.clear();
        self.encrypted.clear();
    }

    /// True when `object` must not be decrypted (again).
    pub fn is_decrypted(&self, object: &Object) -> bool {
        match object {
            Object::Indirect { id, object } => {
                self.decrypted.contains(&id.id) || object.as_dict().is_some_and(is_encrypt_dict)
            },
            Object::Stream { dict, .. } => is_xref_stream(dict) && self.std.revision != 5,
            _ => false,
        }
    }

    /// Decrypt `object` in place. Strings and streams take their keys from
    /// `parent`, the enclosing indirect object; an `Indirect` supplies its
    /// own.
    pub fn decrypt(&mut self, object: &mut Object, parent: ObjectRef) -> Result<()> {
        if self.is_decrypted(object) {
            return Ok(());
        }
        match object {
            Object::Indirect { id, object } => {
                let id = *id;
                self.decrypted.insert(id.id);
                self.decrypt(object, id)
            },
            Object::Stream { dict, data } => {
                let filter = self.stream_filter(dict)?;
                if filter.is_identity() {
                    return Ok(());
                }
                self.decrypt_dict(dict, parent)?;
                let key = filter.make_key(self.file_key()?, parent.id, parent.gen);
                let plain = filter.decrypt(&key, data)?;
                dict.insert("Length".to_string(), Object::Integer(plain.len() as i64));
                *data = plain.into();
                Ok(())
            },
            Object::String(s) => {
                let filter = self.string_filter()?;
                if filter.is_identity() {
                    return Ok(());
                }
                let key = filter.make_key(self.file_key()?, parent.id, parent.gen);
                s.bytes = filter.decrypt(&key, &s.bytes)?;
                Ok(())
            },
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.decrypt(item, parent)?;
                }
                Ok(())
            },
            Object::Dictionary(dict) => self.decrypt_dict(dict, parent),
            _ => Ok(()),
        }
    }

    fn decrypt_dict(&mut self, dict: &mut Dict, parent: ObjectRef) -> Result<()> {
        let is_sig = is_signature(dict);
        for (key, value) in dict.iter_mut() {
            if (is_sig && key == "Contents") || SKIPPED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.decrypt(value, parent)?;
        }
        Ok(())
    }

    /// Encrypt `object` in place; the inverse of [`decrypt`](Self::decrypt).
    /// Cross-reference streams are always left alone.
    pub fn encrypt(&mut self, object: &mut Object, parent: ObjectRef) -> Result<()> {
        match object {
            Object::Indirect { id, object } => {
                let id = *id;
                if !self.encrypted.insert(id.id) || object.as_dict().is_some_and(is_encrypt_dict) {
                    return Ok(());
                }
                self.encrypt(object, id)
            },
            Object::Stream { dict, data } => {
                if is_xref_stream(dict) {
                    return Ok(());
                }
                let filter = self.stream_filter(dict)?;
                if filter.is_identity() {
                    return Ok(());
                }
                self.encrypt_dict(dict, parent)?;
                let key = filter.make_key(self.file_key()?, parent.id, parent.gen);
                let sealed = filter.encrypt(&key, data)?;
                dict.insert("Length".to_string(), Object::Integer(sealed.len() as i64));
                *data = sealed.into();
                Ok(())
            },
            Object::String(s) => {
                let filter = self.string_filter()?;
                if filter.is_identity() {
                    return Ok(());
                }
                let key = filter.make_key(self.file_key()?, parent.id, parent.gen);
                s.bytes = filter.encrypt(&key, &s.bytes)?;
                Ok(())
            },
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.encrypt(item, parent)?;
                }
                Ok(())
            },
            Object::Dictionary(dict) => self.encrypt_dict(dict, parent),
            _ => Ok(()),
        }
    }

    fn encrypt_dict(&mut self, dict: &mut Dict, parent: ObjectRef) -> Result<()> {
        let is_sig = is_signature(dict);
        for (key, value) in dict.iter_mut() {
            if (is_sig && key == "Contents") || SKIPPED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.encrypt(value, parent)?;
        }
        Ok(())
    }

    fn file_key(&self) -> Result<&[u8]> {
        self.key
            .as_deref()
            .ok_or_else(|| Error::Encryption("document is not authenticated".to_string()))
    }

    fn lookup(&self, name: &str) -> Result<CryptFilter> {
        self.filters
            .get(name)
            .copied()
            .ok_or_else(|| Error::Encryption(format!("undefined crypt filter /{}", name)))
    }

    fn string_filter(&self) -> Result<CryptFilter> {
        if self.version >= 4 {
            self.lookup(&self.str_filter)
        } else {
            self.lookup(STD_CF)
        }
    }

    /// The filter for a stream: `/StmF`, unless the stream's own filter
    /// chain starts with `/Crypt`, in which case `/DecodeParms /Name` picks
    /// one (Identity when absent or unknown).
    fn stream_filter(&self, dict: &Dict) -> Result<CryptFilter> {
        if self.version < 4 {
            return self.lookup(STD_CF);
        }

        let first = match dict.get("Filter") {
            Some(Object::Array(names)) => names.first().and_then(Object::as_name),
            Some(Object::Name(name)) => Some(name.as_str()),
            _ => None,
        };
        if first != Some("Crypt") {
            return self.lookup(&self.stm_filter);
        }

        let params = match dict.get("DecodeParms") {
            Some(Object::Array(params)) => params.first().and_then(Object::as_dict),
            Some(Object::Dictionary(params)) => Some(params),
            _ => None,
        };
        match params.and_then(|p| p.get("Name")).and_then(Object::as_name) {
            Some(name) if self.filters.contains_key(name) => self.lookup(name),
            _ => Ok(CryptFilter::Identity),
        }
    }
}

fn is_xref_stream(dict: &Dict) -> bool {
    dict.get("Type").and_then(Object::as_name) == Some("XRef")
}

fn is_signature(dict: &Dict) -> bool {
    dict.get("Type").and_then(Object::as_name) == Some("Sig")
}

/// An encryption dictionary itself is never encrypted.
fn is_encrypt_dict(dict: &Dict) -> bool {
    ["V", "R", "O", "U", "P"].iter().all(|k| dict.contains_key(*k))
}

/// First element of the trailer `/ID`, or empty when there is none.
fn first_id<F>(trailer: &Dict, resolve: &mut F) -> Result<Vec<u8>>
where
    F: FnMut(ObjectRef) -> Result<Object>,
{
    let id = match trailer.get("ID") {
        Some(Object::Reference(r)) => resolve(*r)?.into_direct(),
        Some(other) => other.clone(),
        None => {
            log::debug!("Trailer has no /ID; using an empty file identifier");
            return Ok(Vec::new());
        },
    };
    match id.as_array().and_then(|a| a.first()) {
        Some(Object::String(s)) => Ok(s.bytes.clone()),
        Some(other) => Err(Error::InvalidObjectType {
            expected: "String".to_string(),
            found: other.type_name().to_string(),
        }),
        None => Ok(Vec::new()),
    }
}

/// Read `/CF` into filters and their `/AuthEvent`s. `Identity` is always
/// present and cannot be redefined.
fn load_crypt_filters<F>(
    encrypt: &Dict,
    default_length: i64,
    resolve: &mut F,
) -> Result<(HashMap<String, CryptFilter>, HashMap<String, AuthEvent>)>
where
    F: FnMut(ObjectRef) -> Result<Object>,
{
    let mut filters = HashMap::new();
    let mut auth_events = HashMap::new();

    let cf = match encrypt.get("CF") {
        Some(Object::Reference(r)) => resolve(*r)?.into_direct(),
        Some(other) => other.clone(),
        None => {
            log::debug!("No /CF dictionary; only Identity is available");
            Object::Dictionary(Dict::new())
        },
    };
    let cf = match cf {
        Object::Dictionary(d) => d,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    for (name, entry) in cf {
        if name == IDENTITY {
            log::debug!("Ignoring /CF entry that redefines Identity");
            continue;
        }
        let entry = match entry {
            Object::Reference(r) => resolve(r)?.into_direct(),
            other => other,
        };
        let dict = entry.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: entry.type_name().to_string(),
        })?;
        let filter_dict = FilterDict::from_dict(dict)?;
        let filter = CryptFilter::from_filter_dict(&filter_dict, default_length)?;
        log::debug!(
            "Crypt filter /{} uses /{} (AuthEvent {})",
            name,
            filter.cfm(),
            filter_dict.auth_event.name()
        );
        auth_events.insert(name.clone(), filter_dict.auth_event);
        filters.insert(name, filter);
    }

    filters.insert(IDENTITY.to_string(), CryptFilter::Identity);
    Ok((filters, auth_events))
}
