//! Standard security handlers.
//!
//! The `/Standard` filter comes in two generations: revisions 2-4 derive
//! keys with MD5 and protect the password entries with RC4, revisions 5 and
//! 6 hash with SHA-2 and wrap a random file key with AES-256. Both are
//! reached through [`SecurityHandler`], which knows how to create the
//! password entries and how to turn a password back into the file key.
//!
//! PDF Spec: Section 7.6.3 - Standard Security Handler

use super::aes;
use super::algorithms::{
    compute_file_key, compute_owner_entry, compute_user_entry_r2, compute_user_entry_r3,
    constant_time_compare, generate_random_bytes, hash_2b, recover_user_password,
    truncate_password,
};
use super::Permissions;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use byteorder::{ByteOrder, LittleEndian};

/// Fields of the encryption dictionary that belong to the standard
/// security handler.
///
/// PDF Spec: Table 21 - Additional encryption dictionary entries for the
/// standard security handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdEncryptDict {
    /// Revision (R): 2 through 6
    pub revision: u32,
    /// User access permissions (P), as stored
    pub permissions: i32,
    /// EncryptMetadata flag, true when absent
    pub encrypt_metadata: bool,
    /// Owner password entry (O)
    pub owner_entry: Vec<u8>,
    /// User password entry (U)
    pub user_entry: Vec<u8>,
    /// Owner-wrapped file key (OE, R5/R6)
    pub owner_key: Vec<u8>,
    /// User-wrapped file key (UE, R5/R6)
    pub user_key: Vec<u8>,
    /// Encrypted permissions block (Perms, R6)
    pub perms: Vec<u8>,
}

impl StdEncryptDict {
    /// Create an empty dictionary for a new file.
    pub fn new(revision: u32, permissions: Permissions) -> Self {
        Self {
            revision,
            permissions: permissions.bits() as i32,
            encrypt_metadata: true,
            ..Default::default()
        }
    }

    /// Read and validate the standard handler entries.
    ///
    /// # Errors
    ///
    /// - `R` outside 2..=6 is unsupported
    /// - `O` must be 32 bytes (at least 48 for R5/R6); `U` at least 48 for R5/R6
    /// - `OE` and `UE` must be 32 bytes for R5/R6; `Perms` 16 bytes for R6
    /// - `P` is required
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let revision = dict
            .get("R")
            .and_then(Object::as_integer)
            .ok_or(Error::MissingKey("R"))?;
        if !(2..=6).contains(&revision) {
            return Err(Error::UnsupportedEncryption(format!(
                "standard security handler revision {}",
                revision
            )));
        }
        let revision = revision as u32;
        let modern = revision >= 5;

        let owner_entry = string_entry(dict, "O")?;
        if modern && owner_entry.len() < 48 {
            return Err(Error::Encryption(format!(
                "/O must be at least 48 bytes for R{}, got {}",
                revision,
                owner_entry.len()
            )));
        }
        if !modern && owner_entry.len() != 32 {
            return Err(Error::Encryption(format!(
                "/O must be 32 bytes for R{}, got {}",
                revision,
                owner_entry.len()
            )));
        }

        let user_entry = string_entry(dict, "U")?;
        if modern && user_entry.len() < 48 {
            return Err(Error::Encryption(format!(
                "/U must be at least 48 bytes for R{}, got {}",
                revision,
                user_entry.len()
            )));
        }
        if !modern && user_entry.len() != 32 {
            log::warn!("/U is {} bytes, expected 32", user_entry.len());
        }

        let (owner_key, user_key) = if modern {
            let oe = string_entry(dict, "OE")?;
            let ue = string_entry(dict, "UE")?;
            if oe.len() != 32 || ue.len() != 32 {
                return Err(Error::Encryption(format!(
                    "/OE and /UE must be 32 bytes, got {} and {}",
                    oe.len(),
                    ue.len()
                )));
            }
            (oe, ue)
        } else {
            (Vec::new(), Vec::new())
        };

        let permissions = dict
            .get("P")
            .and_then(Object::as_integer)
            .ok_or(Error::MissingKey("P"))? as i32;

        let perms = if revision == 6 {
            let perms = string_entry(dict, "Perms")?;
            if perms.len() != 16 {
                return Err(Error::Encryption(format!(
                    "/Perms must be 16 bytes, got {}",
                    perms.len()
                )));
            }
            perms
        } else {
            Vec::new()
        };

        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        Ok(Self {
            revision,
            permissions,
            encrypt_metadata,
            owner_entry,
            user_entry,
            owner_key,
            user_key,
            perms,
        })
    }

    /// Write the handler entries into an encryption dictionary.
    pub fn write_to(&self, dict: &mut Dict) {
        dict.insert("R".to_string(), Object::Integer(self.revision as i64));
        dict.insert("P".to_string(), Object::Integer(self.permissions as i64));
        dict.insert("O".to_string(), Object::hex_string(self.owner_entry.clone()));
        dict.insert("U".to_string(), Object::hex_string(self.user_entry.clone()));
        if self.revision >= 5 {
            dict.insert("OE".to_string(), Object::hex_string(self.owner_key.clone()));
            dict.insert("UE".to_string(), Object::hex_string(self.user_key.clone()));
            dict.insert("EncryptMetadata".to_string(), Object::Boolean(self.encrypt_metadata));
        }
        if self.revision > 5 {
            dict.insert("Perms".to_string(), Object::hex_string(self.perms.clone()));
        }
    }

    /// The `/P` value as permission flags.
    pub fn user_permissions(&self) -> Permissions {
        Permissions::from_bits_retain(self.permissions as u32)
    }
}

fn string_entry(dict: &Dict, key: &'static str) -> Result<Vec<u8>> {
    dict.get(key)
        .and_then(Object::as_string)
        .map(<[u8]>::to_vec)
        .ok_or(Error::MissingKey(key))
}

/// Password-based security handler.
pub trait SecurityHandler: std::fmt::Debug + Send + Sync {
    /// Fill in the password entries of `dict` for a new file and return
    /// the file encryption key. `dict.revision` and `dict.permissions` must
    /// already be set.
    fn generate_params(
        &self,
        dict: &mut StdEncryptDict,
        owner: &[u8],
        user: &[u8],
    ) -> Result<Vec<u8>>;

    /// Derive the file key from `password`.
    ///
    /// Returns `None` when the password matches neither the owner nor the
    /// user entry. An owner match grants [`Permissions::OWNER`]; a user
    /// match grants `/P`.
    fn authenticate(
        &self,
        dict: &StdEncryptDict,
        password: &[u8],
    ) -> Result<Option<(Vec<u8>, Permissions)>>;
}

// ============================================================================
// Revisions 2-4
// ============================================================================

/// Security handler for revisions 2, 3 and 4 (Algorithms 2-7).
#[derive(Debug, Clone)]
pub struct StandardHandlerR4 {
    /// First element of the trailer `/ID`
    pub id0: Vec<u8>,
    /// Key length in bits (`/Length` of the encryption dictionary)
    pub length: u32,
}

impl StandardHandlerR4 {
    /// Create a handler for the given file identifier and key length.
    pub fn new(id0: Vec<u8>, length: u32) -> Self {
        Self { id0, length }
    }

    fn key_len(&self, revision: u32) -> usize {
        if revision == 2 {
            5
        } else {
            (self.length as usize / 8).clamp(5, 16)
        }
    }

    fn file_key(&self, dict: &StdEncryptDict, password: &[u8]) -> Vec<u8> {
        compute_file_key(
            password,
            &dict.owner_entry,
            dict.permissions as u32,
            &self.id0,
            dict.revision,
            self.key_len(dict.revision),
            dict.encrypt_metadata,
        )
    }

    /// Algorithm 6: returns the file key when `password` is the user password.
    fn check_user(&self, dict: &StdEncryptDict, password: &[u8]) -> Option<Vec<u8>> {
        let key = self.file_key(dict, password);
        let matched = if dict.revision == 2 {
            constant_time_compare(&compute_user_entry_r2(&key), &dict.user_entry)
        } else {
            dict.user_entry
                .get(..16)
                .is_some_and(|u| constant_time_compare(&compute_user_entry_r3(&key, &self.id0), u))
        };
        matched.then_some(key)
    }

    /// Algorithm 7: recover the user password from `/O`, then check it.
    fn check_owner(&self, dict: &StdEncryptDict, password: &[u8]) -> Option<Vec<u8>> {
        let user = recover_user_password(
            password,
            &dict.owner_entry,
            dict.revision,
            self.key_len(dict.revision),
        );
        self.check_user(dict, &user)
    }
}

impl SecurityHandler for StandardHandlerR4 {
    fn generate_params(
        &self,
        dict: &mut StdEncryptDict,
        owner: &[u8],
        user: &[u8],
    ) -> Result<Vec<u8>> {
        let revision = dict.revision;
        if !(2..=4).contains(&revision) {
            return Err(Error::UnsupportedEncryption(format!(
                "revision {} is not handled by the RC4 security handler",
                revision
            )));
        }

        dict.owner_entry = compute_owner_entry(owner, user, revision, self.key_len(revision));
        let key = self.file_key(dict, user);
        dict.user_entry = if revision == 2 {
            compute_user_entry_r2(&key)
        } else {
            let mut entry = compute_user_entry_r3(&key, &self.id0);
            entry.extend_from_slice(&generate_random_bytes(16));
            entry
        };

        log::debug!("Generated R{} password entries", revision);
        Ok(key)
    }

    fn authenticate(
        &self,
        dict: &StdEncryptDict,
        password: &[u8],
    ) -> Result<Option<(Vec<u8>, Permissions)>> {
        if let Some(key) = self.check_owner(dict, password) {
            log::debug!("Password matches the owner entry");
            return Ok(Some((key, Permissions::OWNER)));
        }
        if let Some(key) = self.check_user(dict, password) {
            log::debug!("Password matches the user entry");
            return Ok(Some((key, dict.user_permissions())));
        }
        Ok(None)
    }
}

// ============================================================================
// Revisions 5-6
// ============================================================================

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Security handler for revisions 5 and 6 (Algorithms 2.A, 2.B, 8-13).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardHandlerR6;

impl StandardHandlerR6 {
    /// Algorithm 13: check the decrypted `/Perms` block against `/P` and
    /// `/EncryptMetadata`.
    fn validate_perms(dict: &StdEncryptDict, file_key: &[u8]) -> Result<()> {
        let block = aes::decrypt_block_256(file_key, &dict.perms)?;
        if &block[9..12] != b"adb" {
            return Err(Error::Encryption("decrypted /Perms lacks the adb marker".to_string()));
        }
        let p = LittleEndian::read_u32(&block[..4]);
        if p != dict.permissions as u32 {
            return Err(Error::Encryption(format!(
                "/Perms permissions {:#x} disagree with /P {:#x}",
                p, dict.permissions as u32
            )));
        }
        let expected = if dict.encrypt_metadata { b'T' } else { b'F' };
        if block[8] != expected {
            return Err(Error::Encryption(
                "/Perms EncryptMetadata flag disagrees with the dictionary".to_string(),
            ));
        }
        Ok(())
    }

    /// Hash entry `(hash, validation salt, key salt)` for one password.
    fn make_entry(
        revision: u32,
        password: &[u8],
        user_key: &[u8],
        file_key: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let validation_salt = generate_random_bytes(8);
        let key_salt = generate_random_bytes(8);

        let input = [password, &validation_salt[..], user_key].concat();
        let hash = hash_2b(revision, &input, password, user_key)?;
        let mut entry = hash[..32].to_vec();
        entry.extend_from_slice(&validation_salt);
        entry.extend_from_slice(&key_salt);

        let input = [password, &key_salt[..], user_key].concat();
        let wrap = hash_2b(revision, &input, password, user_key)?;
        let wrapped = aes::encrypt_cbc_raw(&wrap[..32], &ZERO_IV, file_key)?;
        Ok((entry, wrapped))
    }
}

impl SecurityHandler for StandardHandlerR6 {
    fn generate_params(
        &self,
        dict: &mut StdEncryptDict,
        owner: &[u8],
        user: &[u8],
    ) -> Result<Vec<u8>> {
        let revision = dict.revision;
        if !(5..=6).contains(&revision) {
            return Err(Error::UnsupportedEncryption(format!(
                "revision {} is not handled by the AES-256 security handler",
                revision
            )));
        }
        let file_key = generate_random_bytes(32);
        let user = truncate_password(user);
        let owner = truncate_password(owner);

        // Algorithm 8
        let (u, ue) = Self::make_entry(revision, user, &[], &file_key)?;
        // Algorithm 9
        let (o, oe) = Self::make_entry(revision, owner, &u[..48], &file_key)?;
        dict.user_entry = u;
        dict.user_key = ue;
        dict.owner_entry = o;
        dict.owner_key = oe;

        // Algorithm 10
        if revision == 6 {
            let mut block = [0u8; 16];
            LittleEndian::write_u32(&mut block[..4], dict.permissions as u32);
            block[4..8].copy_from_slice(&[0xFF; 4]);
            block[8] = if dict.encrypt_metadata { b'T' } else { b'F' };
            block[9..12].copy_from_slice(b"adb");
            block[12..].copy_from_slice(&generate_random_bytes(4));
            dict.perms = aes::encrypt_block_256(&file_key, &block)?.to_vec();
        }

        log::debug!("Generated R{} password entries", revision);
        Ok(file_key)
    }

    fn authenticate(
        &self,
        dict: &StdEncryptDict,
        password: &[u8],
    ) -> Result<Option<(Vec<u8>, Permissions)>> {
        let (o, u) = (&dict.owner_entry, &dict.user_entry);
        if o.len() < 48 || u.len() < 48 {
            return Err(Error::Encryption("/O and /U must be at least 48 bytes".to_string()));
        }
        let revision = dict.revision;
        let password = truncate_password(password);
        let u48 = &u[..48];

        let owner_hash = hash_2b(revision, &[password, &o[32..40], u48].concat(), password, u48)?;
        let owner_match = constant_time_compare(&owner_hash[..32], &o[..32]);
        let (intermediate, wrapped, permissions) = if owner_match {
            log::debug!("Password matches the owner entry");
            let key = hash_2b(revision, &[password, &o[40..48], u48].concat(), password, u48)?;
            (key, &dict.owner_key, Permissions::OWNER)
        } else {
            let mut matched = None;
            for candidate in [password, b"".as_slice()] {
                let hash = hash_2b(revision, &[candidate, &u[32..40]].concat(), candidate, &[])?;
                if constant_time_compare(&hash[..32], &u[..32]) {
                    matched = Some(candidate);
                    break;
                }
                if password.is_empty() {
                    break;
                }
            }
            let Some(candidate) = matched else {
                return Ok(None);
            };
            log::debug!("Password matches the user entry");
            let key = hash_2b(revision, &[candidate, &u[40..48]].concat(), candidate, &[])?;
            (key, &dict.user_key, dict.user_permissions())
        };

        if wrapped.len() < 32 {
            return Err(Error::Encryption("wrapped file key is shorter than 32 bytes".to_string()));
        }
        let file_key = aes::decrypt_cbc_raw(&intermediate[..32], &ZERO_IV, &wrapped[..32])?;

        if revision == 6 {
            Self::validate_perms(dict, &file_key)?;
        }
        Ok(Some((file_key, permissions)))
    }
}

/// Pick the handler for a revision.
pub fn handler_for(revision: u32, id0: &[u8], length: u32) -> Result<Box<dyn SecurityHandler>> {
    match revision {
        2..=4 => Ok(Box::new(StandardHandlerR4::new(id0.to_vec(), length))),
        5 | 6 => Ok(Box::new(StandardHandlerR6)),
        r => Err(Error::UnsupportedEncryption(format!(
            "standard security handler revision {}",
            r
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms() -> Permissions {
        Permissions::PRINT | Permissions::from_bits_retain(0xFFFF_F0C0)
    }

    fn generate(
        revision: u32,
        owner: &[u8],
        user: &[u8],
    ) -> (Box<dyn SecurityHandler>, StdEncryptDict, Vec<u8>) {
        let length = if revision == 2 { 40 } else { 128 };
        let handler = handler_for(revision, b"0123456789abcdef", length).unwrap();
        let mut dict = StdEncryptDict::new(revision, perms());
        let key = handler.generate_params(&mut dict, owner, user).unwrap();
        (handler, dict, key)
    }

    // ========================================================================
    // Dictionary
    // ========================================================================

    #[test]
    fn test_dict_round_trip() {
        let (_, std, _) = generate(6, b"owner", b"user");
        let mut dict = Dict::new();
        std.write_to(&mut dict);
        assert_eq!(StdEncryptDict::from_dict(&dict).unwrap(), std);
    }

    #[test]
    fn test_dict_validation() {
        let (_, std, _) = generate(3, b"owner", b"user");
        let mut dict = Dict::new();
        std.write_to(&mut dict);

        let mut bad = dict.clone();
        bad.insert("R".to_string(), Object::Integer(7));
        assert!(matches!(StdEncryptDict::from_dict(&bad), Err(Error::UnsupportedEncryption(_))));

        let mut bad = dict.clone();
        bad.insert("O".to_string(), Object::string(vec![0u8; 31]));
        assert!(matches!(StdEncryptDict::from_dict(&bad), Err(Error::Encryption(_))));

        let mut bad = dict.clone();
        bad.shift_remove("P");
        assert!(matches!(StdEncryptDict::from_dict(&bad), Err(Error::MissingKey("P"))));

        let parsed = StdEncryptDict::from_dict(&dict).unwrap();
        assert!(parsed.encrypt_metadata);
    }

    #[test]
    fn test_dict_r6_requires_perms() {
        let (_, std, _) = generate(6, b"o", b"u");
        let mut dict = Dict::new();
        std.write_to(&mut dict);
        dict.insert("Perms".to_string(), Object::string(vec![0u8; 15]));
        assert!(StdEncryptDict::from_dict(&dict).is_err());
        dict.shift_remove("Perms");
        assert!(matches!(StdEncryptDict::from_dict(&dict), Err(Error::MissingKey("Perms"))));
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    #[test]
    fn test_owner_and_user_passwords_all_revisions() {
        for revision in 2..=6 {
            let (handler, dict, key) = generate(revision, b"owner", b"user");

            let (k, p) = handler.authenticate(&dict, b"owner").unwrap().unwrap();
            assert_eq!(k, key, "R{} owner key", revision);
            assert_eq!(p, Permissions::OWNER);

            let (k, p) = handler.authenticate(&dict, b"user").unwrap().unwrap();
            assert_eq!(k, key, "R{} user key", revision);
            assert!(p.contains(Permissions::PRINT));
            assert!(!p.contains(Permissions::MODIFY));

            assert!(handler.authenticate(&dict, b"wrong").unwrap().is_none());
        }
    }

    #[test]
    fn test_empty_user_password() {
        for revision in [3, 6] {
            let (handler, dict, key) = generate(revision, b"secret", b"");
            let (k, p) = handler.authenticate(&dict, b"").unwrap().unwrap();
            assert_eq!(k, key);
            assert_ne!(p, Permissions::OWNER);
        }
    }

    #[test]
    fn test_r6_falls_back_to_empty_user_password() {
        let (handler, dict, key) = generate(6, b"secret", b"");
        let (k, _) = handler.authenticate(&dict, b"not-the-owner").unwrap().unwrap();
        assert_eq!(k, key);
    }

    #[test]
    fn test_r6_long_passwords_are_truncated() {
        let long = vec![b'p'; 200];
        let (handler, dict, key) = generate(6, &long, b"u");
        let (k, p) = handler.authenticate(&dict, &long[..127]).unwrap().unwrap();
        assert_eq!(k, key);
        assert_eq!(p, Permissions::OWNER);
    }

    #[test]
    fn test_r6_tampered_perms() {
        let (handler, mut dict, _) = generate(6, b"owner", b"user");
        dict.permissions = -1;
        assert!(matches!(handler.authenticate(&dict, b"user"), Err(Error::Encryption(_))));
    }

    #[test]
    fn test_r2_key_is_40_bits() {
        let (_, dict, key) = generate(2, b"o", b"u");
        assert_eq!(key.len(), 5);
        assert_eq!(dict.user_entry.len(), 32);
    }

    // ========================================================================
    // Known answers
    // ========================================================================
    //
    // Entries produced by a separate implementation of ISO 32000-2 7.6.4
    // for owner "owner", user "user", /P -3900 and the /ID below. The R5
    // and R6 salts are ASCII ("uvsalt01", "ukslt001", ...) and the file key
    // is A0..BF.

    const FILE_ID: &str = "5D41402ABC4B2A76B9719D911017C592";

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn known_dict(
        revision: i64,
        entries: &[(&str, &str)],
        encrypt_metadata: bool,
    ) -> StdEncryptDict {
        let mut dict = Dict::new();
        dict.insert("R".to_string(), Object::Integer(revision));
        dict.insert("P".to_string(), Object::Integer(-3900));
        dict.insert("EncryptMetadata".to_string(), Object::Boolean(encrypt_metadata));
        for (key, value) in entries {
            dict.insert(key.to_string(), Object::hex_string(hex(value)));
        }
        StdEncryptDict::from_dict(&dict).unwrap()
    }

    fn assert_known_key(revision: u32, length: u32, dict: &StdEncryptDict, key: &str) {
        let handler = handler_for(revision, &hex(FILE_ID), length).unwrap();

        let (k, p) = handler.authenticate(dict, b"user").unwrap().unwrap();
        assert_eq!(k, hex(key), "R{} user", revision);
        assert_eq!(p.bits(), 0xFFFF_F0C4);

        let (k, p) = handler.authenticate(dict, b"owner").unwrap().unwrap();
        assert_eq!(k, hex(key), "R{} owner", revision);
        assert_eq!(p, Permissions::OWNER);

        assert!(handler.authenticate(dict, b"Owner").unwrap().is_none());
    }

    #[test]
    fn test_known_answer_r2() {
        let dict = known_dict(
            2,
            &[
                ("O", "94E8094419662A774442FB072E3D9F19E9D130EC09A4D0061E78FE920F7AB62F"),
                ("U", "F50FE234439711DE779643514FEA34B819B4C63DE800FF87F7C75FDDAD648B1C"),
            ],
            true,
        );
        assert_known_key(2, 40, &dict, "9D6CA7BFB0");
    }

    #[test]
    fn test_known_answer_r3() {
        let dict = known_dict(
            3,
            &[
                ("O", "0BA3835F88F90388E74E54584125CE142BE0DE24C6B0D37746E075B891756671"),
                ("U", "BF26782FEB1A5C77C5EDE542D6B7CB3A000102030405060708090A0B0C0D0E0F"),
            ],
            true,
        );
        assert_known_key(3, 128, &dict, "89A30FD7026E0F83844230A165D55E76");
    }

    #[test]
    fn test_known_answer_r4_unencrypted_metadata() {
        let dict = known_dict(
            4,
            &[
                ("O", "0BA3835F88F90388E74E54584125CE142BE0DE24C6B0D37746E075B891756671"),
                ("U", "2C6957B3033CEAB3EC023A22C2254CDF000102030405060708090A0B0C0D0E0F"),
            ],
            false,
        );
        assert!(!dict.encrypt_metadata);
        assert_known_key(4, 128, &dict, "4822D2B10D69FFF775144971BC2CC849");
    }

    #[test]
    fn test_known_answer_r5() {
        let dict = known_dict(
            5,
            &[
                (
                    "O",
                    "8D639908ABB7C53D08A61478BA14979415117871094F4E0C00D8C1661FF71F36\
                     6F7673616C7430316F6B736C74303031",
                ),
                (
                    "U",
                    "2DC98293C04AD10692ECB1811CDD451294EA02571CCC56C66A1CC1DDE93F91AB\
                     757673616C743031756B736C74303031",
                ),
                ("OE", "B35B724C1463C4A1A0539861CF7A2AC846E7C8F26883870E7DECC95CC1D22941"),
                ("UE", "B252CCC431A5A8B297260ABB8070CE6E5A6CC0BFE443EFDA7DCC6A928AB791AD"),
            ],
            true,
        );
        assert_known_key(
            5,
            256,
            &dict,
            "A0A1A2A3A4A5A6A7A8A9AAABACADAEAFB0B1B2B3B4B5B6B7B8B9BABBBCBDBEBF",
        );
    }

    #[test]
    fn test_known_answer_r6() {
        let entries = [
            (
                "O",
                "F748045CF566C2D5141629B8D986FABE2EA244F222AC057CF6DA8EF3377EE61D\
                 6F7673616C7430316F6B736C74303031",
            ),
            (
                "U",
                "647EEA44CA0648AAEA2BD4BD30BE64C4CFA85B768D03B1522CB09499A54E5B41\
                 757673616C743031756B736C74303031",
            ),
            ("OE", "BA162294F8687135D94D1A559B9D4B896986A253BF981FE0F7D54C115ED50ABD"),
            ("UE", "B8B1E9AFE0A7716FAED949D015960A8A713DCBB96A01963161DF78746F39E17B"),
            ("Perms", "468646E78247C644F36C006591EEDDA4"),
        ];
        let dict = known_dict(6, &entries, true);
        assert_known_key(
            6,
            256,
            &dict,
            "A0A1A2A3A4A5A6A7A8A9AAABACADAEAFB0B1B2B3B4B5B6B7B8B9BABBBCBDBEBF",
        );

        // /Perms records EncryptMetadata true
        let dict = known_dict(6, &entries, false);
        let handler = handler_for(6, &hex(FILE_ID), 256).unwrap();
        assert!(matches!(handler.authenticate(&dict, b"user"), Err(Error::Encryption(_))));
    }

    #[test]
    fn test_handler_for_unknown_revision() {
        assert!(handler_for(7, b"", 128).is_err());
        let mut dict = StdEncryptDict::new(6, perms());
        assert!(StandardHandlerR4::new(Vec::new(), 128)
            .generate_params(&mut dict, b"", b"")
            .is_err());
    }
}
