//! PDF encryption support.
//!
//! This module implements PDF encryption/decryption according to the PDF specification
//! (ISO 32000-1:2008, Section 7.6, and ISO 32000-2:2020 for revision 6). It supports:
//!
//! - The standard security handler, revisions 2 through 6
//! - RC4 (40 to 128-bit), AES-128 and AES-256 crypt filters, plus Identity
//! - Password validation as owner or user, with the matching permissions
//!
//! # Encryption Algorithms
//!
//! ## RC4 (PDF 1.4-1.5)
//! - `/V 1`, `/R 2`: 40-bit key
//! - `/V 2`, `/R 3`: up to 128-bit key
//!
//! ## AES (PDF 1.6+)
//! - `/V 4`, `/R 4`: crypt filters, `AESV2` (or `V2`)
//! - `/V 5`, `/R 5` and `/R 6`: `AESV3` with SHA-2 password hashing
//!
//! # Security Considerations
//!
//! - RC4 and revisions below 6 are weak and only worth reading, not writing
//! - Password checks use constant-time comparison
//!
//! # References
//!
//! - PDF Spec Section 7.6.2: General Encryption Algorithm
//! - PDF Spec Section 7.6.3: Standard Security Handler
//! - PDF Spec Section 7.6.5: Crypt Filters

mod aes;
mod algorithms;
mod crypt;
mod filters;
mod handler;
mod rc4;

pub use crypt::{Crypter, EncryptionInfo, IDENTITY, STD_CF};
pub use filters::{AuthEvent, CryptFilter, FilterDict};
pub use handler::{SecurityHandler, StandardHandlerR4, StandardHandlerR6, StdEncryptDict};

use bitflags::bitflags;

bitflags! {
    /// User access permissions (`/P`).
    ///
    /// Per PDF spec Table 22 (User access permissions). Bits not named here
    /// are reserved and kept as read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// Bit 3: Print the document
        const PRINT = 1 << 2;
        /// Bit 4: Modify contents by operations other than those below
        const MODIFY = 1 << 3;
        /// Bit 5: Copy or extract text and graphics
        const EXTRACT_GRAPHICS = 1 << 4;
        /// Bit 6: Add or modify annotations, fill forms
        const ANNOTATE = 1 << 5;
        /// Bit 9: Fill in existing form fields (R3+)
        const FILL_FORMS = 1 << 8;
        /// Bit 10: Extract text and graphics for accessibility (R3+)
        const DISABILITY_EXTRACT = 1 << 9;
        /// Bit 11: Assemble: insert, rotate or delete pages (R3+)
        const ROTATE_INSERT = 1 << 10;
        /// Bit 12: Print at full quality (R3+)
        const FULL_PRINT_QUALITY = 1 << 11;

        /// Everything; granted by the owner password
        const OWNER = 0xFFFF_FFFF;
    }
}

impl Permissions {
    /// True when every flag in `p` is granted.
    pub fn allowed(&self, p: Permissions) -> bool {
        self.contains(p)
    }

    /// Check if printing is allowed.
    pub fn can_print(&self) -> bool {
        self.contains(Permissions::PRINT)
    }

    /// Check if modifying the document is allowed.
    pub fn can_modify(&self) -> bool {
        self.contains(Permissions::MODIFY)
    }

    /// Check if copying text/graphics is allowed.
    pub fn can_copy(&self) -> bool {
        self.contains(Permissions::EXTRACT_GRAPHICS)
    }

    /// Check if adding/modifying annotations is allowed.
    pub fn can_annotate(&self) -> bool {
        self.contains(Permissions::ANNOTATE)
    }
}
