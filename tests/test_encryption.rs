//! Integration tests for encrypted documents.
//!
//! Each file is encrypted with [`Crypter::new_encryption`], written with
//! `common::PdfBuilder` and read back through a [`Session`].

mod common;

use common::{dict, indirect, init_logging, reference, stream, PdfBuilder};
use pdf_core::encryption::Crypter;
use pdf_core::{Object, ObjectRef, Permissions, Session};
use std::io::Cursor;

const OWNER: &[u8] = b"owner-secret";
const USER: &[u8] = b"user-secret";

/// Every cipher and revision that can be authored.
const CIPHERS: [(&str, u32); 6] = [
    ("V2", 2),
    ("V2", 3),
    ("V2", 4),
    ("AESV2", 4),
    ("AESV3", 5),
    ("AESV3", 6),
];

fn granted() -> Permissions {
    Permissions::PRINT | Permissions::EXTRACT_GRAPHICS
}

fn plain_objects() -> Vec<Object> {
    vec![
        indirect(
            1,
            0,
            Object::Dictionary(dict(&[
                ("Type", Object::name("Catalog")),
                ("Pages", reference(2)),
            ])),
        ),
        indirect(
            2,
            0,
            Object::Dictionary(dict(&[
                ("Type", Object::name("Pages")),
                ("Kids", Object::Array(vec![])),
                ("Count", Object::Integer(0)),
            ])),
        ),
        indirect(
            3,
            0,
            Object::Dictionary(dict(&[
                ("Title", Object::string(&b"Quarterly report"[..])),
                ("Keywords", Object::Array(vec![Object::hex_string(vec![1, 2, 3])])),
            ])),
        ),
        indirect(
            4,
            0,
            stream(
                &[("Subtype", Object::name("XML"))],
                b"<x:xmpmeta>metadata long enough for a few AES blocks</x:xmpmeta>",
            ),
        ),
        indirect(5, 0, Object::string(&b"a lone string"[..])),
    ]
}

/// Encrypt the sample objects and assemble a file around them.
fn encrypted_file(cfm: &str, revision: u32, owner: &[u8], user: &[u8], compact: bool) -> Vec<u8> {
    let (mut crypter, info) =
        Crypter::new_encryption(cfm, Some(revision), owner, user, granted()).unwrap();

    let version = format!("{}.{}", info.version.0, info.version.1);
    let mut builder = PdfBuilder::new(&version);
    for mut object in plain_objects() {
        let id = match &object {
            Object::Indirect { id, .. } => *id,
            _ => unreachable!(),
        };
        crypter.encrypt(&mut object, id).unwrap();
        builder.object(&object);
    }
    builder.object(&indirect(6, 0, Object::Dictionary(info.encrypt.clone())));

    let trailer = dict(&[
        ("Size", Object::Integer(8)),
        ("Root", reference(1)),
        ("Encrypt", reference(6)),
        (
            "ID",
            Object::Array(vec![
                Object::hex_string(info.id0.clone()),
                Object::hex_string(info.id1.clone()),
            ]),
        ),
    ]);
    let at = if compact {
        builder.stream_section(7, &trailer)
    } else {
        builder.table_section(&trailer)
    };
    builder.startxref(at);
    builder.into_bytes()
}

fn open(bytes: Vec<u8>) -> Session<Cursor<Vec<u8>>> {
    init_logging();
    Session::open(Cursor::new(bytes)).expect("encrypted document should open")
}

fn assert_plaintext(session: &mut Session<Cursor<Vec<u8>>>, label: &str) {
    for original in plain_objects() {
        let Object::Indirect { id, .. } = &original else {
            unreachable!()
        };
        let loaded = session.lookup_by_number(id.id).unwrap();
        assert_eq!(loaded, original, "{}: object {}", label, id);
    }
}

// ============================================================================
// Round trips per cipher
// ============================================================================

#[test]
fn test_user_password_decrypts_with_user_permissions() {
    for (cfm, revision) in CIPHERS {
        let label = format!("{} R{}", cfm, revision);
        let mut session = open(encrypted_file(cfm, revision, OWNER, USER, false));

        assert!(session.is_encrypted().unwrap(), "{}", label);
        assert!(!session.crypter().unwrap().is_authenticated(), "{}", label);
        assert!(session.authenticate(USER).unwrap(), "{}", label);

        let permissions = session.permissions();
        assert_ne!(permissions, Permissions::OWNER, "{}", label);
        assert!(permissions.allowed(granted()), "{}", label);
        assert!(!permissions.can_modify(), "{}", label);
        assert_plaintext(&mut session, &label);
    }
}

#[test]
fn test_owner_password_grants_everything() {
    for (cfm, revision) in CIPHERS {
        let label = format!("{} R{}", cfm, revision);
        let mut session = open(encrypted_file(cfm, revision, OWNER, USER, false));

        assert!(session.authenticate(OWNER).unwrap(), "{}", label);
        assert_eq!(session.permissions(), Permissions::OWNER, "{}", label);
        assert_plaintext(&mut session, &label);
    }
}

#[test]
fn test_wrong_password_is_rejected() {
    for (cfm, revision) in CIPHERS {
        let label = format!("{} R{}", cfm, revision);
        let mut session = open(encrypted_file(cfm, revision, OWNER, USER, false));

        assert!(!session.authenticate(b"guess").unwrap(), "{}", label);
        assert!(!session.crypter().unwrap().is_authenticated(), "{}", label);
        assert_eq!(
            session.check_access(b"guess").unwrap(),
            (false, Permissions::empty()),
            "{}",
            label
        );
    }
}

#[test]
fn test_empty_user_password_opens_automatically() {
    for (cfm, revision) in CIPHERS {
        let label = format!("{} R{}", cfm, revision);
        let mut session = open(encrypted_file(cfm, revision, OWNER, b"", false));

        assert!(session.is_encrypted().unwrap(), "{}", label);
        assert!(session.crypter().unwrap().is_authenticated(), "{}", label);
        assert!(session.permissions().allowed(granted()), "{}", label);
        assert_plaintext(&mut session, &label);
    }
}

#[test]
fn test_encrypted_file_with_xref_stream() {
    for (cfm, revision) in [("AESV2", 4), ("AESV3", 6)] {
        let label = format!("{} R{}", cfm, revision);
        let mut session = open(encrypted_file(cfm, revision, OWNER, USER, true));

        assert!(session.authenticate(USER).unwrap(), "{}", label);
        assert_plaintext(&mut session, &label);
    }
}

// ============================================================================
// Session behavior
// ============================================================================

#[test]
fn test_header_version_matches_cipher() {
    let mut session = open(encrypted_file("AESV3", 6, OWNER, USER, false));
    assert_eq!(session.version(), (2, 0));
    let crypter = session.crypter().unwrap();
    assert_eq!((crypter.version(), crypter.revision(), crypter.length()), (5, 6, 256));
    assert!(session.is_encrypted().unwrap());

    let session = open(encrypted_file("V2", 2, OWNER, USER, false));
    assert_eq!(session.version(), (1, 3));
    assert_eq!(session.crypter().unwrap().length(), 40);
}

#[test]
fn test_check_access_leaves_session_unchanged() {
    let mut session = open(encrypted_file("AESV3", 6, b"owner123", b"user456", false));

    assert_eq!(session.check_access(b"user123").unwrap(), (false, Permissions::empty()));
    assert_eq!(session.check_access(b"owner123").unwrap(), (true, Permissions::OWNER));
    let (ok, permissions) = session.check_access(b"user456").unwrap();
    assert!(ok);
    assert!(permissions.allowed(granted()));
    assert!(!session.crypter().unwrap().is_authenticated());

    assert!(!session.authenticate(b"user123").unwrap());
    assert!(session.authenticate(b"owner123").unwrap());
    assert_eq!(session.permissions(), Permissions::OWNER);
}

#[test]
fn test_encrypt_dictionary_is_not_decrypted() {
    let mut session = open(encrypted_file("AESV2", 4, OWNER, USER, false));
    assert!(session.authenticate(OWNER).unwrap());

    let encrypt = session.resolve(&reference(6)).unwrap();
    let encrypt = encrypt.as_dict().unwrap();
    assert_eq!(encrypt.get("Filter"), Some(&Object::name("Standard")));
    assert_eq!(encrypt.get("StmF"), Some(&Object::name("StdCF")));
    // O and U are 32 bytes for revision 4
    assert_eq!(encrypt.get("O").and_then(Object::as_string).map(<[u8]>::len), Some(32));
    assert_eq!(encrypt.get("U").and_then(Object::as_string).map(<[u8]>::len), Some(32));
}

#[test]
fn test_objects_are_read_raw_before_authentication() {
    let mut session = open(encrypted_file("V2", 3, OWNER, USER, false));
    let raw = session.lookup_by_number(5).unwrap();
    assert_ne!(raw, indirect(5, 0, Object::string(&b"a lone string"[..])));

    // Not cached while unauthenticated
    assert!(session.authenticate(USER).unwrap());
    assert_eq!(
        session.lookup_by_number(5).unwrap(),
        indirect(5, 0, Object::string(&b"a lone string"[..]))
    );
    assert_eq!(
        session.resolve(&Object::Reference(ObjectRef::new(5, 0))).unwrap(),
        Object::string(&b"a lone string"[..])
    );
}

/// Point the xref entry of object 5 at an object that claims to be 9.
fn mislabel_lone_string(mut bytes: Vec<u8>) -> Vec<u8> {
    let at = bytes
        .windows(8)
        .position(|w| w == b"\n5 0 obj")
        .expect("object 5 header");
    bytes[at + 1] = b'9';
    bytes
}

#[test]
fn test_repair_does_not_leak_ciphertext() {
    for (cfm, revision) in CIPHERS {
        let label = format!("{} R{}", cfm, revision);
        let bytes = mislabel_lone_string(encrypted_file(cfm, revision, OWNER, b"", false));
        let mut session = open(bytes);
        assert!(session.crypter().unwrap().is_authenticated(), "{}", label);

        let title = plain_objects()[2].clone();
        assert_eq!(session.lookup_by_number(3).unwrap(), title, "{}", label);

        // Re-keys the table and drops every cached object
        assert_eq!(session.lookup_by_number(5).unwrap(), Object::Null, "{}", label);

        assert_eq!(session.lookup_by_number(3).unwrap(), title, "{}", label);
        assert_eq!(session.lookup_by_number(4).unwrap(), plain_objects()[3], "{}", label);
    }
}
