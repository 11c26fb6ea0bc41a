//! Helpers that assemble PDF files in memory.

#![allow(dead_code)]

use pdf_core::decoders::CodecRegistry;
use pdf_core::{Dict, Object, ObjectRef};
use std::collections::BTreeMap;

/// Where an object added to the builder lives.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Offset(usize, u16),
    Compressed(u32, u32),
}

/// Writes objects and cross-reference sections, tracking offsets.
///
/// Objects added since the last section are listed by the next one, so an
/// incremental update is: more objects, another section with `/Prev`, and
/// another `startxref`.
pub struct PdfBuilder {
    out: Vec<u8>,
    pending: BTreeMap<u32, Slot>,
    first_section: bool,
}

impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        let mut out = format!("%PDF-{}\n", version).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            pending: BTreeMap::new(),
            first_section: true,
        }
    }

    /// Current write position.
    pub fn position(&self) -> usize {
        self.out.len()
    }

    /// Append bytes verbatim.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.out.extend_from_slice(data);
        self
    }

    /// Append `N G obj <body> endobj`.
    pub fn raw(&mut self, number: u32, generation: u16, body: &[u8]) -> &mut Self {
        self.pending.insert(number, Slot::Offset(self.out.len(), generation));
        self.out
            .extend_from_slice(format!("{} {} obj\n", number, generation).as_bytes());
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
        self
    }

    /// Append an [`Object::Indirect`].
    pub fn object(&mut self, object: &Object) -> &mut Self {
        let Object::Indirect { id, .. } = object else {
            panic!("expected an indirect object, got {:?}", object);
        };
        self.pending.insert(id.id, Slot::Offset(self.out.len(), id.gen));
        self.out.extend_from_slice(&object.to_pdf_bytes());
        self
    }

    /// Pack `members` into a Flate-compressed object stream `container`.
    pub fn object_stream(&mut self, container: u32, members: &[(u32, Object)]) -> &mut Self {
        let mut header = String::new();
        let mut body = Vec::new();
        for (index, (number, object)) in members.iter().enumerate() {
            header.push_str(&format!("{} {} ", number, body.len()));
            object.write(&mut body);
            body.push(b'\n');
            self.pending.insert(*number, Slot::Compressed(container, index as u32));
        }
        let mut data = header.into_bytes();
        let first = data.len();
        data.extend_from_slice(&body);

        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(members.len() as i64));
        dict.insert("First".to_string(), Object::Integer(first as i64));
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        let encoded = CodecRegistry::with_defaults()
            .encode_stream(&dict, &data)
            .unwrap();
        self.object(&indirect(
            container,
            0,
            Object::Stream {
                dict,
                data: encoded.into(),
            },
        ))
    }

    /// Write a classic table for the pending uncompressed objects. Returns
    /// the section offset.
    pub fn table_section(&mut self, trailer: &Dict) -> usize {
        let at = self.out.len();
        self.out.extend_from_slice(b"xref\n");
        if self.first_section {
            self.out.extend_from_slice(b"0 1\n0000000000 65535 f\r\n");
        }
        for (number, slot) in std::mem::take(&mut self.pending) {
            if let Slot::Offset(offset, generation) = slot {
                self.out.extend_from_slice(
                    format!("{} 1\n{:010} {:05} n\r\n", number, offset, generation).as_bytes(),
                );
            }
        }
        self.out.extend_from_slice(b"trailer\n");
        Object::Dictionary(trailer.clone()).write(&mut self.out);
        self.out.push(b'\n');
        self.first_section = false;
        at
    }

    /// Write xref stream `number` for every pending object (and itself).
    /// `trailer` entries are copied into the stream dictionary.
    pub fn stream_section(&mut self, number: u32, trailer: &Dict) -> usize {
        let at = self.out.len();
        let mut slots = std::mem::take(&mut self.pending);
        slots.insert(number, Slot::Offset(at, 0));
        self.write_xref_stream(number, trailer, slots)
    }

    /// Write xref stream `number` listing only the pending compressed
    /// objects, for a hybrid file's `/XRefStm`.
    pub fn hybrid_stream(&mut self, number: u32) -> usize {
        let compressed: BTreeMap<u32, Slot> = self
            .pending
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Compressed(..)))
            .map(|(n, slot)| (*n, *slot))
            .collect();
        self.pending.retain(|_, slot| matches!(slot, Slot::Offset(..)));
        let first_section = self.first_section;
        let at = self.write_xref_stream(number, &Dict::new(), compressed);
        self.first_section = first_section;
        at
    }

    fn write_xref_stream(
        &mut self,
        number: u32,
        trailer: &Dict,
        slots: BTreeMap<u32, Slot>,
    ) -> usize {
        let at = self.out.len();
        let mut index = Vec::new();
        let mut data = Vec::new();
        if self.first_section {
            index.extend([Object::Integer(0), Object::Integer(1)]);
            data.extend_from_slice(&[0, 0, 0, 0, 0, 0xFF, 0xFF]);
        }
        for (num, slot) in &slots {
            index.extend([Object::Integer(*num as i64), Object::Integer(1)]);
            match *slot {
                Slot::Offset(offset, generation) => {
                    data.push(1);
                    data.extend_from_slice(&(offset as u32).to_be_bytes());
                    data.extend_from_slice(&generation.to_be_bytes());
                },
                Slot::Compressed(container, idx) => {
                    data.push(2);
                    data.extend_from_slice(&container.to_be_bytes());
                    data.extend_from_slice(&(idx as u16).to_be_bytes());
                },
            }
        }

        let size = slots.keys().max().map_or(1, |n| n + 1) as i64;
        let declared = trailer.get("Size").and_then(Object::as_integer).unwrap_or(0);
        let mut dict = trailer.clone();
        dict.insert("Type".to_string(), Object::name("XRef"));
        dict.insert("Size".to_string(), Object::Integer(size.max(declared)));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(4), Object::Integer(2)]),
        );
        dict.insert("Index".to_string(), Object::Array(index));
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        let encoded = CodecRegistry::with_defaults()
            .encode_stream(&dict, &data)
            .unwrap();

        self.out.extend_from_slice(
            &indirect(
                number,
                0,
                Object::Stream {
                    dict,
                    data: encoded.into(),
                },
            )
            .to_pdf_bytes(),
        );
        self.first_section = false;
        at
    }

    /// Append `startxref` and `%%EOF`.
    pub fn startxref(&mut self, offset: usize) -> &mut Self {
        self.out
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", offset).as_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

/// Build a dictionary from `(key, value)` pairs.
pub fn dict(entries: &[(&str, Object)]) -> Dict {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn reference(number: u32) -> Object {
    Object::Reference(ObjectRef::new(number, 0))
}

pub fn indirect(number: u32, generation: u16, object: Object) -> Object {
    Object::Indirect {
        id: ObjectRef::new(number, generation),
        object: Box::new(object),
    }
}

/// A stream whose dictionary already carries the matching `/Length`.
pub fn stream(entries: &[(&str, Object)], data: &[u8]) -> Object {
    let mut dict = dict(entries);
    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
    Object::Stream {
        dict,
        data: data.to_vec().into(),
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
