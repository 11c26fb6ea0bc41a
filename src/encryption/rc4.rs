//! RC4 encryption/decryption for PDF.
//!
//! RC4 is a stream cipher used by the `V2` crypt filter and by the legacy
//! password algorithms (R2-R4). While cryptographically weak by modern
//! standards, it's still widely used in legacy PDFs.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

/// RC4 keystream state.
struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Key scheduling. `key` must not be empty.
    fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, val) in s.iter_mut().enumerate() {
            *val = i as u8;
        }

        let mut j = 0u8;
        for (i, &k) in (0..256).zip(key.iter().cycle()) {
            j = j.wrapping_add(s[i]).wrapping_add(k);
            s.swap(i, j as usize);
        }

        Self { s, i: 0, j: 0 }
    }

    fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *byte ^= self.s[k as usize];
        }
    }
}

/// Encrypt or decrypt `data` with RC4 under `key`.
///
/// RC4 is symmetric, so encryption and decryption are the same operation.
/// An empty key leaves the data unchanged.
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if key.is_empty() {
        log::debug!("RC4 called with an empty key");
        return out;
    }
    Rc4::new(key).apply(&mut out);
    out
}

/// The legacy "20-pass" chain: RC4 with `key`, then once more with each
/// of `key ^ 1` .. `key ^ 19`.
pub(crate) fn rc4_chain(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for i in 0u8..20 {
        let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        out = rc4_crypt(&round_key, &out);
    }
    out
}

/// Inverse of [`rc4_chain`]: the same passes in reverse order.
pub(crate) fn rc4_chain_inverse(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for i in (0u8..20).rev() {
        let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        out = rc4_crypt(&round_key, &out);
    }
    out
}
