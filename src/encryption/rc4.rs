//! RC4 (ARCFOUR) stream cipher.
//!
//! Used by the standard security handler for V=1/V=2 documents. The cipher
//! keeps its keystream position between [`Rc4::update`] calls, so a body can be
//! fed in arbitrary chunks and produce the same output as a one-shot call.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

/// RC4 keystream state.
#[derive(Clone)]
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Initialize the cipher with a key (PDF uses 5 to 16 bytes).
    ///
    /// An empty key is treated as a single zero byte.
    pub fn new(key: &[u8]) -> Self {
        let key: &[u8] = if key.is_empty() { &[0] } else { key };

        let mut s = [0u8; 256];
        for (i, val) in s.iter_mut().enumerate() {
            *val = i as u8;
        }

        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }

        Self { s, i: 0, j: 0 }
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);
        self.s.swap(self.i as usize, self.j as usize);
        let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
        self.s[k as usize]
    }

    /// XOR the keystream into `data` in place.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }

    /// XOR the keystream with `data`, returning the result.
    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply_keystream(&mut out);
        out
    }
}

impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rc4 { .. }")
    }
}

/// Encrypt or decrypt `data` with a fresh keystream.
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).update(data)
}
