//! CCcam session obfuscation: the hello scramble applied before key
//! derivation and the RC4-flavoured stream cipher used for both directions
//! of a session.

/// ASCII protocol tag mixed into the hello and expected back in the ack.
pub const PROTOCOL_TAG: &[u8] = b"CCcam";

/// In-place scramble of the server's 16-byte hello before it is hashed.
///
/// The second half of the buffer is overwritten with bytes derived from the
/// first half, then the first five bytes are XORed with the protocol tag.
/// Each derived byte reads `buf[i]` before the tag XOR touches it.
pub fn scramble_hello(buf: &mut [u8; 16]) {
    for i in 0..8 {
        buf[8 + i] = (i as u8).wrapping_mul(buf[i]);
        if i < PROTOCOL_TAG.len() {
            buf[i] ^= PROTOCOL_TAG[i];
        }
    }
}

/// The keyed byte-stream transform of the CCcam handshake.
///
/// The key schedule is plain RC4, but the per-byte mix is not: every output
/// byte is additionally XORed with a feedback byte seeded from `key[0]`, and
/// the feedback advances with the plaintext byte. Encrypt and decrypt
/// therefore differ only in which side of the XOR is the plaintext:
/// `encrypt` folds its input byte into the feedback, `decrypt` folds its
/// output byte. A generic RC4 stream is not a drop-in replacement.
pub struct StreamCipher {
    table: [u8; 256],
    counter: u8,
    sum: u8,
    feedback: u8,
}

impl StreamCipher {
    pub fn new(key: &[u8]) -> Self {
        assert!(!key.is_empty(), "cipher key must be non-empty");
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256usize {
            j = j.wrapping_add(key[i % key.len()]).wrapping_add(table[i]);
            table.swap(i, j as usize);
        }
        StreamCipher {
            table,
            counter: 0,
            sum: 0,
            feedback: key[0],
        }
    }

    /// Transforms outbound plaintext in place. The feedback byte advances
    /// with the input (plaintext) byte.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        for b in data {
            let plain = *b;
            *b = plain ^ self.keystream_byte() ^ self.feedback;
            self.feedback ^= plain;
        }
    }

    /// Transforms inbound ciphertext in place. The feedback byte advances
    /// with the output (plaintext) byte.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for b in data {
            *b = *b ^ self.keystream_byte() ^ self.feedback;
            self.feedback ^= *b;
        }
    }

    // State evolution is identical for both directions; only the feedback
    // update differs. Table entries stay 8-bit, so every wrapping_add is the
    // mod-256 form the wire format expects.
    fn keystream_byte(&mut self) -> u8 {
        self.counter = self.counter.wrapping_add(1);
        self.sum = self.sum.wrapping_add(self.table[self.counter as usize]);
        self.table.swap(self.counter as usize, self.sum as usize);
        let idx = self.table[self.counter as usize].wrapping_add(self.table[self.sum as usize]);
        self.table[idx as usize]
    }
}
