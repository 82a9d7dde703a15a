use anyhow::Result;

/// Running-keystream XOR cipher, keyed by the session password.
///
/// Each direction of a session owns one `Keystream`: the counter starts at
/// zero, advances once per byte processed and is never reset, so bytes are
/// ciphered strictly in stream order regardless of how reads and writes are
/// chunked. Applying the transform twice from the same counter value
/// restores the original bytes, which is why a single `apply` serves both
/// encryption and decryption.
#[derive(Debug, Clone)]
pub struct Keystream {
    key: Vec<u8>,
    counter: u64,
}

impl Keystream {
    /// Create a keystream from the password bytes. An empty key would make
    /// the modulo indexing meaningless, so it is rejected here; passwords
    /// are required non-empty before a session is ever constructed.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            anyhow::bail!("cipher key must not be empty");
        }
        Ok(Keystream { key, counter: 0 })
    }

    /// XOR `buf` in place against the repeating key, advancing the counter
    /// by `buf.len()`.
    pub fn apply(&mut self, buf: &mut [u8]) {
        let len = self.key.len() as u64;
        for byte in buf.iter_mut() {
            *byte ^= self.key[(self.counter % len) as usize];
            self.counter = self.counter.wrapping_add(1);
        }
    }

    /// Bytes processed so far in this direction.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}
