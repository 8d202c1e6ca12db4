//! Hash functions for content addressing

/// Digest capability applied to serialized entries
///
/// The output length must not depend on the input; the log measures it once
/// at construction and sizes every index line from it. Any
/// `Fn(&[u8]) -> Vec<u8>` closure is a `HashFunction`.
pub trait HashFunction: Send + Sync {
    /// Hash serialized entry bytes to raw digest bytes
    fn hash(&self, data: &[u8]) -> Vec<u8>;
}

impl<F> HashFunction for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn hash(&self, data: &[u8]) -> Vec<u8> {
        self(data)
    }
}

/// 32-byte BLAKE3, giving 65-byte index lines
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3;

impl HashFunction for Blake3 {
    fn hash(&self, data: &[u8]) -> Vec<u8> {
        blake3::hash(data).as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_is_deterministic() {
        let a = Blake3.hash(b"{\"x\":1}");
        let b = Blake3.hash(b"{\"x\":1}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, Blake3.hash(b"{\"y\":2}"));
    }

    #[test]
    fn test_closure_is_hash_function() {
        let repeated = |data: &[u8]| Blake3.hash(data).repeat(3);
        assert_eq!(repeated.hash(b"abc").len(), 96);
    }
}
