//! Stable, non-cryptographic digests (FNV-1a 64-bit).
//!
//! Snapshot fingerprints and profile digests use these so that two passes over
//! the same taxonomy text produce the same identifier in logs and reports.
//!
//! - output: `"fnv1a64:<16 lowercase hex digits>"`
//!
//! This is not a security primitive.

/// Prefix used in serialized digests.
pub const DIGEST_V1_PREFIX: &str = "fnv1a64:";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// Incremental FNV-1a 64-bit hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64 {
    hash: u64,
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }
}

impl Fnv1a64 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        for b in bytes {
            self.hash ^= (*b) as u64;
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
        }
        self
    }

    /// Feed a string followed by a record separator, so `("ab","c")` and
    /// `("a","bc")` hash differently.
    pub fn field(&mut self, s: &str) -> &mut Self {
        self.update(s.as_bytes()).update(&[0x1e])
    }

    pub fn finish(&self) -> u64 {
        self.hash
    }

    pub fn finish_string(&self) -> String {
        format!("{DIGEST_V1_PREFIX}{:016x}", self.hash)
    }
}

/// Digest of arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    Fnv1a64::new().update(bytes).finish_string()
}

/// Digest of a profile's identity and slots, independent of JSON formatting.
pub fn profile_digest_v1(profile: &crate::FunctionalProfile) -> String {
    let mut h = Fnv1a64::new();
    h.field("id").field(profile.id().as_str());
    h.field("mep").field(profile.mep().as_str());
    h.field("category").field(profile.category().as_str());
    for input in profile.inputs() {
        h.field("in").field(input.as_str());
    }
    for output in profile.outputs() {
        h.field("out").field(output.as_str());
    }
    h.finish_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_has_expected_prefix_and_width() {
        let d = fnv1a64_digest_bytes(b"taxonomy\n");
        assert!(d.starts_with(DIGEST_V1_PREFIX));
        assert_eq!(d.len(), DIGEST_V1_PREFIX.len() + 16);
    }

    #[test]
    fn fields_are_separated() {
        let a = Fnv1a64::new().field("ab").field("c").finish();
        let b = Fnv1a64::new().field("a").field("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn profile_digest_changes_with_slots() {
        let p1 = crate::FunctionalProfile::from_uris(
            "http://example.org/svc#A",
            "http://example.org/c#Dog",
            &["http://example.org/m#Weight"],
            &[],
        )
        .unwrap();
        let p2 = crate::FunctionalProfile::from_uris(
            "http://example.org/svc#A",
            "http://example.org/c#Dog",
            &["http://example.org/m#Height"],
            &[],
        )
        .unwrap();
        assert_ne!(profile_digest_v1(&p1), profile_digest_v1(&p2));
        assert_eq!(profile_digest_v1(&p1), profile_digest_v1(&p1.clone()));
    }
}
