use sha2::{Digest, Sha256};

/// Parameters of a vacancy search, shared by every source adapter.
/// The meaning of `area` is source-dependent: a numeric region code on one
/// upstream, a city name on another. Adapters translate it as needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SearchParams {
    pub text: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub page: u32,
}

impl SearchParams {
    /// Deterministic fingerprint of the search, used as the result-cache key.
    ///
    /// The encoding is the canonical JSON of the four fields in declaration
    /// order; the fingerprint is the lowercase hex of the first 16 bytes of
    /// its SHA-256 digest. Two parameter sets collide iff all four fields
    /// are equal.
    pub fn fingerprint(&self) -> String {
        let canonical =
            serde_json::to_vec(self).expect("SearchParams always serializes to JSON");
        let digest = Sha256::digest(&canonical);
        hex::encode(&digest[..16])
    }
}
