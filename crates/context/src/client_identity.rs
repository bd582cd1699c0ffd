/// Identifies the caller behind a request for rate-limiting and key
/// selection purposes. Optional: requests without client identification
/// simply skip per-client token rate limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Caller identifier (API key ID, user ID, or similar).
    pub client_id: String,
    /// Optional group/tier the caller belongs to (e.g. "free", "enterprise").
    pub group: Option<String>,
}
