//! Response shapes for the operations that aren't chat/text/responses:
//! embeddings, speech, transcription, image generation, and the
//! administrative batch/file/container surface. Kept in their own module
//! rather than bolted onto [`crate::response::UnifiedResponse`] because
//! each of these carries a genuinely different shape (a vector, a byte
//! blob, a resource-listing page): a sum type that names its variants
//! beats one struct with a dozen `Option` fields only one of which is
//! ever set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::UnifiedUsage;

/// Fields every non-chat operation response shares, flattened into the
/// concrete struct rather than nested, so callers don't have to reach
/// through an extra level to read `provider`/`latency_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub provider: String,
    pub model_requested: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEmbedding {
    pub index: u32,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEmbeddingResponse {
    pub model: String,
    pub embeddings: Vec<UnifiedEmbedding>,
    pub usage: UnifiedUsage,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedSpeechResponse {
    #[serde(with = "crate::request::serde_bytes_base64")]
    pub audio: Vec<u8>,
    pub format: String,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedTranscriptionResponse {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedGeneratedImage {
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedImageGenerationResponse {
    pub images: Vec<UnifiedGeneratedImage>,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

/// A batch job, in whatever state it's currently in. `output_file_id`/
/// `error_file_id` are populated once the provider finishes processing;
/// absent (`None`) while `status` is still `in_progress`/`validating`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedBatch {
    pub id: String,
    pub status: String,
    pub endpoint: String,
    pub created_at: u64,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
    #[serde(default)]
    pub request_counts: Option<UnifiedBatchRequestCounts>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UnifiedBatchRequestCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedBatchResponse {
    #[serde(flatten)]
    pub batch: UnifiedBatch,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedBatchListResponse {
    pub batches: Vec<UnifiedBatch>,
    pub has_more: bool,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

/// A batch's results: for providers that materialize results as a file
/// (the JSONL-output-file convention most providers share), this is the
/// decoded content of that file, fetched via the same file-content path
/// `FileContent` uses. Kept distinct from [`UnifiedFileContentResponse`]
/// because a batch's output file id is an implementation detail the
/// caller of `BatchResults` shouldn't need to know to chase down
/// separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedBatchResultsResponse {
    pub batch_id: String,
    #[serde(with = "crate::request::serde_bytes_base64")]
    pub content: Vec<u8>,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFile {
    pub id: String,
    pub filename: String,
    pub bytes: u64,
    pub purpose: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFileResponse {
    #[serde(flatten)]
    pub file: UnifiedFile,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFileListResponse {
    pub files: Vec<UnifiedFile>,
    pub has_more: bool,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFileContentResponse {
    pub filename: String,
    #[serde(with = "crate::request::serde_bytes_base64")]
    pub content: Vec<u8>,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainer {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainerResponse {
    #[serde(flatten)]
    pub container: UnifiedContainer,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainerListResponse {
    pub containers: Vec<UnifiedContainer>,
    pub has_more: bool,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainerFile {
    pub id: String,
    pub container_id: String,
    pub filename: String,
    pub bytes: u64,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainerFileResponse {
    #[serde(flatten)]
    pub file: UnifiedContainerFile,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainerFileListResponse {
    pub files: Vec<UnifiedContainerFile>,
    pub has_more: bool,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedContainerFileContentResponse {
    pub filename: String,
    #[serde(with = "crate::request::serde_bytes_base64")]
    pub content: Vec<u8>,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

/// A deletion acknowledgement, shared by every `*Delete` operation
/// (file, container, container-file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedDeletedResponse {
    pub id: String,
    pub deleted: bool,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}

/// A JSON passthrough envelope for operations whose shape this crate
/// doesn't model beyond "provider returned a JSON document", so an
/// implementer plugging in a provider this schema hasn't been extended
/// for yet still composes with the dispatcher. Unused by the natively
/// implemented transports but kept as the final catch-all a custom
/// transport can return instead of failing closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedOpaqueResponse {
    pub value: Value,
    #[serde(flatten)]
    pub meta: ResponseMeta,
}
