use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{
    ChatReply, ChatRequest, ImageBatchRequest, ImageBatchResponse, VideoOperation, VideoPoll,
    VideoRequest,
};

/// The three request kinds the dispatcher issues against the remote API.
/// Retry, backoff, and quota behavior live behind this seam, not in the
/// server.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError>;

    async fn generate_images(
        &self,
        request: ImageBatchRequest,
    ) -> Result<ImageBatchResponse, ProviderError>;

    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, ProviderError>;

    async fn poll_video(&self, operation: &str) -> Result<VideoPoll, ProviderError>;
}
