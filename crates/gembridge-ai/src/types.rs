#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<ChatTurn>,
    pub prompt: String,
    /// Per-call model override; the configured chat model when `None`.
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAspect {
    Square,
    Portrait3x4,
    Landscape4x3,
    Portrait9x16,
    Landscape16x9,
}

impl ImageAspect {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1:1" => Some(Self::Square),
            "3:4" => Some(Self::Portrait3x4),
            "4:3" => Some(Self::Landscape4x3),
            "9:16" => Some(Self::Portrait9x16),
            "16:9" => Some(Self::Landscape16x9),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait3x4 => "3:4",
            Self::Landscape4x3 => "4:3",
            Self::Portrait9x16 => "9:16",
            Self::Landscape16x9 => "16:9",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageBatchRequest {
    pub prompt: String,
    /// 1..=4; the dispatcher clamps before the request is built.
    pub count: u8,
    pub aspect: ImageAspect,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Base64 payload as returned by the API; decoded only when persisted.
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct ImageBatchResponse {
    pub images: Vec<GeneratedImage>,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAspect {
    Landscape16x9,
    Portrait9x16,
}

impl VideoAspect {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "16:9" => Some(Self::Landscape16x9),
            "9:16" => Some(Self::Portrait9x16),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Landscape16x9 => "16:9",
            Self::Portrait9x16 => "9:16",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResolution {
    P480,
    P720,
}

impl VideoResolution {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "480p" => Some(Self::P480),
            "720p" => Some(Self::P720),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::P480 => "480p",
            Self::P720 => "720p",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect: VideoAspect,
    pub resolution: VideoResolution,
    /// Optional (base64 data, mime type) first frame to condition on.
    pub first_frame: Option<(String, String)>,
}

/// Handle to an asynchronous remote video job; completion is discovered by
/// polling, never by blocking the initiating call.
#[derive(Debug, Clone)]
pub struct VideoOperation {
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum VideoPoll {
    Processing,
    Complete { data: Vec<u8>, mime_type: String },
}
