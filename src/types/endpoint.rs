//! Endpoint identifiers.

use serde::{Deserialize, Serialize};

/// Logical category of an AI call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    Chat,
    ImageAnalysis,
    VoiceAnalysis,
    LessonGeneration,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Chat,
        Endpoint::ImageAnalysis,
        Endpoint::VoiceAnalysis,
        Endpoint::LessonGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::ImageAnalysis => "image-analysis",
            Endpoint::VoiceAnalysis => "voice-analysis",
            Endpoint::LessonGeneration => "lesson-generation",
        }
    }

    /// Generation-class calls have high, load-dependent latency and go through
    /// the escalating retry scheduler.
    pub fn is_generation(&self) -> bool {
        matches!(self, Endpoint::LessonGeneration)
    }

    /// Analysis endpoints consume binary media and are only cacheable for stable references.
    pub fn is_media_analysis(&self) -> bool {
        matches!(self, Endpoint::ImageAnalysis | Endpoint::VoiceAnalysis)
    }

    /// Payload field carrying the media for analysis endpoints, as (inline, reference).
    pub(crate) fn media_fields(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Endpoint::ImageAnalysis => Some(("image", "imageUrl")),
            Endpoint::VoiceAnalysis => Some(("audio", "audioUrl")),
            _ => None,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Endpoint::Chat),
            "image-analysis" => Ok(Endpoint::ImageAnalysis),
            "voice-analysis" => Ok(Endpoint::VoiceAnalysis),
            "lesson-generation" => Ok(Endpoint::LessonGeneration),
            _ => Err(format!("Unknown endpoint: {}", s)),
        }
    }
}
