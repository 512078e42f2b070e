#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTier {
    Fast,
    Advanced,
}

impl ImageTier {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Advanced => "advanced",
        }
    }
}

/// Prompts suggesting text-rendering-heavy or presentation-grade output are
/// routed to the advanced tier. Matching is plain substring containment
/// over the lower-cased prompt, not word-boundary tokenization: recall is
/// favored over precision on purpose.
const ADVANCED_KEYWORDS: &[&str] = &[
    "infographic",
    "diagram",
    "chart",
    "logo",
    "poster",
    "typography",
    "high quality",
    "text",
    "presentation",
    "slide",
    "banner",
    "label",
];

/// Picks the image model tier. Explicit caller intent always wins;
/// otherwise the keyword heuristic decides. Never touches the network.
pub fn select_tier(prompt: &str, explicit_override: Option<bool>) -> ImageTier {
    if let Some(advanced) = explicit_override {
        return if advanced {
            ImageTier::Advanced
        } else {
            ImageTier::Fast
        };
    }
    let lowered = prompt.to_lowercase();
    if ADVANCED_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        ImageTier::Advanced
    } else {
        ImageTier::Fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins_regardless_of_prompt() {
        assert_eq!(
            select_tier("an infographic about rust", Some(false)),
            ImageTier::Fast
        );
        assert_eq!(select_tier("a cute cat", Some(true)), ImageTier::Advanced);
    }

    #[test]
    fn keyword_prompts_route_to_advanced() {
        for prompt in [
            "Create an infographic of the water cycle",
            "minimalist LOGO for a bakery",
            "a bar chart comparing runtimes",
            "poster with bold typography",
            "high quality product shot",
        ] {
            assert_eq!(select_tier(prompt, None), ImageTier::Advanced, "{prompt}");
        }
    }

    #[test]
    fn plain_prompts_route_to_fast() {
        for prompt in ["a cute cat", "sunset over mountains", "watercolor fox"] {
            assert_eq!(select_tier(prompt, None), ImageTier::Fast, "{prompt}");
        }
    }

    #[test]
    fn matching_is_substring_not_word_boundary() {
        // "text" inside "textured" still matches; accepted recall/precision
        // tradeoff of the containment heuristic.
        assert_eq!(
            select_tier("a textured clay sculpture", None),
            ImageTier::Advanced
        );
    }
}
