/// Static metadata for a Gemini model.
#[derive(Clone, Debug)]
pub struct GeminiModelInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub max_output: u32,
}

pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";

// Replies are conversational and short; these caps stay well below model limits.
static MODELS: &[GeminiModelInfo] = &[
    GeminiModelInfo {
        name: GEMINI_2_0_FLASH,
        display_name: "Gemini 2.0 Flash",
        max_output: 1024,
    },
    GeminiModelInfo {
        name: "gemini-2.0-flash-lite",
        display_name: "Gemini 2.0 Flash Lite",
        max_output: 1024,
    },
    GeminiModelInfo {
        name: "gemini-2.5-flash",
        display_name: "Gemini 2.5 Flash",
        max_output: 2048,
    },
    GeminiModelInfo {
        name: "gemini-2.5-pro",
        display_name: "Gemini 2.5 Pro",
        max_output: 2048,
    },
];

/// Fallback cap for models not in the table.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

pub fn find_model(name: &str) -> Option<&'static GeminiModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

pub fn default_model() -> &'static GeminiModelInfo {
    &MODELS[0]
}

pub fn all_models() -> &'static [GeminiModelInfo] {
    MODELS
}

pub fn max_output_for(name: &str) -> u32 {
    find_model(name).map_or(DEFAULT_MAX_OUTPUT_TOKENS, |m| m.max_output)
}
