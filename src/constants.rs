// =============================================================================
// API & MODELS
// =============================================================================

/// Default model for README generation
pub const MODEL: &str = "gemini-2.5-flash";

/// Gemini API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Maximum output tokens per generation pass
pub const MAX_OUTPUT_TOKENS: u32 = 2200;

/// Sampling temperature
pub const TEMPERATURE: f32 = 0.2;

// =============================================================================
// CONTINUATION
// =============================================================================

/// End marker the model is instructed to emit exactly once
pub const END_MARK: &str = "<!-- END_OF_README -->";

/// Maximum number of generation passes before giving up on the end marker
pub const MAX_PASSES: usize = 3;

/// Characters of accumulated text supplied as anchor to continuation prompts
pub const TAIL_WINDOW: usize = 1200;

// =============================================================================
// GITHUB SNAPSHOT
// =============================================================================

/// GitHub REST API base URL
pub const GITHUB_API: &str = "https://api.github.com";

/// GitHub raw content host
pub const GITHUB_RAW: &str = "https://raw.githubusercontent.com";

/// Maximum number of files included in a snapshot
pub const SNAPSHOT_MAX_FILES: usize = 12;

/// Per-file character cap before truncation
pub const SNAPSHOT_PER_FILE_CHARS: usize = 16_000;

/// Total character budget across all snapshot files
pub const SNAPSHOT_BUDGET_CHARS: usize = 60_000;

/// HTTP timeout for GitHub calls (seconds)
pub const GITHUB_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// LOCAL STATE
// =============================================================================

/// Dot-directory for the optional config file and request dumps
pub const STATE_DIR: &str = ".readme-pilot";
