//! Default values shared by settings and the orchestrator
//!
//! Keep tunables here rather than scattering literals across crates.

/// Service endpoints
pub mod endpoints {
    pub const ANTHROPIC_DEFAULT: &str = "https://api.anthropic.com";
    pub const DEEPGRAM_DEFAULT: &str = "https://api.deepgram.com";
    pub const ELEVENLABS_DEFAULT: &str = "https://api.elevenlabs.io";
}

/// Provider model defaults
pub mod models {
    pub const CLAUDE_DEFAULT: &str = "claude-3-sonnet-20240229";
    pub const DEEPGRAM_DEFAULT: &str = "nova-2";
    pub const ELEVENLABS_DEFAULT: &str = "eleven_monolingual_v1";
}

/// Seconds the agent waits for the respondent, per kind of turn
pub mod listen_timeouts {
    pub const CONSENT_SECS: u64 = 30;
    pub const INTRODUCTION_SECS: u64 = 15;
    pub const ANSWER_SECS: u64 = 120;
    pub const CLOSING_SECS: u64 = 60;
}

/// Time-budget behaviour
pub mod time_budget {
    /// Below this many seconds remaining the interview moves to closing
    pub const HARD_STOP_SECS: u64 = 60;

    /// Below this many seconds remaining the backlog gets prioritised
    pub const PRIORITIZE_WINDOW_SECS: u64 = 300;

    /// Prioritisation only applies when more questions than this are pending
    pub const PRIORITIZE_BACKLOG: usize = 3;

    pub const DEFAULT_INTERVIEW_TIMEOUT_MINUTES: u32 = 60;
}

/// Follow-up generation
pub mod follow_ups {
    /// Density below which an answer is probed for more detail
    pub const LOW_DENSITY: f32 = 0.4;

    /// Density above which a rich answer is worth exploring
    pub const HIGH_DENSITY: f32 = 0.7;

    pub const MAX_PER_QUESTION: usize = 3;

    /// Cap on candidates requested from the generator per answer
    pub const MAX_CANDIDATES: usize = 2;
}

/// Finished interviews below these are flagged for human review
pub mod quality {
    pub const MIN_COMPLETION: f64 = 0.3;
    pub const MIN_ENGAGEMENT: f64 = 0.2;

    /// Provider errors per recorded response
    pub const MAX_ERROR_RATE: f64 = 0.3;
}

/// Server limits
pub mod server {
    pub const MAX_CONCURRENT_INTERVIEWS: usize = 100;
    pub const DEFAULT_LIST_LIMIT: usize = 50;
}
