//! Time and rating constants shared across the match engine.

/// Wall-clock speed at which a piece travels, in squares per second.
pub const SQUARES_PER_SECOND: f64 = 1.0;

/// How long a piece sleeps after arriving before it may move again.
pub const SLEEP_SECONDS: f64 = 3.0;

/// How long an idle match is kept in the registry before being reaped.
pub const MATCH_TTL_SECONDS: i64 = 60 * 60;

/// Window used by `Registry::recent` to decide whether a match is "active".
pub const RECENT_ACTIVITY_SECONDS: i64 = 2 * 60;

/// Elo K-factor used by `report_results_if_over`.
pub const ELO_K: f64 = 32.0;

/// Starting rating for a player with no history.
pub const DEFAULT_RATING: i64 = 1000;
