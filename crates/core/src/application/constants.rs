// Limiter constants (no magic values)

/// Requests per second per client when nothing is configured
pub const DEFAULT_RATE: i64 = 10;

/// Environment variable holding the rate (requests/sec per client)
pub const RATE_ENV_VAR: &str = "TOKENGATE_RATE";
