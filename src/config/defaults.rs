//! System-wide default constants.
//!
//! Grouped by subsystem. Values that operators may tune are only the
//! *defaults* for the matching `MonitorConfig` field.

// ============================================================================
// Sensor bounds
// ============================================================================

/// Lowest accepted specific gravity (water).
pub const GRAVITY_MIN_SG: f64 = 1.000;

/// Highest accepted specific gravity.
pub const GRAVITY_MAX_SG: f64 = 1.150;

/// Accepted temperature range (°C).
pub const TEMPERATURE_MIN_C: f64 = -5.0;
pub const TEMPERATURE_MAX_C: f64 = 50.0;

pub const BATTERY_MAX_PERCENT: f64 = 100.0;

/// One gravity point is a thousandth of SG (1.050 is "50 points").
pub const SG_PER_POINT: f64 = 0.001;

// ============================================================================
// Trigger evaluation
// ============================================================================

/// Trailing window for the gravity stability check (hours).
pub const GRAVITY_STABILITY_HOURS: f64 = 12.0;

/// Readings must cover at least this much of the stability window (hours).
pub const GRAVITY_STABILITY_MIN_SPAN_HOURS: f64 = 6.0;

/// Maximum gravity range still considered stable (points).
pub const GRAVITY_STABILITY_POINTS: f64 = 0.5;

/// Trailing window for the temperature descent check (hours).
pub const TEMP_DESCENT_HOURS: f64 = 6.0;

/// Readings must cover at least this much of the descent window (hours).
pub const TEMP_DESCENT_MIN_SPAN_HOURS: f64 = 3.0;

/// Minimum first-minus-last temperature drop (°C).
pub const TEMP_DESCENT_THRESHOLD_C: f64 = 0.5;

/// Attenuation threshold for profiles missing from the table.
pub const DEFAULT_ATTENUATION_THRESHOLD: f64 = 0.80;

// ============================================================================
// Forecast
// ============================================================================

/// Trailing window the gravity trend is fitted over (hours).
pub const FORECAST_WINDOW_HOURS: f64 = 24.0;

/// Minimum readings for a trend fit.
pub const FORECAST_MIN_READINGS: usize = 3;

/// Minimum time covered by the fitted readings (hours).
pub const FORECAST_MIN_SPAN_HOURS: f64 = 6.0;

// ============================================================================
// Alert gating
// ============================================================================

/// History window used for dedup when no arming state is known (hours).
pub const ALERT_COOLDOWN_HOURS: f64 = 24.0;

/// Upper bound on a single notifier call (seconds).
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Server / storage
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8000";

pub const DATA_DIR: &str = "./data";

/// Sled database directory name inside the data directory.
pub const DB_DIR_NAME: &str = "ferment.db";

/// Default trailing window for the readings endpoint (hours).
pub const READINGS_QUERY_HOURS: f64 = 24.0;

/// Largest trailing window the readings endpoint accepts (one year, hours).
pub const READINGS_QUERY_MAX_HOURS: f64 = 24.0 * 365.0;

// ============================================================================
// Telegram
// ============================================================================

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// ============================================================================
// Device poller
// ============================================================================

pub const RAPT_AUTH_URL: &str = "https://id.rapt.io/connect/token";

pub const RAPT_API_URL: &str = "https://api.rapt.io";

/// Interval between poller cycles (seconds). 3 600 = 1 hour.
pub const POLLER_INTERVAL_SECS: u64 = 3_600;

/// Back-off after a failed poller cycle (seconds).
pub const POLLER_RETRY_SECS: u64 = 300;

/// Telemetry lookback per poller cycle (hours).
pub const POLLER_LOOKBACK_HOURS: i64 = 2;

/// HTTP client timeout for poller requests (seconds).
pub const POLLER_HTTP_TIMEOUT_SECS: u64 = 60;
