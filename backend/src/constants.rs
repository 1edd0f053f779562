// =============================================================================
// Locator Backend Constants
// =============================================================================
// Tunables for presence, visibility and the sweeper, kept in one place.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP port when PORT is unset
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Prefix every API route is nested under
pub const API_BASE_PATH: &str = "/api/v1";

/// Header carrying the authenticated caller id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

// =============================================================================
// DATABASE
// =============================================================================

/// Default connection pool size
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// GEOMETRY
// =============================================================================

/// Mean earth radius used for great-circle distance
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Decimal places kept for the "approximate" tier (~110 m)
pub const APPROXIMATE_DECIMALS: i32 = 3;

/// Decimal places kept for the "city" tier (~11 km)
pub const CITY_DECIMALS: i32 = 1;

/// Decimal places of reported distances
pub const DISTANCE_DECIMALS: i32 = 1;

/// Radius used by the nearby endpoint when the caller gives none
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;

// =============================================================================
// PRESENCE SWEEPER
// =============================================================================

/// How often the sweeper wakes up (T)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Presence older than this is flipped offline (S, must exceed T)
pub const DEFAULT_PRESENCE_STALE_SECS: u64 = 15 * 60;

/// How long stop() waits for an in-flight tick before giving up
pub const DEFAULT_SWEEPER_STOP_GRACE_SECS: u64 = 10;

// =============================================================================
// PAGINATION
// =============================================================================

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// USER DIRECTORY
// =============================================================================

/// Display name for ids the user directory has no record of
pub const UNKNOWN_USER_NAME: &str = "Unknown";
