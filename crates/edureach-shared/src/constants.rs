use crate::types::QualityPreset;

/// Application name
pub const APP_NAME: &str = "EduReach";

/// Name of the cache generation for this build. Activation deletes every
/// generation with a different name.
pub const CACHE_VERSION: &str = "edureach-v1.0.0";

/// Document served in place of a failed navigation.
pub const OFFLINE_FALLBACK_PATH: &str = "/index.html";

/// Root-relative assets fetched eagerly at install time, in order.
pub const STATIC_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/src/styles/main.css",
    "/src/config/constants.js",
    "/src/utils/indexedDB.js",
    "/src/utils/auth.js",
    "/src/utils/networkDetector.js",
    "/src/utils/i18n.js",
    "/assets/images/logo.png",
];

/// Message tag that makes a waiting worker activate immediately.
pub const SKIP_WAITING_MESSAGE: &str = "SKIP_WAITING";

/// Default remote API base URL
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Default origin the application is served from
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:8000";

/// Bounded request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Send attempts per request before the failure is surfaced
pub const RETRY_ATTEMPTS: u32 = 3;

/// Interval between quality detections while online (milliseconds)
pub const QUALITY_CHECK_INTERVAL_MS: u64 = 5_000;

/// Local database file name
pub const DB_NAME: &str = "edureach_db";

/// Storage quota for the local database (100 MiB)
pub const MAX_STORAGE_BYTES: u64 = 100 * 1024 * 1024;

/// Collection names of the persisted layout
pub const STORE_USERS: &str = "users";
pub const STORE_COURSES: &str = "courses";
pub const STORE_QUIZZES: &str = "quizzes";
pub const STORE_SUBMISSIONS: &str = "submissions";
pub const STORE_NOTES: &str = "notes";
pub const STORE_VIDEOS: &str = "videos";
pub const STORE_OFFLINE_QUEUE: &str = "offline_queue";

/// Storage keys shared with the session layer
pub const TOKEN_KEY: &str = "edureach_token";
pub const USER_KEY: &str = "edureach_user";

/// Deferred-retry tags for the two known sync domains
pub const SYNC_TAG_QUIZ_SUBMISSIONS: &str = "sync-quiz-submissions";
pub const SYNC_TAG_ATTENDANCE: &str = "sync-attendance";

/// Media quality presets (bitrate in kbps)
pub const VIDEO_QUALITY_HIGH: QualityPreset = QualityPreset {
    width: 1280,
    height: 720,
    bitrate_kbps: 2500,
};
pub const VIDEO_QUALITY_MEDIUM: QualityPreset = QualityPreset {
    width: 854,
    height: 480,
    bitrate_kbps: 1000,
};
pub const VIDEO_QUALITY_LOW: QualityPreset = QualityPreset {
    width: 640,
    height: 360,
    bitrate_kbps: 500,
};
pub const VIDEO_QUALITY_AUDIO_ONLY: QualityPreset = QualityPreset {
    width: 0,
    height: 0,
    bitrate_kbps: 64,
};
