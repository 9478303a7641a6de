//! Fixed names, keys and limits used by the deployment pipeline
//!
//! These mirror what the consuming subsystem expects on disk and change with
//! OS releases, so they are kept together rather than spread through the code.

// ==================== Limits ====================

/// Maximum number of queued bundles applied in one batch
pub const MAX_QUEUED_BUNDLES: usize = 10;

/// Maximum number of queued videos
pub const MAX_QUEUED_VIDEOS: usize = 5;

/// Longest accepted video, in seconds
pub const MAX_VIDEO_DURATION_SECS: f64 = 12.0;

/// Inclusive range for generated descriptor identifiers
pub const IDENTIFIER_MIN: i64 = 9999;
pub const IDENTIFIER_MAX: i64 = 99999;

/// App-hash poll interval in milliseconds
pub const HASH_POLL_INTERVAL_MS: u64 = 500;

// ==================== Staging layout ====================

/// Queue store for imported bundles
pub const DEFAULT_BUNDLE_STORE_DIR: &str = "KFC Bucket";

/// Extraction scratch root
pub const DEFAULT_UNZIP_DIR: &str = "UnzipItems";

/// Directory an archive is decompressed into, inside its scratch subdirectory
pub const DEFAULT_UNZIP_CONTENT_DIR: &str = "directory";

/// Name of the bundle copy inside its scratch subdirectory
pub const DEFAULT_BUNDLE_COPY_FILE: &str = "bundle.zip";

/// Top-level staging entries a bundle's scratch cleanup must never touch
pub const RESERVED_STAGING_NAMES: &[&str] = &[
    DEFAULT_BUNDLE_STORE_DIR,
    DEFAULT_UNZIP_DIR,
    DEFAULT_CARPLAY_PHOTOS_DIR,
    DEFAULT_VIDEOS_DIR,
    DEFAULT_TUNNEL_MOUNT,
    DEFAULT_CACHE_MARKER,
    DEFAULT_LOCK_FILE,
    DEFAULT_HASH_FILE,
    DEFAULT_PREFS_FILE,
];

/// Persisted CarPlay override images
pub const DEFAULT_CARPLAY_PHOTOS_DIR: &str = "CarPlayPhotos";

/// Imported video cache, purged at startup
pub const DEFAULT_VIDEOS_DIR: &str = "Videos";

/// Tunnel mount point inside the documents root
pub const DEFAULT_TUNNEL_MOUNT: &str = ".Trash";

/// Zero-byte marker that tells the target app to drop its image cache
pub const DEFAULT_CACHE_MARKER: &str = "Caches";

/// Cross-process deployment lock
pub const DEFAULT_LOCK_FILE: &str = "deploy.lock";

/// File the external helper drops the app hashes into
pub const DEFAULT_HASH_FILE: &str = "NuggetAppHash";

/// Preferences document inside the config directory
pub const DEFAULT_PREFS_FILE: &str = "preferences.json";

/// Extension of importable bundles
pub const BUNDLE_EXTENSION: &str = "tendies";

/// Extension given to imported videos
pub const VIDEO_FILE_EXTENSION: &str = "mp4";

// ==================== Container layout ====================

/// Default root of installed-app data containers
pub const DEFAULT_CONTAINER_ROOT: &str = "/var/mobile/Containers/Data/Application";

/// Per-extension store inside the poster app's container
pub const EXTENSION_STORE_SUBPATH: &str =
    "Library/Application Support/PRBPosterExtensionDataStore/61/Extensions";

/// Directory under each extension holding descriptor instances
pub const DESCRIPTORS_DIR: &str = "descriptors";

/// CarPlay wallpaper image cache inside the CarPlay app's container
pub const CARPLAY_CACHE_SUBPATH: &str =
    "Library/Caches/MappedImageCache/com.apple.CarPlayApp.wallpaper-images";

// ==================== Extension keys ====================

/// General poster-collections consumer
pub const COLLECTIONS_EXTENSION: &str = "com.apple.WallpaperKit.CollectionsPoster";

/// Video-poster consumer
pub const VIDEO_EXTENSION: &str = "com.apple.PhotosUIPrivate.PhotosPosterProvider";

// ==================== Bundle classification ====================

/// Nested per-extension bundle
pub const CONTAINER_DIR: &str = "container";

/// Flat descriptor sets for the collections consumer
pub const DESCRIPTOR_DIR_NAMES: &[&str] = &[
    "descriptor",
    "descriptors",
    "ordered-descriptor",
    "ordered-descriptors",
];

/// Flat descriptor sets for the video consumer
pub const VIDEO_DESCRIPTOR_DIR_NAMES: &[&str] = &["video-descriptor", "video-descriptors"];

/// Resource-fork artifact left by macOS archivers
pub const RESOURCE_FORK_DIR: &str = "__MACOSX";

// ==================== Identifier carriers ====================

pub const IDENTIFIER_TEXT_FILE: &str = "com.apple.posterkit.provider.descriptor.identifier";
pub const USER_INFO_FILE: &str = "com.apple.posterkit.provider.contents.userInfo";
pub const USER_INFO_KEY: &str = "wallpaperRepresentingIdentifier";
pub const WALLPAPER_PLIST_FILE: &str = "Wallpaper.plist";
pub const WALLPAPER_PLIST_KEY: &str = "identifier";

/// Magic prefix of binary property lists
pub const BINARY_PLIST_MAGIC: &[u8] = b"bplist00";

// ==================== Video descriptors ====================

/// Core Animation bundle inside a generated video descriptor
pub const VIDEO_CA_SUBPATH: &str = "videoCAML/versions/1/contents/9183.Custom-810w-1080h@2x~ipad.wallpaper/9183.Custom_Background-810w-1080h@2x~ipad.ca";
pub const VIDEO_ASSETS_DIR: &str = "assets";
pub const VIDEO_MAIN_DOCUMENT: &str = "main.caml";
pub const VIDEO_INDEX_DOCUMENT: &str = "index.xml";

// ==================== Platform ====================

/// Names used when reporting a missing app hash
pub const POSTER_APP_LABEL: &str = "the poster app";
pub const CARPLAY_APP_LABEL: &str = "the CarPlay app";

/// Bundle id of the poster app
pub const POSTER_BOARD_BUNDLE_ID: &str = "com.apple.PosterBoard";

/// OS 26 developer-beta builds that still accept CarPlay wallpapers
pub const CARPLAY_BETA_BUILDS: &[&str] = &["23A5260n", "23A5260u", "23A5276f", "23A5287g"];

/// CarPlay bitmap resolution on OS 18 and newer
pub const CARPLAY_BITMAP_SIZE: (u32, u32) = (1920, 720);

/// CarPlay bitmap resolution before OS 18
pub const CARPLAY_LEGACY_BITMAP_SIZE: (u32, u32) = (1280, 480);

/// Deep-link scheme prefixes
pub const DEEP_LINK_DOWNLOAD: &str = "pocketposter://download?url=";
pub const DEEP_LINK_APP_HASH: &str = "pocketposter://app-hash?uuid=";
