//! Tether Services Layer
//!
//! Platform collaborators of the bridge: base directories and file paths,
//! bitmap decoding, tagged logging, settings.

pub mod bitmap;
pub mod error;
pub mod logging;
pub mod paths;
pub mod settings;

pub use bitmap::{get_bitmap, Bitmap, BitmapDecoder, ImageDecoder};
pub use error::{Result, ServiceError};
pub use paths::{base_dir_to_string, dir_pointers, BaseDir, PathResolver, PlatformPaths};
pub use settings::Settings;

/// Apply logging settings and build the path resolver for `app_name`.
pub fn init_services(app_name: &str, settings: &Settings) -> PlatformPaths {
    logging::set_tag(&settings.logging.tag);
    if settings.logging.debug {
        logging::enable_debug();
    }
    PlatformPaths::with_settings(app_name, settings.paths.clone())
}
