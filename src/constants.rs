//! Application constants and configuration

use std::time::Duration;

pub const APP_NAME: &str = "VU Server Browser";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A second click on the same row inside this window activates instead of expanding.
pub const CLICK_WINDOW: Duration = Duration::from_millis(350);

/// Delay between clearing the gates and issuing the connect call, so the
/// connecting popup gets a chance to render first.
pub const CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Server names longer than this are cut and suffixed with "..".
pub const NAME_DISPLAY_LIMIT: usize = 50;

/// Maps under this path prefix belong to an expansion pack; the next char is the pack number.
pub const XPACK_MAP_PREFIX: &str = "Levels/XP";

// FPS at or below these values flags a server as lagging
pub const FPS_THRESHOLD_HIGH60: i64 = 66;
pub const FPS_THRESHOLD_HIGH120: i64 = 132;
pub const FPS_THRESHOLD_REGULAR: i64 = 33;

/// Shown in place of the list when nothing survives the filters
pub const EMPTY_LIST_NOTICE: &str = "No servers found";
