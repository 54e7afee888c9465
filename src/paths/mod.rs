/**
 * Paths Module
 *
 * Unified path management. All paths to config, models and caches go
 * through this module.
 */
mod app_dirs;

pub use app_dirs::*;
