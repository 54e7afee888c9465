/**
 * Downloads Module
 *
 * Model procurement: manifest cache, download pipeline, install store and
 * the background download manager.
 */

mod downloader;
mod install_store;
mod manager;
mod manifest;
mod progress;

pub use downloader::*;
pub use install_store::*;
pub use manager::*;
pub use manifest::*;
pub use progress::{CancelFlag, DownloadStatus, DownloadTask};
