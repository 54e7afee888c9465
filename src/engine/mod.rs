/**
 * Engine Module
 *
 * Native translation engine session and language detection.
 */

mod detector;
mod native;
mod session;

#[cfg(feature = "native")]
pub mod ffi;

pub use detector::{Detection, LanguageDetector};
pub use native::NativeEngine;
pub use session::{EngineKey, EngineSession, EngineState};
