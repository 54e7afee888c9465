/**
 * Translation Module
 *
 * Online (Lingva) and offline (engine session) translation behind one
 * orchestrator.
 */

mod orchestrator;
mod remote;

pub use orchestrator::{TranslationMode, TranslationOrchestrator};
pub use remote::{LingvaClient, RemoteTranslator, DEFAULT_INSTANCES};
