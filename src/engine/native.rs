/**
 * Native Engine Contract
 *
 * The four calls the translation engine library exposes. A handle is owned
 * by exactly one session and `destroy` consumes it, so a handle can never be
 * used after it is freed.
 */
use std::path::Path;

pub trait NativeEngine: Send + 'static {
    /// Opaque engine instance
    type Handle: Send;

    /// `None` when the library could not allocate an instance
    fn create(&self) -> Option<Self::Handle>;

    /// Load the model bundle in `model_dir`. Returns false on failure.
    fn init(&self, handle: &mut Self::Handle, model_dir: &Path) -> bool;

    fn translate(&self, handle: &mut Self::Handle, text: &str) -> Result<String, String>;

    fn destroy(&self, handle: Self::Handle);
}
