//! C bindings for the translator and language-detection libraries.
//!
//! Only compiled when the `native` feature is enabled. The libraries must be
//! on the linker search path (`RUSTFLAGS="-L <dir>"`).

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr::{self, NonNull};

use super::detector::{Detection, LanguageDetector};
use super::native::NativeEngine;
use crate::error::{Error, Result};

#[repr(C)]
pub struct TranslatorCtx {
    _opaque: [u8; 0],
}

#[repr(C)]
struct RawDetection {
    lang: [c_char; 8],
    confidence: c_int,
    is_reliable: c_int,
}

#[link(name = "translator_ffi")]
extern "C" {
    fn translator_create() -> *mut TranslatorCtx;
    fn translator_init(ctx: *mut TranslatorCtx, model_dir: *const c_char) -> c_int;
    /// Returns a string owned by the library, or null with `error` set
    fn translator_translate(
        ctx: *mut TranslatorCtx,
        text: *const c_char,
        error: *mut *mut c_char,
    ) -> *mut c_char;
    fn translator_free_string(s: *mut c_char);
    fn translator_destroy(ctx: *mut TranslatorCtx);
}

#[link(name = "lang_detect_ffi")]
extern "C" {
    fn lang_detect(text: *const c_char, hint: *const c_char, out: *mut RawDetection) -> c_int;
}

/// Owned pointer to a native translator instance
pub struct TranslatorHandle(NonNull<TranslatorCtx>);

// SAFETY: the library keeps no thread-local state and the session only
// touches a handle while holding its mutex.
unsafe impl Send for TranslatorHandle {}

#[derive(Debug, Default, Clone, Copy)]
pub struct FfiEngine;

impl NativeEngine for FfiEngine {
    type Handle = TranslatorHandle;

    fn create(&self) -> Option<TranslatorHandle> {
        NonNull::new(unsafe { translator_create() }).map(TranslatorHandle)
    }

    fn init(&self, handle: &mut TranslatorHandle, model_dir: &Path) -> bool {
        let Some(dir) = model_dir.to_str().and_then(|d| CString::new(d).ok()) else {
            log::error!("[FFI] Model path is not a valid C string: {:?}", model_dir);
            return false;
        };
        unsafe { translator_init(handle.0.as_ptr(), dir.as_ptr()) != 0 }
    }

    fn translate(&self, handle: &mut TranslatorHandle, text: &str) -> std::result::Result<String, String> {
        let input = CString::new(text).map_err(|e| format!("Invalid input text: {}", e))?;
        let mut error: *mut c_char = ptr::null_mut();

        let output = unsafe { translator_translate(handle.0.as_ptr(), input.as_ptr(), &mut error) };
        if output.is_null() {
            let message = take_string(error).unwrap_or_else(|| "translation failed".to_string());
            return Err(message);
        }
        take_string(output).ok_or_else(|| "translation failed".to_string())
    }

    fn destroy(&self, handle: TranslatorHandle) {
        unsafe { translator_destroy(handle.0.as_ptr()) }
    }
}

/// Copy a library-owned string and free the original
fn take_string(s: *mut c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
    unsafe { translator_free_string(s) };
    Some(text)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FfiDetector;

impl LanguageDetector for FfiDetector {
    fn detect(&self, text: &str, hint: Option<&str>) -> Result<Detection> {
        let text = CString::new(text).map_err(|e| Error::Translation(e.to_string()))?;
        let hint = hint
            .map(CString::new)
            .transpose()
            .map_err(|e| Error::Translation(e.to_string()))?;
        let hint_ptr = hint.as_ref().map_or(ptr::null(), |h| h.as_ptr());

        let mut raw = RawDetection {
            lang: [0; 8],
            confidence: 0,
            is_reliable: 0,
        };
        let ok = unsafe { lang_detect(text.as_ptr(), hint_ptr, &mut raw) };
        if ok == 0 {
            return Err(Error::Translation("language detection failed".to_string()));
        }

        let bytes: Vec<u8> = raw.lang.iter().map(|c| *c as u8).collect();
        let lang = CStr::from_bytes_until_nul(&bytes)
            .map_err(|_| Error::Translation("detector returned an unterminated code".to_string()))?
            .to_string_lossy()
            .into_owned();
        Ok(Detection {
            lang,
            confidence: raw.confidence,
            is_reliable: raw.is_reliable != 0,
        })
    }
}
