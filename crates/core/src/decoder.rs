//! Decode-capability boundary. The symmetric decode algorithm lives in an
//! external bundle (a shared library exporting `DeString`); this module owns
//! loading it with a bounded readiness wait and marshalling text across the
//! C call, nothing more.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use libloading::{Library, Symbol};

use crate::error::{FlipError, Result};

/// How long the one-time capability bootstrap may take before the run fails.
pub const READY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Opaque `decode(text) -> text` capability.
pub trait PayloadDecoder {
    fn decode(&self, text: &str) -> Result<String>;
}

/// Initialization state of the capability bootstrap. Transitions are
/// one-way: `Unloaded -> Loading -> Ready | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

type DeStringFn = unsafe extern "C" fn(*const c_char) -> *const c_char;
type AllocFn = unsafe extern "C" fn(usize) -> *mut c_char;
type ReleaseFn = unsafe extern "C" fn(*mut c_char);

#[derive(Debug)]
pub struct NativeDecoder {
    library: Library,
}

impl NativeDecoder {
    /// Load the decoder bundle, blocking at most `timeout` for it to become
    /// callable. The load happens on a helper thread so a hung loader hits
    /// the deadline instead of wedging the run.
    pub fn load(bundle: &Path, timeout: Duration) -> Result<Self> {
        let path = bundle.to_path_buf();
        Self::load_with(bundle, timeout, move || {
            unsafe { Library::new(&path) }.map_err(|err| err.to_string())
        })
    }

    /// Bootstrap over an injected loader so the bounded wait can be driven
    /// without a real bundle.
    fn load_with<F>(bundle: &Path, timeout: Duration, loader: F) -> Result<Self>
    where
        F: FnOnce() -> std::result::Result<Library, String> + Send + 'static,
    {
        let mut state = CapabilityState::Unloaded;
        tracing::debug!(?state, bundle = %bundle.display(), "decoder bootstrap");
        let (ready_tx, ready_rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = ready_tx.send(loader());
        });
        state = CapabilityState::Loading;
        tracing::debug!(?state, "decoder bootstrap");

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(library)) => {
                let decoder = NativeDecoder { library };
                // Resolve the entry point now so a bundle without the
                // expected export fails the bootstrap, not the first call.
                decoder.entry_point()?;
                state = CapabilityState::Ready;
                tracing::debug!(?state, "decoder bootstrap");
                Ok(decoder)
            }
            Ok(Err(load_err)) => {
                state = CapabilityState::Failed;
                tracing::warn!(?state, %load_err, "decoder bootstrap");
                Err(FlipError::CapabilityUnavailable(bundle.to_path_buf()))
            }
            Err(_) => {
                state = CapabilityState::Failed;
                tracing::warn!(?state, "decoder bootstrap timed out");
                Err(FlipError::CapabilityTimeout(timeout.as_millis() as u64))
            }
        }
    }

    fn entry_point(&self) -> Result<Symbol<'_, DeStringFn>> {
        self.symbol(["DeString", "_DeString"])
    }

    fn symbol<T>(&self, names: [&str; 2]) -> Result<Symbol<'_, T>> {
        for name in names {
            if let Ok(found) = unsafe { self.library.get::<T>(name.as_bytes()) } {
                return Ok(found);
            }
        }
        Err(FlipError::Decode(format!(
            "export `{}` missing from decoder bundle",
            names[0]
        )))
    }
}

impl PayloadDecoder for NativeDecoder {
    /// One call, one transient input buffer provisioned from the bundle's
    /// own allocator: copy the ASCII input plus NUL terminator in, invoke
    /// `DeString`, read the NUL-terminated result back, release the buffer.
    /// The result buffer is owned by the bundle and is not freed here.
    fn decode(&self, text: &str) -> Result<String> {
        if !text.is_ascii() {
            return Err(FlipError::Decode(
                "encoded payload contains non-ASCII input".to_string(),
            ));
        }
        let de_string = self.entry_point()?;
        let alloc: Symbol<'_, AllocFn> = self.symbol(["malloc", "_malloc"])?;
        let release: Symbol<'_, ReleaseFn> = self.symbol(["free", "_free"])?;

        let capacity = text.len() * 4 + 1;
        unsafe {
            let buffer = alloc(capacity);
            if buffer.is_null() {
                return Err(FlipError::Decode(
                    "decoder allocator returned null".to_string(),
                ));
            }
            std::ptr::copy_nonoverlapping(text.as_ptr(), buffer.cast::<u8>(), text.len());
            *buffer.add(text.len()) = 0;

            let out = de_string(buffer.cast_const());
            let result = if out.is_null() {
                Err(FlipError::Decode("decoder returned null".to_string()))
            } else {
                Ok(CStr::from_ptr(out).to_string_lossy().into_owned())
            };
            release(buffer);
            result
        }
    }
}

/// Platform file name of the decoder bundle (`libdestring.so`,
/// `destring.dll`, ...).
pub fn default_bundle_name() -> String {
    format!(
        "{}destring{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bundle_is_unavailable() {
        let err = NativeDecoder::load(
            Path::new("/nonexistent/destring.so"),
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, FlipError::CapabilityUnavailable(_)));
    }

    #[test]
    fn bootstrap_timeout_is_fatal() {
        let err = NativeDecoder::load_with(
            Path::new("/slow/libdestring.so"),
            Duration::from_millis(50),
            || {
                thread::sleep(Duration::from_millis(500));
                Err("loader never became ready".to_string())
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlipError::CapabilityTimeout(50)));
    }

    #[test]
    fn bundle_name_matches_platform() {
        let name = default_bundle_name();
        assert!(name.contains("destring"));
    }
}
