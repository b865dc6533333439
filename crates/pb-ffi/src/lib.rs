//! # pb-ffi
//!
//! C ABI for the pbuild policy build pipeline. The declarations for C
//! callers live in `include/pbuild.h`.
//!
//! Every call that returns a [`PbBuildResult`] hands ownership of the
//! record, and of every buffer it points to, to the caller. The caller
//! releases it with exactly one [`pb_free`]. The version record returned by
//! [`pb_get_version`] is static and must never be freed.
//!
//! ## Key invariants
//!
//! - **Exclusive result**: `result` is set iff the call returned 0, and
//!   `errors` is set iff it returned -1.
//! - **No unwinding across the boundary**: a panic inside a build becomes an
//!   error result.

use std::ffi::{CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use libc::{c_char, c_int};
use once_cell::sync::Lazy;
use pb_build::{BuildOutcome, BuildRequest, CompilationPipeline, VersionInfo};

/// Target used when the caller passes a null or empty target.
const DEFAULT_TARGET: &str = "rego";

/// Library version metadata. All strings are NUL-terminated UTF-8.
#[repr(C)]
#[derive(Debug)]
pub struct PbVersion {
    pub lib_version: *const c_char,
    pub toolchain_version: *const c_char,
    pub commit: *const c_char,
    pub platform: *const c_char,
}

/// Parameters of one build. Null strings mean "not given".
#[repr(C)]
#[derive(Debug)]
pub struct PbBuildParams {
    /// Path of the sources for `pb_build`; policy text for `pb_build_source`.
    pub source: *const c_char,
    pub target: *const c_char,
    pub capabilities_file: *const c_char,
    pub capabilities_version: *const c_char,
    pub bundle_mode: c_int,
    pub entrypoints: *const *const c_char,
    pub entrypoints_len: c_int,
    pub debug: c_int,
}

/// Outcome of one build, owned by the caller until `pb_free`.
#[repr(C)]
#[derive(Debug)]
pub struct PbBuildResult {
    pub result: *mut u8,
    pub result_len: c_int,
    pub errors: *mut c_char,
    pub log: *mut c_char,
}

struct VersionRecord {
    _strings: [CString; 4],
    raw: PbVersion,
}

// The raw pointers reference the CStrings owned by the same record, which
// are never mutated or dropped.
unsafe impl Send for VersionRecord {}
unsafe impl Sync for VersionRecord {}

static VERSION: Lazy<VersionRecord> = Lazy::new(|| {
    let info = VersionInfo::current();
    let strings = [
        c_string_lossy(&info.lib_version),
        c_string_lossy(&info.toolchain_version),
        c_string_lossy(&info.commit),
        c_string_lossy(&info.platform),
    ];
    let raw = PbVersion {
        lib_version: strings[0].as_ptr(),
        toolchain_version: strings[1].as_ptr(),
        commit: strings[2].as_ptr(),
        platform: strings[3].as_ptr(),
    };
    VersionRecord {
        _strings: strings,
        raw,
    }
});

/// Return the library version record. Never null, never freed.
#[no_mangle]
pub extern "C" fn pb_get_version() -> *const PbVersion {
    &VERSION.raw
}

/// Build a bundle from the path in `params.source`.
///
/// Returns 0 on success and -1 on failure. When `out` is non-null a result
/// record is always written to it, on failure carrying the error message.
///
/// # Safety
/// `params` must be null or point to a valid `PbBuildParams` whose string
/// fields are null or NUL-terminated, and whose `entrypoints` array holds at
/// least `entrypoints_len` pointers. `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn pb_build(params: *const PbBuildParams, out: *mut *mut PbBuildResult) -> c_int {
    run(params, out, SourceKind::Path)
}

/// Build a bundle from the policy text in `params.source`, compiled as a
/// single `policy.rego` module in bundle mode.
///
/// # Safety
/// Same contract as [`pb_build`].
#[no_mangle]
pub unsafe extern "C" fn pb_build_source(
    params: *const PbBuildParams,
    out: *mut *mut PbBuildResult,
) -> c_int {
    run(params, out, SourceKind::Text)
}

/// Release a result record and every buffer it owns. Null is a no-op.
///
/// # Safety
/// `result` must be null or a pointer written by `pb_build` or
/// `pb_build_source` that has not been freed. Freeing the same record twice
/// is undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn pb_free(result: *mut PbBuildResult) {
    if result.is_null() {
        return;
    }
    let record = Box::from_raw(result);
    if !record.result.is_null() {
        let len = usize::try_from(record.result_len).unwrap_or(0);
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(record.result, len)));
    }
    if !record.errors.is_null() {
        drop(CString::from_raw(record.errors));
    }
    if !record.log.is_null() {
        drop(CString::from_raw(record.log));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Path,
    Text,
}

unsafe fn run(params: *const PbBuildParams, out: *mut *mut PbBuildResult, kind: SourceKind) -> c_int {
    if out.is_null() {
        tracing::warn!("build called without a result pointer");
        return -1;
    }

    let outcome = match read_request(params, kind) {
        Ok(request) => {
            let built = panic::catch_unwind(AssertUnwindSafe(|| {
                CompilationPipeline::default().build(&request)
            }));
            match built {
                Ok(outcome) => Ok(outcome),
                Err(_) => Err("internal error: build panicked".to_string()),
            }
        }
        Err(message) => Err(message),
    };

    let (record, status) = match outcome {
        Ok(outcome) => into_record(outcome),
        Err(message) => (
            PbBuildResult {
                result: ptr::null_mut(),
                result_len: 0,
                errors: c_string_lossy(&message).into_raw(),
                log: ptr::null_mut(),
            },
            -1,
        ),
    };
    *out = Box::into_raw(Box::new(record));
    status
}

fn into_record(outcome: BuildOutcome) -> (PbBuildResult, c_int) {
    let log = outcome
        .log
        .as_deref()
        .map_or(ptr::null_mut(), |l| c_string_lossy(l).into_raw());

    let failure = |message: String| {
        (
            PbBuildResult {
                result: ptr::null_mut(),
                result_len: 0,
                errors: c_string_lossy(&message).into_raw(),
                log,
            },
            -1,
        )
    };

    match outcome.result {
        Ok(artifact) => {
            let Ok(len) = c_int::try_from(artifact.len()) else {
                return failure(format!(
                    "bundle of {} bytes exceeds the result size limit",
                    artifact.len()
                ));
            };
            let bytes = artifact.into_bytes().into_boxed_slice();
            let result = Box::into_raw(bytes) as *mut u8;
            (
                PbBuildResult {
                    result,
                    result_len: len,
                    errors: ptr::null_mut(),
                    log,
                },
                0,
            )
        }
        Err(e) => failure(e.to_string()),
    }
}

unsafe fn read_request(params: *const PbBuildParams, kind: SourceKind) -> Result<BuildRequest, String> {
    let params = params.as_ref().ok_or("params is null")?;

    let source = read_str(params.source, "source")?.ok_or("source is null")?;
    let target = read_str(params.target, "target")?
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());

    let mut request = match kind {
        SourceKind::Path => BuildRequest::new(source, target).bundle_mode(params.bundle_mode > 0),
        SourceKind::Text => BuildRequest::from_text(source, target).bundle_mode(true),
    };
    request.capabilities_file = read_str(params.capabilities_file, "capabilities_file")?.map(Into::into);
    request.capabilities_version = read_str(params.capabilities_version, "capabilities_version")?;
    request.entrypoints = read_entrypoints(params.entrypoints, params.entrypoints_len)?;
    request.debug = params.debug > 0;

    tracing::debug!(
        build_target = %request.target,
        entrypoints = request.entrypoints.len(),
        "native build request"
    );
    Ok(request)
}

unsafe fn read_str(ptr: *const c_char, field: &str) -> Result<Option<String>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|e| format!("{} is not valid UTF-8: {}", field, e))
}

unsafe fn read_entrypoints(ptr: *const *const c_char, len: c_int) -> Result<Vec<String>, String> {
    if ptr.is_null() || len <= 0 {
        return Ok(Vec::new());
    }
    let len = usize::try_from(len).map_err(|e| format!("entrypoints_len: {}", e))?;
    let mut out = Vec::with_capacity(len);
    for (i, &entry) in std::slice::from_raw_parts(ptr, len).iter().enumerate() {
        if let Some(ep) = read_str(entry, &format!("entrypoints[{}]", i))? {
            out.push(ep);
        }
    }
    Ok(out)
}

/// Interior NUL bytes cannot cross the boundary; they are dropped.
fn c_string_lossy(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_nul_is_dropped() {
        assert_eq!(c_string_lossy("a\0b").to_str().unwrap(), "ab");
    }

    #[test]
    fn null_entrypoint_array_is_empty() {
        let eps = unsafe { read_entrypoints(ptr::null(), 3) }.unwrap();
        assert!(eps.is_empty());
    }

    #[test]
    fn null_entries_are_skipped() {
        let a = CString::new("a/b").unwrap();
        let array = [a.as_ptr(), ptr::null()];
        let eps = unsafe { read_entrypoints(array.as_ptr(), 2) }.unwrap();
        assert_eq!(eps, vec!["a/b"]);
    }

    #[test]
    fn null_params_are_rejected() {
        let err = unsafe { read_request(ptr::null(), SourceKind::Path) }.unwrap_err();
        assert_eq!(err, "params is null");
    }
}
