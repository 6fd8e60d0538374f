//! Conversion between runtime records and native SDK descriptors
//!
//! Reads are defensive: a missing or wrongly typed field becomes an absent
//! native field, never an error. Whether a field is required is the
//! validator's business, not ours. Only host failures propagate.
//!
//! String fields are copied into buffers owned by the Rust side
//! ([`CString`]). The native view ([`RawSource`]) borrows from its owner, so
//! the borrow checker keeps the buffers alive for as long as the SDK may
//! read them.

use crate::embedding::{Embedding, ValueKind};
use crate::error::Result;
use std::ffi::{c_char, CStr, CString};
use std::marker::PhantomData;
use std::ptr;

/// Property names of a source record
pub const NAME_FIELD: &str = "name";
pub const URL_ADDRESS_FIELD: &str = "urlAddress";

/// A discovered or requested source, owning its strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NativeSource {
    name: Option<CString>,
    url_address: Option<CString>,
}

/// C layout of the SDK's source descriptor
///
/// Pointers are null when the field is absent and otherwise borrow from
/// the [`NativeSource`] the view was taken from.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSource<'a> {
    pub p_ndi_name: *const c_char,
    pub p_url_address: *const c_char,
    _owner: PhantomData<&'a NativeSource>,
}

impl RawSource<'static> {
    /// Descriptor with both fields null
    pub const fn empty() -> Self {
        Self {
            p_ndi_name: ptr::null(),
            p_url_address: ptr::null(),
            _owner: PhantomData,
        }
    }
}

fn as_ptr(field: &Option<CString>) -> *const c_char {
    field.as_deref().map_or(ptr::null(), CStr::as_ptr)
}

/// Cut at the first NUL, which is where a C reader would stop
fn cstring_from_str(text: &str) -> CString {
    let bytes = text.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    // No NUL left in bytes[..end]
    CString::new(&bytes[..end]).unwrap_or_default()
}

impl NativeSource {
    pub fn new(name: Option<&str>, url_address: Option<&str>) -> Self {
        Self {
            name: name.map(cstring_from_str),
            url_address: url_address.map(cstring_from_str),
        }
    }

    pub fn name(&self) -> Option<&CStr> {
        self.name.as_deref()
    }

    pub fn url_address(&self) -> Option<&CStr> {
        self.url_address.as_deref()
    }

    /// Borrowed C view for passing to the SDK
    pub fn as_raw(&self) -> RawSource<'_> {
        RawSource {
            p_ndi_name: as_ptr(&self.name),
            p_url_address: as_ptr(&self.url_address),
            _owner: PhantomData,
        }
    }

    /// Copy an SDK-owned descriptor
    ///
    /// # Safety
    ///
    /// Each non-null pointer in `raw` must point to a NUL terminated string
    /// that stays valid for the duration of the call.
    pub unsafe fn from_raw(raw: &RawSource<'_>) -> Self {
        let copy = |p: *const c_char| {
            if p.is_null() {
                None
            } else {
                // SAFETY: non-null and NUL terminated per the contract above
                Some(unsafe { CStr::from_ptr(p) }.to_owned())
            }
        };
        Self {
            name: copy(raw.p_ndi_name),
            url_address: copy(raw.p_url_address),
        }
    }
}

/// Copy a string value into an owned buffer of exactly `len + 1` bytes
///
/// Returns `None` for non-string values.
pub fn read_string<E: Embedding>(env: &E, value: E::Value) -> Result<Option<CString>> {
    if env.type_of(value)? != ValueKind::String {
        return Ok(None);
    }
    let len = env.string_utf8_len(value)?;
    let mut buf = vec![0u8; len + 1];
    let written = env.copy_string_utf8(value, &mut buf)?;
    buf.truncate(written.min(len) + 1);
    // The host always terminates; cut at the first NUL like a C reader
    let text = CStr::from_bytes_until_nul(&buf)
        .map(CStr::to_owned)
        .unwrap_or_default();
    Ok(Some(text))
}

/// Build a native source from a runtime record `{ name, urlAddress }`
pub fn make_native_source<E: Embedding>(env: &E, record: E::Value) -> Result<NativeSource> {
    let name = env.named_property(record, NAME_FIELD)?;
    let url = env.named_property(record, URL_ADDRESS_FIELD)?;

    Ok(NativeSource {
        name: read_string(env, name)?,
        url_address: read_string(env, url)?,
    })
}

/// Build a runtime record from a native source, omitting absent fields
pub fn source_to_record<E: Embedding>(env: &E, source: &NativeSource) -> Result<E::Value> {
    let record = env.create_object()?;
    if let Some(name) = source.name() {
        let value = env.create_string(&name.to_string_lossy())?;
        env.set_named_property(record, NAME_FIELD, value)?;
    }
    if let Some(url) = source.url_address() {
        let value = env.create_string(&url.to_string_lossy())?;
        env.set_named_property(record, URL_ADDRESS_FIELD, value)?;
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalRuntime, Primitive};

    #[test]
    fn test_full_record() {
        let rt = LocalRuntime::new();
        let name = rt.string("Cam1");
        let url = rt.string("192.0.2.4:5961");
        let record = rt.object(&[("name", name), ("urlAddress", url)]);

        let source = make_native_source(&rt, record).unwrap();
        assert_eq!(source.name().unwrap().to_bytes(), b"Cam1");
        assert_eq!(source.url_address().unwrap().to_bytes(), b"192.0.2.4:5961");

        let raw = source.as_raw();
        let name = unsafe { CStr::from_ptr(raw.p_ndi_name) };
        let url = unsafe { CStr::from_ptr(raw.p_url_address) };
        assert_eq!(name.to_bytes(), b"Cam1");
        assert_eq!(url.to_bytes(), b"192.0.2.4:5961");
    }

    #[test]
    fn test_absent_url_is_null() {
        let rt = LocalRuntime::new();
        let name = rt.string("Cam1");
        let record = rt.object(&[("name", name)]);

        let source = make_native_source(&rt, record).unwrap();
        let raw = source.as_raw();
        assert!(!raw.p_ndi_name.is_null());
        assert!(raw.p_url_address.is_null());
    }

    #[test]
    fn test_wrong_typed_field_reads_as_absent() {
        let rt = LocalRuntime::new();
        let name = rt.number(7.0);
        let url = rt.string("10.0.0.1:5960");
        let record = rt.object(&[("name", name), ("urlAddress", url)]);

        let source = make_native_source(&rt, record).unwrap();
        assert_eq!(source.name(), None);
        assert!(source.url_address().is_some());
    }

    #[test]
    fn test_interior_nul_truncates() {
        let rt = LocalRuntime::new();
        let value = rt.string("Cam\01");
        let copied = read_string(&rt, value).unwrap().unwrap();
        assert_eq!(copied.to_bytes(), b"Cam");
    }

    #[test]
    fn test_host_failure_propagates() {
        let rt = LocalRuntime::new();
        let record = rt.object(&[]);
        rt.fail_next(Primitive::NamedProperty, 2);
        let err = make_native_source(&rt, record).unwrap_err();
        assert_eq!(err.status().map(|s| s.code()), Some(2));
    }

    #[test]
    fn test_source_to_record_omits_absent_fields() {
        let rt = LocalRuntime::new();
        let source = NativeSource::new(Some("Studio A"), None);
        let record = source_to_record(&rt, &source).unwrap();

        assert_eq!(rt.property_string(record, "name").as_deref(), Some("Studio A"));
        assert!(!rt.has_property(record, "urlAddress"));
    }

    #[test]
    fn test_from_raw_copies() {
        let owner = NativeSource::new(Some("Cam2"), Some("198.51.100.7:5961"));
        let copy = unsafe { NativeSource::from_raw(&owner.as_raw()) };
        assert_eq!(copy, owner);

        let empty = unsafe { NativeSource::from_raw(&RawSource::empty()) };
        assert_eq!(empty, NativeSource::default());
    }
}
