//! Dynamic loading of the vendor DSI library
//!
//! The DSI API ships as a shared library (`libDSI-*`). Every function the
//! bridge needs is resolved once at load time; a library that lacks any of
//! them is rejected with the full list of missing names.

use crate::error::{DeviceError, DeviceResult};
use libloading::Library;
use std::fmt;
use std::ffi::{CStr, c_char, c_double, c_int, c_uint, c_void};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opaque `DSI_Headset` pointer
pub(crate) type RawHeadset = *mut c_void;

/// Opaque `DSI_Channel` pointer
pub(crate) type RawChannel = *mut c_void;

/// `DSI_MessageCallback`
pub(crate) type MessageCallback = unsafe extern "C" fn(*const c_char, c_int) -> c_int;

/// `DSI_SampleCallback`
pub(crate) type SampleCallback = unsafe extern "C" fn(RawHeadset, c_double, *mut c_void);

/// Platform-specific file name of the DSI library
pub fn default_library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "libDSI-Windows-x86_64.dll"
    } else if cfg!(target_os = "macos") {
        "libDSI-Darwin-x86_64.dylib"
    } else if cfg!(target_arch = "aarch64") {
        "libDSI-Linux-aarch64.so"
    } else {
        "libDSI-Linux-x86_64.so"
    }
}

/// Resolved DSI function table
///
/// The function pointers stay valid for as long as `_library` is alive,
/// which is the lifetime of this struct.
pub struct DsiApi {
    path: PathBuf,
    pub(crate) get_api_version: unsafe extern "C" fn() -> *const c_char,
    pub(crate) error: unsafe extern "C" fn() -> *const c_char,
    pub(crate) clear_error: unsafe extern "C" fn() -> *const c_char,
    pub(crate) headset_new: unsafe extern "C" fn(*const c_char) -> RawHeadset,
    pub(crate) headset_delete: unsafe extern "C" fn(RawHeadset),
    pub(crate) set_message_callback: unsafe extern "C" fn(RawHeadset, Option<MessageCallback>),
    pub(crate) set_verbosity: unsafe extern "C" fn(RawHeadset, c_int),
    pub(crate) connect: unsafe extern "C" fn(RawHeadset, *const c_char),
    pub(crate) choose_channels:
        unsafe extern "C" fn(RawHeadset, *const c_char, *const c_char, c_int),
    pub(crate) get_info_string: unsafe extern "C" fn(RawHeadset) -> *const c_char,
    pub(crate) set_sample_callback:
        unsafe extern "C" fn(RawHeadset, Option<SampleCallback>, *mut c_void),
    pub(crate) start_data_acquisition: unsafe extern "C" fn(RawHeadset),
    pub(crate) stop_data_acquisition: unsafe extern "C" fn(RawHeadset),
    pub(crate) idle: unsafe extern "C" fn(RawHeadset, c_double),
    pub(crate) get_number_of_channels: unsafe extern "C" fn(RawHeadset) -> c_uint,
    pub(crate) get_sampling_rate: unsafe extern "C" fn(RawHeadset) -> c_double,
    pub(crate) get_channel_by_index: unsafe extern "C" fn(RawHeadset, c_uint) -> RawChannel,
    pub(crate) channel_get_signal: unsafe extern "C" fn(RawChannel) -> c_double,
    pub(crate) channel_get_string: unsafe extern "C" fn(RawChannel) -> *const c_char,
    pub(crate) get_reference_string: unsafe extern "C" fn(RawHeadset) -> *const c_char,
    _library: Library,
}

/// Resolve one symbol, recording its name when absent
fn resolve<T: Copy>(library: &Library, name: &'static str, missing: &mut Vec<&'static str>) -> Option<T> {
    // SAFETY: the caller pairs every name with the C signature declared in DSI.h
    match unsafe { library.get::<T>(name.as_bytes()) } {
        Ok(symbol) => Some(*symbol),
        Err(e) => {
            debug!("Unresolved DSI symbol {}: {}", name, e);
            missing.push(name);
            None
        }
    }
}

macro_rules! load_table {
    ($library:ident, $path:ident; $($field:ident = $name:literal),+ $(,)?) => {{
        let mut missing = Vec::new();
        $( let $field = resolve(&$library, $name, &mut missing); )+
        if !missing.is_empty() {
            return Err(DeviceError::MissingSymbols { path: $path, missing });
        }
        let unresolved = |name: &'static str| DeviceError::MissingSymbols {
            path: $path.clone(),
            missing: vec![name],
        };
        DsiApi {
            $( $field: $field.ok_or_else(|| unresolved($name))?, )+
            path: $path.clone(),
            _library: $library,
        }
    }};
}

impl fmt::Debug for DsiApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsiApi")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DsiApi {
    /// Load the DSI library from `path`, or from the platform default name
    pub fn load(path: Option<&Path>) -> DeviceResult<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(default_library_name()));

        // SAFETY: loading runs the library's initialisers; libDSI has none
        // beyond static data setup.
        let library = unsafe { Library::new(&path) }.map_err(|source| DeviceError::LibraryLoad {
            path: path.clone(),
            source,
        })?;

        let api = load_table!(library, path;
            get_api_version = "DSI_GetAPIVersion",
            error = "DSI_Error",
            clear_error = "DSI_ClearError",
            headset_new = "DSI_Headset_New",
            headset_delete = "DSI_Headset_Delete",
            set_message_callback = "DSI_Headset_SetMessageCallback",
            set_verbosity = "DSI_Headset_SetVerbosity",
            connect = "DSI_Headset_Connect",
            choose_channels = "DSI_Headset_ChooseChannels",
            get_info_string = "DSI_Headset_GetInfoString",
            set_sample_callback = "DSI_Headset_SetSampleCallback",
            start_data_acquisition = "DSI_Headset_StartDataAcquisition",
            stop_data_acquisition = "DSI_Headset_StopDataAcquisition",
            idle = "DSI_Headset_Idle",
            get_number_of_channels = "DSI_Headset_GetNumberOfChannels",
            get_sampling_rate = "DSI_Headset_GetSamplingRate",
            get_channel_by_index = "DSI_Headset_GetChannelByIndex",
            channel_get_signal = "DSI_Channel_GetSignal",
            channel_get_string = "DSI_Channel_GetString",
            get_reference_string = "DSI_Headset_GetReferenceString",
        );

        debug!("Resolved DSI function table from {}", api.path.display());
        Ok(api)
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version string reported by the loaded library
    pub fn version(&self) -> String {
        // SAFETY: DSI_GetAPIVersion returns a static string or null
        unsafe { string_from_ptr((self.get_api_version)()) }.unwrap_or_default()
    }

    /// Check and clear the library's error indicator
    ///
    /// Must be called after every device call; the indicator is global to
    /// the library and stays raised until cleared.
    pub(crate) fn check(&self) -> DeviceResult<()> {
        // SAFETY: both functions take no arguments and return a static
        // string or null
        unsafe {
            if (self.error)().is_null() {
                return Ok(());
            }
            Err(DeviceError::Api {
                message: string_from_ptr((self.clear_error)()),
            })
        }
    }
}

/// Copy a C string owned by the library into a Rust string
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn string_from_ptr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: guaranteed by the caller
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}
