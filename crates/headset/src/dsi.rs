//! DSI headset backed by the vendor library
//!
//! Wraps a `DSI_Headset` pointer and turns the library's global error
//! indicator into a `DeviceResult` on every call.

use crate::api::{DsiApi, RawHeadset, string_from_ptr};
use crate::error::{DeviceError, DeviceResult};
use crate::types::SampleFrame;
use crate::{Headset, HeadsetInterface};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{CString, c_char, c_double, c_int, c_uint, c_void};
use std::path::Path;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Loaded DSI library, able to create headsets
#[derive(Clone, Debug)]
pub struct DsiInterface {
    api: Arc<DsiApi>,
}

impl DsiInterface {
    /// Load the DSI library (see [`DsiApi::load`])
    pub fn load(path: Option<&Path>) -> DeviceResult<Self> {
        let api = DsiApi::load(path)?;
        Ok(Self { api: Arc::new(api) })
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        self.api.path()
    }
}

impl HeadsetInterface for DsiInterface {
    type Headset = DsiHeadset;

    fn api_version(&self) -> String {
        self.api.version()
    }

    fn create_headset(&self) -> DeviceResult<DsiHeadset> {
        // A null port defers the serial connection until `connect`
        // SAFETY: DSI_Headset_New accepts a null port
        let raw = unsafe { (self.api.headset_new)(ptr::null()) };
        let raw = adopt_handle(raw, self.api.check(), |raw| {
            // SAFETY: the handle was just created and never shared
            unsafe { (self.api.headset_delete)(raw) };
            if let Err(e) = self.api.check() {
                warn!("Error deleting rejected DSI headset: {}", e);
            }
        })?;

        Ok(DsiHeadset {
            api: Arc::clone(&self.api),
            raw,
            pending: Box::new(PendingSamples {
                api: Arc::clone(&self.api),
                queue: RefCell::new(SampleQueue::default()),
            }),
        })
    }
}

/// Keep a freshly created handle only if creation reported no error
///
/// A non-null handle returned alongside an error is handed to `delete`.
fn adopt_handle(
    raw: RawHeadset,
    status: DeviceResult<()>,
    delete: impl FnOnce(RawHeadset),
) -> DeviceResult<RawHeadset> {
    if let Err(e) = status {
        if !raw.is_null() {
            delete(raw);
        }
        return Err(e);
    }
    if raw.is_null() {
        return Err(DeviceError::NullHandle("headset"));
    }
    Ok(raw)
}

/// Spare signal buffers kept for reuse between pumps
const MAX_SPARE_BUFFERS: usize = 64;

/// Frames captured during one `DSI_Headset_Idle`, waiting for dispatch
///
/// Signal buffers are recycled once dispatched, so steady-state capture
/// does not allocate.
#[derive(Debug, Default)]
struct SampleQueue {
    frames: VecDeque<(f64, Vec<f64>)>,
    spare: Vec<Vec<f64>>,
}

impl SampleQueue {
    /// Queue one frame, reading `count` channel values through `read`
    fn capture(&mut self, packet_offset: f64, count: usize, read: impl FnMut(usize) -> f64) {
        let mut signals = self.spare.pop().unwrap_or_default();
        signals.clear();
        signals.extend((0..count).map(read));
        self.frames.push_back((packet_offset, signals));
    }

    /// Hand every queued frame to `on_sample` in arrival order
    fn drain(&mut self, on_sample: &mut dyn FnMut(&SampleFrame<'_>)) -> usize {
        let mut delivered = 0;
        while let Some((offset, signals)) = self.frames.pop_front() {
            on_sample(&SampleFrame::new(offset, &signals));
            self.recycle(signals);
            delivered += 1;
        }
        delivered
    }

    /// Drop queued frames without dispatching them
    fn clear(&mut self) {
        while let Some((_, signals)) = self.frames.pop_front() {
            self.recycle(signals);
        }
    }

    fn len(&self) -> usize {
        self.frames.len()
    }

    fn recycle(&mut self, signals: Vec<f64>) {
        if self.spare.len() < MAX_SPARE_BUFFERS {
            self.spare.push(signals);
        }
    }
}

/// Sample queue plus the table the library callback reads signals through
struct PendingSamples {
    api: Arc<DsiApi>,
    queue: RefCell<SampleQueue>,
}

/// Headset handle owned by the session
///
/// Released explicitly through [`Headset::release`], or on drop.
pub struct DsiHeadset {
    api: Arc<DsiApi>,
    raw: RawHeadset,
    // Boxed so the pointer handed to the library stays put
    pending: Box<PendingSamples>,
}

impl DsiHeadset {
    fn handle(&self) -> DeviceResult<RawHeadset> {
        if self.raw.is_null() {
            Err(DeviceError::Released)
        } else {
            Ok(self.raw)
        }
    }

    fn read_string(
        &self,
        read: impl FnOnce(RawHeadset) -> *const c_char,
    ) -> DeviceResult<String> {
        let raw = self.handle()?;
        let ptr = read(raw);
        self.api.check()?;
        // SAFETY: strings returned by the library stay valid until the next
        // call on the same headset
        Ok(unsafe { string_from_ptr(ptr) }.unwrap_or_default())
    }
}

fn optional_cstring(value: Option<&str>) -> DeviceResult<Option<CString>> {
    value
        .map(|v| CString::new(v).map_err(|_| DeviceError::InvalidArgument(v.to_string())))
        .transpose()
}

fn as_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |v| v.as_ptr())
}

impl Headset for DsiHeadset {
    fn set_message_callback(&mut self) -> DeviceResult<()> {
        let raw = self.handle()?;
        // SAFETY: `on_message` matches DSI_MessageCallback and lives forever
        unsafe { (self.api.set_message_callback)(raw, Some(on_message)) };
        self.api.check()
    }

    fn set_verbosity(&mut self, level: i32) -> DeviceResult<()> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer
        unsafe { (self.api.set_verbosity)(raw, level as c_int) };
        self.api.check()
    }

    fn connect(&mut self, port: Option<&str>) -> DeviceResult<()> {
        let raw = self.handle()?;
        let port = optional_cstring(port)?;
        // SAFETY: null or empty port makes the library fall back to the
        // DSISerialPort environment variable
        unsafe { (self.api.connect)(raw, as_ptr(&port)) };
        self.api.check()
    }

    fn choose_channels(
        &mut self,
        montage: Option<&str>,
        reference: Option<&str>,
    ) -> DeviceResult<()> {
        let raw = self.handle()?;
        let montage = optional_cstring(montage)?;
        let reference = optional_cstring(reference)?;
        // SAFETY: both strings may be null to select the device defaults;
        // autoswap is enabled
        unsafe { (self.api.choose_channels)(raw, as_ptr(&montage), as_ptr(&reference), 1) };
        self.api.check()
    }

    fn info_string(&self) -> DeviceResult<String> {
        // SAFETY: valid headset pointer
        self.read_string(|raw| unsafe { (self.api.get_info_string)(raw) })
    }

    fn channel_count(&self) -> DeviceResult<usize> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer
        let count = unsafe { (self.api.get_number_of_channels)(raw) };
        self.api.check()?;
        Ok(count as usize)
    }

    fn sampling_rate(&self) -> DeviceResult<f64> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer
        let rate = unsafe { (self.api.get_sampling_rate)(raw) };
        self.api.check()?;
        Ok(rate)
    }

    fn channel_label(&self, index: usize) -> DeviceResult<String> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer; out-of-range indices raise the
        // library error indicator
        let channel = unsafe { (self.api.get_channel_by_index)(raw, index as c_uint) };
        self.api.check()?;
        if channel.is_null() {
            return Err(DeviceError::NullHandle("channel"));
        }
        // SAFETY: channel pointer checked above
        let label = unsafe { (self.api.channel_get_string)(channel) };
        self.api.check()?;
        // SAFETY: string owned by the channel
        Ok(unsafe { string_from_ptr(label) }.unwrap_or_default())
    }

    fn reference_label(&self) -> DeviceResult<String> {
        // SAFETY: valid headset pointer
        self.read_string(|raw| unsafe { (self.api.get_reference_string)(raw) })
    }

    fn set_sample_callback(&mut self, enabled: bool) -> DeviceResult<()> {
        let raw = self.handle()?;
        if enabled {
            let user_data = &*self.pending as *const PendingSamples as *mut c_void;
            // SAFETY: `pending` is boxed and outlives the registration; it is
            // unregistered in `release`
            unsafe { (self.api.set_sample_callback)(raw, Some(on_sample), user_data) };
        } else {
            // SAFETY: unregistering is always valid
            unsafe { (self.api.set_sample_callback)(raw, None, ptr::null_mut()) };
            self.pending.queue.borrow_mut().clear();
        }
        self.api.check()
    }

    fn start_acquisition(&mut self) -> DeviceResult<()> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer
        unsafe { (self.api.start_data_acquisition)(raw) };
        self.api.check()
    }

    fn stop_acquisition(&mut self) -> DeviceResult<()> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer
        unsafe { (self.api.stop_data_acquisition)(raw) };
        self.api.check()
    }

    fn idle(
        &mut self,
        timeout: Duration,
        on_sample: &mut dyn FnMut(&SampleFrame<'_>),
    ) -> DeviceResult<()> {
        let raw = self.handle()?;
        // SAFETY: valid headset pointer; `on_sample` may run re-entrantly
        // inside this call and only touches `pending`
        unsafe { (self.api.idle)(raw, timeout.as_secs_f64()) };
        let result = self.api.check();

        // The library is out of its idle call, so nothing captures while
        // the queue is borrowed here
        let delivered = self.pending.queue.borrow_mut().drain(on_sample);
        trace!("Dispatched {} samples", delivered);

        result
    }

    fn release(&mut self) -> DeviceResult<()> {
        let raw = self.handle()?;
        self.raw = ptr::null_mut();
        // SAFETY: the pointer is nulled first so it is deleted exactly once
        unsafe {
            (self.api.set_sample_callback)(raw, None, ptr::null_mut());
            (self.api.headset_delete)(raw);
        }
        self.pending.queue.borrow_mut().clear();
        debug!("DSI headset released");
        self.api.check()
    }
}

impl Drop for DsiHeadset {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        warn!("DSI headset dropped without explicit release, releasing now");
        if let Err(e) = self.release() {
            error!("Error releasing DSI headset: {}", e);
        }
    }
}

/// Routes library diagnostics into the log
unsafe extern "C" fn on_message(msg: *const c_char, level: c_int) -> c_int {
    // SAFETY: the library passes a NUL-terminated message
    let text = unsafe { string_from_ptr(msg) }.unwrap_or_default();
    info!(target: "dsi", "DSI Message (level {}): {}", level, text);
    1
}

/// Captures one sample while the library is inside `DSI_Headset_Idle`
unsafe extern "C" fn on_sample(headset: RawHeadset, packet_offset: c_double, user_data: *mut c_void) {
    if user_data.is_null() || headset.is_null() {
        return;
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        // SAFETY: user_data is the boxed PendingSamples registered in
        // `set_sample_callback`
        let pending = unsafe { &*(user_data as *const PendingSamples) };
        let api = &pending.api;

        // SAFETY: the headset pointer comes from the library itself
        let count = unsafe { (api.get_number_of_channels)(headset) } as usize;
        let mut queue = pending.queue.borrow_mut();
        queue.capture(packet_offset, count, |index| {
            // SAFETY: index is below the library's own channel count
            unsafe {
                let channel = (api.get_channel_by_index)(headset, index as c_uint);
                if channel.is_null() {
                    f64::NAN
                } else {
                    (api.channel_get_signal)(channel)
                }
            }
        });
        trace!("Captured sample with {} channels, {} queued", count, queue.len());
    }));

    if let Err(e) = result {
        error!("Panic in DSI sample callback: {:?}", e);
    }
}
