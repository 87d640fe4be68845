//! Startup and shutdown sequencing
//!
//! Startup is strict: each step must succeed before the next runs, and the
//! first failure ends the run. Shutdown is best effort: every step runs and
//! failures are only logged.

use crate::config::Settings;
use crate::descriptor::{StreamDescriptor, describe_stream};
use crate::error::{BridgeError, Result};
use crate::forwarder::{Forwarder, SampleHandler};
use crate::outlet::OutletFactory;
use crate::session::HeadsetSession;
use common::ShutdownToken;
use headset::{DsiInterface, Headset, HeadsetInterface};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Idle timeout of the streaming loop (non-blocking pump)
pub const PUMP_TIMEOUT: Duration = Duration::ZERO;

/// Time given to the headset to flush samples and its stop alarm
pub const GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stream_name: String,
    pub source_id: String,
    pub channel_count: usize,
    pub samples_forwarded: u64,
}

/// Load the vendor library and report its version
pub fn load_interface(library: Option<&Path>) -> Result<DsiInterface> {
    let interface = DsiInterface::load(library).map_err(BridgeError::InterfaceLoad)?;
    info!("DSI API version {} loaded", interface.api_version());
    debug!("Using DSI library at {}", interface.path().display());
    Ok(interface)
}

/// Stream from the headset until shutdown is requested or streaming fails
///
/// Must run on a single thread; blocks until the run is over. The headset
/// handle is released before this returns on every path.
pub fn run<I: HeadsetInterface>(
    interface: &I,
    factory: &mut dyn OutletFactory,
    settings: &Settings,
    shutdown_token: &ShutdownToken,
) -> Result<RunSummary> {
    let mut session = HeadsetSession::new();

    // On failure the session drops here, which releases the handle
    let descriptor = start(&mut session, interface, factory, settings)?;

    let outcome = pump(&mut session, shutdown_token);
    if let Err(e) = &outcome {
        error!("Streaming stopped: {}", e);
    }

    let handler = shutdown(&mut session);
    let samples_forwarded = session.samples_dispatched();
    // The outlet goes away only after the handle is released, even when the
    // release step above was refused
    drop(session);
    drop(handler);

    info!(
        "Forwarded {} samples to outlet {}",
        samples_forwarded, descriptor.name
    );

    outcome.map(|()| RunSummary {
        stream_name: descriptor.name.clone(),
        source_id: descriptor.source_id.clone(),
        channel_count: descriptor.channel_count(),
        samples_forwarded,
    })
}

/// Bring the headset from nothing to acquiring
fn start<H: Headset, I: HeadsetInterface<Headset = H>>(
    session: &mut HeadsetSession<H>,
    interface: &I,
    factory: &mut dyn OutletFactory,
    settings: &Settings,
) -> Result<StreamDescriptor> {
    session.create(interface)?;
    session.register_diagnostics(settings.verbosity)?;

    match settings.port.as_deref() {
        Some(port) if !port.is_empty() => info!("Connecting to headset on {}", port),
        _ => info!("Connecting to headset on the default port (DSISerialPort)"),
    }
    session.connect(settings.port.as_deref())?;

    session.configure(settings.montage.as_deref(), settings.reference.as_deref())?;

    let info = session.info_string()?;
    info!("{}", info);

    info!("Initializing {} outlet", settings.stream_name);
    let descriptor = describe_stream(session, &settings.stream_name)?;
    let outlet = factory.create(&descriptor)?;

    let forwarder = Forwarder::new(outlet, descriptor.channel_count());
    session.register_sample_handler(Box::new(forwarder))?;

    info!("Starting data acquisition");
    session.start_acquisition()?;
    Ok(descriptor)
}

/// Pump the headset until shutdown is requested
fn pump<H: Headset>(session: &mut HeadsetSession<H>, shutdown_token: &ShutdownToken) -> Result<()> {
    info!("Streaming...");
    while !shutdown_token.is_requested() {
        session.idle(PUMP_TIMEOUT)?;
    }
    debug!("Shutdown requested, leaving streaming loop");
    Ok(())
}

/// Unregister, stop, drain, release; returns the handler for the caller to drop
fn shutdown<H: Headset>(session: &mut HeadsetSession<H>) -> Option<Box<dyn SampleHandler>> {
    info!("Stopping data acquisition");

    let handler = session.unregister_sample_handler().unwrap_or_else(|e| {
        warn!("{}", e);
        None
    });

    if let Err(e) = session.stop_acquisition() {
        warn!("{}", e);
    }

    if let Err(e) = session.idle(GRACE_PERIOD) {
        warn!("{}", e);
    }

    if let Err(e) = session.disconnect() {
        warn!("{}", e);
    }

    handler
}
