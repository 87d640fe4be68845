//! Integration tests for the full acquisition lifecycle
//!
//! Runs the bridge against the scripted headset and a recording outlet, and
//! checks the device-call order for startup, streaming and shutdown.

use bridge::config::Settings;
use bridge::lifecycle::{GRACE_PERIOD, PUMP_TIMEOUT, run};
use bridge::test_utils::RecordingOutletFactory;
use bridge::{BridgeError, OutletError};
use common::ShutdownToken;
use headset::test_utils::{DeviceCall, HeadsetScript, ScriptedInterface, scripted_signal};
use std::cell::Cell;
use std::rc::Rc;

/// Script that requests shutdown after `pumps` idle calls
fn stop_after(script: HeadsetScript, token: &ShutdownToken, pumps: u64) -> HeadsetScript {
    let token = token.clone();
    script.on_idle(move |count| {
        if count >= pumps {
            token.request();
        }
    })
}

fn montage_settings(montage: &str, reference: &str) -> Settings {
    Settings {
        montage: Some(montage.to_string()),
        reference: Some(reference.to_string()),
        ..Settings::default()
    }
}

// ============================================================================
// Startup
// ============================================================================

mod startup {
    use super::*;

    #[test]
    fn test_startup_call_order() {
        let token = ShutdownToken::new();
        token.request();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new();

        let settings = Settings {
            port: Some("COM4".to_string()),
            verbosity: 3,
            ..montage_settings("Cz", "Pz")
        };
        run(&interface, &mut factory, &settings, &token).unwrap();

        let calls = interface.calls();
        assert_eq!(
            &calls[..7],
            &[
                DeviceCall::Create,
                DeviceCall::SetMessageCallback,
                DeviceCall::SetVerbosity(3),
                DeviceCall::Connect(Some("COM4".to_string())),
                DeviceCall::ChooseChannels {
                    montage: Some("Cz".to_string()),
                    reference: Some("Pz".to_string()),
                },
                DeviceCall::InfoString,
                DeviceCall::ChannelCount,
            ]
        );

        let enable = calls
            .iter()
            .position(|c| *c == DeviceCall::SetSampleCallback(true))
            .unwrap();
        let start = calls
            .iter()
            .position(|c| *c == DeviceCall::StartAcquisition)
            .unwrap();
        let reference = calls
            .iter()
            .position(|c| *c == DeviceCall::ReferenceLabel)
            .unwrap();
        assert!(reference < enable);
        assert!(enable < start);
    }

    #[test]
    fn test_absent_port_defers_to_device() {
        let token = ShutdownToken::new();
        token.request();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new();

        run(&interface, &mut factory, &Settings::default(), &token).unwrap();

        assert!(interface.calls().contains(&DeviceCall::Connect(None)));
    }

    #[test]
    fn test_empty_port_is_passed_through() {
        let token = ShutdownToken::new();
        token.request();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new();
        let settings = Settings {
            port: Some(String::new()),
            ..Settings::default()
        };

        run(&interface, &mut factory, &settings, &token).unwrap();

        assert!(
            interface
                .calls()
                .contains(&DeviceCall::Connect(Some(String::new())))
        );
    }

    #[test]
    fn test_montage_selects_channel_count() {
        let token = ShutdownToken::new();
        token.request();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new();

        let summary = run(
            &interface,
            &mut factory,
            &montage_settings("P3,P4,Cz", "Pz"),
            &token,
        )
        .unwrap();

        assert_eq!(summary.channel_count, 3);
        let descriptors = factory.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].channel_count(), 3);
        assert_eq!(
            descriptors[0].labels().collect::<Vec<_>>(),
            vec!["P3", "P4", "Cz"]
        );
        assert_eq!(descriptors[0].reference, "Pz");
    }

    #[test]
    fn test_descriptor_metadata() {
        let token = ShutdownToken::new();
        token.request();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new();
        let settings = Settings {
            stream_name: "Lab-A".to_string(),
            ..montage_settings("C3,C4", "A1")
        };

        let summary = run(&interface, &mut factory, &settings, &token).unwrap();

        let descriptors = factory.descriptors();
        let descriptor = &descriptors[0];
        assert_eq!(descriptor.name, "Lab-A");
        assert_eq!(descriptor.content_type, "EEG");
        assert_eq!(descriptor.sampling_rate, 300.0);
        assert_eq!(descriptor.manufacturer, "WearableSensing");
        assert_eq!(descriptor.max_buffered, 360);
        assert_eq!(descriptor.source_id.len(), 16);
        assert_eq!(summary.source_id, descriptor.source_id);
        for channel in &descriptor.channels {
            assert_eq!(channel.unit, "microvolts");
            assert_eq!(channel.kind, "EEG");
        }
    }
}

// ============================================================================
// Fail-fast startup
// ============================================================================

mod startup_failures {
    use super::*;

    fn assert_fails_fast(call: &'static str, last_call: DeviceCall) {
        let token = ShutdownToken::new();
        let interface = ScriptedInterface::new(
            HeadsetScript::default().failing(call, "simulated device failure"),
        );
        let mut factory = RecordingOutletFactory::new();

        let err = run(&interface, &mut factory, &Settings::default(), &token).unwrap_err();
        assert!(matches!(err, BridgeError::Device { .. }), "{:?}", err);
        assert!(err.to_string().contains("simulated device failure"));
        assert_eq!(err.exit_code(), 1);

        let calls = interface.calls();
        let failed_at = calls.iter().position(|c| *c == last_call).unwrap();
        // Only the guaranteed release may follow the failing call
        assert_eq!(&calls[failed_at + 1..], &[DeviceCall::Release]);
    }

    #[test]
    fn test_connect_failure() {
        assert_fails_fast("connect", DeviceCall::Connect(None));
    }

    #[test]
    fn test_verbosity_failure() {
        assert_fails_fast("set_verbosity", DeviceCall::SetVerbosity(2));
    }

    #[test]
    fn test_choose_channels_failure() {
        assert_fails_fast(
            "choose_channels",
            DeviceCall::ChooseChannels {
                montage: None,
                reference: None,
            },
        );
    }

    #[test]
    fn test_info_string_failure() {
        assert_fails_fast("info_string", DeviceCall::InfoString);
    }

    #[test]
    fn test_start_acquisition_failure() {
        assert_fails_fast("start_acquisition", DeviceCall::StartAcquisition);
    }

    #[test]
    fn test_unknown_sensor_in_montage() {
        let token = ShutdownToken::new();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new();

        let err = run(
            &interface,
            &mut factory,
            &montage_settings("P3,Q9", "Pz"),
            &token,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Q9"));
        assert_eq!(interface.calls().last(), Some(&DeviceCall::Release));
    }

    #[test]
    fn test_outlet_creation_failure() {
        let token = ShutdownToken::new();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::failing("no network interface");

        let err = run(&interface, &mut factory, &Settings::default(), &token).unwrap_err();

        assert!(matches!(err, BridgeError::Outlet(OutletError::Create(_))));
        let calls = interface.calls();
        assert!(!calls.contains(&DeviceCall::SetSampleCallback(true)));
        assert!(!calls.contains(&DeviceCall::StartAcquisition));
        assert_eq!(calls.last(), Some(&DeviceCall::Release));
    }
}

// ============================================================================
// Streaming and shutdown
// ============================================================================

mod streaming {
    use super::*;

    #[test]
    fn test_samples_are_forwarded_in_order() {
        let token = ShutdownToken::new();
        let script = stop_after(HeadsetScript::default(), &token, 5);
        let interface = ScriptedInterface::new(script);
        let mut factory = RecordingOutletFactory::new();

        let summary = run(
            &interface,
            &mut factory,
            &montage_settings("P3,P4,Cz", "Pz"),
            &token,
        )
        .unwrap();

        let samples = factory.samples();
        let samples = samples.borrow();
        assert_eq!(samples.len(), 5);
        assert_eq!(summary.samples_forwarded, 5);
        for (k, sample) in samples.iter().enumerate() {
            assert_eq!(sample.len(), 3);
            for (channel, value) in sample.iter().enumerate() {
                assert_eq!(*value, scripted_signal(k as u64, channel) as f32);
            }
        }
    }

    #[test]
    fn test_signal_shutdown_order() {
        let token = ShutdownToken::new();
        let script = stop_after(HeadsetScript::default(), &token, 3);
        let interface = ScriptedInterface::new(script);
        let mut factory = RecordingOutletFactory::new();

        run(&interface, &mut factory, &Settings::default(), &token).unwrap();

        let calls = interface.calls();
        let pumps = calls
            .iter()
            .filter(|c| **c == DeviceCall::Idle(PUMP_TIMEOUT))
            .count();
        assert_eq!(pumps, 3);
        assert_eq!(
            &calls[calls.len() - 4..],
            &[
                DeviceCall::SetSampleCallback(false),
                DeviceCall::StopAcquisition,
                DeviceCall::Idle(GRACE_PERIOD),
                DeviceCall::Release,
            ]
        );
    }

    #[test]
    fn test_outlet_outlives_device_handle() {
        let token = ShutdownToken::new();
        let script = stop_after(HeadsetScript::default(), &token, 1);
        let interface = ScriptedInterface::new(script);

        let released_first = Rc::new(Cell::new(false));
        let log = interface.log();
        let seen = Rc::clone(&released_first);
        let mut factory = RecordingOutletFactory::new().on_outlet_drop(move || {
            seen.set(log.borrow().last() == Some(&DeviceCall::Release));
        });

        run(&interface, &mut factory, &Settings::default(), &token).unwrap();

        assert!(released_first.get());
    }

    #[test]
    fn test_push_failure_triggers_shutdown() {
        let token = ShutdownToken::new();
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let mut factory = RecordingOutletFactory::new().with_push_limit(2);

        let err = run(&interface, &mut factory, &Settings::default(), &token).unwrap_err();

        assert!(matches!(err, BridgeError::Outlet(OutletError::Push(_))));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(factory.samples().borrow().len(), 2);

        let calls = interface.calls();
        assert_eq!(
            &calls[calls.len() - 4..],
            &[
                DeviceCall::SetSampleCallback(false),
                DeviceCall::StopAcquisition,
                DeviceCall::Idle(GRACE_PERIOD),
                DeviceCall::Release,
            ]
        );
    }

    #[test]
    fn test_idle_failure_still_shuts_down() {
        let token = ShutdownToken::new();
        let interface =
            ScriptedInterface::new(HeadsetScript::default().failing("idle", "link lost"));
        let mut factory = RecordingOutletFactory::new();

        let err = run(&interface, &mut factory, &Settings::default(), &token).unwrap_err();

        assert_eq!(err.to_string(), "idle failed: link lost");
        let calls = interface.calls();
        assert!(calls.contains(&DeviceCall::StopAcquisition));
        assert_eq!(calls.last(), Some(&DeviceCall::Release));
    }
}
