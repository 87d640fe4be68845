//! Integration tests for the device layer's public contract
//!
//! Drives headsets only through the `HeadsetInterface`/`Headset` traits, the
//! way the bridge does.

use headset::test_utils::{DeviceCall, HeadsetScript, ScriptedInterface, scripted_signal};
use headset::{DeviceError, DsiInterface, Headset, HeadsetInterface};
use std::path::Path;
use std::time::Duration;

/// Connect, configure and read back the raw channel labels
fn connect_and_list<I: HeadsetInterface>(
    interface: &I,
    montage: Option<&str>,
) -> Result<Vec<String>, DeviceError> {
    let mut headset = interface.create_headset()?;
    headset.set_message_callback()?;
    headset.set_verbosity(2)?;
    headset.connect(None)?;
    headset.choose_channels(montage, None)?;

    let count = headset.channel_count()?;
    let labels = (0..count)
        .map(|index| headset.channel_label(index))
        .collect::<Result<Vec<_>, _>>()?;
    headset.release()?;
    Ok(labels)
}

// ============================================================================
// Library loading
// ============================================================================

mod library_loading {
    use super::*;

    #[test]
    fn test_missing_library_reports_path() {
        let path = Path::new("/nonexistent/dsi/libDSI-Linux-x86_64.so");
        let err = match DsiInterface::load(Some(path)) {
            Err(e) => e,
            Ok(_) => panic!("Expected library load error"),
        };

        assert!(matches!(err, DeviceError::LibraryLoad { .. }));
        assert_eq!(err.missing_symbol_count(), 0);
        assert!(err.to_string().contains("/nonexistent/dsi/libDSI-Linux-x86_64.so"));
    }

    #[test]
    fn test_missing_symbols_display() {
        let err = DeviceError::MissingSymbols {
            path: "libDSI-Linux-x86_64.so".into(),
            missing: vec!["DSI_Headset_Idle", "DSI_Channel_GetSignal"],
        };
        assert_eq!(err.missing_symbol_count(), 2);
        assert_eq!(
            err.to_string(),
            "failed to import 2 functions from dynamic library \"libDSI-Linux-x86_64.so\""
        );
    }
}

// ============================================================================
// Trait contract
// ============================================================================

mod trait_contract {
    use super::*;

    #[test]
    fn test_generic_connect_and_list() {
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let labels = connect_and_list(&interface, Some("F3,F4,Cz")).unwrap();

        assert_eq!(labels, vec!["F3-Pz", "F4-Pz", "Cz-Pz"]);
        assert_eq!(interface.calls().last(), Some(&DeviceCall::Release));
    }

    #[test]
    fn test_space_delimited_montage() {
        let interface = ScriptedInterface::new(HeadsetScript::default());
        let labels = connect_and_list(&interface, Some("O1 O2")).unwrap();
        assert_eq!(labels, vec!["O1-Pz", "O2-Pz"]);
    }

    #[test]
    fn test_error_stops_sequence() {
        let interface = ScriptedInterface::new(
            HeadsetScript::default().failing("set_verbosity", "verbosity out of range"),
        );
        let err = connect_and_list(&interface, None).unwrap_err();

        assert_eq!(err.message(), Some("verbosity out of range"));
        assert_eq!(
            interface.calls(),
            vec![
                DeviceCall::Create,
                DeviceCall::SetMessageCallback,
                DeviceCall::SetVerbosity(2),
            ]
        );
    }

    #[test]
    fn test_frames_carry_offsets() {
        let interface = ScriptedInterface::new(HeadsetScript::default().with_samples_per_idle(2));
        let mut headset = interface.create_headset().unwrap();
        headset.connect(None).unwrap();
        headset.choose_channels(Some("Cz"), None).unwrap();
        headset.set_sample_callback(true).unwrap();
        headset.start_acquisition().unwrap();

        let mut offsets = Vec::new();
        let mut values = Vec::new();
        headset
            .idle(Duration::ZERO, &mut |frame| {
                offsets.push(frame.packet_offset());
                values.push(frame.signal(0));
            })
            .unwrap();

        assert_eq!(offsets, vec![0.0, 1.0 / 300.0]);
        assert_eq!(
            values,
            vec![Some(scripted_signal(0, 0)), Some(scripted_signal(1, 0))]
        );
    }
}
