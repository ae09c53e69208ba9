use clap::Parser;
use mtcsyncrs::cli::{Args, Command};
use mtcsyncrs::mtc::FullFrameBehavior;
use mtcsyncrs::timecode::FrameRate;

#[cfg(feature = "test-mock")]
#[test]
fn test_device_list() {
    let devices = mtcsyncrs::handle_device_list();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0], "Mock Device 1");
    assert_eq!(devices[1], "Mock Device 2");
}

#[cfg(feature = "test-mock")]
#[test]
fn test_device_validation_against_mock_devices() {
    let devices = mtcsyncrs::handle_device_list();
    assert!(mtcsyncrs::validate_device("Mock Device 1", &devices).is_ok());
    assert!(mtcsyncrs::validate_device("Nonexistent Device", &devices).is_err());
}

#[test]
fn test_args_without_command() {
    let args = Args::parse_from(["mtcsyncrs", "--device-list"]);
    assert!(args.device_list);
    assert!(args.command.is_none());
    assert!(!args.verbose);
}

#[test]
fn test_generate_args() {
    let args = Args::parse_from([
        "mtcsyncrs",
        "--config",
        "mtc.toml",
        "generate",
        "--output",
        "IAC",
        "--rate",
        "29.97d",
        "--start",
        "01:00:00;00",
        "--full-frame",
        "always",
    ]);
    assert_eq!(args.config.as_deref(), Some(std::path::Path::new("mtc.toml")));

    match args.command {
        Some(Command::Generate(generate)) => {
            assert_eq!(generate.output.as_deref(), Some("IAC"));
            assert_eq!(generate.rate, Some(FrameRate::Fps29_97Drop));
            assert_eq!(generate.start.as_deref(), Some("01:00:00;00"));
            assert_eq!(generate.full_frame, Some(FullFrameBehavior::Always));
        }
        other => panic!("expected generate, got {:?}", other),
    }
}

#[test]
fn test_receive_args() {
    let args = Args::parse_from([
        "mtcsyncrs",
        "-v",
        "receive",
        "--input",
        "USB",
        "--drop-out-frames",
        "20",
    ]);
    assert!(args.verbose);
    let overrides = args.command.unwrap().overrides();
    assert_eq!(overrides.input_device.as_deref(), Some("USB"));
    assert_eq!(overrides.drop_out_frames, Some(20));
    assert_eq!(overrides.frame_rate, None);
}

#[test]
fn test_rejects_unknown_rate() {
    assert!(Args::try_parse_from(["mtcsyncrs", "generate", "--rate", "31"]).is_err());
    assert!(Args::try_parse_from(["mtcsyncrs", "generate", "--full-frame", "sometimes"]).is_err());
}
