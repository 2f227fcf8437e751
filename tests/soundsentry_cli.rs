use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn soundsentry_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_soundsentry").expect("soundsentry test binary not built")
}

#[test]
fn help_mentions_name() {
    let output = Command::new(soundsentry_bin())
        .arg("--help")
        .output()
        .expect("run soundsentry --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("SoundSentry"));
    assert!(combined.contains("--threshold-db"));
}

#[test]
fn list_input_devices_prints_seeded_names() {
    let output = Command::new(soundsentry_bin())
        .arg("--list-input-devices")
        .env("SOUNDSENTRY_TEST_DEVICES", "USB Microphone, Built-in Mic")
        .output()
        .expect("run soundsentry --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("USB Microphone"));
    assert!(combined.contains("Built-in Mic"));
}

#[test]
fn list_input_devices_reports_when_none_found() {
    let output = Command::new(soundsentry_bin())
        .arg("--list-input-devices")
        .env("SOUNDSENTRY_TEST_DEVICES", "")
        .output()
        .expect("run soundsentry --list-input-devices");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("No audio input devices detected."));
}

#[test]
fn list_labels_prints_catalog() {
    let output = Command::new(soundsentry_bin())
        .arg("--list-labels")
        .output()
        .expect("run soundsentry --list-labels");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Cough"));
    assert!(combined.contains("Glass"));
    assert!(combined.contains("Baby cry, infant cry"));
}

#[test]
fn rejects_threshold_above_full_scale() {
    let output = Command::new(soundsentry_bin())
        .args(["--threshold-db", "10"])
        .output()
        .expect("run soundsentry with an invalid threshold");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--threshold-db must be between"));
}

#[test]
fn rejects_out_of_range_release_buffer() {
    let output = Command::new(soundsentry_bin())
        .args(["--release-buffer-ms", "50"])
        .output()
        .expect("run soundsentry with an invalid release buffer");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--release-buffer-ms must be between"));
}
