use super::dispatch::{append_downmixed_samples, FrameDispatcher};
use super::resample::{
    basic_resample, design_low_pass, downsampling_tap_count, low_pass_fir, resample_linear,
    MAX_DEVICE_RATE, MAX_RESAMPLE_RATIO, MIN_DEVICE_RATE, MIN_RESAMPLE_RATIO,
};
use super::{
    finalize_wav, level_from_samples, resample_to_classifier_rate, CaptureEpisode, PrerollRing,
    Recorder, StopCause, TriggerConfig, TriggerDecision, TriggerMachine, WavChunkEncoder,
    CLASSIFIER_RATE,
};
use crate::app::set_logging_for_tests;
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "high-quality-audio")]
use super::resample::{
    resample_with_rubato, FORCE_RUBATO_ERROR, RESAMPLER_WARNING_SHOWN, RESAMPLE_FALLBACK_COUNT,
    RESAMPLE_WARN_COUNT,
};

#[cfg(feature = "high-quality-audio")]
static RESAMPLE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn sine(rate: u32, hz: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
        .collect()
}

#[test]
fn downmixes_stereo_to_mono() {
    let mut buf = Vec::new();
    let samples = [1.0f32, -1.0, 0.5, 0.5];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![0.0, 0.5]);
}

#[test]
fn preserves_mono_input() {
    let mut buf = Vec::new();
    let samples = [0.1f32, 0.2, 0.3];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, samples);
}

#[test]
fn averages_trailing_partial_frame() {
    let mut buf = Vec::new();
    let samples = [1.0f32, 3.0, 5.0];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![2.0, 5.0]);
}

#[test]
fn converter_runs_before_downmix() {
    let mut buf = Vec::new();
    let samples = [16384i16, -16384];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample as f32 / 32768.0);
    assert_eq!(buf, vec![0.5, -0.5]);
}

#[test]
fn dispatcher_slices_fixed_frames() {
    let (tx, rx) = bounded(8);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(4, tx, dropped.clone());

    dispatcher.push(&[0.25f32; 10], 1, |sample| sample);

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(first.len(), 4);
    assert_eq!(second.len(), 4);
    assert!(rx.try_recv().is_err(), "two trailing samples stay pending");
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

#[test]
fn dispatcher_counts_frames_dropped_on_full_channel() {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(4, tx, dropped.clone());

    dispatcher.push(&[0.5f32; 12], 1, |sample| sample);

    assert_eq!(rx.try_recv().unwrap().len(), 4);
    assert_eq!(dropped.load(Ordering::Relaxed), 2);
}

#[test]
fn resample_passes_through_at_classifier_rate() {
    let input = sine(CLASSIFIER_RATE, 440.0, 320);
    let output = resample_to_classifier_rate(&input, CLASSIFIER_RATE);
    assert_eq!(output, input);
}

#[test]
fn resample_tolerates_degenerate_input() {
    assert!(resample_to_classifier_rate(&[], 48_000).is_empty());
    let input = vec![0.1f32, 0.2];
    assert_eq!(resample_to_classifier_rate(&input, 0), input);
}

#[test]
fn basic_resample_collapses_48k_to_a_third() {
    let input = sine(48_000, 440.0, 480);
    let output = basic_resample(&input, 48_000);
    assert_eq!(output.len(), 160);
    assert!(output.iter().all(|sample| sample.is_finite()));
}

#[test]
fn basic_resample_doubles_8k_input() {
    let input = sine(8_000, 200.0, 80);
    let output = basic_resample(&input, 8_000);
    assert_eq!(output.len(), 160);
}

#[test]
fn basic_resample_passes_out_of_range_rates_through() {
    let input = vec![0.3f32; 50];
    assert_eq!(basic_resample(&input, 1_000), input);
    assert_eq!(basic_resample(&input, 2_000_000), input);
}

#[test]
fn resample_linear_interpolates_midpoints() {
    let output = resample_linear(&[0.0, 1.0], 2.0);
    assert_eq!(output, vec![0.0, 0.5, 1.0, 1.0]);
}

#[test]
#[allow(clippy::assertions_on_constants)]
fn resample_bounds_match_constants() {
    assert_eq!(MIN_DEVICE_RATE, 2_000);
    assert_eq!(MAX_DEVICE_RATE, 1_600_000);
    assert!(MIN_DEVICE_RATE < MAX_DEVICE_RATE);
    assert!((MIN_RESAMPLE_RATIO - 0.01).abs() < 1e-9);
    assert!((MAX_RESAMPLE_RATIO - 8.0).abs() < 1e-9);
}

#[test]
fn tap_count_is_odd_and_capped() {
    let common = downsampling_tap_count(48_000);
    assert!(common % 2 == 1);
    assert!(common >= 11);
    assert_eq!(downsampling_tap_count(1_600_000), 129);
}

#[test]
fn low_pass_design_normalizes_to_unity_gain() {
    let coeffs = design_low_pass(1.0 / 6.0, 13);
    let sum: f32 = coeffs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4);
}

#[test]
fn low_pass_preserves_dc_away_from_edges() {
    let input = vec![1.0f32; 64];
    let output = low_pass_fir(&input, 48_000, 13);
    assert_eq!(output.len(), input.len());
    assert!((output[32] - 1.0).abs() < 1e-3);
}

#[cfg(feature = "high-quality-audio")]
#[test]
fn rubato_downsamples_48k_with_deterministic_length() {
    let _guard = RESAMPLE_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let input = sine(48_000, 440.0, 4_800);
    let output = resample_with_rubato(&input, 48_000).unwrap();
    // round(4800 / 3) plus the fixed tail allowance
    assert_eq!(output.len(), 1_608);
    assert!(output.iter().all(|sample| sample.is_finite()));
}

#[cfg(feature = "high-quality-audio")]
#[test]
fn rubato_rejects_unsupported_rates() {
    let _guard = RESAMPLE_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let input = vec![0.1f32; 100];
    assert!(resample_with_rubato(&input, 1_000).is_err());
    assert!(resample_with_rubato(&input, 2_000_000).is_err());
}

// Counters can move concurrently: monitor tests push their sub-range test
// rate through the same fallback path, so deltas are lower bounds here.
#[cfg(feature = "high-quality-audio")]
#[test]
fn forced_rubato_failure_falls_back_to_basic_path() {
    let _guard = RESAMPLE_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    set_logging_for_tests(false, false);
    let fallbacks_before = RESAMPLE_FALLBACK_COUNT.load(Ordering::Relaxed);
    let warns_before = RESAMPLE_WARN_COUNT.load(Ordering::Relaxed);
    RESAMPLER_WARNING_SHOWN.store(false, Ordering::Release);

    let input = sine(48_000, 440.0, 480);
    FORCE_RUBATO_ERROR.store(true, Ordering::Relaxed);
    let first = resample_to_classifier_rate(&input, 48_000);
    FORCE_RUBATO_ERROR.store(true, Ordering::Relaxed);
    let second = resample_to_classifier_rate(&input, 48_000);

    assert_eq!(first.len(), 160);
    assert_eq!(second.len(), 160);
    assert!(RESAMPLE_FALLBACK_COUNT.load(Ordering::Relaxed) >= fallbacks_before + 2);
    assert!(RESAMPLE_WARN_COUNT.load(Ordering::Relaxed) >= warns_before + 1);
}

#[test]
fn encoder_ring_and_trigger_assemble_a_riff_blob() {
    set_logging_for_tests(false, false);
    let mut encoder = WavChunkEncoder::new(1_000, 100);
    let header = encoder.init_chunk();
    let mut ring = PrerollRing::for_window(300, 100);
    let mut machine = TriggerMachine::new(TriggerConfig {
        threshold_db: -30.0,
        release_buffer_ms: 200,
        min_episode_ms: 0,
    });
    let mut episode: Option<CaptureEpisode> = None;
    let mut finished = None;

    let quiet = vec![0.01f32; 100];
    let loud = vec![0.1f32; 100];
    let script: Vec<(&[f32], u64)> = vec![
        (&quiet, 100),
        (&quiet, 200),
        (&quiet, 300),
        (&quiet, 400),
        (&quiet, 500),
        (&loud, 600),
        (&quiet, 700),
        (&quiet, 800),
        (&quiet, 900),
    ];

    for (frame, now_ms) in script {
        let level = level_from_samples(frame);
        if let Some(active) = episode.as_mut() {
            active.observe_level(level);
        }
        for chunk in encoder.push_samples(frame, now_ms) {
            match episode.as_mut() {
                Some(active) => active.push_chunk(chunk),
                None => ring.push(chunk),
            }
        }
        match machine.on_level(now_ms, level) {
            TriggerDecision::Start => {
                let mut fresh = CaptureEpisode::begin(now_ms, ring.snapshot());
                ring.clear();
                fresh.observe_level(level);
                episode = Some(fresh);
            }
            TriggerDecision::Stop(cause) => {
                let active = episode.take().unwrap();
                finished = active.finalize(&header, now_ms, cause);
            }
            TriggerDecision::Idle | TriggerDecision::Continue => {}
        }
    }

    let capture = finished.expect("episode should finish inside the script");
    assert_eq!(capture.cause, StopCause::Released { quiet_ms: 200 });
    assert_eq!(capture.preroll_chunks, 3);
    assert_eq!(capture.live_chunks, 4);
    // 44-byte header plus 7 chunks of 100 i16 samples
    assert_eq!(capture.wav.len(), 44 + 7 * 200);
    assert_eq!(&capture.wav[0..4], b"RIFF");
    assert_eq!(&capture.wav[8..12], b"WAVE");
    let data_len = u32::from_le_bytes([
        capture.wav[40],
        capture.wav[41],
        capture.wav[42],
        capture.wav[43],
    ]);
    assert_eq!(data_len, 1_400);
    assert!((capture.peak_db - (-20.0)).abs() < 0.5);
    assert!((capture.duration_seconds - 0.3).abs() < 1e-6);
}

#[test]
fn finalize_wav_yields_none_without_payload() {
    let encoder = WavChunkEncoder::new(CLASSIFIER_RATE, 100);
    let header = encoder.init_chunk();
    assert!(finalize_wav(&header, &[]).is_none());
}

#[test]
fn listing_devices_never_panics() {
    if let Ok(devices) = Recorder::list_devices() {
        for name in devices {
            assert!(!name.trim().is_empty());
        }
    }
}

#[test]
fn acquiring_default_device_reports_cleanly() {
    match Recorder::acquire(None) {
        Ok(recorder) => assert!(!recorder.device_name().is_empty()),
        Err(err) => assert!(!err.to_string().is_empty()),
    }
}
