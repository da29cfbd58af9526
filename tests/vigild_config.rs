use std::sync::Mutex;

use tempfile::NamedTempFile;

use vigil::config::{VigildConfig, FALLBACK_SOURCE_FPS, MIN_OUTPUT_FPS};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "VIGIL_CONFIG",
        "VIGIL_SOURCE",
        "VIGIL_OUTPUT",
        "VIGIL_MODEL",
        "VIGIL_DEVICE",
        "VIGIL_DETECTOR",
        "VIGIL_TARGET_FPS",
        "VIGIL_CONF",
        "VIGIL_QUEUE_SIZE",
        "VIGIL_OVERLAY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let cfg = VigildConfig::load().expect("load defaults");
    assert_eq!(cfg.source, "stub://front_camera");
    assert_eq!(cfg.output_path.to_str(), Some("output.mjpeg"));
    assert_eq!(cfg.target_fps, 15.0);
    assert_eq!(cfg.queue_size, 2);
    assert!(cfg.overlay);
    assert_eq!(cfg.detector.backend, "motion");
    assert_eq!(cfg.detector.model_path.to_str(), Some("yolov8n.onnx"));
    assert_eq!(cfg.detector.conf, 0.5);
    assert_eq!(cfg.detector.device, None);
    assert_eq!(cfg.detector.input_size, (640, 640));
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": "rtsp://camera-1/stream",
        "output": "/var/lib/vigil/front.mjpeg",
        "detector": {
            "backend": "tract",
            "model": "/models/yolov8s.onnx",
            "device": "cpu",
            "conf": 0.35,
            "input_width": 320,
            "input_height": 320
        },
        "pipeline": {
            "target_fps": 12.0,
            "queue_size": 4,
            "overlay": true,
            "smoothing": 0.2
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("VIGIL_CONFIG", file.path());
    std::env::set_var("VIGIL_OUTPUT", "/tmp/override.rgb");
    std::env::set_var("VIGIL_QUEUE_SIZE", "3");
    std::env::set_var("VIGIL_OVERLAY", "off");

    let cfg = VigildConfig::load().expect("load config");

    assert_eq!(cfg.source, "rtsp://camera-1/stream");
    assert_eq!(cfg.output_path.to_str(), Some("/tmp/override.rgb"));
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(cfg.detector.model_path.to_str(), Some("/models/yolov8s.onnx"));
    assert_eq!(cfg.detector.device.as_deref(), Some("cpu"));
    assert_eq!(cfg.detector.conf, 0.35);
    assert_eq!(cfg.detector.input_size, (320, 320));
    assert_eq!(cfg.target_fps, 12.0);
    assert_eq!(cfg.queue_size, 3);
    assert!(!cfg.overlay);
    assert_eq!(cfg.smoothing, 0.2);

    clear_env();
}

#[test]
fn pipeline_config_derives_output_cadence() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("VIGIL_TARGET_FPS", "30");

    let cfg = VigildConfig::load().expect("load config");
    let fast_source = cfg.pipeline_config((1280, 720), Some(60.0));
    assert_eq!(fast_source.frame_size, (1280, 720));
    assert_eq!(fast_source.writer_fps, 30.0);

    let slow_source = cfg.pipeline_config((1280, 720), Some(12.0));
    assert_eq!(slow_source.writer_fps, 12.0);

    let unknown_source = cfg.pipeline_config((1280, 720), None);
    assert_eq!(unknown_source.writer_fps, FALLBACK_SOURCE_FPS);

    std::env::set_var("VIGIL_TARGET_FPS", "0.5");
    let cfg = VigildConfig::load().expect("load config");
    assert_eq!(cfg.pipeline_config((64, 64), Some(30.0)).writer_fps, MIN_OUTPUT_FPS);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    for (key, value) in [
        ("VIGIL_TARGET_FPS", "fast"),
        ("VIGIL_CONF", "1.5"),
        ("VIGIL_QUEUE_SIZE", "0"),
        ("VIGIL_QUEUE_SIZE", "-1"),
        ("VIGIL_OVERLAY", "sometimes"),
    ] {
        std::env::set_var(key, value);
        assert!(VigildConfig::load().is_err(), "{}={} should be rejected", key, value);
        std::env::remove_var(key);
    }

    clear_env();
}

#[test]
fn rejects_unknown_file_fields() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "frame_rate": 30 }"#).expect("write config");
    std::env::set_var("VIGIL_CONFIG", file.path());

    let err = VigildConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("VIGIL_CONFIG", "/nonexistent/vigil.json");

    assert!(VigildConfig::load().is_err());

    clear_env();
}
