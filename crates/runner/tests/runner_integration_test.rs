use common::Environment;
use image::{Rgb, RgbImage};
use inference::backend::replay::write_tensor;
use inference::{DetectorConfig, ReplayBackend};
use runner::{BatchRunner, LogLevel, RunnerConfig, build_backend};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DOG: usize = 2;
const CAT: usize = 1;

fn write_image(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(1280, 720, Rgb([40, 40, 40]))
        .save(path)
        .unwrap();
}

/// Single-anchor `[10, 1]` head output. The box is in 320x192 input pixels.
fn write_recorded_output(image: &Path, bbox: [f32; 4], class: Option<(usize, f32)>) {
    let mut data = vec![0.0f32; 10];
    data[..4].copy_from_slice(&bbox);
    if let Some((class, score)) = class {
        data[4 + class] = score;
    }
    write_tensor(&ReplayBackend::tensor_path(image), &data).unwrap();
}

fn write_annotation(path: &Path, objects: &[(&str, [u32; 4])]) {
    let mut xml =
        String::from("<annotation>\n<size><width>1280</width><height>720</height></size>\n");
    for (name, [xmin, ymin, xmax, ymax]) in objects {
        xml.push_str(&format!(
            "<object><name>{name}</name><bndbox><xmin>{xmin}</xmin><ymin>{ymin}</ymin>\
             <xmax>{xmax}</xmax><ymax>{ymax}</ymax></bndbox></object>\n"
        ));
    }
    xml.push_str("</annotation>\n");
    fs::write(path, xml).unwrap();
}

/// pets/
///   cats/img_0001.png  dog detected, dog annotated at the same place
///   cats/img_0004.png  nothing detected, no annotation
///   dogs/img_0002.png  no recorded output
///   dogs/img_0003.png  cat detected, dog annotated elsewhere
fn build_dataset() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("pets");

    // (80, 51) +- (20, 15) in the letterboxed input is [240, 120, 400, 240]
    // in the 1280x720 source
    let box_in_input = [80.0, 51.0, 40.0, 30.0];

    let matched = root.join("cats/img_0001.png");
    write_image(&matched);
    write_recorded_output(&matched, box_in_input, Some((DOG, 0.8)));
    write_annotation(&matched.with_extension("xml"), &[("dog", [240, 120, 400, 240])]);

    let unannotated = root.join("cats/img_0004.png");
    write_image(&unannotated);
    write_recorded_output(&unannotated, box_in_input, None);

    write_image(&root.join("dogs/img_0002.png"));

    let confused = root.join("dogs/img_0003.png");
    write_image(&confused);
    write_recorded_output(&confused, box_in_input, Some((CAT, 0.9)));
    write_annotation(&confused.with_extension("xml"), &[("dog", [800, 400, 900, 500])]);

    (dir, root)
}

fn config(data_dir: PathBuf, output_dir: PathBuf) -> RunnerConfig {
    RunnerConfig {
        log_level: LogLevel::Info,
        environment: Environment::Development,
        otel_endpoint: None,
        data_dir,
        output_dir,
        model_path: None,
        use_cuda: false,
        save_predictions: true,
        save_overlays: true,
        font_path: None,
        font_size: 14.0,
        detector: DetectorConfig {
            num_anchors: None,
            ..DetectorConfig::default()
        },
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_batch_run_writes_run_directory() {
    let (dir, root) = build_dataset();
    let config = config(root, dir.path().join("runs"));

    let mut backend = build_backend(&config).unwrap();
    let summary = BatchRunner::new(&config)
        .unwrap()
        .run(backend.as_mut(), false)
        .unwrap();

    let run_dir = dir.path().join("runs/pets1");
    assert_eq!(summary.run_dir, run_dir);
    assert_eq!(summary.images, 4);
    assert_eq!(summary.failed, 1, "Image without recorded output fails");
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.ground_truth_skipped, 1);
    assert_eq!(summary.detections, 2);

    let predictions = fs::read_to_string(run_dir.join("predictions.txt")).unwrap();
    let lines: Vec<&str> = predictions.lines().collect();
    assert_eq!(
        lines,
        vec![
            "cats/img_0001.png dog,0.8000,240.0,120.0,400.0,240.0",
            "cats/img_0004.png",
            "dogs/img_0003.png cat,0.9000,240.0,120.0,400.0,240.0",
        ]
    );

    for scope_dir in [
        run_dir.clone(),
        run_dir.join("scopes/cats"),
        run_dir.join("scopes/dogs"),
    ] {
        for file in [
            "confusion_matrix.png",
            "confusion_probability.png",
            "confusion_matrix.json",
        ] {
            assert!(scope_dir.join(file).is_file(), "{}/{file}", scope_dir.display());
        }
    }

    let overall = read_json(&run_dir.join("confusion_matrix.json"));
    assert_eq!(overall["scope"], "overall");
    assert_eq!(overall["matrix"][DOG][DOG], 1);
    assert_eq!(overall["matrix"][DOG][6], 1);
    assert_eq!(overall["matrix"][6][CAT], 1);
    assert_eq!(overall["summary"]["true_positives"], 1);
    assert_eq!(overall["summary"]["false_positives"], 1);
    assert_eq!(overall["summary"]["false_negatives"], 1);

    let cats = read_json(&run_dir.join("scopes/cats/confusion_matrix.json"));
    assert_eq!(cats["summary"]["true_positives"], 1);
    assert_eq!(cats["summary"]["false_positives"], 0);

    let dogs = read_json(&run_dir.join("scopes/dogs/confusion_matrix.json"));
    assert_eq!(dogs["summary"]["true_positives"], 0);
    assert_eq!(dogs["matrix"][6][CAT], 1);

    let overlay = image::open(run_dir.join("overlays/cats/img_0001.png.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(overlay.dimensions(), (1280, 720));
    assert_eq!(*overlay.get_pixel(240, 180), evaluation::class_color(DOG));
    assert!(!run_dir.join("overlays/dogs/img_0002.png.png").exists());
}

/// Folders named like run outputs get their own matrices under `scopes/`
#[test]
fn test_reserved_folder_names_keep_their_own_scope() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("pets");
    let box_in_input = [80.0, 51.0, 40.0, 30.0];

    let in_overall = root.join("overall/img_0001.png");
    write_image(&in_overall);
    write_recorded_output(&in_overall, box_in_input, Some((DOG, 0.8)));
    write_annotation(&in_overall.with_extension("xml"), &[("dog", [240, 120, 400, 240])]);

    let in_overlays = root.join("overlays/img_0002.png");
    write_image(&in_overlays);
    write_recorded_output(&in_overlays, box_in_input, Some((CAT, 0.9)));
    write_annotation(&in_overlays.with_extension("xml"), &[]);

    let config = config(root, dir.path().join("runs"));
    let mut backend = build_backend(&config).unwrap();
    let summary = BatchRunner::new(&config)
        .unwrap()
        .run(backend.as_mut(), false)
        .unwrap();
    assert_eq!(summary.evaluated, 2);

    let run_dir = summary.run_dir;
    let overall = read_json(&run_dir.join("confusion_matrix.json"));
    assert_eq!(overall["summary"]["true_positives"], 1);
    assert_eq!(overall["summary"]["false_positives"], 1);

    let folder = read_json(&run_dir.join("scopes/overall/confusion_matrix.json"));
    assert_eq!(folder["summary"]["true_positives"], 1);
    assert_eq!(folder["summary"]["false_positives"], 0);

    let overlays_folder = read_json(&run_dir.join("scopes/overlays/confusion_matrix.json"));
    assert_eq!(overlays_folder["matrix"][6][CAT], 1);

    assert!(run_dir.join("overlays/overlays/img_0002.png.png").is_file());
    assert!(!run_dir.join("overlays/confusion_matrix.png").exists());
}

#[test]
fn test_second_run_gets_next_directory() {
    let (dir, root) = build_dataset();
    let mut config = config(root, dir.path().join("runs"));
    config.save_overlays = false;
    config.save_predictions = false;

    for expected in ["pets1", "pets2"] {
        let mut backend = build_backend(&config).unwrap();
        let summary = BatchRunner::new(&config)
            .unwrap()
            .run(backend.as_mut(), false)
            .unwrap();
        assert_eq!(summary.run_dir, dir.path().join("runs").join(expected));
        assert!(!summary.run_dir.join("predictions.txt").exists());
        assert!(!summary.run_dir.join("overlays").exists());
    }
}

#[test]
fn test_missing_dataset_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path().join("absent"), dir.path().join("runs"));

    let mut backend = build_backend(&config).unwrap();
    let result = BatchRunner::new(&config)
        .unwrap()
        .run(backend.as_mut(), false);

    assert!(result.is_err());
    assert!(!dir.path().join("runs").exists(), "No run directory for a failed start");
}

/// Without the `ort-backend` feature a model is rejected up front; with it the
/// missing file fails to load
#[test]
fn test_unloadable_model_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path().join("pets"), dir.path().join("runs"));
    config.model_path = Some(dir.path().join("missing.onnx"));

    assert!(build_backend(&config).is_err());
}
