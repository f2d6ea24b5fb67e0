use crate::config::RunnerConfig;
use crate::dataset::{Sample, discover};
use anyhow::Context;
use common::span;
use evaluation::{
    ConfusionRenderer, ConfusionReport, Evaluator, GroundTruthError, OverlayRenderer, Scope,
    ScopedConfusion, TextRenderer, load_ground_truth, save_png,
};
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use inference::{Detection, Detector, InferenceBackend, LabelSet};
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const PREDICTIONS_FILE: &str = "predictions.txt";
pub const MATRIX_IMAGE: &str = "confusion_matrix.png";
pub const PROBABILITY_IMAGE: &str = "confusion_probability.png";
pub const MATRIX_REPORT: &str = "confusion_matrix.json";
pub const OVERLAY_DIR: &str = "overlays";
/// Parent of every per-directory scope export.
pub const SCOPE_DIR: &str = "scopes";

/// Totals for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub images: usize,
    pub failed: usize,
    /// Images whose annotation was loaded and scored.
    pub evaluated: usize,
    /// Images left out of the evaluation for lack of a usable annotation.
    pub ground_truth_skipped: usize,
    pub detections: usize,
}

struct Metrics {
    duration: Histogram<f64>,
    images: Counter<u64>,
    failed: Counter<u64>,
    detections: Counter<u64>,
    ground_truth_skipped: Counter<u64>,
}

impl Metrics {
    fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0,
        ];

        Self {
            duration: meter
                .f64_histogram("detect_eval_image_duration_seconds")
                .with_description("Time to process one image (decode + detect + evaluate)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            images: meter
                .u64_counter("detect_eval_images_total")
                .with_description("Images processed")
                .build(),
            failed: meter
                .u64_counter("detect_eval_images_failed_total")
                .with_description("Images that could not be processed")
                .build(),
            detections: meter
                .u64_counter("detect_eval_detections_total")
                .with_description("Detections produced")
                .build(),
            ground_truth_skipped: meter
                .u64_counter("detect_eval_ground_truth_skipped_total")
                .with_description("Images left out of evaluation for lack of a usable annotation")
                .build(),
        }
    }
}

/// Create `<output>/<dataset name><N>` for the first `N >= 1` not yet taken.
pub fn allocate_run_dir(output: &Path, data_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let name = data_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());

    let mut idx = 1u64;
    loop {
        let candidate = output.join(format!("{name}{idx}"));
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => idx += 1,
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!(
                    "Failed to create run directory {}",
                    candidate.display()
                )));
            }
        }
    }
}

/// Overlay destination for an image. The source extension is kept so `a.jpg`
/// and `a.png` in one folder do not overwrite each other.
pub fn overlay_path(run_dir: &Path, relative: &Path) -> PathBuf {
    let mut name = run_dir.join(OVERLAY_DIR).join(relative).into_os_string();
    name.push(".png");
    PathBuf::from(name)
}

/// Export directory of a scope: the run root for `overall`, otherwise
/// `scopes/<directory>` so dataset folder names cannot clash with run files.
pub fn scope_dir(run_dir: &Path, scope: Scope<'_>) -> PathBuf {
    match scope {
        Scope::Overall => run_dir.to_path_buf(),
        Scope::Directory(dir) => run_dir.join(SCOPE_DIR).join(dir),
    }
}

/// One `predictions.txt` line: the image key followed by
/// `label,score,xmin,ymin,xmax,ymax` per detection in reference pixels.
pub fn format_prediction_line(
    key: &str,
    detections: &[Detection],
    labels: &LabelSet,
    reference: (u32, u32),
) -> String {
    let mut line = key.to_string();
    for det in detections {
        let b = det.to_pixels(reference.0, reference.1);
        line.push_str(&format!(
            " {},{:.4},{:.1},{:.1},{:.1},{:.1}",
            labels.name(det.class_id).unwrap_or("unknown"),
            det.score,
            b.xmin,
            b.ymin,
            b.xmax,
            b.ymax
        ));
    }
    line
}

/// Runs the detector over a dataset, scores it and writes a run directory.
pub struct BatchRunner<'a> {
    config: &'a RunnerConfig,
    detector: Detector,
    evaluator: Evaluator,
    text: TextRenderer,
    metrics: Metrics,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a RunnerConfig) -> anyhow::Result<Self> {
        let detector =
            Detector::new(config.detector.clone()).context("Invalid detector configuration")?;
        let text = TextRenderer::from_optional_file(config.font_path.as_deref(), config.font_size)?;

        Ok(Self {
            evaluator: Evaluator::from_config(&config.detector),
            detector,
            text,
            metrics: Metrics::new("detect-eval"),
            config,
        })
    }

    pub fn run<B: InferenceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        show_progress: bool,
    ) -> anyhow::Result<RunSummary> {
        let samples = discover(&self.config.data_dir)?;
        let run_dir = allocate_run_dir(&self.config.output_dir, &self.config.data_dir)?;
        tracing::info!(run_dir = %run_dir.display(), images = samples.len(), "Starting run");

        let mut predictions = if self.config.save_predictions {
            let path = run_dir.join(PREDICTIONS_FILE);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        let overlay = self
            .config
            .save_overlays
            .then(|| OverlayRenderer::new(self.text.clone()));

        let progress = if show_progress {
            let bar = ProgressBar::new(samples.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                    .progress_chars("#>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut scoped = ScopedConfusion::new(self.detector.labels().num_classes());
        let mut summary = RunSummary {
            run_dir: run_dir.clone(),
            images: samples.len(),
            ..RunSummary::default()
        };

        for sample in &samples {
            let key = sample.key();
            progress.set_message(key.clone());
            let _s = span!("process_image", image = %key);
            let start = Instant::now();

            let (mut image, detections) = match self.detect(backend, sample) {
                Ok(result) => result,
                Err(e) => {
                    let error = format!("{e:#}");
                    tracing::error!(image = %key, %error, "Failed to process image");
                    summary.failed += 1;
                    self.metrics.failed.add(1, &[]);
                    progress.inc(1);
                    continue;
                }
            };

            summary.detections += detections.len();
            self.metrics.detections.add(detections.len() as u64, &[]);

            if let Some(writer) = predictions.as_mut() {
                let line = format_prediction_line(
                    &key,
                    &detections,
                    self.detector.labels(),
                    self.config.detector.reference_size(),
                );
                writeln!(writer, "{line}")?;
            }

            match self.score(sample, &detections, &mut scoped) {
                Ok(()) => summary.evaluated += 1,
                Err(GroundTruthError::NotFound(path)) => {
                    tracing::debug!(image = %key, annotation = %path.display(), "No annotation");
                    summary.ground_truth_skipped += 1;
                    self.metrics.ground_truth_skipped.add(1, &[]);
                }
                Err(e) => {
                    tracing::warn!(image = %key, error = %e, "Skipping unusable annotation");
                    summary.ground_truth_skipped += 1;
                    self.metrics.ground_truth_skipped.add(1, &[]);
                }
            }

            if let Some(overlay) = &overlay {
                overlay.draw(&mut image, &detections, self.detector.labels());
                let path = overlay_path(&run_dir, &sample.relative);
                if let Err(e) = save_png(&image, &path) {
                    tracing::warn!(image = %key, error = %e, "Failed to save overlay");
                }
            }

            self.metrics.duration.record(start.elapsed().as_secs_f64(), &[]);
            self.metrics.images.add(1, &[]);
            tracing::debug!(image = %key, detections = detections.len(), "Image processed");
            progress.inc(1);
        }

        progress.finish_with_message("done");

        if let Some(mut writer) = predictions {
            writer.flush()?;
            tracing::info!(path = %run_dir.join(PREDICTIONS_FILE).display(), "Predictions saved");
        }

        self.export(&run_dir, &scoped)?;

        tracing::info!(
            images = summary.images,
            failed = summary.failed,
            evaluated = summary.evaluated,
            ground_truth_skipped = summary.ground_truth_skipped,
            detections = summary.detections,
            "Run complete"
        );

        Ok(summary)
    }

    fn detect<B: InferenceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        sample: &Sample,
    ) -> anyhow::Result<(RgbImage, Vec<Detection>)> {
        let image = image::open(&sample.image)
            .with_context(|| format!("Failed to decode {}", sample.image.display()))?
            .to_rgb8();

        backend.prepare(&sample.image)?;
        let detections = self
            .detector
            .detect(backend, image.as_raw(), image.width(), image.height())?;

        Ok((image, detections))
    }

    fn score(
        &self,
        sample: &Sample,
        detections: &[Detection],
        scoped: &mut ScopedConfusion,
    ) -> Result<(), GroundTruthError> {
        let ground_truth = load_ground_truth(
            &sample.annotation,
            self.detector.labels(),
            self.config.detector.reference_size(),
        )?;
        let outcomes = self.evaluator.assign(detections, &ground_truth);
        scoped.record(&sample.scopes(), &outcomes);
        Ok(())
    }

    /// Write matrix images and a JSON report for every scope, laid out by
    /// [`scope_dir`].
    fn export(&self, run_dir: &Path, scoped: &ScopedConfusion) -> anyhow::Result<()> {
        let _s = span!("export", scopes = scoped.len());

        let labels: Vec<&str> = self.detector.labels().with_background().collect();
        let renderer = ConfusionRenderer::new(self.text.clone());

        for (scope, matrix) in scoped.iter() {
            let dir = scope_dir(run_dir, scope);
            let name = scope.name();

            let report = ConfusionReport::new(name, &labels, matrix);
            tracing::info!(
                scope = name,
                precision = report.summary.precision,
                recall = report.summary.recall,
                f1 = report.summary.f1,
                "Scope evaluated"
            );

            let counts = renderer.render_counts(matrix, &labels)?;
            save_png(&counts, &dir.join(MATRIX_IMAGE))?;
            let probabilities = renderer.render_probabilities(matrix, &labels)?;
            save_png(&probabilities, &dir.join(PROBABILITY_IMAGE))?;

            let json = serde_json::to_string_pretty(&report)?;
            fs::write(dir.join(MATRIX_REPORT), json)
                .with_context(|| format!("Failed to write report for scope {name}"))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_dirs_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("runs");
        let data = Path::new("/datasets/pets");

        let first = allocate_run_dir(&output, data).unwrap();
        let second = allocate_run_dir(&output, data).unwrap();

        assert_eq!(first, output.join("pets1"));
        assert_eq!(second, output.join("pets2"));
        assert!(first.is_dir() && second.is_dir());
    }

    /// Numbering fills the first gap
    #[test]
    fn test_run_dir_reuses_free_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pets1")).unwrap();
        fs::create_dir_all(dir.path().join("pets3")).unwrap();

        let run = allocate_run_dir(dir.path(), Path::new("pets")).unwrap();
        assert_eq!(run, dir.path().join("pets2"));
    }

    #[test]
    fn test_overlay_keeps_source_extension() {
        let run = Path::new("/runs/pets1");
        let jpg = overlay_path(run, Path::new("cats/a.jpg"));
        let png = overlay_path(run, Path::new("cats/a.png"));

        assert_eq!(jpg, Path::new("/runs/pets1/overlays/cats/a.jpg.png"));
        assert_eq!(png, Path::new("/runs/pets1/overlays/cats/a.png.png"));
    }

    #[test]
    fn test_directory_scopes_are_namespaced() {
        let run = Path::new("/runs/pets1");
        assert_eq!(scope_dir(run, Scope::Overall), run);
        assert_eq!(
            scope_dir(run, Scope::Directory("overall")),
            Path::new("/runs/pets1/scopes/overall")
        );
        assert_eq!(
            scope_dir(run, Scope::Directory("overlays/night")),
            Path::new("/runs/pets1/scopes/overlays/night")
        );
    }

    #[test]
    fn test_prediction_line_in_reference_pixels() {
        let labels = LabelSet::new(["person", "cat"]).unwrap();
        let detections = [Detection {
            xmin: 0.25,
            ymin: 0.5,
            xmax: 0.5,
            ymax: 0.75,
            score: 0.875,
            class_id: 1,
        }];

        let line = format_prediction_line("cat/1.jpg", &detections, &labels, (1280, 720));
        assert_eq!(line, "cat/1.jpg cat,0.8750,320.0,360.0,640.0,540.0");

        let empty = format_prediction_line("cat/2.jpg", &[], &labels, (1280, 720));
        assert_eq!(empty, "cat/2.jpg");
    }
}
