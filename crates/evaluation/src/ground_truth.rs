use crate::error::GroundTruthError;
use inference::{BoundingBox, LabelSet};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<size>(.*?)</size>").expect("valid regex"));
static WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<width>\s*([^<]*?)\s*</width>").expect("valid regex"));
static HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<height>\s*([^<]*?)\s*</height>").expect("valid regex"));
static OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<object>(.*?)</object>").expect("valid regex"));
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<name>\s*([^<]*?)\s*</name>").expect("valid regex"));
static BNDBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<bndbox>(.*?)</bndbox>").expect("valid regex"));
static CORNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(xmin|ymin|xmax|ymax)>\s*([^<]*?)\s*</(?:xmin|ymin|xmax|ymax)>")
        .expect("valid regex")
});

/// Annotated object in reference-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruthBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub class_id: usize,
}

impl GroundTruthBox {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

/// Annotation file expected next to `image`: same stem, `.xml` extension.
pub fn annotation_path(image: &Path) -> PathBuf {
    image.with_extension("xml")
}

/// Load a Pascal-VOC style annotation and scale its boxes from the annotated
/// image size to `reference`.
pub fn load_ground_truth(
    path: &Path,
    labels: &LabelSet,
    reference: (u32, u32),
) -> Result<Vec<GroundTruthBox>, GroundTruthError> {
    let xml = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            GroundTruthError::NotFound(path.to_path_buf())
        } else {
            GroundTruthError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_ground_truth(&xml, labels, reference)
}

/// Parse annotation text.
///
/// Objects whose class is not in `labels` are ignored, as are objects
/// without a `<bndbox>` or with a non-numeric corner. A missing or zero
/// `<size>` makes the whole annotation malformed since its boxes cannot be
/// scaled.
pub fn parse_ground_truth(
    xml: &str,
    labels: &LabelSet,
    reference: (u32, u32),
) -> Result<Vec<GroundTruthBox>, GroundTruthError> {
    let (width, height) = annotated_size(xml)?;
    let sx = reference.0 as f32 / width;
    let sy = reference.1 as f32 / height;

    let mut boxes = Vec::new();
    for object in OBJECT.captures_iter(xml) {
        let body = &object[1];

        let Some(name) = NAME.captures(body).map(|c| c[1].to_string()) else {
            tracing::debug!("Skipping object without a name");
            continue;
        };
        let Some(class_id) = labels.index_of(&name) else {
            tracing::trace!(name, "Ignoring object of unknown class");
            continue;
        };
        let Some(corners) = BNDBOX.captures(body).and_then(|c| parse_corners(&c[1])) else {
            tracing::debug!(name, "Skipping object without a usable bndbox");
            continue;
        };

        let [xmin, ymin, xmax, ymax] = corners;
        boxes.push(GroundTruthBox {
            xmin: xmin * sx,
            ymin: ymin * sy,
            xmax: xmax * sx,
            ymax: ymax * sy,
            class_id,
        });
    }

    Ok(boxes)
}

fn annotated_size(xml: &str) -> Result<(f32, f32), GroundTruthError> {
    let size = SIZE
        .captures(xml)
        .ok_or_else(|| GroundTruthError::Malformed("missing <size>".to_string()))?;

    let dimension = |re: &Regex, tag: &str| -> Result<f32, GroundTruthError> {
        re.captures(&size[1])
            .and_then(|c| c[1].parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| GroundTruthError::Malformed(format!("invalid <{tag}> in <size>")))
    };

    Ok((dimension(&WIDTH, "width")?, dimension(&HEIGHT, "height")?))
}

fn parse_corners(bndbox: &str) -> Option<[f32; 4]> {
    let mut corners = [None; 4];
    for c in CORNER.captures_iter(bndbox) {
        let slot = match &c[1] {
            "xmin" => 0,
            "ymin" => 1,
            "xmax" => 2,
            _ => 3,
        };
        corners[slot] = Some(c[2].parse::<f32>().ok().filter(|v| v.is_finite())?);
    }

    let [Some(xmin), Some(ymin), Some(xmax), Some(ymax)] = corners else {
        return None;
    };
    Some([xmin, ymin, xmax, ymax])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelSet {
        LabelSet::new(["person", "cat", "dog", "catface", "dogface", "hand"]).unwrap()
    }

    fn annotation(width: u32, height: u32, objects: &str) -> String {
        format!(
            "<annotation>\n  <filename>img.jpg</filename>\n  <size>\n    <width>{width}</width>\n    \
             <height>{height}</height>\n    <depth>3</depth>\n  </size>\n{objects}</annotation>\n"
        )
    }

    fn object(name: &str, xmin: &str, ymin: &str, xmax: &str, ymax: &str) -> String {
        format!(
            "  <object>\n    <name>{name}</name>\n    <difficult>0</difficult>\n    <bndbox>\n      \
             <xmin>{xmin}</xmin>\n      <ymin>{ymin}</ymin>\n      <xmax>{xmax}</xmax>\n      \
             <ymax>{ymax}</ymax>\n    </bndbox>\n  </object>\n"
        )
    }

    #[test]
    fn test_boxes_scale_to_reference() {
        let xml = annotation(640, 360, &object("dog", "100", "50", "200", "150"));
        let boxes = parse_ground_truth(&xml, &labels(), (1280, 720)).unwrap();

        assert_eq!(
            boxes,
            vec![GroundTruthBox {
                xmin: 200.0,
                ymin: 100.0,
                xmax: 400.0,
                ymax: 300.0,
                class_id: 2,
            }]
        );
    }

    #[test]
    fn test_unknown_classes_are_ignored() {
        let objects = [
            object("horse", "0", "0", "10", "10"),
            object("hand", "10", "10", "20", "20"),
        ]
        .concat();
        let xml = annotation(1280, 720, &objects);
        let boxes = parse_ground_truth(&xml, &labels(), (1280, 720)).unwrap();

        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 5);
    }

    /// Fractional corners are kept as floats rather than truncated
    #[test]
    fn test_fractional_and_padded_values() {
        let xml = annotation(1280, 720, &object(" cat ", " 10.5 ", "20", "30.25", "40"));
        let boxes = parse_ground_truth(&xml, &labels(), (1280, 720)).unwrap();

        assert_eq!(boxes[0].class_id, 1);
        assert_eq!(boxes[0].xmin, 10.5);
        assert_eq!(boxes[0].xmax, 30.25);
    }

    #[test]
    fn test_non_numeric_object_is_skipped() {
        let objects = [
            object("cat", "abc", "0", "10", "10"),
            object("dog", "0", "0", "10", "10"),
        ]
        .concat();
        let xml = annotation(1280, 720, &objects);
        let boxes = parse_ground_truth(&xml, &labels(), (1280, 720)).unwrap();

        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 2);
    }

    #[test]
    fn test_object_without_bndbox_is_skipped() {
        let xml = annotation(1280, 720, "  <object><name>cat</name></object>\n");
        let boxes = parse_ground_truth(&xml, &labels(), (1280, 720)).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_missing_or_zero_size_is_malformed() {
        let xml = format!("<annotation>{}</annotation>", object("cat", "0", "0", "1", "1"));
        assert!(matches!(
            parse_ground_truth(&xml, &labels(), (1280, 720)),
            Err(GroundTruthError::Malformed(_))
        ));

        let xml = annotation(0, 720, "");
        assert!(matches!(
            parse_ground_truth(&xml, &labels(), (1280, 720)),
            Err(GroundTruthError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.xml");

        match load_ground_truth(&path, &labels(), (1280, 720)) {
            Err(GroundTruthError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_annotation_path_is_sibling_xml() {
        assert_eq!(
            annotation_path(Path::new("data/cat/img_01.jpg")),
            PathBuf::from("data/cat/img_01.xml")
        );
    }
}
