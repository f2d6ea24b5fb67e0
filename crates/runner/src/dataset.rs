use anyhow::Context;
use evaluation::annotation_path;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as images (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One image of the dataset and where its annotation should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image: PathBuf,
    /// Path relative to the dataset root.
    pub relative: PathBuf,
    pub annotation: PathBuf,
}

impl Sample {
    /// Relative path with `/` separators.
    pub fn key(&self) -> String {
        components(&self.relative).join("/")
    }

    /// Every ancestor directory of the image below the dataset root, from
    /// shallowest to deepest: `a/b/img.jpg` gives `a` and `a/b`.
    pub fn scopes(&self) -> Vec<String> {
        let parts = components(&self.relative);
        (1..parts.len()).map(|i| parts[..i].join("/")).collect()
    }
}

fn components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Find every image below `root` in a stable (name-sorted) order.
pub fn discover(root: &Path) -> anyhow::Result<Vec<Sample>> {
    if !root.is_dir() {
        anyhow::bail!("Dataset directory {} does not exist", root.display());
    }

    let mut samples = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable dataset entry");
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !is_image(path) {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", path.display(), root.display()))?
            .to_path_buf();

        samples.push(Sample {
            annotation: annotation_path(path),
            image: path.to_path_buf(),
            relative,
        });
    }

    tracing::info!(images = samples.len(), root = %root.display(), "Discovered dataset");
    Ok(samples)
}
