//! Enrollment: extract an embedding from an image file and store it.

use anyhow::{Context, Result};
use rollcall_core::FaceAnalyzer;
use rollcall_store::FaceDb;
use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Enroll a single image under the given name. Returns the new record id.
pub async fn enroll_file(
    db: &FaceDb,
    analyzer: &mut FaceAnalyzer,
    name: &str,
    personnel_id: Option<String>,
    path: &Path,
) -> Result<String> {
    let image = image::open(path)
        .with_context(|| format!("could not read image {}", path.display()))?
        .to_rgb8();

    let (width, height) = image.dimensions();
    let (face, total) = analyzer.analyze_primary(image.as_raw(), width, height)?;

    if total > 1 {
        println!("warning: {total} faces in {}, using the most confident", path.display());
    }

    let id = db.add(name, &face.embedding, personnel_id).await?;
    Ok(id)
}

/// Enroll every image file in a directory. The person name is the file stem
/// (`john.jpg` enrolls "john"). Returns `(added, total)` counts.
pub async fn enroll_dir(db: &FaceDb, analyzer: &mut FaceAnalyzer, dir: &Path) -> Result<(usize, usize)> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("could not read directory {}", dir.display()))?;

    let mut total = 0usize;
    let mut added = 0usize;

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| is_image_file(p))
        .collect();
    paths.sort();

    for path in paths {
        total += 1;

        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            println!("skipped {} (unusable file name)", path.display());
            continue;
        };
        let name = name.to_string();

        match enroll_file(db, analyzer, &name, None, &path).await {
            Ok(id) => {
                println!("added '{name}' ({id}) from {}", path.display());
                added += 1;
            }
            Err(e) => println!("failed on {}: {e:#}", path.display()),
        }
    }

    Ok((added, total))
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}
