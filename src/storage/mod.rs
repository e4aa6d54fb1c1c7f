use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

pub fn generate_proof_filename(original: &str) -> String {
    let safe = original.replace(['/', '\\', ' '], "_");
    format!(
        "{}_{}_{}",
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().to_string()[..8],
        safe
    )
}

pub fn ensure_dirs(upload_folder: &PathBuf) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)?;
    Ok(())
}
