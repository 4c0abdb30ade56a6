use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

static FILE_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("pdf", "PDF"),
        ("doc", "DOC"),
        ("docx", "DOCX"),
        ("csv", "CSV"),
        ("xlsx", "XLSX"),
        ("xls", "XLS"),
        ("txt", "Text"),
        ("zip", "ZIP"),
        ("json", "JSON"),
        ("jpg", "Image"),
        ("jpeg", "Image"),
        ("png", "Image"),
        ("gif", "Image"),
        ("mp4", "Video"),
        ("mp3", "Audio"),
        ("pptx", "PowerPoint"),
        ("ipynb", "Jupyter Notebook"),
        ("py", "Python Script"),
        ("r", "R Script"),
    ])
});

const SIZE_UNITS: [&str; 6] = ["Bytes", "KB", "MB", "GB", "TB", "PB"];

/// Lowercased extension of `original_name`, restricted to ASCII alphanumerics
fn extension(original_name: &str) -> Option<String> {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Display file type inferred from the uploaded file's extension
pub fn file_type_for(original_name: &str) -> &'static str {
    extension(original_name)
        .and_then(|ext| FILE_TYPES.get(ext.as_str()).copied())
        .unwrap_or("Unknown")
}

/// Human-readable size, base 1024, at most two decimals
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// Unique stored name for a dataset upload: `datasetFile-<millis>-<random><.ext>`
pub fn dataset_filename(original_name: &str) -> String {
    let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
    let ext = extension(original_name).map(|e| format!(".{e}")).unwrap_or_default();
    format!("datasetFile-{}-{}{}", Utc::now().timestamp_millis(), suffix, ext)
}

/// One picture per user: `profile_pic_<id>.<ext>`
pub fn profile_picture_filename(user_id: i64, extension: &str) -> String {
    format!("profile_pic_{}.{}", user_id, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_file_types_case_insensitively() {
        assert_eq!(file_type_for("Sales.CSV"), "CSV");
        assert_eq!(file_type_for("model.ipynb"), "Jupyter Notebook");
        assert_eq!(file_type_for("analysis.R"), "R Script");
        assert_eq!(file_type_for("photo.JPEG"), "Image");
        assert_eq!(file_type_for("archive.tar.gz"), "Unknown");
        assert_eq!(file_type_for("README"), "Unknown");
    }

    #[test]
    fn formats_sizes_like_the_listing_expects() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_234_567), "1.18 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn dataset_filenames_are_unique_and_keep_extension() {
        let a = dataset_filename("Sales.CSV");
        let b = dataset_filename("Sales.CSV");
        assert_ne!(a, b);
        assert!(a.starts_with("datasetFile-"));
        assert!(a.ends_with(".csv"));
        assert!(!dataset_filename("../../etc/passwd").contains('/'));
    }

    #[test]
    fn profile_picture_name_is_per_user() {
        assert_eq!(profile_picture_filename(12, "png"), "profile_pic_12.png");
        assert_eq!(profile_picture_filename(7, "jpg"), "profile_pic_7.jpg");
    }
}
