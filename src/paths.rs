//! Helpers for blob paths. Blob stores use `/` as the only separator.

pub const SEPARATOR: char = '/';

/// Folder under the output folder that receives untouched copies of the sources
pub const BACKUP_FOLDER: &str = "original";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Join path segments with `/`, dropping empty pieces so that no doubled,
/// leading or trailing separators survive.
pub fn join_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .flat_map(|segment| segment.split(SEPARATOR))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Last segment of a blob path
pub fn file_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

pub fn is_directory_marker(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => Some(&name[idx + 1..]),
        _ => None,
    }
}

pub fn is_supported_image(path: &str) -> bool {
    extension(path)
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
        .unwrap_or(false)
}

pub fn backup_path(output_folder: &str, file_name: &str) -> String {
    join_path([output_folder, BACKUP_FOLDER, file_name])
}

pub fn styled_path(output_folder: &str, style: &str, file_name: &str) -> String {
    join_path([output_folder, style, file_name])
}

/// MIME type for a supported image path
pub fn mime_type(path: &str) -> &'static str {
    match extension(path) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            "image/jpeg"
        }
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalizes_separators() {
        assert_eq!(styled_path("", "watercolor", "a.png"), "watercolor/a.png");
        assert_eq!(styled_path("output/", "watercolor", "a.png"), "output/watercolor/a.png");
        assert_eq!(styled_path("output", "watercolor", "a.png"), "output/watercolor/a.png");
        assert_eq!(styled_path("/out//nested/", "anime", "b.jpg"), "out/nested/anime/b.jpg");
        assert_eq!(backup_path("output", "a.png"), "output/original/a.png");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("source/sub/photo.png"), "photo.png");
        assert_eq!(file_name("photo.png"), "photo.png");
    }

    #[test]
    fn test_image_filter() {
        assert!(is_supported_image("source/photo.JPG"));
        assert!(is_supported_image("source/photo.jpeg"));
        assert!(is_supported_image("source/photo.Png"));
        assert!(!is_supported_image("source/readme.txt"));
        assert!(!is_supported_image("source/png"));
        assert!(!is_supported_image("source/photo."));
        assert!(is_directory_marker("source/sub/"));
        assert!(!is_directory_marker("source/sub/a.png"));
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("a.PNG"), "image/png");
        assert_eq!(mime_type("a.jpeg"), "image/jpeg");
        assert_eq!(mime_type("a.gif"), "application/octet-stream");
    }
}
