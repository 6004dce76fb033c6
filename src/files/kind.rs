use crate::models::FileType;

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "xls", "xlsx", "csv", "rtf", "ods", "ppt", "odp", "md", "html",
    "htm", "epub", "pages", "fig", "psd", "ai", "indd", "xd", "sketch", "afdesign", "afphoto",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

/// Classifies a file by the lowercased text after its last dot.
pub fn get_file_type(file_name: &str) -> (FileType, String) {
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return (FileType::Other, String::new()),
    };
    let ext = extension.as_str();

    let kind = if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileType::Document
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        FileType::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileType::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileType::Audio
    } else {
        FileType::Other
    };
    (kind, extension)
}

/// Public URL served by `routes::files::get_file`.
pub fn construct_file_url(base_url: &str, bucket_file_id: &str, file_name: &str) -> String {
    format!(
        "{}/files/{}/{}",
        base_url.trim_end_matches('/'),
        bucket_file_id,
        urlencoding::encode(file_name)
    )
}
