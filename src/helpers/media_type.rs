/// Extensions a URL may end in for us to treat it as an audio file.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "ogg", "oga", "opus", "flac", "wav", "weba", "wma", "aiff",
];

/// What a response's `Content-Type` says about its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    Audio,
    /// `application/octet-stream` or no content type at all.
    Opaque,
    Other,
}

/// `audio/mpeg; charset=binary` -> `audio/mpeg`
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn body_kind(content_type: &str) -> BodyKind {
    let mime = essence(content_type);

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => BodyKind::Html,
        "" | "application/octet-stream" | "binary/octet-stream" => BodyKind::Opaque,
        m if m.starts_with("audio/") => BodyKind::Audio,
        _ => BodyKind::Other,
    }
}

pub fn audio_mime_extension(content_type: &str) -> Option<&'static str> {
    match essence(content_type).as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/aac" => Some("aac"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}

/// Extension of the last path segment, ignoring query and fragment.
pub fn url_extension(url: &str) -> Option<&str> {
    url.split(['?', '#'])
        .next()
        .and_then(|p| p.rsplit_once('/'))
        .and_then(|(_, file)| file.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| {
            (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

pub fn has_audio_extension(url: &str) -> bool {
    url_extension(url).is_some_and(|ext| {
        AUDIO_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}
