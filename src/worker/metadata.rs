use serde::Deserialize;

use crate::{
    helpers::sanitize,
    model::Provider,
    resolver::{classify, video_id},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArtistRef {
    Named { name: String },
    Plain(String),
}
impl ArtistRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name } | Self::Plain(name) => name,
        }
    }
}

/// Lenient view of a job's metadata object.
///
/// Accepts both resolver output and hand-written records such as
/// `{"title": "Foo", "artist": "Bar"}`; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobMetadata {
    pub provider: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub artists: Vec<ArtistRef>,
    pub tracks: Vec<JobMetadata>,
    pub preview_or_stream_url: Option<String>,
    pub url: Option<String>,
}

/// Where the audio for one track comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A YouTube video, fetched with yt-dlp.
    Video(String),
    /// A plain audio file, downloaded and then transcoded.
    Direct(String),
    /// No usable link; a yt-dlp search query.
    Search(String),
}

impl JobMetadata {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown title")
    }

    pub fn display_artist(&self) -> Option<String> {
        if let Some(artist) = self.artist.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            return Some(artist.to_string());
        }

        let names: Vec<&str> = self
            .artists
            .iter()
            .map(ArtistRef::name)
            .filter(|n| !n.trim().is_empty())
            .collect();

        if names.is_empty() {
            None
        } else {
            Some(names.join(", "))
        }
    }

    /// Name for an album or playlist directory.
    pub fn collection_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    /// `{title} - {artist}`, before sanitizing.
    pub fn file_stem(&self) -> String {
        match self.display_artist() {
            Some(artist) => format!("{} - {artist}", self.display_title()),
            None => self.display_title().to_string(),
        }
    }

    /// `{title} - {artist}.{ext}`, sanitized for the file system.
    pub fn file_name(&self, ext: &str) -> String {
        sanitize::file_name(&self.file_stem(), ext, "untitled")
    }

    pub fn source(&self) -> AudioSource {
        let links = [self.url.as_deref(), self.preview_or_stream_url.as_deref()];

        if let Some(id) = links.iter().flatten().find_map(|l| video_id(l)) {
            return AudioSource::Video(format!("https://www.youtube.com/watch?v={id}"));
        }

        let generic = self
            .provider
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("generic"));
        if generic {
            if let Some(direct) = self
                .preview_or_stream_url
                .as_deref()
                .filter(|l| classify(l) == Provider::Generic)
            {
                return AudioSource::Direct(direct.to_string());
            }
        }

        let query = match self.display_artist() {
            Some(artist) => format!("{artist} - {}", self.display_title()),
            None => self.display_title().to_string(),
        };

        AudioSource::Search(query)
    }
}
