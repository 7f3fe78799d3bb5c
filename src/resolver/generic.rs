use reqwest::{header::CONTENT_TYPE, Client};
use scraper::{Html, Selector};
use tracing::{debug, trace};
use url::Url;

use super::Resolver;
use crate::{
    error::ResolveError,
    helpers::{
        domain::DomainParser,
        media_type::{self, BodyKind},
    },
    model::{MediaKind, Provider, ResolvedMetadata},
};

/// Whatever a page advertises about itself.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site: Option<String>,
    pub audio: Option<String>,
}
impl PageMeta {
    pub fn parse(html: &str, base: &Url) -> Self {
        let doc = Html::parse_document(html);

        let meta = |attr: &str, key: &str| -> Option<String> {
            let selector = Selector::parse(&format!(r#"meta[{attr}="{key}"]"#)).ok()?;
            doc.select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(ToString::to_string)
        };
        let absolute = |raw: String| base.join(&raw).map(String::from).ok();

        let title = meta("property", "og:title").or_else(|| {
            let selector = Selector::parse("title").ok()?;
            doc.select(&selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        });

        Self {
            title,
            description: meta("property", "og:description").or_else(|| meta("name", "description")),
            image: meta("property", "og:image")
                .or_else(|| meta("name", "twitter:image"))
                .and_then(absolute),
            site: meta("property", "og:site_name"),
            audio: meta("property", "og:audio")
                .or_else(|| meta("property", "og:audio:url"))
                .and_then(absolute),
        }
    }

    fn into_metadata(self, url: &Url) -> ResolvedMetadata {
        let mut meta = ResolvedMetadata::empty(Provider::Generic, MediaKind::Page, url.as_str());
        meta.title = self.title;
        meta.description = self.description;
        meta.images.extend(self.image);
        meta.site = self
            .site
            .or_else(|| DomainParser::get_domain_root(url).map(ToString::to_string));
        meta.preview_or_stream_url = self.audio;
        meta
    }
}

#[derive(Debug)]
pub struct GenericResolver {
    client: Client,
}

#[async_trait::async_trait]
impl Resolver for GenericResolver {
    fn provider(&self) -> Provider {
        Provider::Generic
    }

    /// Never fails: a page that cannot be fetched or parsed resolves to an
    /// empty record.
    #[tracing::instrument(skip(self, url), fields(url = ?url.as_str()))]
    async fn resolve(&self, url: &Url) -> Result<ResolvedMetadata, ResolveError> {
        match self.scrape(url).await {
            Ok(meta) => Ok(meta),
            Err(e) => {
                debug!(?e, "Page scrape failed, returning empty metadata");
                Ok(ResolvedMetadata::empty(
                    Provider::Generic,
                    MediaKind::Page,
                    url.as_str(),
                ))
            }
        }
    }
}

impl GenericResolver {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    async fn scrape(&self, url: &Url) -> anyhow::Result<ResolvedMetadata> {
        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        trace!(?content_type, "Got page response");

        match media_type::body_kind(&content_type) {
            BodyKind::Html => {
                let body = resp.text().await?;
                Ok(PageMeta::parse(&body, url).into_metadata(url))
            }
            BodyKind::Audio => Ok(direct_audio(url)),
            BodyKind::Opaque if media_type::has_audio_extension(url.as_str()) => {
                Ok(direct_audio(url))
            }
            // body is never read; dropping the response closes the transfer
            BodyKind::Opaque | BodyKind::Other => Ok(ResolvedMetadata::empty(
                Provider::Generic,
                MediaKind::Page,
                url.as_str(),
            )),
        }
    }
}

/// The URL itself is an audio file.
fn direct_audio(url: &Url) -> ResolvedMetadata {
    let mut meta = ResolvedMetadata::empty(Provider::Generic, MediaKind::Page, url.as_str());
    meta.title = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| {
            percent_encoding::percent_decode_str(s)
                .decode_utf8_lossy()
                .into_owned()
        });
    meta.site = DomainParser::get_domain_root(url).map(ToString::to_string);
    meta.preview_or_stream_url = Some(url.to_string());
    meta
}
