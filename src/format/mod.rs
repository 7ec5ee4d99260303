//! Message content kinds and their display form.
//!
//! Messages travel and are stored as a single string. The kind is encoded
//! with a short marker prefix; [`MessageContent`] is the typed form used by
//! the composer and the renderer, and the string form only appears at the
//! store boundary.

mod markup;

pub use markup::{escape_href, escape_html, to_display_markup};

pub const LOCATION_MARKER: &str = "📍 My location: ";
pub const PHOTO_MARKER: &str = "📷 Photo: ";
pub const ENRICHED_MARKER: &str = "🎬 ";

const MAP_URL: &str = "https://www.google.com/maps?q=";
const DIRECTOR_LINE: &str = "🧑‍🎨 Director: ";
const YEAR_LINE: &str = "🗓 Year: ";
const SUMMARY_LINE: &str = "📝 ";
const ELLIPSIS: &str = "...";

/// Longest summary kept in an enriched excerpt, in characters.
pub const SUMMARY_LIMIT: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    Location,
    Photo,
    Enriched,
}

pub fn classify(content: &str) -> Kind {
    if content.starts_with(LOCATION_MARKER) {
        Kind::Location
    } else if content
        .strip_prefix(PHOTO_MARKER)
        .is_some_and(|rest| rest.starts_with("http"))
    {
        Kind::Photo
    } else if content.starts_with(ENRICHED_MARKER) {
        Kind::Enriched
    } else {
        Kind::Text
    }
}

pub fn to_photo_content(url: &str) -> String {
    format!("{PHOTO_MARKER}{url}")
}

pub fn extract_photo_url(content: &str) -> Option<&str> {
    content.strip_prefix(PHOTO_MARKER).map(str::trim)
}

pub fn map_link(latitude: f64, longitude: f64) -> String {
    format!("{MAP_URL}{latitude},{longitude}")
}

/// A film-style excerpt built from an external content item.
#[derive(Debug, Clone, PartialEq)]
pub struct Excerpt {
    pub title: String,
    pub director: String,
    pub release_date: String,
    /// At most [`SUMMARY_LIMIT`] characters, without the trailing ellipsis.
    pub summary: String,
}

impl Excerpt {
    pub fn new(title: &str, director: &str, release_date: &str, description: &str) -> Self {
        Self {
            title: title.to_owned(),
            director: director.to_owned(),
            release_date: release_date.to_owned(),
            summary: description.chars().take(SUMMARY_LIMIT).collect(),
        }
    }

    fn encode(&self) -> String {
        format!(
            "{ENRICHED_MARKER}*{}*\n{DIRECTOR_LINE}{}\n{YEAR_LINE}{}\n{SUMMARY_LINE}{}{ELLIPSIS}",
            self.title, self.director, self.release_date, self.summary
        )
    }

    fn decode(body: &str) -> Self {
        let mut lines = body.splitn(4, '\n');
        let title = lines.next().unwrap_or_default().trim_matches('*');
        let director = lines.next().unwrap_or_default();
        let year = lines.next().unwrap_or_default();
        let summary = lines.next().unwrap_or_default();

        let summary = summary.strip_prefix(SUMMARY_LINE).unwrap_or(summary);
        Self {
            title: title.to_owned(),
            director: director.strip_prefix(DIRECTOR_LINE).unwrap_or(director).to_owned(),
            release_date: year.strip_prefix(YEAR_LINE).unwrap_or(year).to_owned(),
            summary: summary.strip_suffix(ELLIPSIS).unwrap_or(summary).to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Location { latitude: f64, longitude: f64 },
    Photo { url: String },
    Enriched(Excerpt),
}

impl MessageContent {
    pub fn kind(&self) -> Kind {
        match self {
            MessageContent::Text(_) => Kind::Text,
            MessageContent::Location { .. } => Kind::Location,
            MessageContent::Photo { .. } => Kind::Photo,
            MessageContent::Enriched(_) => Kind::Enriched,
        }
    }

    /// The stored string form.
    pub fn encode(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Location { latitude, longitude } => {
                format!("{LOCATION_MARKER}{}", map_link(*latitude, *longitude))
            }
            MessageContent::Photo { url } => to_photo_content(url),
            MessageContent::Enriched(excerpt) => excerpt.encode(),
        }
    }

    /// Parses the stored string form. Anything that carries a marker but
    /// doesn't parse is kept as plain text.
    pub fn decode(content: &str) -> Self {
        match classify(content) {
            Kind::Text => {}
            Kind::Location => {
                let coords = content
                    .strip_prefix(LOCATION_MARKER)
                    .and_then(|rest| rest.trim().strip_prefix(MAP_URL))
                    .and_then(|pair| pair.split_once(','))
                    .and_then(|(lat, lon)| Some((lat.parse::<f64>().ok()?, lon.parse::<f64>().ok()?)));
                if let Some((latitude, longitude)) = coords {
                    return MessageContent::Location { latitude, longitude };
                }
            }
            Kind::Photo => {
                if let Some(url) = extract_photo_url(content) {
                    return MessageContent::Photo { url: url.to_owned() };
                }
            }
            Kind::Enriched => {
                if let Some(body) = content.strip_prefix(ENRICHED_MARKER) {
                    return MessageContent::Enriched(Excerpt::decode(body));
                }
            }
        }
        MessageContent::Text(content.to_owned())
    }
}
