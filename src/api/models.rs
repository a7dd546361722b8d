use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type NovelId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub novel_id: NovelId,
    pub chapter_number: i64,
    pub title: String,
    /// Raw prose, paragraphs separated by newlines.
    #[serde(default)]
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    /// Paragraphs of the chapter body, blank lines preserved as empty entries.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n').map(|line| line.trim_end_matches('\r'))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Novel {
    pub id: NovelId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default = "default_novel_status")]
    pub status: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

fn default_novel_status() -> String {
    "Ongoing".to_string()
}

impl Novel {
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

/// Per-user shelf state of a novel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkStatus {
    Reading,
    WillRead,
    Completed,
    Dropped,
    Liked,
    Other(String),
}

impl BookmarkStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "reading" => BookmarkStatus::Reading,
            "will_read" => BookmarkStatus::WillRead,
            "completed" => BookmarkStatus::Completed,
            "dropped" => BookmarkStatus::Dropped,
            "liked" => BookmarkStatus::Liked,
            other => BookmarkStatus::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            BookmarkStatus::Reading => "Reading",
            BookmarkStatus::WillRead => "Will read",
            BookmarkStatus::Completed => "Completed",
            BookmarkStatus::Dropped => "Dropped",
            BookmarkStatus::Liked => "Liked",
            BookmarkStatus::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNovelStatus {
    pub novel_id: NovelId,
    pub status: String,
}

impl UserNovelStatus {
    pub fn bookmark(&self) -> BookmarkStatus {
        BookmarkStatus::parse(&self.status)
    }
}

// The API emits naive timestamps for rows created without a zone.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(with_zone) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_zone.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}
