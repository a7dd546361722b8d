use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::api::{ApiError, Chapter, NovelSource};
use crate::router::Route;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("chapter list unavailable: {0}")]
    Unavailable(#[from] ApiError),

    #[error("novel {novel_id} has no chapter {chapter_number}")]
    NotFound { novel_id: i64, chapter_number: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChapter {
    pub chapter: Chapter,
    /// Highest chapter number in the list the chapter was found in.
    pub last_chapter_number: i64,
}

/// First chapter in `chapters` carrying `number`.
pub fn find_chapter(chapters: &[Chapter], number: i64) -> Option<&Chapter> {
    chapters.iter().find(|ch| ch.chapter_number == number)
}

/// Maps a route to a chapter by scanning the novel's full chapter list.
///
/// Nothing is cached: every call fetches the list again.
#[derive(Clone)]
pub struct ChapterResolver {
    source: Arc<dyn NovelSource>,
}

impl ChapterResolver {
    pub fn new(source: Arc<dyn NovelSource>) -> Self {
        Self { source }
    }

    pub fn resolve(&self, route: Route) -> Result<ResolvedChapter, ResolveError> {
        let chapters = self.source.list_chapters(route.novel_id).map_err(|e| {
            warn!("Failed to load chapters of novel {}: {}", route.novel_id, e);
            e
        })?;

        let Some(chapter) = find_chapter(&chapters, route.chapter_number) else {
            debug!(
                "Chapter {} not in {} chapters of novel {}",
                route.chapter_number,
                chapters.len(),
                route.novel_id
            );
            return Err(ResolveError::NotFound {
                novel_id: route.novel_id,
                chapter_number: route.chapter_number,
            });
        };

        let last_chapter_number = chapters
            .iter()
            .map(|ch| ch.chapter_number)
            .max()
            .unwrap_or(chapter.chapter_number);

        Ok(ResolvedChapter {
            chapter: chapter.clone(),
            last_chapter_number,
        })
    }
}
