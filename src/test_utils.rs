//! In-memory backend and helpers shared by unit and integration tests.

use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::api::{ApiError, Chapter, Novel, NovelId, NovelSource, UserNovelStatus};

pub fn fake_chapter(novel_id: NovelId, chapter_number: i64) -> Chapter {
    Chapter {
        id: novel_id * 1000 + chapter_number,
        novel_id,
        chapter_number,
        title: format!("Chapter title {chapter_number}"),
        content: format!(
            "Opening line of chapter {chapter_number}.\n\nMiddle of chapter {chapter_number}.\nClosing line of chapter {chapter_number}."
        ),
        created_at: Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

/// Fake Novera backend.
///
/// Can be switched offline, and paused so chapter requests block until
/// [`FakeLibrary::resume`] is called.
#[derive(Default)]
pub struct FakeLibrary {
    novels: Mutex<Vec<Novel>>,
    statuses: Mutex<Vec<UserNovelStatus>>,
    token: Mutex<Option<String>>,
    offline: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
    chapter_requests: AtomicUsize,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a novel whose chapters carry the given numbers, in order.
    pub fn with_novel(self, novel_id: NovelId, title: &str, chapter_numbers: &[i64]) -> Self {
        let chapters = chapter_numbers
            .iter()
            .enumerate()
            .map(|(position, number)| {
                let mut chapter = fake_chapter(novel_id, *number);
                chapter.id = novel_id * 1000 + position as i64;
                chapter
            })
            .collect();
        self.with_novel_record(Novel {
            id: novel_id,
            title: title.to_string(),
            description: Some(format!("Description of {title}")),
            author: Some("A. Writer".to_string()),
            genre: Some("Fantasy".to_string()),
            status: "Ongoing".to_string(),
            rating: 4.5,
            owner_id: Some(1),
            chapters,
        })
    }

    pub fn with_novel_record(self, novel: Novel) -> Self {
        if let Ok(mut novels) = self.novels.lock() {
            novels.push(novel);
        }
        self
    }

    pub fn with_status(self, token: &str, novel_id: NovelId, status: &str) -> Self {
        if let Ok(mut stored) = self.token.lock() {
            *stored = Some(token.to_string());
        }
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(UserNovelStatus {
                novel_id,
                status: status.to_string(),
            });
        }
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        if let Ok(mut paused) = self.paused.lock() {
            *paused = true;
        }
    }

    pub fn resume(&self) {
        if let Ok(mut paused) = self.paused.lock() {
            *paused = false;
        }
        self.resumed.notify_all();
    }

    pub fn chapter_requests(&self) -> usize {
        self.chapter_requests.load(Ordering::SeqCst)
    }

    fn wait_while_paused(&self) {
        if let Ok(mut paused) = self.paused.lock() {
            while *paused {
                match self.resumed.wait(paused) {
                    Ok(guard) => paused = guard,
                    Err(_) => return,
                }
            }
        }
    }

    fn check_online(&self, path: &str) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                url: format!("http://fake{path}"),
            });
        }
        Ok(())
    }

    fn not_found(path: String) -> ApiError {
        ApiError::Status {
            status: 404,
            url: format!("http://fake{path}"),
        }
    }

    fn novel(&self, novel_id: NovelId) -> Option<Novel> {
        self.novels
            .lock()
            .ok()
            .and_then(|novels| novels.iter().find(|n| n.id == novel_id).cloned())
    }
}

impl NovelSource for FakeLibrary {
    fn list_novels(&self) -> Result<Vec<Novel>, ApiError> {
        self.check_online("/novels/")?;
        Ok(self
            .novels
            .lock()
            .map(|novels| novels.clone())
            .unwrap_or_default())
    }

    fn get_novel(&self, novel_id: NovelId) -> Result<Novel, ApiError> {
        let path = format!("/novels/{novel_id}");
        self.check_online(&path)?;
        self.novel(novel_id).ok_or_else(|| Self::not_found(path))
    }

    fn list_chapters(&self, novel_id: NovelId) -> Result<Vec<Chapter>, ApiError> {
        self.chapter_requests.fetch_add(1, Ordering::SeqCst);
        self.wait_while_paused();
        let path = format!("/novels/{novel_id}/chapters/");
        self.check_online(&path)?;
        self.novel(novel_id)
            .map(|novel| novel.chapters)
            .ok_or_else(|| Self::not_found(path))
    }

    fn user_statuses(&self, token: &str) -> Result<Vec<UserNovelStatus>, ApiError> {
        self.check_online("/user/novels/status/")?;
        let authorized = self
            .token
            .lock()
            .map(|stored| stored.as_deref() == Some(token))
            .unwrap_or(false);
        if !authorized {
            return Err(ApiError::Status {
                status: 401,
                url: "http://fake/user/novels/status/".to_string(),
            });
        }
        Ok(self
            .statuses
            .lock()
            .map(|statuses| statuses.clone())
            .unwrap_or_default())
    }
}

pub mod test_helpers {
    use std::sync::Arc;

    use ratatui::{Terminal, backend::TestBackend};

    use super::FakeLibrary;
    use crate::main_app::App;
    use crate::preferences::PreferenceStore;
    use crate::router::Screen;
    use crate::settings::NextChapterPolicy;

    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).expect("test backend never fails")
    }

    pub fn create_test_app(
        library: Arc<FakeLibrary>,
        preferences: Arc<PreferenceStore>,
        initial: Screen,
    ) -> App {
        App::with_source(
            library,
            preferences,
            NextChapterPolicy::Optimistic,
            None,
            initial,
        )
    }

    /// Every cell of the last drawn frame, one string per row.
    pub fn buffer_lines(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    pub fn screen_contains(terminal: &Terminal<TestBackend>, needle: &str) -> bool {
        buffer_lines(terminal).iter().any(|line| line.contains(needle))
    }
}
