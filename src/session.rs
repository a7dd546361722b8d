//! One mounted chapter view and its state machine.
//!
//! A session starts in [`SessionState::Initializing`], moves to
//! [`SessionState::Loading`] on [`ReaderSession::begin`], and ends in either
//! `Ready` or `NotFound`. Preference hydration runs next to the chapter fetch
//! and is tracked separately by [`ReaderSession::is_hydrated`].
//!
//! Results are delivered as [`SessionEvent`]s tagged with the [`FetchTicket`]
//! they were issued for. A session only accepts events carrying its own
//! ticket, so a response that arrives after the route changed is dropped.

use log::{debug, info};
use std::sync::Arc;

use crate::api::Chapter;
use crate::preferences::{
    MAX_FONT_SIZE, MIN_FONT_SIZE, PreferenceStore, ReaderPreferences, StoredPreferences,
    clamp_font_size,
};
use crate::resolver::{ResolveError, ResolvedChapter};
use crate::router::Route;
use crate::settings::NextChapterPolicy;
use crate::theme::ReaderTheme;

/// Identifies the session a background result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub generation: u64,
    pub route: Route,
}

#[derive(Debug)]
pub enum SessionEvent {
    PreferencesHydrated {
        ticket: FetchTicket,
        stored: StoredPreferences,
    },
    ChapterLoaded {
        ticket: FetchTicket,
        result: Result<ResolvedChapter, ResolveError>,
    },
}

impl SessionEvent {
    pub fn ticket(&self) -> FetchTicket {
        match self {
            SessionEvent::PreferencesHydrated { ticket, .. }
            | SessionEvent::ChapterLoaded { ticket, .. } => *ticket,
        }
    }
}

/// Why a session ended without a chapter. Both render as "chapter not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    Missing,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Initializing,
    Loading,
    Ready(Box<ResolvedChapter>),
    NotFound(NotFoundReason),
}

/// A font size change made before the saved preferences arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingFontSize {
    /// An explicit size; it replaces the saved one.
    Absolute(u16),
    /// `+`/`-` steps; they are replayed on top of the saved size.
    Relative(i16),
}

pub struct ReaderSession {
    ticket: FetchTicket,
    state: SessionState,
    policy: NextChapterPolicy,

    preferences: ReaderPreferences,
    store: Arc<PreferenceStore>,
    hydrated: bool,
    // Changes made by the user before hydration finished
    pending_font: Option<PendingFontSize>,
    theme_touched: bool,

    scroll_offset: usize,
    max_scroll: usize,
}

impl ReaderSession {
    pub fn new(
        route: Route,
        generation: u64,
        store: Arc<PreferenceStore>,
        policy: NextChapterPolicy,
    ) -> Self {
        Self {
            ticket: FetchTicket { generation, route },
            state: SessionState::Initializing,
            policy,
            preferences: ReaderPreferences::default(),
            store,
            hydrated: false,
            pending_font: None,
            theme_touched: false,
            scroll_offset: 0,
            max_scroll: 0,
        }
    }

    pub fn route(&self) -> Route {
        self.ticket.route
    }

    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        match &self.state {
            SessionState::Ready(resolved) => Some(&resolved.chapter),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            SessionState::Initializing | SessionState::Loading
        )
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn preferences(&self) -> ReaderPreferences {
        self.preferences
    }

    pub fn theme(&self) -> ReaderTheme {
        self.preferences.theme
    }

    /// Starts loading. Returns the ticket background work must carry.
    pub fn begin(&mut self) -> FetchTicket {
        if matches!(self.state, SessionState::Initializing) {
            debug!("Session {} loading {}", self.ticket.generation, self.route());
            self.state = SessionState::Loading;
        }
        self.ticket
    }

    /// Applies a background result. Returns false when the event was discarded.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        if event.ticket() != self.ticket {
            debug!(
                "Discarding stale result for {} (generation {}), session is {} (generation {})",
                event.ticket().route,
                event.ticket().generation,
                self.route(),
                self.ticket.generation
            );
            return false;
        }

        match event {
            SessionEvent::PreferencesHydrated { stored, .. } => self.finish_hydration(&stored),
            SessionEvent::ChapterLoaded { result, .. } => self.finish_loading(result),
        }
    }

    fn finish_hydration(&mut self, stored: &StoredPreferences) -> bool {
        if self.hydrated {
            return false;
        }

        let mut merged = self.preferences;
        merged.apply_stored(stored);
        self.preferences.font_size_px = match self.pending_font {
            None => merged.font_size_px,
            Some(PendingFontSize::Absolute(size)) => size,
            Some(PendingFontSize::Relative(steps)) => {
                clamp_font_size(merged.font_size_px.saturating_add_signed(steps))
            }
        };
        if !self.theme_touched {
            self.preferences.theme = merged.theme;
        }
        self.hydrated = true;
        debug!(
            "Hydrated preferences: {}px, {}",
            self.preferences.font_size_px,
            self.preferences.theme.name()
        );

        let changed = self.pending_font.take().is_some() || self.theme_touched;
        if changed {
            self.persist();
        }
        true
    }

    fn finish_loading(&mut self, result: Result<ResolvedChapter, ResolveError>) -> bool {
        if !self.is_loading() {
            return false;
        }

        self.state = match result {
            Ok(resolved) => {
                info!(
                    "Opened chapter {} of novel {}: {}",
                    resolved.chapter.chapter_number,
                    resolved.chapter.novel_id,
                    resolved.chapter.title
                );
                SessionState::Ready(Box::new(resolved))
            }
            Err(ResolveError::NotFound { .. }) => {
                info!("Chapter not found: {}", self.route());
                SessionState::NotFound(NotFoundReason::Missing)
            }
            Err(ResolveError::Unavailable(e)) => {
                info!("Chapter unavailable: {} ({})", self.route(), e);
                SessionState::NotFound(NotFoundReason::Unavailable(e.to_string()))
            }
        };
        self.scroll_offset = 0;
        true
    }

    fn persist(&self) {
        if self.hydrated {
            self.store
                .persist(self.preferences.font_size_px, self.preferences.theme.name());
        }
    }

    // Preferences

    pub fn set_theme(&mut self, theme: ReaderTheme) {
        if self.preferences.theme == theme {
            return;
        }
        self.preferences.theme = theme;
        self.theme_touched = true;
        self.persist();
    }

    pub fn cycle_theme(&mut self) {
        self.set_theme(self.preferences.theme.next());
    }

    pub fn set_font_size(&mut self, size: u16) {
        let size = clamp_font_size(size);
        if self.preferences.font_size_px == size {
            return;
        }
        self.preferences.font_size_px = size;
        if !self.hydrated {
            self.pending_font = Some(PendingFontSize::Absolute(size));
        }
        self.persist();
    }

    pub fn increase_font(&mut self) {
        if self.preferences.font_size_px < MAX_FONT_SIZE {
            self.step_font(1);
        }
    }

    pub fn decrease_font(&mut self) {
        if self.preferences.font_size_px > MIN_FONT_SIZE {
            self.step_font(-1);
        }
    }

    fn step_font(&mut self, step: i16) {
        let size = clamp_font_size(self.preferences.font_size_px.saturating_add_signed(step));
        if self.preferences.font_size_px == size {
            return;
        }
        self.preferences.font_size_px = size;
        if !self.hydrated {
            self.pending_font = Some(match self.pending_font {
                Some(PendingFontSize::Absolute(_)) => PendingFontSize::Absolute(size),
                Some(PendingFontSize::Relative(steps)) => PendingFontSize::Relative(steps + step),
                None => PendingFontSize::Relative(step),
            });
        }
        self.persist();
    }

    // Navigation

    pub fn has_previous(&self) -> bool {
        self.route().chapter_number > 1
    }

    pub fn has_next(&self) -> bool {
        match (&self.state, self.policy) {
            (SessionState::Ready(_), NextChapterPolicy::Optimistic) => true,
            (SessionState::Ready(resolved), NextChapterPolicy::Bounded) => {
                self.route().chapter_number < resolved.last_chapter_number
            }
            _ => false,
        }
    }

    /// Route of the previous chapter, `None` at chapter 1 or before the chapter loaded.
    pub fn previous_route(&self) -> Option<Route> {
        if !matches!(self.state, SessionState::Ready(_)) || !self.has_previous() {
            return None;
        }
        let route = self.route();
        Some(route.with_chapter(route.chapter_number - 1))
    }

    pub fn next_route(&self) -> Option<Route> {
        if !self.has_next() {
            return None;
        }
        let route = self.route();
        route
            .chapter_number
            .checked_add(1)
            .map(|number| route.with_chapter(number))
    }

    // Scrolling

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Updates the scroll bound after layout.
    pub fn set_content_height(&mut self, total_lines: usize, visible_lines: usize) {
        self.max_scroll = total_lines.saturating_sub(visible_lines);
        self.scroll_offset = self.scroll_offset.min(self.max_scroll);
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add_signed(delta)
            .min(self.max_scroll);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::preferences::{MemoryKeyValueStore, UnavailableStore};
    use crate::test_utils::fake_chapter;

    fn store() -> Arc<PreferenceStore> {
        Arc::new(PreferenceStore::new(Arc::new(MemoryKeyValueStore::new())))
    }

    fn session(route: Route, store: Arc<PreferenceStore>) -> ReaderSession {
        ReaderSession::new(route, 1, store, NextChapterPolicy::Optimistic)
    }

    fn loaded(ticket: FetchTicket, last: i64) -> SessionEvent {
        SessionEvent::ChapterLoaded {
            ticket,
            result: Ok(ResolvedChapter {
                chapter: fake_chapter(ticket.route.novel_id, ticket.route.chapter_number),
                last_chapter_number: last,
            }),
        }
    }

    fn hydrated(ticket: FetchTicket, size: Option<u16>, theme: Option<&str>) -> SessionEvent {
        SessionEvent::PreferencesHydrated {
            ticket,
            stored: StoredPreferences {
                font_size_px: size,
                theme_name: theme.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_lifecycle_to_ready() {
        let mut s = session(Route::new(42, 2), store());
        assert_eq!(s.state(), &SessionState::Initializing);

        let ticket = s.begin();
        assert_eq!(s.state(), &SessionState::Loading);
        assert!(s.apply(loaded(ticket, 2)));

        assert_eq!(s.chapter().map(|c| c.chapter_number), Some(2));
        assert!(!s.is_loading());
    }

    #[test]
    fn test_missing_chapter_and_api_failure_are_not_found() {
        let mut s = session(Route::new(42, 3), store());
        let ticket = s.begin();
        s.apply(SessionEvent::ChapterLoaded {
            ticket,
            result: Err(ResolveError::NotFound {
                novel_id: 42,
                chapter_number: 3,
            }),
        });
        assert_eq!(s.state(), &SessionState::NotFound(NotFoundReason::Missing));

        let mut s = session(Route::new(42, 1), store());
        let ticket = s.begin();
        s.apply(SessionEvent::ChapterLoaded {
            ticket,
            result: Err(ResolveError::Unavailable(ApiError::Status {
                status: 500,
                url: "http://localhost:8000/novels/42/chapters/".to_string(),
            })),
        });
        assert!(matches!(
            s.state(),
            SessionState::NotFound(NotFoundReason::Unavailable(_))
        ));
        assert_eq!(s.previous_route(), None);
        assert_eq!(s.next_route(), None);
    }

    #[test]
    fn test_stale_chapter_response_is_discarded() {
        let chapter_three = session(Route::new(42, 3), store()).begin();

        let mut s = ReaderSession::new(Route::new(42, 4), 2, store(), NextChapterPolicy::Optimistic);
        s.begin();
        assert!(!s.apply(loaded(chapter_three, 10)));
        assert_eq!(s.state(), &SessionState::Loading);
    }

    #[test]
    fn test_same_route_older_generation_is_discarded() {
        let route = Route::new(42, 3);
        let old = ReaderSession::new(route, 1, store(), NextChapterPolicy::Optimistic).ticket();
        let mut s = ReaderSession::new(route, 2, store(), NextChapterPolicy::Optimistic);
        s.begin();
        assert!(!s.apply(loaded(old, 3)));
        assert!(s.is_loading());
    }

    #[test]
    fn test_no_persist_before_hydration() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let prefs = Arc::new(PreferenceStore::new(kv.clone()));
        prefs.persist(22, "sepia");

        let mut s = session(Route::new(1, 1), prefs.clone());
        s.begin();
        s.increase_font();
        // Saved values are untouched until hydration completes
        assert_eq!(prefs.hydrate().font_size_px, Some(22));
        assert_eq!(s.preferences().font_size_px, 19);
    }

    #[test]
    fn test_hydration_keeps_user_changes_and_then_persists() {
        let prefs = store();
        prefs.persist(22, "sepia");

        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.set_theme(ReaderTheme::Black);
        assert!(s.apply(hydrated(ticket, Some(22), Some("sepia"))));

        assert_eq!(s.theme(), ReaderTheme::Black);
        assert_eq!(s.preferences().font_size_px, 22);
        let saved = prefs.hydrate();
        assert_eq!(saved.theme_name.as_deref(), Some("black"));
        assert_eq!(saved.font_size_px, Some(22));
    }

    #[test]
    fn test_font_steps_before_hydration_apply_to_saved_size() {
        let prefs = store();
        prefs.persist(22, "sepia");

        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.increase_font();
        assert!(s.apply(hydrated(ticket, Some(22), Some("sepia"))));

        assert_eq!(s.preferences().font_size_px, 23);
        assert_eq!(s.theme(), ReaderTheme::Sepia);
        let saved = prefs.hydrate();
        assert_eq!(saved.font_size_px, Some(23));
        assert_eq!(saved.theme_name.as_deref(), Some("sepia"));
    }

    #[test]
    fn test_font_steps_before_hydration_are_clamped() {
        let prefs = store();
        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.increase_font();
        s.increase_font();
        s.apply(hydrated(ticket, Some(MAX_FONT_SIZE - 1), None));
        assert_eq!(s.preferences().font_size_px, MAX_FONT_SIZE);

        let mut s = session(Route::new(1, 1), store());
        let ticket = s.begin();
        s.decrease_font();
        s.decrease_font();
        s.decrease_font();
        s.increase_font();
        s.apply(hydrated(ticket, Some(20), None));
        assert_eq!(s.preferences().font_size_px, 18);
    }

    #[test]
    fn test_explicit_size_before_hydration_wins() {
        let prefs = store();
        prefs.persist(22, "sepia");

        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.set_font_size(14);
        s.increase_font();
        s.apply(hydrated(ticket, Some(22), Some("sepia")));

        assert_eq!(s.preferences().font_size_px, 15);
        assert_eq!(prefs.hydrate().font_size_px, Some(15));
    }

    #[test]
    fn test_hydration_without_changes_does_not_write() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let prefs = Arc::new(PreferenceStore::new(kv));
        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.apply(hydrated(ticket, None, None));

        assert!(s.is_hydrated());
        assert_eq!(prefs.hydrate(), StoredPreferences::default());
    }

    #[test]
    fn test_changes_after_hydration_persist() {
        let prefs = store();
        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.apply(hydrated(ticket, None, None));

        s.set_font_size(26);
        s.cycle_theme();
        let saved = prefs.hydrate();
        assert_eq!(saved.font_size_px, Some(26));
        assert_eq!(saved.theme_name.as_deref(), Some("black"));
    }

    #[test]
    fn test_invalid_hydrated_theme_uses_default() {
        let mut s = session(Route::new(1, 1), store());
        let ticket = s.begin();
        s.apply(hydrated(ticket, Some(20), Some("ultraviolet")));
        assert_eq!(s.theme(), ReaderTheme::default());
        assert_eq!(s.preferences().font_size_px, 20);
    }

    #[test]
    fn test_second_hydration_is_ignored() {
        let mut s = session(Route::new(1, 1), store());
        let ticket = s.begin();
        assert!(s.apply(hydrated(ticket, Some(20), Some("light"))));
        assert!(!s.apply(hydrated(ticket, Some(30), Some("black"))));
        assert_eq!(s.theme(), ReaderTheme::Light);
    }

    #[test]
    fn test_unavailable_storage_keeps_session_working() {
        let prefs = Arc::new(PreferenceStore::new(Arc::new(UnavailableStore)));
        let mut s = session(Route::new(1, 1), prefs.clone());
        let ticket = s.begin();
        s.apply(hydrated(ticket, None, None));
        s.set_theme(ReaderTheme::Sepia);
        assert_eq!(s.theme(), ReaderTheme::Sepia);
    }

    #[test]
    fn test_font_size_bounds() {
        let mut s = session(Route::new(1, 1), store());
        s.set_font_size(MAX_FONT_SIZE);
        s.increase_font();
        assert_eq!(s.preferences().font_size_px, MAX_FONT_SIZE);
        s.set_font_size(0);
        assert_eq!(s.preferences().font_size_px, MIN_FONT_SIZE);
        s.decrease_font();
        assert_eq!(s.preferences().font_size_px, MIN_FONT_SIZE);
    }

    #[test]
    fn test_previous_is_blocked_at_first_chapter() {
        let mut s = session(Route::new(42, 1), store());
        let ticket = s.begin();
        s.apply(loaded(ticket, 2));
        assert!(!s.has_previous());
        assert_eq!(s.previous_route(), None);
        assert_eq!(s.next_route(), Some(Route::new(42, 2)));
    }

    #[test]
    fn test_optimistic_next_past_last_chapter() {
        let mut s = session(Route::new(42, 2), store());
        let ticket = s.begin();
        s.apply(loaded(ticket, 2));
        assert_eq!(s.previous_route(), Some(Route::new(42, 1)));
        assert_eq!(s.next_route(), Some(Route::new(42, 3)));
    }

    #[test]
    fn test_bounded_next_stops_at_last_chapter() {
        let mut s = ReaderSession::new(Route::new(42, 2), 1, store(), NextChapterPolicy::Bounded);
        let ticket = s.begin();
        s.apply(loaded(ticket, 2));
        assert_eq!(s.next_route(), None);

        let mut s = ReaderSession::new(Route::new(42, 1), 1, store(), NextChapterPolicy::Bounded);
        let ticket = s.begin();
        s.apply(loaded(ticket, 2));
        assert_eq!(s.next_route(), Some(Route::new(42, 2)));
    }

    #[test]
    fn test_navigation_unavailable_while_loading() {
        let mut s = session(Route::new(42, 5), store());
        s.begin();
        assert_eq!(s.previous_route(), None);
        assert_eq!(s.next_route(), None);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut s = session(Route::new(42, 1), store());
        s.set_content_height(100, 20);
        s.scroll_by(50);
        assert_eq!(s.scroll_offset(), 50);
        s.scroll_by(500);
        assert_eq!(s.scroll_offset(), 80);
        s.scroll_by(-1000);
        assert_eq!(s.scroll_offset(), 0);
        s.scroll_to_bottom();
        s.set_content_height(30, 20);
        assert_eq!(s.scroll_offset(), 10);
        s.scroll_to_top();
        assert_eq!(s.scroll_offset(), 0);
    }
}
