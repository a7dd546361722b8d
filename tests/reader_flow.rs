use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use novera::App;
use novera::api::NovelSource;
use novera::event_source::SimulatedEventSource;
use novera::preferences::{FileKeyValueStore, PreferenceStore};
use novera::router::{Route, Screen};
use novera::run_app_with_event_source;
use novera::session::{NotFoundReason, SessionState};
use novera::test_utils::FakeLibrary;
use novera::test_utils::test_helpers::{create_test_app, create_test_terminal, screen_contains};
use novera::theme::ReaderTheme;
use tempfile::TempDir;

const IDLE: Duration = Duration::from_secs(5);

/// Helper trait for simpler key event handling in tests
trait TestKeyEventHandler {
    fn press_key(&mut self, key: KeyCode);
    fn press_char_times(&mut self, ch: char, times: usize);
}

impl TestKeyEventHandler for App {
    fn press_key(&mut self, key: KeyCode) {
        self.handle_key_event(KeyEvent::new(key, KeyModifiers::empty()));
    }

    fn press_char_times(&mut self, ch: char, times: usize) {
        for _ in 0..times {
            self.press_key(KeyCode::Char(ch));
        }
    }
}

fn library() -> Arc<FakeLibrary> {
    Arc::new(
        FakeLibrary::new()
            .with_novel(42, "Tide Walker", &[1, 2])
            .with_novel(7, "Ash Crown", &[1, 2, 3]),
    )
}

fn memory_prefs() -> Arc<PreferenceStore> {
    Arc::new(PreferenceStore::in_memory())
}

fn open(library: Arc<FakeLibrary>, route: Route) -> App {
    let mut app = create_test_app(library, memory_prefs(), Screen::Reader(route));
    assert!(app.wait_until_idle(IDLE), "app did not settle");
    app
}

fn current_chapter_number(app: &App) -> Option<i64> {
    app.session()
        .and_then(|s| s.chapter())
        .map(|c| c.chapter_number)
}

#[test]
fn test_existing_chapter_is_ready_and_rendered() {
    let mut app = open(library(), Route::new(42, 2));
    assert_eq!(current_chapter_number(&app), Some(2));

    let mut terminal = create_test_terminal(100, 30);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Chapter 2: Chapter title 2"));
    assert!(screen_contains(&terminal, "Opening line of chapter 2."));
    assert!(screen_contains(&terminal, "Tide Walker"));
}

#[test]
fn test_missing_chapter_is_not_found() {
    let mut app = open(library(), Route::new(42, 3));
    let state = app.session().map(|s| s.state().clone());
    assert_eq!(state, Some(SessionState::NotFound(NotFoundReason::Missing)));

    let mut terminal = create_test_terminal(100, 30);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Chapter not found"));
}

#[test]
fn test_offline_api_is_not_found() {
    let library = library();
    library.set_offline(true);
    let app = open(library, Route::new(42, 1));
    assert!(matches!(
        app.session().map(|s| s.state()),
        Some(SessionState::NotFound(NotFoundReason::Unavailable(_)))
    ));
}

#[test]
fn test_previous_from_first_chapter_is_a_no_op() {
    let mut app = open(library(), Route::new(42, 1));
    app.press_key(KeyCode::Char('h'));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 1)));
    assert_eq!(current_chapter_number(&app), Some(1));
}

#[test]
fn test_next_past_last_chapter_then_back() {
    let mut app = open(library(), Route::new(42, 1));

    app.press_key(KeyCode::Char('l'));
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 2)));
    assert_eq!(current_chapter_number(&app), Some(2));

    app.press_key(KeyCode::Right);
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 3)));
    assert!(matches!(
        app.session().map(|s| s.state()),
        Some(SessionState::NotFound(_))
    ));

    // Not found only offers going back
    app.press_key(KeyCode::Char('l'));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 3)));

    app.press_key(KeyCode::Esc);
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 2)));
    assert_eq!(current_chapter_number(&app), Some(2));
}

#[test]
fn test_chapter_change_resets_scroll() {
    let mut app = open(library(), Route::new(7, 1));
    let mut terminal = create_test_terminal(60, 8);
    terminal.draw(|f| app.draw(f)).unwrap();

    app.press_key(KeyCode::Char('G'));
    assert!(app.session().map(|s| s.scroll_offset()).unwrap_or(0) > 0);

    app.press_key(KeyCode::Char('l'));
    assert_eq!(app.session().map(|s| s.scroll_offset()), Some(0));
    assert!(app.wait_until_idle(IDLE));
    terminal.draw(|f| app.draw(f)).unwrap();
    assert_eq!(app.session().map(|s| s.scroll_offset()), Some(0));
}

#[test]
fn test_late_response_for_previous_chapter_is_discarded() {
    let library = library();
    library.pause();
    let mut app = create_test_app(
        library.clone(),
        memory_prefs(),
        Screen::Reader(Route::new(42, 1)),
    );
    // Chapter 1 is still in flight when the reader moves on
    app.navigate(Route::new(42, 2));
    library.resume();

    assert!(app.wait_until_idle(IDLE));
    // Both requests finished; only the newer one may land
    std::thread::sleep(Duration::from_millis(50));
    app.tick();
    assert_eq!(library.chapter_requests(), 2);
    assert_eq!(app.session().map(|s| s.route()), Some(Route::new(42, 2)));
    assert_eq!(current_chapter_number(&app), Some(2));
}

#[test]
fn test_preferences_survive_sessions_and_restarts() {
    let dir = TempDir::new().unwrap();
    let prefs = || {
        Arc::new(PreferenceStore::new(Arc::new(FileKeyValueStore::new(
            dir.path().join("prefs.json"),
        ))))
    };

    let mut app = create_test_app(library(), prefs(), Screen::Reader(Route::new(42, 1)));
    assert!(app.wait_until_idle(IDLE));
    app.press_char_times('+', 4);
    app.press_key(KeyCode::Char('t'));
    let chosen = app.session().map(|s| s.preferences()).unwrap();
    assert_eq!(chosen.font_size_px, 22);
    assert_eq!(chosen.theme, ReaderTheme::Black);

    // Next chapter mounts a fresh session that hydrates the saved values
    app.press_key(KeyCode::Char('l'));
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.session().map(|s| s.preferences()), Some(chosen));

    let mut restarted = create_test_app(library(), prefs(), Screen::Reader(Route::new(42, 2)));
    assert!(restarted.wait_until_idle(IDLE));
    assert_eq!(restarted.session().map(|s| s.preferences()), Some(chosen));
}

#[test]
fn test_theme_selector_changes_theme() {
    let mut app = open(library(), Route::new(42, 1));
    app.press_key(KeyCode::Char('T'));
    assert!(app.has_popup().is_some());

    let mut terminal = create_test_terminal(100, 30);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Reading Theme"));

    app.press_key(KeyCode::Char('k'));
    app.press_key(KeyCode::Enter);
    assert!(app.has_popup().is_none());
    assert_eq!(app.session().map(|s| s.theme()), Some(ReaderTheme::Sepia));
}

#[test]
fn test_catalog_opens_first_chapter() {
    let library = library();
    let mut app = create_test_app(library.clone(), memory_prefs(), Screen::Catalog);
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.catalog().novels().len(), library.list_novels().unwrap().len());

    let mut terminal = create_test_terminal(100, 30);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Tide Walker"));
    assert!(screen_contains(&terminal, "Ash Crown"));

    app.press_key(KeyCode::Enter);
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 1)));
    assert_eq!(current_chapter_number(&app), Some(1));

    app.press_key(KeyCode::Esc);
    assert_eq!(app.current_screen(), Screen::Catalog);
    assert!(app.session().is_none());
}

#[test]
fn test_catalog_chapter_list_opens_chosen_chapter() {
    let mut app = create_test_app(library(), memory_prefs(), Screen::Catalog);
    assert!(app.wait_until_idle(IDLE));

    app.press_key(KeyCode::Tab);
    let mut terminal = create_test_terminal(100, 30);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Chapter 2: Chapter title 2"));

    app.press_key(KeyCode::Char('j'));
    app.press_key(KeyCode::Enter);
    assert!(app.wait_until_idle(IDLE));
    assert_eq!(app.current_screen(), Screen::Reader(Route::new(42, 2)));
    assert_eq!(current_chapter_number(&app), Some(2));
}

#[test]
fn test_failed_novel_title_is_requested_again() {
    let library = library();
    library.set_offline(true);
    let mut app = open(library.clone(), Route::new(42, 1));
    assert!(!app.has_pending_title_requests());

    let mut terminal = create_test_terminal(100, 30);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Novel 42"));

    library.set_offline(false);
    app.navigate(Route::new(42, 2));
    assert!(app.wait_until_idle(IDLE));
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(screen_contains(&terminal, "Tide Walker"));
}

#[test]
fn test_back_from_direct_open_goes_to_catalog() {
    let mut app = open(library(), Route::new(7, 2));
    app.press_key(KeyCode::Char('b'));
    assert_eq!(app.current_screen(), Screen::Catalog);
}

#[test]
fn test_run_loop_quits_on_q() {
    let mut app = open(library(), Route::new(42, 1));
    let mut terminal = create_test_terminal(80, 24);
    let mut events = SimulatedEventSource::from_keys(&[
        KeyCode::Char('j'),
        KeyCode::Char('+'),
        KeyCode::Char('q'),
    ]);

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    assert!(events.is_empty());
    assert_eq!(app.session().map(|s| s.preferences().font_size_px), Some(19));
}
