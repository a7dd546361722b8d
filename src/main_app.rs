use crate::api::{NovelId, NovelSource, NoveraClient};
use crate::event_source::EventSource;
use crate::loader::SessionLoader;
use crate::preferences::{PreferenceStore, ReaderPreferences};
use crate::resolver::ChapterResolver;
use crate::router::{Route, Router, Screen};
use crate::session::ReaderSession;
use crate::settings::{self, NextChapterPolicy};
use crate::theme::ReaderTheme;
use crate::widget::catalog::{Catalog, CatalogAction, CatalogStatus};
use crate::widget::reader_view::ReaderView;
use crate::widget::theme_selector::{ThemeSelector, ThemeSelectorAction};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info, warn};
use ratatui::{
    Terminal,
    layout::Rect,
    style::Style,
    widgets::Block,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub trait VimNavMotions {
    fn handle_j(&mut self);
    fn handle_k(&mut self);
    fn handle_gg(&mut self);
    fn handle_upper_g(&mut self);
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PopupWindow {
    ThemeSelector,
}

pub struct App {
    source: Arc<dyn NovelSource>,
    loader: SessionLoader,
    router: Router,
    session: Option<ReaderSession>,
    generation: u64,
    policy: NextChapterPolicy,
    access_token: Option<String>,
    catalog: Catalog,
    novel_titles: HashMap<NovelId, String>,
    // Title fetches still in flight
    title_requests: Vec<NovelId>,
    title_sender: Sender<(NovelId, Option<String>)>,
    title_receiver: Receiver<(NovelId, Option<String>)>,
    theme_selector: Option<ThemeSelector>,
    // Theme used outside the reader; follows the last reader choice
    chrome_theme: ReaderTheme,
    visible_height: usize,
}

impl App {
    /// App wired to the configured API and the preferences file.
    pub fn new(initial: Screen) -> Result<Self> {
        let client = NoveraClient::from_settings()?;
        info!("Using Novera API at {}", client.base_url());
        Ok(Self::with_source(
            Arc::new(client),
            Arc::new(PreferenceStore::open_default()),
            settings::get_next_chapter_policy(),
            settings::get_access_token(),
            initial,
        ))
    }

    pub fn with_source(
        source: Arc<dyn NovelSource>,
        preferences: Arc<PreferenceStore>,
        policy: NextChapterPolicy,
        access_token: Option<String>,
        initial: Screen,
    ) -> Self {
        let chrome_theme = ReaderPreferences::from_stored(&preferences.hydrate()).theme;
        let loader = SessionLoader::new(ChapterResolver::new(source.clone()), preferences);
        let (title_sender, title_receiver) = channel();

        let mut app = App {
            source,
            loader,
            router: Router::new(initial),
            session: None,
            generation: 0,
            policy,
            access_token,
            catalog: Catalog::new(),
            novel_titles: HashMap::new(),
            title_requests: Vec::new(),
            title_sender,
            title_receiver,
            theme_selector: None,
            chrome_theme,
            visible_height: 20,
        };
        app.reload_catalog();
        app.open_screen(initial);
        app
    }

    pub fn current_screen(&self) -> Screen {
        self.router.current()
    }

    pub fn session(&self) -> Option<&ReaderSession> {
        self.session.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn has_popup(&self) -> Option<PopupWindow> {
        self.theme_selector
            .as_ref()
            .map(|_| PopupWindow::ThemeSelector)
    }

    fn reload_catalog(&mut self) {
        self.catalog
            .reload(self.source.clone(), self.access_token.clone());
    }

    fn open_screen(&mut self, screen: Screen) {
        match screen {
            Screen::Catalog => {
                if let Some(session) = &self.session {
                    self.chrome_theme = session.theme();
                }
                self.session = None;
            }
            Screen::Reader(route) => self.mount_session(route),
        }
    }

    /// Replaces the current session with a fresh one for `route`.
    fn mount_session(&mut self, route: Route) {
        self.generation += 1;
        let mut session = ReaderSession::new(
            route,
            self.generation,
            self.loader.preferences(),
            self.policy,
        );
        let ticket = session.begin();
        self.loader.spawn(ticket);
        self.session = Some(session);
        self.request_novel_title(route.novel_id);
        debug!("Mounted session {} for {}", self.generation, route);
    }

    pub fn navigate(&mut self, route: Route) {
        info!("Navigating to {route}");
        self.router.push(Screen::Reader(route));
        self.mount_session(route);
    }

    pub fn go_back(&mut self) {
        match self.router.back() {
            Some(screen) => self.open_screen(screen),
            None => {
                if matches!(self.router.current(), Screen::Reader(_)) {
                    // Started straight in the reader: fall back to the catalog
                    self.router = Router::new(Screen::Catalog);
                    self.open_screen(Screen::Catalog);
                }
            }
        }
    }

    fn novel_title(&self, novel_id: NovelId) -> Option<String> {
        self.catalog
            .novel(novel_id)
            .map(|novel| novel.title.clone())
            .or_else(|| self.novel_titles.get(&novel_id).cloned())
    }

    fn request_novel_title(&mut self, novel_id: NovelId) {
        if self.novel_title(novel_id).is_some() || self.title_requests.contains(&novel_id) {
            return;
        }
        self.title_requests.push(novel_id);

        let source = self.source.clone();
        let sender = self.title_sender.clone();
        let spawned = thread::Builder::new()
            .name("novera-novel".to_string())
            .spawn(move || {
                let title = match source.get_novel(novel_id) {
                    Ok(novel) => Some(novel.title),
                    Err(e) => {
                        warn!("Could not load novel {novel_id}: {e}");
                        None
                    }
                };
                let _ = sender.send((novel_id, title));
            });
        if let Err(e) = spawned {
            warn!("Failed to start novel loader: {e}");
            self.title_requests.retain(|id| *id != novel_id);
        }
    }

    pub fn has_pending_title_requests(&self) -> bool {
        !self.title_requests.is_empty()
    }

    /// Applies finished background work. Returns true when a redraw is needed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;

        for event in self.loader.drain() {
            if let Some(session) = self.session.as_mut() {
                changed |= session.apply(event);
            }
        }
        changed |= self.catalog.poll();
        while let Ok((novel_id, title)) = self.title_receiver.try_recv() {
            // A failed fetch is retried the next time the novel is opened
            self.title_requests.retain(|id| *id != novel_id);
            if let Some(title) = title {
                self.novel_titles.insert(novel_id, title);
                changed = true;
            }
        }

        changed
    }

    /// Ticks until background work for the current screen is done or `timeout` passes.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            let session_idle = self
                .session
                .as_ref()
                .is_none_or(|s| !s.is_loading() && s.is_hydrated());
            let catalog_idle = self.catalog.status() != &CatalogStatus::Loading;
            if session_idle && catalog_idle && self.title_requests.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppAction::Quit);
        }

        if let Some(selector) = self.theme_selector.as_mut() {
            match selector.handle_key(key) {
                Some(ThemeSelectorAction::Selected(theme)) => {
                    if let Some(session) = self.session.as_mut() {
                        session.set_theme(theme);
                    }
                    self.chrome_theme = theme;
                    self.theme_selector = None;
                }
                Some(ThemeSelectorAction::Close) => self.theme_selector = None,
                None => {}
            }
            return None;
        }

        match self.router.current() {
            Screen::Catalog => self.handle_catalog_key(key),
            Screen::Reader(_) => self.handle_reader_key(key),
        }
    }

    fn handle_catalog_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        match self.catalog.handle_key(key)? {
            CatalogAction::Open(route) => {
                self.navigate(route);
                None
            }
            CatalogAction::Reload => {
                self.reload_catalog();
                None
            }
            CatalogAction::Quit => Some(AppAction::Quit),
        }
    }

    fn handle_reader_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        let half_page = (self.visible_height / 2).max(1) as isize;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let session = self.session.as_mut()?;

        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => self.go_back(),
            KeyCode::Char('h') | KeyCode::Left => {
                if let Some(route) = session.previous_route() {
                    self.navigate(route);
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                if let Some(route) = session.next_route() {
                    self.navigate(route);
                }
            }
            KeyCode::Char('d') if ctrl => session.scroll_by(half_page),
            KeyCode::Char('u') if ctrl => session.scroll_by(-half_page),
            KeyCode::Char('j') | KeyCode::Down => session.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => session.scroll_by(-1),
            KeyCode::PageDown | KeyCode::Char(' ') => session.scroll_by(half_page * 2),
            KeyCode::PageUp => session.scroll_by(-half_page * 2),
            KeyCode::Char('g') | KeyCode::Home => session.scroll_to_top(),
            KeyCode::Char('G') | KeyCode::End => session.scroll_to_bottom(),
            KeyCode::Char('+') | KeyCode::Char('=') => session.increase_font(),
            KeyCode::Char('-') => session.decrease_font(),
            KeyCode::Char('t') => {
                session.cycle_theme();
                self.chrome_theme = session.theme();
            }
            KeyCode::Char('T') => {
                self.theme_selector = Some(ThemeSelector::new(session.theme()));
            }
            _ => {}
        }
        None
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame) {
        let area = f.area();
        let theme = self
            .session
            .as_ref()
            .map(|s| s.theme())
            .unwrap_or(self.chrome_theme);
        let palette = theme.palette();

        f.render_widget(
            Block::default().style(Style::default().bg(palette.background)),
            area,
        );

        match self.router.current() {
            Screen::Catalog => self.catalog.render(f, area, palette),
            Screen::Reader(route) => {
                let title = self.novel_title(route.novel_id);
                if let Some(session) = self.session.as_mut() {
                    ReaderView::render(f, area, session, title.as_deref());
                }
                // Header (3 rows) and navigation (1 row)
                self.visible_height = area.height.saturating_sub(4) as usize;
            }
        }

        if let Some(selector) = self.theme_selector.as_mut() {
            selector.render(f, area);
        }
    }

    pub fn handle_resize(&mut self, _area: Rect) {
        // Scroll bounds are recomputed on the next draw
        debug!("Terminal resized");
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut first_render = true; // Ensure we always render at least once on startup
    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            match event {
                Event::Key(key) => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Resize(cols, rows) => {
                    app.handle_resize(Rect::new(0, 0, cols, rows));
                }
                _ => {}
            }

            if should_quit {
                break;
            }
        }

        if should_quit {
            return Ok(());
        }

        let mut needs_redraw = events_processed > 0;

        if first_render {
            needs_redraw = true;
            first_render = false;
        }

        if last_tick.elapsed() >= tick_rate {
            if app.tick() {
                needs_redraw = true;
            }
            last_tick = Instant::now();
        }

        if needs_redraw {
            let draw_start = Instant::now();
            terminal.draw(|f| app.draw(f))?;
            let draw_duration = draw_start.elapsed();

            if draw_duration.as_millis() > 10 {
                debug!("Terminal draw/flush took {}ms", draw_duration.as_millis());
            }
        }

        // If no events were processed, wait a bit to avoid busy-waiting
        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            let _ = event_source.poll(timeout)?;
        }
    }
}
