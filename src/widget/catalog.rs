use log::{info, warn};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use crate::api::{BookmarkStatus, Chapter, Novel, NovelId, NovelSource};
use crate::main_app::VimNavMotions;
use crate::router::Route;
use crate::theme::ThemePalette;
use crate::widget::reader_view::chapter_heading;

pub enum CatalogAction {
    Open(Route),
    Reload,
    Quit,
}

/// Which list receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFocus {
    Novels,
    Chapters,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogStatus {
    Loading,
    Loaded,
    Failed(String),
}

/// Result of one catalog fetch.
pub struct CatalogSnapshot {
    pub request: u64,
    pub novels: Result<Vec<Novel>, String>,
    pub statuses: HashMap<NovelId, BookmarkStatus>,
}

pub struct Catalog {
    novels: Vec<Novel>,
    statuses: HashMap<NovelId, BookmarkStatus>,
    state: ListState,
    focus: CatalogFocus,
    chapter_state: ListState,
    status: CatalogStatus,
    request: u64,
    sender: Sender<CatalogSnapshot>,
    receiver: Receiver<CatalogSnapshot>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Catalog {
            novels: Vec::new(),
            statuses: HashMap::new(),
            state: ListState::default(),
            focus: CatalogFocus::Novels,
            chapter_state: ListState::default(),
            status: CatalogStatus::Loading,
            request: 0,
            sender,
            receiver,
        }
    }

    pub fn status(&self) -> &CatalogStatus {
        &self.status
    }

    pub fn novels(&self) -> &[Novel] {
        &self.novels
    }

    pub fn novel(&self, novel_id: NovelId) -> Option<&Novel> {
        self.novels.iter().find(|novel| novel.id == novel_id)
    }

    pub fn bookmark(&self, novel_id: NovelId) -> Option<&BookmarkStatus> {
        self.statuses.get(&novel_id)
    }

    pub fn selected_novel(&self) -> Option<&Novel> {
        self.state.selected().and_then(|idx| self.novels.get(idx))
    }

    pub fn focus(&self) -> CatalogFocus {
        self.focus
    }

    pub fn selected_chapter(&self) -> Option<&Chapter> {
        if self.focus != CatalogFocus::Chapters {
            return None;
        }
        let novel = self.selected_novel()?;
        self.chapter_state
            .selected()
            .and_then(|idx| novel.chapters.get(idx))
    }

    fn focus_chapters(&mut self) {
        let has_chapters = self
            .selected_novel()
            .is_some_and(|novel| !novel.chapters.is_empty());
        if has_chapters {
            self.focus = CatalogFocus::Chapters;
            self.chapter_state.select(Some(0));
        }
    }

    fn focus_novels(&mut self) {
        self.focus = CatalogFocus::Novels;
        self.chapter_state.select(None);
    }

    fn chapter_count(&self) -> usize {
        self.selected_novel()
            .map(|novel| novel.chapters.len())
            .unwrap_or(0)
    }

    /// Fetches the novel list, and bookmark statuses when a token is given, in the background.
    pub fn reload(&mut self, source: Arc<dyn NovelSource>, token: Option<String>) {
        self.request += 1;
        self.status = CatalogStatus::Loading;
        let request = self.request;
        let sender = self.sender.clone();

        let job = move || {
            let snapshot = fetch_snapshot(source.as_ref(), token.as_deref(), request);
            let _ = sender.send(snapshot);
        };
        if let Err(e) = thread::Builder::new()
            .name("novera-catalog".to_string())
            .spawn(job)
        {
            warn!("Failed to start catalog loader: {e}");
            self.status = CatalogStatus::Failed(e.to_string());
        }
    }

    /// Applies finished fetches. Returns true when the catalog changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(snapshot) = self.receiver.try_recv() {
            changed |= self.apply(snapshot);
        }
        changed
    }

    pub fn apply(&mut self, snapshot: CatalogSnapshot) -> bool {
        if snapshot.request != self.request {
            return false;
        }
        match snapshot.novels {
            Ok(novels) => {
                info!("Catalog loaded with {} novels", novels.len());
                let previous = self.selected_novel().map(|n| n.id);
                self.novels = novels;
                self.statuses = snapshot.statuses;
                self.status = CatalogStatus::Loaded;
                let index = previous
                    .and_then(|id| self.novels.iter().position(|n| n.id == id))
                    .or(if self.novels.is_empty() { None } else { Some(0) });
                self.state.select(index);
                self.focus_novels();
            }
            Err(e) => {
                self.status = CatalogStatus::Failed(e);
            }
        }
        true
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &ThemePalette) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let block = Block::default()
            .title(" Novera · Catalog ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .style(Style::default().bg(palette.background));

        match &self.status {
            CatalogStatus::Loading if self.novels.is_empty() => {
                f.render_widget(
                    Paragraph::new(Span::styled(
                        "Loading novels...",
                        Style::default().fg(palette.muted),
                    ))
                    .block(block),
                    chunks[0],
                );
            }
            CatalogStatus::Failed(e) if self.novels.is_empty() => {
                f.render_widget(
                    Paragraph::new(vec![
                        Line::from(Span::styled(
                            "Could not load novels",
                            Style::default().fg(palette.text),
                        )),
                        Line::from(Span::styled(e.clone(), Style::default().fg(palette.muted))),
                        Line::default(),
                        Line::from(Span::styled("r: retry", Style::default().fg(palette.accent))),
                    ])
                    .wrap(Wrap { trim: true })
                    .block(block),
                    chunks[0],
                );
            }
            _ if self.novels.is_empty() => {
                f.render_widget(
                    Paragraph::new(Span::styled(
                        "No novels yet",
                        Style::default().fg(palette.muted),
                    ))
                    .block(block),
                    chunks[0],
                );
            }
            _ => {
                let items: Vec<ListItem> = self
                    .novels
                    .iter()
                    .map(|novel| {
                        let mut spans = vec![
                            Span::styled(novel.title.clone(), Style::default().fg(palette.text)),
                            Span::styled(
                                format!("  {} ch · ★ {:.1}", novel.chapter_count(), novel.rating),
                                Style::default().fg(palette.muted),
                            ),
                        ];
                        if let Some(status) = self.statuses.get(&novel.id) {
                            spans.push(Span::styled(
                                format!("  [{}]", status.label()),
                                Style::default().fg(palette.accent),
                            ));
                        }
                        ListItem::new(Line::from(spans))
                    })
                    .collect();

                let list = List::new(items)
                    .block(block)
                    .highlight_style(
                        Style::default()
                            .bg(palette.selection)
                            .add_modifier(Modifier::BOLD),
                    )
                    .highlight_symbol("» ");
                f.render_stateful_widget(list, chunks[0], &mut self.state);
            }
        }

        self.render_details(f, chunks[1], palette);
    }

    fn render_details(&mut self, f: &mut Frame, area: Rect, palette: &ThemePalette) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        self.render_summary(f, chunks[0], palette);
        self.render_chapters(f, chunks[1], palette);
    }

    fn render_summary(&self, f: &mut Frame, area: Rect, palette: &ThemePalette) {
        let block = Block::default()
            .title(" Details ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.muted))
            .style(Style::default().bg(palette.background));

        let Some(novel) = self.selected_novel() else {
            f.render_widget(block, area);
            return;
        };

        let field = |label: &str, value: &str| {
            Line::from(vec![
                Span::styled(format!("{label}: "), Style::default().fg(palette.muted)),
                Span::styled(value.to_string(), Style::default().fg(palette.text)),
            ])
        };

        let mut lines = vec![
            Line::from(Span::styled(
                novel.title.clone(),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            field("Author", novel.author.as_deref().unwrap_or("Unknown")),
            field("Genre", novel.genre.as_deref().unwrap_or("Unknown")),
            field("Status", &novel.status),
            field("Chapters", &novel.chapter_count().to_string()),
        ];
        if let Some(bookmark) = self.statuses.get(&novel.id) {
            lines.push(field("Shelf", bookmark.label()));
        }
        if let Some(description) = &novel.description {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                description.clone(),
                Style::default().fg(palette.text),
            )));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Enter: read from chapter 1 · Tab: chapters · r: reload · q: quit",
            Style::default().fg(palette.muted),
        )));

        f.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: true }).block(block),
            area,
        );
    }

    fn render_chapters(&mut self, f: &mut Frame, area: Rect, palette: &ThemePalette) {
        let border = if self.focus == CatalogFocus::Chapters {
            palette.accent
        } else {
            palette.muted
        };
        let block = Block::default()
            .title(" Chapters ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(palette.background));

        let Some(novel) = self.state.selected().and_then(|idx| self.novels.get(idx)) else {
            f.render_widget(block, area);
            return;
        };
        if novel.chapters.is_empty() {
            f.render_widget(
                Paragraph::new(Span::styled(
                    "No chapters yet",
                    Style::default().fg(palette.muted),
                ))
                .block(block),
                area,
            );
            return;
        }

        let items: Vec<ListItem> = novel
            .chapters
            .iter()
            .map(|chapter| {
                ListItem::new(Span::styled(
                    chapter_heading(chapter.chapter_number, Some(&chapter.title)),
                    Style::default().fg(palette.text),
                ))
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(palette.selection)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("» ");
        f.render_stateful_widget(list, area, &mut self.chapter_state);
    }

    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<CatalogAction> {
        use crossterm::event::KeyCode;

        if self.focus == CatalogFocus::Chapters {
            match key.code {
                KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
                    return self
                        .selected_chapter()
                        .map(|chapter| {
                            CatalogAction::Open(Route::new(chapter.novel_id, chapter.chapter_number))
                        });
                }
                KeyCode::Tab | KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => {
                    self.focus_novels();
                    return None;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.handle_j();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.handle_k();
                None
            }
            KeyCode::Char('g') => {
                self.handle_gg();
                None
            }
            KeyCode::Char('G') => {
                self.handle_upper_g();
                None
            }
            KeyCode::Enter => self
                .selected_novel()
                .map(|novel| CatalogAction::Open(Route::new(novel.id, 1))),
            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => {
                self.focus_chapters();
                None
            }
            KeyCode::Char('r') => Some(CatalogAction::Reload),
            KeyCode::Char('q') => Some(CatalogAction::Quit),
            _ => None,
        }
    }
}

impl VimNavMotions for Catalog {
    fn handle_j(&mut self) {
        if self.focus == CatalogFocus::Chapters {
            let count = self.chapter_count();
            let i = match self.chapter_state.selected() {
                Some(i) if i + 1 < count => i + 1,
                Some(i) => i,
                None => 0,
            };
            self.chapter_state.select(Some(i));
            return;
        }
        if self.novels.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.novels.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn handle_k(&mut self) {
        if self.focus == CatalogFocus::Chapters {
            let i = self.chapter_state.selected().unwrap_or(0).saturating_sub(1);
            self.chapter_state.select(Some(i));
            return;
        }
        if self.novels.is_empty() {
            return;
        }
        let i = self.state.selected().unwrap_or(0).saturating_sub(1);
        self.state.select(Some(i));
    }

    fn handle_gg(&mut self) {
        if self.focus == CatalogFocus::Chapters {
            self.chapter_state.select(Some(0));
            return;
        }
        if !self.novels.is_empty() {
            self.state.select(Some(0));
        }
    }

    fn handle_upper_g(&mut self) {
        if self.focus == CatalogFocus::Chapters {
            let count = self.chapter_count();
            self.chapter_state.select(count.checked_sub(1));
            return;
        }
        if !self.novels.is_empty() {
            self.state.select(Some(self.novels.len() - 1));
        }
    }
}

fn fetch_snapshot(source: &dyn NovelSource, token: Option<&str>, request: u64) -> CatalogSnapshot {
    let novels = source.list_novels().map_err(|e| {
        warn!("Failed to load catalog: {e}");
        e.to_string()
    });

    // Statuses are optional decoration: any failure means "no status".
    let statuses = match (token, &novels) {
        (Some(token), Ok(_)) => match source.user_statuses(token) {
            Ok(statuses) => statuses
                .into_iter()
                .map(|s| (s.novel_id, s.bookmark()))
                .collect(),
            Err(e) => {
                warn!("Could not load bookmark statuses: {e}");
                HashMap::new()
            }
        },
        _ => HashMap::new(),
    };

    CatalogSnapshot {
        request,
        novels,
        statuses,
    }
}
