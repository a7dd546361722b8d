use crate::main_app::VimNavMotions;
use crate::theme::ReaderTheme;
use crate::widget::centered_rect;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeSelectorAction {
    Close,
    Selected(ReaderTheme),
}

pub struct ThemeSelector {
    state: ListState,
    current: ReaderTheme,
}

impl ThemeSelector {
    pub fn new(current: ReaderTheme) -> Self {
        let mut state = ListState::default();
        state.select(Some(current.index()));

        ThemeSelector { state, current }
    }

    pub fn selected(&self) -> ReaderTheme {
        let all = ReaderTheme::all();
        self.state
            .selected()
            .and_then(|idx| all.get(idx).copied())
            .unwrap_or(self.current)
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let popup_area = centered_rect(40, 50, area);
        f.render_widget(Clear, popup_area);

        // The popup previews the highlighted theme
        let palette = self.selected().palette();

        let items: Vec<ListItem> = ReaderTheme::all()
            .iter()
            .map(|theme| {
                let marker = if *theme == self.current {
                    " (current)"
                } else {
                    ""
                };

                ListItem::new(Line::from(vec![
                    Span::styled(theme.label(), Style::default().fg(palette.text)),
                    Span::styled(marker, Style::default().fg(palette.muted)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Reading Theme ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.accent))
                    .style(Style::default().bg(palette.background)),
            )
            .highlight_style(
                Style::default()
                    .bg(palette.selection)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("» ");

        f.render_stateful_widget(list, popup_area, &mut self.state);
    }

    fn next(&mut self) {
        let i = match self.state.selected() {
            Some(i) if i + 1 < ReaderTheme::all().len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    fn previous(&mut self) {
        let i = match self.state.selected() {
            Some(0) | None => ReaderTheme::all().len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<ThemeSelectorAction> {
        use crossterm::event::KeyCode;

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
            KeyCode::Esc | KeyCode::Char('q') => Some(ThemeSelectorAction::Close),
            KeyCode::Enter => {
                let selected = self.selected();
                if selected != self.current {
                    Some(ThemeSelectorAction::Selected(selected))
                } else {
                    Some(ThemeSelectorAction::Close)
                }
            }
            _ => None,
        }
    }
}

impl VimNavMotions for ThemeSelector {
    fn handle_j(&mut self) {
        self.next();
    }

    fn handle_k(&mut self) {
        self.previous();
    }

    fn handle_gg(&mut self) {
        self.state.select(Some(0));
    }

    fn handle_upper_g(&mut self) {
        self.state.select(Some(ReaderTheme::all().len() - 1));
    }
}
