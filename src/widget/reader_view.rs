use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::api::Chapter;
use crate::preferences::MIN_FONT_SIZE;
use crate::session::{NotFoundReason, ReaderSession, SessionState};
use crate::theme::ThemePalette;

/// Narrowest text column kept regardless of font size.
const MIN_TEXT_WIDTH: u16 = 20;
const PLACEHOLDER_LINES: usize = 12;

/// Columns left blank on each side of the prose.
///
/// A terminal cannot change glyph size, so a larger font setting narrows the
/// reading column instead: one column per side for every pixel above the minimum.
pub fn content_margin(font_size_px: u16, width: u16) -> u16 {
    let wanted = font_size_px.saturating_sub(MIN_FONT_SIZE);
    let max_margin = width.saturating_sub(MIN_TEXT_WIDTH) / 2;
    wanted.min(max_margin)
}

pub fn chapter_heading(number: i64, title: Option<&str>) -> String {
    match title {
        Some(title) => format!("Chapter {number}: {title}"),
        None => format!("Chapter {number}"),
    }
}

/// Wraps every paragraph of the chapter to `width` columns. Blank paragraphs stay blank.
pub fn wrap_chapter(chapter: &Chapter, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in chapter.paragraphs() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(
            textwrap::wrap(paragraph, width)
                .into_iter()
                .map(|line| line.into_owned()),
        );
    }
    lines
}

pub struct ReaderView;

impl ReaderView {
    /// Draws the session into `area` and updates its scroll bound.
    pub fn render(f: &mut Frame, area: Rect, session: &mut ReaderSession, novel_title: Option<&str>) {
        let palette = session.theme().palette();
        let route = session.route();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(1)])
            .split(area);

        let heading = chapter_heading(
            route.chapter_number,
            session.chapter().map(|c| c.title.as_str()),
        );
        let header_title = match novel_title {
            Some(novel) => format!(" {novel} "),
            None => format!(" Novel {} ", route.novel_id),
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled(heading, Style::default().fg(palette.text).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("   {}px · {}", session.preferences().font_size_px, session.theme().label()),
                Style::default().fg(palette.muted),
            ),
        ]))
        .block(
            Block::default()
                .title(header_title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent))
                .style(Style::default().bg(palette.background)),
        );
        f.render_widget(header, chunks[0]);

        let body = chunks[1];
        f.render_widget(
            Block::default().style(Style::default().bg(palette.background)),
            body,
        );

        if session.is_loading() {
            Self::render_placeholder(f, body, palette);
        } else if session.chapter().is_some() {
            Self::render_chapter(f, body, session, palette);
        } else if let SessionState::NotFound(reason) = session.state() {
            Self::render_not_found(f, body, reason, palette);
        }

        Self::render_navigation(f, chunks[2], session, palette);
    }

    fn render_placeholder(f: &mut Frame, area: Rect, palette: &ThemePalette) {
        let mut lines = vec![
            Line::from(Span::styled(
                "Loading chapter...",
                Style::default().fg(palette.muted),
            )),
            Line::default(),
        ];
        let bar = "░".repeat(area.width.saturating_sub(4) as usize);
        lines.extend(
            (0..PLACEHOLDER_LINES)
                .map(|_| Line::from(Span::styled(bar.clone(), Style::default().fg(palette.selection)))),
        );
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .style(Style::default().bg(palette.background)),
            area,
        );
    }

    fn render_chapter(
        f: &mut Frame,
        area: Rect,
        session: &mut ReaderSession,
        palette: &ThemePalette,
    ) {
        let margin = content_margin(session.preferences().font_size_px, area.width);
        let text_area = Rect {
            x: area.x + margin,
            y: area.y,
            width: area.width.saturating_sub(margin * 2),
            height: area.height,
        };
        let Some(chapter) = session.chapter() else {
            return;
        };

        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(
                chapter_heading(chapter.chapter_number, Some(&chapter.title)),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            Line::default(),
        ];
        lines.extend(
            wrap_chapter(chapter, text_area.width as usize)
                .into_iter()
                .map(|line| Line::from(Span::styled(line, Style::default().fg(palette.text)))),
        );

        session.set_content_height(lines.len(), text_area.height as usize);
        let offset = session.scroll_offset();
        let visible: Vec<Line> = lines
            .into_iter()
            .skip(offset)
            .take(text_area.height as usize)
            .collect();

        f.render_widget(
            Paragraph::new(visible).style(Style::default().bg(palette.background)),
            text_area,
        );
    }

    fn render_not_found(f: &mut Frame, area: Rect, reason: &NotFoundReason, palette: &ThemePalette) {
        let mut lines = vec![
            Line::default(),
            Line::default(),
            Line::from(Span::styled(
                "Chapter not found",
                Style::default()
                    .fg(palette.text)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(Span::styled(
                "It may not have been added yet, or the number is wrong.",
                Style::default().fg(palette.muted),
            )),
        ];
        if let NotFoundReason::Unavailable(detail) = reason {
            lines.push(Line::from(Span::styled(
                format!("({detail})"),
                Style::default().fg(palette.muted),
            )));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Esc: back to the novel",
            Style::default().fg(palette.accent),
        )));

        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .style(Style::default().bg(palette.background)),
            area,
        );
    }

    fn render_navigation(f: &mut Frame, area: Rect, session: &ReaderSession, palette: &ThemePalette) {
        let style_for = |enabled: bool| {
            if enabled {
                Style::default().fg(palette.accent)
            } else {
                Style::default().fg(palette.muted).add_modifier(Modifier::DIM)
            }
        };

        let line = if session.chapter().is_some() {
            Line::from(vec![
                Span::styled("← Previous (h)", style_for(session.previous_route().is_some())),
                Span::raw("    "),
                Span::styled("Next (l) →", style_for(session.next_route().is_some())),
                Span::styled(
                    "    t theme · +/- size · Esc back · q quit",
                    Style::default().fg(palette.muted),
                ),
            ])
        } else {
            Line::from(Span::styled(
                "t theme · +/- size · Esc back · q quit",
                Style::default().fg(palette.muted),
            ))
        };

        f.render_widget(
            Paragraph::new(line)
                .alignment(Alignment::Center)
                .style(Style::default().bg(palette.background)),
            area,
        );
    }
}
