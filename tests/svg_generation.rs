#![allow(dead_code)]

use anstyle::{Ansi256Color, AnsiColor, Effects, RgbColor};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Cell;
use ratatui::style::{Color, Modifier};

fn to_ansi_color(color: Color) -> Option<anstyle::Color> {
    let ansi = match color {
        Color::Reset => return None,
        Color::Black => AnsiColor::Black,
        Color::Red => AnsiColor::Red,
        Color::Green => AnsiColor::Green,
        Color::Yellow => AnsiColor::Yellow,
        Color::Blue => AnsiColor::Blue,
        Color::Magenta => AnsiColor::Magenta,
        Color::Cyan => AnsiColor::Cyan,
        Color::Gray => AnsiColor::White,
        Color::DarkGray => AnsiColor::BrightBlack,
        Color::LightRed => AnsiColor::BrightRed,
        Color::LightGreen => AnsiColor::BrightGreen,
        Color::LightYellow => AnsiColor::BrightYellow,
        Color::LightBlue => AnsiColor::BrightBlue,
        Color::LightMagenta => AnsiColor::BrightMagenta,
        Color::LightCyan => AnsiColor::BrightCyan,
        Color::White => AnsiColor::BrightWhite,
        Color::Indexed(i) => return Some(Ansi256Color(i).into()),
        Color::Rgb(r, g, b) => return Some(RgbColor(r, g, b).into()),
    };
    Some(ansi.into())
}

fn cell_style(cell: &Cell) -> anstyle::Style {
    let mut effects = Effects::new();
    if cell.modifier.contains(Modifier::BOLD) {
        effects = effects.insert(Effects::BOLD);
    }
    if cell.modifier.contains(Modifier::DIM) {
        effects = effects.insert(Effects::DIMMED);
    }
    if cell.modifier.contains(Modifier::ITALIC) {
        effects = effects.insert(Effects::ITALIC);
    }
    if cell.modifier.contains(Modifier::UNDERLINED) {
        effects = effects.insert(Effects::UNDERLINE);
    }
    if cell.modifier.contains(Modifier::REVERSED) {
        effects = effects.insert(Effects::INVERT);
    }
    anstyle::Style::new()
        .fg_color(to_ansi_color(cell.fg))
        .bg_color(to_ansi_color(cell.bg))
        .effects(effects)
}

/// The last drawn frame as ANSI-styled text.
pub fn terminal_to_ansi(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let area = buffer.area;
    let mut out = String::new();
    for y in 0..area.height {
        let mut current = anstyle::Style::new();
        for x in 0..area.width {
            let cell = &buffer[(x, y)];
            let style = cell_style(cell);
            if style != current {
                out.push_str(&current.render_reset().to_string());
                out.push_str(&style.render().to_string());
                current = style;
            }
            out.push_str(cell.symbol());
        }
        out.push_str(&current.render_reset().to_string());
        out.push('\n');
    }
    out
}

pub fn terminal_to_svg(terminal: &Terminal<TestBackend>) -> String {
    anstyle_svg::Term::new().render_svg(&terminal_to_ansi(terminal))
}

/// The last drawn frame as plain text, trailing blanks removed from every row.
pub fn terminal_to_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let area = buffer.area;
    let mut out = String::new();
    for y in 0..area.height {
        let row: String = (0..area.width).map(|x| buffer[(x, y)].symbol()).collect();
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}
