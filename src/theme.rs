use ratatui::style::Color;

// Color palette used by every reader surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub background: Color, // Page background
    pub text: Color,       // Chapter prose
    pub muted: Color,      // Hints, help bar, placeholders
    pub accent: Color,     // Titles and borders
    pub selection: Color,  // Highlighted list rows
}

/// Reader themes, in the order the selector shows them.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub enum ReaderTheme {
    Light,
    Sepia,
    #[default]
    Dark,
    Black,
}

impl ReaderTheme {
    /// Identifier stored in the preference store.
    pub fn name(&self) -> &'static str {
        match self {
            ReaderTheme::Light => "light",
            ReaderTheme::Sepia => "sepia",
            ReaderTheme::Dark => "dark",
            ReaderTheme::Black => "black",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReaderTheme::Light => "Light",
            ReaderTheme::Sepia => "Sepia",
            ReaderTheme::Dark => "Dark",
            ReaderTheme::Black => "Night",
        }
    }

    pub fn palette(&self) -> &'static ThemePalette {
        match self {
            ReaderTheme::Light => &LIGHT_PALETTE,
            ReaderTheme::Sepia => &SEPIA_PALETTE,
            ReaderTheme::Dark => &DARK_PALETTE,
            ReaderTheme::Black => &BLACK_PALETTE,
        }
    }

    pub fn all() -> &'static [ReaderTheme] {
        &[
            ReaderTheme::Light,
            ReaderTheme::Sepia,
            ReaderTheme::Dark,
            ReaderTheme::Black,
        ]
    }

    /// Exact, case-sensitive lookup by stored name.
    pub fn lookup(name: &str) -> Option<ReaderTheme> {
        Self::all().iter().copied().find(|theme| theme.name() == name)
    }

    pub fn index(&self) -> usize {
        Self::all()
            .iter()
            .position(|theme| theme == self)
            .unwrap_or(0)
    }

    pub fn next(&self) -> ReaderTheme {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn previous(&self) -> ReaderTheme {
        let all = Self::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }
}

// ============================================================================
// Built-in palettes
// ============================================================================

const fn rgb(value: u32) -> Color {
    Color::Rgb(
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    )
}

static LIGHT_PALETTE: ThemePalette = ThemePalette {
    background: rgb(0xFFFFFF),
    text: rgb(0x111827),
    muted: rgb(0x6B7280),
    accent: rgb(0x2563EB),
    selection: rgb(0xE5E7EB),
};

static SEPIA_PALETTE: ThemePalette = ThemePalette {
    background: rgb(0xF4ECD8),
    text: rgb(0x5B4636),
    muted: rgb(0x8C7A66),
    accent: rgb(0x9A5B2F),
    selection: rgb(0xE6D9BC),
};

static DARK_PALETTE: ThemePalette = ThemePalette {
    background: rgb(0x1A1A1A),
    text: rgb(0xD1D5DB),
    muted: rgb(0x6B7280),
    accent: rgb(0x60A5FA),
    selection: rgb(0x2F2F2F),
};

static BLACK_PALETTE: ThemePalette = ThemePalette {
    background: rgb(0x000000),
    text: rgb(0xD1D5DB),
    muted: rgb(0x4B5563),
    accent: rgb(0x9CA3AF),
    selection: rgb(0x1F1F1F),
};
