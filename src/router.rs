use std::fmt;

use crate::api::NovelId;

/// Address of a chapter view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    pub novel_id: NovelId,
    pub chapter_number: i64,
}

impl Route {
    pub fn new(novel_id: NovelId, chapter_number: i64) -> Self {
        Self {
            novel_id,
            chapter_number,
        }
    }

    pub fn with_chapter(self, chapter_number: i64) -> Self {
        Self {
            chapter_number,
            ..self
        }
    }

    /// Parses `<novel_id> [chapter]` command line arguments.
    pub fn from_args(novel: &str, chapter: Option<&str>) -> Result<Self, String> {
        let novel_id = novel
            .trim()
            .parse::<NovelId>()
            .map_err(|e| format!("invalid novel id '{novel}': {e}"))?;
        let chapter_number = match chapter {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("invalid chapter number '{raw}': {e}"))?,
            None => 1,
        };
        Ok(Self::new(novel_id, chapter_number))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/novel/{}/{}", self.novel_id, self.chapter_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Catalog,
    Reader(Route),
}

/// History of visited screens. The first screen is never popped.
#[derive(Debug, Clone)]
pub struct Router {
    stack: Vec<Screen>,
}

impl Router {
    pub fn new(initial: Screen) -> Self {
        Self {
            stack: vec![initial],
        }
    }

    pub fn current(&self) -> Screen {
        // The stack always holds at least the initial screen.
        self.stack.last().copied().unwrap_or(Screen::Catalog)
    }

    pub fn push(&mut self, screen: Screen) {
        self.stack.push(screen);
    }

    /// Returns the screen that became current, or `None` at the root.
    pub fn back(&mut self) -> Option<Screen> {
        if self.stack.len() <= 1 {
            return None;
        }
        self.stack.pop();
        Some(self.current())
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
