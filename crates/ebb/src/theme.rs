//! Styling hooks for diff and migration presentation.
//!
//! The diff engine emits plain text and routes every decoration through a
//! [`DiffTheme`], so rendering stays testable without a TTY and colorization
//! remains a presenter concern.

/// Styling hooks applied while rendering diffs and change headers.
pub trait DiffTheme: Send + Sync {
    /// Style the marker for an added entry.
    fn added(&self, text: &str) -> String;

    /// Style the marker for a removed entry.
    fn removed(&self, text: &str) -> String;

    /// Style the separator between a changed value pair.
    fn changed(&self, text: &str) -> String;

    /// Style the target document path in a change header.
    fn target(&self, text: &str) -> String;
}

/// Identity theme: no decoration at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTheme;

impl DiffTheme for PlainTheme {
    fn added(&self, text: &str) -> String {
        text.to_string()
    }

    fn removed(&self, text: &str) -> String {
        text.to_string()
    }

    fn changed(&self, text: &str) -> String {
        text.to_string()
    }

    fn target(&self, text: &str) -> String {
        text.to_string()
    }
}

/// ANSI color theme for terminal presentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiTheme;

impl DiffTheme for AnsiTheme {
    fn added(&self, text: &str) -> String {
        console::style(text).green().bold().to_string()
    }

    fn removed(&self, text: &str) -> String {
        console::style(text).red().bold().to_string()
    }

    fn changed(&self, text: &str) -> String {
        console::style(text).yellow().bold().to_string()
    }

    fn target(&self, text: &str) -> String {
        console::style(text).blue().bold().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_theme_is_identity() {
        let theme = PlainTheme;
        assert_eq!(theme.added("+ "), "+ ");
        assert_eq!(theme.removed("- "), "- ");
        assert_eq!(theme.changed(" -> "), " -> ");
        assert_eq!(theme.target("users/u1"), "users/u1");
    }
}
