//! Syntax highlighting for fenced code blocks.
//!
//! Uses syntect with Sublime Text syntax definitions and emits inline-styled
//! `<span>` markup, so the preview needs no extra stylesheet.

use std::sync::{Mutex, OnceLock};

use syntect::easy::HighlightLines;
use syntect::highlighting::{Color, Style, Theme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Highlight `code` as `language`, returning the inner markup for a
/// `<code>` element.
///
/// Returns `None` when no language is given, the language is unknown, or
/// syntect fails on the input; callers render the block as plain text then.
pub fn code_html(language: Option<&str>, code: &str) -> Option<String> {
    let syntax_set = syntax_set();
    let syntax = find_syntax(syntax_set, language?)?;
    let mode = background_mode();

    let mut highlighter = HighlightLines::new(syntax, theme());
    let mut html = String::with_capacity(code.len() * 4);
    for line in LinesWithEndings::from(code) {
        let regions = match highlighter.highlight_line(line, syntax_set) {
            Ok(regions) => regions,
            Err(err) => {
                tracing::debug!(%err, language, "highlighting failed, rendering plain");
                return None;
            }
        };
        let adjusted: Vec<(Style, &str)> = regions
            .into_iter()
            .map(|(mut style, text)| {
                style.foreground = adjust_fg_for_background(style.foreground, mode);
                (style, text)
            })
            .collect();
        match styled_line_to_highlighted_html(&adjusted, IncludeBackground::No) {
            Ok(line_html) => html.push_str(&line_html),
            Err(err) => {
                tracing::debug!(%err, language, "highlighting failed, rendering plain");
                return None;
            }
        }
    }
    Some(html)
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, language: &str) -> Option<&'a SyntaxReference> {
    syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_name(language))
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

fn theme() -> &'static Theme {
    static THEME: OnceLock<Theme> = OnceLock::new();
    THEME.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        let theme_set = ThemeSet::load_defaults();
        let preferred = match background_mode() {
            BackgroundMode::Dark => [
                "Monokai Extended",
                "base16-ocean.dark",
                "Solarized (dark)",
            ]
            .as_slice(),
            BackgroundMode::Light => ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"]
                .as_slice(),
        };

        for name in preferred {
            if let Some(theme) = theme_set.themes.get(*name) {
                return theme.clone();
            }
        }

        theme_set
            .themes
            .values()
            .next()
            .cloned()
            .unwrap_or_default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackgroundMode {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

static BACKGROUND_OVERRIDE: OnceLock<Mutex<Option<HighlightBackground>>> = OnceLock::new();

/// Force the preview background the highlighting theme is picked for.
///
/// Must be called before the first block is highlighted; the theme is
/// loaded once per process.
pub fn set_background_mode(mode: Option<HighlightBackground>) {
    let lock = BACKGROUND_OVERRIDE.get_or_init(|| Mutex::new(None));
    let mut guard = lock.lock().expect("highlight background lock");
    *guard = mode;
}

fn background_mode() -> BackgroundMode {
    let lock = BACKGROUND_OVERRIDE.get_or_init(|| Mutex::new(None));
    if let Ok(guard) = lock.lock()
        && let Some(mode) = *guard
    {
        return match mode {
            HighlightBackground::Light => BackgroundMode::Light,
            HighlightBackground::Dark => BackgroundMode::Dark,
        };
    }
    background_mode_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
}

fn background_mode_from_colorfgbg(colorfgbg: Option<&str>) -> BackgroundMode {
    let Some(value) = colorfgbg else {
        return BackgroundMode::Light;
    };
    let bg_str = value.rsplit(';').next().unwrap_or(value);
    let Ok(bg) = bg_str.parse::<u8>() else {
        return BackgroundMode::Light;
    };

    if bg >= 7 {
        BackgroundMode::Light
    } else {
        BackgroundMode::Dark
    }
}

fn luma(color: Color) -> f32 {
    (0.2126 * f32::from(color.r)) + (0.7152 * f32::from(color.g)) + (0.0722 * f32::from(color.b))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn adjust_fg_for_background(color: Color, mode: BackgroundMode) -> Color {
    match mode {
        BackgroundMode::Dark => color,
        BackgroundMode::Light => {
            if luma(color) < 155.0 {
                return color;
            }
            let darken = |c: u8| (f32::from(c) * 0.42).round() as u8;
            Color {
                r: darken(color.r),
                g: darken(color.g),
                b: darken(color.b),
                a: color.a,
            }
        }
    }
}
