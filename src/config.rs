//! Persisted flag defaults.
//!
//! Defaults are stored as plain flag tokens, one flag per line, in a global
//! config file and an optional `.livemarkrc` in the working directory. Both
//! are merged under the command line with [`ConfigFlags::union`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub listen: bool,
    pub perf: bool,
    pub no_highlight: bool,
    pub port: Option<u16>,
    pub cursor_line: Option<usize>,
    pub yield_every: Option<usize>,
    pub theme: Option<ThemeMode>,
    pub debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge `other` over `self`: switches are or-ed, valued flags from
    /// `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            listen: self.listen || other.listen,
            perf: self.perf || other.perf,
            no_highlight: self.no_highlight || other.no_highlight,
            port: other.port.or(self.port),
            cursor_line: other.cursor_line.or(self.cursor_line),
            yield_every: other.yield_every.or(self.yield_every),
            theme: other.theme.or(self.theme),
            debug_log: other.debug_log.clone().or_else(|| self.debug_log.clone()),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("livemark").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("livemark")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("livemark").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("livemark")
                .join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".livemarkrc")
}

/// Read flag tokens from `path`; a missing file yields the defaults.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// Write `flags` to `path` as flag tokens.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# livemark defaults (saved with --save)".to_string()];
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.listen {
        lines.push("--listen".to_string());
    }
    if let Some(port) = flags.port {
        lines.push(format!("--port {port}"));
    }
    if let Some(line) = flags.cursor_line {
        lines.push(format!("--cursor-line {line}"));
    }
    if let Some(theme) = flags.theme {
        lines.push(format!("--theme {}", theme.as_str()));
    }
    if let Some(every) = flags.yield_every {
        lines.push(format!("--yield-every {every}"));
    }
    if flags.no_highlight {
        lines.push("--no-highlight".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(path) = &flags.debug_log {
        lines.push(format!("--debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// Remove a saved config file if present.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the known flags out of a token list. Unknown tokens, positional
/// arguments and unparsable values are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (token, None),
        };
        match name {
            "--watch" => flags.watch = true,
            "--listen" => flags.listen = true,
            "--perf" => flags.perf = true,
            "--no-highlight" => flags.no_highlight = true,
            "--port" | "--cursor-line" | "--yield-every" | "--theme" | "--debug-log" => {
                let value = match inline {
                    Some(value) => Some(value),
                    None => {
                        i += 1;
                        tokens.get(i).map(String::as_str)
                    }
                };
                if let Some(value) = value {
                    apply_value(&mut flags, name, value);
                }
            }
            _ => {}
        }
        i += 1;
    }
    flags
}

fn apply_value(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--port" => flags.port = value.parse().ok(),
        "--cursor-line" => flags.cursor_line = value.parse().ok().filter(|line| *line >= 1),
        "--yield-every" => flags.yield_every = value.parse().ok().filter(|every| *every >= 1),
        "--theme" => flags.theme = parse_theme(value),
        "--debug-log" => flags.debug_log = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn parse_theme(s: &str) -> Option<ThemeMode> {
    match s {
        "auto" => Some(ThemeMode::Auto),
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(src: &[&str]) -> Vec<String> {
        src.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = tokens(&[
            "livemark",
            "--watch",
            "--listen",
            "--port",
            "9001",
            "--theme",
            "dark",
            "--cursor-line=12",
            "--debug-log=render.log",
            "--no-highlight",
            "README.md",
        ]);
        let flags = parse_flag_tokens(&args);
        assert!(flags.watch);
        assert!(flags.listen);
        assert!(flags.no_highlight);
        assert_eq!(flags.port, Some(9001));
        assert_eq!(flags.theme, Some(ThemeMode::Dark));
        assert_eq!(flags.cursor_line, Some(12));
        assert_eq!(flags.debug_log, Some(PathBuf::from("render.log")));
    }

    #[test]
    fn test_parse_flag_tokens_ignores_bad_values() {
        let flags = parse_flag_tokens(&tokens(&[
            "--port",
            "huge",
            "--cursor-line",
            "0",
            "--yield-every=0",
            "--theme",
            "sepia",
        ]));
        assert_eq!(flags, ConfigFlags::default());
    }

    #[test]
    fn test_parse_flag_tokens_missing_value_at_end() {
        let flags = parse_flag_tokens(&tokens(&["--watch", "--port"]));
        assert!(flags.watch);
        assert_eq!(flags.port, None);
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            watch: true,
            port: Some(8090),
            theme: Some(ThemeMode::Light),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            listen: true,
            theme: Some(ThemeMode::Dark),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.listen);
        assert_eq!(merged.port, Some(8090));
        assert_eq!(merged.theme, Some(ThemeMode::Dark));
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".livemarkrc");
        let flags = ConfigFlags {
            watch: true,
            listen: true,
            perf: true,
            no_highlight: true,
            port: Some(9100),
            cursor_line: Some(3),
            yield_every: Some(16),
            theme: Some(ThemeMode::Dark),
            debug_log: Some(PathBuf::from("render.log")),
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_config_is_default() {
        let dir = tempdir().unwrap();
        let loaded = load_config_flags(&dir.path().join("absent")).unwrap();
        assert_eq!(loaded, ConfigFlags::default());
    }
}
