//! Target platform capability.
//!
//! Selected once per process and threaded through the normalizer, the
//! pattern store and the matcher instead of branching on `cfg!` everywhere.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for. macOS uses the Unix rules.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Parse a platform name as used in config files and on the command line.
    /// `auto` resolves to [`Platform::current`].
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "unix" | "linux" | "macos" | "darwin" => Some(Platform::Unix),
            "windows" | "win32" => Some(Platform::Windows),
            "auto" | "" => Some(Self::current()),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Unix => "unix",
            Platform::Windows => "windows",
        }
    }

    /// Canonical path separator after normalization.
    pub fn separator(self) -> char {
        match self {
            Platform::Unix => '/',
            Platform::Windows => '\\',
        }
    }

    /// Whether `c` separates path segments on this platform.
    pub fn is_separator(self, c: char) -> bool {
        match self {
            Platform::Unix => c == '/',
            Platform::Windows => c == '/' || c == '\\',
        }
    }

    pub fn case_insensitive(self) -> bool {
        self == Platform::Windows
    }

    /// Whether `path` is absolute under this platform's rules.
    ///
    /// Windows accepts drive paths (`C:\`, `c:/`), UNC paths and rooted paths.
    pub fn is_absolute(self, path: &str) -> bool {
        match self {
            Platform::Unix => path.starts_with('/'),
            Platform::Windows => {
                let mut chars = path.chars();
                match (chars.next(), chars.next(), chars.next()) {
                    (Some(first), _, _) if self.is_separator(first) => true,
                    (Some(drive), Some(':'), third) => {
                        drive.is_ascii_alphabetic()
                            && third.is_none_or(|c| self.is_separator(c))
                    }
                    _ => false,
                }
            }
        }
    }

    /// File name suffix of the platform-specific pattern file.
    pub fn pattern_file(self) -> String {
        format!("patterns-{}.toml", self.as_str())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!(Platform::parse("unix"), Some(Platform::Unix));
        assert_eq!(Platform::parse("Darwin"), Some(Platform::Unix));
        assert_eq!(Platform::parse("windows"), Some(Platform::Windows));
        assert_eq!(Platform::parse("auto"), Some(Platform::current()));
        assert_eq!(Platform::parse("plan9"), None);
    }

    #[test]
    fn unix_absolute() {
        assert!(Platform::Unix.is_absolute("/etc/hosts"));
        assert!(!Platform::Unix.is_absolute("etc/hosts"));
        assert!(!Platform::Unix.is_absolute("C:\\Windows"));
    }

    #[test]
    fn windows_absolute() {
        assert!(Platform::Windows.is_absolute("C:\\Windows"));
        assert!(Platform::Windows.is_absolute("c:/windows"));
        assert!(Platform::Windows.is_absolute("C:"));
        assert!(Platform::Windows.is_absolute("\\\\server\\share"));
        assert!(Platform::Windows.is_absolute("\\Windows"));
        assert!(!Platform::Windows.is_absolute("C:foo"));
        assert!(!Platform::Windows.is_absolute("src\\main.rs"));
    }

    #[test]
    fn pattern_file_names() {
        assert_eq!(Platform::Unix.pattern_file(), "patterns-unix.toml");
        assert_eq!(Platform::Windows.pattern_file(), "patterns-windows.toml");
    }
}
