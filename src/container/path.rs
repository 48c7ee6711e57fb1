//! Host path translation for bind mounts.
//!
//! On hosts with drive-letter paths the runtime's mount subsystem expects
//! `D:\some\path` as `/mnt/d/some/path`. Any other input passes through
//! unchanged, so translation is idempotent.

/// Mount prefix for translated drive-letter paths.
pub const DRIVE_MOUNT_PREFIX: &str = "/mnt/";

/// Rewrites host paths into the runtime's mount syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTranslator {
    drive_letter_host: bool,
}

impl PathTranslator {
    /// Translator matching the current host (drive letters on Windows only).
    pub fn for_current_host() -> Self {
        Self {
            drive_letter_host: cfg!(windows),
        }
    }

    /// Translator that rewrites drive-letter paths regardless of host.
    pub fn drive_letter() -> Self {
        Self {
            drive_letter_host: true,
        }
    }

    /// Translator that never rewrites.
    pub fn passthrough() -> Self {
        Self {
            drive_letter_host: false,
        }
    }

    /// Pick a translator from an explicit override, else the current host.
    pub fn from_override(force_drive_letters: Option<bool>) -> Self {
        match force_drive_letters {
            Some(true) => Self::drive_letter(),
            Some(false) => Self::passthrough(),
            None => Self::for_current_host(),
        }
    }

    /// Translate `path`. Never fails; malformed input is returned as-is.
    pub fn translate(&self, path: &str) -> String {
        if !self.drive_letter_host {
            return path.to_string();
        }

        match drive_letter_parts(path) {
            Some((drive, rest)) => {
                let rest = rest.trim_start_matches('\\').replace('\\', "/");
                format!("{}{}/{}", DRIVE_MOUNT_PREFIX, drive.to_ascii_lowercase(), rest)
            }
            None => path.to_string(),
        }
    }
}

impl Default for PathTranslator {
    fn default() -> Self {
        Self::for_current_host()
    }
}

/// Split `X:\rest` into (`X`, `\rest`).
fn drive_letter_parts(path: &str) -> Option<(char, &str)> {
    let mut chars = path.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    if path[1..].starts_with(":\\") {
        Some((drive, &path[2..]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_letter_path_is_rewritten() {
        let t = PathTranslator::drive_letter();
        assert_eq!(t.translate(r"C:\a\b\c"), "/mnt/c/a/b/c");
        assert_eq!(t.translate(r"D:\some\path"), "/mnt/d/some/path");
    }

    #[test]
    fn test_leading_separators_are_stripped() {
        let t = PathTranslator::drive_letter();
        assert_eq!(t.translate(r"E:\\\data\file.lic"), "/mnt/e/data/file.lic");
        assert_eq!(t.translate(r"F:\"), "/mnt/f/");
    }

    #[test]
    fn test_every_drive_letter_is_lowercased() {
        let t = PathTranslator::drive_letter();
        for letter in ('A'..='Z').chain('a'..='z') {
            let input = format!(r"{}:\x\y", letter);
            let expected = format!("/mnt/{}/x/y", letter.to_ascii_lowercase());
            assert_eq!(t.translate(&input), expected);
        }
    }

    #[test]
    fn test_non_drive_paths_pass_through() {
        let t = PathTranslator::drive_letter();
        for input in [
            "/opt/data",
            "relative/dir",
            "C:/forward/slashes",
            "C:",
            "1:\\digits",
            "",
            "\\\\server\\share",
            "é:\\x",
        ] {
            assert_eq!(t.translate(input), input);
        }
    }

    #[test]
    fn test_translation_is_idempotent() {
        let t = PathTranslator::drive_letter();
        for input in [r"C:\a\b", "/mnt/c/a/b", "plain", r"Z:\"] {
            let once = t.translate(input);
            assert_eq!(t.translate(&once), once);
        }
    }

    #[test]
    fn test_passthrough_never_rewrites() {
        let t = PathTranslator::passthrough();
        assert_eq!(t.translate(r"C:\a\b"), r"C:\a\b");
    }

    #[test]
    fn test_override_selection() {
        assert_eq!(PathTranslator::from_override(Some(true)), PathTranslator::drive_letter());
        assert_eq!(PathTranslator::from_override(Some(false)), PathTranslator::passthrough());
        assert_eq!(PathTranslator::from_override(None), PathTranslator::for_current_host());
    }
}
