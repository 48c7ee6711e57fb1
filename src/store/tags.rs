//! Image tag listing files.
//!
//! Each file is a registry listing with a header line; the second column of
//! every row holds comma-separated tags. Digest entries are dropped.

use std::path::Path;
use tracing::debug;

/// Extract tags from listing text, sorted descending.
pub fn parse_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = text
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .flat_map(|column| column.split(','))
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && !tag.starts_with("sha256"))
        .map(String::from)
        .collect();

    tags.sort_by(|a, b| b.cmp(a));
    tags.dedup();
    tags
}

/// Read and parse a listing file. A missing or unreadable file yields no tags.
pub async fn parse_tag_file(path: &Path) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_tags(&text),
        Err(e) => {
            debug!("No tag listing at {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
DIGEST         TAGS                    TIMESTAMP
0123abcd       9.0.0,latest            2024-01-01T00:00:00
4567ef01       9.1.0                   2024-06-01T00:00:00
89abcdef       sha256-1234.sig,8.0     2023-01-01T00:00:00
lonely
";

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(LISTING), vec!["latest", "9.1.0", "9.0.0", "8.0"]);
    }

    #[test]
    fn test_header_only() {
        assert!(parse_tags("DIGEST TAGS\n").is_empty());
        assert!(parse_tags("").is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(parse_tag_file(&dir.path().join("none.txt")).await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tags.txt");
        tokio::fs::write(&path, LISTING).await.unwrap();
        assert_eq!(parse_tag_file(&path).await.len(), 4);
    }
}
