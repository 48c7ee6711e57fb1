//! Container image management.
//!
//! Listing, pulling with streamed progress, removal, and loading image
//! archives (`.tar`, `.tar.gz`, `.tgz`) uploaded by the operator. Archives are
//! spooled to disk by the caller and streamed to the daemon from there.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Archive suffixes accepted by [`ImageManager::load_archive`].
pub const ARCHIVE_SUFFIXES: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

/// Image manager for listing, pulling and loading images.
pub struct ImageManager {
    docker: Docker,
}

impl ImageManager {
    /// Create a new image manager.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Check if an image exists locally.
    ///
    /// # Errors
    ///
    /// Returns error if image inspection fails.
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ContainerError::Api(e)),
        }
    }

    /// Pull an image from a registry, logging every progress event.
    ///
    /// # Errors
    ///
    /// Returns error if the pull stream reports an error.
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling image: {}", image);

        let mut stream = self.docker.create_image(
            Some(bollard::image::CreateImageOptions {
                from_image: image,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await {
            let event = result?;
            if let Some(error) = event.error {
                return Err(ContainerError::Execution(format!("Pull failed: {}", error)));
            }
            let line = ProgressLine {
                id: event.id,
                status: event.status.unwrap_or_default(),
                progress: event.progress,
            };
            info!("{}", line);
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    /// Remove an image by tag or ID.
    ///
    /// # Errors
    ///
    /// Returns error if image removal fails.
    pub async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        info!("Removing image: {}", image);

        self.docker
            .remove_image(
                image,
                Some(bollard::image::RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            )
            .await
            .map_err(|e| ContainerError::from_api(image, e))?;

        info!("Successfully removed image: {}", image);
        Ok(())
    }

    /// List all local images.
    ///
    /// # Errors
    ///
    /// Returns error if listing fails.
    pub async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let images = self
            .docker
            .list_images(Some(bollard::image::ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await?;

        Ok(images
            .into_iter()
            .map(|img| ImageInfo {
                id: img.id,
                repo_tags: img.repo_tags,
                size: img.size,
                created: img.created,
            })
            .collect())
    }

    /// Load an image archive from `path` through the image load endpoint.
    ///
    /// The archive is read in [`ARCHIVE_CHUNK_SIZE`] chunks and gzip archives
    /// are inflated while streaming. Returns the daemon's output lines.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] for unsupported file names and
    /// an execution error if the daemon rejects the archive.
    pub async fn load_archive(&self, file_name: &str, path: &Path) -> Result<Vec<String>> {
        let reader = open_archive(file_name, path)?;
        info!("Loading image archive {} from {}", file_name, path.display());

        let options = bollard::query_parameters::ImportImageOptionsBuilder::default()
            .quiet(false)
            .build();
        let mut stream = self.docker.import_image(
            options,
            bollard::body_try_stream(archive_chunks(reader, ARCHIVE_CHUNK_SIZE)),
            None,
        );

        let mut lines = Vec::new();
        while let Some(result) = stream.next().await {
            let event = result.map_err(|e| {
                ContainerError::Execution(format!("Loading {} failed: {}", file_name, e))
            })?;
            for line in [event.stream, event.status].into_iter().flatten() {
                let line = line.trim();
                if !line.is_empty() {
                    info!(">> {}", line);
                    lines.push(line.to_string());
                }
            }
        }
        Ok(lines)
    }
}

/// Read size of one archive chunk.
pub const ARCHIVE_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Check the archive name carries a supported suffix.
///
/// # Errors
///
/// Returns [`ContainerError::Validation`] for unsupported suffixes.
pub fn validate_archive_name(file_name: &str) -> Result<()> {
    if ARCHIVE_SUFFIXES.iter().any(|s| file_name.ends_with(s)) {
        Ok(())
    } else {
        Err(ContainerError::Validation(format!(
            "Unsupported file type: '{}'. Use .tar, .tar.gz or .tgz",
            file_name
        )))
    }
}

/// Open the archive at `path` as a tar reader, inflating gzip lazily.
///
/// # Errors
///
/// Returns [`ContainerError::Validation`] for unsupported suffixes and an I/O
/// error if the file cannot be opened.
pub fn open_archive(file_name: &str, path: &Path) -> Result<Box<dyn Read + Send>> {
    validate_archive_name(file_name)?;
    let file = std::fs::File::open(path)?;
    if file_name.ends_with(".tar") {
        Ok(Box::new(file))
    } else {
        debug!("Inflating {} while streaming", file_name);
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    }
}

/// Chunks of `reader`, read on a blocking thread.
///
/// At most two chunks are buffered ahead of the consumer. A read error ends
/// the stream after being yielded.
pub fn archive_chunks(
    reader: Box<dyn Read + Send>,
    chunk_size: usize,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let (tx, rx) = tokio::sync::mpsc::channel(2);
    tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        loop {
            let mut buf = vec![0u8; chunk_size];
            match fill_chunk(&mut reader, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    if tx.blocking_send(Ok(Bytes::from(buf))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    })
}

fn fill_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// One pull progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub id: Option<String>,
    pub status: String,
    pub progress: Option<String>,
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(
                f,
                "{}: {} {}",
                id,
                self.status,
                self.progress.as_deref().unwrap_or("")
            ),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Image information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImageInfo {
    /// Image ID
    pub id: String,
    /// Repository tags
    pub repo_tags: Vec<String>,
    /// Size in bytes
    pub size: i64,
    /// Creation timestamp
    pub created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_progress_line_format() {
        let with_id = ProgressLine {
            id: Some("a1b2".to_string()),
            status: "Downloading".to_string(),
            progress: Some("[==>  ] 1MB/4MB".to_string()),
        };
        assert_eq!(with_id.to_string(), "a1b2: Downloading [==>  ] 1MB/4MB");

        let bare = ProgressLine {
            id: None,
            status: "Digest: sha256:abc".to_string(),
            progress: None,
        };
        assert_eq!(bare.to_string(), "Digest: sha256:abc");
    }

    async fn read_all(
        file_name: &str,
        path: &Path,
        chunk_size: usize,
    ) -> Vec<std::io::Result<Bytes>> {
        let reader = open_archive(file_name, path).unwrap();
        archive_chunks(reader, chunk_size).collect().await
    }

    #[test]
    fn test_archive_name_validation() {
        for name in ["image.tar", "image.tar.gz", "image.tgz"] {
            assert!(validate_archive_name(name).is_ok(), "{}", name);
        }
        let err = validate_archive_name("image.zip").unwrap_err();
        assert!(matches!(err, ContainerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_plain_tar_is_chunked_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, b"0123456789").unwrap();

        let chunks = read_all("image.tar", &path, 4).await;
        let chunks: Vec<Vec<u8>> = chunks.into_iter().map(|c| c.unwrap().to_vec()).collect();
        assert_eq!(chunks, vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);
    }

    #[tokio::test]
    async fn test_gzip_is_inflated_while_streaming() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"tar-bytes").unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        for name in ["image.tgz", "image.tar.gz"] {
            let chunks = read_all(name, &path, ARCHIVE_CHUNK_SIZE).await;
            let bytes: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect();
            assert_eq!(bytes, b"tar-bytes");
        }
    }

    #[tokio::test]
    async fn test_corrupt_gzip_yields_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, b"not gzip at all").unwrap();

        let chunks = read_all("image.tgz", &path, 1024).await;
        assert!(chunks.last().unwrap().is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_list_images() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let manager = ImageManager::new(docker);

        let images = manager.list_images().await.unwrap();
        println!("Found {} images", images.len());
    }
}
