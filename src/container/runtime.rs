//! Runtime client adapter.
//!
//! [`ContainerRuntime`] is the single seam between the panel and the container
//! runtime. The orchestrator, compose manager and database manager receive it
//! as an injected `Arc<dyn ContainerRuntime>`; [`DockerRuntime`] implements it
//! over bollard and the `docker compose` CLI.

use crate::container::executor::{self, ExecConfig, ExecOutput};
use crate::container::{
    ContainerClient, ContainerClientConfig, ContainerConfig, ContainerError, ImageInfo,
    ImageManager, NetworkManager, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncWrite;
use tokio::process::Command;
use tracing::{debug, info};

/// Snapshot of one container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerInfo {
    /// Full container ID
    pub id: String,
    /// Container name without the leading slash
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    /// Runtime status (`running`, `exited`, ...)
    pub status: String,
    /// Container labels
    pub labels: HashMap<String, String>,
    /// Environment (`KEY=VALUE`); empty in list results
    pub env: Vec<String>,
}

impl ContainerInfo {
    /// First twelve characters of the ID.
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }

    /// Whether the container is running.
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Interactive duplex channel to a shell inside a container.
pub struct ShellChannel {
    /// Bytes produced by the shell (tty output)
    pub output: BoxStream<'static, Result<Bytes>>,
    /// Shell stdin
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

/// Operations the panel consumes from the container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether `image` is present locally.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pull `image`, streaming progress to the log.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// List local images.
    async fn list_images(&self) -> Result<Vec<ImageInfo>>;

    /// Remove an image by tag or ID.
    async fn remove_image(&self, image: &str, force: bool) -> Result<()>;

    /// Load the image archive stored at `archive`, returning the loader's
    /// output lines. `file_name` selects plain or gzip decoding.
    async fn load_image(&self, file_name: &str, archive: &Path) -> Result<Vec<String>>;

    /// Get-or-create a bridge network, returning its ID.
    async fn ensure_network(&self, name: &str) -> Result<String>;

    /// Inspect one container by name or ID.
    async fn inspect_container(&self, name_or_id: &str) -> Result<ContainerInfo>;

    /// List containers, optionally stopped ones too, optionally by label.
    async fn list_containers(&self, all: bool, label: Option<&str>) -> Result<Vec<ContainerInfo>>;

    /// Create container `name` from `config` and start it, returning the ID.
    async fn create_and_start(&self, name: &str, config: &ContainerConfig) -> Result<String>;

    /// Start a stopped container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop a running container.
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Remove a container.
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    /// Run a one-shot command and capture its output.
    async fn exec(&self, id: &str, config: &ExecConfig) -> Result<ExecOutput>;

    /// Open an interactive shell with a pseudo-terminal and stdin attached.
    async fn open_shell(&self, id: &str, shell: &str, user: &str) -> Result<ShellChannel>;

    /// Combined stdout/stderr, last `tail` lines or everything.
    async fn logs(&self, id: &str, tail: Option<usize>) -> Result<String>;

    /// Validate a multi-service manifest.
    async fn compose_config(&self, manifest: &Path) -> Result<()>;

    /// Bring a manifest up under `project`, rebuilding images when `build`.
    async fn compose_up(&self, manifest: &Path, project: &str, build: bool) -> Result<()>;

    /// Whether a container with that name or ID exists.
    async fn container_exists(&self, name_or_id: &str) -> Result<bool> {
        match self.inspect_container(name_or_id).await {
            Ok(_) => Ok(true),
            Err(ContainerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// [`DockerRuntime`] configuration.
#[derive(Debug, Clone)]
pub struct DockerRuntimeConfig {
    /// Connection settings
    pub client: ContainerClientConfig,
    /// Seconds to wait for a graceful stop
    pub stop_timeout: i64,
}

impl Default for DockerRuntimeConfig {
    fn default() -> Self {
        Self {
            client: ContainerClientConfig::default(),
            stop_timeout: 10,
        }
    }
}

/// bollard-backed [`ContainerRuntime`].
pub struct DockerRuntime {
    client: ContainerClient,
    images: ImageManager,
    networks: NetworkManager,
    stop_timeout: i64,
}

impl DockerRuntime {
    /// Connect to the runtime.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn connect(config: DockerRuntimeConfig) -> Result<Self> {
        let client = ContainerClient::connect(&config.client).await?;
        Ok(Self::with_client(client, config.stop_timeout))
    }

    /// Build a runtime over an existing client.
    pub fn with_client(client: ContainerClient, stop_timeout: i64) -> Self {
        let images = ImageManager::new(client.docker().clone());
        let networks = NetworkManager::new(client.docker().clone());
        Self {
            client,
            images,
            networks,
            stop_timeout,
        }
    }

    /// Get the underlying client.
    pub fn client(&self) -> &ContainerClient {
        &self.client
    }

    async fn compose(&self, args: &[&str]) -> Result<(bool, String)> {
        let docker_cli = docker_cli()?;
        debug!("Running docker compose {:?}", args);

        let output = compose_command(&docker_cli, self.client.endpoint(), args)
            .output()
            .await?;

        let text = String::from_utf8_lossy(&output.stdout).to_string()
            + &String::from_utf8_lossy(&output.stderr);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            info!("compose: {}", line.trim());
        }
        Ok((output.status.success(), text))
    }
}

/// `docker compose <args>` aimed at the same daemon as the API client.
fn compose_command(docker_cli: &Path, endpoint: Option<&str>, args: &[&str]) -> Command {
    let mut command = Command::new(docker_cli);
    command.arg("compose").args(args).stdin(Stdio::null());
    if let Some(endpoint) = endpoint {
        command.env("DOCKER_HOST", cli_docker_host(endpoint));
    }
    command
}

/// `DOCKER_HOST` value for an endpoint; the CLI expects `tcp://` over `http://`.
fn cli_docker_host(endpoint: &str) -> String {
    match endpoint.strip_prefix("http://") {
        Some(rest) => format!("tcp://{}", rest),
        None => endpoint.to_string(),
    }
}

fn docker_cli() -> Result<PathBuf> {
    which::which("docker")
        .map_err(|e| ContainerError::Execution(format!("docker CLI not found: {}", e)))
}

fn is_not_modified(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.images.image_exists(image).await
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.images.pull_image(image).await
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        self.images.list_images().await
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        self.images.remove_image(image, force).await
    }

    async fn load_image(&self, file_name: &str, archive: &Path) -> Result<Vec<String>> {
        self.images.load_archive(file_name, archive).await
    }

    async fn ensure_network(&self, name: &str) -> Result<String> {
        self.networks.ensure_network(name).await
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<ContainerInfo> {
        let inspect = self
            .client
            .docker()
            .inspect_container(
                name_or_id,
                None::<bollard::query_parameters::InspectContainerOptions>,
            )
            .await
            .map_err(|e| ContainerError::from_api(name_or_id, e))?;

        let config = inspect.config.unwrap_or_default();
        Ok(ContainerInfo {
            id: inspect.id.unwrap_or_default(),
            name: inspect
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: config.image.unwrap_or_default(),
            status: inspect
                .state
                .and_then(|s| s.status)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
            env: config.env.unwrap_or_default(),
        })
    }

    async fn list_containers(&self, all: bool, label: Option<&str>) -> Result<Vec<ContainerInfo>> {
        let mut filters = HashMap::new();
        if let Some(label) = label {
            filters.insert("label".to_string(), vec![label.to_string()]);
        }

        let containers = self
            .client
            .docker()
            .list_containers(Some(bollard::container::ListContainersOptions {
                all,
                filters,
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerInfo {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                status: c.state.map(|s| s.to_string()).unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
                env: Vec::new(),
            })
            .collect())
    }

    async fn create_and_start(&self, name: &str, config: &ContainerConfig) -> Result<String> {
        use bollard::container::Config as BollardConfig;

        let options = bollard::container::CreateContainerOptions {
            name,
            ..Default::default()
        };

        let exposed_ports: HashMap<String, HashMap<(), ()>> = config
            .exposed_ports()
            .into_iter()
            .map(|port| (port, HashMap::new()))
            .collect();

        let bollard_config = BollardConfig {
            image: Some(config.image.clone()),
            hostname: config.hostname.clone(),
            cmd: config.cmd.clone(),
            env: config.env.clone(),
            labels: config.labels.clone(),
            tty: Some(config.tty),
            open_stdin: Some(config.open_stdin),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(config.host_config.clone()),
            ..Default::default()
        };

        debug!("Creating container: {}", name);
        let response = self
            .client
            .docker()
            .create_container(Some(options), bollard_config)
            .await?;
        info!("Created container: {} ({})", name, response.id);

        self.start_container(&response.id).await?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        debug!("Starting container: {}", id);
        match self
            .client
            .docker()
            .start_container(id, None::<bollard::container::StartContainerOptions<String>>)
            .await
        {
            Ok(()) => {}
            Err(e) if is_not_modified(&e) => debug!("Container {} already running", id),
            Err(e) => return Err(ContainerError::from_api(id, e)),
        }
        info!("Started container: {}", id);
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        debug!("Stopping container: {}", id);
        match self
            .client
            .docker()
            .stop_container(
                id,
                Some(bollard::container::StopContainerOptions {
                    t: self.stop_timeout,
                }),
            )
            .await
        {
            Ok(()) => {}
            Err(e) if is_not_modified(&e) => debug!("Container {} already stopped", id),
            Err(e) => return Err(ContainerError::from_api(id, e)),
        }
        info!("Stopped container: {}", id);
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        debug!("Removing container: {}", id);
        self.client
            .docker()
            .remove_container(
                id,
                Some(bollard::container::RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| ContainerError::from_api(id, e))?;
        info!("Removed container: {}", id);
        Ok(())
    }

    async fn exec(&self, id: &str, config: &ExecConfig) -> Result<ExecOutput> {
        executor::execute(self.client.docker(), id, config).await
    }

    async fn open_shell(&self, id: &str, shell: &str, user: &str) -> Result<ShellChannel> {
        use bollard::exec::{CreateExecOptions, StartExecResults};

        debug!("Starting interactive shell in container: {}", id);
        let docker = self.client.docker();

        let exec = docker
            .create_exec(
                id,
                CreateExecOptions {
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(true),
                    user: Some(user.to_string()),
                    cmd: Some(vec![shell.to_string()]),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ContainerError::from_api(id, e))?;

        match docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { output, input } => Ok(ShellChannel {
                output: output
                    .map(|item| item.map(|log| log.into_bytes()).map_err(ContainerError::Api))
                    .boxed(),
                input,
            }),
            StartExecResults::Detached => Err(ContainerError::Execution(
                "Unexpected detached execution".to_string(),
            )),
        }
    }

    async fn logs(&self, id: &str, tail: Option<usize>) -> Result<String> {
        let mut stream = self.client.docker().logs(
            id,
            Some(bollard::container::LogsOptions {
                stdout: true,
                stderr: true,
                tail: tail
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "all".to_string()),
                ..Default::default()
            }),
        );

        let mut output = String::new();
        while let Some(result) = stream.next().await {
            let log = result.map_err(|e| ContainerError::from_api(id, e))?;
            output.push_str(&log.to_string());
        }
        Ok(output)
    }

    async fn compose_config(&self, manifest: &Path) -> Result<()> {
        let path = manifest.to_string_lossy();
        let (ok, output) = self.compose(&["-f", path.as_ref(), "config"]).await?;
        if ok {
            Ok(())
        } else {
            Err(ContainerError::InvalidManifest(output.trim().to_string()))
        }
    }

    async fn compose_up(&self, manifest: &Path, project: &str, build: bool) -> Result<()> {
        let path = manifest.to_string_lossy();
        let mut args = vec!["-f", path.as_ref(), "-p", project, "up"];
        if build {
            args.push("--build");
        }
        args.push("-d");

        let (ok, output) = self.compose(&args).await?;
        if ok {
            Ok(())
        } else {
            Err(ContainerError::Execution(format!(
                "compose up failed for {}: {}",
                project,
                output.trim()
            )))
        }
    }
}
