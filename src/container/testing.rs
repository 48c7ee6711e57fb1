//! In-memory [`ContainerRuntime`] for tests.

use crate::container::runtime::{ContainerInfo, ContainerRuntime, ShellChannel};
use crate::container::{ContainerConfig, ContainerError, ExecConfig, ExecOutput, ImageInfo, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

struct FakeContainer {
    info: ContainerInfo,
    config: Option<ContainerConfig>,
}

#[derive(Default)]
struct FakeState {
    images: HashSet<String>,
    pull_failures: HashSet<String>,
    networks: HashMap<String, String>,
    containers: Vec<FakeContainer>,
    exec_results: VecDeque<ExecOutput>,
    exec_commands: Vec<Vec<String>>,
    compose_services: HashMap<String, Vec<String>>,
    compose_invalid: bool,
    compose_up_fails: bool,
    compose_manifests: Vec<PathBuf>,
    logs: String,
    calls: Vec<&'static str>,
    next_id: u64,
}

/// Records every call and keeps containers, images and networks in memory.
#[derive(Default)]
pub(crate) struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_image(self, image: &str) -> Self {
        self.state.lock().unwrap().images.insert(image.to_string());
        self
    }

    pub(crate) fn fail_pull(&self, image: &str) {
        self.state.lock().unwrap().pull_failures.insert(image.to_string());
    }

    pub(crate) fn push_exec_result(&self, exit_code: i64, stdout: &str) {
        self.state.lock().unwrap().exec_results.push_back(ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(exit_code),
        });
    }

    pub(crate) fn set_compose_services(&self, project: &str, services: &[&str]) {
        self.state.lock().unwrap().compose_services.insert(
            project.to_string(),
            services.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub(crate) fn set_compose_invalid(&self) {
        self.state.lock().unwrap().compose_invalid = true;
    }

    pub(crate) fn set_compose_up_fails(&self) {
        self.state.lock().unwrap().compose_up_fails = true;
    }

    pub(crate) fn set_logs(&self, logs: &str) {
        self.state.lock().unwrap().logs = logs.to_string();
    }

    /// Insert a container directly, bypassing the call log.
    pub(crate) fn add_container(
        &self,
        name: &str,
        image: &str,
        status: &str,
        labels: &[(&str, &str)],
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state);
        state.containers.push(FakeContainer {
            info: ContainerInfo {
                id: id.clone(),
                name: name.to_string(),
                image: image.to_string(),
                status: status.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                env: Vec::new(),
            },
            config: None,
        });
        id
    }

    pub(crate) fn containers(&self) -> Vec<ContainerInfo> {
        let state = self.state.lock().unwrap();
        state.containers.iter().map(|c| c.info.clone()).collect()
    }

    pub(crate) fn containers_named(&self, name: &str) -> Vec<ContainerInfo> {
        self.containers().into_iter().filter(|c| c.name == name).collect()
    }

    pub(crate) fn config_of(&self, name: &str) -> Option<ContainerConfig> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .find(|c| c.info.name == name)
            .and_then(|c| c.config.clone())
    }

    pub(crate) fn has_image(&self, image: &str) -> bool {
        self.state.lock().unwrap().images.contains(image)
    }

    pub(crate) fn networks(&self) -> Vec<String> {
        self.state.lock().unwrap().networks.keys().cloned().collect()
    }

    pub(crate) fn exec_commands(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().exec_commands.clone()
    }

    pub(crate) fn compose_manifests(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().compose_manifests.clone()
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn called(&self, method: &str) -> bool {
        self.calls().iter().any(|c| *c == method)
    }

    fn record(&self, method: &'static str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method);
        state
    }
}

fn next_id(state: &mut FakeState) -> String {
    state.next_id += 1;
    format!("{:064x}", state.next_id)
}

fn find<'a>(state: &'a mut FakeState, name_or_id: &str) -> Result<&'a mut FakeContainer> {
    state
        .containers
        .iter_mut()
        .find(|c| {
            c.info.id == name_or_id || c.info.name == name_or_id || c.info.short_id() == name_or_id
        })
        .ok_or_else(|| ContainerError::NotFound(name_or_id.to_string()))
}

fn label_matches(info: &ContainerInfo, filter: &str) -> bool {
    match filter.split_once('=') {
        Some((key, value)) => info.labels.get(key).is_some_and(|v| v == value),
        None => info.labels.contains_key(filter),
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        Ok(self.record("image_exists").images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut state = self.record("pull_image");
        if state.pull_failures.contains(image) {
            return Err(ContainerError::Execution(format!(
                "Pull failed: manifest for {} not found",
                image
            )));
        }
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let state = self.record("list_images");
        let mut images: Vec<ImageInfo> = state
            .images
            .iter()
            .map(|tag| ImageInfo {
                id: format!("sha256:{}", tag.len()),
                repo_tags: vec![tag.clone()],
                size: 0,
                created: 0,
            })
            .collect();
        images.sort_by(|a, b| a.repo_tags.cmp(&b.repo_tags));
        Ok(images)
    }

    async fn remove_image(&self, image: &str, _force: bool) -> Result<()> {
        let mut state = self.record("remove_image");
        if state.images.remove(image) {
            Ok(())
        } else {
            Err(ContainerError::NotFound(image.to_string()))
        }
    }

    async fn load_image(&self, file_name: &str, archive: &Path) -> Result<Vec<String>> {
        drop(self.record("load_image"));
        let reader = crate::container::image::open_archive(file_name, archive)?;
        let mut chunks = std::pin::pin!(crate::container::image::archive_chunks(reader, 1024));
        let mut total = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| {
                ContainerError::Execution(format!("Loading {} failed: {}", file_name, e))
            })?;
            total += chunk.len();
        }
        Ok(vec![format!("Loaded {} bytes from {}", total, file_name)])
    }

    async fn ensure_network(&self, name: &str) -> Result<String> {
        let mut state = self.record("ensure_network");
        let id = format!("net-{}", name);
        Ok(state
            .networks
            .entry(name.to_string())
            .or_insert(id)
            .clone())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<ContainerInfo> {
        let mut state = self.record("inspect_container");
        Ok(find(&mut state, name_or_id)?.info.clone())
    }

    async fn list_containers(&self, all: bool, label: Option<&str>) -> Result<Vec<ContainerInfo>> {
        let state = self.record("list_containers");
        Ok(state
            .containers
            .iter()
            .map(|c| &c.info)
            .filter(|info| all || info.is_running())
            .filter(|info| label.is_none_or(|l| label_matches(info, l)))
            .cloned()
            .collect())
    }

    async fn create_and_start(&self, name: &str, config: &ContainerConfig) -> Result<String> {
        let mut state = self.record("create_and_start");
        if state.containers.iter().any(|c| c.info.name == name) {
            return Err(ContainerError::Api(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 409,
                    message: format!(
                        "Conflict. The container name \"/{}\" is already in use",
                        name
                    ),
                },
            ));
        }
        let id = next_id(&mut state);
        state.containers.push(FakeContainer {
            info: ContainerInfo {
                id: id.clone(),
                name: name.to_string(),
                image: config.image.clone(),
                status: "running".to_string(),
                labels: config.labels.clone().unwrap_or_default(),
                env: config.env.clone().unwrap_or_default(),
            },
            config: Some(config.clone()),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.record("start_container");
        find(&mut state, id)?.info.status = "running".to_string();
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.record("stop_container");
        find(&mut state, id)?.info.status = "exited".to_string();
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut state = self.record("remove_container");
        let target = find(&mut state, id)?;
        if target.info.is_running() && !force {
            return Err(ContainerError::Execution(format!(
                "cannot remove running container {}",
                id
            )));
        }
        let target_id = target.info.id.clone();
        state.containers.retain(|c| c.info.id != target_id);
        Ok(())
    }

    async fn exec(&self, id: &str, config: &ExecConfig) -> Result<ExecOutput> {
        let mut state = self.record("exec");
        find(&mut state, id)?;
        state.exec_commands.push(config.cmd().to_vec());
        Ok(state.exec_results.pop_front().unwrap_or(ExecOutput {
            exit_code: Some(0),
            ..Default::default()
        }))
    }

    async fn open_shell(&self, id: &str, _shell: &str, _user: &str) -> Result<ShellChannel> {
        let mut state = self.record("open_shell");
        find(&mut state, id)?;
        Ok(ShellChannel {
            output: Box::pin(futures::stream::empty::<Result<bytes::Bytes>>()),
            input: Box::pin(tokio::io::sink()),
        })
    }

    async fn logs(&self, id: &str, _tail: Option<usize>) -> Result<String> {
        let mut state = self.record("logs");
        find(&mut state, id)?;
        Ok(state.logs.clone())
    }

    async fn compose_config(&self, manifest: &Path) -> Result<()> {
        let mut state = self.record("compose_config");
        state.compose_manifests.push(manifest.to_path_buf());
        if state.compose_invalid {
            return Err(ContainerError::InvalidManifest(
                "services must be a mapping".to_string(),
            ));
        }
        Ok(())
    }

    async fn compose_up(&self, manifest: &Path, project: &str, _build: bool) -> Result<()> {
        let mut state = self.record("compose_up");
        state.compose_manifests.push(manifest.to_path_buf());
        if state.compose_up_fails {
            return Err(ContainerError::Execution(format!(
                "compose up failed for {}",
                project
            )));
        }

        let services = state.compose_services.get(project).cloned().unwrap_or_default();
        for service in services {
            let name = format!("{}-{}-1", project, service);
            if let Some(existing) = state.containers.iter_mut().find(|c| c.info.name == name) {
                existing.info.status = "running".to_string();
                continue;
            }
            let id = next_id(&mut state);
            state.containers.push(FakeContainer {
                info: ContainerInfo {
                    id,
                    name,
                    image: format!("{}:latest", service),
                    status: "running".to_string(),
                    labels: HashMap::from([(
                        crate::env::runtime::COMPOSE_PROJECT_LABEL.to_string(),
                        project.to_string(),
                    )]),
                    env: Vec::new(),
                },
                config: None,
            });
        }
        Ok(())
    }
}
