//! Instance lifecycle orchestration.
//!
//! [`LifecycleOrchestrator`] turns a [`LaunchSpec`] into a running container:
//!
//! 1. Parse ports, volumes and environment; malformed input fails before any
//!    mutating runtime call.
//! 2. Make sure the image is present, pulling it when absent.
//! 3. Get-or-create the shared bridge network.
//! 4. Create the per-instance shared directory and bind it next to the user
//!    volumes, host paths run through the [`PathTranslator`].
//! 5. Create and start the container with a pseudo-terminal.
//! 6. Create the shared folder inside the container.
//! 7. Save the spec to the [`InstanceStore`] for later rebuilds.
//!
//! A failure after step 5 leaves the container running. Rebuild parses the new
//! spec first, then removes the old container before launching the
//! replacement and does not restore it if the launch fails.

use crate::container::logs::{self, LogDownload};
use crate::container::spec::validate_volume_paths;
use crate::container::{
    ContainerConfig, ContainerError, ContainerInfo, ContainerRuntime, EnvAssignment, ErrorKind,
    ExecConfig, ImageCategory, LaunchSpec, PathTranslator, PortMapping, Result, VolumeMapping,
};
use crate::env;
use crate::env::runtime::{COMPOSE_PROJECT_LABEL, CONTAINER_SHARED_PATH};
use crate::store::{InstanceRecord, InstanceStore};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Settings shared by every launch.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Bridge network every instance joins
    pub network: String,
    /// Registry prefix of managed images
    pub registry_prefix: String,
    /// Root of shared-data, logs and licence directories
    pub data_root: PathBuf,
    /// Host path rewriting for bind mounts
    pub translator: PathTranslator,
    /// In-container mount point of the shared directory
    pub shared_path: String,
    /// Lines returned by a non-full log request
    pub log_tail: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            network: env::runtime::DEFAULT_NETWORK_NAME.to_string(),
            registry_prefix: env::runtime::DEFAULT_REGISTRY_PREFIX.to_string(),
            data_root: PathBuf::from("."),
            translator: PathTranslator::for_current_host(),
            shared_path: CONTAINER_SHARED_PATH.to_string(),
            log_tail: 500,
        }
    }
}

/// Result of a launch as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Launched { id: String },
    Failed { kind: ErrorKind, message: String },
}

impl LaunchOutcome {
    pub fn is_launched(&self) -> bool {
        matches!(self, LaunchOutcome::Launched { .. })
    }

    /// Instance ID when launched.
    pub fn id(&self) -> Option<&str> {
        match self {
            LaunchOutcome::Launched { id } => Some(id),
            LaunchOutcome::Failed { .. } => None,
        }
    }
}

impl From<Result<String>> for LaunchOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(id) => LaunchOutcome::Launched { id },
            Err(e) => LaunchOutcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// Pre-filled values for a launch form.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LaunchDefaults {
    pub tag: String,
    pub group: String,
    pub hostname: String,
    pub volumes: Vec<String>,
    pub ports: Vec<String>,
    pub env_vars: Vec<String>,
    pub command: String,
}

impl LaunchDefaults {
    /// Ports and command for the category of `group`.
    pub fn for_group(group: &str, tag: &str) -> Self {
        let (ports, command): (&[&str], &str) = match ImageCategory::from_group(group) {
            ImageCategory::Manager => (
                &["10091:10091", "10090:10090", "19090:19090"],
                "--smserver --smadmin --lmserver",
            ),
            ImageCategory::Platform => (
                &["9999:9999", "9997:9997", "9996:9996", "9995:9995", "9090:9090"],
                "--vdpserver --designstudio --schserver --schadmin --datacatalog --dmt --monitor",
            ),
        };

        Self {
            tag: tag.to_string(),
            group: group.to_string(),
            hostname: String::new(),
            volumes: Vec::new(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
            env_vars: Vec::new(),
            command: command.to_string(),
        }
    }

    /// [`Self::for_group`] plus the licence volume found under `data_root`.
    pub async fn discover(data_root: &Path, group: &str, tag: &str) -> Self {
        let mut defaults = Self::for_group(group, tag);
        let category = ImageCategory::from_group(group);
        if let Some(mount) = find_license_mount(data_root, platform_version(tag), category).await {
            defaults.volumes.push(mount);
        }
        defaults
    }
}

/// Licence directory name for a tag (`denodo9`, `denodo8`, `denodo7`).
pub fn platform_version(tag: &str) -> &'static str {
    match tag.chars().next() {
        Some('9') => "denodo9",
        Some('8') => "denodo8",
        Some('7') => "denodo7",
        _ => "unknown",
    }
}

const LICENSE_TARGET: &str = "/opt/denodo/conf/denodo.lic";

/// First `*.lic` under `mount/<version>/license` whose name carries the
/// category marker, as a volume entry.
pub async fn find_license_mount(
    data_root: &Path,
    version: &str,
    category: ImageCategory,
) -> Option<String> {
    let dir = env::license_dir_path(data_root, version);
    let marker = match category {
        ImageCategory::Manager => "SOL",
        ImageCategory::Platform => "SA",
    };

    let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".lic") && name.contains(marker) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    let path = candidates.into_iter().next()?;
    let path = std::path::absolute(&path).unwrap_or(path);
    debug!("Found licence file {}", path.display());
    Some(format!("{}:{}", path.display(), LICENSE_TARGET))
}

/// A spec whose ports, volumes and environment have been parsed.
struct LaunchPlan {
    spec: LaunchSpec,
    image: String,
    ports: Vec<PortMapping>,
    volumes: Vec<VolumeMapping>,
    env_vars: Vec<EnvAssignment>,
}

impl LaunchPlan {
    /// Normalize `spec` and parse everything a launch needs, touching nothing.
    fn parse(spec: &LaunchSpec, registry_prefix: &str) -> Result<Self> {
        let spec = spec.clone().normalized();
        if spec.container_name.is_empty() {
            return Err(ContainerError::Validation(
                "Container name is required".to_string(),
            ));
        }
        if spec.tag.is_empty() {
            return Err(ContainerError::Validation("Image tag is required".to_string()));
        }

        Ok(Self {
            image: spec.category().image_reference(registry_prefix, &spec.tag),
            ports: spec.port_mappings()?,
            volumes: spec.volume_mappings()?,
            env_vars: spec.env_assignments()?,
            spec,
        })
    }
}

/// Launch, rebuild and inspect managed instances.
pub struct LifecycleOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    store: InstanceStore,
    config: LifecycleConfig,
}

impl LifecycleOrchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: InstanceStore,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            runtime,
            store,
            config,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Launch an instance, returning its container ID.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Validation`] for malformed ports, volumes or environment
    /// - [`ContainerError::ImageUnavailable`] if the image is missing and cannot be pulled
    /// - [`ContainerError::Provisioning`] if in-container setup fails after start
    pub async fn launch(&self, spec: &LaunchSpec) -> Result<String> {
        let plan = LaunchPlan::parse(spec, &self.config.registry_prefix)?;
        self.launch_plan(plan).await
    }

    async fn launch_plan(&self, plan: LaunchPlan) -> Result<String> {
        let LaunchPlan {
            spec,
            image,
            ports,
            volumes,
            env_vars,
        } = plan;
        info!("Launching {} from {}", spec.container_name, image);

        self.ensure_image(&image).await?;
        self.runtime.ensure_network(&self.config.network).await?;

        let shared_dir = self.create_shared_dir(&spec.container_name).await?;
        let translator = self.config.translator;

        let mut builder = ContainerConfig::builder()
            .image(&image)
            .hostname(&spec.hostname)
            .cmd(spec.command_args())
            .network_mode(&self.config.network)
            .tty(true)
            .bind(
                translator.translate(&shared_dir.to_string_lossy()),
                format!("{}/", self.config.shared_path.trim_end_matches('/')),
            );

        for volume in &volumes {
            builder = builder.bind(translator.translate(&volume.host_path), &volume.container_path);
        }
        for port in &ports {
            builder = builder.port_binding(port.container.to_string(), port.host);
        }
        builder = builder.envs(env_vars.into_iter().map(|e| (e.key, e.value)));

        let container_config = builder.build()?;
        let id = self
            .runtime
            .create_and_start(&spec.container_name, &container_config)
            .await?;

        self.provision(&id).await?;
        self.store.save(&spec).await?;

        info!(
            "Launched {} ({})",
            spec.container_name,
            id.get(..12).unwrap_or(&id)
        );
        Ok(id)
    }

    /// [`Self::launch`] folded into a [`LaunchOutcome`].
    pub async fn launch_outcome(&self, spec: &LaunchSpec) -> LaunchOutcome {
        let result = self.launch(spec).await;
        if let Err(e) = &result {
            error!("Launch of {} failed: {}", spec.container_name, e);
        }
        result.into()
    }

    /// Launch from an uploaded record after checking its host paths exist.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] if a volume host path is missing
    /// or has the wrong type, otherwise as [`Self::launch`].
    pub async fn import_config(&self, record: &InstanceRecord) -> Result<String> {
        let spec = record.spec.clone().normalized();
        validate_volume_paths(&spec.volumes)?;
        self.launch(&spec).await
    }

    /// Replace container `id` with one launched from `spec`, or from its saved
    /// record when `spec` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the container or the saved
    /// record is missing and [`ContainerError::Validation`] for a malformed
    /// spec; the old container is untouched in both cases.
    pub async fn rebuild(&self, id: &str, spec: Option<LaunchSpec>) -> Result<String> {
        let existing = self.runtime.inspect_container(id).await?;
        let spec = match spec {
            Some(spec) => spec,
            None => self.store.load(&existing.name).await?.spec,
        };
        let plan = LaunchPlan::parse(&spec, &self.config.registry_prefix)?;
        let renamed = plan.spec.container_name != existing.name;

        info!("Rebuilding {} ({})", existing.name, existing.short_id());
        if let Err(e) = self.runtime.stop_container(&existing.id).await {
            warn!("Failed to stop {} before rebuild: {}", existing.name, e);
        }
        self.runtime.remove_container(&existing.id, true).await?;

        let id = self.launch_plan(plan).await?;
        if renamed {
            self.remove_instance_files(&existing.name).await?;
        }
        Ok(id)
    }

    /// Saved record of container `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the container or record is missing.
    pub async fn rebuild_form(&self, id: &str) -> Result<InstanceRecord> {
        let existing = self.runtime.inspect_container(id).await?;
        self.store.load(&existing.name).await
    }

    pub async fn start(&self, id: &str) -> Result<()> {
        self.runtime.start_container(id).await
    }

    pub async fn stop(&self, id: &str) -> Result<()> {
        self.runtime.stop_container(id).await
    }

    /// Force-remove container `id` together with its shared-data and logs
    /// directories and its saved record.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the container does not exist.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let existing = self.runtime.inspect_container(id).await?;
        self.runtime.remove_container(&existing.id, true).await?;

        self.remove_instance_files(&existing.name).await?;
        info!("Deleted {}", existing.name);
        Ok(())
    }

    /// Shared-data and logs directories plus the saved record of `name`.
    async fn remove_instance_files(&self, name: &str) -> Result<()> {
        for dir in [
            env::shared_dir_path(&self.config.data_root, name),
            env::logs_dir_path(&self.config.data_root, name),
        ] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.store.delete(name).await?;
        Ok(())
    }

    /// Containers created from managed images, compose members excluded.
    pub async fn list_managed(&self) -> Result<Vec<ContainerInfo>> {
        let prefix = format!("{}/", self.config.registry_prefix.trim_end_matches('/'));
        Ok(self
            .runtime
            .list_containers(true, None)
            .await?
            .into_iter()
            .filter(|c| c.image.contains(&prefix))
            .filter(|c| !c.labels.contains_key(COMPOSE_PROJECT_LABEL))
            .collect())
    }

    /// Every container, running or stopped.
    pub async fn list_all(&self) -> Result<Vec<ContainerInfo>> {
        self.runtime.list_containers(true, None).await
    }

    /// Copy `source` to `target` inside container `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] for empty paths or a missing
    /// source, [`ContainerError::Execution`] if the copy fails.
    pub async fn copy_within(&self, id: &str, source: &str, target: &str) -> Result<String> {
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            return Err(ContainerError::Validation(
                "Both source and target paths are required.".to_string(),
            ));
        }

        let quoted_source = shell_escape::unix::escape(Cow::Borrowed(source));
        let quoted_target = shell_escape::unix::escape(Cow::Borrowed(target));

        let probe = self
            .runtime
            .exec(
                id,
                &ExecConfig::shell(format!(
                    "test -e {} && echo exists || echo missing",
                    quoted_source
                )),
            )
            .await?;
        if !probe.success() || probe.stdout.trim() != "exists" {
            return Err(ContainerError::Validation(format!(
                "Source path '{}' does not exist in the container.",
                source
            )));
        }

        let copy = self
            .runtime
            .exec(
                id,
                &ExecConfig::shell(format!("cp -r {} {}", quoted_source, quoted_target)),
            )
            .await?;
        if !copy.success() {
            return Err(ContainerError::Execution(format!(
                "Copy command failed: {}",
                copy.combined().trim()
            )));
        }

        info!("Copied {} to {} in {}", source, target, id);
        Ok(format!("Copied from '{}' to '{}' successfully.", source, target))
    }

    /// Cleaned logs, the configured tail unless `full`.
    pub async fn logs(&self, id: &str, full: bool) -> Result<String> {
        let tail = if full { None } else { Some(self.config.log_tail) };
        logs::fetch(self.runtime.as_ref(), id, tail).await
    }

    /// Full cleaned log with its download file name.
    pub async fn download_logs(&self, id: &str) -> Result<LogDownload> {
        logs::download(self.runtime.as_ref(), id).await
    }

    /// Launch form defaults for `group` and `tag`.
    pub async fn launch_defaults(&self, group: &str, tag: &str) -> LaunchDefaults {
        LaunchDefaults::discover(&self.config.data_root, group, tag).await
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.runtime.image_exists(image).await? {
            debug!("Image {} found locally", image);
            return Ok(());
        }

        info!("Image {} not found locally. Pulling from registry...", image);
        self.runtime
            .pull_image(image)
            .await
            .map_err(|e| ContainerError::ImageUnavailable {
                image: image.to_string(),
                reason: e.to_string(),
            })
    }

    async fn create_shared_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = env::shared_dir_path(&self.config.data_root, name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(std::path::absolute(&dir)?)
    }

    async fn provision(&self, id: &str) -> Result<()> {
        let output = self
            .runtime
            .exec(id, &ExecConfig::make_dir(&self.config.shared_path))
            .await?;
        if !output.success() {
            return Err(ContainerError::Provisioning(format!(
                "Failed to create folder {}: {}",
                self.config.shared_path,
                output.combined().trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testing::FakeRuntime;
    use tempfile::TempDir;

    const PLATFORM_IMAGE: &str = "gcr.io/denodo-container/denodo-platform:9.1.0";

    fn spec(name: &str) -> LaunchSpec {
        LaunchSpec {
            tag: "9.1.0".into(),
            group: "denodo_platform".into(),
            container_name: name.into(),
            hostname: format!("{}-host", name),
            volumes: vec![],
            ports: vec!["9999:9999".into(), "9090:9091".into()],
            env_vars: vec!["DENODO_USER=admin".into()],
            command: "--vdpserver --designstudio".into(),
        }
    }

    fn setup(runtime: FakeRuntime) -> (TempDir, Arc<FakeRuntime>, LifecycleOrchestrator) {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(runtime);
        let store = InstanceStore::new(env::config_records_dir_path(dir.path()));
        let config = LifecycleConfig {
            data_root: dir.path().to_path_buf(),
            translator: PathTranslator::passthrough(),
            ..Default::default()
        };
        let orchestrator = LifecycleOrchestrator::new(runtime.clone(), store, config);
        (dir, runtime, orchestrator)
    }

    #[tokio::test]
    async fn test_launch_creates_container_and_record() {
        let (dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));

        let id = orchestrator.launch(&spec("vdp1")).await.unwrap();

        let containers = runtime.containers_named("vdp1");
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, id);
        assert_eq!(containers[0].image, PLATFORM_IMAGE);
        assert!(!runtime.called("pull_image"));
        assert_eq!(runtime.networks(), vec!["denodo-net"]);

        let config = runtime.config_of("vdp1").unwrap();
        assert!(config.tty && config.open_stdin);
        assert_eq!(config.hostname.as_deref(), Some("vdp1-host"));
        assert_eq!(config.env_value("DENODO_USER"), Some("admin"));
        assert_eq!(config.host_config.network_mode.as_deref(), Some("denodo-net"));
        assert_eq!(config.exposed_ports(), vec!["9091/tcp", "9999/tcp"]);
        let bindings = config.host_config.port_bindings.clone().unwrap();
        let host_port = bindings["9091/tcp"].as_ref().unwrap()[0].host_port.clone();
        assert_eq!(host_port.as_deref(), Some("9090"));

        let shared = std::path::absolute(env::shared_dir_path(dir.path(), "vdp1")).unwrap();
        assert!(shared.is_dir());
        let binds = config.host_config.binds.unwrap();
        assert_eq!(binds, vec![format!("{}:/opt/denodo/shared/:rw", shared.display())]);

        assert_eq!(
            runtime.exec_commands(),
            vec![vec!["mkdir", "-p", "/opt/denodo/shared"]]
        );

        let record = orchestrator.store().load("vdp1").await.unwrap();
        assert_eq!(record.spec, spec("vdp1"));
    }

    #[tokio::test]
    async fn test_launch_pulls_missing_image() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        orchestrator.launch(&spec("vdp1")).await.unwrap();
        assert!(runtime.called("pull_image"));
        assert!(runtime.has_image(PLATFORM_IMAGE));
    }

    #[tokio::test]
    async fn test_pull_failure_creates_no_container() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        runtime.fail_pull(PLATFORM_IMAGE);

        let err = orchestrator.launch(&spec("vdp1")).await.unwrap_err();
        assert!(matches!(err, ContainerError::ImageUnavailable { .. }));
        assert!(runtime.containers_named("vdp1").is_empty());
        assert!(!runtime.called("create_and_start"));
        assert!(orchestrator.store().load("vdp1").await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_port_fails_before_runtime_calls() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));

        let mut bad = spec("vdp1");
        bad.ports = vec!["9999:9999".into(), "badformat".into()];
        let err = orchestrator.launch(&bad).await.unwrap_err();

        assert!(matches!(err, ContainerError::Validation(_)));
        assert!(runtime.containers().is_empty());
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_env_and_volume_fail_fast() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));

        let mut bad_env = spec("vdp1");
        bad_env.env_vars = vec!["NOEQUALS".into()];
        assert!(matches!(
            orchestrator.launch(&bad_env).await.unwrap_err(),
            ContainerError::Validation(_)
        ));

        let mut bad_volume = spec("vdp1");
        bad_volume.volumes = vec!["/only-host-path".into()];
        assert!(matches!(
            orchestrator.launch(&bad_volume).await.unwrap_err(),
            ContainerError::Validation(_)
        ));

        assert!(runtime.containers().is_empty());
    }

    #[tokio::test]
    async fn test_provisioning_failure_keeps_container_running() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));
        runtime.push_exec_result(1, "mkdir: cannot create directory");

        let err = orchestrator.launch(&spec("vdp1")).await.unwrap_err();
        assert!(matches!(err, ContainerError::Provisioning(_)));
        assert_eq!(err.kind(), ErrorKind::Provisioning);

        let containers = runtime.containers_named("vdp1");
        assert_eq!(containers.len(), 1);
        assert!(containers[0].is_running());
        assert!(orchestrator.store().load("vdp1").await.is_err());
    }

    #[tokio::test]
    async fn test_volumes_are_translated_on_drive_letter_hosts() {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new().with_image(PLATFORM_IMAGE));
        let orchestrator = LifecycleOrchestrator::new(
            runtime.clone(),
            InstanceStore::new(dir.path().join("records")),
            LifecycleConfig {
                data_root: dir.path().to_path_buf(),
                translator: PathTranslator::drive_letter(),
                ..Default::default()
            },
        );

        let mut with_volume = spec("vdp1");
        with_volume.volumes = vec![r"C:\data\drivers:/opt/denodo/lib/extensions".into()];
        orchestrator.launch(&with_volume).await.unwrap();

        let binds = runtime.config_of("vdp1").unwrap().host_config.binds.unwrap();
        assert!(binds.contains(&"/mnt/c/data/drivers:/opt/denodo/lib/extensions:rw".to_string()));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_environment() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));

        let mut original = spec("db1");
        original.env_vars = vec!["MODE=old".into()];
        let old_id = orchestrator.launch(&original).await.unwrap();

        let mut updated = original.clone();
        updated.env_vars = vec!["MODE=new".into(), "EXTRA=1".into()];
        let new_id = orchestrator.rebuild(&old_id, Some(updated.clone())).await.unwrap();
        assert_ne!(old_id, new_id);

        let containers = runtime.containers_named("db1");
        assert_eq!(containers.len(), 1);
        assert!(containers[0].is_running());
        assert!(containers[0].env.contains(&"MODE=new".to_string()));
        assert!(!containers[0].env.contains(&"MODE=old".to_string()));

        let record = orchestrator.store().load("db1").await.unwrap();
        assert_eq!(record.spec.env_vars, updated.env_vars);
    }

    #[tokio::test]
    async fn test_rebuild_with_malformed_spec_keeps_container() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));
        let id = orchestrator.launch(&spec("db1")).await.unwrap();
        let calls_before = runtime.calls().len();

        let mut updated = spec("db1");
        updated.ports = vec!["badformat".into()];
        let err = orchestrator.rebuild(&id, Some(updated)).await.unwrap_err();
        assert!(matches!(err, ContainerError::Validation(_)));

        assert_eq!(runtime.calls().len(), calls_before + 1);
        let containers = runtime.containers_named("db1");
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, id);
        assert!(containers[0].is_running());
    }

    #[tokio::test]
    async fn test_rebuild_under_new_name_drops_old_files() {
        let (dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));
        let id = orchestrator.launch(&spec("db1")).await.unwrap();
        assert!(env::shared_dir_path(dir.path(), "db1").exists());

        orchestrator.rebuild(&id, Some(spec("db2"))).await.unwrap();

        assert!(runtime.containers_named("db1").is_empty());
        assert_eq!(runtime.containers_named("db2").len(), 1);
        assert!(orchestrator.store().load("db1").await.is_err());
        assert!(orchestrator.store().load("db2").await.is_ok());
        assert!(!env::shared_dir_path(dir.path(), "db1").exists());
        assert!(env::shared_dir_path(dir.path(), "db2").exists());
    }

    #[tokio::test]
    async fn test_rebuild_from_saved_record() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));
        let old_id = orchestrator.launch(&spec("vdp1")).await.unwrap();

        orchestrator.rebuild(&old_id, None).await.unwrap();
        let containers = runtime.containers_named("vdp1");
        assert_eq!(containers.len(), 1);
        assert_ne!(containers[0].id, old_id);
    }

    #[tokio::test]
    async fn test_rebuild_without_record_leaves_container() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        let id = runtime.add_container("manual", PLATFORM_IMAGE, "running", &[]);

        let err = orchestrator.rebuild(&id, None).await.unwrap_err();
        assert!(matches!(err, ContainerError::NotFound(_)));
        assert_eq!(runtime.containers_named("manual").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_container_dirs_and_record() {
        let (dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));
        let id = orchestrator.launch(&spec("vdp1")).await.unwrap();
        let logs_dir = env::logs_dir_path(dir.path(), "vdp1");
        std::fs::create_dir_all(&logs_dir).unwrap();

        orchestrator.delete(&id).await.unwrap();

        assert!(runtime.containers_named("vdp1").is_empty());
        assert!(!env::shared_dir_path(dir.path(), "vdp1").exists());
        assert!(!logs_dir.exists());
        assert!(matches!(
            orchestrator.rebuild_form(&id).await.unwrap_err(),
            ContainerError::NotFound(_)
        ));
        assert!(orchestrator.store().load("vdp1").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_container_is_not_found() {
        let (_dir, _runtime, orchestrator) = setup(FakeRuntime::new());
        let err = orchestrator.delete("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_import_config_validates_host_paths() {
        let (dir, runtime, orchestrator) = setup(FakeRuntime::new().with_image(PLATFORM_IMAGE));

        let mut missing = spec("vdp1");
        missing.volumes = vec![format!("{}:/opt/data", dir.path().join("absent").display())];
        let err = orchestrator
            .import_config(&InstanceRecord::new(missing))
            .await
            .unwrap_err();
        assert!(matches!(err, ContainerError::Validation(_)));
        assert!(runtime.calls().is_empty());

        let mut present = spec("vdp1");
        present.volumes = vec![format!("{}:/opt/data", dir.path().display())];
        orchestrator
            .import_config(&InstanceRecord::new(present))
            .await
            .unwrap();
        assert_eq!(runtime.containers_named("vdp1").len(), 1);
    }

    #[tokio::test]
    async fn test_list_managed_skips_foreign_and_compose_containers() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        runtime.add_container("vdp1", PLATFORM_IMAGE, "running", &[]);
        runtime.add_container(
            "sm1",
            "gcr.io/denodo-container/solution-manager:9.1.0",
            "exited",
            &[],
        );
        runtime.add_container("nginx", "nginx:latest", "running", &[]);
        runtime.add_container(
            "grp1-vdp-1",
            PLATFORM_IMAGE,
            "running",
            &[(COMPOSE_PROJECT_LABEL, "grp1")],
        );

        let names: Vec<String> = orchestrator
            .list_managed()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["vdp1", "sm1"]);
        assert_eq!(orchestrator.list_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_copy_within_quotes_paths() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        let id = runtime.add_container("vdp1", PLATFORM_IMAGE, "running", &[]);
        runtime.push_exec_result(0, "exists\n");
        runtime.push_exec_result(0, "");

        let message = orchestrator
            .copy_within(&id, " /opt/my dir/a.txt ", "/tmp/b.txt")
            .await
            .unwrap();
        assert_eq!(message, "Copied from '/opt/my dir/a.txt' to '/tmp/b.txt' successfully.");

        let commands = runtime.exec_commands();
        assert_eq!(
            commands[0][2],
            "test -e '/opt/my dir/a.txt' && echo exists || echo missing"
        );
        assert_eq!(commands[1][2], "cp -r '/opt/my dir/a.txt' /tmp/b.txt");
    }

    #[tokio::test]
    async fn test_copy_within_missing_source() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        let id = runtime.add_container("vdp1", PLATFORM_IMAGE, "running", &[]);
        runtime.push_exec_result(0, "missing\n");

        let err = orchestrator.copy_within(&id, "/nope", "/tmp").await.unwrap_err();
        assert!(matches!(err, ContainerError::Validation(_)));
        assert_eq!(runtime.exec_commands().len(), 1);

        let empty = orchestrator.copy_within(&id, "  ", "/tmp").await.unwrap_err();
        assert!(matches!(empty, ContainerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_launch_outcome() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        runtime.fail_pull(PLATFORM_IMAGE);

        let outcome = orchestrator.launch_outcome(&spec("vdp1")).await;
        assert!(!outcome.is_launched());
        assert!(outcome.id().is_none());
        match outcome {
            LaunchOutcome::Failed { kind, message } => {
                assert_eq!(kind, ErrorKind::ImageUnavailable);
                assert!(message.contains(PLATFORM_IMAGE));
            }
            LaunchOutcome::Launched { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_logs_use_configured_tail() {
        let (_dir, runtime, orchestrator) = setup(FakeRuntime::new());
        let id = runtime.add_container("vdp1", PLATFORM_IMAGE, "running", &[]);
        runtime.set_logs("\x1b[32mready\x1b[0m\n");
        assert_eq!(orchestrator.logs(&id, false).await.unwrap(), "ready\n");
    }

    #[test]
    fn test_launch_defaults_per_category() {
        let manager = LaunchDefaults::for_group("solution_manager", "9.1.0");
        assert_eq!(manager.ports, vec!["10091:10091", "10090:10090", "19090:19090"]);
        assert_eq!(manager.command, "--smserver --smadmin --lmserver");

        let platform = LaunchDefaults::for_group("denodo_platform", "8.0");
        assert_eq!(platform.ports.len(), 5);
        assert!(platform.command.starts_with("--vdpserver"));
    }

    #[test]
    fn test_platform_version() {
        assert_eq!(platform_version("9.1.0"), "denodo9");
        assert_eq!(platform_version("8.0-20240101"), "denodo8");
        assert_eq!(platform_version("7"), "denodo7");
        assert_eq!(platform_version("latest"), "unknown");
    }

    #[tokio::test]
    async fn test_licence_discovery() {
        let dir = TempDir::new().unwrap();
        let licence_dir = env::license_dir_path(dir.path(), "denodo9");
        std::fs::create_dir_all(&licence_dir).unwrap();
        std::fs::write(licence_dir.join("denodo_SA_9.lic"), "sa").unwrap();
        std::fs::write(licence_dir.join("denodo_SOL_9.lic"), "sol").unwrap();
        std::fs::write(licence_dir.join("notes.txt"), "x").unwrap();

        let platform = LaunchDefaults::discover(dir.path(), "denodo_platform", "9.1.0").await;
        assert_eq!(platform.volumes.len(), 1);
        assert!(platform.volumes[0].contains("denodo_SA_9.lic:/opt/denodo/conf/denodo.lic"));

        let manager = LaunchDefaults::discover(dir.path(), "solution_manager", "9.1.0").await;
        assert!(manager.volumes[0].contains("denodo_SOL_9.lic"));

        let none = LaunchDefaults::discover(dir.path(), "denodo_platform", "8.0").await;
        assert!(none.volumes.is_empty());
    }
}
