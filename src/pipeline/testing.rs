//! In-memory collaborators for tests

use crate::build::{BuildRequest, Builder};
use crate::config::{
    ConfigLoader, DependencyDeclaration, FileConfigLoader, LoadOptions, ProjectConfig,
};
use crate::dependency::SourceFetcher;
use crate::cache::KubeTarget;
use crate::deploy::{DeployRequest, Deployer, DeploymentStatus, Rendered};
use crate::error::{SkiffError, SkiffResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Builder that records requests instead of running docker
#[derive(Default)]
pub struct FakeBuilder {
    delay_ms: u64,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<BuildRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every build sleeps for `delay_ms` so parallelism is observable
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    pub fn fail_image(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// `project/image` of every attempted build, failures included
    pub fn built(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{}/{}", r.project, r.name))
            .collect()
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Builder for FakeBuilder {
    async fn build(&self, request: &BuildRequest) -> SkiffResult<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&request.name) {
            return Err(request.error("simulated build failure".to_string()));
        }
        Ok(())
    }
}

/// Deployer keeping one fake cluster per kube target in memory
#[derive(Default)]
pub struct FakeDeployer {
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<DeployRequest>>,
    succeeded: Mutex<Vec<String>>,
    live: Mutex<HashMap<String, Rendered>>,
}

fn live_key(target: &KubeTarget, project: &str, name: &str) -> String {
    format!("{}|{}/{}", target, project, name)
}

impl FakeDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deployment(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn heal_deployment(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }

    /// Remove a deployment from every fake cluster
    pub fn uninstall(&self, name: &str) {
        let suffix = format!("/{}", name);
        self.live.lock().unwrap().retain(|key, _| !key.ends_with(&suffix));
    }

    /// What the cluster behind `target` currently runs for a deployment
    pub fn live_in(&self, target: &KubeTarget, project: &str, name: &str) -> Option<Rendered> {
        self.live
            .lock()
            .unwrap()
            .get(&live_key(target, project, name))
            .cloned()
    }

    /// `project/deployment` of every successful rollout
    pub fn deployed(&self) -> Vec<String> {
        self.succeeded.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<DeployRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn status(&self, request: &DeployRequest) -> SkiffResult<DeploymentStatus> {
        let key = live_key(&request.target, &request.project, request.name());
        if self.live.lock().unwrap().contains_key(&key) {
            Ok(DeploymentStatus::Deployed)
        } else {
            Ok(DeploymentStatus::NotDeployed)
        }
    }

    async fn deploy(&self, request: &DeployRequest) -> SkiffResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.lock().unwrap().contains(request.name()) {
            return Err(request.error("simulated deploy failure".to_string()));
        }
        self.live.lock().unwrap().insert(
            live_key(&request.target, &request.project, request.name()),
            request.rendered.clone(),
        );
        self.succeeded
            .lock()
            .unwrap()
            .push(format!("{}/{}", request.project, request.name()));
        Ok(())
    }
}

/// File loader that remembers which roots it loaded
#[derive(Default)]
pub struct RecordingLoader {
    loads: Mutex<Vec<PathBuf>>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> Vec<PathBuf> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigLoader for RecordingLoader {
    async fn load(&self, root: &Path, options: &LoadOptions) -> SkiffResult<ProjectConfig> {
        self.loads.lock().unwrap().push(root.to_path_buf());
        FileConfigLoader.load(root, options).await
    }
}

/// Fetcher resolving declarations by name from a fixed table
#[derive(Default)]
pub struct MapFetcher {
    roots: HashMap<String, PathBuf>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(name.to_string(), root.into());
        self
    }
}

#[async_trait]
impl SourceFetcher for MapFetcher {
    async fn locate(
        &self,
        _base_dir: &Path,
        declaration: &DependencyDeclaration,
    ) -> SkiffResult<PathBuf> {
        self.roots
            .get(&declaration.name)
            .cloned()
            .ok_or_else(|| SkiffError::DependencyNotFound {
                name: declaration.name.clone(),
                path: PathBuf::from(&declaration.name),
            })
    }
}
