//! Live membership of the broker and replay tiers.
//!
//! A [`MembershipTracker`] per role periodically lists instances from an
//! [`InstanceSource`], keeps the running ones that have an address, and swaps
//! the result in as a new immutable snapshot. Readers clone the current
//! snapshot, so they see either the previous list or the new one in full.
//! A failed listing keeps the last list that was read successfully.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use prometheus_client::metrics::gauge::Gauge;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

const RUNNING: &str = "Running";

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// One instance as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    /// `host:port` to reach the instance at; may be empty while it starts.
    pub address: String,
    pub phase: String,
}

impl Instance {
    /// A running instance reachable at `address`.
    pub fn running(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phase: RUNNING.to_string(),
        }
    }

    /// Returns true if requests can be routed to this instance.
    pub fn is_routable(&self) -> bool {
        self.phase == RUNNING && !self.address.is_empty()
    }
}

/// Lists the instances of one role.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn list(&self) -> Result<Vec<Instance>>;
}

/// Fixed list of instances.
pub struct StaticInstanceSource {
    instances: Vec<Instance>,
}

impl StaticInstanceSource {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let instances = addresses
            .into_iter()
            .enumerate()
            .map(|(i, address)| Instance::running(format!("static-{}", i), address))
            .collect();
        Self { instances }
    }
}

#[async_trait]
impl InstanceSource for StaticInstanceSource {
    async fn list(&self) -> Result<Vec<Instance>> {
        Ok(self.instances.clone())
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PodMetadata {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    phase: String,
    #[serde(default, rename = "podIP")]
    pod_ip: String,
}

/// Pods matching a label selector, listed through the Kubernetes API.
pub struct KubernetesInstanceSource {
    client: reqwest::Client,
    api_url: String,
    token_path: Option<PathBuf>,
    namespace: String,
    selector: String,
    port: u16,
}

impl KubernetesInstanceSource {
    /// Source for a balancer running inside the cluster.
    ///
    /// Uses the API server address from `KUBERNETES_SERVICE_HOST`/`_PORT` and
    /// the pod's service-account token and CA bundle.
    pub fn in_cluster(
        namespace: Option<String>,
        selector: impl Into<String>,
        port: u16,
        timeout: Duration,
    ) -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| Error::Source("KUBERNETES_SERVICE_HOST is not set".to_string()))?;
        let api_port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());

        let dir = PathBuf::from(SERVICE_ACCOUNT_DIR);
        let ca = std::fs::read(dir.join("ca.crt"))
            .map_err(|e| Error::Source(format!("failed to read cluster CA: {}", e)))?;
        let ca = reqwest::Certificate::from_pem(&ca)
            .map_err(|e| Error::Source(format!("invalid cluster CA: {}", e)))?;
        let client = reqwest::Client::builder()
            .add_root_certificate(ca)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Source(e.to_string()))?;

        let namespace = namespace
            .or_else(|| std::env::var("POD_NAMESPACE").ok())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| "default".to_string());

        Ok(Self::new(
            client,
            format!("https://{}:{}", host, api_port),
            Some(dir.join("token")),
            namespace,
            selector,
            port,
        ))
    }

    /// Source talking to an explicit API server, with an optional bearer
    /// token file.
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token_path: Option<PathBuf>,
        namespace: impl Into<String>,
        selector: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            token_path,
            namespace: namespace.into(),
            selector: selector.into(),
            port,
        }
    }

    fn address(&self, pod_ip: &str) -> String {
        if pod_ip.is_empty() {
            String::new()
        } else if pod_ip.contains(':') {
            format!("[{}]:{}", pod_ip, self.port)
        } else {
            format!("{}:{}", pod_ip, self.port)
        }
    }
}

#[async_trait]
impl InstanceSource for KubernetesInstanceSource {
    async fn list(&self) -> Result<Vec<Instance>> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods",
            self.api_url.trim_end_matches('/'),
            self.namespace
        );
        let mut request = self
            .client
            .get(url)
            .query(&[("labelSelector", self.selector.as_str())]);
        // the projected token is rotated, so it is read on every listing
        if let Some(path) = &self.token_path {
            let token = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::Listing(format!("failed to read token: {}", e)))?;
            request = request.bearer_auth(token.trim());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(Error::Listing(format!("{}: {}", status, reason)));
        }
        let pods: PodList = response.json().await?;

        Ok(pods
            .items
            .into_iter()
            .map(|pod| Instance {
                address: self.address(&pod.status.pod_ip),
                name: pod.metadata.name,
                phase: pod.status.phase,
            })
            .collect())
    }
}

/// Current routable addresses of one role.
pub struct MembershipTracker {
    role: String,
    source: Arc<dyn InstanceSource>,
    interval: Duration,
    snapshot: RwLock<Arc<Vec<String>>>,
    live_instances: Gauge,
}

impl MembershipTracker {
    pub fn new(role: impl Into<String>, source: Arc<dyn InstanceSource>, interval: Duration) -> Self {
        Self {
            role: role.into(),
            source,
            interval,
            snapshot: RwLock::new(Arc::new(Vec::new())),
            live_instances: Gauge::default(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Gauge tracking the size of the current snapshot.
    pub fn live_instances(&self) -> Gauge {
        self.live_instances.clone()
    }

    /// Copy of the current address list, in source order.
    pub fn snapshot(&self) -> Vec<String> {
        let current = match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Vec::clone(&current)
    }

    /// Lists the source once and replaces the snapshot.
    ///
    /// Returns the number of routable instances. On failure the previous
    /// snapshot stays in place.
    pub async fn refresh_once(&self) -> Result<usize> {
        let addresses: Vec<String> = self
            .source
            .list()
            .await?
            .into_iter()
            .filter(Instance::is_routable)
            .map(|instance| instance.address)
            .collect();
        let count = addresses.len();

        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if **guard != addresses {
            tracing::info!(role = %self.role, "membership changed: {:?}", addresses);
        }
        *guard = Arc::new(addresses);
        drop(guard);

        self.live_instances.set(count as i64);
        Ok(count)
    }

    /// Refreshes immediately and then every interval until `cancel` fires.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now(), tracker.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = tracker.refresh_once().await {
                            tracing::warn!(
                                role = %tracker.role,
                                "failed to refresh membership, keeping last list: {}",
                                e
                            );
                        }
                    }
                }
            }
        })
    }
}
