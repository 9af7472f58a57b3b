use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use appshell_client::{AgentState, CachingAgent, Decision, HostRuntime, Network};
use appshell_core::{
    AppConfig, CacheDb, CacheStore, Error, Generation, InstallPolicy, Method, RequestKey, RequestMode, ResourceRequest,
    ResponseKind, ResponseSnapshot,
};
use url::Url;

type Events = Arc<Mutex<Vec<String>>>;

/// Scripted network keyed by absolute URL; unknown URLs fail to connect.
#[derive(Default)]
struct FakeNetwork {
    replies: Mutex<HashMap<String, Option<ResponseSnapshot>>>,
    rejected: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    fn ok(self, url: &str, body: &'static str) -> Self {
        self.reply(url, Some(ResponseSnapshot::new(url, 200, body)))
    }

    fn status(self, url: &str, status: u16) -> Self {
        self.reply(url, Some(ResponseSnapshot::new(url, status, "")))
    }

    fn opaque(self, url: &str) -> Self {
        self.reply(url, Some(ResponseSnapshot::opaque(url)))
    }

    fn fail(self, url: &str) -> Self {
        self.reply(url, None)
    }

    /// Fail with a request error rather than a connectivity one.
    fn reject(self, url: &str) -> Self {
        self.rejected.lock().unwrap().insert(Url::parse(url).unwrap().to_string());
        self
    }

    fn reply(self, url: &str, reply: Option<ResponseSnapshot>) -> Self {
        let url = Url::parse(url).unwrap().to_string();
        self.replies.lock().unwrap().insert(url, reply);
        self
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.ends_with(url)).count()
    }

    fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(format!("{} {}", request.method, url));
        if self.rejected.lock().unwrap().contains(&url) {
            return Err(Error::InvalidInput(format!("request rejected: {url}")));
        }
        match self.replies.lock().unwrap().get(&url) {
            Some(Some(response)) => Ok(response.clone()),
            _ => Err(Error::Network(format!("connection refused: {url}"))),
        }
    }
}

/// CacheDb wrapper that counts every call the agent makes.
struct SpyStore {
    inner: CacheDb,
    events: Events,
    matches: AtomicUsize,
    puts: AtomicUsize,
    /// Generation whose deletion fails.
    undeletable: Mutex<Option<String>>,
}

impl SpyStore {
    async fn new(events: Events) -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            events,
            matches: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            undeletable: Mutex::new(None),
        }
    }

    fn fail_delete_of(&self, name: &str) {
        *self.undeletable.lock().unwrap() = Some(name.to_string());
    }

    fn matches(&self) -> usize {
        self.matches.load(Ordering::SeqCst)
    }

    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CacheStore for SpyStore {
    async fn open(&self, name: &str) -> Result<Generation, Error> {
        CacheStore::open(&self.inner, name).await
    }

    async fn match_entry(&self, generation: &Generation, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.matches.fetch_add(1, Ordering::SeqCst);
        CacheStore::match_entry(&self.inner, generation, key).await
    }

    async fn put(&self, generation: &Generation, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(generation, key, snapshot).await
    }

    async fn put_all(&self, generation: &Generation, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_all(generation, entries).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.events.lock().unwrap().push(format!("delete {name}"));
        if self.undeletable.lock().unwrap().as_deref() == Some(name) {
            return Err(Error::CorruptEntry(format!("cannot delete {name}")));
        }
        self.inner.delete(name).await
    }

    async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.inner.list_generations().await
    }

    async fn count_entries(&self, generation: &Generation) -> Result<u64, Error> {
        CacheStore::count_entries(&self.inner, generation).await
    }
}

struct RecordingHost {
    events: Events,
    skip_waits: AtomicUsize,
    claims: AtomicUsize,
    refuse_skip_waiting: AtomicBool,
    fail_claim: AtomicBool,
}

impl RecordingHost {
    fn new(events: Events) -> Self {
        Self {
            events,
            skip_waits: AtomicUsize::new(0),
            claims: AtomicUsize::new(0),
            refuse_skip_waiting: AtomicBool::new(false),
            fail_claim: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl HostRuntime for RecordingHost {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waits.fetch_add(1, Ordering::SeqCst);
        if self.refuse_skip_waiting.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("skip-waiting not allowed".into()));
        }
        Ok(())
    }

    async fn claim_clients(&self) -> Result<usize, Error> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("claim".to_string());
        if self.fail_claim.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("clients unavailable".into()));
        }
        Ok(2)
    }
}

type TestAgent = CachingAgent<SpyStore, FakeNetwork, RecordingHost>;

struct Harness {
    agent: TestAgent,
    store: Arc<SpyStore>,
    network: Arc<FakeNetwork>,
    host: Arc<RecordingHost>,
    events: Events,
}

const BASE: &str = "https://app.test/";
const INDEX: &str = "https://app.test/index.html";
const ICON: &str = "https://app.test/icon.png";
const CDN_LIB: &str = "https://cdn.test/cdn-lib.js";

fn config() -> AppConfig {
    AppConfig {
        version: "v45".into(),
        base_url: BASE.into(),
        critical_assets: vec!["index.html".into(), "icon.png".into()],
        supplementary_assets: vec![CDN_LIB.into()],
        bypass_domains: vec!["api.hacienda.go.cr".into(), "vpic.nhtsa.dot.gov".into(), "googleapis.com".into()],
        ..Default::default()
    }
}

fn shell_network() -> FakeNetwork {
    FakeNetwork::default()
        .ok(INDEX, "<html>shell</html>")
        .ok(ICON, "PNG")
        .ok(CDN_LIB, "lib()")
}

async fn harness(config: AppConfig, network: FakeNetwork) -> Harness {
    let events: Events = Arc::default();
    let store = Arc::new(SpyStore::new(events.clone()).await);
    let network = Arc::new(network);
    let host = Arc::new(RecordingHost::new(events.clone()));
    let agent = CachingAgent::new(config, store.clone(), network.clone(), host.clone()).unwrap();
    Harness { agent, store, network, host, events }
}

fn get(url: &str) -> ResourceRequest {
    ResourceRequest::get(Url::parse(url).unwrap())
}

async fn entry_count(h: &Harness) -> u64 {
    h.store.count_entries(h.agent.generation()).await.unwrap()
}

#[tokio::test]
async fn test_install_populates_generation() {
    let h = harness(config(), shell_network()).await;

    let report = h.agent.on_install().await.unwrap();

    assert_eq!(report.generation, "v45");
    assert_eq!(report.critical_cached, 2);
    assert_eq!(report.supplementary_cached, 1);
    assert!(report.skipped.is_empty());
    assert!(report.skip_waiting);
    assert_eq!(h.host.skip_waits.load(Ordering::SeqCst), 1);
    assert_eq!(h.agent.state().await, AgentState::Installed);
    assert_eq!(entry_count(&h).await, 3);
}

#[tokio::test]
async fn test_install_is_idempotent() {
    let h = harness(config(), shell_network()).await;

    h.agent.on_install().await.unwrap();
    let first = h.store.inner.list_entries(h.agent.generation()).await.unwrap();
    h.agent.on_install().await.unwrap();
    let second = h.store.inner.list_entries(h.agent.generation()).await.unwrap();

    assert_eq!(first.len(), 3);
    let urls = |entries: &[appshell_core::cache::EntrySummary]| entries.iter().map(|e| e.url.clone()).collect::<Vec<_>>();
    assert_eq!(urls(&first), urls(&second));
    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v45".to_string()]);
}

#[tokio::test]
async fn test_duplicate_manifest_entries_stored_once() {
    let mut cfg = config();
    cfg.critical_assets = vec!["index.html".into(), "./index.html".into(), "icon.png".into()];
    let h = harness(cfg, shell_network()).await;

    let report = h.agent.on_install().await.unwrap();

    assert_eq!(report.critical_cached, 2);
    assert_eq!(h.network.calls_for("/index.html"), 1);
}

#[tokio::test]
async fn test_critical_failure_aborts_install() {
    let network = FakeNetwork::default().ok(INDEX, "<html/>").fail(ICON).ok(CDN_LIB, "lib()");
    let h = harness(config(), network).await;

    let result = h.agent.on_install().await;

    assert!(matches!(result, Err(Error::PrecacheFailed { ref url, .. }) if url == ICON));
    assert_eq!(h.agent.state().await, AgentState::Redundant);
    assert_eq!(h.network.calls_for("/cdn-lib.js"), 0);
    assert!(h.store.list_generations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_critical_error_status_aborts_install() {
    let network = FakeNetwork::default().ok(INDEX, "<html/>").status(ICON, 404).ok(CDN_LIB, "lib()");
    let h = harness(config(), network).await;

    let result = h.agent.on_install().await;

    assert!(matches!(result, Err(Error::PrecacheFailed { ref reason, .. }) if reason == "status 404"));
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn test_redundant_agent_cannot_activate_or_reinstall() {
    let h = harness(config(), FakeNetwork::default()).await;
    assert!(h.agent.on_install().await.is_err());

    assert!(matches!(h.agent.on_activate().await, Err(Error::InvalidTransition { action: "activate", .. })));
    assert!(matches!(h.agent.on_install().await, Err(Error::InvalidTransition { action: "install", .. })));
}

#[tokio::test]
async fn test_failed_reinstall_keeps_existing_generation() {
    let h = harness(config(), shell_network()).await;
    h.agent.on_install().await.unwrap();

    let network = FakeNetwork::default().fail(INDEX);
    let retry = CachingAgent::new(config(), h.store.clone(), Arc::new(network), h.host.clone()).unwrap();
    assert!(retry.on_install().await.is_err());

    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v45".to_string()]);
    assert_eq!(entry_count(&h).await, 3);
}

#[tokio::test]
async fn test_asset_in_both_subsets_fetched_once() {
    let mut cfg = config();
    cfg.supplementary_assets = vec![INDEX.into(), CDN_LIB.into()];
    let h = harness(cfg, shell_network()).await;

    let report = h.agent.on_install().await.unwrap();

    assert_eq!(report.critical_cached, 2);
    assert_eq!(report.supplementary_cached, 1);
    assert_eq!(h.network.calls_for("/index.html"), 1);
    assert_eq!(entry_count(&h).await, 3);
}

#[tokio::test]
async fn test_oversized_critical_asset_aborts_install() {
    let mut cfg = config();
    cfg.max_bytes = 8;
    let h = harness(cfg, shell_network()).await;

    let result = h.agent.on_install().await;

    assert!(
        matches!(result, Err(Error::PrecacheFailed { ref url, ref reason }) if url == INDEX && reason.starts_with("FETCH_TOO_LARGE"))
    );
    assert_eq!(h.agent.state().await, AgentState::Redundant);
}

#[tokio::test]
async fn test_best_effort_failure_never_aborts() {
    let network = FakeNetwork::default().ok(INDEX, "<html/>").ok(ICON, "PNG").status(CDN_LIB, 404);
    let h = harness(config(), network).await;

    let report = h.agent.on_install().await.unwrap();

    assert_eq!(report.critical_cached, 2);
    assert_eq!(report.supplementary_cached, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].url, CDN_LIB);
    assert_eq!(entry_count(&h).await, 2);
}

#[tokio::test]
async fn test_best_effort_policy_for_critical_subset() {
    let mut cfg = config();
    cfg.critical_policy = InstallPolicy::BestEffort;
    let network = FakeNetwork::default().ok(INDEX, "<html/>").fail(ICON).ok(CDN_LIB, "lib()");
    let h = harness(cfg, network).await;

    let report = h.agent.on_install().await.unwrap();

    assert_eq!(report.critical_cached, 1);
    assert_eq!(report.supplementary_cached, 1);
    assert_eq!(report.skipped[0].url, ICON);
}

#[tokio::test]
async fn test_atomic_policy_for_supplementary_subset() {
    let mut cfg = config();
    cfg.supplementary_policy = InstallPolicy::Atomic;
    let network = FakeNetwork::default().ok(INDEX, "<html/>").ok(ICON, "PNG").fail(CDN_LIB);
    let h = harness(cfg, network).await;

    let result = h.agent.on_install().await;

    assert!(matches!(result, Err(Error::PrecacheFailed { .. })));
    assert!(h.store.list_generations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_skip_waiting_disabled() {
    let mut cfg = config();
    cfg.skip_waiting = false;
    let h = harness(cfg, shell_network()).await;

    let report = h.agent.on_install().await.unwrap();

    assert!(!report.skip_waiting);
    assert_eq!(h.host.skip_waits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refused_skip_waiting_still_installs() {
    let h = harness(config(), shell_network()).await;
    h.host.refuse_skip_waiting.store(true, Ordering::SeqCst);

    let report = h.agent.on_install().await.unwrap();

    assert!(!report.skip_waiting);
    assert_eq!(h.host.skip_waits.load(Ordering::SeqCst), 1);
    assert_eq!(h.agent.state().await, AgentState::Installed);
    assert_eq!(entry_count(&h).await, 3);
}

#[tokio::test]
async fn test_claim_failure_leaves_agent_installed() {
    let h = harness(config(), shell_network()).await;
    h.store.open("v44").await.unwrap();
    h.agent.on_install().await.unwrap();
    h.host.fail_claim.store(true, Ordering::SeqCst);

    assert!(h.agent.on_activate().await.is_err());
    assert_eq!(h.agent.state().await, AgentState::Installed);
    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v45".to_string()]);

    h.host.fail_claim.store(false, Ordering::SeqCst);
    let report = h.agent.on_activate().await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(report.claimed, Some(2));
    assert_eq!(h.host.claims.load(Ordering::SeqCst), 2);
    assert_eq!(h.agent.state().await, AgentState::Activated);
}

#[tokio::test]
async fn test_failed_deletion_fails_activation_before_claim() {
    let h = harness(config(), shell_network()).await;
    h.store.open("v43").await.unwrap();
    h.store.open("v44").await.unwrap();
    h.agent.on_install().await.unwrap();
    h.store.fail_delete_of("v44");

    let result = h.agent.on_activate().await;

    assert!(matches!(result, Err(Error::ActivateFailed(ref msg)) if msg.contains("v44") && !msg.contains("v43")));
    assert_eq!(h.host.claims.load(Ordering::SeqCst), 0);
    assert_eq!(h.agent.state().await, AgentState::Installed);
    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v44".to_string(), "v45".to_string()]);
}

#[tokio::test]
async fn test_activate_before_install_is_rejected() {
    let h = harness(config(), shell_network()).await;
    let result = h.agent.on_activate().await;
    assert!(matches!(result, Err(Error::InvalidTransition { action: "activate", .. })));
    assert_eq!(h.agent.state().await, AgentState::Parsed);
}

#[tokio::test]
async fn test_activate_purges_stale_generations() {
    let h = harness(config(), shell_network()).await;
    h.store.open("v1").await.unwrap();
    h.store.open("v2").await.unwrap();

    h.agent.on_install().await.unwrap();
    let report = h.agent.on_activate().await.unwrap();

    let mut deleted = report.deleted.clone();
    deleted.sort();
    assert_eq!(deleted, vec!["v1".to_string(), "v2".to_string()]);
    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v45".to_string()]);
    assert_eq!(entry_count(&h).await, 3);
    assert_eq!(report.claimed, Some(2));
    assert_eq!(h.agent.state().await, AgentState::Activated);
}

#[tokio::test]
async fn test_stale_purge_keeps_current_version() {
    let mut cfg = config();
    cfg.version = "v2".into();
    cfg.critical_assets = Vec::new();
    cfg.supplementary_assets = Vec::new();
    let h = harness(cfg, FakeNetwork::default()).await;
    h.store.open("v1").await.unwrap();
    h.store.open("v2").await.unwrap();

    h.agent.on_install().await.unwrap();
    h.agent.on_activate().await.unwrap();

    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v2".to_string()]);
}

#[tokio::test]
async fn test_claim_runs_after_all_deletions() {
    let h = harness(config(), shell_network()).await;
    h.store.open("v33").await.unwrap();
    h.store.open("v34").await.unwrap();

    h.agent.on_install().await.unwrap();
    h.agent.on_activate().await.unwrap();

    let events = h.events.lock().unwrap().clone();
    assert_eq!(events.len(), 3);
    assert_eq!(events.last().map(String::as_str), Some("claim"));
}

#[tokio::test]
async fn test_claim_disabled() {
    let mut cfg = config();
    cfg.claim_clients = false;
    let h = harness(cfg, shell_network()).await;

    h.agent.on_install().await.unwrap();
    let report = h.agent.on_activate().await.unwrap();

    assert_eq!(report.claimed, None);
    assert_eq!(h.host.claims.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_prefixed_generation_name() {
    let mut cfg = config();
    cfg.cache_prefix = Some("nacionalizacion-cr-cache".into());
    cfg.version = "v2".into();
    let h = harness(cfg, shell_network()).await;
    h.store.open("nacionalizacion-cr-cache-v1").await.unwrap();

    h.agent.on_install().await.unwrap();
    h.agent.on_activate().await.unwrap();

    assert_eq!(h.store.list_generations().await.unwrap(), vec!["nacionalizacion-cr-cache-v2".to_string()]);
}

#[tokio::test]
async fn test_non_get_requests_never_touch_store() {
    let url = "https://app.test/api/solicitud";
    let network = FakeNetwork::default().reply(url, Some(ResponseSnapshot::new(url, 201, "created")));
    let h = harness(config(), network).await;

    for method in [Method::Post, Method::Put, Method::Delete, Method::Patch, Method::Head, Method::Options] {
        let request = ResourceRequest::new(method, Url::parse(url).unwrap()).with_body("{}");
        let outcome = h.agent.on_request(request).await.unwrap();
        assert_eq!(outcome.decision, Decision::PassThrough);
        assert_eq!(outcome.response.status, 201);
        assert!(outcome.background.is_none());
    }

    assert_eq!(h.network.calls(), 6);
    assert_eq!(h.store.matches(), 0);
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn test_bypass_domains_never_touch_store() {
    let urls = [
        "https://api.hacienda.go.cr/fe/ae?identificacion=112340567",
        "https://vpic.nhtsa.dot.gov/api/vehicles/DecodeVinValues/1HGCM82633A004352?format=json",
        "https://firestore.googleapis.com/v1/projects/app/databases/(default)/documents/users",
        "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword",
    ];
    let mut network = FakeNetwork::default();
    for url in urls {
        network = network.ok(url, "{}");
    }
    let h = harness(config(), network).await;

    for url in urls {
        let outcome = h.agent.on_request(get(url)).await.unwrap();
        assert_eq!(outcome.decision, Decision::Bypass);
        let again = h.agent.on_request(get(url)).await.unwrap();
        assert_eq!(again.decision, Decision::Bypass);
    }

    assert_eq!(h.network.calls(), urls.len() * 2);
    assert_eq!(h.store.matches(), 0);
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn test_bypass_failure_propagates_unmodified() {
    let h = harness(config(), FakeNetwork::default()).await;

    let result = h.agent.on_request(get("https://api.hacienda.go.cr/fe/ae?identificacion=1")).await;

    assert!(matches!(result, Err(Error::Network(ref msg)) if msg.contains("api.hacienda.go.cr")));
    assert_eq!(h.store.matches(), 0);
}

#[tokio::test]
async fn test_bypass_ignores_fetch_error_status() {
    let url = "https://vpic.nhtsa.dot.gov/api/vehicles/DecodeVin/bad";
    let h = harness(config(), FakeNetwork::default().status(url, 500)).await;

    let outcome = h.agent.on_request(get(url)).await.unwrap();

    assert_eq!(outcome.decision, Decision::Bypass);
    assert_eq!(outcome.response.status, 500);
}

#[tokio::test]
async fn test_cache_hit_makes_no_network_call() {
    let h = harness(config(), shell_network()).await;
    h.agent.on_install().await.unwrap();
    h.network.reset_calls();

    let outcome = h.agent.on_request(get(ICON)).await.unwrap();

    assert_eq!(outcome.decision, Decision::Hit);
    assert_eq!(&outcome.response.body[..], b"PNG");
    assert_eq!(h.network.calls(), 0);
}

#[tokio::test]
async fn test_miss_then_populate() {
    let url = "https://app.test/data/placas.json?page=2";
    let h = harness(config(), FakeNetwork::default().ok(url, "[1,2,3]")).await;
    h.store.open("v45").await.unwrap();

    let first = h.agent.on_request(get(url)).await.unwrap();
    assert_eq!(first.decision, Decision::Stored);
    assert_eq!(&first.response.body[..], b"[1,2,3]");
    first.background.expect("store write should be scheduled").await.unwrap();

    assert_eq!(h.network.calls(), 1);
    assert_eq!(h.store.puts(), 1);

    let second = h.agent.on_request(get(url)).await.unwrap();
    assert_eq!(second.decision, Decision::Hit);
    assert_eq!(second.response, first.response);
    assert_eq!(h.network.calls(), 1);
}

#[tokio::test]
async fn test_query_string_is_part_of_identity() {
    let page1 = "https://app.test/data.json?page=1";
    let page2 = "https://app.test/data.json?page=2";
    let h = harness(config(), FakeNetwork::default().ok(page1, "one").ok(page2, "two")).await;
    h.store.open("v45").await.unwrap();

    let first = h.agent.on_request(get(page1)).await.unwrap();
    first.background.unwrap().await.unwrap();

    let second = h.agent.on_request(get(page2)).await.unwrap();
    assert_eq!(second.decision, Decision::Stored);
    assert_eq!(&second.response.body[..], b"two");
}

#[tokio::test]
async fn test_error_status_is_not_cached() {
    let url = "https://app.test/missing.png";
    let h = harness(config(), FakeNetwork::default().status(url, 404)).await;
    h.store.open("v45").await.unwrap();

    let outcome = h.agent.on_request(get(url)).await.unwrap();

    assert_eq!(outcome.decision, Decision::NetworkOnly);
    assert_eq!(outcome.response.status, 404);
    assert!(outcome.background.is_none());
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn test_opaque_response_is_not_cached() {
    let url = "https://fonts.test/roboto.woff2";
    let h = harness(config(), FakeNetwork::default().opaque(url)).await;
    h.store.open("v45").await.unwrap();

    let request = get(url).with_mode(RequestMode::NoCors);
    let outcome = h.agent.on_request(request).await.unwrap();

    assert_eq!(outcome.decision, Decision::NetworkOnly);
    assert_eq!(outcome.response.kind, ResponseKind::Opaque);
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn test_oversized_miss_served_but_not_stored() {
    let url = "https://app.test/data/placas.json";
    let mut cfg = config();
    cfg.max_bytes = 4;
    let h = harness(cfg, FakeNetwork::default().ok(url, "[1,2,3]")).await;
    h.store.open("v45").await.unwrap();

    let outcome = h.agent.on_request(get(url)).await.unwrap();

    assert_eq!(outcome.decision, Decision::NetworkOnly);
    assert_eq!(&outcome.response.body[..], b"[1,2,3]");
    assert!(outcome.background.is_none());
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn test_network_failure_on_miss_propagates() {
    let h = harness(config(), FakeNetwork::default()).await;

    let result = h.agent.on_request(get("https://app.test/report.pdf")).await;

    assert!(matches!(result, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_runtime_write_failure_still_serves_response() {
    let url = "https://app.test/late.js";
    let h = harness(config(), FakeNetwork::default().ok(url, "late()")).await;

    // No install ran, so the current generation does not exist and the write fails.
    let outcome = h.agent.on_request(get(url)).await.unwrap();
    assert_eq!(outcome.decision, Decision::Stored);
    assert_eq!(&outcome.response.body[..], b"late()");
    outcome.background.unwrap().await.unwrap();

    assert!(h.store.list_generations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_document_served_to_failed_navigation() {
    let mut cfg = config();
    cfg.offline_document = Some("index.html".into());
    let h = harness(cfg, shell_network()).await;
    h.agent.on_install().await.unwrap();

    let navigation = get("https://app.test/tramites/nuevo").with_mode(RequestMode::Navigate);
    let outcome = h.agent.on_request(navigation).await.unwrap();
    assert_eq!(outcome.decision, Decision::Fallback);
    assert_eq!(&outcome.response.body[..], b"<html>shell</html>");

    let subresource = get("https://app.test/tramites/nuevo.js");
    assert!(matches!(h.agent.on_request(subresource).await, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_no_fallback_for_rejected_request() {
    let mut cfg = config();
    cfg.offline_document = Some("index.html".into());
    let page = "https://app.test/tramites/nuevo";
    let h = harness(cfg, shell_network().reject(page)).await;
    h.agent.on_install().await.unwrap();

    let navigation = get(page).with_mode(RequestMode::Navigate);
    let result = h.agent.on_request(navigation).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_no_fallback_unless_configured() {
    let h = harness(config(), shell_network()).await;
    h.agent.on_install().await.unwrap();

    let navigation = get("https://app.test/tramites/nuevo").with_mode(RequestMode::Navigate);
    assert!(matches!(h.agent.on_request(navigation).await, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_concurrent_misses_leave_one_entry() {
    let url = "https://app.test/catalog.json";
    let h = Arc::new(harness(config(), FakeNetwork::default().ok(url, "{}")).await);
    h.store.open("v45").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move { h.agent.on_request(get(url)).await.unwrap() }));
    }
    for task in tasks {
        let outcome = task.await.unwrap();
        if let Some(write) = outcome.background {
            write.await.unwrap();
        }
    }

    assert_eq!(entry_count(&h).await, 1);
}

#[tokio::test]
async fn test_end_to_end_deploy_scenario() {
    let bypass_url = "https://api.hacienda.go.cr/fe/ae?identificacion=112340567";
    let network = FakeNetwork::default()
        .ok(INDEX, "<html>v45</html>")
        .ok(ICON, "PNG-v45")
        .status(CDN_LIB, 404)
        .ok(bypass_url, r#"{"nombre":"ANA"}"#);
    let h = harness(config(), network).await;

    let old = h.store.open("v34").await.unwrap();
    let icon_key = RequestKey::new(Method::Get, &Url::parse(ICON).unwrap());
    h.store.put(&old, &icon_key, &ResponseSnapshot::new(ICON, 200, "PNG-v34")).await.unwrap();

    let installed = h.agent.on_install().await.unwrap();
    assert_eq!(installed.skipped.len(), 1);

    h.agent.on_activate().await.unwrap();
    assert_eq!(h.store.list_generations().await.unwrap(), vec!["v45".to_string()]);

    h.network.reset_calls();
    let icon = h.agent.on_request(get(ICON)).await.unwrap();
    assert_eq!(icon.decision, Decision::Hit);
    assert_eq!(&icon.response.body[..], b"PNG-v45");
    assert_eq!(h.network.calls(), 0);

    let puts_before = h.store.puts();
    for _ in 0..2 {
        let api = h.agent.on_request(get(bypass_url)).await.unwrap();
        assert_eq!(api.decision, Decision::Bypass);
    }
    assert_eq!(h.network.calls_for("identificacion=112340567"), 2);
    assert_eq!(h.store.puts(), puts_before);
    assert_eq!(entry_count(&h).await, 2);
}
