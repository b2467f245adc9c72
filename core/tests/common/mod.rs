// core/tests/common/mod.rs
//
// Test doubles shared by the integration tests.
//
// `Spy` is a fake native engine that:
// - records `enter:<call>` / `exit:<call>` around every native call
// - counts overlapping calls (single-entrancy violations)
// - yields to the scheduler inside every call, so overlapping would be
//   observable if the gate let it happen
// - returns sentinels / failures as configured by `Script`

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use imegate_core::{
    Commit, Context, EngineFactory, EngineManager, FileSystem, GateConfig, LogSink, MemoryFs,
    NativeEngine, NativeSession, SchemaDescriptor, Status,
};

pub const LUNA_CONFIG: &str = r#"
[schema]
id = "luna_pinyin_simp"
name = "Luna Pinyin (simplified)"
page_size = 5

[table]
n = ["你", "呢", "那"]
ni = ["你", "尼", "泥"]
nihao = ["你好"]
hao = ["好", "号"]
wo = ["我", "窝"]
"#;

/// Behaviour of the fake engine.
#[derive(Debug, Clone)]
pub struct Script {
    /// `None` reports the catalog as unavailable.
    pub schemas: Option<Vec<SchemaDescriptor>>,
    /// `None` reports no current schema.
    pub current_schema: Option<String>,
    pub action_succeeds: bool,
    pub key_handled: bool,
    pub fail_setup: bool,
    pub fail_rebuild: bool,
    pub null_session: bool,
    /// Scheduler yields inside every native call.
    pub yields_per_call: usize,
    /// Extra time spent inside `perform_maintenance`.
    pub maintenance_delay: Duration,
    /// Extra time spent inside `setup`.
    pub setup_delay: Duration,
    /// Extra time spent inside `finalize`.
    pub finalize_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            schemas: Some(Vec::new()),
            current_schema: Some("luna_pinyin_simp".to_string()),
            action_succeeds: true,
            key_handled: true,
            fail_setup: false,
            fail_rebuild: false,
            null_session: false,
            yields_per_call: 3,
            maintenance_delay: Duration::ZERO,
            setup_delay: Duration::ZERO,
            finalize_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct Spy {
    events: Mutex<Vec<String>>,
    depth: AtomicUsize,
    violations: AtomicUsize,
    constructions: AtomicUsize,
    next_session: AtomicUsize,
    script: Mutex<Script>,
}

/// Marks one native call in flight; exit is recorded on drop, including
/// when the call's future is cancelled.
struct CallGuard {
    spy: Arc<Spy>,
    name: String,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.spy.depth.fetch_sub(1, Ordering::SeqCst);
        self.spy.record(format!("exit:{}", self.name));
    }
}

impl Spy {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    pub fn script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }

    pub fn update<F: FnOnce(&mut Script)>(&self, f: F) {
        f(&mut self.script.lock().unwrap());
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    /// Enter a native call. Any call already in flight is a violation.
    fn enter(self: &Arc<Self>, name: String) -> CallGuard {
        if self.depth.fetch_add(1, Ordering::SeqCst) > 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.record(format!("enter:{}", name));
        CallGuard {
            spy: Arc::clone(self),
            name,
        }
    }

    async fn suspend(&self) {
        for _ in 0..self.script().yields_per_call {
            tokio::task::yield_now().await;
        }
    }

    async fn linger(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Call names in the order they entered the engine.
    pub fn calls(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("enter:").map(str::to_string))
            .collect()
    }

    pub fn in_flight(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Every `enter:X` is immediately followed by its own `exit:X`.
    pub fn assert_serialized(&self) {
        assert_eq!(self.violations(), 0, "overlapping native calls");
        let events = self.events();
        assert_eq!(events.len() % 2, 0, "unbalanced events: {:?}", events);
        for pair in events.chunks(2) {
            let enter = pair[0].strip_prefix("enter:");
            let exit = pair[1].strip_prefix("exit:");
            assert!(
                enter.is_some() && enter == exit,
                "interleaved native calls: {:?}",
                pair
            );
        }
    }
}

pub struct SpyFactory(pub Arc<Spy>);

#[async_trait]
impl EngineFactory for SpyFactory {
    async fn create(
        &self,
        log_sink: LogSink,
        _fs: Arc<dyn FileSystem>,
    ) -> anyhow::Result<Box<dyn NativeEngine>> {
        let spy = &self.0;
        spy.constructions.fetch_add(1, Ordering::SeqCst);
        let _call = spy.enter("create".to_string());
        spy.suspend().await;
        log_sink.log("spy engine constructed");
        Ok(Box::new(SpyEngine {
            spy: Arc::clone(spy),
        }))
    }
}

pub struct SpyEngine {
    spy: Arc<Spy>,
}

#[async_trait]
impl NativeEngine for SpyEngine {
    async fn setup(&mut self) -> anyhow::Result<()> {
        let _call = self.spy.enter("setup".to_string());
        self.spy.suspend().await;
        self.spy.linger(self.spy.script().setup_delay).await;
        if self.spy.script().fail_setup {
            anyhow::bail!("setup failed");
        }
        Ok(())
    }

    async fn rebuild_index_for_schema(
        &mut self,
        schema_id: &str,
        _schema_config: &str,
    ) -> anyhow::Result<()> {
        let _call = self.spy.enter(format!("rebuild:{}", schema_id));
        self.spy.suspend().await;
        if self.spy.script().fail_rebuild {
            anyhow::bail!("prism compilation failed");
        }
        Ok(())
    }

    async fn create_session(
        &mut self,
        schema_id: &str,
        _schema_config: &str,
    ) -> anyhow::Result<Option<Box<dyn NativeSession>>> {
        let _call = self.spy.enter(format!("create_session:{}", schema_id));
        self.spy.suspend().await;
        if self.spy.script().null_session {
            return Ok(None);
        }
        let n = self.spy.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(Box::new(SpySession {
            spy: Arc::clone(&self.spy),
            label: format!("s{}", n),
        })))
    }

    async fn list_schemas(&mut self) -> anyhow::Result<Option<Vec<SchemaDescriptor>>> {
        let _call = self.spy.enter("list_schemas".to_string());
        self.spy.suspend().await;
        Ok(self.spy.script().schemas)
    }

    async fn perform_maintenance(&mut self) -> anyhow::Result<()> {
        let _call = self.spy.enter("maintenance".to_string());
        self.spy.suspend().await;
        self.spy.linger(self.spy.script().maintenance_delay).await;
        Ok(())
    }

    async fn finalize(&mut self) -> anyhow::Result<()> {
        let _call = self.spy.enter("finalize".to_string());
        self.spy.suspend().await;
        self.spy.linger(self.spy.script().finalize_delay).await;
        Ok(())
    }
}

pub struct SpySession {
    spy: Arc<Spy>,
    label: String,
}

impl SpySession {
    fn enter(&self, call: String) -> CallGuard {
        self.spy.enter(format!("{}.{}", self.label, call))
    }
}

#[async_trait]
impl NativeSession for SpySession {
    async fn process_key(&mut self, key_id: u32, _modifier_mask: u32) -> anyhow::Result<bool> {
        let _call = self.enter(format!("key:{}", key_id));
        self.spy.suspend().await;
        Ok(self.spy.script().key_handled)
    }

    async fn context(&mut self) -> anyhow::Result<Context> {
        let _call = self.enter("context".to_string());
        self.spy.suspend().await;
        Ok(Context::default())
    }

    async fn commit(&mut self) -> anyhow::Result<Commit> {
        let _call = self.enter("commit".to_string());
        self.spy.suspend().await;
        Ok(Commit::default())
    }

    async fn status(&mut self) -> anyhow::Result<Status> {
        let _call = self.enter("status".to_string());
        self.spy.suspend().await;
        Ok(Status::default())
    }

    async fn clear_composition(&mut self) -> anyhow::Result<()> {
        let _call = self.enter("clear".to_string());
        self.spy.suspend().await;
        Ok(())
    }

    async fn current_schema(&mut self) -> anyhow::Result<Option<String>> {
        let _call = self.enter("current_schema".to_string());
        self.spy.suspend().await;
        Ok(self.spy.script().current_schema)
    }

    async fn action_candidate_on_current_page(
        &mut self,
        index: usize,
        action: u32,
    ) -> anyhow::Result<bool> {
        let _call = self.enter(format!("action:{}:{}", index, action));
        self.spy.suspend().await;
        Ok(self.spy.script().action_succeeds)
    }

    async fn close(&mut self) {
        let _call = self.enter("close".to_string());
        self.spy.suspend().await;
    }
}

/// Manager over a fresh spy, not yet initialized.
pub fn spy_manager(script: Script, config: GateConfig) -> (EngineManager, Arc<Spy>) {
    let spy = Spy::new(script);
    let manager = EngineManager::new(SpyFactory(Arc::clone(&spy)), config);
    (manager, spy)
}

/// Manager over a fresh spy, initialized.
pub async fn ready_spy_manager(script: Script, config: GateConfig) -> (EngineManager, Arc<Spy>) {
    let (manager, spy) = spy_manager(script, config);
    manager
        .initialize(LogSink::discard(), Arc::new(MemoryFs::new()))
        .await
        .expect("spy engine initializes");
    (manager, spy)
}

/// Wait until the engine has entered a call named `name`.
pub async fn wait_for_call(spy: &Spy, name: &str) {
    for _ in 0..2000 {
        if spy.calls().iter().any(|c| c == name) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("engine never entered {}; calls: {:?}", name, spy.calls());
}

/// Index of `event` in the recorded event log.
pub fn position(spy: &Spy, event: &str) -> usize {
    spy.events()
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("no event {}; events: {:?}", event, spy.events()))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
