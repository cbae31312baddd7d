//! Scripted in-memory fakes for the capability traits.
//!
//! The interpreter, runner and orchestrator crates all test against these,
//! so they live here instead of being redeclared per crate. A [`FakePage`]
//! is a sequence of [`FakeDom`] snapshots; clicking the configured
//! next-control advances to the next snapshot, which is how pagination is
//! modelled.

use crate::error::DriverError;
use crate::model::{ContextOptions, Cookie};
use crate::traits::{BrowserSession, BrowsingContext, Page};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webharvest_core_types::{FieldSpec, Record};

/// Build a record from literal pairs. Test convenience.
pub fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
    let mut rec = Record::new();
    for (key, value) in pairs {
        rec.insert((*key).to_string(), value.clone());
    }
    rec
}

/// One DOM snapshot: element counts and canned extraction results, by selector.
#[derive(Debug, Clone, Default)]
pub struct FakeDom {
    counts: HashMap<String, usize>,
    extractions: HashMap<String, Vec<Record>>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elements(mut self, selector: &str, count: usize) -> Self {
        self.counts.insert(selector.to_string(), count);
        self
    }

    /// Canned extraction result; also marks the selector present.
    pub fn with_extraction(mut self, selector: &str, records: Vec<Record>) -> Self {
        self.counts
            .entry(selector.to_string())
            .or_insert(records.len().max(1));
        self.extractions.insert(selector.to_string(), records);
        self
    }

    fn count(&self, selector: &str) -> usize {
        self.counts.get(selector).copied().unwrap_or(0)
    }
}

#[derive(Default)]
struct PageState {
    doms: Vec<FakeDom>,
    index: usize,
    evaluations: VecDeque<serde_json::Value>,
}

/// Scripted page handle.
pub struct FakePage {
    state: Mutex<PageState>,
    origin: String,
    next_control: Option<String>,
    goto_delay: Option<Duration>,
    fail_goto_matching: Option<(String, DriverError)>,
    fail_click_matching: Option<(String, DriverError)>,
    fail_count_matching: Option<(String, DriverError)>,
    fail_extract: Option<DriverError>,
    fail_close: bool,
    /// Every driver call, in order, for assertions.
    pub actions: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl FakePage {
    /// A page with a single empty DOM snapshot.
    pub fn new() -> Self {
        Self::with_doms(vec![FakeDom::new()])
    }

    pub fn with_doms(doms: Vec<FakeDom>) -> Self {
        assert!(!doms.is_empty(), "a fake page needs at least one DOM");
        Self {
            state: Mutex::new(PageState {
                doms,
                index: 0,
                evaluations: VecDeque::new(),
            }),
            origin: "https://example.com".to_string(),
            next_control: None,
            goto_delay: None,
            fail_goto_matching: None,
            fail_click_matching: None,
            fail_count_matching: None,
            fail_extract: None,
            fail_close: false,
            actions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Clicking this selector advances to the next DOM snapshot.
    pub fn with_next_control(mut self, selector: &str) -> Self {
        self.next_control = Some(selector.to_string());
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    /// Fail `goto` for URLs containing `fragment`.
    pub fn failing_goto(mut self, fragment: &str, error: DriverError) -> Self {
        self.fail_goto_matching = Some((fragment.to_string(), error));
        self
    }

    /// Fail `click` for selectors containing `fragment` even when present.
    pub fn failing_click(mut self, fragment: &str, error: DriverError) -> Self {
        self.fail_click_matching = Some((fragment.to_string(), error));
        self
    }

    /// Fail `count`/`exists` for selectors containing `fragment`.
    pub fn failing_count(mut self, fragment: &str, error: DriverError) -> Self {
        self.fail_count_matching = Some((fragment.to_string(), error));
        self
    }

    pub fn failing_extract(mut self, error: DriverError) -> Self {
        self.fail_extract = Some(error);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Make `goto` take this long, to force job overlap in concurrency tests.
    pub fn with_goto_delay(mut self, delay: Duration) -> Self {
        self.goto_delay = Some(delay);
        self
    }

    /// Queue a value for the next `evaluate` call.
    pub fn push_evaluation(&self, value: serde_json::Value) {
        self.state.lock().unwrap().evaluations.push_back(value);
    }

    /// Index of the DOM snapshot currently shown.
    pub fn dom_index(&self) -> usize {
        self.state.lock().unwrap().index
    }

    pub fn action_log(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn log(&self, entry: String) {
        self.actions.lock().unwrap().push(entry);
    }

    fn current_count(&self, selector: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.doms[state.index].count(selector)
    }

    fn query_failure(&self, selector: &str) -> Result<(), DriverError> {
        if let Some((fragment, error)) = &self.fail_count_matching {
            if selector.contains(fragment.as_str()) {
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.log(format!("goto {url}"));
        if let Some(delay) = self.goto_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((fragment, error)) = &self.fail_goto_matching {
            if url.contains(fragment.as_str()) {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    async fn go_back(&self, _timeout: Duration) -> Result<(), DriverError> {
        self.log("go_back".to_string());
        let mut state = self.state.lock().unwrap();
        state.index = state.index.saturating_sub(1);
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.query_failure(selector)?;
        Ok(self.current_count(selector) > 0)
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        self.query_failure(selector)?;
        Ok(self.current_count(selector))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.log(format!("click {selector}"));
        if let Some((fragment, error)) = &self.fail_click_matching {
            if selector.contains(fragment.as_str()) {
                return Err(error.clone());
            }
        }
        if self.current_count(selector) == 0 {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        if self.next_control.as_deref() == Some(selector) {
            let mut state = self.state.lock().unwrap();
            if state.index + 1 < state.doms.len() {
                state.index += 1;
            }
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.log(format!("fill {selector}={value}"));
        if self.current_count(selector) == 0 {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        self.log(format!("wait_for {selector}"));
        if self.current_count(selector) > 0 {
            Ok(())
        } else {
            Err(DriverError::Timeout(selector.to_string()))
        }
    }

    async fn wait_for_idle_network(&self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn extract(
        &self,
        selector: &str,
        _fields: &[FieldSpec],
    ) -> Result<Vec<Record>, DriverError> {
        self.log(format!("extract {selector}"));
        if let Some(error) = &self.fail_extract {
            return Err(error.clone());
        }
        let state = self.state.lock().unwrap();
        Ok(state.doms[state.index]
            .extractions
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.log(format!("evaluate {script}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .evaluations
            .pop_front()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn current_origin(&self) -> Result<String, DriverError> {
        Ok(self.origin.clone())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(DriverError::Other("close failed".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct OpenCounters {
    open: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl OpenCounters {
    fn increment(&self) {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(open, Ordering::SeqCst);
    }

    fn decrement(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted browsing context wrapping one prepared page.
pub struct FakeContext {
    page: Arc<FakePage>,
    pub cookie_jar: Mutex<Vec<Cookie>>,
    pub closed: AtomicBool,
    counters: Option<OpenCounters>,
}

impl FakeContext {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Arc::new(page),
            cookie_jar: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            counters: None,
        }
    }

    pub fn page(&self) -> Arc<FakePage> {
        Arc::clone(&self.page)
    }

    pub fn seed_cookies(&self, cookies: Vec<Cookie>) {
        *self.cookie_jar.lock().unwrap() = cookies;
    }
}

#[async_trait]
impl BrowsingContext for FakeContext {
    async fn new_page(&self) -> Result<Arc<dyn Page>, DriverError> {
        Ok(Arc::clone(&self.page) as Arc<dyn Page>)
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, DriverError> {
        Ok(self.cookie_jar.lock().unwrap().clone())
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<(), DriverError> {
        self.cookie_jar
            .lock()
            .unwrap()
            .extend(cookies.iter().cloned());
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Some(counters) = &self.counters {
                counters.decrement();
            }
        }
        Ok(())
    }
}

type PageFactory = dyn Fn() -> FakePage + Send + Sync;

/// Scripted browser session handing out one fresh context per call.
///
/// Tracks how many contexts are open at once so tests can assert the
/// concurrency bound.
pub struct FakeBrowser {
    factory: Box<PageFactory>,
    open: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
    pub created: AtomicUsize,
    pub closed: AtomicBool,
}

impl FakeBrowser {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> FakePage + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            open: Arc::new(AtomicUsize::new(0)),
            max_open: Arc::new(AtomicUsize::new(0)),
            created: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Highest number of contexts that were open simultaneously.
    pub fn max_open_contexts(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn open_contexts(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn new_context(
        &self,
        _options: &ContextOptions,
    ) -> Result<Arc<dyn BrowsingContext>, DriverError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let counters = OpenCounters {
            open: Arc::clone(&self.open),
            max: Arc::clone(&self.max_open),
        };
        counters.increment();
        let mut context = FakeContext::new((self.factory)());
        context.counters = Some(counters);
        Ok(Arc::new(context))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
