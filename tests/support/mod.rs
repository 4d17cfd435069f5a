//! 测试用的脚本化门户
//!
//! 每个 URL 对应一个静态文档：`(作用域, 选择器)` → 元素列表，外加点击 / 提交动作。
//! 翻页、进入详情页等状态变化都用"导航到另一个文档"来表达。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use land_records_export::config::Timings;
use land_records_export::error::{ChallengeError, SessionError, SessionResult, SinkError};
use land_records_export::infrastructure::{PortalPage, PortalSession, Scope, SessionLauncher, Target};
use land_records_export::models::criteria::{ModeKind, SearchCriteria, SubmitStyle};
use land_records_export::models::image_set::DocumentImageSet;
use land_records_export::models::record::Record;
use land_records_export::orchestrator::{ExportBuffer, PipelineDriver};
use land_records_export::selectors::{captcha, detail, grid, landing, outcome, viewer};
use land_records_export::services::form_filler::{FormFiller, SUBMIT_FORM_SCRIPT};
use land_records_export::services::{ChallengeSolver, DatasetSink, FileSink, ImageComposer, ImageStore};
use land_records_export::utils::retry::RetryPolicy;
use land_records_export::workflow::{RowExtractor, SearchOrchestrator};

pub const PORTAL: &str = "https://portal.test/";
pub const SEARCH: &str = "https://portal.test/search";
pub const RESULTS: &str = "https://portal.test/results";
pub const REJECTED: &str = "https://portal.test/rejected";
pub const LIMITED: &str = "https://portal.test/limited";

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

// ========== 文档模型 ==========

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub image: Vec<u8>,
    /// 双击失败，只能用单击打开
    pub no_double_click: bool,
}

impl Element {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_image(bytes: &[u8]) -> Self {
        Self {
            image: bytes.to_vec(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn without_double_click(mut self) -> Self {
        self.no_double_click = true;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    Nothing,
    Navigate(String),
    /// 第 n 次触发导航到第 n 个地址，用完后停在最后一个
    Sequence(Vec<String>),
    /// 在新页面中打开地址，当前页面不动
    Popup(String),
    Fail(String),
}

#[derive(Debug, Clone, Default)]
pub struct Doc {
    elements: HashMap<(Scope, String), Vec<Element>>,
    clicks: HashMap<(Scope, String, usize), Action>,
    frames: Vec<Scope>,
    submit: Option<Action>,
}

impl Doc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn el(self, selector: impl Into<String>, element: Element) -> Self {
        self.el_in(&Scope::Main, selector, element)
    }

    pub fn el_in(mut self, scope: &Scope, selector: impl Into<String>, element: Element) -> Self {
        self.elements
            .entry((scope.clone(), selector.into()))
            .or_default()
            .push(element);
        self
    }

    pub fn els(mut self, selector: impl Into<String>, elements: Vec<Element>) -> Self {
        self.elements
            .entry((Scope::Main, selector.into()))
            .or_default()
            .extend(elements);
        self
    }

    pub fn els_in(mut self, scope: &Scope, selector: impl Into<String>, elements: Vec<Element>) -> Self {
        self.elements
            .entry((scope.clone(), selector.into()))
            .or_default()
            .extend(elements);
        self
    }

    pub fn on_click(self, selector: impl Into<String>, action: Action) -> Self {
        self.on_click_in(&Scope::Main, selector, 0, action)
    }

    pub fn on_click_in(mut self, scope: &Scope, selector: impl Into<String>, nth: usize, action: Action) -> Self {
        self.clicks.insert((scope.clone(), selector.into(), nth), action);
        self
    }

    pub fn on_submit(mut self, action: Action) -> Self {
        self.submit = Some(action);
        self
    }

    pub fn frame(mut self, scope: Scope) -> Self {
        if !self.frames.contains(&scope) {
            self.frames.push(scope);
        }
        self
    }
}

// ========== 共享的门户状态 ==========

#[derive(Default)]
pub struct World {
    docs: Mutex<HashMap<String, Arc<Doc>>>,
    sequences: Mutex<HashMap<String, usize>>,
    events: Mutex<Vec<String>>,
    popups: Mutex<Vec<String>>,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub releases: AtomicUsize,
}

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, url: &str, doc: Doc) {
        self.docs.lock().unwrap().insert(url.to_string(), Arc::new(doc));
    }

    fn doc(&self, url: &str) -> Option<Arc<Doc>> {
        self.docs.lock().unwrap().get(url).cloned()
    }

    pub fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    fn next_in_sequence(&self, key: &str) -> usize {
        let mut sequences = self.sequences.lock().unwrap();
        let counter = sequences.entry(key.to_string()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }
}

// ========== 会话 / 页面 ==========

struct PageState {
    url: String,
    history: Vec<String>,
}

pub struct FakePage {
    world: Arc<World>,
    state: Mutex<PageState>,
}

impl FakePage {
    fn new(world: Arc<World>) -> Self {
        Self {
            world,
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                history: Vec::new(),
            }),
        }
    }

    fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    fn current(&self) -> Arc<Doc> {
        self.world.doc(&self.url()).unwrap_or_default()
    }

    fn navigate(&self, url: &str) -> SessionResult<()> {
        if self.world.doc(url).is_none() {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                message: "404".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let previous = std::mem::replace(&mut state.url, url.to_string());
        state.history.push(previous);
        drop(state);
        self.world.log(format!("nav:{}", url));
        Ok(())
    }

    fn element(&self, target: &Target) -> SessionResult<Element> {
        self.current()
            .elements
            .get(&(target.scope.clone(), target.selector.clone()))
            .and_then(|els| els.get(target.nth))
            .cloned()
            .ok_or_else(|| SessionError::not_found(target.selector.clone()))
    }

    fn perform(&self, action: Option<Action>, key: String) -> SessionResult<()> {
        match action {
            None | Some(Action::Nothing) => Ok(()),
            Some(Action::Navigate(url)) => self.navigate(&url),
            Some(Action::Sequence(urls)) => {
                let n = self.world.next_in_sequence(&key);
                let url = urls[n.min(urls.len() - 1)].clone();
                self.navigate(&url)
            }
            Some(Action::Popup(url)) => {
                self.world.log(format!("popup:{}", url));
                self.world.popups.lock().unwrap().push(url);
                Ok(())
            }
            Some(Action::Fail(message)) => Err(SessionError::Script(message)),
        }
    }

    fn activate(&self, target: &Target) -> SessionResult<()> {
        self.element(target)?;
        let doc = self.current();
        let action = doc
            .clicks
            .get(&(target.scope.clone(), target.selector.clone(), target.nth))
            .cloned();
        let key = format!("{}|{}|{}|{}", self.url(), target.scope, target.selector, target.nth);
        self.perform(action, key)
    }
}

#[async_trait]
impl PortalPage for FakePage {
    async fn goto(&self, url: &str) -> SessionResult<()> {
        self.navigate(url)
    }

    async fn go_back(&self) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        let previous = state.history.pop().ok_or_else(|| SessionError::Navigation {
            url: state.url.clone(),
            message: "no history".to_string(),
        })?;
        state.url = previous.clone();
        drop(state);
        self.world.log(format!("back:{}", previous));
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        Ok(self.url())
    }

    async fn wait_for_selector(&self, scope: &Scope, selector: &str, timeout: Duration) -> SessionResult<()> {
        if self.count(scope, selector).await? > 0 {
            Ok(())
        } else {
            Err(SessionError::timeout(selector, timeout))
        }
    }

    async fn count(&self, scope: &Scope, selector: &str) -> SessionResult<usize> {
        Ok(self
            .current()
            .elements
            .get(&(scope.clone(), selector.to_string()))
            .map(Vec::len)
            .unwrap_or(0))
    }

    async fn text(&self, target: &Target) -> SessionResult<String> {
        Ok(self.element(target)?.text)
    }

    async fn attribute(&self, target: &Target, name: &str) -> SessionResult<Option<String>> {
        Ok(self.element(target)?.attrs.get(name).cloned())
    }

    async fn click(&self, target: &Target) -> SessionResult<()> {
        self.activate(target)
    }

    async fn double_click(&self, target: &Target) -> SessionResult<()> {
        if self.element(target)?.no_double_click {
            return Err(SessionError::Script("dblclick not supported".to_string()));
        }
        self.activate(target)
    }

    async fn fill(&self, target: &Target, value: &str) -> SessionResult<()> {
        self.element(target)?;
        self.world.log(format!("fill:{}={}", target.selector, value));
        Ok(())
    }

    async fn select_options(&self, target: &Target, values: &[String]) -> SessionResult<()> {
        self.element(target)?;
        self.world.log(format!("select:{}={}", target.selector, values.join(",")));
        Ok(())
    }

    async fn screenshot(&self, target: &Target) -> SessionResult<Vec<u8>> {
        Ok(self.element(target)?.image)
    }

    async fn evaluate(&self, _scope: &Scope, script: &str) -> SessionResult<JsonValue> {
        if script == SUBMIT_FORM_SCRIPT {
            let action = self.current().submit.clone();
            let key = format!("{}|submit", self.url());
            self.perform(action, key)?;
        }
        Ok(JsonValue::Null)
    }

    async fn frames(&self) -> SessionResult<Vec<Scope>> {
        Ok(self.current().frames.clone())
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        self.world.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSession {
    world: Arc<World>,
}

#[async_trait]
impl PortalSession for FakeSession {
    async fn new_page(&self) -> SessionResult<Box<dyn PortalPage>> {
        self.world.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage::new(self.world.clone())))
    }

    async fn release_transient(&self) -> SessionResult<usize> {
        self.world.releases.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn page_ids(&self) -> SessionResult<Vec<String>> {
        let count = self.world.popups.lock().unwrap().len();
        Ok((0..count).map(|i| format!("popup-{}", i)).collect())
    }

    async fn attach_page(&self, id: &str) -> SessionResult<Box<dyn PortalPage>> {
        let url = id
            .strip_prefix("popup-")
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.world.popups.lock().unwrap().get(i).cloned())
            .ok_or_else(|| SessionError::Browser(format!("unknown page {}", id)))?;
        self.world.pages_opened.fetch_add(1, Ordering::SeqCst);
        let page = FakePage::new(self.world.clone());
        page.navigate(&url)?;
        Ok(Box::new(page))
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        self.world.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeLauncher {
    world: Arc<World>,
    pub launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            world,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> SessionResult<Box<dyn PortalSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            world: self.world.clone(),
        }))
    }
}

// ========== 其他协作者 ==========

pub struct FixedSolver {
    answer: String,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FixedSolver {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// 识别服务总是返回错误
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeSolver for FixedSolver {
    async fn solve(&self, image: &[u8]) -> Result<String, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.is_empty() {
            return Err(ChallengeError::ImageNotFound);
        }
        if self.fail {
            return Err(ChallengeError::Rejected("ERROR_CAPTCHA_UNSOLVABLE".to_string()));
        }
        Ok(self.answer.clone())
    }
}

#[derive(Default)]
pub struct RecordingDataset {
    pub batches: Mutex<Vec<Vec<Record>>>,
    pub fail: bool,
}

#[async_trait]
impl DatasetSink for RecordingDataset {
    async fn push(&self, batch: &[Record]) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Dataset("HTTP 503".to_string()));
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFile {
    pub batches: Mutex<Vec<Vec<Record>>>,
}

impl FileSink for RecordingFile {
    fn append(&self, batch: &[Record]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingComposer {
    pub sets: Mutex<Vec<DocumentImageSet>>,
}

impl ImageComposer for RecordingComposer {
    fn compose(&self, set: &DocumentImageSet) -> std::io::Result<Vec<u8>> {
        self.sets.lock().unwrap().push(set.clone());
        Ok(set.pages.concat())
    }
}

pub struct RecordingStore {
    world: Arc<World>,
    fail: bool,
    pub saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingStore {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            world,
            fail: false,
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.saved.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl ImageStore for RecordingStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Dataset(format!("cannot store {}", key)));
        }
        self.world.log(format!("save:{}", key));
        self.saved.lock().unwrap().push((key.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("mem://{}", key)
    }
}

// ========== 组装 ==========

pub struct Harness {
    pub world: Arc<World>,
    pub launcher: Arc<FakeLauncher>,
    pub solver: Option<Arc<FixedSolver>>,
    pub dataset: Arc<RecordingDataset>,
    pub file: Arc<RecordingFile>,
    pub composer: Arc<RecordingComposer>,
    pub store: Arc<RecordingStore>,
}

impl Harness {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            launcher: Arc::new(FakeLauncher::new(world.clone())),
            solver: Some(Arc::new(FixedSolver::new("ABC123"))),
            dataset: Arc::new(RecordingDataset::default()),
            file: Arc::new(RecordingFile::default()),
            composer: Arc::new(RecordingComposer::default()),
            store: Arc::new(RecordingStore::new(world.clone())),
            world,
        }
    }

    pub fn without_solver(mut self) -> Self {
        self.solver = None;
        self
    }

    pub fn with_failing_dataset(mut self) -> Self {
        self.dataset = Arc::new(RecordingDataset {
            fail: true,
            ..Default::default()
        });
        self
    }

    pub fn with_failing_solver(mut self) -> Self {
        self.solver = Some(Arc::new(FixedSolver::failing()));
        self
    }

    pub fn with_failing_store(mut self) -> Self {
        self.store = Arc::new(RecordingStore {
            fail: true,
            ..RecordingStore::new(self.world.clone())
        });
        self
    }

    pub fn search(&self) -> SearchOrchestrator {
        let solver = self.solver.clone().map(|s| s as Arc<dyn ChallengeSolver>);
        SearchOrchestrator::new(self.launcher.clone(), solver, PORTAL, Timings::instant())
    }

    pub fn extractor(&self, criteria: &SearchCriteria) -> RowExtractor {
        RowExtractor::new(
            criteria.kind(),
            criteria.export_mode,
            Timings::instant(),
            self.composer.clone(),
            self.store.clone(),
            run_date(),
        )
    }

    pub fn driver(&self, criteria: &SearchCriteria) -> PipelineDriver {
        let buffer = ExportBuffer::new(10, self.dataset.clone(), self.file.clone());
        PipelineDriver::new(
            self.search(),
            self.extractor(criteria),
            buffer,
            RetryPolicy::immediate(3),
            10,
        )
    }

    pub fn dataset_batch_sizes(&self) -> Vec<usize> {
        self.dataset.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn dataset_records(&self) -> Vec<Record> {
        self.dataset.batches.lock().unwrap().concat()
    }

    pub fn file_records(&self) -> Vec<Record> {
        self.file.batches.lock().unwrap().concat()
    }
}

// ========== 门户页面构造 ==========

/// 所有模式用到的表单字段
const FORM_FIELDS: &[&str] = &[
    "#txtStartDate",
    "#txtEndDate",
    "#txtPartyName",
    "#txtNameStartDate",
    "#txtNameEndDate",
    "#lstDocTypes",
    "#txtDocTypeStartDate",
    "#txtDocTypeEndDate",
    "#ddlMunicipality",
    "#txtSubdivision",
    "#txtLot",
    "#txtBlock",
    "#txtSection",
    "#txtTownship",
    "#txtRange",
    "#txtInstrumentNumber",
    "#txtBook",
    "#txtPage",
    "#txtMicrofiche",
    "#txtPre1980Number",
    "#lstIndexTypes",
    "#ddlSortOrder",
    "#ddlLegalSortOrder",
];

/// 落地页 + 检索页；`submit` 决定提交后导航到哪里
pub fn add_portal(world: &World, kind: ModeKind, submit: Action) {
    world.add(
        PORTAL,
        Doc::new()
            .el(landing::ACCEPT_TERMS, Element::with_text("I Accept"))
            .el(landing::SEARCH_ENTRY, Element::with_text("Search Records"))
            .on_click(landing::SEARCH_ENTRY, Action::Navigate(SEARCH.to_string())),
    );

    let layout = FormFiller::for_mode(kind).layout();
    let mut search = Doc::new()
        .el(landing::SIDEBAR, Element::default())
        .el(layout.tab, Element::with_text(kind.name()))
        .el(captcha::IMAGE_HINTS[0], Element::with_image(b"captcha-png"))
        .el(captcha::INPUT_HINTS[0], Element::default())
        .el(layout.search_button, Element::with_text("Search"));
    for field in FORM_FIELDS {
        search = search.el(*field, Element::default());
    }
    search = match kind.submit_style() {
        SubmitStyle::FormPost => search.on_submit(submit),
        SubmitStyle::ButtonClick => search.on_click(layout.search_button, submit),
    };
    world.add(SEARCH, search);

    world.add(
        REJECTED,
        Doc::new().el(
            outcome::INCORRECT_VERIFICATION,
            Element::with_text("The verification code is incorrect."),
        ),
    );
    world.add(
        LIMITED,
        Doc::new().el(
            outcome::RESULT_LIMIT,
            Element::with_text("Your search returned more than 1000 results."),
        ),
    );
}

pub const HEADERS: &[&str] = &["File Number", "File Date", "Type", "Book", "Page", "Image"];
pub const IMAGE_COL: usize = 5;

/// 结果表格中的一行
#[derive(Debug, Clone, Default)]
pub struct GridRow {
    pub number: String,
    pub date: String,
    pub doc_type: String,
    pub book: String,
    pub page: String,
    pub detail_url: Option<String>,
    pub image_href: Option<String>,
}

impl GridRow {
    pub fn numbered(n: usize) -> Self {
        Self {
            number: format!("2024{:06}", n),
            date: "03/01/2024".to_string(),
            doc_type: "DEED".to_string(),
            book: format!("{}", 100 + n),
            page: format!("{}", n * 3),
            detail_url: Some(detail_url(n)),
            image_href: None,
        }
    }
}

pub fn detail_url(n: usize) -> String {
    format!("https://portal.test/detail/{}", n)
}

pub fn results_doc(table: &str, rows: &[GridRow]) -> Doc {
    let mut doc = Doc::new()
        .el(table, Element::default())
        .els(
            grid::header_cells(table),
            HEADERS.iter().map(|h| Element::with_text(*h)).collect(),
        )
        .els(grid::rows(table), rows.iter().map(|_| Element::default()).collect());

    for (idx, row) in rows.iter().enumerate() {
        let r = idx + 1;
        let cells = [&row.number, &row.date, &row.doc_type, &row.book, &row.page];
        doc = doc.el(grid::row(table, r), Element::default());
        for (col, value) in cells.iter().enumerate() {
            doc = doc.el(grid::cell(table, r, col), Element::with_text(value.as_str()));
        }
        if let Some(url) = &row.detail_url {
            doc = doc
                .el(grid::detail_link(table, r), Element::with_text("View").attr("href", url.as_str()))
                .on_click(grid::detail_link(table, r), Action::Navigate(url.clone()));
        }
        if let Some(href) = &row.image_href {
            doc = doc.el(
                grid::image_trigger(table, r, IMAGE_COL),
                Element::with_text("Image").attr("href", href.as_str()),
            );
        }
    }
    doc
}

/// 自定义表头的结果表格，只有单元格文本
pub fn table_doc(table: &str, headers: &[&str], rows: &[&[&str]]) -> Doc {
    let mut doc = Doc::new()
        .el(table, Element::default())
        .els(
            grid::header_cells(table),
            headers.iter().map(|h| Element::with_text(*h)).collect(),
        )
        .els(grid::rows(table), rows.iter().map(|_| Element::default()).collect());
    for (idx, cells) in rows.iter().enumerate() {
        let r = idx + 1;
        doc = doc.el(grid::row(table, r), Element::default());
        for (col, value) in cells.iter().enumerate() {
            doc = doc.el(grid::cell(table, r, col), Element::with_text(*value));
        }
    }
    doc
}

pub fn detail_doc(fields: &[(&str, &str)]) -> Doc {
    let mut doc = Doc::new().el(detail::CONTAINER, Element::default()).els(
        detail::ROWS,
        fields.iter().map(|_| Element::default()).collect(),
    );
    for (idx, (label, value)) in fields.iter().enumerate() {
        doc = doc
            .el(detail::label(idx + 1), Element::with_text(*label))
            .el(detail::value(idx + 1), Element::with_text(*value));
    }
    doc
}

/// 详情页：缺少详情容器，等待必然超时
pub fn broken_detail_doc() -> Doc {
    Doc::new().el("#errorPanel", Element::with_text("Loading..."))
}

/// 在 `scope` 中注册一个 n 页的直接查看器，第一页地址为 `base`
pub fn add_viewer<P: AsRef<[u8]>>(world: &World, base: &str, scope: &Scope, pages: &[P]) {
    let url_of = |i: usize| {
        if i == 1 {
            base.to_string()
        } else {
            format!("{}?p={}", base, i)
        }
    };
    let total = pages.len();
    for (idx, bytes) in pages.iter().enumerate() {
        let i = idx + 1;
        let mut doc = Doc::new()
            .el_in(scope, viewer::PAGE_IMAGE, Element::with_image(bytes.as_ref()))
            .el_in(scope, viewer::NEXT_PAGE, Element::with_text("Next"));
        if let Scope::Frame(_) = scope {
            doc = doc.frame(scope.clone());
        }
        if i < total {
            doc = doc.on_click_in(scope, viewer::NEXT_PAGE, 0, Action::Navigate(url_of(i + 1)));
        } else {
            doc = doc.el_in(scope, viewer::NEXT_DISABLED, Element::default());
        }
        world.add(&url_of(i), doc);
    }
}
