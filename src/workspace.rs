//! Per-client view-state.
//!
//! A `Workspace` holds one uploaded document, its rendered canvas and the
//! extraction history. Workspaces live in the `WorkspaceRegistry`, keyed by
//! UUID. Model operations are serialized per activity by `OperationGate`.
//!
//! Lifecycle: LOAD → (PAGE | ZOOM | CROP | RESTORE)* → EXTRACT → QAC → EXPORT

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::pipeline::ocr::{DetectedImage, OcrOutcome, ProgressSink};
use crate::pipeline::parse::{QacFix, QacResult};
use crate::pipeline::render::{
    crop_bitmap, detect_file_kind, load_image_canvas, CropRect, FileKind, PageBitmap,
    PdfPageRenderer, RenderError, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM,
};

/// Maximum number of live workspaces.
const DEFAULT_MAX_WORKSPACES: usize = 32;

static EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.[^/.]+$").unwrap());

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Workspace not found: {0}")]
    NotFound(Uuid),
    #[error("Maximum open workspaces reached ({0})")]
    TooMany(usize),
    #[error("{0} is already running for this workspace")]
    Busy(Activity),
    #[error("No text available for quality assurance check.")]
    NoExtraction,
    #[error("Detected image not found: {0}")]
    ImageNotFound(String),
    #[error("Document has no pages")]
    EmptyDocument,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Export failed: {0}")]
    Export(String),
    #[error("Workspace lock poisoned")]
    LockPoisoned,
}

// ═══════════════════════════════════════════════════════════
// Activities & OperationGate
// ═══════════════════════════════════════════════════════════

/// Independent kinds of work a workspace reports progress for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Ocr,
    Qac,
    Image,
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ocr => write!(f, "Text extraction"),
            Self::Qac => write!(f, "Quality assurance check"),
            Self::Image => write!(f, "Image processing"),
        }
    }
}

/// Last reported state of one activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityStatus {
    pub progress: u8,
    pub status: String,
    pub busy: bool,
}

/// One running operation per activity; progress recorded per activity.
#[derive(Default)]
pub struct OperationGate {
    activities: Mutex<HashMap<Activity, ActivityStatus>>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `activity`. Fails with `Busy` while another permit holds it.
    pub fn try_begin(self: &Arc<Self>, activity: Activity) -> Result<OperationPermit, WorkspaceError> {
        let mut activities = self
            .activities
            .lock()
            .map_err(|_| WorkspaceError::LockPoisoned)?;
        let entry = activities.entry(activity).or_default();
        if entry.busy {
            return Err(WorkspaceError::Busy(activity));
        }
        entry.busy = true;
        entry.progress = 0;
        Ok(OperationPermit {
            gate: Arc::clone(self),
            activity,
        })
    }

    /// Progress sink for an activity without claiming it.
    pub fn sink(self: &Arc<Self>, activity: Activity) -> ActivitySink {
        ActivitySink {
            gate: Arc::clone(self),
            activity,
        }
    }

    pub fn report(&self, activity: Activity, percent: u8, status: &str) {
        if let Ok(mut activities) = self.activities.lock() {
            let entry = activities.entry(activity).or_default();
            entry.progress = percent.min(100);
            entry.status = status.to_string();
        }
    }

    pub fn is_busy(&self, activity: Activity) -> bool {
        self.activities
            .lock()
            .map(|a| a.get(&activity).is_some_and(|s| s.busy))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> BTreeMap<Activity, ActivityStatus> {
        self.activities
            .lock()
            .map(|a| a.iter().map(|(k, v)| (*k, v.clone())).collect())
            .unwrap_or_default()
    }

    fn finish(&self, activity: Activity) {
        if let Ok(mut activities) = self.activities.lock() {
            if let Some(entry) = activities.get_mut(&activity) {
                entry.busy = false;
            }
        }
    }
}

/// RAII claim on an activity. Dropping it frees the activity.
pub struct OperationPermit {
    gate: Arc<OperationGate>,
    activity: Activity,
}

impl OperationPermit {
    pub fn activity(&self) -> Activity {
        self.activity
    }
}

impl ProgressSink for OperationPermit {
    fn report(&self, percent: u8, status: &str) {
        self.gate.report(self.activity, percent, status);
    }
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.gate.finish(self.activity);
    }
}

pub struct ActivitySink {
    gate: Arc<OperationGate>,
    activity: Activity,
}

impl ProgressSink for ActivitySink {
    fn report(&self, percent: u8, status: &str) {
        self.gate.report(self.activity, percent, status);
    }
}

// ═══════════════════════════════════════════════════════════
// Extraction records
// ═══════════════════════════════════════════════════════════

/// One extraction of one page, optionally refined by QAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub text: String,
    pub math_equations: Vec<String>,
    pub page_number: usize,
    pub confidence: u8,
    pub extraction_method: String,
    pub file_name: String,
    pub file_type: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qac_text: Option<String>,
    pub qac_fixes: Vec<QacFix>,
    #[serde(rename = "isQACProcessed")]
    pub is_qac_processed: bool,
    pub detected_images: Vec<DetectedImage>,
    /// Position in the workspace's extraction order.
    #[serde(skip)]
    pub sequence: u64,
}

impl ExtractedContent {
    /// QAC text when the extraction was refined, the raw text otherwise.
    pub fn best_text(&self) -> &str {
        match (&self.qac_text, self.is_qac_processed) {
            (Some(qac), true) if !qac.is_empty() => qac,
            _ => &self.text,
        }
    }

    /// Plain-text report used for copy and export.
    pub fn report(&self) -> String {
        let location = match self.file_type {
            FileKind::Pdf => format!("Page {}", self.page_number),
            FileKind::Image => "Image".to_string(),
        };
        let qac_line = if self.is_qac_processed {
            "Advanced QAC Processed: Yes\n"
        } else {
            ""
        };
        format!(
            "{} - {}\nMethod: {}\nConfidence: {}%\n{}\nExtracted Text:\n{}",
            self.file_name,
            location,
            self.extraction_method,
            self.confidence,
            qac_line,
            self.best_text()
        )
    }

    /// `ocr-results-<name without extension>.txt`
    pub fn export_file_name(&self) -> String {
        let base = self
            .file_name
            .rsplit(&['/', '\\'][..])
            .next()
            .unwrap_or_default();
        format!("ocr-results-{}.txt", EXTENSION.replace(base, ""))
    }
}

// ═══════════════════════════════════════════════════════════
// Workspace
// ═══════════════════════════════════════════════════════════

/// Summary returned by the workspace endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: FileKind,
    pub page_count: usize,
    pub current_page: usize,
    pub zoom: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub is_cropped: bool,
    pub extraction_count: usize,
    pub current_extraction: Option<ExtractedContent>,
    pub activities: BTreeMap<Activity, ActivityStatus>,
    pub created_at: String,
}

/// Identity and text of the extraction a QAC pass was started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QacTarget {
    pub sequence: u64,
    pub page_number: usize,
    pub text: String,
}

fn mark_qac(content: &mut ExtractedContent, result: QacResult) {
    content.qac_text = Some(result.corrected_text);
    content.qac_fixes = result.fixes;
    content.is_qac_processed = true;
}

pub struct Workspace {
    id: Uuid,
    file_name: String,
    kind: FileKind,
    bytes: Vec<u8>,
    page_count: usize,
    current_page: usize,
    zoom: u32,
    /// Canvas as rendered, before any crop.
    original: PageBitmap,
    canvas: PageBitmap,
    extractions: Vec<ExtractedContent>,
    current: Option<ExtractedContent>,
    next_sequence: u64,
    created_at: String,
    renderer: Arc<dyn PdfPageRenderer>,
}

impl Workspace {
    /// Detect the document kind and render its first page.
    pub fn load(
        file_name: &str,
        bytes: Vec<u8>,
        renderer: Arc<dyn PdfPageRenderer>,
    ) -> Result<Self, WorkspaceError> {
        let kind = detect_file_kind(&bytes, file_name)?;
        let page_count = match kind {
            FileKind::Pdf => renderer.page_count(&bytes)?,
            FileKind::Image => 1,
        };
        if page_count == 0 {
            return Err(WorkspaceError::EmptyDocument);
        }

        let canvas = render_canvas(renderer.as_ref(), kind, &bytes, 1, DEFAULT_ZOOM)?;
        info!(
            file_name,
            kind = %kind,
            page_count,
            bytes = bytes.len(),
            width = canvas.width,
            height = canvas.height,
            "Document loaded"
        );

        Ok(Self {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            kind,
            bytes,
            page_count,
            current_page: 1,
            zoom: DEFAULT_ZOOM,
            original: canvas.clone(),
            canvas,
            extractions: Vec::new(),
            current: None,
            next_sequence: 1,
            created_at: chrono::Utc::now().to_rfc3339(),
            renderer,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn canvas(&self) -> &PageBitmap {
        &self.canvas
    }

    pub fn original_canvas(&self) -> &PageBitmap {
        &self.original
    }

    pub fn is_cropped(&self) -> bool {
        self.canvas != self.original
    }

    /// Go to `page` (1-based). Returns `false` when the request was ignored:
    /// single-page images, or a page outside `1..=page_count`.
    pub fn change_page(&mut self, page: i64) -> Result<bool, WorkspaceError> {
        if self.kind != FileKind::Pdf {
            return Ok(false);
        }
        let Some(page) = usize::try_from(page)
            .ok()
            .filter(|p| (1..=self.page_count).contains(p))
        else {
            debug!(page, page_count = self.page_count, "Page change ignored");
            return Ok(false);
        };

        let canvas = self.render(page, self.zoom)?;
        self.current_page = page;
        self.set_rendered(canvas);
        Ok(true)
    }

    /// Set zoom (clamped to `MIN_ZOOM..=MAX_ZOOM`) and re-render the page.
    ///
    /// Images are reloaded unchanged. Either way any crop is discarded.
    pub fn set_zoom(&mut self, zoom: i64) -> Result<u32, WorkspaceError> {
        let zoom = zoom.clamp(MIN_ZOOM as i64, MAX_ZOOM as i64) as u32;
        let canvas = self.render(self.current_page, zoom)?;
        self.zoom = zoom;
        self.set_rendered(canvas);
        Ok(zoom)
    }

    /// Replace the canvas with `rect` of the current canvas.
    pub fn crop(&mut self, rect: CropRect) -> Result<(), WorkspaceError> {
        let cropped = crop_bitmap(&self.canvas, rect)?;
        debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "Canvas cropped"
        );
        self.canvas = cropped;
        Ok(())
    }

    /// Undo every crop since the page was last rendered.
    pub fn restore_original(&mut self) {
        self.canvas = self.original.clone();
    }

    /// Append an extraction for `page_number` and make it current.
    pub fn record_extraction(&mut self, outcome: OcrOutcome, page_number: usize) -> &ExtractedContent {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let content = ExtractedContent {
            text: outcome.fields.text,
            math_equations: outcome.fields.math_equations,
            page_number,
            confidence: outcome.fields.confidence,
            extraction_method: outcome.extraction_method,
            file_name: self.file_name.clone(),
            file_type: self.kind,
            qac_text: None,
            qac_fixes: Vec::new(),
            is_qac_processed: false,
            detected_images: outcome.detected_images,
            sequence,
        };
        self.extractions.push(content.clone());
        self.current.insert(content)
    }

    /// The current extraction as a QAC target.
    pub fn qac_source(&self) -> Result<QacTarget, WorkspaceError> {
        self.current
            .as_ref()
            .filter(|c| !c.text.is_empty())
            .map(|c| QacTarget {
                sequence: c.sequence,
                page_number: c.page_number,
                text: c.text.clone(),
            })
            .ok_or(WorkspaceError::NoExtraction)
    }

    /// Attach a QAC result to the extraction `target` was taken from.
    ///
    /// While that extraction is still current, history entries with its page
    /// number are replaced, never appended to. Once a newer extraction has
    /// become current, only the entries recorded as `target` are updated.
    pub fn apply_qac(
        &mut self,
        target: &QacTarget,
        result: QacResult,
    ) -> Result<ExtractedContent, WorkspaceError> {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|c| c.sequence == target.sequence);

        if is_current {
            let mut current = self.current.take().ok_or(WorkspaceError::NoExtraction)?;
            mark_qac(&mut current, result);
            for item in self
                .extractions
                .iter_mut()
                .filter(|item| item.page_number == current.page_number)
            {
                *item = current.clone();
            }
            self.current = Some(current.clone());
            return Ok(current);
        }

        let mut updated = None;
        for item in self
            .extractions
            .iter_mut()
            .filter(|item| item.sequence == target.sequence)
        {
            mark_qac(item, result.clone());
            updated = Some(item.clone());
        }
        if updated.is_some() {
            info!(
                sequence = target.sequence,
                page = target.page_number,
                "QAC applied to a superseded extraction"
            );
        }
        updated.ok_or(WorkspaceError::NoExtraction)
    }

    pub fn extractions(&self) -> &[ExtractedContent] {
        &self.extractions
    }

    pub fn current_extraction(&self) -> Option<&ExtractedContent> {
        self.current.as_ref()
    }

    /// Detected image of the current extraction.
    pub fn detected_image(&self, image_id: &str) -> Result<&DetectedImage, WorkspaceError> {
        self.current
            .as_ref()
            .and_then(|c| c.detected_images.iter().find(|img| img.id == image_id))
            .ok_or_else(|| WorkspaceError::ImageNotFound(image_id.to_string()))
    }

    /// Apply `update` to the detected image `image_id`, wherever it is stored.
    pub fn update_detected_image<F>(
        &mut self,
        image_id: &str,
        update: F,
    ) -> Result<DetectedImage, WorkspaceError>
    where
        F: Fn(&mut DetectedImage),
    {
        let current = self
            .current
            .as_mut()
            .ok_or_else(|| WorkspaceError::ImageNotFound(image_id.to_string()))?;
        let image = current
            .detected_images
            .iter_mut()
            .find(|img| img.id == image_id)
            .ok_or_else(|| WorkspaceError::ImageNotFound(image_id.to_string()))?;
        update(image);
        let updated = image.clone();

        for item in self.extractions.iter_mut() {
            for img in item.detected_images.iter_mut().filter(|img| img.id == image_id) {
                update(img);
            }
        }
        Ok(updated)
    }

    pub fn set_colorize(&mut self, image_id: &str, checked: bool) -> Result<DetectedImage, WorkspaceError> {
        self.update_detected_image(image_id, |img| img.colorize = checked)
    }

    /// Report for the current extraction.
    pub fn report(&self) -> Option<String> {
        self.current.as_ref().map(ExtractedContent::report)
    }

    /// Write the current report into `dir`. Returns the written path.
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf, WorkspaceError> {
        let current = self.current.as_ref().ok_or(WorkspaceError::NoExtraction)?;
        std::fs::create_dir_all(dir).map_err(|e| WorkspaceError::Export(e.to_string()))?;
        let path = dir.join(current.export_file_name());
        std::fs::write(&path, current.report()).map_err(|e| WorkspaceError::Export(e.to_string()))?;
        info!(path = %path.display(), "Report exported");
        Ok(path)
    }

    pub fn summary(&self, gate: &OperationGate) -> WorkspaceSummary {
        WorkspaceSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            file_type: self.kind,
            page_count: self.page_count,
            current_page: self.current_page,
            zoom: self.zoom,
            canvas_width: self.canvas.width,
            canvas_height: self.canvas.height,
            is_cropped: self.is_cropped(),
            extraction_count: self.extractions.len(),
            current_extraction: self.current.clone(),
            activities: gate.snapshot(),
            created_at: self.created_at.clone(),
        }
    }

    fn render(&self, page: usize, zoom: u32) -> Result<PageBitmap, WorkspaceError> {
        render_canvas(self.renderer.as_ref(), self.kind, &self.bytes, page, zoom)
    }

    fn set_rendered(&mut self, canvas: PageBitmap) {
        self.original = canvas.clone();
        self.canvas = canvas;
    }
}

fn render_canvas(
    renderer: &dyn PdfPageRenderer,
    kind: FileKind,
    bytes: &[u8],
    page: usize,
    zoom: u32,
) -> Result<PageBitmap, WorkspaceError> {
    let canvas = match kind {
        FileKind::Pdf => renderer.render_page(bytes, page - 1, zoom)?,
        FileKind::Image => load_image_canvas(bytes)?,
    };
    Ok(canvas)
}

// ═══════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════

pub struct WorkspaceEntry {
    workspace: RwLock<Workspace>,
    gate: Arc<OperationGate>,
}

impl WorkspaceEntry {
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Workspace>, WorkspaceError> {
        self.workspace.read().map_err(|_| WorkspaceError::LockPoisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Workspace>, WorkspaceError> {
        self.workspace.write().map_err(|_| WorkspaceError::LockPoisoned)
    }

    pub fn gate(&self) -> &Arc<OperationGate> {
        &self.gate
    }

    pub fn summary(&self) -> Result<WorkspaceSummary, WorkspaceError> {
        Ok(self.read()?.summary(&self.gate))
    }
}

/// Live workspaces keyed by id.
pub struct WorkspaceRegistry {
    entries: RwLock<HashMap<Uuid, Arc<WorkspaceEntry>>>,
    renderer: Arc<dyn PdfPageRenderer>,
    max_workspaces: usize,
}

impl WorkspaceRegistry {
    pub fn new(renderer: Arc<dyn PdfPageRenderer>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            renderer,
            max_workspaces: DEFAULT_MAX_WORKSPACES,
        }
    }

    pub fn with_max_workspaces(mut self, max: usize) -> Self {
        self.max_workspaces = max;
        self
    }

    /// Load a document into a new workspace.
    pub fn create(&self, file_name: &str, bytes: Vec<u8>) -> Result<Arc<WorkspaceEntry>, WorkspaceError> {
        if self.len() >= self.max_workspaces {
            return Err(WorkspaceError::TooMany(self.max_workspaces));
        }
        let workspace = Workspace::load(file_name, bytes, Arc::clone(&self.renderer))?;
        let id = workspace.id();
        let entry = Arc::new(WorkspaceEntry {
            workspace: RwLock::new(workspace),
            gate: Arc::new(OperationGate::new()),
        });

        let mut entries = self
            .entries
            .write()
            .map_err(|_| WorkspaceError::LockPoisoned)?;
        if entries.len() >= self.max_workspaces {
            return Err(WorkspaceError::TooMany(self.max_workspaces));
        }
        entries.insert(id, Arc::clone(&entry));
        Ok(entry)
    }

    pub fn get(&self, id: &Uuid) -> Result<Arc<WorkspaceEntry>, WorkspaceError> {
        self.entries
            .read()
            .map_err(|_| WorkspaceError::LockPoisoned)?
            .get(id)
            .cloned()
            .ok_or(WorkspaceError::NotFound(*id))
    }

    pub fn remove(&self, id: &Uuid) -> Result<(), WorkspaceError> {
        self.entries
            .write()
            .map_err(|_| WorkspaceError::LockPoisoned)?
            .remove(id)
            .map(|_| ())
            .ok_or(WorkspaceError::NotFound(*id))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
