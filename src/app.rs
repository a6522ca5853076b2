use ratatui::widgets::ListState;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use crate::client::{BackendClient, Generation};
use crate::preview::Preview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Preview,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Files,
    Output,
    Instruction,
}

pub const GENERATE_FAILED: &str = "Generation failed. Check the backend and try again.";
pub const REFINE_FAILED: &str = "Failed to update the code. Try again.";

/// Rotating status lines shown while a request is in flight. Purely
/// cosmetic; the backend reports no progress.
pub const STATUS_STEPS: &[&str] = &[
    "Uploading sketch...",
    "Analyzing the design...",
    "Detecting layout structure...",
    "Writing styles...",
    "Polishing interactions...",
];

// 300ms ticks: next status line every 1.5s, "Copied" flash for ~2s.
const STATUS_TICKS_PER_STEP: u8 = 5;
const COPIED_FLASH_TICKS: u8 = 7;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

type ExchangeTask = JoinHandle<anyhow::Result<Generation>>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub active_tab: Tab,

    // Sketch picker
    pub image_files: Vec<PathBuf>,
    pub file_state: ListState,

    // Current artifact and pending instruction
    pub artifact: String,
    pub instruction: String,
    pub instruction_cursor: usize,
    pub model: Option<String>,
    pub error: Option<String>,

    // In-flight exchanges; `busy()` is derived from these
    pub generate_task: Option<ExchangeTask>,
    pub refine_task: Option<ExchangeTask>,

    // Cosmetic timer state
    pub status_step: usize,
    status_ticks: u8,
    pub copied_ticks: u8,

    // Output panes
    pub code_scroll: u16,
    pub preview_scroll: u16,
    pub preview: Preview,

    pub client: BackendClient,
}

impl App {
    pub fn new(client: BackendClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Files,
            active_tab: Tab::Preview,

            image_files: Vec::new(),
            file_state: ListState::default(),

            artifact: String::new(),
            instruction: String::new(),
            instruction_cursor: 0,
            model: None,
            error: None,

            generate_task: None,
            refine_task: None,

            status_step: 0,
            status_ticks: 0,
            copied_ticks: 0,

            code_scroll: 0,
            preview_scroll: 0,
            preview: Preview::new(),

            client,
        }
    }

    /// Populate the sketch picker with image files from `dir`.
    pub fn scan_images(&mut self, dir: &Path) {
        self.image_files.clear();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                if path.is_file() && IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                    self.image_files.push(path);
                }
            }
        }
        self.image_files.sort();
        if self.image_files.is_empty() {
            self.file_state.select(None);
        } else if self.file_state.selected().is_none() {
            self.file_state.select(Some(0));
        }
    }

    pub fn selected_image(&self) -> Option<&PathBuf> {
        self.file_state
            .selected()
            .and_then(|i| self.image_files.get(i))
    }

    /// One in-flight exchange at a time, across both operation kinds.
    pub fn busy(&self) -> bool {
        self.generate_task.is_some() || self.refine_task.is_some()
    }

    pub fn can_generate(&self) -> bool {
        !self.busy() && self.selected_image().is_some()
    }

    pub fn can_refine(&self) -> bool {
        !self.busy() && !self.artifact.is_empty() && !self.instruction.trim().is_empty()
    }

    // --- Exchange transitions ---

    pub fn begin_generate(&mut self, task: ExchangeTask) {
        self.generate_task = Some(task);
        self.error = None;
        self.status_step = 0;
        self.status_ticks = 0;
        self.active_tab = Tab::Preview;
    }

    pub fn complete_generate(&mut self, generation: Generation) {
        self.generate_task = None;
        self.replace_artifact(generation);
    }

    /// Failure keeps the prior artifact untouched.
    pub fn fail_generate(&mut self) {
        self.generate_task = None;
        self.error = Some(GENERATE_FAILED.to_string());
    }

    pub fn begin_refine(&mut self, task: ExchangeTask) {
        self.refine_task = Some(task);
        self.error = None;
        self.status_step = 0;
        self.status_ticks = 0;
    }

    pub fn complete_refine(&mut self, generation: Generation) {
        self.refine_task = None;
        self.replace_artifact(generation);
        self.instruction.clear();
        self.instruction_cursor = 0;
    }

    /// Failure keeps both the artifact and the typed instruction.
    pub fn fail_refine(&mut self) {
        self.refine_task = None;
        self.error = Some(REFINE_FAILED.to_string());
    }

    fn replace_artifact(&mut self, generation: Generation) {
        self.artifact = generation.html;
        self.model = generation.model;
        self.error = None;
        self.code_scroll = 0;
        self.preview_scroll = 0;
        self.preview.render(&self.artifact);
    }

    // --- Cosmetic timer ---

    pub fn tick(&mut self) {
        if self.busy() {
            self.status_ticks += 1;
            if self.status_ticks >= STATUS_TICKS_PER_STEP {
                self.status_ticks = 0;
                self.status_step = (self.status_step + 1) % STATUS_STEPS.len();
            }
        }
        self.copied_ticks = self.copied_ticks.saturating_sub(1);
    }

    pub fn status_line(&self) -> &'static str {
        STATUS_STEPS[self.status_step]
    }

    pub fn ellipsis(&self) -> &'static str {
        match self.status_ticks % 3 {
            0 => ".",
            1 => "..",
            _ => "...",
        }
    }

    pub fn flash_copied(&mut self) {
        self.copied_ticks = COPIED_FLASH_TICKS;
    }

    // --- Navigation ---

    pub fn file_nav_down(&mut self) {
        let len = self.image_files.len();
        if len > 0 {
            let i = self.file_state.selected().unwrap_or(0);
            self.file_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn file_nav_up(&mut self) {
        let i = self.file_state.selected().unwrap_or(0);
        self.file_state.select(Some(i.saturating_sub(1)));
    }

    pub fn toggle_tab(&mut self) {
        self.active_tab = match self.active_tab {
            Tab::Preview => Tab::Code,
            Tab::Code => Tab::Preview,
        };
    }

    pub fn scroll_output_down(&mut self) {
        match self.active_tab {
            Tab::Preview => self.preview_scroll = self.preview_scroll.saturating_add(1),
            Tab::Code => self.code_scroll = self.code_scroll.saturating_add(1),
        }
    }

    pub fn scroll_output_up(&mut self) {
        match self.active_tab {
            Tab::Preview => self.preview_scroll = self.preview_scroll.saturating_sub(1),
            Tab::Code => self.code_scroll = self.code_scroll.saturating_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(BackendClient::new("http://localhost:8000"))
    }

    fn generation(html: &str) -> Generation {
        Generation {
            html: html.to_string(),
            model: Some("gemini-2.5-pro".to_string()),
        }
    }

    #[test]
    fn generate_requires_a_selected_image() {
        let app = test_app();
        assert!(app.selected_image().is_none());
        assert!(!app.can_generate());
    }

    #[test]
    fn refine_requires_artifact_and_instruction() {
        let mut app = test_app();
        assert!(!app.can_refine());

        app.artifact = "<p>a</p>".to_string();
        assert!(!app.can_refine());

        app.instruction = "   ".to_string();
        assert!(!app.can_refine());

        app.instruction = "make it bold".to_string();
        assert!(app.can_refine());
    }

    #[test]
    fn successful_generate_replaces_artifact_exactly() {
        let mut app = test_app();
        app.complete_generate(generation("<h1>Hi</h1>"));
        assert_eq!(app.artifact, "<h1>Hi</h1>");
        assert_eq!(app.model.as_deref(), Some("gemini-2.5-pro"));
        assert!(app.error.is_none());
        assert!(app.preview.surface().is_some());
    }

    #[test]
    fn failed_generate_keeps_prior_artifact_and_sets_error() {
        let mut app = test_app();
        app.artifact = "<h1>old</h1>".to_string();
        app.fail_generate();
        assert_eq!(app.artifact, "<h1>old</h1>");
        assert_eq!(app.error.as_deref(), Some(GENERATE_FAILED));
    }

    #[test]
    fn successful_refine_clears_instruction() {
        let mut app = test_app();
        app.artifact = "<p>a</p>".to_string();
        app.instruction = "make it bold".to_string();
        app.instruction_cursor = 3;

        app.complete_refine(generation("<p><b>a</b></p>"));
        assert_eq!(app.artifact, "<p><b>a</b></p>");
        assert!(app.instruction.is_empty());
        assert_eq!(app.instruction_cursor, 0);
        assert!(app.error.is_none());
    }

    #[test]
    fn failed_refine_preserves_instruction_and_artifact() {
        let mut app = test_app();
        app.artifact = "<p>a</p>".to_string();
        app.instruction = "make it bold".to_string();

        app.fail_refine();
        assert_eq!(app.artifact, "<p>a</p>");
        assert_eq!(app.instruction, "make it bold");
        assert_eq!(app.error.as_deref(), Some(REFINE_FAILED));
    }

    #[test]
    fn success_clears_a_previous_error() {
        let mut app = test_app();
        app.fail_generate();
        assert!(app.error.is_some());
        app.complete_generate(generation("<p>ok</p>"));
        assert!(app.error.is_none());
    }

    #[tokio::test]
    async fn busy_lock_covers_both_operations() {
        let mut app = test_app();
        app.artifact = "<p>a</p>".to_string();
        app.instruction = "x".to_string();
        app.image_files.push(PathBuf::from("sketch.png"));
        app.file_state.select(Some(0));

        assert!(app.can_generate());
        assert!(app.can_refine());

        let task = tokio::spawn(async { Ok(generation("<p>b</p>")) });
        app.begin_generate(task);
        assert!(app.busy());
        assert!(!app.can_generate());
        assert!(!app.can_refine());

        if let Some(task) = app.generate_task.take() {
            let settled = task.await.unwrap().unwrap();
            app.complete_generate(settled);
        }
        assert!(!app.busy());
        assert_eq!(app.artifact, "<p>b</p>");
    }

    #[tokio::test]
    async fn status_rotation_wraps_and_only_runs_while_busy() {
        let mut app = test_app();
        for _ in 0..20 {
            app.tick();
        }
        assert_eq!(app.status_step, 0);

        let task = tokio::spawn(async { Ok(generation("<p>x</p>")) });
        app.begin_refine(task);
        app.tick();
        assert_eq!(app.status_step, 0);
        for _ in 1..STATUS_TICKS_PER_STEP as usize * STATUS_STEPS.len() {
            app.tick();
        }
        assert_eq!(app.status_step, 0);
        app.refine_task = None;
    }
}
