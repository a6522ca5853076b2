//! Sandboxed preview renderer.
//!
//! Artifact HTML is untrusted AI output. It is never executed with host
//! privileges: structure is parsed into a styled text snapshot for the
//! preview pane, and inline scripts run inside a dedicated `boa_engine`
//! context on a worker thread. The context is seeded with a shadow
//! `document` built from the parsed markup and has no bindings to the host
//! filesystem, network, environment, or process state.

use scraper::{ElementRef, Html, Node, Selector};
use std::sync::mpsc;
use std::thread;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PreviewError>;

#[derive(Error, Debug)]
pub enum PreviewError {
    /// The surface worker exited; the surface must be rebuilt.
    #[error("sandbox worker is no longer running")]
    SandboxGone,
}

/// Runtime limits applied to artifact scripts so a hostile or buggy
/// document cannot wedge the worker.
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub loop_iterations: u64,
    pub recursion_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            loop_iterations: 1_000_000,
            recursion_depth: 1024,
        }
    }
}

/// Result of evaluating a script inside the sandbox. Script failures are
/// values, not renderer errors.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub value: String,
    pub is_error: bool,
}

struct ScriptJob {
    code: String,
    resp: mpsc::Sender<ScriptOutcome>,
}

/// One isolated script context on its own worker thread.
///
/// Dropping the sandbox closes the job channel and joins the worker, so the
/// backing thread is released deterministically when a surface is superseded
/// or torn down.
pub struct Sandbox {
    tx: Option<mpsc::Sender<ScriptJob>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Sandbox {
    fn spawn(seed: String, limits: SandboxLimits) -> Self {
        let (tx, rx) = mpsc::channel::<ScriptJob>();

        let worker = thread::spawn(move || {
            let mut ctx = boa_engine::Context::default();
            if limits.loop_iterations > 0 {
                ctx.runtime_limits_mut()
                    .set_loop_iteration_limit(limits.loop_iterations);
            }
            if limits.recursion_depth < usize::MAX {
                ctx.runtime_limits_mut()
                    .set_recursion_limit(limits.recursion_depth);
            }

            // Shadow document runs first. No host globals are registered.
            let _ = ctx.eval(boa_engine::Source::from_bytes(seed.as_bytes()));

            while let Ok(job) = rx.recv() {
                let outcome = match ctx.eval(boa_engine::Source::from_bytes(job.code.as_bytes())) {
                    Ok(val) => {
                        let value = val
                            .to_string(&mut ctx)
                            .map(|s| s.to_std_string_escaped())
                            .unwrap_or_else(|_| format!("{}", val.display()));
                        ScriptOutcome {
                            value,
                            is_error: false,
                        }
                    }
                    Err(e) => ScriptOutcome {
                        value: format!("Script thrown: {}", e),
                        is_error: true,
                    },
                };
                let _ = job.resp.send(outcome);
            }
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Evaluate a script in the sandboxed context and wait for its outcome.
    pub fn eval(&self, code: &str) -> Result<ScriptOutcome> {
        let tx = self.tx.as_ref().ok_or(PreviewError::SandboxGone)?;
        let (resp_tx, resp_rx) = mpsc::channel();
        tx.send(ScriptJob {
            code: code.to_string(),
            resp: resp_tx,
        })
        .map_err(|_| PreviewError::SandboxGone)?;
        resp_rx.recv().map_err(|_| PreviewError::SandboxGone)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Kind of a rendered preview line; `ui.rs` maps kinds to styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Paragraph,
    Bullet,
    Link,
    Field,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLine {
    pub kind: LineKind,
    pub text: String,
}

/// Host-side parse of the artifact: what the preview pane draws.
#[derive(Debug, Clone, Default)]
pub struct DocSnapshot {
    pub title: String,
    pub body_text: String,
    pub lines: Vec<PreviewLine>,
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn snapshot(markup: &str) -> DocSnapshot {
    let document = Html::parse_document(markup);

    let title_sel = Selector::parse("title").unwrap();
    let body_sel = Selector::parse("body").unwrap();

    let title = document
        .select(&title_sel)
        .next()
        .map(|n| collapse_ws(&n.text().collect::<String>()))
        .unwrap_or_default();

    let mut lines = Vec::new();
    let mut body_text = String::new();
    if let Some(body) = document.select(&body_sel).next() {
        body_text = collapse_ws(&body.text().collect::<String>());
        walk(body, &mut lines);
    }

    DocSnapshot {
        title,
        body_text,
        lines,
    }
}

fn push_line(lines: &mut Vec<PreviewLine>, kind: LineKind, text: String) {
    if !text.is_empty() || kind == LineKind::Rule {
        lines.push(PreviewLine { kind, text });
    }
}

fn walk(el: ElementRef, lines: &mut Vec<PreviewLine>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => {
                let text = collapse_ws(t);
                push_line(lines, LineKind::Paragraph, text);
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    dispatch(child_el, lines);
                }
            }
            _ => {}
        }
    }
}

fn dispatch(el: ElementRef, lines: &mut Vec<PreviewLine>) {
    let tag = el.value().name();
    match tag {
        // Never rendered as content; scripts run in the sandbox instead.
        "script" | "style" | "noscript" | "template" | "head" => {}
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag.as_bytes()[1] - b'0';
            let text = collapse_ws(&el.text().collect::<String>());
            push_line(lines, LineKind::Heading(level), text);
        }
        "p" | "blockquote" | "pre" => {
            let text = collapse_ws(&el.text().collect::<String>());
            push_line(lines, LineKind::Paragraph, text);
        }
        "li" => {
            let text = collapse_ws(&el.text().collect::<String>());
            push_line(lines, LineKind::Bullet, text);
        }
        "a" => {
            let text = collapse_ws(&el.text().collect::<String>());
            push_line(lines, LineKind::Link, text);
        }
        "button" => {
            let text = collapse_ws(&el.text().collect::<String>());
            push_line(lines, LineKind::Field, format!("[ {} ]", text));
        }
        "input" | "textarea" | "select" => {
            let label = el
                .value()
                .attr("placeholder")
                .or_else(|| el.value().attr("value"))
                .or_else(|| el.value().attr("name"))
                .unwrap_or("");
            push_line(lines, LineKind::Field, format!("[{}_]", label));
        }
        "img" => {
            let alt = el.value().attr("alt").unwrap_or("image");
            push_line(lines, LineKind::Field, format!("[{}]", alt));
        }
        "hr" => push_line(lines, LineKind::Rule, String::new()),
        "br" => {}
        _ => walk(el, lines),
    }
}

fn inline_scripts(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let script_sel = Selector::parse("script").unwrap();
    document
        .select(&script_sel)
        .filter(|el| el.value().attr("src").is_none())
        .map(|el| el.text().collect::<String>())
        .filter(|code| !code.trim().is_empty())
        .collect()
}

fn shadow_document(snapshot: &DocSnapshot) -> String {
    let title = serde_json::to_string(&snapshot.title).unwrap_or_else(|_| "\"\"".to_string());
    let body = serde_json::to_string(&snapshot.body_text).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "var document = {{ title: {}, body: {{ textContent: {} }} }}; var window = {{ document: document }};",
        title, body
    )
}

// 64-bit FNV-1a over the markup bytes.
fn fingerprint(markup: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in markup.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// One live rendering of one artifact string: the parsed snapshot plus the
/// sandbox its inline scripts ran in.
pub struct Surface {
    id: u64,
    fingerprint: u64,
    snapshot: DocSnapshot,
    sandbox: Sandbox,
}

impl Surface {
    fn build(id: u64, markup: &str, limits: SandboxLimits) -> Self {
        let snapshot = snapshot(markup);
        let sandbox = Sandbox::spawn(shadow_document(&snapshot), limits);

        // Inline scripts run once, in document order. Failures (including
        // scripts stopped by the runtime limits) settle as outcome values.
        for code in inline_scripts(markup) {
            let _ = sandbox.eval(&code);
        }

        Self {
            id,
            fingerprint: fingerprint(markup),
            snapshot,
            sandbox,
        }
    }

    /// Monotonically increasing per `Preview`; stable across identical
    /// re-renders.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn snapshot(&self) -> &DocSnapshot {
        &self.snapshot
    }

    /// Run a script in this surface's sandbox (interactivity demos).
    pub fn eval(&self, code: &str) -> Result<ScriptOutcome> {
        self.sandbox.eval(code)
    }
}

/// Owns at most one surface and handles supersession: the previous surface's
/// worker is joined before a replacement is built.
pub struct Preview {
    surface: Option<Surface>,
    limits: SandboxLimits,
    next_id: u64,
}

impl Preview {
    pub fn new() -> Self {
        Self::with_limits(SandboxLimits::default())
    }

    pub fn with_limits(limits: SandboxLimits) -> Self {
        Self {
            surface: None,
            limits,
            next_id: 0,
        }
    }

    /// Render a markup string. Empty input clears the surface; identical
    /// input keeps the current surface untouched.
    pub fn render(&mut self, markup: &str) {
        if markup.is_empty() {
            self.surface = None;
            return;
        }

        let print = fingerprint(markup);
        if let Some(surface) = &self.surface {
            if surface.fingerprint == print {
                return;
            }
        }

        // Release the old worker before the new surface exists.
        self.surface = None;
        self.next_id += 1;
        self.surface = Some(Surface::build(self.next_id, markup, self.limits));
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn clear(&mut self) {
        self.surface = None;
    }
}

impl Default for Preview {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_markup_renders_nothing() {
        let mut preview = Preview::new();
        preview.render("");
        assert!(preview.surface().is_none());

        preview.render("<h1>x</h1>");
        assert!(preview.surface().is_some());
        preview.render("");
        assert!(preview.surface().is_none());
    }

    #[test]
    fn identical_markup_keeps_the_same_surface() {
        let mut preview = Preview::new();
        for _ in 0..10 {
            preview.render("<h1>Hi</h1>");
        }
        // One surface (and one worker) total, not ten.
        assert_eq!(preview.surface().unwrap().id(), 1);
    }

    #[test]
    fn changed_markup_replaces_the_surface() {
        let mut preview = Preview::new();
        preview.render("<h1>a</h1>");
        assert_eq!(preview.surface().unwrap().id(), 1);
        preview.render("<h1>b</h1>");
        assert_eq!(preview.surface().unwrap().id(), 2);
        assert_eq!(preview.surface().unwrap().snapshot().lines[0].text, "b");
    }

    #[test]
    fn scripts_mutate_the_sandbox_not_the_host() {
        let mut preview = Preview::new();
        preview.render(
            "<html><head><title>host</title></head>\
             <body><script>document.title='x'</script></body></html>",
        );
        let surface = preview.surface().unwrap();

        // Host-side parse is untouched by the script.
        assert_eq!(surface.snapshot().title, "host");
        // The mutation happened inside the sandbox only.
        let outcome = surface.eval("document.title").unwrap();
        assert!(!outcome.is_error);
        assert_eq!(outcome.value, "x");
    }

    #[test]
    fn runaway_script_is_contained_by_limits() {
        let mut preview = Preview::with_limits(SandboxLimits {
            loop_iterations: 1_000,
            recursion_depth: 64,
        });
        preview.render("<body><script>while(true){}</script></body>");
        let surface = preview.surface().unwrap();

        // The worker survives the aborted loop and keeps answering.
        let outcome = surface.eval("1+1").unwrap();
        assert!(!outcome.is_error);
        assert_eq!(outcome.value, "2");
    }

    #[test]
    fn script_errors_are_values_not_failures() {
        let mut preview = Preview::new();
        preview.render("<body><p>ok</p></body>");
        let outcome = preview.surface().unwrap().eval("nope()").unwrap();
        assert!(outcome.is_error);
    }

    #[test]
    fn snapshot_extracts_structure() {
        let mut preview = Preview::new();
        preview.render(
            "<html><body>\
             <h1>Title</h1>\
             <p>Some  spaced   text</p>\
             <ul><li>one</li><li>two</li></ul>\
             <a href=\"#\">a link</a>\
             <button>Go</button>\
             <script>1</script>\
             </body></html>",
        );
        let lines = &preview.surface().unwrap().snapshot().lines;
        assert_eq!(
            lines[0],
            PreviewLine {
                kind: LineKind::Heading(1),
                text: "Title".to_string()
            }
        );
        assert_eq!(lines[1].text, "Some spaced text");
        assert_eq!(lines[2].kind, LineKind::Bullet);
        assert_eq!(lines[3].text, "two");
        assert_eq!(lines[4].kind, LineKind::Link);
        assert_eq!(lines[5].text, "[ Go ]");
        // Script bodies never appear as content.
        assert!(lines.iter().all(|l| l.text != "1"));
    }
}
