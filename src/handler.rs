use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::path::{Path, PathBuf};

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

pub const EXPORT_FILE_NAME: &str = "index.html";

/// Convert a character index to a byte index for UTF-8 safe string edits.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Preview <-> Code
        KeyCode::Tab => app.toggle_tab(),

        // Focus between the sketch list and the output pane
        KeyCode::Char('h') | KeyCode::Left => app.focus = FocusPane::Files,
        KeyCode::Char('l') | KeyCode::Right => app.focus = FocusPane::Output,

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Files => app.file_nav_down(),
            _ => app.scroll_output_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Files => app.file_nav_up(),
            _ => app.scroll_output_up(),
        },

        // Generate from the selected sketch
        KeyCode::Char('g') | KeyCode::Enter => trigger_generate(app),

        // Compose a refinement instruction
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Instruction;
            app.input_mode = InputMode::Editing;
            app.instruction_cursor = app.instruction.chars().count();
        }

        KeyCode::Char('c') => {
            if !app.artifact.is_empty() {
                copy_to_clipboard(&app.artifact);
                app.flash_copied();
            }
        }
        KeyCode::Char('e') => {
            if !app.artifact.is_empty() {
                if let Ok(dir) = std::env::current_dir() {
                    let _ = export_artifact(&app.artifact, &dir);
                }
            }
        }
        KeyCode::Char('r') => {
            if let Ok(dir) = std::env::current_dir() {
                app.scan_images(&dir);
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Files;
        }
        KeyCode::Enter => submit_refine(app),
        KeyCode::Backspace => {
            if app.instruction_cursor > 0 {
                app.instruction_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.instruction, app.instruction_cursor);
                app.instruction.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.instruction.chars().count();
            if app.instruction_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.instruction, app.instruction_cursor);
                app.instruction.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.instruction_cursor = app.instruction_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.instruction.chars().count();
            app.instruction_cursor = (app.instruction_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.instruction_cursor = 0,
        KeyCode::End => app.instruction_cursor = app.instruction.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.instruction, app.instruction_cursor);
            app.instruction.insert(byte_pos, c);
            app.instruction_cursor += 1;
        }
        _ => {}
    }
}

/// Upload the selected sketch; no-op without a selection or while busy.
fn trigger_generate(app: &mut App) {
    if !app.can_generate() {
        return;
    }
    let Some(image) = app.selected_image().cloned() else {
        return;
    };

    let client = app.client.clone();
    let task = tokio::spawn(async move { client.generate(&image).await });
    app.begin_generate(task);
}

/// Send the artifact plus the instruction, both verbatim; no-op unless both
/// are non-empty.
fn submit_refine(app: &mut App) {
    if !app.can_refine() {
        return;
    }

    let client = app.client.clone();
    let code = app.artifact.clone();
    let instruction = app.instruction.clone();
    let task = tokio::spawn(async move { client.refine(&code, &instruction).await });
    app.begin_refine(task);
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_output_down();
            app.scroll_output_down();
            app.scroll_output_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_output_up();
            app.scroll_output_up();
            app.scroll_output_up();
        }
        _ => {}
    }
}

/// Write the artifact bytes exactly to `index.html` in `dir`.
pub fn export_artifact(artifact: &str, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(EXPORT_FILE_NAME);
    std::fs::write(&path, artifact.as_bytes())?;
    Ok(path)
}

fn copy_to_clipboard(text: &str) {
    use std::io::Write;
    use std::process::{Command, Stdio};

    for tool in ["pbcopy", "wl-copy", "xclip"] {
        let mut command = Command::new(tool);
        if tool == "xclip" {
            command.args(["-selection", "clipboard"]);
        }
        if let Ok(mut child) = command.stdin(Stdio::piped()).spawn() {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }
            let _ = child.wait();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BackendClient;

    fn test_app() -> App {
        App::new(BackendClient::new("http://localhost:8000"))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn export_writes_artifact_bytes_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = "<h1>Hi</h1>\n<p>exact \u{00e9} bytes</p>";
        let path = export_artifact(artifact, dir.path()).unwrap();

        assert_eq!(path.file_name().unwrap(), EXPORT_FILE_NAME);
        assert_eq!(std::fs::read(&path).unwrap(), artifact.as_bytes());
    }

    #[tokio::test]
    async fn generate_without_selection_spawns_nothing() {
        let mut app = test_app();
        trigger_generate(&mut app);
        assert!(app.generate_task.is_none());
        assert!(!app.busy());
    }

    #[tokio::test]
    async fn refine_with_empty_instruction_spawns_nothing() {
        let mut app = test_app();
        app.artifact = "<p>a</p>".to_string();
        submit_refine(&mut app);
        assert!(app.refine_task.is_none());

        app.artifact.clear();
        app.instruction = "make it bold".to_string();
        submit_refine(&mut app);
        assert!(app.refine_task.is_none());
    }

    #[test]
    fn instruction_editing_is_utf8_safe() {
        let mut app = test_app();
        app.focus = FocusPane::Instruction;
        app.input_mode = InputMode::Editing;

        for c in "héllo".chars() {
            handle_editing_mode(&mut app, press(KeyCode::Char(c)));
        }
        assert_eq!(app.instruction, "héllo");
        assert_eq!(app.instruction_cursor, 5);

        handle_editing_mode(&mut app, press(KeyCode::Left));
        handle_editing_mode(&mut app, press(KeyCode::Left));
        handle_editing_mode(&mut app, press(KeyCode::Left));
        handle_editing_mode(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.instruction, "hllo");
        assert_eq!(app.instruction_cursor, 1);

        handle_editing_mode(&mut app, press(KeyCode::End));
        assert_eq!(app.instruction_cursor, 4);
    }

    #[test]
    fn escape_leaves_editing_mode() {
        let mut app = test_app();
        app.focus = FocusPane::Instruction;
        app.input_mode = InputMode::Editing;
        handle_editing_mode(&mut app, press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.focus, FocusPane::Files);
    }
}
