use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, FocusPane, InputMode, Tab};
use crate::preview::{LineKind, PreviewLine};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [left_area, output_area] =
        Layout::horizontal([Constraint::Length(36), Constraint::Min(0)]).areas(body_area);

    render_left_column(app, frame, left_area);
    render_output(app, frame, output_area);
    render_footer(app, frame, footer_area);

    if app.busy() {
        render_busy_overlay(app, frame, output_area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let model_badge = match &app.model {
        Some(model) => format!(" [{}]", model),
        None => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(" sketch2code ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(model_badge, Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(app.client.base_url(), Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(
        Paragraph::new(title).style(Style::default().bg(Color::Black)),
        area,
    );
}

fn render_left_column(app: &mut App, frame: &mut Frame, area: Rect) {
    let error_height = if app.error.is_some() { 4 } else { 0 };
    let [files_area, error_area, instruction_area] = Layout::vertical([
        Constraint::Min(5),
        Constraint::Length(error_height),
        Constraint::Length(3),
    ])
    .areas(area);

    render_file_picker(app, frame, files_area);
    if app.error.is_some() {
        render_error_notice(app, frame, error_area);
    }
    render_instruction_input(app, frame, instruction_area);
}

fn render_file_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let border_style = if app.focus == FocusPane::Files {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let items: Vec<ListItem> = if app.image_files.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "No images here. Drop a sketch in this directory and press r.",
            Style::default().fg(Color::DarkGray),
        )))]
    } else {
        app.image_files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                ListItem::new(Line::from(name))
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Sketches ")
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.file_state);
}

fn render_error_notice(app: &App, frame: &mut Frame, area: Rect) {
    let message = app.error.as_deref().unwrap_or_default();
    let notice = Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Red))
        .block(
            Block::default()
                .title(" Error ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(notice, area);
}

fn render_instruction_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_style = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let content = if app.instruction.is_empty() && !editing {
        Line::from(Span::styled(
            "Ask the AI to edit (press i)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(app.instruction.as_str())
    };

    let input = Paragraph::new(content).block(
        Block::default()
            .title(" Refine ")
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    frame.render_widget(input, area);

    if editing {
        // Cursor sits at the character index, clamped to the box width.
        let x = area.x + 1 + (app.instruction_cursor as u16).min(area.width.saturating_sub(3));
        frame.set_cursor_position((x, area.y + 1));
    }
}

fn render_output(app: &App, frame: &mut Frame, area: Rect) {
    let [tabs_area, pane_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

    render_tabs(app, frame, tabs_area);

    if app.artifact.is_empty() {
        render_placeholder(frame, pane_area);
        return;
    }

    match app.active_tab {
        Tab::Preview => render_preview_pane(app, frame, pane_area),
        Tab::Code => render_code_pane(app, frame, pane_area),
    }
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let active = Style::default().bg(Color::Cyan).fg(Color::Black).bold();
    let inactive = Style::default().fg(Color::DarkGray);

    let copied = if app.copied_ticks > 0 { " Copied ✓" } else { "" };

    let tabs = Line::from(vec![
        Span::styled(
            " Preview ",
            if app.active_tab == Tab::Preview { active } else { inactive },
        ),
        Span::raw(" "),
        Span::styled(
            " Code ",
            if app.active_tab == Tab::Code { active } else { inactive },
        ),
        Span::styled(copied, Style::default().fg(Color::Green)),
    ]);
    frame.render_widget(Paragraph::new(tabs), area);
}

fn render_placeholder(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "Ready to create",
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(Span::styled(
            "Select a sketch on the left and press g to generate.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let placeholder = Paragraph::new(lines)
        .centered()
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(placeholder, area);
}

fn styled_preview_line(line: &PreviewLine, width: u16) -> Line<'_> {
    match line.kind {
        LineKind::Heading(1) => Line::from(Span::styled(
            line.text.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        LineKind::Heading(_) => Line::from(Span::styled(
            line.text.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        LineKind::Bullet => Line::from(vec![
            Span::styled(" • ", Style::default().fg(Color::DarkGray)),
            Span::raw(line.text.clone()),
        ]),
        LineKind::Link => Line::from(Span::styled(
            line.text.clone(),
            Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
        )),
        LineKind::Field => Line::from(Span::styled(
            line.text.clone(),
            Style::default().fg(Color::Yellow),
        )),
        LineKind::Rule => Line::from(Span::styled(
            "─".repeat(width.saturating_sub(2).max(4) as usize),
            Style::default().fg(Color::DarkGray),
        )),
        LineKind::Paragraph => Line::from(line.text.clone()),
    }
}

fn render_preview_pane(app: &App, frame: &mut Frame, area: Rect) {
    let Some(surface) = app.preview.surface() else {
        return;
    };
    let snapshot = surface.snapshot();

    let mut lines: Vec<Line> = Vec::with_capacity(snapshot.lines.len() + 2);
    if !snapshot.title.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("⌐ {}", snapshot.title),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }
    for line in &snapshot.lines {
        lines.push(styled_preview_line(line, area.width));
    }

    let pane = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.preview_scroll, 0))
        .block(
            Block::default()
                .title(" Live preview (sandboxed) ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(pane, area);
}

fn render_code_pane(app: &App, frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = app
        .artifact
        .lines()
        .enumerate()
        .map(|(i, text)| {
            Line::from(vec![
                Span::styled(
                    format!("{:>4} ", i + 1),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(text),
            ])
        })
        .collect();

    let pane = Paragraph::new(lines)
        .scroll((app.code_scroll, 0))
        .block(
            Block::default()
                .title(" index.html ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(pane, area);
}

fn render_busy_overlay(app: &App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(46, 5, area);
    frame.render_widget(Clear, popup);

    let title = if app.refine_task.is_some() {
        "Refining"
    } else {
        "Generating UI"
    };

    let lines = vec![
        Line::from(Span::styled(
            format!("{}{}", title, app.ellipsis()),
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(Span::styled(
            app.status_line(),
            Style::default().fg(Color::Magenta),
        )),
    ];

    let overlay = Paragraph::new(lines).centered().block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );
    frame.render_widget(overlay, popup);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" g ", key_style),
            Span::styled(" generate ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" refine ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" preview/code ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" copy ", label_style),
            Span::styled(" e ", key_style),
            Span::styled(" export ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}
