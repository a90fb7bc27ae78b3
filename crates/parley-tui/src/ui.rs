use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use parley_core::{KeySource, Message, Role};
use crate::app::{App, FocusPane, InputMode};
use crate::markdown;
use crate::theme::Theme;

const SIDEBAR_WIDTH: u16 = 26;
const MAX_INPUT_LINES: u16 = 5;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let theme = app.theme.clone();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &theme, frame, header_area);

    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(SIDEBAR_WIDTH.min(body_area.width / 3)),
        Constraint::Min(0),
    ])
    .areas(body_area);

    render_sidebar(app, &theme, frame, sidebar_area);

    let input_lines = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
    ])
    .areas(main_area);

    render_chat(app, &theme, frame, chat_area);
    render_input(app, &theme, frame, input_area);
    render_footer(app, &theme, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, &theme, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, &theme, frame, area);
    }
}

fn render_header(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let key_status = match app.key_source {
        _ if !app.client.has_api_key() => {
            Span::styled(" [no API key] ", Style::default().fg(theme.error).bold())
        }
        Some(KeySource::Env) => Span::styled(" [key: env] ", theme.dim()),
        Some(KeySource::Config) | None => Span::styled(" [key: config] ", theme.dim()),
    };

    let title = Line::from(vec![
        Span::styled(" Parley ", Style::default().fg(theme.accent).bold()),
        Span::styled(app.client.model().to_string(), theme.text()),
        key_status,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            theme.dim(),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(theme.header_bg));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border(focused))
        .title(" Conversations ");

    if app.saved.is_empty() {
        let empty = Paragraph::new(Span::styled("No saved chats", theme.dim()))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .saved
        .iter()
        .map(|saved| ListItem::new(format!(" {} ", saved.display_name)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.highlight())
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.saved_state);
}

fn message_lines(message: &Message, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match message.role {
        Role::User => {
            lines.push(Line::from(Span::styled("You:", theme.label(theme.user))));
            for line in message.content.lines() {
                lines.push(Line::from(Span::styled(line.to_string(), theme.text())));
            }
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "DeepSeek:",
                theme.label(theme.assistant),
            )));
            lines.extend(markdown::to_lines(&message.content, theme));
        }
        Role::System => {
            lines.push(Line::from(Span::styled("System:", theme.label(theme.system))));
            for line in message.content.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    theme.dim().add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }
    lines.push(Line::default());
    lines
}

fn chat_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for message in app.store.messages() {
        lines.extend(message_lines(message, theme));
    }

    if let Some(pending) = &app.pending {
        lines.extend(message_lines(&Message::user(pending.prompt.clone()), theme));
        lines.push(Line::from(Span::styled(
            "DeepSeek:",
            theme.label(theme.assistant),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            theme.dim().add_modifier(Modifier::ITALIC),
        )));
    }

    if let Some(error) = &app.last_error {
        lines.push(Line::from(Span::styled("Error:", theme.label(theme.error))));
        for line in error.lines() {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(theme.error),
            )));
        }
    }

    lines
}

fn chat_paragraph(text: Text<'static>) -> Paragraph<'static> {
    Paragraph::new(text).wrap(Wrap { trim: false })
}

/// Rows the paragraph takes when word-wrapped to `width`
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    paragraph
        .line_count(width.max(1))
        .min(u16::MAX as usize) as u16
}

fn render_chat(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border(focused))
        .title(format!(" DeepSeek: {} ", app.client.model()));

    let lines = chat_lines(app, theme);
    let text = if lines.is_empty() {
        Text::from(Span::styled(
            "Type a message and press Enter to start chatting...",
            theme.dim(),
        ))
    } else {
        Text::from(lines)
    };

    // Measured without the block so the count is inner rows only
    let chat = chat_paragraph(text);
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    app.update_chat_layout(wrapped_height(&chat, inner_width), inner_height);

    let chat = chat.block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Row and column of the cursor within multi-line input
fn cursor_row_col(input: &str, cursor: usize) -> (u16, u16) {
    let before: String = input.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before
        .rsplit('\n')
        .next()
        .map(|line| line.chars().count())
        .unwrap_or(0);
    (row as u16, col as u16)
}

fn render_input(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && app.focus == FocusPane::Input;
    let border_style = if editing {
        Style::default().fg(theme.editing_border)
    } else {
        theme.border(app.focus == FocusPane::Input)
    };

    let title = if app.is_loading() {
        " Waiting for reply (Esc to cancel) "
    } else {
        " Message (Enter to send, Alt+Enter for newline) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    // Keep the cursor visible by scrolling both ways
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let (row, col) = cursor_row_col(&app.input, app.input_cursor);
    let row_offset = if inner_height == 0 {
        0
    } else {
        row.saturating_sub(inner_height - 1)
    };
    let col_offset = if inner_width == 0 {
        0
    } else {
        col.saturating_sub(inner_width - 1)
    };

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(theme.user))
        .block(block)
        .scroll((row_offset, col_offset));

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        frame.set_cursor_position((
            area.x + 1 + (col - col_offset),
            area.y + 1 + (row - row_offset),
        ));
    }
}

fn render_footer(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (
            " NORMAL ",
            Style::default().bg(theme.highlight_bg).fg(theme.highlight_fg),
        ),
        InputMode::Editing => (
            " INSERT ",
            Style::default().bg(theme.editing_border).fg(theme.header_bg),
        ),
    };

    let hints = match app.input_mode {
        InputMode::Normal => "Tab focus  n new  s save  m model  K key  q quit",
        InputMode::Editing => "Esc normal  ^N new  ^S save  ^C quit",
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::raw(" "),
        Span::styled(app.status.clone(), theme.text()),
        Span::raw("  "),
        Span::styled(hints, theme.dim()),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_model_picker(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let choices = app.model_choices();
    let popup_area = centered(area, 44, choices.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.focus_border))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let current = app.client.model().to_string();
    let items: Vec<ListItem> = choices
        .iter()
        .map(|model| {
            let style = if *model == current {
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
            } else {
                theme.text()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.highlight())
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

/// Mask all but the last four characters
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let masked_len = len - 4;
    let last_four: String = key.chars().skip(masked_len).collect();
    format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
}

/// The prompt only appends or deletes at the end, so the cursor follows the mask
fn masked_cursor_col(key: &str, width: u16) -> u16 {
    (mask_key(key).chars().count() as u16).min(width)
}

fn render_api_key_input(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.editing_border))
        .title(" Enter DeepSeek API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(theme.dim());
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(mask_key(&app.api_key_input))
        .style(Style::default().fg(theme.accent));
    frame.render_widget(input, input_area);

    let cursor_x = masked_cursor_col(&app.api_key_input, input_area.width);
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} characters", app.api_key_input.chars().count()))
        .style(theme.dim());
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{test_app, REPLY};
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::TempDir;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_mask_key_keeps_last_four() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key("sk-123456"), "*****...3456");
    }

    #[test]
    fn test_masked_cursor_sits_after_masked_text() {
        let key = format!("sk-{}", "0123456789".repeat(3));
        assert_eq!(masked_cursor_col(&key, 58), 27);
        assert_eq!(masked_cursor_col("sk-1", 58), 4);
        assert_eq!(masked_cursor_col(&key, 10), 10);
    }

    #[test]
    fn test_cursor_row_col() {
        assert_eq!(cursor_row_col("hello", 3), (0, 3));
        assert_eq!(cursor_row_col("ab\ncdé", 6), (1, 3));
        assert_eq!(cursor_row_col("ab\n", 3), (1, 0));
    }

    #[test]
    fn test_wrapped_height_counts_wrapped_rows() {
        let text = Text::from(vec![Line::from("a".repeat(25)), Line::default(), Line::from("b")]);
        assert_eq!(wrapped_height(&chat_paragraph(text), 10), 5);
    }

    #[test]
    fn test_wrapped_height_breaks_at_words() {
        // 34 characters would fit in 4 rows of 10, but no two words share a row
        let line = format!("{}aaaaaa", "aaaaaa ".repeat(4));
        let text = Text::from(Line::from(line));
        assert!(wrapped_height(&chat_paragraph(text), 10) >= 5);
    }

    #[tokio::test]
    async fn test_render_shows_messages_and_saved_list() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        app.store.commit_exchange("what is rust?", "A **systems** language.");
        app.save_chat();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("You:"));
        assert!(text.contains("what is rust?"));
        assert!(text.contains("A systems language."));
        assert!(text.contains("Conversations"));
        assert!(text.contains("deepseek-chat"));
    }

    #[tokio::test]
    async fn test_newest_reply_visible_after_word_wrapped_history() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        let word = "a".repeat(20);
        let long_reply = format!("{w} {w} {w}\n{w} {w} {w}", w = word);
        for i in 0..6 {
            app.store.commit_exchange(format!("q{}", i), long_reply.clone());
        }
        app.store.commit_exchange("q-last", "FINALLINE");

        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("q-last"));
        assert!(text.contains("FINALLINE"));
    }

    #[tokio::test]
    async fn test_render_flags_missing_key() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, None, Some(REPLY));

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(screen_text(&terminal).contains("[no API key]"));
    }
}
