use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn insert_at_cursor(text: &mut String, cursor: &mut usize, insert: &str) {
    let byte_idx = char_to_byte_index(text, *cursor);
    text.insert_str(byte_idx, insert);
    *cursor += insert.chars().count();
}

fn delete_before_cursor(text: &mut String, cursor: &mut usize) {
    if *cursor > 0 {
        let byte_idx = char_to_byte_index(text, *cursor - 1);
        text.remove(byte_idx);
        *cursor -= 1;
    }
}

fn delete_at_cursor(text: &mut String, cursor: usize) {
    if cursor < text.chars().count() {
        let byte_idx = char_to_byte_index(text, cursor);
        text.remove(byte_idx);
    }
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return Ok(());
        }
        KeyCode::Char('n') if ctrl => {
            app.new_chat();
            return Ok(());
        }
        KeyCode::Char('s') if ctrl => {
            app.save_chat();
            return Ok(());
        }
        KeyCode::Char('l') if ctrl => {
            app.refresh_saved();
            return Ok(());
        }
        KeyCode::Esc if app.is_loading() && !app.show_api_key_input && !app.show_model_picker => {
            app.cancel_pending();
            return Ok(());
        }
        _ => {}
    }

    // Popups take every other key while open
    if app.show_api_key_input {
        return handle_api_key_input(app, key);
    }
    if app.show_model_picker {
        return handle_model_picker(app, key);
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => {
            handle_editing_mode(app, key);
            Ok(())
        }
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_input_cursor = 0;
        }
        KeyCode::Enter => app.submit_api_key()?,
        KeyCode::Backspace => {
            delete_before_cursor(&mut app.api_key_input, &mut app.api_key_input_cursor);
        }
        KeyCode::Char(c) => {
            insert_at_cursor(
                &mut app.api_key_input,
                &mut app.api_key_input_cursor,
                &c.to_string(),
            );
        }
        _ => {}
    }
    Ok(())
}

fn handle_model_picker(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => {
            app.show_model_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.model_picker_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.model_picker_nav_up();
        }
        KeyCode::Enter => app.select_model()?,
        _ => {}
    }
    Ok(())
}

fn focus_input(app: &mut App) {
    app.focus = FocusPane::Input;
    app.input_mode = InputMode::Editing;
    // Cursor at end of existing text
    app.input_cursor = app.input.chars().count();
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Tab cycles: Sidebar -> Chat -> Input -> Sidebar
        KeyCode::Tab => match app.focus {
            FocusPane::Sidebar => app.focus = FocusPane::Chat,
            FocusPane::Chat => focus_input(app),
            FocusPane::Input => app.focus = FocusPane::Sidebar,
        },
        KeyCode::BackTab => match app.focus {
            FocusPane::Sidebar => focus_input(app),
            FocusPane::Chat => app.focus = FocusPane::Sidebar,
            FocusPane::Input => app.focus = FocusPane::Chat,
        },

        KeyCode::Char('i') | KeyCode::Char('a') => focus_input(app),

        // Half-page scroll
        KeyCode::Char('d') if ctrl => {
            let half = app.half_page();
            app.scroll_chat_down(half);
        }
        KeyCode::Char('u') if ctrl => {
            let half = app.half_page();
            app.scroll_chat_up(half);
        }
        KeyCode::PageDown => {
            let page = app.chat_height.max(1);
            app.scroll_chat_down(page);
        }
        KeyCode::PageUp => {
            let page = app.chat_height.max(1);
            app.scroll_chat_up(page);
        }

        // Navigation depends on the focused pane
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sidebar => app.saved_nav_down(),
            _ => app.scroll_chat_down(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sidebar => app.saved_nav_up(),
            _ => app.scroll_chat_up(1),
        },
        KeyCode::Char('g') => match app.focus {
            FocusPane::Sidebar => app.saved_nav_first(),
            _ => app.scroll_chat_to_top(),
        },
        KeyCode::Char('G') => match app.focus {
            FocusPane::Sidebar => app.saved_nav_last(),
            _ => app.scroll_chat_to_bottom(),
        },

        KeyCode::Enter => match app.focus {
            FocusPane::Sidebar => app.load_selected(),
            FocusPane::Input => focus_input(app),
            FocusPane::Chat => {}
        },

        // Conversation actions
        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('s') => app.save_chat(),
        KeyCode::Char('r') => app.refresh_saved(),

        // Popups
        KeyCode::Char('m') => app.open_model_picker(),
        KeyCode::Char('K') => app.open_api_key_input(),

        _ => {}
    }
    Ok(())
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Sidebar;
        }
        // Alt/Shift+Enter adds a line, plain Enter sends
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
        {
            insert_at_cursor(&mut app.input, &mut app.input_cursor, "\n");
        }
        KeyCode::Enter => {
            app.send_message();
        }
        KeyCode::Backspace => {
            delete_before_cursor(&mut app.input, &mut app.input_cursor);
        }
        KeyCode::Delete => {
            delete_at_cursor(&mut app.input, app.input_cursor);
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let len = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(len);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input.clear();
            app.input_cursor = 0;
        }
        KeyCode::Char(c) => {
            insert_at_cursor(&mut app.input, &mut app.input_cursor, &c.to_string());
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.show_api_key_input {
        // Keys are single-line; drop any trailing newline from the clipboard
        let key = text.trim();
        insert_at_cursor(&mut app.api_key_input, &mut app.api_key_input_cursor, key);
    } else if app.input_mode == InputMode::Editing {
        let text = text.replace("\r\n", "\n");
        insert_at_cursor(&mut app.input, &mut app.input_cursor, &text);
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp => app.scroll_chat_up(3),
        _ => {}
    }
}
