use std::path::PathBuf;
use ratatui::widgets::ListState;
use parley_core::{
    ApiError, Config, ConversationStore, DeepSeekClient, KeySource, Model, SavedConversation,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
    Input,
}

/// A user message that has been sent but not yet answered. It only joins
/// the conversation once the reply arrives.
pub struct PendingExchange {
    pub prompt: String,
    task: JoinHandle<Result<String, ApiError>>,
    cancel: CancellationToken,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub status: String,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat pane
    pub pending: Option<PendingExchange>,
    pub last_error: Option<String>,
    pub chat_scroll: u16,
    pub chat_height: u16,      // inner height, set during render
    pub chat_total_lines: u16, // wrapped line count, set during render
    pub follow_bottom: bool,

    // Sidebar
    pub saved: Vec<SavedConversation>,
    pub saved_state: ListState,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub key_source: Option<KeySource>,

    // Data
    pub store: ConversationStore,
    pub client: DeepSeekClient,
    pub config: Config,
    /// None when the platform has no config directory
    pub config_path: Option<PathBuf>,
    pub theme: Theme,
}

impl App {
    pub fn new(
        store: ConversationStore,
        client: DeepSeekClient,
        config: Config,
        config_path: Option<PathBuf>,
        key_source: Option<KeySource>,
        theme: Theme,
    ) -> Self {
        let status = if client.has_api_key() {
            "Ready".to_string()
        } else {
            "No API key found. Press Esc then K to enter one, or set DEEPSEEK_API_KEY.".to_string()
        };

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            status,

            input: String::new(),
            input_cursor: 0,

            pending: None,
            last_error: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_total_lines: 0,
            follow_bottom: true,

            saved: Vec::new(),
            saved_state: ListState::default(),

            animation_frame: 0,

            show_model_picker: false,
            model_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            key_source,

            store,
            client,
            config,
            config_path,
            theme,
        };
        app.refresh_saved();
        app
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    // Conversation actions
    pub fn send_message(&mut self) {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            return;
        }
        if self.is_loading() {
            self.status = "Still waiting for the previous response (Esc to cancel)".to_string();
            return;
        }

        self.input.clear();
        self.input_cursor = 0;
        self.last_error = None;

        let messages = self.store.conversation().with_pending(&prompt);
        let client = self.client.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!(messages = messages.len(), model = %self.client.model(), "sending message");
        let task = tokio::spawn(async move { client.reply(&messages, &token).await });

        self.pending = Some(PendingExchange {
            prompt,
            task,
            cancel,
        });
        self.status = "Waiting for response...".to_string();
        self.scroll_chat_to_bottom();
    }

    /// Apply the result of the in-flight request once it has finished
    pub async fn poll_pending(&mut self) {
        let finished = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.task.is_finished());
        if !finished {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        match pending.task.await {
            Ok(Ok(reply)) => {
                self.store.commit_exchange(pending.prompt, reply);
                self.status = "Ready".to_string();
            }
            Ok(Err(ApiError::Cancelled)) => {
                self.restore_prompt(pending.prompt);
                self.status = "Request cancelled".to_string();
            }
            Ok(Err(e)) => {
                warn!("chat request failed: {}", e);
                self.restore_prompt(pending.prompt);
                self.last_error = Some(e.to_string());
                self.status = "Error getting response".to_string();
            }
            Err(join_error) => {
                error!("chat task failed: {}", join_error);
                self.restore_prompt(pending.prompt);
                self.last_error = Some(format!("An error occurred: {}", join_error));
                self.status = "Error getting response".to_string();
            }
        }
        self.scroll_chat_to_bottom();
    }

    /// Put an unanswered prompt back in the input box. Text typed in the
    /// meantime stays in front of it.
    fn restore_prompt(&mut self, prompt: String) {
        if !self.input.is_empty() {
            self.input.push('\n');
        }
        self.input.push_str(&prompt);
        self.input_cursor = self.input.chars().count();
    }

    pub fn cancel_pending(&mut self) {
        if let Some(pending) = &self.pending {
            pending.cancel.cancel();
            self.status = "Cancelling...".to_string();
        }
    }

    fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            pending.task.abort();
        }
    }

    pub fn new_chat(&mut self) {
        self.abort_pending();
        self.store.clear();
        self.last_error = None;
        self.saved_state.select(None);
        self.chat_scroll = 0;
        self.follow_bottom = true;
        self.status = "New conversation started".to_string();
    }

    pub fn save_chat(&mut self) {
        if self.store.is_empty() {
            self.status = "No conversation to save".to_string();
            return;
        }

        match self.store.save(None) {
            Ok(path) => {
                self.status = format!("Conversation saved to {}", path.display());
                self.refresh_saved();
            }
            Err(e) => {
                error!("failed to save conversation: {}", e);
                self.status = format!("Failed to save conversation: {}", e);
            }
        }
    }

    pub fn refresh_saved(&mut self) {
        match self.store.saved_conversations() {
            Ok(saved) => self.saved = saved,
            Err(e) => {
                warn!("failed to list saved conversations: {}", e);
                self.saved.clear();
                self.status = format!("Failed to list conversations: {}", e);
            }
        }

        match self.saved_state.selected() {
            Some(i) if i >= self.saved.len() => {
                self.saved_state
                    .select(self.saved.len().checked_sub(1));
            }
            _ => {}
        }
    }

    pub fn load_selected(&mut self) {
        let Some(file_name) = self
            .saved_state
            .selected()
            .and_then(|i| self.saved.get(i))
            .map(|saved| saved.file_name.clone())
        else {
            return;
        };

        self.abort_pending();
        self.last_error = None;
        let path = self.store.path_for(&file_name);

        match self.store.load(&path) {
            Ok(report) => {
                self.status = if report.has_skipped() {
                    format!(
                        "Loaded conversation from {} ({} malformed entries skipped)",
                        file_name,
                        report.skipped.len()
                    )
                } else {
                    format!("Loaded conversation from {}", file_name)
                };
            }
            Err(e) => {
                warn!("failed to load {}: {}", file_name, e);
                self.status = format!("Failed to load conversation from {}", file_name);
            }
        }

        self.chat_scroll = 0;
        self.follow_bottom = true;
    }

    // Sidebar navigation
    pub fn saved_nav_down(&mut self) {
        let len = self.saved.len();
        if len > 0 {
            let i = self.saved_state.selected().map_or(0, |i| (i + 1).min(len - 1));
            self.saved_state.select(Some(i));
        }
    }

    pub fn saved_nav_up(&mut self) {
        if !self.saved.is_empty() {
            let i = self.saved_state.selected().unwrap_or(0);
            self.saved_state.select(Some(i.saturating_sub(1)));
        }
    }

    pub fn saved_nav_first(&mut self) {
        if !self.saved.is_empty() {
            self.saved_state.select(Some(0));
        }
    }

    pub fn saved_nav_last(&mut self) {
        if !self.saved.is_empty() {
            self.saved_state.select(Some(self.saved.len() - 1));
        }
    }

    // Chat scrolling
    fn max_chat_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll());
        self.follow_bottom = self.chat_scroll >= self.max_chat_scroll();
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_bottom = false;
    }

    /// Keep the newest message in view; the offset is settled during render
    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    /// Called by the renderer once the wrapped height of the chat is known
    pub fn update_chat_layout(&mut self, total_lines: u16, height: u16) {
        self.chat_total_lines = total_lines;
        self.chat_height = height;
        if self.follow_bottom {
            self.chat_scroll = self.max_chat_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_chat_scroll());
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Model picker methods
    pub fn model_choices(&self) -> Vec<String> {
        let mut choices: Vec<String> = Model::all()
            .into_iter()
            .map(|model| model.as_str().to_string())
            .collect();
        let current = self.client.model().to_string();
        if !choices.contains(&current) {
            choices.push(current);
        }
        choices
    }

    pub fn open_model_picker(&mut self) {
        let current = self
            .model_choices()
            .iter()
            .position(|model| model == self.client.model())
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.model_choices().len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) -> anyhow::Result<()> {
        self.show_model_picker = false;
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.model_choices().get(i).cloned())
        else {
            return Ok(());
        };

        self.client.set_model(model.clone());
        self.config.model = Some(model.clone());
        self.status = format!("Model set to {}", model);
        self.persist_config()
    }

    // API key methods
    pub fn open_api_key_input(&mut self) {
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.show_api_key_input = true;
    }

    pub fn submit_api_key(&mut self) -> anyhow::Result<()> {
        let key = self.api_key_input.trim().to_string();
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;

        if key.is_empty() {
            self.status = "API key unchanged".to_string();
            return Ok(());
        }

        self.client.set_api_key(Some(key.clone()));
        self.config.api_key = Some(key);
        self.key_source = Some(KeySource::Config);
        self.status = "API key updated".to_string();
        self.persist_config()
    }

    fn persist_config(&mut self) -> anyhow::Result<()> {
        match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => {
                warn!("no config directory; settings kept for this session only");
                self.status.push_str(" (not saved: no config directory)");
                Ok(())
            }
        }
    }

    /// Top-level fallback for errors that escaped the event handlers
    pub fn report_error(&mut self, err: anyhow::Error) {
        error!("unhandled error: {:#}", err);
        self.status = format!("An error occurred: {}", err);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::ai::{Transport, TransportResponse};
    use parley_core::Message;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    pub(crate) struct CannedTransport(pub Option<&'static str>);

    #[async_trait]
    impl Transport for CannedTransport {
        async fn post_json(
            &self,
            _url: &str,
            _api_key: &str,
            _body: &Value,
        ) -> Result<TransportResponse, ApiError> {
            match self.0 {
                Some(body) => Ok(TransportResponse {
                    status: 200,
                    body: body.to_string(),
                }),
                // Never answers
                None => std::future::pending().await,
            }
        }
    }

    pub(crate) const REPLY: &str =
        r#"{"choices": [{"message": {"role": "assistant", "content": "hi there"}}]}"#;

    pub(crate) fn test_app(dir: &TempDir, key: Option<&str>, reply: Option<&'static str>) -> App {
        let store = ConversationStore::open(dir.path().join("conversations")).unwrap();
        let client = DeepSeekClient::with_transport(
            key.map(str::to_string),
            Arc::new(CannedTransport(reply)),
        );
        App::new(
            store,
            client,
            Config::new(),
            Some(dir.path().join("config.json")),
            None,
            Theme::dark(),
        )
    }

    pub(crate) async fn settle(app: &mut App) {
        for _ in 0..200 {
            app.poll_pending().await;
            if !app.is_loading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("request never finished");
    }

    #[tokio::test]
    async fn test_successful_send_commits_exchange() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        app.input = "  hello ".to_string();

        app.send_message();
        assert!(app.is_loading());
        assert!(app.input.is_empty());
        assert!(app.store.is_empty());

        settle(&mut app).await;

        assert_eq!(
            app.store.messages(),
            &[Message::user("hello"), Message::assistant("hi there")]
        );
        assert_eq!(app.status, "Ready");
    }

    #[tokio::test]
    async fn test_missing_key_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, None, Some(REPLY));
        app.input = "hello".to_string();

        app.send_message();
        settle(&mut app).await;

        assert!(app.store.is_empty());
        assert!(app.last_error.as_deref().unwrap().contains("No API key"));
        assert_eq!(app.input, "hello");
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        app.input = "   ".to_string();

        app.send_message();

        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_cancel_drops_exchange() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), None);
        app.input = "slow question".to_string();

        app.send_message();
        app.cancel_pending();
        settle(&mut app).await;

        assert!(app.store.is_empty());
        assert_eq!(app.status, "Request cancelled");
        assert_eq!(app.input, "slow question");
    }

    #[tokio::test]
    async fn test_cancel_keeps_text_typed_while_waiting() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), None);
        app.input = "slow question".to_string();

        app.send_message();
        app.input = "follow-up".to_string();
        app.input_cursor = 9;
        app.cancel_pending();
        settle(&mut app).await;

        assert!(app.store.is_empty());
        assert_eq!(app.input, "follow-up\nslow question");
        assert_eq!(app.input_cursor, app.input.chars().count());
    }

    #[tokio::test]
    async fn test_save_refuses_empty_conversation() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));

        app.save_chat();

        assert_eq!(app.status, "No conversation to save");
        assert!(app.saved.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_from_sidebar() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        app.store.commit_exchange("question", "answer");

        app.save_chat();
        assert_eq!(app.saved.len(), 1);

        app.new_chat();
        assert!(app.store.is_empty());
        assert_eq!(app.saved.len(), 1);

        app.saved_nav_down();
        app.load_selected();

        assert_eq!(app.store.messages().len(), 2);
        assert!(app.status.starts_with("Loaded conversation from conversation_"));
    }

    #[tokio::test]
    async fn test_load_reports_skipped_entries() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        std::fs::write(
            app.store.path_for("conversation_20240101_120000.json"),
            r#"[{"role": "user", "content": "ok"}, {"content": "no role"}]"#,
        )
        .unwrap();
        app.refresh_saved();

        app.saved_nav_first();
        app.load_selected();

        assert_eq!(app.store.messages(), &[Message::user("ok")]);
        assert!(app.status.contains("1 malformed entries skipped"));
    }

    #[tokio::test]
    async fn test_failed_load_reports_file() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));
        std::fs::write(app.store.path_for("broken.json"), "not json").unwrap();
        app.refresh_saved();

        app.saved_nav_first();
        app.load_selected();

        assert!(app.store.is_empty());
        assert_eq!(app.status, "Failed to load conversation from broken.json");
    }

    #[tokio::test]
    async fn test_submit_api_key_persists_to_config() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, None, Some(REPLY));
        app.open_api_key_input();
        app.api_key_input = "sk-new".to_string();

        app.submit_api_key().unwrap();

        assert!(app.client.has_api_key());
        assert_eq!(app.key_source, Some(KeySource::Config));
        let saved = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(saved.api_key.as_deref(), Some("sk-new"));
    }

    #[tokio::test]
    async fn test_api_key_without_config_dir_applies_for_session() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, None, Some(REPLY));
        app.config_path = None;
        app.open_api_key_input();
        app.api_key_input = "sk-new".to_string();

        app.submit_api_key().unwrap();

        assert!(app.client.has_api_key());
        assert_eq!(app.status, "API key updated (not saved: no config directory)");
        assert!(!dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_select_model_updates_client() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir, Some("sk-test"), Some(REPLY));

        app.open_model_picker();
        app.model_picker_nav_down();
        app.select_model().unwrap();

        assert_eq!(app.client.model(), "deepseek-reasoner");
        assert!(!app.show_model_picker);
    }
}
