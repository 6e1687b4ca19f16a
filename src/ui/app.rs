use std::future::Future;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;
use tui_widgets::popup::PopupState;

use crate::config::{Config, UiColors};
use crate::directory::{self, ContactDirectory, FetchError};
use crate::editor::{DetailEditor, EditorMode, FieldKind, RecordKind};
use crate::filter::{self, FilterState};
use crate::listings::{self, ListingBook};
use crate::lists::{self, ListBuilder, ListMode};
use crate::model::{Activity, Contact, Listing, RecordPatch};
use crate::remote::actions::{is_action_command, ActionClient, ActionResult};
use crate::remote::assistant::{AssistantClient, EMPTY_MESSAGE};
use crate::remote::RemoteError;
use crate::store::DocumentStore;

use super::draw;
use super::edit::{EditTarget, InlineEditor};
use super::panes::{FilterField, Screen};

const CONTACT_LOOKUP_FAILED: &str = "Unable to load contact details. Please try again.";
const LIST_SAVE_FAILED: &str = "Error creating list. Please try again.";

/// Stamp for collection loads. Only the result of the newest load is applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadGeneration {
    current: u64,
}

impl LoadGeneration {
    pub fn begin(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current
    }
}

/// Work running on the runtime, shown in the footer while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyTask {
    LoadContacts,
    LoadListings,
    SaveContact,
    SaveListing,
    SaveList,
    Chat,
    LoadTours,
    LookupContact,
}

impl BusyTask {
    pub fn label(self) -> &'static str {
        match self {
            BusyTask::LoadContacts => "Loading contacts",
            BusyTask::LoadListings => "Loading listings",
            BusyTask::SaveContact => "Saving contact",
            BusyTask::SaveListing => "Saving listing",
            BusyTask::SaveList => "Creating list",
            BusyTask::Chat => "Waiting for assistant",
            BusyTask::LoadTours => "Loading tours",
            BusyTask::LookupContact => "Loading contact",
        }
    }
}

/// Results of background work, delivered back to the UI thread.
#[derive(Debug)]
pub enum AppEvent {
    ContactsLoaded {
        generation: u64,
        result: Result<Vec<Contact>, FetchError>,
    },
    ListingsLoaded {
        generation: u64,
        result: Result<Vec<Listing>, FetchError>,
    },
    ContactSaved {
        result: Result<Option<RecordPatch>, String>,
    },
    ListingSaved {
        result: Result<Option<RecordPatch>, String>,
    },
    ListSaved {
        name: String,
        count: usize,
        result: Result<String, String>,
    },
    ChatReplied {
        result: Result<String, RemoteError>,
    },
    ActionFinished {
        result: ActionResult,
    },
    ToursLoaded {
        listing_id: String,
        result: Result<Vec<Activity>, String>,
    },
    TourContactResolved {
        result: Result<Option<Contact>, String>,
    },
}

impl AppEvent {
    fn task(&self) -> BusyTask {
        match self {
            AppEvent::ContactsLoaded { .. } => BusyTask::LoadContacts,
            AppEvent::ListingsLoaded { .. } => BusyTask::LoadListings,
            AppEvent::ContactSaved { .. } => BusyTask::SaveContact,
            AppEvent::ListingSaved { .. } => BusyTask::SaveListing,
            AppEvent::ListSaved { .. } => BusyTask::SaveList,
            AppEvent::ChatReplied { .. } | AppEvent::ActionFinished { .. } => BusyTask::Chat,
            AppEvent::ToursLoaded { .. } => BusyTask::LoadTours,
            AppEvent::TourContactResolved { .. } => BusyTask::LookupContact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Action,
    Error,
}

#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub input: Input,
    pub transcript: Vec<ChatEntry>,
    pub error: Option<String>,
    pub pending: bool,
    /// Lines scrolled up from the bottom of the transcript.
    pub scroll_back: u16,
}

/// Blocking message; any dismiss key closes it.
#[derive(Debug, Clone)]
pub struct AlertModal {
    pub title: String,
    pub message: String,
}

/// Tours recorded for one listing.
#[derive(Debug, Clone)]
pub struct ToursModal {
    pub listing_id: String,
    pub listing_title: String,
    pub tours: Vec<Activity>,
    pub selected: usize,
    pub loading: bool,
    pub error: Option<String>,
}

impl ToursModal {
    fn selected_tour(&self) -> Option<&Activity> {
        self.tours.get(self.selected)
    }
}

/// Help modal state with scroll support
#[derive(Debug, Clone)]
pub struct HelpModal {
    /// Current scroll offset (line index at top of viewport)
    pub scroll: usize,
    /// Total number of content lines
    pub total_lines: usize,
    /// Viewport height (set during rendering)
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 10,
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn can_scroll_up(&self) -> bool {
        self.scroll > 0
    }

    pub fn can_scroll_down(&self) -> bool {
        self.scroll + self.viewport_height < self.total_lines
    }
}

/// A section in the help modal (e.g., "Global", "Contacts")
pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

/// A single help entry (action name + key bindings)
pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

fn help_entry(action: &'static str, keys: &[String]) -> HelpEntry {
    HelpEntry {
        action,
        keys: keys.join(", "),
    }
}

pub struct App<'a> {
    config: &'a Config,
    store: Arc<dyn DocumentStore>,
    assistant: AssistantClient,
    actions: ActionClient,
    runtime: Handle,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
    pub screen: Screen,
    pub chat: ChatState,
    // Contacts screen
    pub directory: ContactDirectory,
    pub contacts_error: Option<FetchError>,
    contact_loads: LoadGeneration,
    pub filter: FilterState,
    pub filter_focus: Option<FilterField>,
    /// Positions into `directory.contacts()` that pass the filter.
    pub visible: Vec<usize>,
    pub selected: usize,
    pub list_builder: ListBuilder,
    pub list_saving: bool,
    // Listings screen
    pub listings: ListingBook,
    pub listings_error: Option<FetchError>,
    listing_loads: LoadGeneration,
    pub listing_selected: usize,
    pub tours_modal: Option<ToursModal>,
    // Detail editor modal, one at a time
    pub detail: Option<DetailEditor>,
    pub detail_saving: bool,
    pub editor: InlineEditor,
    pub alert: Option<AlertModal>,
    pub help_modal: Option<HelpModal>,
    // Popup state for modal dialog (tui-widgets popup)
    pub modal_popup: PopupState,
    pub status: Option<String>,
    busy: Vec<BusyTask>,
}

impl<'a> App<'a> {
    pub fn new(config: &'a Config, store: Arc<dyn DocumentStore>, runtime: Handle) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            config,
            store,
            assistant: AssistantClient::new(&config.assistant),
            actions: ActionClient::new(&config.assistant),
            runtime,
            events_tx,
            events_rx,
            screen: Screen::Contacts,
            chat: ChatState::default(),
            directory: ContactDirectory::default(),
            contacts_error: None,
            contact_loads: LoadGeneration::default(),
            filter: FilterState::default(),
            filter_focus: None,
            visible: Vec::new(),
            selected: 0,
            list_builder: ListBuilder::new(),
            list_saving: false,
            listings: ListingBook::default(),
            listings_error: None,
            listing_loads: LoadGeneration::default(),
            listing_selected: 0,
            tours_modal: None,
            detail: None,
            detail_saving: false,
            editor: InlineEditor::default(),
            alert: None,
            help_modal: None,
            modal_popup: PopupState::default(),
            status: None,
            busy: Vec::new(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        // Entering the start screen loads it.
        self.reload_current();
        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            self.drain_events();
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Background work
    // =========================================================================

    fn spawn<F>(&mut self, task: BusyTask, work: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        self.busy.push(task);
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let event = work.await;
            if tx.send(event).is_err() {
                tracing::debug!("UI closed before background result arrived");
            }
        });
    }

    /// Apply every result that arrived since the last frame.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    pub fn busy_labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = Vec::new();
        for task in &self.busy {
            if !labels.contains(&task.label()) {
                labels.push(task.label());
            }
        }
        labels
    }

    fn end_busy(&mut self, task: BusyTask) {
        if let Some(pos) = self.busy.iter().position(|t| *t == task) {
            self.busy.remove(pos);
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        self.end_busy(event.task());

        match event {
            AppEvent::ContactsLoaded { generation, result } => {
                if !self.contact_loads.is_current(generation) {
                    tracing::debug!(generation, "dropping stale contact load");
                    return;
                }
                match result {
                    Ok(contacts) => {
                        self.contacts_error = None;
                        self.directory.replace(contacts);
                        self.set_status(format!("{} contacts loaded", self.directory.len()));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err.message, "contact load failed");
                        self.contacts_error = Some(err);
                    }
                }
                self.refilter();
            }
            AppEvent::ListingsLoaded { generation, result } => {
                if !self.listing_loads.is_current(generation) {
                    tracing::debug!(generation, "dropping stale listing load");
                    return;
                }
                match result {
                    Ok(listings) => {
                        self.listings_error = None;
                        self.listings.replace(listings);
                        self.set_status(format!("{} listings loaded", self.listings.len()));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err.message, "listing load failed");
                        self.listings_error = Some(err);
                    }
                }
                self.listing_selected = self
                    .listing_selected
                    .min(self.listings.len().saturating_sub(1));
            }
            AppEvent::ContactSaved { result } => {
                self.detail_saving = false;
                match result {
                    Ok(written) => {
                        if let Some(patch) = written {
                            self.directory.merge(&patch);
                            self.refilter();
                            self.select_contact_id(&patch.id);
                        }
                        self.close_detail();
                        self.set_status("Contact saved");
                    }
                    Err(message) => {
                        self.show_alert("Save failed", format!("Unable to save changes: {}", message));
                    }
                }
            }
            AppEvent::ListingSaved { result } => {
                self.detail_saving = false;
                match result {
                    Ok(written) => {
                        if let Some(patch) = written {
                            self.listings.merge(&patch);
                            self.select_listing_id(&patch.id);
                        }
                        self.close_detail();
                        self.set_status("Listing saved");
                    }
                    Err(message) => {
                        self.show_alert("Save failed", format!("Unable to save changes: {}", message));
                    }
                }
            }
            AppEvent::ListSaved { name, count, result } => {
                self.list_saving = false;
                match result {
                    Ok(_) => {
                        self.list_builder.complete_save();
                        self.editor.cancel();
                        self.set_status(format!("Created list \"{}\" with {} contacts", name, count));
                    }
                    Err(message) => {
                        self.show_alert("Create list", format!("{}\n\n{}", LIST_SAVE_FAILED, message));
                    }
                }
            }
            AppEvent::ChatReplied { result } => {
                self.chat.pending = false;
                match result {
                    Ok(reply) => self.push_chat(ChatRole::Assistant, reply),
                    Err(err) => {
                        let message = err.to_string();
                        self.chat.error = Some(message.clone());
                        self.push_chat(ChatRole::Error, message);
                    }
                }
            }
            AppEvent::ActionFinished { result } => {
                self.chat.pending = false;
                match &result {
                    ActionResult::Completed { kind, message, .. } => {
                        tracing::info!(kind = %kind, "contact action completed");
                        self.push_chat(ChatRole::Action, message.clone());
                    }
                    ActionResult::Failed { error } => {
                        self.chat.error = Some(error.clone());
                        self.push_chat(ChatRole::Error, error.clone());
                    }
                }
            }
            AppEvent::ToursLoaded { listing_id, result } => {
                let Some(modal) = self.tours_modal.as_mut() else {
                    return;
                };
                if modal.listing_id != listing_id {
                    return;
                }
                modal.loading = false;
                match result {
                    Ok(tours) => {
                        modal.tours = tours;
                        modal.selected = 0;
                    }
                    Err(message) => modal.error = Some(message),
                }
            }
            AppEvent::TourContactResolved { result } => match result {
                Ok(Some(contact)) => {
                    self.detail = Some(DetailEditor::for_contact(&contact, EditorMode::View));
                }
                Ok(None) => self.show_alert("Contact", "No contact is recorded for this tour."),
                Err(message) => {
                    tracing::warn!(error = %message, "tour contact lookup failed");
                    self.show_alert("Error", CONTACT_LOOKUP_FAILED);
                }
            },
        }
    }

    pub fn reload_contacts(&mut self) {
        let generation = self.contact_loads.begin();
        let store = Arc::clone(&self.store);
        tracing::debug!(generation, "loading contacts");
        self.spawn(BusyTask::LoadContacts, async move {
            let result = directory::fetch_contacts(store.as_ref()).await;
            AppEvent::ContactsLoaded { generation, result }
        });
    }

    pub fn reload_listings(&mut self) {
        let generation = self.listing_loads.begin();
        let store = Arc::clone(&self.store);
        tracing::debug!(generation, "loading listings");
        self.spawn(BusyTask::LoadListings, async move {
            let result = listings::fetch_listings(store.as_ref()).await;
            AppEvent::ListingsLoaded { generation, result }
        });
    }

    fn reload_current(&mut self) {
        match self.screen {
            Screen::Chat => {}
            Screen::Contacts => self.reload_contacts(),
            Screen::Listings => self.reload_listings(),
        }
    }

    // =========================================================================
    // Key routing
    // =========================================================================

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Ctrl+C always quits (hardcoded for safety)
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Ok(true);
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return Ok(false);
        }

        if self.alert.is_some() {
            if matches!(
                key.code,
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') | KeyCode::Char('q')
            ) {
                self.alert = None;
            }
            return Ok(false);
        }

        if self.detail.is_some() {
            self.handle_detail_key(key);
            return Ok(false);
        }

        if self.tours_modal.is_some() {
            self.handle_tours_modal_key(key);
            return Ok(false);
        }

        if self.list_builder.mode() == ListMode::Naming {
            self.handle_naming_key(key);
            return Ok(false);
        }

        let config = self.config;
        let global = &config.keys.global;
        // Plain characters belong to a focused text input.
        let typing = self.screen == Screen::Chat
            || self.filter_focus.map(FilterField::is_text).unwrap_or(false);
        let matches = |bindings: &[String]| {
            if typing {
                key_matches_function_key(&key, bindings)
            } else {
                key_matches_any(&key, bindings)
            }
        };

        if matches(&global.quit) {
            return Ok(true);
        }
        if matches(&global.help) {
            self.show_help();
            return Ok(false);
        }
        if matches(&global.chat) {
            self.switch_screen(Screen::Chat);
            return Ok(false);
        }
        if matches(&global.contacts) {
            self.switch_screen(Screen::Contacts);
            return Ok(false);
        }
        if matches(&global.listings) {
            self.switch_screen(Screen::Listings);
            return Ok(false);
        }
        if matches(&global.reload) {
            self.reload_current();
            return Ok(false);
        }

        match self.screen {
            Screen::Chat => self.handle_chat_key(key),
            Screen::Contacts => self.handle_contacts_key(key),
            Screen::Listings => self.handle_listings_key(key),
        }
        Ok(false)
    }

    fn switch_screen(&mut self, screen: Screen) {
        if self.screen == screen {
            return;
        }
        if self.screen == Screen::Contacts {
            self.leave_filter();
            if self.list_builder.mode() != ListMode::Browsing {
                self.list_builder.cancel();
            }
        }
        self.screen = screen;
        self.status = None;
        self.reload_current();
    }

    // =========================================================================
    // Chat
    // =========================================================================

    fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.send_chat(),
            KeyCode::Esc => {
                self.chat.input.reset();
                self.chat.error = None;
            }
            KeyCode::Up => self.chat.scroll_back = self.chat.scroll_back.saturating_add(1),
            KeyCode::Down => self.chat.scroll_back = self.chat.scroll_back.saturating_sub(1),
            KeyCode::PageUp => self.chat.scroll_back = self.chat.scroll_back.saturating_add(10),
            KeyCode::PageDown => self.chat.scroll_back = self.chat.scroll_back.saturating_sub(10),
            _ => {
                self.chat.input.handle_event(&Event::Key(key));
            }
        }
    }

    fn send_chat(&mut self) {
        if self.chat.pending {
            return;
        }
        let text = self.chat.input.value().to_string();
        if text.trim().is_empty() {
            self.chat.error = Some(EMPTY_MESSAGE.to_string());
            return;
        }

        self.chat.error = None;
        self.chat.pending = true;
        self.chat.input.reset();
        self.push_chat(ChatRole::User, text.clone());

        if self.config.assistant.route_actions && is_action_command(&text) {
            tracing::info!("routing message to contact actions");
            let client = self.actions.clone();
            self.spawn(BusyTask::Chat, async move {
                let result = client.submit_command(&text).await;
                AppEvent::ActionFinished { result }
            });
        } else {
            let client = self.assistant.clone();
            self.spawn(BusyTask::Chat, async move {
                let result = client.send_message(&text).await;
                AppEvent::ChatReplied { result }
            });
        }
    }

    fn push_chat(&mut self, role: ChatRole, text: String) {
        self.chat.transcript.push(ChatEntry { role, text });
        self.chat.scroll_back = 0;
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    fn handle_contacts_key(&mut self, key: KeyEvent) {
        if let Some(field) = self.filter_focus {
            if self.handle_filter_key(field, key) {
                return;
            }
        }

        let config = self.config;
        let nav = &config.keys.navigation;
        let keys = &config.keys.contacts;

        if key_matches_any(&key, &nav.next) {
            self.move_selection(1);
        } else if key_matches_any(&key, &nav.prev) {
            self.move_selection(-1);
        } else if key_matches_any(&key, &nav.view) {
            self.open_contact(EditorMode::View);
        } else if key_matches_any(&key, &nav.edit) {
            self.open_contact(EditorMode::Edit);
        } else if key_matches_any(&key, &keys.filter) {
            self.focus_filter(FilterField::Sector);
        } else if key_matches_any(&key, &keys.clear_filters) {
            if self.filter.is_active() {
                self.filter.clear();
                self.leave_filter();
                self.refilter();
                self.set_status("Filters cleared");
            } else {
                self.set_status("No filters set");
            }
        } else if key_matches_any(&key, &keys.list_mode) {
            match self.list_builder.mode() {
                ListMode::Browsing => self.start_list_mode(),
                _ => self.cancel_list_mode(),
            }
        } else if key_matches_any(&key, &keys.toggle) {
            self.toggle_selected_contact();
        } else if key_matches_any(&key, &keys.create_list) {
            match self.list_builder.mode() {
                ListMode::Browsing => self.start_list_mode(),
                _ => self.begin_naming(),
            }
        } else if key_matches_any(&key, &keys.cancel) {
            if self.list_builder.mode() == ListMode::Selecting {
                self.cancel_list_mode();
            }
        }
    }

    /// Keys while the filter bar has focus; false lets the key fall through.
    fn handle_filter_key(&mut self, field: FilterField, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.leave_filter();
                true
            }
            KeyCode::Tab | KeyCode::Down => {
                self.focus_filter(field.next());
                true
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus_filter(field.prev());
                true
            }
            _ if field.is_text() => {
                if self.editor.handle_key_event(key) {
                    let value = self.editor.value().to_string();
                    match field {
                        FilterField::Company => self.filter.company = value,
                        FilterField::Notes => self.filter.notes = value,
                        _ => {}
                    }
                    self.refilter();
                }
                true
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                let forward = !matches!(key.code, KeyCode::Left);
                match field {
                    FilterField::Sector => self.filter.cycle_sector(forward),
                    FilterField::Linkedin => {
                        self.filter.linkedin = self.filter.linkedin.next();
                    }
                    _ => {}
                }
                self.refilter();
                true
            }
            _ => false,
        }
    }

    fn focus_filter(&mut self, field: FilterField) {
        self.filter_focus = Some(field);
        match field {
            FilterField::Company => self.editor.start(&self.filter.company, EditTarget::FilterCompany),
            FilterField::Notes => self.editor.start(&self.filter.notes, EditTarget::FilterNotes),
            _ => self.editor.cancel(),
        }
    }

    fn leave_filter(&mut self) {
        if self.filter_focus.take().is_some() {
            self.editor.cancel();
        }
    }

    /// Recompute visible rows after the contacts or the filter changed.
    pub fn refilter(&mut self) {
        self.visible = filter::matching_indices(self.directory.contacts(), &self.filter);
        if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub(1);
        }
    }

    pub fn selected_contact(&self) -> Option<&Contact> {
        self.visible
            .get(self.selected)
            .and_then(|&index| self.directory.contacts().get(index))
    }

    pub fn visible_contacts(&self) -> impl Iterator<Item = &Contact> {
        let contacts = self.directory.contacts();
        self.visible.iter().filter_map(move |&index| contacts.get(index))
    }

    fn select_contact_id(&mut self, id: &str) {
        let contacts = self.directory.contacts();
        if let Some(pos) = self
            .visible
            .iter()
            .position(|&index| contacts.get(index).map(|c| c.id == id).unwrap_or(false))
        {
            self.selected = pos;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    fn open_contact(&mut self, mode: EditorMode) {
        let Some(contact) = self.selected_contact() else {
            return;
        };
        self.detail = Some(DetailEditor::for_contact(contact, mode));
    }

    fn start_list_mode(&mut self) {
        self.list_builder.start_selecting();
        self.set_status("List mode: Space selects, n names the list, Esc cancels");
    }

    fn cancel_list_mode(&mut self) {
        self.list_builder.cancel();
        self.set_status("List mode cancelled");
    }

    fn toggle_selected_contact(&mut self) {
        if self.list_builder.mode() != ListMode::Selecting {
            return;
        }
        let Some(id) = self.selected_contact().map(|c| c.id.clone()) else {
            return;
        };
        self.list_builder.toggle(&id);
        self.move_selection(1);
    }

    fn begin_naming(&mut self) {
        match self.list_builder.begin_naming() {
            Ok(()) => {
                let name = self.list_builder.name().to_string();
                self.modal_popup = PopupState::default();
                self.editor.start(&name, EditTarget::ListName);
            }
            Err(err) => self.show_alert("Create list", err.to_string()),
        }
    }

    fn handle_naming_key(&mut self, key: KeyEvent) {
        if self.list_saving {
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.editor.cancel();
                self.cancel_list_mode();
            }
            KeyCode::Enter => {
                self.list_builder.set_name(self.editor.value().to_string());
                match self.list_builder.prepare_save() {
                    Ok(list) => {
                        self.list_saving = true;
                        let store = Arc::clone(&self.store);
                        let name = list.name.clone();
                        let count = list.contact_ids.len();
                        self.spawn(BusyTask::SaveList, async move {
                            let result = lists::create_contact_list(store.as_ref(), &list)
                                .await
                                .map_err(|err| err.to_string());
                            AppEvent::ListSaved { name, count, result }
                        });
                    }
                    Err(err) => self.show_alert("Create list", err.to_string()),
                }
            }
            _ => {
                if self.editor.handle_key_event(key) {
                    self.list_builder.set_name(self.editor.value().to_string());
                }
            }
        }
    }

    // =========================================================================
    // Listings
    // =========================================================================

    fn handle_listings_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let nav = &config.keys.navigation;

        if key_matches_any(&key, &nav.next) {
            self.move_listing_selection(1);
        } else if key_matches_any(&key, &nav.prev) {
            self.move_listing_selection(-1);
        } else if key_matches_any(&key, &nav.view) {
            self.open_listing(EditorMode::View);
        } else if key_matches_any(&key, &nav.edit) {
            self.open_listing(EditorMode::Edit);
        } else if key_matches_any(&key, &config.keys.listings.tours) {
            self.open_tours();
        }
    }

    pub fn selected_listing(&self) -> Option<&Listing> {
        self.listings.listings().get(self.listing_selected)
    }

    fn move_listing_selection(&mut self, delta: isize) {
        let len = self.listings.len();
        if len == 0 {
            return;
        }
        let next = (self.listing_selected as isize + delta).clamp(0, len as isize - 1);
        self.listing_selected = next as usize;
    }

    fn select_listing_id(&mut self, id: &str) {
        if let Some(pos) = self.listings.listings().iter().position(|l| l.id == id) {
            self.listing_selected = pos;
        }
    }

    fn open_listing(&mut self, mode: EditorMode) {
        let Some(listing) = self.selected_listing() else {
            return;
        };
        self.detail = Some(DetailEditor::for_listing(listing, mode));
    }

    fn open_tours(&mut self) {
        let Some(listing) = self.selected_listing() else {
            return;
        };
        let listing_id = listing.id.clone();
        self.tours_modal = Some(ToursModal {
            listing_id: listing_id.clone(),
            listing_title: listing.title().to_string(),
            tours: Vec::new(),
            selected: 0,
            loading: true,
            error: None,
        });

        let store = Arc::clone(&self.store);
        self.spawn(BusyTask::LoadTours, async move {
            let result = listings::fetch_tours(store.as_ref(), &listing_id)
                .await
                .map_err(|err| err.to_string());
            AppEvent::ToursLoaded { listing_id, result }
        });
    }

    fn handle_tours_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.tours_modal.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.tours_modal = None,
            KeyCode::Char('j') | KeyCode::Down => {
                if modal.selected + 1 < modal.tours.len() {
                    modal.selected += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                modal.selected = modal.selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                let Some(tour) = modal.selected_tour().cloned() else {
                    return;
                };
                let store = Arc::clone(&self.store);
                self.spawn(BusyTask::LookupContact, async move {
                    let result = listings::resolve_contact(store.as_ref(), &tour)
                        .await
                        .map_err(|err| err.to_string());
                    AppEvent::TourContactResolved { result }
                });
            }
            _ => {}
        }
    }

    // =========================================================================
    // Detail editor
    // =========================================================================

    fn handle_detail_key(&mut self, key: KeyEvent) {
        if self.detail_saving {
            return;
        }

        // Inline field input takes every key until it is committed or dropped.
        if matches!(self.editor.target(), Some(EditTarget::DetailField(_))) && self.editor.active {
            match key.code {
                KeyCode::Enter => {
                    let value = self.editor.value().to_string();
                    if let Some(detail) = self.detail.as_mut() {
                        detail.set_selected_value(value);
                    }
                    self.editor.cancel();
                }
                KeyCode::Esc => self.editor.cancel(),
                _ => {
                    self.editor.handle_key_event(key);
                }
            }
            return;
        }

        let config = self.config;
        let keys = &config.keys.editor;
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let choice = matches!(
            detail.selected_spec().map(|spec| spec.kind),
            Some(FieldKind::Choice(_))
        );

        if key_matches_any(&key, &keys.cancel) {
            let dirty = detail.is_dirty();
            self.close_detail();
            if dirty {
                self.set_status("Changes discarded");
            }
        } else if key_matches_any(&key, &keys.next) {
            detail.select_next();
        } else if key_matches_any(&key, &keys.prev) {
            detail.select_prev();
        } else if key_matches_any(&key, &keys.edit) {
            detail.begin_edit();
        } else if key_matches_any(&key, &keys.save) {
            self.save_detail();
        } else if key_matches_any(&key, &keys.change) {
            if detail.mode() != EditorMode::Edit {
                return;
            }
            if choice {
                detail.cycle_choice(true);
            } else {
                let index = detail.selected();
                let value = detail.value(index).to_string();
                self.editor.start(&value, EditTarget::DetailField(index));
            }
        } else if choice && matches!(key.code, KeyCode::Left | KeyCode::Right) {
            detail.cycle_choice(matches!(key.code, KeyCode::Right));
        }
    }

    fn save_detail(&mut self) {
        let Some(detail) = self.detail.as_ref() else {
            return;
        };
        if detail.mode() != EditorMode::Edit {
            self.set_status("Press e to edit before saving");
            return;
        }
        let patch = detail.changes();
        let kind = detail.kind();
        if patch.is_empty() {
            self.close_detail();
            self.set_status("No changes to save");
            return;
        }

        self.detail_saving = true;
        let store = Arc::clone(&self.store);
        match kind {
            RecordKind::Contact => self.spawn(BusyTask::SaveContact, async move {
                let result = directory::save_contact(store.as_ref(), &patch)
                    .await
                    .map_err(|err| err.to_string());
                AppEvent::ContactSaved { result }
            }),
            RecordKind::Listing => self.spawn(BusyTask::SaveListing, async move {
                let result = listings::save_listing(store.as_ref(), &patch)
                    .await
                    .map_err(|err| err.to_string());
                AppEvent::ListingSaved { result }
            }),
        }
    }

    fn close_detail(&mut self) {
        self.detail = None;
        self.detail_saving = false;
        if matches!(self.editor.target(), Some(EditTarget::DetailField(_))) {
            self.editor.cancel();
        }
    }

    // =========================================================================
    // Status, alerts, accessors
    // =========================================================================

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(message.into());
    }

    fn show_alert(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.modal_popup = PopupState::default();
        self.alert = Some(AlertModal {
            title: title.into(),
            message: message.into(),
        });
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn phone_region(&self) -> &str {
        &self.config.phone_region
    }

    pub fn store_label(&self) -> String {
        self.store.describe()
    }

    // =========================================================================
    // Help Modal
    // =========================================================================

    /// Generate help content from current keybindings configuration
    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;

        vec![
            HelpSection {
                title: "Global",
                entries: vec![
                    help_entry("Quit", &keys.global.quit),
                    help_entry("Help", &keys.global.help),
                    help_entry("Chat", &keys.global.chat),
                    help_entry("Contacts", &keys.global.contacts),
                    help_entry("Listings", &keys.global.listings),
                    help_entry("Reload", &keys.global.reload),
                ],
            },
            HelpSection {
                title: "Navigation",
                entries: vec![
                    help_entry("Next", &keys.navigation.next),
                    help_entry("Previous", &keys.navigation.prev),
                    help_entry("View", &keys.navigation.view),
                    help_entry("Edit", &keys.navigation.edit),
                ],
            },
            HelpSection {
                title: "Contacts",
                entries: vec![
                    help_entry("Filter bar", &keys.contacts.filter),
                    help_entry("Clear filters", &keys.contacts.clear_filters),
                    help_entry("List mode", &keys.contacts.list_mode),
                    help_entry("Select contact", &keys.contacts.toggle),
                    help_entry("Name list", &keys.contacts.create_list),
                    help_entry("Cancel list", &keys.contacts.cancel),
                ],
            },
            HelpSection {
                title: "Listings",
                entries: vec![help_entry("Tours", &keys.listings.tours)],
            },
            HelpSection {
                title: "Editor",
                entries: vec![
                    help_entry("Edit mode", &keys.editor.edit),
                    help_entry("Save", &keys.editor.save),
                    help_entry("Close", &keys.editor.cancel),
                    help_entry("Next field", &keys.editor.next),
                    help_entry("Previous field", &keys.editor.prev),
                    help_entry("Change field", &keys.editor.change),
                ],
            },
            HelpSection {
                title: "Chat",
                entries: vec![
                    HelpEntry {
                        action: "Send",
                        keys: "Enter".to_string(),
                    },
                    HelpEntry {
                        action: "Clear input",
                        keys: "Esc".to_string(),
                    },
                    HelpEntry {
                        action: "Scroll",
                        keys: "Up, Down, PageUp, PageDown".to_string(),
                    },
                ],
            },
        ]
    }

    /// Calculate total number of lines in help content
    fn help_total_lines(&self) -> usize {
        let sections = self.help_entries();
        let mut total = 0;
        for section in &sections {
            total += 1; // Section header
            total += section.entries.len();
            total += 1; // Blank line after section
        }
        total
    }

    pub fn show_help(&mut self) {
        let total_lines = self.help_total_lines();
        self.modal_popup = PopupState::default();
        self.help_modal = Some(HelpModal::new(total_lines));
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc) || matches!(key.code, KeyCode::Char('q')) {
            self.help_modal = None;
            return;
        }

        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
            KeyCode::PageDown => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_down(page);
            }
            KeyCode::PageUp => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_up(page);
            }
            _ => {}
        }
    }
}

/// Check if the key event matches any of the bindings in the list
fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Only function-key bindings, used while a text input owns plain keys.
fn key_matches_function_key(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings
        .iter()
        .filter(|b| is_function_key(b))
        .any(|b| key_matches_single(event, b))
}

fn is_function_key(binding: &str) -> bool {
    let trimmed = binding.trim();
    let mut chars = trimmed.chars();
    matches!(chars.next(), Some('F') | Some('f'))
        && trimmed.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Disallow Ctrl/Alt/Super modifiers (we don't support them)
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        name if is_function_key(name) => name[1..]
            .parse::<u8>()
            .map(|n| event.code == KeyCode::F(n))
            .unwrap_or(false),
        // Single character - case-sensitive (m != M, since M requires Shift)
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::directory::FetchCause;
    use crate::store::local::LocalStore;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn contact(id: &str, first: &str, company: &str) -> Contact {
        let mut c = Contact {
            id: id.to_string(),
            first_name: Some(first.to_string()),
            company: Some(company.to_string()),
            ..Contact::default()
        };
        c.refresh_display_name();
        c
    }

    fn with_app(test: impl FnOnce(&mut App)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = config::from_str("").unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(LocalStore::open_in_memory().unwrap());
        let mut app = App::new(&config, store, runtime.handle().clone());
        test(&mut app);
    }

    #[test]
    fn test_load_generation() {
        let mut loads = LoadGeneration::default();
        let first = loads.begin();
        let second = loads.begin();
        assert!(!loads.is_current(first));
        assert!(loads.is_current(second));
    }

    #[test]
    fn test_stale_contact_load_is_dropped() {
        with_app(|app| {
            let stale = app.contact_loads.begin();
            let fresh = app.contact_loads.begin();

            app.handle_event(AppEvent::ContactsLoaded {
                generation: fresh,
                result: Ok(vec![contact("new", "Nora", "Acme")]),
            });
            app.handle_event(AppEvent::ContactsLoaded {
                generation: stale,
                result: Ok(vec![contact("old", "Olga", "Beta")]),
            });

            assert_eq!(app.directory.len(), 1);
            assert!(app.directory.get("new").is_some());
        });
    }

    #[test]
    fn test_filter_bar_typing_updates_visible_rows() {
        with_app(|app| {
            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![
                    contact("1", "Al", "Acme"),
                    contact("2", "Bo", "Beta"),
                    contact("3", "Cy", "acme corp"),
                ]),
            });
            assert_eq!(app.visible.len(), 3);

            app.handle_key(key(KeyCode::Char('/'))).unwrap();
            app.handle_key(key(KeyCode::Tab)).unwrap();
            assert_eq!(app.filter_focus, Some(FilterField::Company));
            for c in "acme".chars() {
                app.handle_key(key(KeyCode::Char(c))).unwrap();
            }
            assert_eq!(app.filter.company, "acme");
            let ids: Vec<&str> = app.visible_contacts().map(|c| c.id.as_str()).collect();
            assert_eq!(ids, vec!["1", "3"]);
        });
    }

    #[test]
    fn test_failed_contact_save_keeps_editor_open() {
        with_app(|app| {
            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![contact("1", "Al", "Acme")]),
            });
            app.handle_key(key(KeyCode::Char('e'))).unwrap();
            assert!(app.detail.is_some());

            app.detail_saving = true;
            app.handle_event(AppEvent::ContactSaved {
                result: Err("permission denied".to_string()),
            });
            assert!(app.detail.is_some());
            assert!(app.alert.is_some());
            assert!(!app.detail_saving);
        });
    }

    #[test]
    fn test_acknowledged_save_merges_and_closes() {
        with_app(|app| {
            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![contact("1", "Al", "Acme")]),
            });
            app.detail = app
                .selected_contact()
                .map(|c| DetailEditor::for_contact(c, EditorMode::Edit));

            let mut patch = RecordPatch::new("1");
            patch.set("phone", "555");
            app.handle_event(AppEvent::ContactSaved {
                result: Ok(Some(patch)),
            });

            assert!(app.detail.is_none());
            assert_eq!(app.directory.get("1").unwrap().phone.as_deref(), Some("555"));
        });
    }

    #[test]
    fn test_failed_reload_keeps_loaded_contacts() {
        with_app(|app| {
            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![contact("1", "Al", "Acme"), contact("2", "Bo", "Beta")]),
            });
            app.move_selection(1);

            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Err(FetchError::new(FetchCause::Network, "contacts", "timed out")),
            });

            assert_eq!(app.directory.len(), 2);
            assert_eq!(app.visible.len(), 2);
            assert_eq!(app.selected_contact().map(|c| c.id.as_str()), Some("2"));
            assert!(app.contacts_error.is_some());

            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![contact("1", "Al", "Acme")]),
            });
            assert!(app.contacts_error.is_none());
            assert_eq!(app.directory.len(), 1);
        });
    }

    #[test]
    fn test_failed_reload_keeps_loaded_listings() {
        with_app(|app| {
            let listing = Listing {
                id: "l1".to_string(),
                street_address: Some("1 Oak Ave".to_string()),
                ..Listing::default()
            };
            let generation = app.listing_loads.begin();
            app.handle_event(AppEvent::ListingsLoaded {
                generation,
                result: Ok(vec![listing]),
            });

            let generation = app.listing_loads.begin();
            app.handle_event(AppEvent::ListingsLoaded {
                generation,
                result: Err(FetchError::new(FetchCause::Permission, "listings", "denied")),
            });

            assert_eq!(app.listings.len(), 1);
            assert!(app.listings_error.is_some());
        });
    }

    #[test]
    fn test_esc_while_naming_discards_selection() {
        with_app(|app| {
            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![contact("1", "Al", "Acme"), contact("2", "Bo", "Beta")]),
            });

            app.handle_key(key(KeyCode::Char('l'))).unwrap();
            app.handle_key(key(KeyCode::Char(' '))).unwrap();
            app.handle_key(key(KeyCode::Char('n'))).unwrap();
            assert_eq!(app.list_builder.mode(), ListMode::Naming);
            assert_eq!(app.list_builder.selected().len(), 1);

            app.handle_key(key(KeyCode::Esc)).unwrap();
            assert_eq!(app.list_builder.mode(), ListMode::Browsing);
            assert!(app.list_builder.selected().is_empty());
            assert!(app.editor.target().is_none());

            // Back in browsing, Space no longer marks rows.
            app.handle_key(key(KeyCode::Char(' '))).unwrap();
            assert!(app.list_builder.selected().is_empty());
        });
    }

    #[test]
    fn test_failed_list_save_stays_in_naming() {
        with_app(|app| {
            let generation = app.contact_loads.begin();
            app.handle_event(AppEvent::ContactsLoaded {
                generation,
                result: Ok(vec![contact("1", "Al", "Acme")]),
            });
            app.handle_key(key(KeyCode::Char('l'))).unwrap();
            app.handle_key(key(KeyCode::Char(' '))).unwrap();
            app.handle_key(key(KeyCode::Char('n'))).unwrap();

            app.list_saving = true;
            app.handle_event(AppEvent::ListSaved {
                name: "Retry me".to_string(),
                count: 1,
                result: Err("offline".to_string()),
            });

            assert!(!app.list_saving);
            assert!(app.alert.is_some());
            assert_eq!(app.list_builder.mode(), ListMode::Naming);
            assert_eq!(app.list_builder.selected(), &["1".to_string()]);
        });
    }

    #[test]
    fn test_key_matches_single() {
        assert!(key_matches_single(&key(KeyCode::F(5)), "F5"));
        assert!(key_matches_single(&key(KeyCode::Char(' ')), "Space"));
        assert!(key_matches_single(&key(KeyCode::Char('M')), "M"));
        assert!(!key_matches_single(&key(KeyCode::Char('m')), "M"));

        let mut ctrl = key(KeyCode::Char('j'));
        ctrl.modifiers = KeyModifiers::CONTROL;
        ctrl.kind = KeyEventKind::Press;
        assert!(!key_matches_single(&ctrl, "j"));
    }

    #[test]
    fn test_function_keys_only_while_typing() {
        let bindings = vec!["F2".to_string(), "1".to_string()];
        assert!(key_matches_function_key(&key(KeyCode::F(2)), &bindings));
        assert!(!key_matches_function_key(&key(KeyCode::Char('1')), &bindings));
        assert!(!is_function_key("f"));
    }
}
