use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

/// What an active inline input is writing to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    /// Field at this index of the open detail editor
    DetailField(usize),
    FilterCompany,
    FilterNotes,
    ListName,
}

#[derive(Default)]
pub struct InlineEditor {
    pub active: bool,
    target: Option<EditTarget>,
    input: Input,
}

impl InlineEditor {
    pub fn start(&mut self, current: &str, target: EditTarget) {
        self.active = true;
        self.target = Some(target);
        self.input = Input::new(current.to_string());
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.target = None;
        self.input.reset();
    }

    pub fn target(&self) -> Option<EditTarget> {
        self.target
    }

    pub fn is_editing(&self, target: EditTarget) -> bool {
        self.active && self.target == Some(target)
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn visual_cursor(&self) -> usize {
        self.input.visual_cursor()
    }

    /// Feed a key to the input; true when the value or cursor changed.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        self.input.handle_event(&Event::Key(key)).is_some()
    }
}
