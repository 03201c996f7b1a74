//! Line editing of the prompt, on top of raw terminal key events

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Longest line that the prompt accepts
const MAX_LINE_LENGTH: usize = 64;

/// What a key press produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// The user pressed Enter on this line
    Submitted(String),

    /// The user asked to leave (Esc or Ctrl-C)
    Interrupt,
}

/// Single-line editor behind the `>` prompt
///
/// Raw mode hands us individual key presses, so echoing, erasing and
/// submitting are done here.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
}
//
impl LineEditor {
    /// Start with an empty line
    pub fn new() -> Self {
        Self::default()
    }

    /// What has been typed so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Feed one key event to the editor
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<InputEvent> {
        // Some platforms also report releases
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(InputEvent::Interrupt)
            }
            KeyCode::Esc => Some(InputEvent::Interrupt),
            KeyCode::Enter => Some(InputEvent::Submitted(std::mem::take(&mut self.buffer))),
            KeyCode::Backspace => {
                self.buffer.pop();
                None
            }
            KeyCode::Char(c) if !c.is_control() => {
                if self.buffer.chars().count() < MAX_LINE_LENGTH {
                    self.buffer.push(c);
                }
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(editor: &mut LineEditor, code: KeyCode) -> Option<InputEvent> {
        editor.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(editor: &mut LineEditor, text: &str) {
        for c in text.chars() {
            assert_eq!(press(editor, KeyCode::Char(c)), None);
        }
    }

    #[test]
    fn typing_and_submitting() {
        let mut editor = LineEditor::new();
        type_text(&mut editor, "s 5");
        assert_eq!(editor.buffer(), "s 5");
        assert_eq!(
            press(&mut editor, KeyCode::Enter),
            Some(InputEvent::Submitted("s 5".to_owned()))
        );
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn backspace_erases_the_last_character() {
        let mut editor = LineEditor::new();
        type_text(&mut editor, "r 42");
        press(&mut editor, KeyCode::Backspace);
        assert_eq!(editor.buffer(), "r 4");

        // Erasing an empty line is harmless
        let mut empty = LineEditor::new();
        press(&mut empty, KeyCode::Backspace);
        assert_eq!(empty.buffer(), "");
    }

    #[test]
    fn escape_and_ctrl_c_interrupt() {
        let mut editor = LineEditor::new();
        assert_eq!(press(&mut editor, KeyCode::Esc), Some(InputEvent::Interrupt));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(editor.handle_key(ctrl_c), Some(InputEvent::Interrupt));
    }

    #[test]
    fn long_lines_are_truncated() {
        let mut editor = LineEditor::new();
        type_text(&mut editor, &"x".repeat(2 * MAX_LINE_LENGTH));
        assert_eq!(editor.buffer().len(), MAX_LINE_LENGTH);
    }
}
