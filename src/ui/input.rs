/// Input state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement and jump while a key is held
///   - Edge-triggered swap/reset/level select (only fire on initial press)
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::FrameInput;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

// ── Key bindings ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_JUMP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char(' '), KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_SWAP: &[KeyCode] = &[
    KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S'), KeyCode::Char('x'), KeyCode::Char('X'),
];
const KEYS_RESET: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for Ctrl+C.
    raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before `frame_input`.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.apply(key, Instant::now());
            }
        }

        // Fallback for terminals without Release
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn apply(&mut self, key: KeyEvent, at: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, at);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active.get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    pub fn quit_pressed(&self) -> bool {
        self.ctrl_c_pressed() || self.any_pressed(KEYS_QUIT)
    }

    /// Snapshot for one simulation frame.
    pub fn frame_input(&self) -> FrameInput {
        let level_key = ('1'..='9').position(|c| self.was_pressed(KeyCode::Char(c)));
        FrameInput {
            left: self.any_held(KEYS_LEFT),
            right: self.any_held(KEYS_RIGHT),
            jump: self.any_held(KEYS_JUMP),
            swap: self.any_pressed(KEYS_SWAP),
            reset: self.any_pressed(KEYS_RESET),
            select_level: level_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press)
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Release)
    }

    #[test]
    fn held_keys_map_to_movement() {
        let mut input = InputState::new();
        input.apply(press(KeyCode::Left), Instant::now());
        input.apply(press(KeyCode::Char(' ')), Instant::now());
        let fi = input.frame_input();
        assert!(fi.left && !fi.right);
        assert!(fi.jump);
        assert_eq!(fi.move_dir(), -1.0);
    }

    #[test]
    fn repeat_is_not_a_fresh_press() {
        let mut input = InputState::new();
        input.apply(press(KeyCode::Char('s')), Instant::now());
        assert!(input.frame_input().swap);

        input.fresh_presses.clear();
        input.apply(press(KeyCode::Char('s')), Instant::now());
        assert!(!input.frame_input().swap);
    }

    #[test]
    fn digits_select_levels() {
        let mut input = InputState::new();
        input.apply(press(KeyCode::Char('3')), Instant::now());
        assert_eq!(input.frame_input().select_level, Some(2));
    }

    #[test]
    fn release_honored_only_when_enabled() {
        let mut input = InputState::new();
        input.apply(press(KeyCode::Right), Instant::now());
        input.apply(release(KeyCode::Right), Instant::now());
        assert!(input.frame_input().right);

        input.honor_release = true;
        input.apply(release(KeyCode::Right), Instant::now());
        assert!(!input.frame_input().right);
    }

    #[test]
    fn quit_keys() {
        let mut input = InputState::new();
        assert!(!input.quit_pressed());
        input.apply(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), Instant::now());
        assert!(input.quit_pressed());
    }
}
