//! Passphrase lock in front of the Architect editor

use bevy::input::ButtonState;
use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::prelude::*;

#[derive(Resource, Debug)]
pub struct ArchitectGate {
    passphrase: Option<String>,
    unlocked: bool,
    pub entry: String,
    pub failed_attempts: u32,
}

impl Default for ArchitectGate {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ArchitectGate {
    /// An empty or missing passphrase leaves the editor open.
    pub fn new(passphrase: Option<String>) -> Self {
        let passphrase = passphrase.filter(|p| !p.is_empty());
        Self {
            unlocked: passphrase.is_none(),
            passphrase,
            entry: String::new(),
            failed_attempts: 0,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn try_unlock(&mut self, attempt: &str) -> bool {
        if self.unlocked {
            return true;
        }
        let ok = self
            .passphrase
            .as_deref()
            .is_some_and(|expected| constant_time_eq(expected.as_bytes(), attempt.as_bytes()));
        if ok {
            self.unlocked = true;
        } else {
            self.failed_attempts += 1;
        }
        ok
    }

    /// Submit whatever has been typed so far.
    pub fn submit(&mut self) -> bool {
        let attempt = std::mem::take(&mut self.entry);
        self.try_unlock(&attempt)
    }

    pub fn lock(&mut self) {
        if self.passphrase.is_some() {
            self.unlocked = false;
        }
        self.entry.clear();
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn gate_unlocked(gate: Res<ArchitectGate>) -> bool {
    gate.is_unlocked()
}

pub fn gate_locked(gate: Res<ArchitectGate>) -> bool {
    !gate.is_unlocked()
}

/// Collect typed characters while the gate is locked
pub fn gate_input_system(mut gate: ResMut<ArchitectGate>, mut keys: MessageReader<KeyboardInput>) {
    if gate.is_unlocked() {
        keys.clear();
        return;
    }
    for ev in keys.read() {
        if ev.state != ButtonState::Pressed {
            continue;
        }
        match &ev.logical_key {
            Key::Enter => {
                if gate.submit() {
                    info!("[ARCHITECT] unlocked");
                } else {
                    warn!(
                        "[ARCHITECT] wrong passphrase ({} failed attempts)",
                        gate.failed_attempts
                    );
                }
            }
            Key::Backspace => {
                gate.entry.pop();
            }
            Key::Escape => gate.entry.clear(),
            Key::Character(chars) => gate.entry.push_str(chars.as_str()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_passphrase_means_open() {
        assert!(ArchitectGate::new(None).is_unlocked());
        assert!(ArchitectGate::new(Some(String::new())).is_unlocked());
    }

    #[test]
    fn wrong_then_right_passphrase() {
        let mut gate = ArchitectGate::new(Some("orbit".to_string()));
        assert!(!gate.is_unlocked());
        assert!(!gate.try_unlock("orbi"));
        assert!(!gate.try_unlock("orbiT"));
        assert_eq!(gate.failed_attempts, 2);
        gate.entry.push_str("orbit");
        assert!(gate.submit());
        assert!(gate.entry.is_empty());
        assert!(gate.is_unlocked());

        gate.lock();
        assert!(!gate.is_unlocked());
    }

    #[test]
    fn lock_is_noop_without_passphrase() {
        let mut gate = ArchitectGate::new(None);
        gate.lock();
        assert!(gate.is_unlocked());
    }
}
