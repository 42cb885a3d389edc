//! Push-button input as a debounced, bounded event queue.
//!
//! ```text
//! button edge (interrupt / rdev thread)
//!     └─▶ SwitchBridge::press ── debounce (atomic timestamp) ── try_send ─┐
//!                                                                        ▼
//!                             orchestrator tick ◀── SwitchEvents::drain ◀─ queue
//! ```
//!
//! The producer side never blocks, allocates, or logs: a press inside the
//! debounce window is ignored and a press that finds the queue full is
//! dropped.

pub mod listener;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};

pub use listener::KeyboardSwitch;

/// One accepted button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent;

const NEVER: u64 = u64::MAX;

/// Create a connected bridge/queue pair.  `capacity` is raised to 1.
pub fn channel(capacity: usize, debounce: Duration) -> (SwitchBridge, SwitchEvents) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let bridge = SwitchBridge {
        tx,
        debounce_ms: debounce.as_millis() as u64,
        last_accepted: Arc::new(AtomicU64::new(NEVER)),
        epoch: Instant::now(),
    };
    let events = SwitchEvents { rx, closed: false };
    (bridge, events)
}

// ---------------------------------------------------------------------------
// SwitchBridge (producer)
// ---------------------------------------------------------------------------

/// Producer half, safe to call from an interrupt-style callback.  Clones
/// share the debounce window.
#[derive(Clone)]
pub struct SwitchBridge {
    tx: mpsc::Sender<SwitchEvent>,
    debounce_ms: u64,
    last_accepted: Arc<AtomicU64>,
    epoch: Instant,
}

impl SwitchBridge {
    /// Register a press now.  Returns `true` if a token was queued.
    pub fn press(&self) -> bool {
        self.press_at(self.epoch.elapsed().as_millis() as u64)
    }

    /// Register a press at `now_ms` (milliseconds on the bridge's clock).
    pub fn press_at(&self, now_ms: u64) -> bool {
        let last = self.last_accepted.load(Ordering::Acquire);
        if last != NEVER && now_ms.saturating_sub(last) < self.debounce_ms {
            return false;
        }
        // Two racing presses: only one wins the window.
        if self
            .last_accepted
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.tx.try_send(SwitchEvent).is_ok()
    }
}

// ---------------------------------------------------------------------------
// SwitchEvents (consumer)
// ---------------------------------------------------------------------------

/// Consumer half, owned by the orchestrator.
pub struct SwitchEvents {
    rx: mpsc::Receiver<SwitchEvent>,
    closed: bool,
}

impl SwitchEvents {
    /// Take every queued event without waiting.  Returns how many there were.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(SwitchEvent) => count += 1,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        count
    }

    /// `true` once every bridge is gone and the queue is empty.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

const LETTERS: [rdev::Key; 26] = [
    rdev::Key::KeyA,
    rdev::Key::KeyB,
    rdev::Key::KeyC,
    rdev::Key::KeyD,
    rdev::Key::KeyE,
    rdev::Key::KeyF,
    rdev::Key::KeyG,
    rdev::Key::KeyH,
    rdev::Key::KeyI,
    rdev::Key::KeyJ,
    rdev::Key::KeyK,
    rdev::Key::KeyL,
    rdev::Key::KeyM,
    rdev::Key::KeyN,
    rdev::Key::KeyO,
    rdev::Key::KeyP,
    rdev::Key::KeyQ,
    rdev::Key::KeyR,
    rdev::Key::KeyS,
    rdev::Key::KeyT,
    rdev::Key::KeyU,
    rdev::Key::KeyV,
    rdev::Key::KeyW,
    rdev::Key::KeyX,
    rdev::Key::KeyY,
    rdev::Key::KeyZ,
];

const DIGITS: [rdev::Key; 10] = [
    rdev::Key::Num0,
    rdev::Key::Num1,
    rdev::Key::Num2,
    rdev::Key::Num3,
    rdev::Key::Num4,
    rdev::Key::Num5,
    rdev::Key::Num6,
    rdev::Key::Num7,
    rdev::Key::Num8,
    rdev::Key::Num9,
];

const FUNCTION_KEYS: [rdev::Key; 12] = [
    rdev::Key::F1,
    rdev::Key::F2,
    rdev::Key::F3,
    rdev::Key::F4,
    rdev::Key::F5,
    rdev::Key::F6,
    rdev::Key::F7,
    rdev::Key::F8,
    rdev::Key::F9,
    rdev::Key::F10,
    rdev::Key::F11,
    rdev::Key::F12,
];

/// Map a button key name from the config (`"Space"`, `"F9"`, `"b"`, `"7"`,
/// case-insensitive) to an [`rdev::Key`].
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    let name = name.trim().to_ascii_lowercase();

    match name.as_str() {
        "space" => return Some(rdev::Key::Space),
        "enter" | "return" => return Some(rdev::Key::Return),
        "escape" | "esc" => return Some(rdev::Key::Escape),
        "tab" => return Some(rdev::Key::Tab),
        "pause" => return Some(rdev::Key::Pause),
        _ => {}
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return n.checked_sub(1).and_then(|i| FUNCTION_KEYS.get(i)).copied();
    }

    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'a'..='z'), None) => Some(LETTERS[(c as u8 - b'a') as usize]),
        (Some(c @ '0'..='9'), None) => Some(DIGITS[(c as u8 - b'0') as usize]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presses_inside_window_coalesce() {
        let (bridge, mut events) = channel(8, Duration::from_millis(300));
        assert!(bridge.press_at(1_000));
        assert!(!bridge.press_at(1_050));
        assert!(!bridge.press_at(1_299));
        assert!(bridge.press_at(1_300));
        assert_eq!(events.drain(), 2);
        assert_eq!(events.drain(), 0);
    }

    #[test]
    fn first_press_at_time_zero_is_accepted() {
        let (bridge, mut events) = channel(1, Duration::from_millis(300));
        assert!(bridge.press_at(0));
        assert_eq!(events.drain(), 1);
    }

    #[test]
    fn clones_share_the_window() {
        let (bridge, mut events) = channel(8, Duration::from_millis(100));
        let other = bridge.clone();
        assert!(bridge.press_at(10));
        assert!(!other.press_at(20));
        assert_eq!(events.drain(), 1);
    }

    #[test]
    fn full_queue_drops_presses() {
        let (bridge, mut events) = channel(2, Duration::ZERO);
        assert!(bridge.press_at(1));
        assert!(bridge.press_at(2));
        assert!(!bridge.press_at(3));
        assert_eq!(events.drain(), 2);
        assert!(bridge.press_at(4));
        assert_eq!(events.drain(), 1);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let (bridge, mut events) = channel(0, Duration::ZERO);
        assert!(bridge.press());
        assert_eq!(events.drain(), 1);
    }

    #[test]
    fn closes_after_bridges_drop() {
        let (bridge, mut events) = channel(4, Duration::ZERO);
        assert!(bridge.press_at(5));
        drop(bridge);
        assert!(!events.is_closed());
        assert_eq!(events.drain(), 1);
        assert_eq!(events.drain(), 0);
        assert!(events.is_closed());
    }

    #[test]
    fn presses_from_many_threads() {
        let (bridge, mut events) = channel(64, Duration::ZERO);
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let b = bridge.clone();
                std::thread::spawn(move || {
                    for i in 0..5u64 {
                        b.press_at(t * 100 + i * 10 + 1);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        let n = events.drain();
        assert!(n >= 1 && n <= 20);
    }

    #[test]
    fn parse_named_and_function_keys() {
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key("enter"), Some(rdev::Key::Return));
        assert_eq!(parse_key("Return"), Some(rdev::Key::Return));
        assert_eq!(parse_key("ESC"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("f12"), Some(rdev::Key::F12));
        assert_eq!(parse_key("F13"), None);
        assert_eq!(parse_key("F0"), None);
    }

    #[test]
    fn parse_letters_and_digits() {
        assert_eq!(parse_key("b"), Some(rdev::Key::KeyB));
        assert_eq!(parse_key("B"), Some(rdev::Key::KeyB));
        assert_eq!(parse_key("f"), Some(rdev::Key::KeyF));
        assert_eq!(parse_key("7"), Some(rdev::Key::Num7));
        assert_eq!(parse_key("ab"), None);
        assert_eq!(parse_key(""), None);
    }
}
