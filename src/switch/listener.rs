//! Keyboard stand-in for the hardware push button.
//!
//! `rdev::listen` blocks forever and has no shutdown API, so it lives on its
//! own OS thread.  Dropping [`KeyboardSwitch`] raises a stop flag; the thread
//! stays parked in rdev until the process exits but forwards nothing.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use super::SwitchBridge;

pub struct KeyboardSwitch {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl KeyboardSwitch {
    /// Forward presses of `key` into `bridge`.  Auto-repeat while the key
    /// is held counts as a single press.
    pub fn start(key: rdev::Key, bridge: SwitchBridge) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);
        let held = AtomicBool::new(false);

        let thread = std::thread::Builder::new()
            .name("switch-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stopped.load(Ordering::Relaxed) {
                        return;
                    }
                    match event.event_type {
                        rdev::EventType::KeyPress(k) if k == key => {
                            if !held.swap(true, Ordering::Relaxed) {
                                bridge.press();
                            }
                        }
                        rdev::EventType::KeyRelease(k) if k == key => {
                            held.store(false, Ordering::Relaxed);
                        }
                        _ => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("switch-listener: rdev::listen exited: {e:?}");
                }
            })?;

        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for KeyboardSwitch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
