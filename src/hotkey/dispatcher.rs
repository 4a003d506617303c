//! Global combination binding with fallback
//!
//! At most one combination is bound to the trigger at a time. A failed
//! rebind puts the previously active combination back so the trigger stays
//! usable.

use super::{ComboError, Hotkey};

/// Something that can claim a global key combination for the trigger action
pub trait HotkeyBackend {
    /// Claim `hotkey`. Any earlier binding has already been released.
    fn bind(&mut self, hotkey: &Hotkey) -> Result<(), String>;

    /// Release every binding. Must be safe to call when nothing is bound.
    fn unbind_all(&mut self);
}

#[derive(Debug)]
pub struct HotkeyDispatcher<B> {
    backend: B,
    /// Active combination string, as the operator wrote or recorded it
    current: Option<String>,
    /// Combination that was active before `current`
    previous: Option<String>,
    bound: bool,
}

impl<B: HotkeyBackend> HotkeyDispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            current: None,
            previous: None,
            bound: false,
        }
    }

    /// Bind `combo` in place of the current combination.
    ///
    /// On failure the previous combination is re-bound and `false` is
    /// returned; `current()` is unchanged in that case.
    pub fn register(&mut self, combo: &str) -> bool {
        self.backend.unbind_all();
        self.bound = false;

        match self.try_bind(combo) {
            Ok(hotkey) => {
                log::info!("Registered shortcut '{}' ({})", combo, hotkey);
                if self.current.as_deref() != Some(combo) {
                    self.previous = self.current.replace(combo.to_string());
                }
                self.bound = true;
                true
            }
            Err(e) => {
                log::warn!("Failed to register shortcut '{}': {}", combo, e);
                self.restore();
                false
            }
        }
    }

    /// Release the binding without forgetting it (e.g. while recording)
    pub fn suspend(&mut self) {
        if self.bound {
            log::debug!("Suspending shortcut {:?}", self.current);
        }
        self.backend.unbind_all();
        self.bound = false;
    }

    /// Re-bind the current combination. Returns false if there is none or
    /// it can no longer be claimed.
    pub fn restore(&mut self) -> bool {
        let Some(combo) = self.current.clone() else {
            log::warn!("No shortcut to fall back to, trigger is unbound");
            return false;
        };
        self.backend.unbind_all();
        match self.try_bind(&combo) {
            Ok(_) => {
                log::info!("Shortcut '{}' bound", combo);
                self.bound = true;
                true
            }
            Err(e) => {
                log::error!("Failed to re-bind shortcut '{}': {}", combo, e);
                self.bound = false;
                false
            }
        }
    }

    /// Release everything on application teardown
    pub fn shutdown(&mut self) {
        self.backend.unbind_all();
        self.bound = false;
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn try_bind(&mut self, combo: &str) -> Result<Hotkey, String> {
        let hotkey = Hotkey::parse(combo).map_err(|e: ComboError| e.to_string())?;
        self.backend.bind(&hotkey)?;
        Ok(hotkey)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use evdev::Key;

    /// Backend that records its bindings and refuses configured keys
    #[derive(Debug, Default)]
    pub struct FakeBackend {
        pub bound: Option<Hotkey>,
        pub refused: Vec<Key>,
        pub bind_calls: usize,
    }

    impl HotkeyBackend for FakeBackend {
        fn bind(&mut self, hotkey: &Hotkey) -> Result<(), String> {
            self.bind_calls += 1;
            if self.refused.contains(&hotkey.key) {
                return Err(format!("{} is taken", hotkey));
            }
            self.bound = Some(hotkey.clone());
            Ok(())
        }

        fn unbind_all(&mut self) {
            self.bound = None;
        }
    }

    #[test]
    fn register_binds_and_tracks_previous() {
        let mut dispatcher = HotkeyDispatcher::new(FakeBackend::default());

        assert!(dispatcher.register("Control+G"));
        assert!(dispatcher.register("Alt+H"));

        assert_eq!(dispatcher.current(), Some("Alt+H"));
        assert_eq!(dispatcher.previous(), Some("Control+G"));
        assert_eq!(dispatcher.backend().bound, Some(Hotkey::parse("Alt+H").unwrap()));
        assert!(dispatcher.is_bound());
    }

    #[test]
    fn failed_register_falls_back_to_previous_binding() {
        let backend = FakeBackend {
            refused: vec![Key::KEY_F1],
            ..Default::default()
        };
        let mut dispatcher = HotkeyDispatcher::new(backend);
        assert!(dispatcher.register("Control+G"));

        assert!(!dispatcher.register("Control+F1"));
        assert_eq!(dispatcher.current(), Some("Control+G"));
        assert_eq!(dispatcher.backend().bound, Some(Hotkey::parse("Control+G").unwrap()));
        assert!(dispatcher.is_bound());
    }

    #[test]
    fn malformed_combo_falls_back_without_reaching_backend() {
        let mut dispatcher = HotkeyDispatcher::new(FakeBackend::default());
        assert!(dispatcher.register("Control+G"));
        let calls = dispatcher.backend().bind_calls;

        assert!(!dispatcher.register("Control+Shift"));
        // Only the fallback bind reached the backend
        assert_eq!(dispatcher.backend().bind_calls, calls + 1);
        assert_eq!(dispatcher.backend().bound, Some(Hotkey::parse("Control+G").unwrap()));
    }

    #[test]
    fn failed_first_register_leaves_trigger_unbound() {
        let mut dispatcher = HotkeyDispatcher::new(FakeBackend::default());
        assert!(!dispatcher.register("Nope+G"));
        assert_eq!(dispatcher.current(), None);
        assert!(!dispatcher.is_bound());
    }

    #[test]
    fn suspend_and_restore_keep_the_combination() {
        let mut dispatcher = HotkeyDispatcher::new(FakeBackend::default());
        dispatcher.register("Control+G");

        dispatcher.suspend();
        assert!(!dispatcher.is_bound());
        assert!(dispatcher.backend().bound.is_none());
        assert_eq!(dispatcher.current(), Some("Control+G"));

        assert!(dispatcher.restore());
        assert!(dispatcher.backend().bound.is_some());
    }

    #[test]
    fn re_registering_same_combo_keeps_previous() {
        let mut dispatcher = HotkeyDispatcher::new(FakeBackend::default());
        dispatcher.register("Control+G");
        dispatcher.register("Alt+H");
        dispatcher.register("Alt+H");
        assert_eq!(dispatcher.previous(), Some("Control+G"));
    }
}
