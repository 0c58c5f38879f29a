use tracing::{debug, info};

use crate::error::SinkError;
use crate::sink::FullscreenPlatform;

/// Tracks container fullscreen.  Requests go to the platform; `active` only
/// follows the platform's change notification, so exits the user makes
/// outside the player (Escape, window manager) are picked up too.
pub struct FullscreenCoordinator {
    platform: Box<dyn FullscreenPlatform>,
    active: bool,
    /// Last requested state still waiting for a notification.
    pending: Option<bool>,
}

impl FullscreenCoordinator {
    pub fn new(platform: Box<dyn FullscreenPlatform>) -> Self {
        Self {
            platform,
            active: false,
            pending: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn enter(&mut self) -> Result<(), SinkError> {
        self.platform.request_fullscreen()?;
        self.pending = Some(true);
        Ok(())
    }

    pub fn exit(&mut self) -> Result<(), SinkError> {
        self.platform.exit_fullscreen()?;
        self.pending = Some(false);
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), SinkError> {
        if self.active {
            self.exit()
        } else {
            self.enter()
        }
    }

    /// Platform notification.  Returns true if the state changed.
    pub fn on_platform_change(&mut self, active: bool) -> bool {
        if self.pending.is_some_and(|want| want != active) {
            debug!("fullscreen: platform reports {} against request", active);
        }
        self.pending = None;
        if self.active == active {
            return false;
        }
        info!("fullscreen: {}", if active { "entered" } else { "exited" });
        self.active = active;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        requests: usize,
        exits: usize,
    }

    struct FakePlatform(Arc<Mutex<Calls>>);

    impl FullscreenPlatform for FakePlatform {
        fn request_fullscreen(&mut self) -> Result<(), SinkError> {
            self.0.lock().unwrap().requests += 1;
            Ok(())
        }

        fn exit_fullscreen(&mut self) -> Result<(), SinkError> {
            self.0.lock().unwrap().exits += 1;
            Ok(())
        }
    }

    fn coordinator() -> (FullscreenCoordinator, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let fc = FullscreenCoordinator::new(Box::new(FakePlatform(calls.clone())));
        (fc, calls)
    }

    #[test]
    fn test_request_does_not_flip_state() {
        let (mut fc, calls) = coordinator();
        fc.enter().unwrap();
        assert!(!fc.is_active());
        assert_eq!(fc.pending, Some(true));
        assert_eq!(calls.lock().unwrap().requests, 1);

        assert!(fc.on_platform_change(true));
        assert!(fc.is_active());
        assert_eq!(fc.pending, None);
    }

    #[test]
    fn test_platform_exit_flips_state() {
        let (mut fc, calls) = coordinator();
        fc.enter().unwrap();
        fc.on_platform_change(true);

        // User pressed Escape; the player never asked.
        assert!(fc.on_platform_change(false));
        assert!(!fc.is_active());
        assert_eq!(calls.lock().unwrap().exits, 0);
    }

    #[test]
    fn test_toggle_follows_active() {
        let (mut fc, calls) = coordinator();
        fc.toggle().unwrap();
        fc.on_platform_change(true);
        fc.toggle().unwrap();
        let c = calls.lock().unwrap();
        assert_eq!((c.requests, c.exits), (1, 1));
    }
}
