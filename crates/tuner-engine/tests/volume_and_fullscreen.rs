mod common;

use std::sync::{Arc, Mutex};

use common::{radio, tv, FakeFullscreen, FullscreenCalls, Harness, SinkCall};
use tuner_engine::{Generation, PlayerEvent, SinkError, SinkEvent};
use tuner_proto::protocol::PlaybackState;

#[tokio::test]
async fn set_volume_zero_does_not_mute() {
    let mut h = Harness::new(radio());
    h.player.set_volume(0.0);
    h.pump();

    let volume = h.player.volume();
    assert_eq!(volume.level, 0.0);
    assert!(!volume.muted);
    assert_eq!(h.probe.count(|c| matches!(c, SinkCall::SetMuted(_))), 0);
}

#[tokio::test]
async fn set_volume_normalises_percent() {
    let mut h = Harness::new(radio());
    h.player.set_volume(35.0);
    h.pump();
    assert_eq!(h.probe.count(|c| *c == SinkCall::SetVolume(0.35)), 1);
    assert_eq!(h.player.volume().percent(), 35);

    h.player.set_volume(250.0);
    h.pump();
    assert_eq!(h.player.volume().level, 1.0);
}

#[tokio::test]
async fn volume_state_follows_sink_notifications_only() {
    let mut h = Harness::new(radio());
    let before = h.player.volume();
    h.player.set_volume(20.0);
    // Not applied until the sink reports back.
    assert_eq!(h.player.volume(), before);
    h.pump();
    assert_eq!(h.player.volume().level, 0.2);

    // Sink-originated change (e.g. system mixer).
    h.probe.emit(SinkEvent::VolumeChanged {
        level: 0.9,
        muted: true,
    });
    h.pump();
    assert_eq!(h.player.volume().level, 0.9);
    assert!(h.player.volume().muted);
}

#[tokio::test]
async fn mute_and_level_are_independent() {
    let mut h = Harness::new(radio());
    h.player.set_volume(60.0);
    h.player.toggle_mute();
    h.pump();
    assert!(h.player.volume().muted);
    assert_eq!(h.player.volume().level, 0.6);

    h.player.set_volume(10.0);
    h.pump();
    assert!(h.player.volume().muted, "level change leaves mute alone");

    h.player.set_muted(false);
    h.pump();
    assert!(!h.player.volume().muted);
    assert_eq!(h.player.volume().level, 0.1);
}

#[tokio::test]
async fn volume_works_before_any_source_and_across_sessions() {
    let mut h = Harness::new(radio());
    h.player.set_volume(40.0);
    h.pump();
    assert_eq!(h.player.volume().level, 0.4);

    h.player.select_source("http://a/stream.mp3");
    h.player.set_volume(50.0);
    h.pump();
    assert_eq!(h.player.volume().level, 0.5);
    assert_eq!(h.player.state(), &PlaybackState::Loading);
}

#[tokio::test]
async fn stale_volume_notification_is_dropped() {
    let mut h = Harness::new(radio());
    h.player.select_source("http://a/one.mp3");
    h.player.select_source("http://a/two.mp3");
    h.probe.emit_for(
        Generation::new(1),
        SinkEvent::VolumeChanged {
            level: 0.05,
            muted: true,
        },
    );
    h.pump();
    assert!(!h.player.volume().muted);
}

fn fullscreen_tv() -> (Harness, Arc<Mutex<FullscreenCalls>>) {
    let calls = Arc::new(Mutex::new(FullscreenCalls::default()));
    let h = Harness::with_fullscreen(tv(), Box::new(FakeFullscreen(calls.clone())));
    (h, calls)
}

#[tokio::test]
async fn fullscreen_follows_platform_notifications() {
    let (mut h, calls) = fullscreen_tv();

    h.player.enter_fullscreen().expect("supported");
    assert_eq!(calls.lock().unwrap().requests, 1);
    assert!(!h.player.snapshot().fullscreen, "request alone changes nothing");

    assert!(h.inject(PlayerEvent::FullscreenChanged(true)));
    assert!(h.player.snapshot().fullscreen);

    // User left fullscreen through the platform, not through the player.
    assert!(h.inject(PlayerEvent::FullscreenChanged(false)));
    assert!(!h.player.snapshot().fullscreen);
    assert_eq!(calls.lock().unwrap().exits, 0);
}

#[tokio::test]
async fn fullscreen_toggle_and_exit() {
    let (mut h, calls) = fullscreen_tv();
    h.player.toggle_fullscreen().expect("supported");
    h.inject(PlayerEvent::FullscreenChanged(true));
    h.player.toggle_fullscreen().expect("supported");
    assert_eq!(calls.lock().unwrap().exits, 1);
    h.inject(PlayerEvent::FullscreenChanged(false));
    assert!(!h.player.is_fullscreen());

    h.player.exit_fullscreen().expect("supported");
    assert_eq!(calls.lock().unwrap().exits, 2);
}

#[tokio::test]
async fn audio_player_has_no_fullscreen() {
    let calls = Arc::new(Mutex::new(FullscreenCalls::default()));
    let mut h = Harness::with_fullscreen(radio(), Box::new(FakeFullscreen(calls.clone())));

    assert_eq!(h.player.enter_fullscreen(), Err(SinkError::Unsupported));
    assert!(!h.inject(PlayerEvent::FullscreenChanged(true)));
    assert_eq!(calls.lock().unwrap().requests, 0);
}
