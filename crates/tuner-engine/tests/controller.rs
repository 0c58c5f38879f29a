mod common;

use common::{radio, tv, Harness, ScriptedEngine, SinkCall};
use tuner_engine::{EngineSignal, Generation, PlaybackError, PlayerEvent, SinkCapabilities, SinkEvent};
use tuner_proto::protocol::{PlaybackState, TransportMode};

#[tokio::test]
async fn select_source_moves_to_loading_then_playing_on_ready() {
    let mut h = Harness::new(radio());
    assert_eq!(h.player.state(), &PlaybackState::Off);

    h.player.select_source("http://radio.example/live.mp3");
    assert_eq!(h.player.state(), &PlaybackState::Loading);
    assert_eq!(h.probe.source().as_deref(), Some("http://radio.example/live.mp3"));

    assert!(h.probe.ready());
    h.pump();
    assert_eq!(h.player.state(), &PlaybackState::Playing);
    assert_eq!(h.probe.count(|c| *c == SinkCall::Play), 1);

    let snap = h.player.snapshot();
    assert_eq!(snap.transport, Some(TransportMode::Progressive));
    assert!(!snap.paused);
    assert!(snap.rev > 0);
}

#[tokio::test]
async fn repeated_select_keeps_one_session_and_filters_stale_events() {
    let mut h = Harness::new(tv());

    h.player.select_source("http://a/one.mp4");
    let first = h.probe.listener().expect("listening");
    h.player.select_source("http://a/two.mp4");
    let second = h.probe.listener().expect("listening");
    h.player.select_source("http://a/three.mp4");
    let third = h.probe.listener().expect("listening");

    assert!(first < second && second < third);
    let stats = h.player.session_stats();
    assert_eq!(stats.opened, 3);
    assert_eq!(stats.closed, 2);
    assert_eq!(h.probe.count(|c| *c == SinkCall::ClearSource), 2);

    // Late ready/error from superseded sessions change nothing.
    h.probe.emit_for(first, SinkEvent::Ready);
    h.probe.emit_for(second, SinkEvent::Error("decode".into()));
    h.pump();
    assert_eq!(h.player.state(), &PlaybackState::Loading);
    assert_eq!(h.probe.count(|c| *c == SinkCall::Play), 0);

    h.probe.emit_for(third, SinkEvent::Ready);
    h.pump();
    assert_eq!(h.player.state(), &PlaybackState::Playing);
}

#[tokio::test]
async fn listener_is_detached_before_next_source_is_set() {
    let mut h = Harness::new(radio());
    h.player.select_source("http://a/one.mp3");
    h.player.select_source("http://a/two.mp3");

    let calls = h.probe.calls();
    let unlisten = calls
        .iter()
        .position(|c| *c == SinkCall::Unlisten)
        .expect("unlisten on switch");
    let second_source = calls
        .iter()
        .position(|c| *c == SinkCall::SetSource("http://a/two.mp3".into()))
        .expect("second source set");
    assert!(unlisten < second_source);
}

#[tokio::test]
async fn fatal_sink_error_while_loading_sets_error() {
    let mut h = Harness::new(radio());
    h.player.select_source("http://a/broken.mp3");
    h.probe.emit(SinkEvent::Error("404 not found".into()));
    h.pump();
    match h.player.state() {
        PlaybackState::Error(msg) => assert!(msg.contains("404 not found"), "{msg}"),
        other => panic!("expected error, got {other:?}"),
    }
    // No automatic retry.
    assert_eq!(h.player.session_stats().opened, 1);
}

#[tokio::test]
async fn error_recovers_on_next_selection() {
    let mut h = Harness::new(radio());
    h.player.select_source("http://a/broken.mp3");
    h.probe.emit(SinkEvent::Error("gone".into()));
    h.pump();
    assert!(h.player.state().is_error());

    h.player.select_source("http://a/fine.mp3");
    assert_eq!(h.player.state(), &PlaybackState::Loading);
    h.probe.ready();
    h.pump();
    assert_eq!(h.player.state(), &PlaybackState::Playing);
}

#[tokio::test]
async fn manifest_without_engine_or_native_support_is_unsupported() {
    let mut h = Harness::new(tv());
    h.player.select_source("https://cdn.example/live/master.m3u8");
    assert_eq!(
        h.player.state(),
        &PlaybackState::Error(PlaybackError::SourceUnsupported.message())
    );
    assert!(h.probe.source().is_none());
}

#[tokio::test]
async fn manifest_falls_back_to_native_sink_playback() {
    let sink_caps = SinkCapabilities {
        native_adaptive: true,
        visual_surface: true,
    };
    let mut h = Harness::with_sink(tv(), sink_caps);
    h.player.select_source("https://cdn.example/live/master.m3u8");
    assert_eq!(h.player.state(), &PlaybackState::Loading);
    assert_eq!(
        h.probe.source().as_deref(),
        Some("https://cdn.example/live/master.m3u8")
    );
    let snap = h.player.snapshot();
    assert_eq!(snap.transport, Some(TransportMode::AdaptiveStream));
}

#[tokio::test]
async fn adaptive_engine_handles_are_released_on_every_switch() {
    let engine = ScriptedEngine::default();
    let mut h = Harness::with_engine(tv(), Box::new(engine.clone()));

    h.player.select_source("https://cdn.example/a.m3u8");
    assert_eq!(engine.load_count(), 1);
    assert_eq!(engine.release_count(), 0);
    assert!(h.probe.source().is_none(), "engine path does not set the source directly");

    let generation = h.player.generation();
    h.inject(PlayerEvent::Engine {
        generation,
        signal: EngineSignal::ManifestParsed {
            media_url: "https://cdn.example/a/720p.m3u8".into(),
        },
    });
    assert_eq!(
        h.probe.count(|c| *c == SinkCall::AttachRendition("https://cdn.example/a/720p.m3u8".into())),
        1
    );
    h.probe.ready();
    h.pump();
    assert_eq!(h.player.state(), &PlaybackState::Playing);

    h.player.select_source("https://cdn.example/b.m3u8");
    assert_eq!(engine.release_count(), 1);
    h.player.select_source("http://a/c.mp4");
    assert_eq!(engine.release_count(), 2);
    assert_eq!(engine.load_count(), 2);

    h.player.dispose();
    assert_eq!(engine.release_count(), 2, "progressive session holds no engine");
}

#[tokio::test]
async fn engine_fatal_for_current_generation_sets_error() {
    let engine = ScriptedEngine::default();
    let mut h = Harness::with_engine(tv(), Box::new(engine.clone()));

    h.player.select_source("https://cdn.example/a.m3u8");
    let stale = Generation::new(0);
    assert!(!h.inject(PlayerEvent::Engine {
        generation: stale,
        signal: EngineSignal::Fatal("old".into()),
    }));
    assert_eq!(h.player.state(), &PlaybackState::Loading);

    let generation = h.player.generation();
    h.inject(PlayerEvent::Engine {
        generation,
        signal: EngineSignal::Fatal("manifest request returned HTTP 404".into()),
    });
    assert!(h.player.state().is_error());
    assert_eq!(engine.release_count(), 1, "failed session drops its engine");
}

#[tokio::test]
async fn autoplay_rejection_stays_playing_and_reports_paused() {
    let mut h = Harness::new(tv());
    h.probe.reject_play(true);
    h.player.select_source("http://a/clip.mp4");
    h.probe.ready();
    h.pump();

    assert_eq!(h.player.state(), &PlaybackState::Playing);
    assert!(h.player.snapshot().paused);
}

#[tokio::test]
async fn timeline_and_end_are_reported_without_transition() {
    let mut h = Harness::new(tv());
    h.player.select_source("http://a/clip.mp4");
    h.probe.ready();
    h.probe.emit(SinkEvent::TimeUpdate {
        position_secs: Some(30.0),
        duration_secs: Some(120.0),
    });
    h.probe.emit(SinkEvent::Ended);
    h.pump();

    let snap = h.player.snapshot();
    assert_eq!(snap.state, PlaybackState::Playing);
    assert!(snap.ended);
    assert_eq!(snap.progress_percent(), Some(25.0));

    h.player.select_source("http://a/next.mp4");
    let snap = h.player.snapshot();
    assert!(!snap.ended);
    assert_eq!(snap.position_secs, None);
}

#[tokio::test]
async fn dispose_detaches_and_ignores_later_calls() {
    let mut h = Harness::new(radio());
    h.player.select_source("http://a/one.mp3");
    let generation = h.player.generation();
    h.player.dispose();

    assert_eq!(h.player.session_stats().closed, 1);
    assert_eq!(h.probe.listener(), None);
    assert!(!h.probe.ready(), "detached sink emits nothing");

    assert!(!h.inject(PlayerEvent::Sink {
        generation,
        event: SinkEvent::Ready,
    }));
    h.player.select_source("http://a/two.mp3");
    assert_eq!(h.player.state(), &PlaybackState::Off);
    assert_eq!(h.player.session_stats().opened, 1);
}
