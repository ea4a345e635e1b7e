//! End-to-end preview runs over the simulated backend.

use cueline_common::{AppConfig, CuelineError};
use cueline_playback_engine::sim::{self, PlayerEvent, SimBackend, SimHandles};
use cueline_playback_engine::{
    CanvasScale, ClockEvent, ClockStatus, PreviewEngine, PreviewState, TimerKind,
};
use cueline_project_model::{
    AudioClip, Category, MarkerKey, Profile, Stop, TextOverlay, Transition,
};

const MEDIA: &str = "/media/demo.mp4";
const STING: &str = "/media/sting.wav";

fn hello_profile() -> Profile {
    let mut profile = Profile::new("demo", MEDIA);
    profile
        .registry
        .insert(
            "Text00",
            Transition::Text(TextOverlay {
                style: None,
                font_size: 60.0,
                x: 485,
                y: 300,
                start_ms: Some(1000),
                stop: Stop::At(5000),
                message: "Hello".to_string(),
            }),
        )
        .unwrap();
    profile
}

fn preview() -> (PreviewEngine, SimHandles) {
    let backend = SimBackend::new()
        .with_media(MEDIA, 20_000)
        .with_media(STING, 3_000);
    let (parts, handles) = sim::rig(backend);
    (PreviewEngine::new(&AppConfig::default(), parts), handles)
}

fn started(profile: &Profile) -> (PreviewEngine, SimHandles) {
    let (mut preview, handles) = preview();
    preview.open(profile).unwrap();
    preview.pump(profile).unwrap();
    assert_eq!(preview.state(), PreviewState::Playing);
    (preview, handles)
}

#[test]
fn test_text_overlay_presented_and_dismissed_once() {
    let profile = hello_profile();
    let (mut preview, handles) = started(&profile);

    let markers: Vec<(u64, String)> = preview
        .markers()
        .iter()
        .map(|m| (m.at_ms, m.key.to_string()))
        .collect();
    assert_eq!(
        markers,
        vec![
            (1000, "Add-Text-Text00".to_string()),
            (5000, "Remove-Text-Text00".to_string())
        ]
    );

    let clock = handles.backend.primary().unwrap();
    clock.advance_to(999);
    preview.pump(&profile).unwrap();
    assert_eq!(handles.surface.presents_of("Text00"), 0);

    clock.advance_to(1000);
    preview.pump(&profile).unwrap();
    assert_eq!(handles.surface.presents_of("Text00"), 1);
    assert_eq!(preview.active_overlays(), vec!["Text00".to_string()]);

    clock.advance_to(4000);
    preview.pump(&profile).unwrap();
    assert_eq!(handles.surface.presents_of("Text00"), 1);
    assert_eq!(handles.surface.dismissals_of("Text00"), 0);

    clock.advance_to(5000);
    preview.pump(&profile).unwrap();
    assert_eq!(handles.surface.dismissals_of("Text00"), 1);
    assert!(preview.active_overlays().is_empty());
}

#[test]
fn test_rebuild_is_idempotent() {
    let profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    handles.backend.primary().unwrap().advance_to(2000);
    preview.pump(&profile).unwrap();
    assert!(!preview.active_overlays().is_empty());
    let first = preview.markers().clone();

    preview.teardown();
    assert!(preview.active_overlays().is_empty());
    assert!(preview.markers().is_empty());
    assert!(handles.surface.visible().is_empty());

    preview.open(&profile).unwrap();
    assert_eq!(preview.markers(), &first);

    preview.rebuild(&profile, Some(1500)).unwrap();
    assert_eq!(preview.markers(), &first);
    assert!(preview.active_overlays().is_empty());
}

#[test]
fn test_events_from_torn_down_clock_are_dropped() {
    let profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    let old = handles.backend.primary().unwrap();

    preview.rebuild(&profile, None).unwrap();
    preview.pump(&profile).unwrap();
    assert_ne!(old.generation(), preview.generation());

    old.emit(ClockEvent::Marker(MarkerKey::add(Category::Text, "Text00")));
    old.emit(ClockEvent::EndOfMedia);
    let opened = handles.backend.opened();
    preview.pump(&profile).unwrap();

    assert_eq!(handles.surface.presents_of("Text00"), 0);
    assert_eq!(handles.backend.opened(), opened);
    assert_eq!(old.status(), ClockStatus::Disposed);
}

#[test]
fn test_cut_seeks_and_fires_once() {
    let mut profile = Profile::new("demo", MEDIA);
    let key = profile.registry.add_default(Category::Cut).unwrap();
    profile.registry.set_start(&key, 2000).unwrap();
    profile.registry.set_stop(&key, Stop::At(7000)).unwrap();
    let (mut preview, handles) = started(&profile);
    assert_eq!(preview.markers().len(), 1);

    let clock = handles.backend.primary().unwrap();
    clock.advance_to(2500);
    preview.pump(&profile).unwrap();

    assert_eq!(clock.seeks(), vec![7000]);
    assert_eq!(clock.time_ms(), 7000);
    assert!(preview.markers().is_empty());
    assert!(clock.markers().is_empty());
    assert_eq!(preview.time_text(), "00:07/00:20");
}

#[test]
fn test_rewind_cut_is_stored_as_rewind() {
    let mut profile = Profile::new("demo", MEDIA);
    let key = profile.registry.add_default(Category::Cut).unwrap();
    profile.registry.set_start(&key, 9000).unwrap();
    profile.registry.set_stop(&key, Stop::At(3000)).unwrap();
    match profile.registry.get(&key) {
        Some(Transition::Cut(cut)) => assert!(cut.rewind),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_fast_forward_sets_and_restores_rate() {
    let mut profile = Profile::new("demo", MEDIA);
    let key = profile.registry.add_default(Category::FastForward).unwrap();
    profile.registry.set_start(&key, 1000).unwrap();
    profile.registry.set_stop(&key, Stop::At(3000)).unwrap();
    let (mut preview, handles) = started(&profile);
    let clock = handles.backend.primary().unwrap();

    clock.advance_to(1500);
    preview.pump(&profile).unwrap();
    assert_eq!(clock.rate(), 2.0);

    clock.advance_to(3500);
    preview.pump(&profile).unwrap();
    assert_eq!(clock.rate(), 1.0);
}

#[test]
fn test_audio_player_follows_primary_and_is_released() {
    let mut profile = Profile::new("demo", MEDIA);
    profile
        .registry
        .insert(
            "Audio00",
            Transition::Audio(AudioClip {
                path: Some(STING.into()),
                start_ms: Some(1000),
                stop: Stop::At(4000),
                play_rate: 1.0,
                volume: 0.5,
                seek_fraction: 0.25,
            }),
        )
        .unwrap();
    let (mut preview, handles) = started(&profile);
    let clock = handles.backend.primary().unwrap();

    clock.advance_to(1500);
    preview.pump(&profile).unwrap();
    assert_eq!(preview.active_players(), vec!["Audio00".to_string()]);
    assert!(handles.backend.player_events().contains(&PlayerEvent::Started {
        path: STING.into(),
        seek_fraction: 0.25,
        rate: 1.0,
        volume: 0.5,
    }));

    preview.pause().unwrap();
    preview.pump(&profile).unwrap();
    assert_eq!(
        handles.backend.player_events().last(),
        Some(&PlayerEvent::Paused(STING.into()))
    );

    preview.close();
    assert_eq!(handles.backend.live_players(), 0);
    assert_eq!(clock.status(), ClockStatus::Disposed);
    let events = handles.backend.player_events();
    assert_eq!(
        &events[events.len() - 2..],
        &[
            PlayerEvent::Stopped(STING.into()),
            PlayerEvent::Disposed(STING.into())
        ]
    );
}

#[test]
fn test_missing_primary_media_fails_to_load() {
    let profile = Profile::new("ghost", "/media/not-there.mp4");
    let (mut preview, _) = preview();
    let err = preview.open(&profile).unwrap_err();
    assert!(matches!(err, CuelineError::MissingMedia { .. }));
    assert!(err.is_operator_facing());
    assert_eq!(preview.state(), PreviewState::Unloaded);
}

#[test]
fn test_missing_secondary_media_fails_to_arm() {
    let mut profile = Profile::new("demo", MEDIA);
    let key = profile.registry.add_default(Category::Audio).unwrap();
    let mut audio = profile.registry.get(&key).unwrap().clone();
    if let Transition::Audio(clip) = &mut audio {
        clip.path = Some("/media/gone.wav".into());
    }
    profile.registry.update(&key, audio).unwrap();

    let (mut preview, handles) = preview();
    let err = preview.open(&profile).unwrap_err();
    assert!(matches!(err, CuelineError::MissingMedia { path } if path.ends_with("gone.wav")));
    assert_eq!(preview.state(), PreviewState::Unloaded);
    assert_eq!(
        handles.backend.primary().unwrap().status(),
        ClockStatus::Disposed
    );
}

#[test]
fn test_capture_stop_then_start_rebuilds_and_reseeks() {
    let mut profile = Profile::new("demo", MEDIA);
    let key = profile.registry.add_default(Category::Text).unwrap();
    let (mut preview, handles) = started(&profile);
    assert!(preview.markers().is_empty());

    handles.backend.primary().unwrap().advance_to(3000);
    preview.pump(&profile).unwrap();
    assert_eq!(preview.select_transition(&mut profile, &key).unwrap(), 3000);
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![2950]);
    assert_eq!(preview.markers().len(), 1);

    handles.backend.primary().unwrap().advance_to(6000);
    preview.pump(&profile).unwrap();
    assert_eq!(
        preview.capture_stop(&mut profile, &key).unwrap(),
        Stop::At(6000)
    );
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![6050]);
    assert_eq!(preview.markers().len(), 2);

    // The playhead now sits past the stop.
    let err = preview.capture_start(&mut profile, &key).unwrap_err();
    assert!(matches!(err, CuelineError::InvalidRange { .. }));
    assert_eq!(profile.registry.get(&key).unwrap().start_ms(), Some(3000));
}

#[test]
fn test_second_request_for_same_start_is_bumped() {
    let mut profile = Profile::new("demo", MEDIA);
    let a = profile.registry.add_default(Category::Text).unwrap();
    let b = profile.registry.add_default(Category::Image).unwrap();
    assert_eq!(profile.registry.set_start(&a, 1000).unwrap(), 1000);
    assert_eq!(profile.registry.set_start(&b, 1000).unwrap(), 1001);
}

#[test]
fn test_move_overlay_writes_canvas_position() {
    let mut profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    preview.on_view_resized(640.0, 360.0);
    handles.timers.advance(500);
    preview.pump(&profile).unwrap();

    handles.backend.primary().unwrap().advance_to(1500);
    preview.pump(&profile).unwrap();
    let (x, y) = preview.move_overlay(&mut profile, "Text00", 50.0, 25.0).unwrap();
    assert_eq!((x, y), (100, 50));
    assert_eq!(profile.registry.get("Text00").unwrap().position(), Some((100, 50)));
}

#[test]
fn test_resize_is_debounced() {
    let profile = hello_profile();
    let (mut preview, handles) = started(&profile);

    preview.on_view_resized(1920.0, 1080.0);
    handles.timers.advance(200);
    preview.on_view_resized(640.0, 360.0);
    assert_eq!(handles.timers.pending(), vec![TimerKind::ResizeShrink]);

    handles.timers.advance(499);
    preview.pump(&profile).unwrap();
    assert_eq!(preview.scale(), &CanvasScale::identity());

    handles.timers.advance(1);
    preview.pump(&profile).unwrap();
    assert_eq!(preview.scale().height_ratio, 0.5);
    assert_eq!(preview.scale().width_ratio, 0.5);
}

#[test]
fn test_end_of_media_replays() {
    let profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    let generation = preview.generation();
    handles.backend.primary().unwrap().advance_to(20_000);
    preview.pump(&profile).unwrap();
    assert!(preview.generation() > generation);
    assert_eq!(handles.backend.opened(), 2);
    assert_eq!(preview.state(), PreviewState::Playing);
    assert!(preview.active_overlays().is_empty());
}

/// Advance the current clock to `ms` and apply the resulting events.
fn play_to(preview: &mut PreviewEngine, handles: &SimHandles, profile: &Profile, ms: u64) {
    handles.backend.primary().unwrap().advance_to(ms);
    preview.pump(profile).unwrap();
}

#[test]
fn test_edit_reseeks_before_edited_start() {
    let mut profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    play_to(&mut preview, &handles, &profile, 2000);
    assert_eq!(preview.active_overlays(), vec!["Text00".to_string()]);

    let mut edited = profile.registry.get("Text00").unwrap().clone();
    if let Transition::Text(text) = &mut edited {
        text.x = 100;
    }
    preview.edit_transition(&mut profile, "Text00", edited).unwrap();
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![950]);
    assert!(preview.active_overlays().is_empty());

    play_to(&mut preview, &handles, &profile, 2500);
    assert_eq!(preview.active_overlays(), vec!["Text00".to_string()]);
    assert_eq!(handles.surface.visible(), vec!["Text00".to_string()]);
}

#[test]
fn test_selecting_new_transition_presents_it() {
    let mut profile = Profile::new("demo", MEDIA);
    let (mut preview, handles) = started(&profile);
    play_to(&mut preview, &handles, &profile, 3000);

    let key = preview.add_transition(&mut profile, Category::Text).unwrap();
    assert_eq!(preview.select_transition(&mut profile, &key).unwrap(), 3000);
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![2950]);

    play_to(&mut preview, &handles, &profile, 4000);
    assert_eq!(preview.active_overlays(), vec![key.clone()]);
    assert_eq!(handles.surface.presents_of(&key), 1);
}

#[test]
fn test_rename_reseeks_before_renamed_start() {
    let mut profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    play_to(&mut preview, &handles, &profile, 2000);

    preview
        .rename_transition(&mut profile, "Text00", "Caption")
        .unwrap();
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![950]);

    play_to(&mut preview, &handles, &profile, 1500);
    assert_eq!(preview.active_overlays(), vec!["Caption".to_string()]);
}

#[test]
fn test_open_stop_reseeks_and_keeps_overlay() {
    let mut profile = hello_profile();
    let (mut preview, handles) = started(&profile);
    play_to(&mut preview, &handles, &profile, 2000);

    assert_eq!(
        preview.set_stop_open(&mut profile, "Text00").unwrap(),
        Stop::Open
    );
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![950]);
    assert_eq!(preview.markers().len(), 1);

    play_to(&mut preview, &handles, &profile, 6000);
    assert_eq!(preview.active_overlays(), vec!["Text00".to_string()]);
}

#[test]
fn test_remove_reseeks_to_selection_or_playhead() {
    let mut profile = hello_profile();
    let extra = profile.registry.add_default(Category::Text).unwrap();
    profile.registry.set_start(&extra, 1500).unwrap();
    profile.registry.set_stop(&extra, Stop::At(2500)).unwrap();
    let (mut preview, handles) = started(&profile);
    play_to(&mut preview, &handles, &profile, 2000);

    // Nothing selected: resume at the playhead.
    preview.remove_transition(&mut profile, &extra).unwrap();
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![2000]);
    assert!(preview.active_overlays().is_empty());

    let other = profile.registry.add_default(Category::Text).unwrap();
    profile.registry.set_start(&other, 3000).unwrap();
    preview.select_transition(&mut profile, "Text00").unwrap();
    preview.remove_transition(&mut profile, &other).unwrap();
    preview.pump(&profile).unwrap();
    assert_eq!(handles.backend.primary().unwrap().seeks(), vec![950]);

    play_to(&mut preview, &handles, &profile, 1200);
    assert_eq!(preview.active_overlays(), vec!["Text00".to_string()]);
}
