//! Property-based tests for the transition codec, timestamp allocation and
//! marker table construction.

use std::path::PathBuf;

use cueline_project_model::{
    AudioClip, Category, Cut, FastForward, ImageOverlay, MarkerAction, MarkerKey, MarkerTable,
    Stop, TextOverlay, Transition, TransitionRegistry, VideoClip,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn start_strategy() -> impl Strategy<Value = Option<u64>> {
    prop::option::of(0u64..10_000_000)
}

fn stop_strategy() -> impl Strategy<Value = Stop> {
    prop_oneof![Just(Stop::Open), (0u64..10_000_000).prop_map(Stop::At)]
}

fn path_strategy() -> impl Strategy<Value = Option<PathBuf>> {
    prop::option::of("[a-z0-9_]{1,12}\\.(mp4|png|wav)".prop_map(|s| PathBuf::from(format!("/media/{s}"))))
}

fn real() -> impl Strategy<Value = f64> {
    -1000.0f64..1000.0
}

fn transition_strategy() -> impl Strategy<Value = Transition> {
    prop_oneof![
        (
            prop::option::of("[A-Za-z][A-Za-z0-9]{0,11}"),
            real(),
            any::<i32>(),
            any::<i32>(),
            start_strategy(),
            stop_strategy(),
            "[A-Za-z0-9 ,.!?]{0,40}",
        )
            .prop_map(|(style, font_size, x, y, start_ms, stop, message)| {
                Transition::Text(TextOverlay {
                    style,
                    font_size,
                    x,
                    y,
                    start_ms,
                    stop,
                    message,
                })
            }),
        (
            path_strategy(),
            any::<i32>(),
            any::<i32>(),
            any::<u32>(),
            any::<u32>(),
            start_strategy(),
            stop_strategy(),
            any::<bool>(),
        )
            .prop_map(
                |(path, x, y, width, height, start_ms, stop, preserve_aspect)| {
                    Transition::Image(ImageOverlay {
                        path,
                        x,
                        y,
                        width,
                        height,
                        start_ms,
                        stop,
                        preserve_aspect,
                    })
                }
            ),
        (path_strategy(), start_strategy(), stop_strategy(), real(), real(), 0.0f64..1.0)
            .prop_map(|(path, start_ms, stop, play_rate, volume, seek_fraction)| {
                Transition::Audio(AudioClip {
                    path,
                    start_ms,
                    stop,
                    play_rate,
                    volume,
                    seek_fraction,
                })
            }),
        (
            (path_strategy(), start_strategy(), stop_strategy(), real(), real()),
            (any::<i32>(), any::<i32>(), any::<u32>(), any::<u32>()),
            (0.0f64..1.0, any::<bool>()),
        )
            .prop_map(
                |(
                    (path, start_ms, stop, play_rate, volume),
                    (x, y, width, height),
                    (seek_fraction, preserve_aspect),
                )| {
                    Transition::Video(VideoClip {
                        path,
                        start_ms,
                        stop,
                        play_rate,
                        volume,
                        x,
                        y,
                        width,
                        height,
                        seek_fraction,
                        preserve_aspect,
                    })
                }
            ),
        (start_strategy(), stop_strategy(), real(), real()).prop_map(
            |(start_ms, stop, start_rate, stop_rate)| {
                Transition::FastForward(FastForward {
                    start_ms,
                    stop,
                    start_rate,
                    stop_rate,
                })
            }
        ),
        (start_strategy(), stop_strategy(), any::<bool>())
            .prop_map(|(start_ms, stop, rewind)| Transition::Cut(Cut {
                start_ms,
                stop,
                rewind,
            })),
    ]
}

fn category_strategy() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

#[derive(Debug, Clone)]
enum Edit {
    Start { slot: usize, ms: u64 },
    Stop { slot: usize, stop: Stop },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..6, 0u64..3000).prop_map(|(slot, ms)| Edit::Start { slot, ms }),
        (0usize..6, stop_strategy_small()).prop_map(|(slot, stop)| Edit::Stop { slot, stop }),
    ]
}

fn stop_strategy_small() -> impl Strategy<Value = Stop> {
    prop_oneof![
        1 => Just(Stop::Open),
        6 => (0u64..3000).prop_map(Stop::At),
    ]
}

fn edited_registry(
    categories: &[Category],
    edits: &[Edit],
) -> (TransitionRegistry, Vec<String>) {
    let mut registry = TransitionRegistry::default();
    let keys: Vec<String> = categories
        .iter()
        .map(|c| registry.add_default(*c).unwrap())
        .collect();
    for edit in edits {
        // Rejected edits (inverted ranges, unresolved cut starts) leave the
        // registry unchanged; only the accepted state matters here.
        let _ = match edit {
            Edit::Start { slot, ms } => registry
                .set_start(&keys[slot % keys.len()], *ms)
                .map(|_| ()),
            Edit::Stop { slot, stop } => registry
                .set_stop(&keys[slot % keys.len()], *stop)
                .map(|_| ()),
        };
    }
    (registry, keys)
}

// =============================================================================
// Codec
// =============================================================================

proptest! {
    /// Decoding an encoded record yields the same record.
    #[test]
    fn roundtrip_transition_records(transition in transition_strategy()) {
        let encoded = transition.encode().unwrap();
        let decoded = Transition::decode(transition.category(), &encoded).unwrap();
        prop_assert_eq!(decoded, transition);
    }

    /// Decoding arbitrary text never panics.
    #[test]
    fn decode_arbitrary_text_is_total(category in category_strategy(), record in ".{0,80}") {
        let _ = Transition::decode(category, &record);
    }
}

// =============================================================================
// Allocation
// =============================================================================

proptest! {
    /// No two record ends share a scheduling timestamp after any edits.
    #[test]
    fn allocated_timestamps_are_unique(
        categories in prop::collection::vec(category_strategy(), 1..6),
        edits in prop::collection::vec(edit_strategy(), 0..40),
    ) {
        let (registry, _) = edited_registry(&categories, &edits);
        prop_assert!(registry.collisions().is_empty(), "{:?}", registry.collisions());
    }

    /// Non-cut transitions keep start before stop; cuts flag a backwards
    /// target as a rewind.
    #[test]
    fn allocated_ranges_are_ordered(
        categories in prop::collection::vec(category_strategy(), 1..6),
        edits in prop::collection::vec(edit_strategy(), 0..40),
    ) {
        let (registry, _) = edited_registry(&categories, &edits);
        for (key, transition) in registry.iter() {
            let (Some(start), Stop::At(stop)) = (transition.start_ms(), transition.stop()) else {
                continue;
            };
            match transition {
                Transition::Cut(cut) => prop_assert_eq!(cut.rewind, start > stop, "{}", key),
                _ => prop_assert!(start < stop, "{} has {}..{}", key, start, stop),
            }
        }
    }

    /// Every start is at or above the allocation floor.
    #[test]
    fn allocated_starts_respect_floor(
        categories in prop::collection::vec(category_strategy(), 1..6),
        edits in prop::collection::vec(edit_strategy(), 0..40),
    ) {
        let (registry, _) = edited_registry(&categories, &edits);
        for (_, transition) in registry.iter() {
            if let Some(start) = transition.start_ms() {
                prop_assert!(start >= 20);
            }
        }
    }
}

// =============================================================================
// Marker table
// =============================================================================

proptest! {
    /// Each scheduled non-cut transition has one Add marker, and one Remove
    /// marker exactly when its stop is not open.
    #[test]
    fn markers_are_symmetric(
        categories in prop::collection::vec(category_strategy(), 1..6),
        edits in prop::collection::vec(edit_strategy(), 0..40),
    ) {
        let (registry, keys) = edited_registry(&categories, &edits);
        let table = MarkerTable::build(&registry);

        for key in &keys {
            let transition = registry.get(key).unwrap();
            let category = transition.category();
            let count = |action: MarkerAction| {
                table
                    .iter()
                    .filter(|m| m.key.action == action && m.key.key == *key)
                    .count()
            };
            let adds = count(MarkerAction::Add);
            let removes = count(MarkerAction::Remove);

            if transition.start_ms().is_none() {
                prop_assert_eq!(adds + removes, 0);
                continue;
            }
            prop_assert_eq!(adds, 1);
            let expected_removes = match (category, transition.stop()) {
                (Category::Cut, _) | (_, Stop::Open) => 0,
                _ => 1,
            };
            prop_assert_eq!(removes, expected_removes);
            prop_assert_eq!(
                table.time_of(&MarkerKey::add(category, key.clone())),
                transition.start_ms()
            );
        }

        let times: Vec<u64> = table.iter().map(|m| m.at_ms).collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        prop_assert_eq!(times, sorted);
    }

    /// Rebuilding from an unchanged registry yields the same table.
    #[test]
    fn marker_table_is_deterministic(
        categories in prop::collection::vec(category_strategy(), 1..6),
        edits in prop::collection::vec(edit_strategy(), 0..40),
    ) {
        let (registry, _) = edited_registry(&categories, &edits);
        prop_assert_eq!(MarkerTable::build(&registry), MarkerTable::build(&registry));
    }
}
