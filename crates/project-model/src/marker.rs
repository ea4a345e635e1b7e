//! Marker table: the timed events installed on a media clock.
//!
//! Every transition yields an `Add-<Category>-<key>` marker at its start
//! and, unless its stop is open, a `Remove-<Category>-<key>` marker at its
//! stop. A cut fires once: its stop is the seek target, not a removal.

use std::fmt;
use std::str::FromStr;

use cueline_common::CuelineError;

use crate::registry::TransitionRegistry;
use crate::transition::{Category, Stop, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerAction {
    Add,
    Remove,
}

impl MarkerAction {
    pub fn label(self) -> &'static str {
        match self {
            MarkerAction::Add => "Add",
            MarkerAction::Remove => "Remove",
        }
    }
}

/// Marker name in `Action-Category-key` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerKey {
    pub action: MarkerAction,
    pub category: Category,
    pub key: String,
}

impl MarkerKey {
    pub fn add(category: Category, key: impl Into<String>) -> Self {
        Self {
            action: MarkerAction::Add,
            category,
            key: key.into(),
        }
    }

    pub fn remove(category: Category, key: impl Into<String>) -> Self {
        Self {
            action: MarkerAction::Remove,
            category,
            key: key.into(),
        }
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.action.label(),
            self.category.label(),
            self.key
        )
    }
}

impl FromStr for MarkerKey {
    type Err = CuelineError;

    /// Marker-keys may themselves contain `-`; only the first two are split.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(action), Some(category), Some(key)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CuelineError::malformed(
                "marker",
                format!("'{s}' is not Action-Category-key"),
            ));
        };
        let action = match action {
            "Add" => MarkerAction::Add,
            "Remove" => MarkerAction::Remove,
            other => {
                return Err(CuelineError::malformed(
                    "marker",
                    format!("unknown action '{other}'"),
                ))
            }
        };
        if key.is_empty() {
            return Err(CuelineError::malformed("marker", "empty marker-key"));
        }
        Ok(Self {
            action,
            category: category.parse()?,
            key: key.to_string(),
        })
    }
}

/// One scheduled marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub at_ms: u64,
    pub key: MarkerKey,
}

/// Markers for one assembled video, ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerTable {
    markers: Vec<Marker>,
}

impl MarkerTable {
    /// Derive the table from the registry.
    ///
    /// Transitions whose start is still `_DEFAULT` are not scheduled.
    pub fn build(registry: &TransitionRegistry) -> Self {
        let mut markers = Vec::with_capacity(registry.len() * 2);
        for (key, transition) in registry.iter() {
            let category = transition.category();
            let Some(start) = transition.start_ms() else {
                tracing::debug!(key, "Skipping transition with unresolved start");
                continue;
            };
            markers.push(Marker {
                at_ms: start,
                key: MarkerKey::add(category, key),
            });
            if let (false, Stop::At(stop)) = (matches!(transition, Transition::Cut(_)), transition.stop()) {
                markers.push(Marker {
                    at_ms: stop,
                    key: MarkerKey::remove(category, key),
                });
            }
        }
        markers.sort_by(|a, b| a.at_ms.cmp(&b.at_ms).then_with(|| a.key.cmp(&b.key)));
        Self { markers }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    pub fn time_of(&self, key: &MarkerKey) -> Option<u64> {
        self.markers.iter().find(|m| &m.key == key).map(|m| m.at_ms)
    }

    /// Remove one marker; returns whether it was present.
    pub fn remove(&mut self, key: &MarkerKey) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| &m.key != key);
        self.markers.len() != before
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Markers with `from_ms < at_ms <= to_ms`, in time order.
    pub fn crossed(&self, from_ms: u64, to_ms: u64) -> impl Iterator<Item = &Marker> {
        let lo = self.markers.partition_point(|m| m.at_ms <= from_ms);
        let hi = self.markers.partition_point(|m| m.at_ms <= to_ms);
        self.markers[lo..hi.max(lo)].iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_key_round_trips_with_dashes() {
        let key: MarkerKey = "Remove-Text-lower-third".parse().unwrap();
        assert_eq!(key.action, MarkerAction::Remove);
        assert_eq!(key.category, Category::Text);
        assert_eq!(key.key, "lower-third");
        assert_eq!(key.to_string(), "Remove-Text-lower-third");
    }

    #[test]
    fn test_marker_key_rejects_garbage() {
        assert!("Add-Text".parse::<MarkerKey>().is_err());
        assert!("Flip-Text-A".parse::<MarkerKey>().is_err());
        assert!("Add-Sticker-A".parse::<MarkerKey>().is_err());
    }

    #[test]
    fn test_text_scenario_markers() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Text).unwrap();
        reg.set_start("Text00", 1000).unwrap();
        reg.set_stop("Text00", Stop::At(5000)).unwrap();

        let table = MarkerTable::build(&reg);
        let names: Vec<(u64, String)> = table
            .iter()
            .map(|m| (m.at_ms, m.key.to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                (1000, "Add-Text-Text00".to_string()),
                (5000, "Remove-Text-Text00".to_string())
            ]
        );
    }

    #[test]
    fn test_open_stop_and_cut_have_no_remove() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Audio).unwrap();
        reg.set_start("Audio00", 300).unwrap();
        reg.add_default(Category::Cut).unwrap();
        reg.set_start("Cut1", 900).unwrap();
        reg.set_stop("Cut1", Stop::At(100)).unwrap();

        let table = MarkerTable::build(&reg);
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|m| m.key.action == MarkerAction::Add));
        assert_eq!(table.time_of(&MarkerKey::add(Category::Cut, "Cut1")), Some(900));
    }

    #[test]
    fn test_unresolved_start_is_skipped() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Image).unwrap();
        assert!(MarkerTable::build(&reg).is_empty());
    }

    #[test]
    fn test_crossed_window_is_half_open() {
        let mut reg = TransitionRegistry::default();
        for (i, start) in [100u64, 200, 300].iter().enumerate() {
            let key = reg.add_default(Category::FastForward).unwrap();
            assert_eq!(key, format!("FF{}", i + 1));
            reg.set_start(&key, *start).unwrap();
        }
        let table = MarkerTable::build(&reg);
        let hits: Vec<u64> = table.crossed(100, 300).map(|m| m.at_ms).collect();
        assert_eq!(hits, vec![200, 300]);
        assert_eq!(table.crossed(300, 100).count(), 0);
    }
}
