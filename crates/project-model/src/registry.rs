//! Transition registry for one assembled video.
//!
//! The registry exclusively owns every transition record, keyed by a
//! marker-key that is unique across all six categories. It also owns the
//! operator-facing ordering of keys and the timestamp allocator, so the
//! used-timestamp set is always exactly the start and non-open stop values
//! of the records it holds.

use std::collections::{BTreeMap, BTreeSet};

use cueline_common::{CuelineError, CuelineResult};

use crate::allocator::{Slot, TimestampAllocator};
use crate::transition::{Category, Stop, Transition};

/// Encoded records grouped by category, as persisted.
pub type EncodedRecords = BTreeMap<Category, BTreeMap<String, String>>;

/// Store of transition records keyed by marker-key.
#[derive(Debug, Clone, Default)]
pub struct TransitionRegistry {
    entries: BTreeMap<String, Transition>,
    order: Vec<String>,
    allocator: TimestampAllocator,
    dirty: bool,
}

impl TransitionRegistry {
    pub fn new(allocator: TimestampAllocator) -> Self {
        Self {
            allocator,
            ..Self::default()
        }
    }

    pub fn set_allocator(&mut self, allocator: TimestampAllocator) {
        self.allocator = allocator;
    }

    pub fn allocator(&self) -> &TimestampAllocator {
        &self.allocator
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Transition> {
        self.entries.get(key)
    }

    /// Look up a record, failing with `UnknownTransition`.
    pub fn require(&self, key: &str) -> CuelineResult<&Transition> {
        self.entries
            .get(key)
            .ok_or_else(|| CuelineError::unknown_transition(key))
    }

    /// Marker-keys in operator order.
    pub fn ordered_keys(&self) -> &[String] {
        &self.order
    }

    /// Records in operator order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Transition)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|t| (k.as_str(), t)))
    }

    /// Records of one category in operator order.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = (&str, &Transition)> {
        self.iter().filter(move |(_, t)| t.category() == category)
    }

    /// Live entry count for a category.
    pub fn count(&self, category: Category) -> usize {
        self.entries
            .values()
            .filter(|t| t.category() == category)
            .count()
    }

    /// Count-derived default key for the next transition of `category`.
    ///
    /// Deleting an entry shifts the names handed out afterwards.
    pub fn default_key_for(&self, category: Category) -> String {
        category.default_key(self.count(category))
    }

    /// Whether the registry changed since it was loaded or last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Every scheduling timestamp currently in use.
    pub fn used_timestamps(&self) -> BTreeSet<u64> {
        self.timestamps_except(None)
    }

    fn timestamps_except(&self, skip: Option<(&str, Slot)>) -> BTreeSet<u64> {
        let mut used = BTreeSet::new();
        for (key, t) in &self.entries {
            let skip_slot = skip.and_then(|(k, slot)| (k == key.as_str()).then_some(slot));
            if skip_slot != Some(Slot::Start) {
                used.extend(t.start_ms());
            }
            if skip_slot != Some(Slot::Stop) {
                used.extend(t.stop().ms());
            }
        }
        used
    }

    /// Timestamps claimed by more than one record end, with their owners.
    pub fn collisions(&self) -> Vec<(u64, Vec<String>)> {
        let mut owners: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for (key, t) in &self.entries {
            for ms in t.start_ms().into_iter().chain(t.stop().ms()) {
                owners.entry(ms).or_default().push(key.clone());
            }
        }
        owners.into_iter().filter(|(_, keys)| keys.len() > 1).collect()
    }

    /// Insert a record under a new key.
    pub fn insert(&mut self, key: impl Into<String>, transition: Transition) -> CuelineResult<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(CuelineError::DuplicateKey { key });
        }
        self.order.push(key.clone());
        self.entries.insert(key, transition);
        self.dirty = true;
        Ok(())
    }

    /// Create a default record of `category` and return its key.
    ///
    /// Starts from the count-derived default name and moves past names that
    /// are still taken after an earlier delete.
    pub fn add_default(&mut self, category: Category) -> CuelineResult<String> {
        let mut count = self.count(category);
        let mut key = category.default_key(count);
        while self.entries.contains_key(&key) {
            count += 1;
            key = category.default_key(count);
        }
        self.insert(key.clone(), Transition::default_for(category))?;
        tracing::debug!(key = %key, %category, "Transition created");
        Ok(key)
    }

    /// Remove a record, releasing its timestamps.
    pub fn remove(&mut self, key: &str) -> CuelineResult<Transition> {
        let removed = self
            .entries
            .remove(key)
            .ok_or_else(|| CuelineError::unknown_transition(key))?;
        self.order.retain(|k| k != key);
        self.dirty = true;
        Ok(removed)
    }

    /// Move a record to a new key, keeping its position in the order.
    pub fn rename(&mut self, old: &str, new: &str) -> CuelineResult<()> {
        if old == new {
            return self.require(old).map(|_| ());
        }
        if self.entries.contains_key(new) {
            return Err(CuelineError::DuplicateKey {
                key: new.to_string(),
            });
        }
        let transition = self
            .entries
            .remove(old)
            .ok_or_else(|| CuelineError::unknown_transition(old))?;
        self.entries.insert(new.to_string(), transition);
        for k in self.order.iter_mut().filter(|k| k.as_str() == old) {
            *k = new.to_string();
        }
        self.dirty = true;
        Ok(())
    }

    /// Replace every non-timing field of a record.
    ///
    /// The record keeps its allocated start and stop; timing changes go
    /// through [`set_start`](Self::set_start) and [`set_stop`](Self::set_stop).
    pub fn update(&mut self, key: &str, mut transition: Transition) -> CuelineResult<()> {
        let current = self
            .entries
            .get_mut(key)
            .ok_or_else(|| CuelineError::unknown_transition(key))?;
        if current.category() != transition.category() {
            return Err(CuelineError::unsupported(
                key,
                format!("changing category to {}", transition.category()),
            ));
        }
        transition.take_timing_from(current);
        if *current != transition {
            *current = transition;
            self.dirty = true;
        }
        Ok(())
    }

    /// Allocate and store a start time. Returns the accepted offset.
    pub fn set_start(&mut self, key: &str, requested_ms: u64) -> CuelineResult<u64> {
        let current = self.require(key)?;
        let stop = current.stop();
        let is_cut = current.category() == Category::Cut;

        let used = self.timestamps_except(Some((key, Slot::Start)));
        let start = self.allocator.allocate(&used, requested_ms, Slot::Start)?;

        if let (false, Stop::At(stop_ms)) = (is_cut, stop) {
            if start >= stop_ms {
                return Err(CuelineError::InvalidRange {
                    key: key.to_string(),
                    start_ms: start,
                    stop_ms,
                });
            }
        }

        if let Some(t) = self.entries.get_mut(key) {
            t.set_start_raw(Some(start));
        }
        self.dirty = true;
        tracing::debug!(key, requested_ms, start, "Start allocated");
        Ok(start)
    }

    /// Allocate and store a stop time. Returns the accepted stop.
    ///
    /// A zero stop means open for overlays and players. A cut always needs
    /// a target, so an open or zero stop becomes `start + 10ms`.
    pub fn set_stop(&mut self, key: &str, requested: Stop) -> CuelineResult<Stop> {
        let current = self.require(key)?;
        let start = current.start_ms();
        let is_cut = current.category() == Category::Cut;

        let requested = match (is_cut, requested) {
            (true, Stop::Open | Stop::At(0)) => {
                let start_ms = start.ok_or_else(|| {
                    CuelineError::unsupported(key, "setting a cut target before its start")
                })?;
                Stop::At(start_ms + 10)
            }
            (false, Stop::At(0)) => Stop::Open,
            (_, other) => other,
        };

        let stop = match requested {
            Stop::Open => Stop::Open,
            Stop::At(ms) => {
                let used = self.timestamps_except(Some((key, Slot::Stop)));
                let stop_ms = self.allocator.allocate(&used, ms, Slot::Stop)?;
                if let (false, Some(start_ms)) = (is_cut, start) {
                    if stop_ms <= start_ms {
                        return Err(CuelineError::InvalidRange {
                            key: key.to_string(),
                            start_ms,
                            stop_ms,
                        });
                    }
                }
                Stop::At(stop_ms)
            }
        };

        if let Some(t) = self.entries.get_mut(key) {
            t.set_stop_raw(stop);
        }
        self.dirty = true;
        tracing::debug!(key, %stop, "Stop allocated");
        Ok(stop)
    }

    /// Resolve a `_DEFAULT` start to the playhead, as happens when a fresh
    /// transition is first selected for editing.
    pub fn resolve_start(&mut self, key: &str, playhead_ms: u64) -> CuelineResult<u64> {
        match self.require(key)?.start_ms() {
            Some(start) => Ok(start),
            None => self.set_start(key, playhead_ms),
        }
    }

    /// Move an overlay on the authoring canvas.
    pub fn set_position(&mut self, key: &str, x: i32, y: i32) -> CuelineResult<()> {
        let t = self
            .entries
            .get_mut(key)
            .ok_or_else(|| CuelineError::unknown_transition(key))?;
        match t {
            Transition::Text(o) => (o.x, o.y) = (x, y),
            Transition::Image(o) => (o.x, o.y) = (x, y),
            Transition::Video(o) => (o.x, o.y) = (x, y),
            _ => return Err(CuelineError::unsupported(key, "moving")),
        }
        self.dirty = true;
        Ok(())
    }

    /// Resize an image or video overlay on the authoring canvas.
    pub fn set_size(&mut self, key: &str, width: u32, height: u32) -> CuelineResult<()> {
        let t = self
            .entries
            .get_mut(key)
            .ok_or_else(|| CuelineError::unknown_transition(key))?;
        match t {
            Transition::Image(o) => (o.width, o.height) = (width, height),
            Transition::Video(o) => (o.width, o.height) = (width, height),
            _ => return Err(CuelineError::unsupported(key, "resizing")),
        }
        self.dirty = true;
        Ok(())
    }

    /// Change the message of a text overlay.
    pub fn set_message(&mut self, key: &str, message: impl Into<String>) -> CuelineResult<()> {
        match self.entries.get_mut(key) {
            Some(Transition::Text(o)) => o.message = message.into(),
            Some(_) => return Err(CuelineError::unsupported(key, "editing the message")),
            None => return Err(CuelineError::unknown_transition(key)),
        }
        self.dirty = true;
        Ok(())
    }

    /// Change the font size of a text overlay.
    pub fn set_font_size(&mut self, key: &str, font_size: f64) -> CuelineResult<()> {
        match self.entries.get_mut(key) {
            Some(Transition::Text(o)) => o.font_size = font_size,
            Some(_) => return Err(CuelineError::unsupported(key, "changing the font size")),
            None => return Err(CuelineError::unknown_transition(key)),
        }
        self.dirty = true;
        Ok(())
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.dirty = true;
        }
        self.entries.clear();
        self.order.clear();
    }

    /// Encode every record, grouped by category.
    pub fn encode_records(&self) -> CuelineResult<EncodedRecords> {
        let mut out: EncodedRecords = Category::ALL
            .iter()
            .map(|c| (*c, BTreeMap::new()))
            .collect();
        for (key, t) in &self.entries {
            out.entry(t.category())
                .or_default()
                .insert(key.clone(), t.encode()?);
        }
        Ok(out)
    }

    /// Decode a full set of records into a fresh registry.
    ///
    /// Keys missing from `order` are appended in key order. Nothing is
    /// returned unless every record decodes.
    pub fn decode_records(
        order: &[String],
        records: &EncodedRecords,
        allocator: TimestampAllocator,
    ) -> CuelineResult<Self> {
        let mut entries = BTreeMap::new();
        for (category, map) in records {
            for (key, record) in map {
                let t = Transition::decode(*category, record).map_err(|e| match e {
                    CuelineError::MalformedRecord { category, reason } => {
                        CuelineError::MalformedRecord {
                            category,
                            reason: format!("{key}: {reason}"),
                        }
                    }
                    other => other,
                })?;
                if entries.insert(key.clone(), t).is_some() {
                    return Err(CuelineError::DuplicateKey { key: key.clone() });
                }
            }
        }

        let mut seen = BTreeSet::new();
        let mut ordered: Vec<String> = order
            .iter()
            .filter(|k| entries.contains_key(k.as_str()) && seen.insert(k.as_str()))
            .cloned()
            .collect();
        for key in entries.keys() {
            if !seen.contains(key.as_str()) {
                ordered.push(key.clone());
            }
        }

        Ok(Self {
            entries,
            order: ordered,
            allocator,
            dirty: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Cut;

    fn registry_with_text(key: &str, start: u64, stop: Stop) -> TransitionRegistry {
        let mut reg = TransitionRegistry::default();
        reg.insert(key, Transition::default_for(Category::Text)).unwrap();
        reg.set_start(key, start).unwrap();
        reg.set_stop(key, stop).unwrap();
        reg
    }

    #[test]
    fn test_add_default_names_follow_counts() {
        let mut reg = TransitionRegistry::default();
        assert_eq!(reg.add_default(Category::Text).unwrap(), "Text00");
        assert_eq!(reg.add_default(Category::Text).unwrap(), "Text01");
        assert_eq!(reg.add_default(Category::Cut).unwrap(), "Cut1");
        assert_eq!(reg.add_default(Category::FastForward).unwrap(), "FF1");
        assert_eq!(reg.ordered_keys(), ["Text00", "Text01", "Cut1", "FF1"]);
    }

    #[test]
    fn test_add_default_after_delete_skips_taken_name() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Text).unwrap();
        reg.add_default(Category::Text).unwrap();
        reg.remove("Text00").unwrap();
        assert_eq!(reg.default_key_for(Category::Text), "Text01");
        assert_eq!(reg.add_default(Category::Text).unwrap(), "Text02");
    }

    #[test]
    fn test_colliding_starts_are_bumped() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Text).unwrap();
        reg.add_default(Category::Image).unwrap();
        assert_eq!(reg.set_start("Text00", 1000).unwrap(), 1000);
        assert_eq!(reg.set_start("Image00", 1000).unwrap(), 1001);
    }

    #[test]
    fn test_resetting_own_start_releases_old_value() {
        let mut reg = registry_with_text("Text00", 1000, Stop::Open);
        assert_eq!(reg.set_start("Text00", 1000).unwrap(), 1000);
        assert_eq!(reg.set_start("Text00", 2000).unwrap(), 2000);
        assert_eq!(reg.used_timestamps(), BTreeSet::from([2000]));
    }

    #[test]
    fn test_open_stop_is_not_used() {
        let reg = registry_with_text("Text00", 1000, Stop::Open);
        assert_eq!(reg.used_timestamps(), BTreeSet::from([1000]));
    }

    #[test]
    fn test_zero_stop_means_open() {
        let mut reg = registry_with_text("Text00", 1000, Stop::At(5000));
        assert_eq!(reg.set_stop("Text00", Stop::At(0)).unwrap(), Stop::Open);
    }

    #[test]
    fn test_stop_before_start_is_rejected() {
        let mut reg = registry_with_text("Text00", 1000, Stop::Open);
        let err = reg.set_stop("Text00", Stop::At(500)).unwrap_err();
        assert!(matches!(err, CuelineError::InvalidRange { .. }));
        assert_eq!(reg.get("Text00").unwrap().stop(), Stop::Open);
    }

    #[test]
    fn test_cut_open_stop_becomes_start_plus_ten() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Cut).unwrap();
        reg.set_start("Cut1", 4000).unwrap();
        assert_eq!(reg.set_stop("Cut1", Stop::Open).unwrap(), Stop::At(4010));
    }

    #[test]
    fn test_cut_backwards_target_sets_rewind() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Cut).unwrap();
        reg.set_start("Cut1", 4000).unwrap();
        reg.set_stop("Cut1", Stop::At(1000)).unwrap();
        assert!(matches!(
            reg.get("Cut1"),
            Some(Transition::Cut(Cut { rewind: true, .. }))
        ));
    }

    #[test]
    fn test_rename_moves_entry_in_place() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Text).unwrap();
        reg.add_default(Category::Audio).unwrap();
        reg.rename("Text00", "Intro").unwrap();
        assert!(reg.get("Text00").is_none());
        assert_eq!(reg.ordered_keys(), ["Intro", "Audio00"]);
    }

    #[test]
    fn test_rename_onto_other_category_fails() {
        let mut reg = TransitionRegistry::default();
        reg.add_default(Category::Text).unwrap();
        reg.add_default(Category::Audio).unwrap();
        let err = reg.rename("Text00", "Audio00").unwrap_err();
        assert!(matches!(err, CuelineError::DuplicateKey { .. }));
        assert!(reg.get("Text00").is_some());
    }

    #[test]
    fn test_remove_releases_timestamps() {
        let mut reg = registry_with_text("Text00", 1000, Stop::At(5000));
        reg.remove("Text00").unwrap();
        assert!(reg.used_timestamps().is_empty());
        assert!(reg.ordered_keys().is_empty());
    }

    #[test]
    fn test_update_keeps_timing() {
        let mut reg = registry_with_text("Text00", 1000, Stop::At(5000));
        let mut edited = Transition::default_for(Category::Text);
        if let Transition::Text(t) = &mut edited {
            t.message = "Hello".into();
        }
        reg.update("Text00", edited).unwrap();
        let t = reg.get("Text00").unwrap();
        assert_eq!(t.start_ms(), Some(1000));
        assert_eq!(t.stop(), Stop::At(5000));
    }

    #[test]
    fn test_update_cannot_change_category() {
        let mut reg = registry_with_text("Text00", 1000, Stop::Open);
        assert!(reg
            .update("Text00", Transition::default_for(Category::Image))
            .is_err());
    }

    #[test]
    fn test_dirty_flag_tracks_mutation() {
        let mut reg = TransitionRegistry::default();
        assert!(!reg.is_dirty());
        reg.add_default(Category::FastForward).unwrap();
        assert!(reg.is_dirty());
        reg.mark_clean();
        reg.set_position("FF1", 1, 1).unwrap_err();
        assert!(!reg.is_dirty());
    }

    #[test]
    fn test_decode_failure_leaves_nothing_behind() {
        let mut records = EncodedRecords::new();
        records
            .entry(Category::Text)
            .or_default()
            .insert("Text00".into(), "_DEFAULT,60.0,1,2,1000,*,ok".into());
        records
            .entry(Category::Cut)
            .or_default()
            .insert("Cut1".into(), "broken".into());
        let err = TransitionRegistry::decode_records(&[], &records, TimestampAllocator::default())
            .unwrap_err();
        assert!(err.to_string().contains("Cut1"));
    }

    #[test]
    fn test_decode_restores_order_and_used_timestamps() {
        let reg = registry_with_text("Text00", 1000, Stop::At(5000));
        let records = reg.encode_records().unwrap();
        let decoded = TransitionRegistry::decode_records(
            reg.ordered_keys(),
            &records,
            TimestampAllocator::default(),
        )
        .unwrap();
        assert_eq!(decoded.ordered_keys(), ["Text00"]);
        assert_eq!(decoded.used_timestamps(), BTreeSet::from([1000, 5000]));
        assert!(!decoded.is_dirty());
    }

    #[test]
    fn test_collisions_are_reported() {
        let mut records = EncodedRecords::new();
        let text = records.entry(Category::Text).or_default();
        text.insert("A".into(), "_DEFAULT,60.0,1,2,1000,*,a".into());
        text.insert("B".into(), "_DEFAULT,60.0,1,2,1000,*,b".into());
        let reg =
            TransitionRegistry::decode_records(&[], &records, TimestampAllocator::default()).unwrap();
        assert_eq!(
            reg.collisions(),
            vec![(1000u64, vec!["A".to_string(), "B".to_string()])]
        );
    }
}
