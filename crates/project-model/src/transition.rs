//! Transition records and their delimited wire form.
//!
//! A transition is one time-anchored effect inside an assembled video:
//! - **Text / Image / Video:** overlays placed on the authoring canvas
//! - **Audio / Video:** secondary players with their own sub-clock
//! - **FastForward:** a play-rate change on the primary clock
//! - **Cut:** a one-shot seek of the primary clock
//!
//! Records persist as comma-delimited strings with a fixed field order per
//! category. `_DEFAULT` marks an unresolved value and `*` an open stop.
//! Only the trailing Text message may contain the delimiter.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cueline_common::{CuelineError, CuelineResult};
use serde::{Deserialize, Serialize};

/// Sentinel for an unset path, style reference or start time.
pub const DEFAULT_SENTINEL: &str = "_DEFAULT";

/// Sentinel for an open-ended stop.
pub const OPEN_SENTINEL: &str = "*";

const DELIMITER: char = ',';

/// Transition category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Text,
    Image,
    Audio,
    Video,
    FastForward,
    Cut,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Text,
        Category::Image,
        Category::Audio,
        Category::Video,
        Category::FastForward,
        Category::Cut,
    ];

    /// Label used in marker keys and default transition names.
    pub fn label(self) -> &'static str {
        match self {
            Category::Text => "Text",
            Category::Image => "Image",
            Category::Audio => "Audio",
            Category::Video => "Video",
            Category::FastForward => "FF",
            Category::Cut => "Cut",
        }
    }

    /// Number of delimited fields in the wire form (minimum for Text).
    pub fn field_count(self) -> usize {
        match self {
            Category::Text => 7,
            Category::Image => 8,
            Category::Audio => 6,
            Category::Video => 11,
            Category::FastForward => 4,
            Category::Cut => 3,
        }
    }

    /// Default marker-key for the next transition in this category, given
    /// how many entries the category currently holds.
    ///
    /// Overlay and player categories pad with a literal `0` (`Text00`,
    /// `Text01`), rate and cut categories count from one (`FF1`, `Cut1`).
    pub fn default_key(self, count: usize) -> String {
        match self {
            Category::FastForward | Category::Cut => format!("{}{}", self.label(), count + 1),
            _ => format!("{}0{}", self.label(), count),
        }
    }

    /// Whether the transition draws something on the canvas.
    pub fn is_visual(self) -> bool {
        matches!(self, Category::Text | Category::Image | Category::Video)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = CuelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Text" => Ok(Category::Text),
            "Image" => Ok(Category::Image),
            "Audio" => Ok(Category::Audio),
            "Video" => Ok(Category::Video),
            "FF" | "FastForward" => Ok(Category::FastForward),
            "Cut" => Ok(Category::Cut),
            other => Err(CuelineError::malformed(
                "marker",
                format!("unknown category '{other}'"),
            )),
        }
    }
}

/// End of a transition's active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stop {
    /// Active until end of media; no Remove marker is scheduled.
    Open,
    At(u64),
}

impl Stop {
    pub fn ms(self) -> Option<u64> {
        match self {
            Stop::Open => None,
            Stop::At(ms) => Some(ms),
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Stop::Open)
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stop::Open => f.write_str(OPEN_SENTINEL),
            Stop::At(ms) => write!(f, "{ms}"),
        }
    }
}

/// Caption overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    /// Text style name; `None` is the built-in default style.
    pub style: Option<String>,
    pub font_size: f64,
    pub x: i32,
    pub y: i32,
    pub start_ms: Option<u64>,
    pub stop: Stop,
    pub message: String,
}

/// Still image overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlay {
    pub path: Option<PathBuf>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub start_ms: Option<u64>,
    pub stop: Stop,
    pub preserve_aspect: bool,
}

/// Secondary audio player.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub path: Option<PathBuf>,
    pub start_ms: Option<u64>,
    pub stop: Stop,
    pub play_rate: f64,
    pub volume: f64,
    /// Fraction of the clip's duration to seek to before playing.
    pub seek_fraction: f64,
}

/// Secondary video player shown as an overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoClip {
    pub path: Option<PathBuf>,
    pub start_ms: Option<u64>,
    pub stop: Stop,
    pub play_rate: f64,
    pub volume: f64,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub seek_fraction: f64,
    pub preserve_aspect: bool,
}

/// Play-rate change on the primary clock.
#[derive(Debug, Clone, PartialEq)]
pub struct FastForward {
    pub start_ms: Option<u64>,
    pub stop: Stop,
    pub start_rate: f64,
    pub stop_rate: f64,
}

/// One-shot seek of the primary clock from `start_ms` to `stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    pub start_ms: Option<u64>,
    pub stop: Stop,
    /// Set when the seek target lies before the cut point.
    pub rewind: bool,
}

/// A time-anchored effect in an assembled video.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Text(TextOverlay),
    Image(ImageOverlay),
    Audio(AudioClip),
    Video(VideoClip),
    FastForward(FastForward),
    Cut(Cut),
}

impl Transition {
    /// The record a freshly created transition of `category` starts from.
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Text => Transition::Text(TextOverlay {
                style: None,
                font_size: 60.0,
                x: 485,
                y: 300,
                start_ms: None,
                stop: Stop::Open,
                message: "Default Text".to_string(),
            }),
            Category::Image => Transition::Image(ImageOverlay {
                path: None,
                x: 540,
                y: 260,
                width: 200,
                height: 200,
                start_ms: None,
                stop: Stop::Open,
                preserve_aspect: true,
            }),
            Category::Audio => Transition::Audio(AudioClip {
                path: None,
                start_ms: None,
                stop: Stop::Open,
                play_rate: 1.0,
                volume: 1.0,
                seek_fraction: 0.0,
            }),
            Category::Video => Transition::Video(VideoClip {
                path: None,
                start_ms: None,
                stop: Stop::Open,
                play_rate: 1.0,
                volume: 1.0,
                x: 540,
                y: 300,
                width: 200,
                height: 200,
                seek_fraction: 0.0,
                preserve_aspect: true,
            }),
            Category::FastForward => Transition::FastForward(FastForward {
                start_ms: None,
                stop: Stop::Open,
                start_rate: 2.0,
                stop_rate: 1.0,
            }),
            Category::Cut => Transition::Cut(Cut {
                start_ms: None,
                stop: Stop::Open,
                rewind: false,
            }),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Transition::Text(_) => Category::Text,
            Transition::Image(_) => Category::Image,
            Transition::Audio(_) => Category::Audio,
            Transition::Video(_) => Category::Video,
            Transition::FastForward(_) => Category::FastForward,
            Transition::Cut(_) => Category::Cut,
        }
    }

    pub fn start_ms(&self) -> Option<u64> {
        match self {
            Transition::Text(t) => t.start_ms,
            Transition::Image(t) => t.start_ms,
            Transition::Audio(t) => t.start_ms,
            Transition::Video(t) => t.start_ms,
            Transition::FastForward(t) => t.start_ms,
            Transition::Cut(t) => t.start_ms,
        }
    }

    pub fn stop(&self) -> Stop {
        match self {
            Transition::Text(t) => t.stop,
            Transition::Image(t) => t.stop,
            Transition::Audio(t) => t.stop,
            Transition::Video(t) => t.stop,
            Transition::FastForward(t) => t.stop,
            Transition::Cut(t) => t.stop,
        }
    }

    /// Set the start without allocation. Use the registry for edits.
    pub(crate) fn set_start_raw(&mut self, start: Option<u64>) {
        match self {
            Transition::Text(t) => t.start_ms = start,
            Transition::Image(t) => t.start_ms = start,
            Transition::Audio(t) => t.start_ms = start,
            Transition::Video(t) => t.start_ms = start,
            Transition::FastForward(t) => t.start_ms = start,
            Transition::Cut(t) => t.start_ms = start,
        }
        self.refresh_rewind();
    }

    /// Set the stop without allocation. Use the registry for edits.
    pub(crate) fn set_stop_raw(&mut self, stop: Stop) {
        match self {
            Transition::Text(t) => t.stop = stop,
            Transition::Image(t) => t.stop = stop,
            Transition::Audio(t) => t.stop = stop,
            Transition::Video(t) => t.stop = stop,
            Transition::FastForward(t) => t.stop = stop,
            Transition::Cut(t) => t.stop = stop,
        }
        self.refresh_rewind();
    }

    fn refresh_rewind(&mut self) {
        if let Transition::Cut(cut) = self {
            if let (Some(start), Stop::At(stop)) = (cut.start_ms, cut.stop) {
                cut.rewind = start > stop;
            }
        }
    }

    /// Media file played or shown by this transition, if resolved.
    pub fn media_path(&self) -> Option<&Path> {
        match self {
            Transition::Image(t) => t.path.as_deref(),
            Transition::Audio(t) => t.path.as_deref(),
            Transition::Video(t) => t.path.as_deref(),
            _ => None,
        }
    }

    /// Canvas position for overlays.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self {
            Transition::Text(t) => Some((t.x, t.y)),
            Transition::Image(t) => Some((t.x, t.y)),
            Transition::Video(t) => Some((t.x, t.y)),
            _ => None,
        }
    }

    /// Canvas size for image and video overlays.
    pub fn size(&self) -> Option<(u32, u32)> {
        match self {
            Transition::Image(t) => Some((t.width, t.height)),
            Transition::Video(t) => Some((t.width, t.height)),
            _ => None,
        }
    }

    /// Copy the timing of `other` onto this record.
    pub(crate) fn take_timing_from(&mut self, other: &Transition) {
        self.set_start_raw(other.start_ms());
        self.set_stop_raw(other.stop());
        if let (Transition::Cut(mine), Transition::Cut(theirs)) = (&mut *self, other) {
            mine.rewind = theirs.rewind;
        }
    }

    /// Encode to the delimited wire form.
    pub fn encode(&self) -> CuelineResult<String> {
        let category = self.category();
        let fields: Vec<String> = match self {
            Transition::Text(t) => vec![
                encode_ref(category, t.style.as_deref())?,
                fmt_f64(t.font_size),
                t.x.to_string(),
                t.y.to_string(),
                encode_start(t.start_ms),
                t.stop.to_string(),
                t.message.clone(),
            ],
            Transition::Image(t) => vec![
                encode_path(category, t.path.as_deref())?,
                t.x.to_string(),
                t.y.to_string(),
                t.width.to_string(),
                t.height.to_string(),
                encode_start(t.start_ms),
                t.stop.to_string(),
                t.preserve_aspect.to_string(),
            ],
            Transition::Audio(t) => vec![
                encode_path(category, t.path.as_deref())?,
                encode_start(t.start_ms),
                t.stop.to_string(),
                fmt_f64(t.play_rate),
                fmt_f64(t.volume),
                fmt_f64(t.seek_fraction),
            ],
            Transition::Video(t) => vec![
                encode_path(category, t.path.as_deref())?,
                encode_start(t.start_ms),
                t.stop.to_string(),
                fmt_f64(t.play_rate),
                fmt_f64(t.volume),
                t.x.to_string(),
                t.y.to_string(),
                t.width.to_string(),
                t.height.to_string(),
                fmt_f64(t.seek_fraction),
                t.preserve_aspect.to_string(),
            ],
            Transition::FastForward(t) => vec![
                encode_start(t.start_ms),
                t.stop.to_string(),
                fmt_f64(t.start_rate),
                fmt_f64(t.stop_rate),
            ],
            Transition::Cut(t) => vec![
                encode_start(t.start_ms),
                t.stop.to_string(),
                t.rewind.to_string(),
            ],
        };
        Ok(fields.join(","))
    }

    /// Decode a delimited record of the given category.
    pub fn decode(category: Category, record: &str) -> CuelineResult<Self> {
        let fields: Vec<&str> = record.split(DELIMITER).collect();
        let expected = category.field_count();
        let count_ok = match category {
            Category::Text => fields.len() >= expected,
            _ => fields.len() == expected,
        };
        if !count_ok {
            return Err(CuelineError::malformed(
                category.label(),
                format!("expected {expected} fields, found {}", fields.len()),
            ));
        }

        let mut r = FieldReader {
            category,
            fields: &fields,
            index: 0,
        };

        let transition = match category {
            Category::Text => {
                let style = r.reference();
                let font_size = r.float("fontSize")?;
                let x = r.int("x")?;
                let y = r.int("y")?;
                let start_ms = r.start()?;
                let stop = r.stop()?;
                let message = fields[6..].join(",");
                Transition::Text(TextOverlay {
                    style,
                    font_size,
                    x,
                    y,
                    start_ms,
                    stop,
                    message,
                })
            }
            Category::Image => Transition::Image(ImageOverlay {
                path: r.path(),
                x: r.int("x")?,
                y: r.int("y")?,
                width: r.dimension("width")?,
                height: r.dimension("height")?,
                start_ms: r.start()?,
                stop: r.stop()?,
                preserve_aspect: r.boolean("preserveAspect")?,
            }),
            Category::Audio => Transition::Audio(AudioClip {
                path: r.path(),
                start_ms: r.start()?,
                stop: r.stop()?,
                play_rate: r.float("playRate")?,
                volume: r.float("volume")?,
                seek_fraction: r.float("seekFraction")?,
            }),
            Category::Video => Transition::Video(VideoClip {
                path: r.path(),
                start_ms: r.start()?,
                stop: r.stop()?,
                play_rate: r.float("playRate")?,
                volume: r.float("volume")?,
                x: r.int("x")?,
                y: r.int("y")?,
                width: r.dimension("width")?,
                height: r.dimension("height")?,
                seek_fraction: r.float("seekFraction")?,
                preserve_aspect: r.boolean("preserveAspect")?,
            }),
            Category::FastForward => Transition::FastForward(FastForward {
                start_ms: r.start()?,
                stop: r.stop()?,
                start_rate: r.float("startRate")?,
                stop_rate: r.float("stopRate")?,
            }),
            Category::Cut => Transition::Cut(Cut {
                start_ms: r.start()?,
                stop: r.stop()?,
                rewind: r.boolean("rewind")?,
            }),
        };
        Ok(transition)
    }
}

struct FieldReader<'a> {
    category: Category,
    fields: &'a [&'a str],
    index: usize,
}

impl<'a> FieldReader<'a> {
    fn next(&mut self) -> &'a str {
        let field = self.fields.get(self.index).copied().unwrap_or_default();
        self.index += 1;
        field.trim()
    }

    fn bad(&self, name: &str, value: &str) -> CuelineError {
        CuelineError::malformed(
            self.category.label(),
            format!("field {} ({name}) has invalid value '{value}'", self.index),
        )
    }

    fn reference(&mut self) -> Option<String> {
        match self.next() {
            "" | DEFAULT_SENTINEL => None,
            other => Some(other.to_string()),
        }
    }

    fn path(&mut self) -> Option<PathBuf> {
        self.reference().map(PathBuf::from)
    }

    fn start(&mut self) -> CuelineResult<Option<u64>> {
        let value = self.next();
        if value == DEFAULT_SENTINEL {
            return Ok(None);
        }
        value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| self.bad("startMs", value))
    }

    fn stop(&mut self) -> CuelineResult<Stop> {
        let value = self.next();
        if value == OPEN_SENTINEL {
            return Ok(Stop::Open);
        }
        value
            .parse::<u64>()
            .map(Stop::At)
            .map_err(|_| self.bad("stopMs", value))
    }

    fn float(&mut self, name: &str) -> CuelineResult<f64> {
        let value = self.next();
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.bad(name, value)),
        }
    }

    fn int(&mut self, name: &str) -> CuelineResult<i32> {
        let value = self.next();
        if let Ok(v) = value.parse::<i32>() {
            return Ok(v);
        }
        // Older records store positions as floating point.
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v.abs() <= i32::MAX as f64 => Ok(v.round() as i32),
            _ => Err(self.bad(name, value)),
        }
    }

    fn dimension(&mut self, name: &str) -> CuelineResult<u32> {
        let value = self.next();
        if let Ok(v) = value.parse::<u32>() {
            return Ok(v);
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 && v <= u32::MAX as f64 => Ok(v.round() as u32),
            _ => Err(self.bad(name, value)),
        }
    }

    fn boolean(&mut self, name: &str) -> CuelineResult<bool> {
        let value = self.next();
        match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.bad(name, value)),
        }
    }
}

fn encode_start(start: Option<u64>) -> String {
    match start {
        Some(ms) => ms.to_string(),
        None => DEFAULT_SENTINEL.to_string(),
    }
}

fn encode_ref(category: Category, value: Option<&str>) -> CuelineResult<String> {
    match value {
        None => Ok(DEFAULT_SENTINEL.to_string()),
        Some(v) if v.contains(DELIMITER) => Err(CuelineError::malformed(
            category.label(),
            format!("'{v}' contains the field delimiter"),
        )),
        Some(v) if v.trim() != v || v.is_empty() || v == DEFAULT_SENTINEL => {
            Err(CuelineError::malformed(
                category.label(),
                format!("'{v}' is not a valid reference"),
            ))
        }
        Some(v) => Ok(v.to_string()),
    }
}

fn encode_path(category: Category, path: Option<&Path>) -> CuelineResult<String> {
    match path {
        None => Ok(DEFAULT_SENTINEL.to_string()),
        Some(p) => {
            let s = p.to_str().ok_or_else(|| {
                CuelineError::malformed(category.label(), "media path is not valid UTF-8")
            })?;
            encode_ref(category, Some(s))
        }
    }
}

/// Floats always carry a fractional part so `2` is written as `2.0`.
fn fmt_f64(v: f64) -> String {
    let s = v.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_records_encode() {
        let expected = [
            (Category::Text, "_DEFAULT,60.0,485,300,_DEFAULT,*,Default Text"),
            (Category::Image, "_DEFAULT,540,260,200,200,_DEFAULT,*,true"),
            (Category::Audio, "_DEFAULT,_DEFAULT,*,1.0,1.0,0.0"),
            (
                Category::Video,
                "_DEFAULT,_DEFAULT,*,1.0,1.0,540,300,200,200,0.0,true",
            ),
            (Category::FastForward, "_DEFAULT,*,2.0,1.0"),
            (Category::Cut, "_DEFAULT,*,false"),
        ];
        for (category, record) in expected {
            assert_eq!(
                Transition::default_for(category).encode().unwrap(),
                record,
                "{category}"
            );
        }
    }

    #[test]
    fn test_default_keys() {
        assert_eq!(Category::Text.default_key(0), "Text00");
        assert_eq!(Category::Video.default_key(3), "Video03");
        assert_eq!(Category::FastForward.default_key(0), "FF1");
        assert_eq!(Category::Cut.default_key(2), "Cut3");
    }

    #[test]
    fn test_text_message_keeps_commas() {
        let t = Transition::decode(Category::Text, "Bold,48.0,10,20,1000,5000,Hello, world").unwrap();
        match &t {
            Transition::Text(text) => {
                assert_eq!(text.message, "Hello, world");
                assert_eq!(text.style.as_deref(), Some("Bold"));
                assert_eq!(text.stop, Stop::At(5000));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(t.encode().unwrap(), "Bold,48.0,10,20,1000,5000,Hello, world");
    }

    #[test]
    fn test_legacy_numeric_start_and_float_positions() {
        let t = Transition::decode(Category::Image, "/tmp/logo.png,540.0,260,200.0,200,0,*,true").unwrap();
        assert_eq!(t.start_ms(), Some(0));
        assert_eq!(t.position(), Some((540, 260)));
        assert_eq!(t.size(), Some((200, 200)));
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let err = Transition::decode(Category::Cut, "1000,*").unwrap_err();
        assert!(matches!(err, CuelineError::MalformedRecord { .. }));
        let err = Transition::decode(Category::FastForward, "1000,*,2.0,1.0,9").unwrap_err();
        assert!(err.to_string().contains("expected 4 fields, found 5"));
    }

    #[test]
    fn test_bad_field_value_is_malformed() {
        let err = Transition::decode(Category::Audio, "a.wav,soon,*,1.0,1.0,0").unwrap_err();
        assert!(err.to_string().contains("startMs"));
        let err = Transition::decode(Category::Cut, "100,50,maybe").unwrap_err();
        assert!(err.to_string().contains("rewind"));
    }

    #[test]
    fn test_path_with_delimiter_is_rejected() {
        let mut t = Transition::default_for(Category::Audio);
        if let Transition::Audio(a) = &mut t {
            a.path = Some(PathBuf::from("/media/a,b.wav"));
        }
        assert!(t.encode().is_err());
    }

    #[test]
    fn test_cut_rewind_follows_timing() {
        let mut t = Transition::default_for(Category::Cut);
        t.set_start_raw(Some(5000));
        t.set_stop_raw(Stop::At(1000));
        assert!(matches!(t, Transition::Cut(Cut { rewind: true, .. })));
        t.set_stop_raw(Stop::At(9000));
        assert!(matches!(t, Transition::Cut(Cut { rewind: false, .. })));
    }

    #[test]
    fn test_category_from_marker_label() {
        assert_eq!("FF".parse::<Category>().unwrap(), Category::FastForward);
        assert_eq!("Text".parse::<Category>().unwrap(), Category::Text);
        assert!("Sticker".parse::<Category>().is_err());
    }
}
