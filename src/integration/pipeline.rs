//! FramePipeline: zone assignment, tracking, occupancy debouncing and
//! weak-signal generation for one camera.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::inventory::VisionSignal;
use crate::tracker::{Detection, FrameEvents, Track, TrackerConfig, ZoneTracker};
use crate::zone::{
    ChangeDirection, OccupancyConfig, OccupancyDebouncer, Zone, ZoneAssigner, ZoneChange,
    count_by_zone,
};

use super::detector::{CodeReader, DecodedCode, DetectionSource, FrameImage};
use super::sink::SignalSink;

/// Margin added around a track box before decoding codes inside it.
pub const CODE_ROI_PADDING: f32 = 12.0;

const SIGNAL_SOURCE: &str = "vision";

/// Everything one processed frame produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    /// 1-based index among all frames offered, skipped ones included
    pub frame_index: u64,
    /// Detections that survived filtering, with zones assigned
    pub detections: Vec<Detection>,
    /// Tracks matched or created this frame
    pub tracks: Vec<Track>,
    pub events: FrameEvents,
    /// Raw per-zone counts of this frame's tracks
    pub counts: BTreeMap<String, usize>,
    /// Debounced occupancy changes
    pub changes: Vec<ZoneChange>,
    /// Weak signals: enters, exits, transfers, then residual changes
    pub signals: Vec<VisionSignal>,
}

#[derive(Debug)]
pub struct FramePipeline {
    assigner: ZoneAssigner,
    tracker: ZoneTracker,
    debouncer: OccupancyDebouncer,
    config: PipelineConfig,
    code_reader: Option<Box<dyn CodeReader>>,
    /// Object id read from a code, per live track
    hints: HashMap<u64, String>,
    frame_index: u64,
}

impl FramePipeline {
    pub fn new(
        zones: Vec<Zone>,
        tracker: TrackerConfig,
        occupancy: &OccupancyConfig,
        config: PipelineConfig,
    ) -> Self {
        let debouncer = OccupancyDebouncer::new(zones.iter().map(|z| z.zone_id.clone()), occupancy);
        Self {
            assigner: ZoneAssigner::new(zones),
            tracker: ZoneTracker::new(tracker),
            debouncer,
            config,
            code_reader: None,
            hints: HashMap::new(),
            frame_index: 0,
        }
    }

    /// Build from the full configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.zones.clone(),
            config.tracker.clone(),
            &config.occupancy,
            config.pipeline.clone(),
        )
    }

    /// Attach a code reader; track boxes are then scanned for identity hints.
    pub fn with_code_reader(mut self, reader: Box<dyn CodeReader>) -> Self {
        self.code_reader = Some(reader);
        self
    }

    pub fn tracker(&self) -> &ZoneTracker {
        &self.tracker
    }

    pub fn assigner(&self) -> &ZoneAssigner {
        &self.assigner
    }

    pub fn debouncer(&self) -> &OccupancyDebouncer {
        &self.debouncer
    }

    /// Identity hint currently attached to a track.
    pub fn hint_for(&self, track_id: u64) -> Option<&str> {
        self.hints.get(&track_id).map(String::as_str)
    }

    /// Run `detector` on `image` and process the result.
    ///
    /// Returns `Ok(None)` for skipped frames; the detector is not invoked.
    pub fn process_frame<D: DetectionSource>(
        &mut self,
        detector: &mut D,
        image: &FrameImage<'_>,
    ) -> Result<Option<FrameReport>, D::Error> {
        if !self.advance_frame() {
            return Ok(None);
        }
        let detections = detector.detect(image.data, image.width, image.height)?;
        Ok(Some(self.run(detections, Some(image))))
    }

    /// Process detections produced elsewhere. `image`, when given, is used
    /// for code decoding only.
    pub fn process_detections(
        &mut self,
        detections: Vec<Detection>,
        image: Option<&FrameImage<'_>>,
    ) -> Option<FrameReport> {
        if !self.advance_frame() {
            return None;
        }
        Some(self.run(detections, image))
    }

    /// Count the frame and decide whether it is processed: frames N, 2N, ...
    fn advance_frame(&mut self) -> bool {
        self.frame_index += 1;
        let every = self.config.process_every_n_frames.max(1);
        self.frame_index % every == 0
    }

    fn run(&mut self, detections: Vec<Detection>, image: Option<&FrameImage<'_>>) -> FrameReport {
        let kept: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.config.min_confidence)
            .filter(|d| self.config.accepts_label(&d.label))
            .collect();
        let detections = self.assigner.annotate(kept);

        let update = self.tracker.update(&detections);

        let counts = count_by_zone(
            self.assigner.zone_ids(),
            update.tracks.iter().map(|t| t.zone_id.as_deref()),
        );
        let changes = self.debouncer.update(&counts);

        if let (Some(reader), Some(image)) = (self.code_reader.as_mut(), image) {
            read_codes(&mut **reader, image, &update.tracks, &mut self.hints);
        }

        let signals = self.signals(&update.events, &changes);

        // Hints die with their tracks.
        let tracker = &self.tracker;
        self.hints.retain(|id, _| tracker.contains(*id));

        FrameReport {
            frame_index: self.frame_index,
            detections,
            tracks: update.tracks,
            events: update.events,
            counts,
            changes,
            signals,
        }
    }

    fn signals(&self, events: &FrameEvents, changes: &[ZoneChange]) -> Vec<VisionSignal> {
        let kind = self.config.object_type;
        let conf = &self.config.confidence;
        let mut out = Vec::with_capacity(events.len() + changes.len());

        for e in &events.enters {
            let signal = VisionSignal::new(kind, None, Some(e.to_zone.as_str()))
                .with_confidence(conf.enter);
            out.push(self.track_signal(signal, "enter", e.track_id, &e.label, e.reason));
        }
        for e in &events.exits {
            let signal = VisionSignal::new(kind, Some(e.from_zone.as_str()), None)
                .with_confidence(conf.exit);
            out.push(self.track_signal(signal, "exit", e.track_id, &e.label, e.reason));
        }
        for e in &events.transfers {
            let from = Some(e.from_zone.as_str());
            let signal = VisionSignal::new(kind, from, Some(e.to_zone.as_str()))
                .with_confidence(conf.transfer);
            out.push(self.track_signal(signal, "transfer", e.track_id, &e.label, e.reason));
        }

        if self.config.publish_residual {
            for change in changes {
                let zone = Some(change.zone_id.as_str());
                let (signal, mode) = match change.direction() {
                    ChangeDirection::Appearance => {
                        (VisionSignal::new(kind, None, zone), "appearance")
                    }
                    ChangeDirection::Disappearance => {
                        (VisionSignal::new(kind, zone, None), "disappearance")
                    }
                };
                out.push(
                    signal
                        .with_confidence(conf.residual)
                        .with_meta("source", SIGNAL_SOURCE)
                        .with_meta("mode", mode)
                        .with_meta("old", change.old_count)
                        .with_meta("new", change.new_count),
                );
            }
        }

        out
    }

    fn track_signal(
        &self,
        signal: VisionSignal,
        mode: &str,
        track_id: u64,
        label: &str,
        reason: impl Display,
    ) -> VisionSignal {
        let signal = signal
            .with_meta("source", SIGNAL_SOURCE)
            .with_meta("mode", mode)
            .with_meta("label", label)
            .with_meta("track_id", track_id)
            .with_meta("reason", reason.to_string());
        match self.hints.get(&track_id) {
            Some(hint) => signal.with_hint(hint.clone()),
            None => signal,
        }
    }
}

fn read_codes(
    reader: &mut dyn CodeReader,
    image: &FrameImage<'_>,
    tracks: &[Track],
    hints: &mut HashMap<u64, String>,
) {
    for track in tracks {
        let Some(roi) = track
            .bbox
            .padded_within(CODE_ROI_PADDING, image.width, image.height)
        else {
            continue;
        };
        let Some(code) = reader.decode(image, roi).as_deref().and_then(DecodedCode::parse) else {
            continue;
        };
        match code.object_id() {
            Some(id) => {
                debug!(track_id = track.track_id, object_id = id, "identity hint read");
                hints.insert(track.track_id, id.to_string());
            }
            None => {
                debug!(track_id = track.track_id, raw = %code.raw, "code without usable payload")
            }
        }
    }
}

/// Publish every signal to `sink`, logging failures and carrying on.
///
/// Returns the number of signals accepted.
pub fn publish_signals<S>(signals: &[VisionSignal], sink: &mut S) -> usize
where
    S: SignalSink,
    S::Error: Display,
{
    let mut published = 0;
    for signal in signals {
        match sink.publish(signal) {
            Ok(()) => published += 1,
            Err(e) => warn!(error = %e, "failed to publish vision signal"),
        }
    }
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryObjectKind;
    use crate::tracker::Rect;

    struct MockDetector {
        detections: Vec<Detection>,
        calls: usize,
    }

    impl DetectionSource for MockDetector {
        type Error = std::convert::Infallible;

        fn detect(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Detection>, Self::Error> {
            self.calls += 1;
            Ok(self.detections.clone())
        }
    }

    struct FixedReader(&'static str);

    impl CodeReader for FixedReader {
        fn decode(&mut self, _image: &FrameImage<'_>, _roi: Rect) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn zones() -> Vec<Zone> {
        vec![
            Zone::new("A").with_rect(0.0, 0.0, 100.0, 100.0),
            Zone::new("B").with_rect(200.0, 0.0, 300.0, 100.0),
        ]
    }

    fn pipeline(config: PipelineConfig) -> FramePipeline {
        FramePipeline::new(
            zones(),
            TrackerConfig::default(),
            &OccupancyConfig { min_stable_frames: 1 },
            config,
        )
    }

    fn spool(x: f32) -> Detection {
        Detection::new("spool", x, 40.0, x + 20.0, 60.0, 0.9)
    }

    #[test]
    fn test_enter_signal_has_meta() {
        let mut p = pipeline(PipelineConfig {
            publish_residual: false,
            object_type: InventoryObjectKind::FilamentSpool,
            ..PipelineConfig::default()
        });
        let report = p.process_detections(vec![spool(40.0)], None).unwrap();
        assert_eq!(report.signals.len(), 1);
        let sig = &report.signals[0];
        assert_eq!(sig.object_type, InventoryObjectKind::FilamentSpool);
        assert_eq!(sig.to_zone.as_deref(), Some("A"));
        assert_eq!(sig.from_zone, None);
        assert_eq!(sig.confidence, 0.6);
        assert_eq!(sig.meta["mode"], "enter");
        assert_eq!(sig.meta["reason"], "new_track_in_zone");
        assert_eq!(sig.meta["track_id"], 1);
    }

    #[test]
    fn test_filters_drop_people_and_low_confidence() {
        let mut p = pipeline(PipelineConfig::default());
        let report = p
            .process_detections(
                vec![
                    Detection::new("person", 40.0, 40.0, 60.0, 60.0, 0.99),
                    Detection::new("spool", 40.0, 40.0, 60.0, 60.0, 0.1),
                ],
                None,
            )
            .unwrap();
        assert!(report.detections.is_empty());
        assert!(report.signals.is_empty());
    }

    #[test]
    fn test_residual_signal_follows_transfer() {
        let mut p = pipeline(PipelineConfig::default());
        p.process_detections(vec![spool(40.0)], None);
        let report = p.process_detections(vec![spool(100.0)], None).unwrap();
        // Center at x=110 sits between the zones: a gap opens, A empties.
        assert!(report.events.is_empty());
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].meta["mode"], "disappearance");
        assert_eq!(report.signals[0].from_zone.as_deref(), Some("A"));
        assert_eq!(report.signals[0].confidence, 0.5);

        let report = p.process_detections(vec![spool(220.0)], None).unwrap();
        let modes: Vec<&str> = report
            .signals
            .iter()
            .map(|s| s.meta["mode"].as_str().unwrap())
            .collect();
        assert_eq!(modes, ["transfer", "appearance"]);
        assert_eq!(report.signals[0].from_zone.as_deref(), Some("A"));
        assert_eq!(report.signals[0].to_zone.as_deref(), Some("B"));
    }

    #[test]
    fn test_frame_skipping() {
        let mut p = pipeline(PipelineConfig {
            process_every_n_frames: 3,
            ..PipelineConfig::default()
        });
        let mut detector = MockDetector {
            detections: vec![spool(40.0)],
            calls: 0,
        };
        let image = FrameImage::new(&[], 640, 480);
        let processed: Vec<u64> = (0..7)
            .filter_map(|_| p.process_frame(&mut detector, &image).unwrap())
            .map(|r| r.frame_index)
            .collect();
        assert_eq!(processed, [3, 6]);
        assert_eq!(detector.calls, 2);
    }

    #[test]
    fn test_code_hint_attached_and_pruned() {
        let mut p = pipeline(PipelineConfig {
            publish_residual: false,
            ..PipelineConfig::default()
        })
        .with_code_reader(Box::new(FixedReader(r#"{"type":"filament","id":"S1"}"#)));
        let image = FrameImage::new(&[], 640, 480);

        let report = p.process_detections(vec![spool(40.0)], Some(&image)).unwrap();
        assert_eq!(report.signals[0].hinted_object_id.as_deref(), Some("S1"));
        assert_eq!(p.hint_for(1), Some("S1"));

        for _ in 0..40 {
            p.process_detections(Vec::new(), None);
        }
        assert!(!p.tracker().contains(1));
        assert_eq!(p.hint_for(1), None);
    }

    #[test]
    fn test_publish_signals_counts_accepted() {
        let mut p = pipeline(PipelineConfig::default());
        let report = p.process_detections(vec![spool(40.0), spool(240.0)], None).unwrap();
        let mut sink: Vec<VisionSignal> = Vec::new();
        assert_eq!(publish_signals(&report.signals, &mut sink), report.signals.len());
        assert_eq!(sink, report.signals);
    }
}
