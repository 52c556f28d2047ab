//! Frame scheduling and the per-tick step that ties audio, visualizer and
//! renderer together.

use anyhow::Result;
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::audio::AudioFrameSource;
use crate::render::FrameSink;
use crate::scene::{Scene, SceneHost};
use crate::visualizer::{Switcher, VisualizerKind};

/// Host-side refresh scheduler. Each call blocks until the next frame is
/// due and returns its time in seconds, or `None` once the host stops
/// scheduling frames.
pub trait FrameDriver {
    fn next_frame(&mut self) -> Option<f32>;
}

/// Evenly spaced frames at `fps` covering `duration` seconds, as fast as the
/// renderer allows.
pub struct OfflineDriver {
    fps: u32,
    total_frames: usize,
    frame: usize,
}

impl OfflineDriver {
    pub fn new(fps: u32, duration: f32) -> Self {
        let fps = fps.max(1);
        Self {
            fps,
            total_frames: (duration.max(0.0) * fps as f32).ceil() as usize,
            frame: 0,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }
}

impl FrameDriver for OfflineDriver {
    fn next_frame(&mut self) -> Option<f32> {
        if self.frame >= self.total_frames {
            return None;
        }
        let time = self.frame as f32 / self.fps as f32;
        self.frame += 1;
        Some(time)
    }
}

/// Wall-clock frames paced to the refresh interval. Slow frames are not
/// made up: the next tick simply reports a later time.
pub struct RealtimeDriver {
    start: Option<Instant>,
    next_due: Option<Instant>,
    interval: Duration,
    until: Option<f32>,
}

impl RealtimeDriver {
    pub fn new(refresh_hz: u32, until: Option<f32>) -> Self {
        Self {
            start: None,
            next_due: None,
            interval: Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64),
            until,
        }
    }
}

impl FrameDriver for RealtimeDriver {
    fn next_frame(&mut self) -> Option<f32> {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        let now = Instant::now();
        let start = *self.start.get_or_insert(now);
        self.next_due = Some(now + self.interval);

        let time = now.duration_since(start).as_secs_f32();
        match self.until {
            Some(limit) if time >= limit => None,
            _ => Some(time),
        }
    }
}

/// A queued visualizer selection, standing in for a UI change event.
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchEvent {
    pub at: f32,
    pub label: String,
}

impl FromStr for SwitchEvent {
    type Err = anyhow::Error;

    /// Parses `SECONDS=LABEL`, e.g. `12.5=Frequency Bars`.
    fn from_str(s: &str) -> Result<Self> {
        let (at, label) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected TIME=LABEL, got '{}'", s))?;
        let at: f32 = at
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid switch time '{}'", at))?;
        if !at.is_finite() || at < 0.0 {
            anyhow::bail!("Switch time must be a non-negative number of seconds, got {}", at);
        }
        Ok(Self {
            at,
            label: label.trim().to_string(),
        })
    }
}

impl SwitchEvent {
    /// Cycle through every variant, giving each an equal share of `duration`.
    pub fn rotation(duration: f32) -> Vec<Self> {
        let share = duration.max(0.0) / VisualizerKind::ALL.len() as f32;
        VisualizerKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| Self {
                at: i as f32 * share,
                label: kind.label().to_string(),
            })
            .collect()
    }
}

/// Time-ordered switch requests.
#[derive(Clone, Debug, Default)]
pub struct SwitchSchedule {
    events: VecDeque<SwitchEvent>,
}

impl SwitchSchedule {
    pub fn new(mut events: Vec<SwitchEvent>) -> Self {
        events.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            events: events.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pop every request due at or before `time`.
    pub fn due(&mut self, time: f32) -> Vec<SwitchEvent> {
        let mut due = Vec::new();
        while self.events.front().is_some_and(|event| event.at <= time) {
            due.extend(self.events.pop_front());
        }
        due
    }
}

/// What the sink is told about the frame it renders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    pub index: u64,
    pub time: f32,
    pub visualizer: Option<VisualizerKind>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub switches: u64,
    pub peak_primitives: usize,
}

/// Owns the scene, the audio source and the switcher, and steps them once
/// per scheduled frame.
pub struct AnimationLoop {
    scene: Scene,
    audio: Box<dyn AudioFrameSource>,
    switcher: Switcher,
    schedule: SwitchSchedule,
    stats: RunStats,
}

impl AnimationLoop {
    pub fn new(audio: Box<dyn AudioFrameSource>, switcher: Switcher, schedule: SwitchSchedule) -> Self {
        Self {
            scene: Scene::new(),
            audio,
            switcher,
            schedule,
            stats: RunStats::default(),
        }
    }

    #[cfg(test)]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn switcher(&self) -> &Switcher {
        &self.switcher
    }

    /// Entry point for selection changes arriving outside the schedule.
    pub fn switch_visualizer(&mut self, name: &str) -> VisualizerKind {
        self.stats.switches += 1;
        self.switcher
            .switch_visualizer(name, &mut self.scene, self.audio.as_ref())
    }

    /// One frame: apply due switches, advance the audio playhead, update the
    /// visualizer, render.
    pub fn tick(&mut self, time: f32, sink: &mut dyn FrameSink) -> Result<FrameInfo> {
        for event in self.schedule.due(time) {
            let kind = self.switch_visualizer(&event.label);
            log::info!("{:.2}s: switched to {}", time, kind.label());
        }

        self.audio.seek(time);
        self.switcher
            .update(time, self.audio.as_mut(), &mut self.scene);

        let info = FrameInfo {
            index: self.stats.frames,
            time,
            visualizer: self.switcher.current_kind(),
        };
        sink.render(&info, &mut self.scene)?;

        self.stats.frames += 1;
        self.stats.peak_primitives = self.stats.peak_primitives.max(self.scene.len());
        Ok(info)
    }

    /// Tick until the driver stops scheduling frames.
    pub fn run(
        &mut self,
        driver: &mut dyn FrameDriver,
        sink: &mut dyn FrameSink,
        mut on_frame: impl FnMut(&FrameInfo),
    ) -> Result<RunStats> {
        while let Some(time) = driver.next_frame() {
            let info = self.tick(time, sink)?;
            on_frame(&info);
        }
        Ok(self.stats)
    }

    /// Dispose the active visualizer so the scene is left empty.
    pub fn shutdown(&mut self) {
        self.switcher.shutdown(&mut self.scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentSource;
    use crate::render::NullSink;
    use crate::scene::Primitive;

    #[test]
    fn offline_driver_covers_duration() {
        let mut driver = OfflineDriver::new(30, 1.0);
        assert_eq!(driver.total_frames(), 30);

        let times: Vec<f32> = std::iter::from_fn(|| driver.next_frame()).collect();
        assert_eq!(times.len(), 30);
        assert_eq!(times[0], 0.0);
        assert!((times[29] - 29.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn realtime_driver_is_monotonic_and_stops() {
        let mut driver = RealtimeDriver::new(1000, Some(0.02));
        let times: Vec<f32> = std::iter::from_fn(|| driver.next_frame()).collect();
        assert!(!times.is_empty());
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(times.iter().all(|&t| t < 0.02));
    }

    #[test]
    fn parses_switch_events() {
        let event: SwitchEvent = "12.5=Frequency Bars".parse().unwrap();
        assert_eq!(event.at, 12.5);
        assert_eq!(event.label, "Frequency Bars");

        assert!("Frequency Bars".parse::<SwitchEvent>().is_err());
        assert!("soon=Waveform".parse::<SwitchEvent>().is_err());
        assert!("-1=Waveform".parse::<SwitchEvent>().is_err());
    }

    #[test]
    fn schedule_releases_events_in_time_order() {
        let mut schedule = SwitchSchedule::new(vec![
            SwitchEvent { at: 5.0, label: "b".into() },
            SwitchEvent { at: 1.0, label: "a".into() },
        ]);
        assert!(schedule.due(0.5).is_empty());
        assert_eq!(schedule.due(1.0)[0].label, "a");
        assert_eq!(schedule.due(10.0)[0].label, "b");
        assert!(schedule.is_empty());
    }

    #[test]
    fn rotation_visits_every_variant() {
        let labels: Vec<(f32, String)> = SwitchEvent::rotation(20.0)
            .into_iter()
            .map(|e| (e.at, e.label))
            .collect();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels[0], (0.0, "Waveform".to_string()));
        assert_eq!(labels[3], (15.0, "Frequency Bars".to_string()));
    }

    #[test]
    fn loop_switches_on_schedule_and_renders_every_tick() {
        let schedule = SwitchSchedule::new(vec![
            SwitchEvent { at: 0.0, label: "Waveform".into() },
            SwitchEvent { at: 0.5, label: "Frequency Bars".into() },
            SwitchEvent { at: 0.8, label: "bogus".into() },
        ]);
        let mut animation = AnimationLoop::new(
            Box::new(SilentSource::new(128)),
            Switcher::new(Some(3)),
            schedule,
        );
        let mut driver = OfflineDriver::new(10, 1.0);
        let mut sink = NullSink::default();

        let mut seen = Vec::new();
        let stats = animation
            .run(&mut driver, &mut sink, |info| seen.push(info.visualizer))
            .unwrap();

        assert_eq!(stats.frames, 10);
        assert_eq!(stats.switches, 3);
        assert_eq!(stats.peak_primitives, 65);
        assert_eq!(sink.frames(), 10);
        assert_eq!(seen[4], Some(VisualizerKind::Waveform));
        assert_eq!(seen[5], Some(VisualizerKind::FrequencyBars));
        assert_eq!(seen[9], Some(VisualizerKind::Waveform));
        assert_eq!(animation.scene().len(), 1);

        animation.shutdown();
        assert_eq!(animation.scene().len(), 0);
    }

    #[test]
    fn silent_audio_keeps_every_variant_quiet() {
        for kind in VisualizerKind::ALL {
            let mut animation = AnimationLoop::new(
                Box::new(SilentSource::new(128)),
                Switcher::new(Some(9)),
                SwitchSchedule::default(),
            );
            animation.switch_visualizer(kind.label());
            let mut sink = NullSink::default();
            for frame in 0..20 {
                animation.tick(frame as f32 / 60.0, &mut sink).unwrap();
            }
            // No spray spawns and nothing leaks across ticks.
            let (primitives, cuboids) = match kind {
                VisualizerKind::Waveform | VisualizerKind::ParticleExplosion => (1, 0),
                VisualizerKind::GeometricPatterns => (33, 32),
                VisualizerKind::FrequencyBars => (65, 64),
            };
            assert_eq!(animation.scene().len(), primitives, "{:?}", kind);
            assert_eq!(
                animation.scene().count_where(Primitive::is_cuboid),
                cuboids,
                "{:?}",
                kind
            );
        }
    }
}
