// Camera-path keyframes and playback

use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;

/// Keyframes closer together than this share a slot
const TIME_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    /// Smoothstep within each segment: the camera eases in and out of
    /// every keyframe
    #[default]
    Smooth,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Smooth => t * t * (3.0 - 2.0 * t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub pose: CameraPose,
}

/// Keyframes sorted by time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraPath {
    keyframes: Vec<Keyframe>,
    /// Spacing used by [`CameraPath::push`]
    pub interval: f32,
    pub easing: Easing,
}

impl CameraPath {
    pub fn new(interval: f32, easing: Easing) -> Self {
        Self {
            keyframes: Vec::new(),
            interval: interval.max(TIME_EPSILON),
            easing,
        }
    }

    /// Append a keyframe `interval` seconds after the last one.
    pub fn push(&mut self, pose: CameraPose) -> f32 {
        let time = self
            .keyframes
            .last()
            .map_or(0.0, |last| last.time + self.interval);
        self.keyframes.push(Keyframe { time, pose });
        time
    }

    /// Insert at `time`, replacing a keyframe already at that time.
    pub fn insert(&mut self, time: f32, pose: CameraPose) {
        let time = time.max(0.0);
        if let Some(existing) = self
            .keyframes
            .iter_mut()
            .find(|k| (k.time - time).abs() < TIME_EPSILON)
        {
            existing.pose = pose;
            return;
        }
        let index = self.keyframes.partition_point(|k| k.time < time);
        self.keyframes.insert(index, Keyframe { time, pose });
    }

    /// Move keyframe `index` to `time`, keeping the path sorted. A keyframe
    /// already at `time` is replaced.
    pub fn retime(&mut self, index: usize, time: f32) -> bool {
        match self.remove(index) {
            Some(keyframe) => {
                self.insert(time, keyframe.pose);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Keyframe> {
        (index < self.keyframes.len()).then(|| self.keyframes.remove(index))
    }

    pub fn clear(&mut self) {
        self.keyframes.clear();
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |k| k.time)
    }

    /// Pose at time `t`, clamped to the path. Orientation is slerped
    /// between the two surrounding keyframes.
    pub fn sample(&self, t: f32) -> Option<CameraPose> {
        let first = self.keyframes.first()?;
        let t = t.clamp(first.time, self.duration());
        let next = self.keyframes.partition_point(|k| k.time <= t);
        if next == 0 {
            return Some(first.pose);
        }
        let a = &self.keyframes[next - 1];
        let Some(b) = self.keyframes.get(next) else {
            return Some(a.pose);
        };
        let span = b.time - a.time;
        let local = if span > 0.0 { (t - a.time) / span } else { 1.0 };
        Some(a.pose.lerp(&b.pose, self.easing.apply(local)))
    }

    /// Frames needed to export the path at `fps`, both ends included.
    pub fn frame_count(&self, fps: u32) -> usize {
        if self.is_empty() || fps == 0 {
            return 0;
        }
        (self.duration() * fps as f32).round() as usize + 1
    }

    /// One pose per exported frame; the last frame lands exactly on the
    /// final keyframe.
    pub fn frames(&self, fps: u32) -> impl Iterator<Item = CameraPose> + '_ {
        let count = self.frame_count(fps);
        let duration = self.duration();
        (0..count).filter_map(move |i| {
            let t = if i + 1 == count {
                duration
            } else {
                i as f32 / fps as f32
            };
            self.sample(t)
        })
    }
}

/// Real-time playback cursor over a [`CameraPath`]
#[derive(Debug, Default, Clone)]
pub struct Playback {
    elapsed: f32,
    playing: bool,
    pub looping: bool,
}

impl Playback {
    pub fn new(looping: bool) -> Self {
        Self {
            looping,
            ..Self::default()
        }
    }

    pub fn start(&mut self) {
        self.elapsed = 0.0;
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Advance by `dt` and return the pose to show. Non-looping playback
    /// stops on the last keyframe.
    pub fn advance(&mut self, path: &CameraPath, dt: f32) -> Option<CameraPose> {
        if !self.playing {
            return None;
        }
        if path.is_empty() {
            self.playing = false;
            return None;
        }
        let duration = path.duration();
        self.elapsed += dt.max(0.0);
        if self.elapsed >= duration {
            if self.looping && duration > 0.0 {
                self.elapsed %= duration;
            } else {
                self.elapsed = duration;
                self.playing = false;
            }
        }
        path.sample(self.elapsed)
    }
}
