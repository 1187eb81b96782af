//! Voice Pool
//!
//! A fixed set of playback channels created once at bus construction. Voices
//! are never destroyed, only rebound. A voice is either idle (silent, not
//! playing) or bound to exactly one candidate and ramping toward a target.

use crate::emitter::{Position3D, SpatialParams};
use crate::fade::{FadeCurve, VolumeRamp};
use crate::scoring::CandidateKey;
use crate::track::Track;
use std::sync::Arc;

/// Opaque playback channel driven by the bus
pub trait VoiceOutput {
    /// Load a track with playback parameters
    fn bind(&mut self, track: &Track, params: &BindParams);
    fn play(&mut self);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn set_pitch(&mut self, pitch: f32);
    fn is_playing(&self) -> bool;

    /// Move a spatial voice. Non-spatial outputs ignore this.
    fn set_position(&mut self, _position: Position3D) {}
}

/// Spatial placement of a bound voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialBinding {
    pub position: Position3D,
    pub params: SpatialParams,
}

/// Parameters applied when a voice is (re)bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindParams {
    pub looping: bool,
    /// Playback start offset in seconds
    pub start_offset_seconds: f32,
    /// Pitch multiplier
    pub pitch: f32,
    /// Set for emitter voices
    pub spatial: Option<SpatialBinding>,
}

impl Default for BindParams {
    fn default() -> Self {
        Self {
            looping: true,
            start_offset_seconds: 0.0,
            pitch: 1.0,
            spatial: None,
        }
    }
}

/// What a voice currently serves
#[derive(Debug, Clone)]
pub struct Binding {
    pub key: CandidateKey,
    pub track: Arc<Track>,
    pub looping: bool,
}

/// One playback channel
#[derive(Debug)]
pub struct Voice<V> {
    output: V,
    binding: Option<Binding>,
    ramp: VolumeRamp,
}

impl<V: VoiceOutput> Voice<V> {
    fn new(output: V) -> Self {
        Self {
            output,
            binding: None,
            ramp: VolumeRamp::at(0.0),
        }
    }

    /// Candidate served by this voice
    pub fn key(&self) -> Option<&CandidateKey> {
        self.binding.as_ref().map(|b| &b.key)
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.binding.is_none()
    }

    #[inline]
    pub fn current_volume(&self) -> f32 {
        self.ramp.current()
    }

    #[inline]
    pub fn target_volume(&self) -> f32 {
        self.ramp.target()
    }

    /// Playback primitive
    pub fn output(&self) -> &V {
        &self.output
    }

    /// Bind an idle voice and start playback at the current (silent) ramp volume
    pub(crate) fn bind(&mut self, key: CandidateKey, track: Arc<Track>, params: BindParams, gain: f32) {
        if self.output.is_playing() {
            self.output.stop();
        }

        self.output.bind(&track, &params);
        self.output.set_pitch(params.pitch);
        self.output
            .set_volume(self.ramp.current() * track.default_volume * gain);
        self.output.play();

        self.binding = Some(Binding {
            key,
            track,
            looping: params.looping,
        });
    }

    /// Stop playback and return to idle
    pub(crate) fn release(&mut self) {
        self.output.stop();
        self.output.set_volume(0.0);
        self.binding = None;
        self.ramp = VolumeRamp::at(0.0);
    }

    pub(crate) fn retarget(&mut self, target: f32, fade_seconds: f32, curve: FadeCurve) {
        self.ramp.retarget(target, fade_seconds, curve);
    }

    /// Step the ramp and push the mixed volume to the output
    pub(crate) fn advance(&mut self, dt: f32, gain: f32) {
        let Some(binding) = &self.binding else {
            return;
        };
        let volume = self.ramp.advance(dt);
        self.output
            .set_volume(volume * binding.track.default_volume * gain);
    }

    pub(crate) fn set_position(&mut self, position: Position3D) {
        self.output.set_position(position);
    }

    /// Losing voice that is silent enough (or whose one-shot ended) to release
    pub(crate) fn is_releasable(&self, silence_threshold: f32) -> bool {
        self.binding.is_some()
            && self.ramp.target() == 0.0
            && (self.ramp.current() <= silence_threshold || !self.output.is_playing())
    }
}

/// Fixed-capacity voice pool
#[derive(Debug)]
pub struct VoicePool<V> {
    voices: Vec<Voice<V>>,
}

impl<V: VoiceOutput> VoicePool<V> {
    pub fn new(outputs: Vec<V>) -> Self {
        Self {
            voices: outputs.into_iter().map(Voice::new).collect(),
        }
    }

    /// Voice bound to `key`
    pub fn find(&self, key: &CandidateKey) -> Option<usize> {
        self.voices.iter().position(|v| v.key() == Some(key))
    }

    /// First idle voice
    pub fn first_idle(&self) -> Option<usize> {
        self.voices.iter().position(|v| v.is_idle())
    }

    pub fn get(&self, index: usize) -> Option<&Voice<V>> {
        self.voices.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Voice<V>> {
        self.voices.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice<V>> {
        self.voices.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice<V>> {
        self.voices.iter_mut()
    }

    /// Voices currently bound
    pub fn bound_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_idle()).count()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct TestOutput {
        playing: bool,
        volume: f32,
        pitch: f32,
        binds: u32,
        stops: u32,
    }

    impl VoiceOutput for TestOutput {
        fn bind(&mut self, _track: &Track, _params: &BindParams) {
            self.binds += 1;
        }
        fn play(&mut self) {
            self.playing = true;
        }
        fn stop(&mut self) {
            self.playing = false;
            self.stops += 1;
        }
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
        fn set_pitch(&mut self, pitch: f32) {
            self.pitch = pitch;
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn key(track: &str) -> CandidateKey {
        CandidateKey::Layer(track.to_string())
    }

    #[test]
    fn test_bind_starts_silent() {
        let mut pool = VoicePool::new(vec![TestOutput::default(), TestOutput::default()]);
        let index = pool.first_idle().unwrap();
        let track = Arc::new(Track::new("wind", "wind.ogg").with_default_volume(0.5));

        let voice = pool.get_mut(index).unwrap();
        voice.bind(key("wind"), track, BindParams { pitch: 1.2, ..Default::default() }, 1.0);
        voice.retarget(1.0, 1.0, FadeCurve::Linear);

        assert_eq!(pool.find(&key("wind")), Some(index));
        assert_eq!(pool.bound_count(), 1);
        let output = pool.get(index).unwrap().output();
        assert!(output.playing);
        assert_eq!(output.volume, 0.0);
        assert!((output.pitch - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_output_volume_includes_track_default_and_gain() {
        let mut pool = VoicePool::new(vec![TestOutput::default()]);
        let track = Arc::new(Track::new("rain", "rain.ogg").with_default_volume(0.5));
        let voice = pool.get_mut(0).unwrap();
        voice.bind(key("rain"), track, BindParams::default(), 0.8);
        voice.retarget(1.0, 0.0, FadeCurve::Linear);
        voice.advance(0.1, 0.8);

        assert!((voice.output().volume - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_release_only_when_silent() {
        let mut pool = VoicePool::new(vec![TestOutput::default()]);
        let voice = pool.get_mut(0).unwrap();
        voice.bind(key("wind"), Arc::new(Track::new("wind", "")), BindParams::default(), 1.0);
        voice.retarget(1.0, 0.0, FadeCurve::Linear);
        voice.retarget(0.0, 2.0, FadeCurve::Linear);

        voice.advance(1.0, 1.0);
        assert!(!voice.is_releasable(0.001));
        voice.advance(1.0, 1.0);
        assert!(voice.is_releasable(0.001));

        voice.release();
        assert!(voice.is_idle());
        assert!(!voice.output().playing);
        assert_eq!(voice.current_volume(), 0.0);
    }

    #[test]
    fn test_finished_one_shot_releasable_once_losing() {
        let mut pool = VoicePool::new(vec![TestOutput::default()]);
        let voice = pool.get_mut(0).unwrap();
        let params = BindParams {
            looping: false,
            ..Default::default()
        };
        voice.bind(key("thunder"), Arc::new(Track::new("thunder", "")), params, 1.0);
        voice.retarget(0.9, 0.0, FadeCurve::Linear);

        // Playback ended but the layer is still wanted
        voice.output.playing = false;
        assert!(!voice.is_releasable(0.001));

        voice.retarget(0.0, 5.0, FadeCurve::Linear);
        assert!(voice.is_releasable(0.001));
        assert_eq!(voice.output().binds, 1);
        assert_eq!(voice.output().stops, 0);
    }
}
