//! Ambient Bus
//!
//! The engine that owns the profile stack, the emitter registry and the voice
//! pool. Each tick integrates voice fades; a full re-score (desired state,
//! ranking, admission, binding) runs on a timer and immediately after any
//! stack or candidate-set change.
//!
//! ```text
//! stack ─► desired state ─► candidates ─► rank ─► admit top K ─► voices ─► fades
//! ```
//!
//! A losing voice keeps its binding until it has faded to silence. Admitted
//! candidates with no idle voice wait for the next release, which re-scores
//! at once.

use crate::config::BusConfig;
use crate::desired::DesiredState;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::emitter::{Emitter, EmitterId, EmitterRegistry, Position3D};
use crate::listener::{ListenerProvider, NoListener};
use crate::profile::AmbientProfile;
use crate::scoring::{self, CandidateKey, ScoredCandidate};
use crate::stack::{ProfileStack, StackEntry, StackToken};
use crate::track::TrackCatalog;
use crate::voice::{BindParams, SpatialBinding, VoiceOutput, VoicePool};
use crate::{AmbientError, AmbientResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rtrb::Consumer;
use std::sync::Arc;

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusActivity {
    /// Nothing to do until the next mutating call
    Idle,
    /// Voices are bound or the stack/emitters hold work
    Active,
}

/// Observable state of one voice
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSnapshot {
    pub key: Option<CandidateKey>,
    pub track: Option<String>,
    pub current_volume: f32,
    pub target_volume: f32,
    pub playing: bool,
}

/// Observable bus state (debug overlays, tests)
#[derive(Debug, Clone, PartialEq)]
pub struct BusSnapshot {
    pub idle: bool,
    pub stack_depth: usize,
    pub emitter_count: usize,
    /// `(track, volume, priority)` sorted by track
    pub desired: Vec<(String, f32, i32)>,
    /// Admitted candidates in rank order
    pub admitted: Vec<CandidateKey>,
    pub voices: Vec<VoiceSnapshot>,
    pub rescore_count: u64,
}

/// Ambient voice allocation and mixing engine
pub struct AmbientBus<V: VoiceOutput> {
    config: BusConfig,
    catalog: Arc<dyn TrackCatalog + Send + Sync>,
    stack: ProfileStack,
    desired: DesiredState,
    emitters: EmitterRegistry,
    listener: Box<dyn ListenerProvider + Send>,
    voices: VoicePool<V>,
    admitted: Vec<ScoredCandidate>,
    diagnostics: DiagnosticSink,
    rng: StdRng,

    // Fade of the most recent mutating call (last writer wins)
    fade_seconds: f32,
    rescore_elapsed: f32,
    rescore_count: u64,
    master_gain: f32,
    ambient_gain: f32,
    idle: bool,
}

impl<V: VoiceOutput> AmbientBus<V> {
    /// Create a bus owning `voices`. The pool size must equal `config.voice_count`.
    pub fn new(
        config: BusConfig,
        catalog: Arc<dyn TrackCatalog + Send + Sync>,
        voices: Vec<V>,
    ) -> AmbientResult<Self> {
        config.validate()?;
        if voices.len() != config.voice_count {
            return Err(AmbientError::InvalidConfig(format!(
                "voice_count is {} but {} voices were supplied",
                config.voice_count,
                voices.len()
            )));
        }

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        log::info!(
            "[AmbientBus] Created with {} voices ({} candidates)",
            voices.len(),
            if config.spatial_emitters {
                "emitter"
            } else {
                "layer"
            }
        );

        Ok(Self {
            catalog,
            stack: ProfileStack::new(),
            desired: DesiredState::new(),
            emitters: EmitterRegistry::new(),
            listener: Box::new(NoListener),
            voices: VoicePool::new(voices),
            admitted: Vec::new(),
            diagnostics: DiagnosticSink::new(config.diagnostics_capacity),
            rng,
            fade_seconds: config.default_fade_seconds,
            rescore_elapsed: 0.0,
            rescore_count: 0,
            master_gain: config.master_gain,
            ambient_gain: config.ambient_gain,
            idle: true,
            config,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STACK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Replace the whole stack with one priority-0 entry. `None` leaves it empty.
    pub fn set_ambient_profile(
        &mut self,
        profile: Option<Arc<AmbientProfile>>,
        fade_seconds: Option<f32>,
    ) {
        let fade = self.resolve_fade(profile.as_deref(), fade_seconds);
        if let Some(profile) = &profile {
            self.check_profile(profile);
            log::debug!("[AmbientBus] Set profile '{}' (fade {}s)", profile.name, fade);
        } else {
            log::debug!("[AmbientBus] Set empty profile (fade {}s)", fade);
        }

        self.stack.set_single(profile, fade);
        self.on_stack_changed(fade);
    }

    /// Add a profile on top of the active ones.
    ///
    /// Returns [`StackToken::INVALID`] and changes nothing when `profile` is `None`.
    pub fn push_ambient_profile(
        &mut self,
        profile: Option<Arc<AmbientProfile>>,
        priority: i32,
        fade_seconds: Option<f32>,
    ) -> StackToken {
        let Some(profile) = profile else {
            self.diagnostics.report(Diagnostic::NullProfile);
            return StackToken::INVALID;
        };

        let fade = self.resolve_fade(Some(&*profile), fade_seconds);
        self.check_profile(&profile);
        let name = profile.name.clone();

        let token = self.stack.push(Some(profile), priority, fade);
        log::debug!(
            "[AmbientBus] Push '{}' priority {} as {} (depth {})",
            name,
            priority,
            token,
            self.stack.depth()
        );
        self.on_stack_changed(fade);
        token
    }

    /// Remove the entry holding `token`. `None` fades with the entry's own fade.
    pub fn pop_ambient_token(&mut self, token: StackToken, fade_seconds: Option<f32>) {
        match self.stack.pop(token) {
            Some(entry) => self.on_entry_removed(entry, fade_seconds),
            None => self.diagnostics.report(Diagnostic::UnknownToken { token }),
        }
    }

    /// Remove the most recently pushed entry of `profile`
    pub fn pop_ambient_profile(&mut self, profile: &Arc<AmbientProfile>, fade_seconds: Option<f32>) {
        match self.stack.pop_profile(profile) {
            Some(entry) => self.on_entry_removed(entry, fade_seconds),
            None => self.diagnostics.report(Diagnostic::UnknownProfile {
                profile: profile.name.clone(),
            }),
        }
    }

    /// Empty the stack. `None` fades with `config.default_fade_seconds`.
    pub fn clear_ambient(&mut self, fade_seconds: Option<f32>) {
        let fade = fade_seconds.unwrap_or(self.config.default_fade_seconds);
        let removed = self.stack.clear();
        log::debug!("[AmbientBus] Clear ({} entries, fade {}s)", removed, fade);
        self.on_stack_changed(fade);
    }

    /// Number of active stack entries
    pub fn active_stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Active stack entries in push order
    pub fn stack_entries(&self) -> &[StackEntry] {
        self.stack.entries()
    }

    fn on_entry_removed(&mut self, entry: StackEntry, fade_seconds: Option<f32>) {
        let fade = fade_seconds.unwrap_or(entry.fade_seconds);
        log::debug!(
            "[AmbientBus] Pop '{}' {} (depth {})",
            entry.profile.name,
            entry.token,
            self.stack.depth()
        );
        self.on_stack_changed(fade);
    }

    fn on_stack_changed(&mut self, fade_seconds: f32) {
        self.fade_seconds = fade_seconds;
        self.wake();
        self.refresh_desired(true);
        self.rescore(true);
    }

    fn resolve_fade(&self, profile: Option<&AmbientProfile>, fade_seconds: Option<f32>) -> f32 {
        fade_seconds
            .or(profile.map(|p| p.default_fade_seconds))
            .unwrap_or(self.config.default_fade_seconds)
    }

    fn check_profile(&mut self, profile: &AmbientProfile) {
        if profile.layers.is_empty() {
            self.diagnostics.report(Diagnostic::EmptyProfile {
                profile: profile.name.clone(),
            });
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EMITTERS & LISTENER
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a positioned candidate
    pub fn register_emitter(&mut self, emitter: Emitter) -> EmitterId {
        let track = emitter.track_name().map(str::to_string);
        let id = self.emitters.register(emitter);

        match track {
            None => self
                .diagnostics
                .report(Diagnostic::EmitterWithoutTrack { emitter: id }),
            Some(track) if !self.catalog.contains(&track) => self
                .diagnostics
                .report(Diagnostic::UnresolvedEmitterTrack { emitter: id, track }),
            Some(_) => {}
        }
        if !self.config.spatial_emitters {
            self.diagnostics
                .report(Diagnostic::EmittersIgnored { emitter: id });
        }

        log::debug!(
            "[AmbientBus] Registered emitter {} ({} total)",
            id,
            self.emitters.len()
        );
        self.wake();
        self.rescore(false);
        id
    }

    /// Remove an emitter. Its voice, if any, fades out before release.
    pub fn unregister_emitter(&mut self, id: EmitterId) -> bool {
        if self.emitters.unregister(id).is_none() {
            self.diagnostics
                .report(Diagnostic::UnknownEmitter { emitter: id });
            return false;
        }

        log::debug!("[AmbientBus] Unregistered emitter {}", id);
        self.rescore(false);
        true
    }

    /// Move an emitter. Scoring picks the change up at the next re-score.
    pub fn set_emitter_position(&mut self, id: EmitterId, position: Position3D) -> bool {
        let Some(emitter) = self.emitters.get_mut(id) else {
            self.diagnostics
                .report(Diagnostic::UnknownEmitter { emitter: id });
            return false;
        };
        emitter.position = position;

        if let Some(index) = self.voices.find(&CandidateKey::Emitter(id)) {
            if let Some(voice) = self.voices.get_mut(index) {
                voice.set_position(position);
            }
        }
        true
    }

    pub fn emitters(&self) -> &EmitterRegistry {
        &self.emitters
    }

    /// Replace the listener position source
    pub fn set_listener_provider(&mut self, provider: impl ListenerProvider + Send + 'static) {
        self.listener = Box::new(provider);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TICK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance fades by `dt` seconds and run a throttled re-score when due
    pub fn tick(&mut self, dt: f32) -> BusActivity {
        if self.idle {
            return BusActivity::Idle;
        }

        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let gain = self.output_gain();
        for voice in self.voices.iter_mut() {
            voice.advance(dt, gain);
        }

        self.rescore_elapsed += dt;
        let released = self.release_silent();
        if released > 0 || self.rescore_elapsed >= self.config.rescore_interval_seconds {
            self.refresh_desired(false);
            self.rescore(false);
        }

        if self.stack.is_empty() && self.emitters.is_empty() && self.voices.bound_count() == 0 {
            self.idle = true;
            log::info!("[AmbientBus] Idle");
            return BusActivity::Idle;
        }

        BusActivity::Active
    }

    /// Whether the tick loop has stopped
    pub fn is_idle(&self) -> bool {
        self.idle
    }

    fn wake(&mut self) {
        if self.idle {
            self.idle = false;
            self.rescore_elapsed = 0.0;
            log::info!("[AmbientBus] Waking up");
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RE-SCORE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Rebuild desired state from the stack. Diagnostics only on stack changes.
    fn refresh_desired(&mut self, report: bool) {
        let diagnostics = &mut self.diagnostics;
        self.desired = DesiredState::aggregate(
            self.stack.entries(),
            self.catalog.as_ref(),
            &mut |diagnostic| {
                if report {
                    diagnostics.report(diagnostic);
                }
            },
        );
    }

    /// Rank candidates, admit the top K and drive voices toward the result.
    ///
    /// `restart_fades` retargets every bound voice with the active fade; otherwise
    /// only voices whose target moved get a new ramp.
    fn rescore(&mut self, restart_fades: bool) {
        let candidates = if self.config.spatial_emitters {
            scoring::emitter_candidates(&self.emitters)
        } else {
            scoring::layer_candidates(&self.desired)
        };
        let listener = self.listener.listener_position();
        let ranked = scoring::rank(&candidates, &self.desired, listener, &self.config.weights);
        let single_winner =
            self.config.spatial_emitters && !self.config.allow_multiple_emitters_per_track;
        let admitted = scoring::admit(&ranked, self.voices.len(), single_winner);

        let fade = self.fade_seconds;
        let curve = self.config.fade_curve;
        for voice in self.voices.iter_mut() {
            let Some(key) = voice.key() else {
                continue;
            };
            let target = admitted
                .iter()
                .find(|a| &a.key == key)
                .map_or(0.0, |a| a.desired_volume);
            if restart_fades || target != voice.target_volume() {
                voice.retarget(target, fade, curve);
            }
        }

        self.admitted = admitted;
        self.release_silent();

        let admitted = std::mem::take(&mut self.admitted);
        let mut waiting = 0;
        for candidate in &admitted {
            if self.voices.find(&candidate.key).is_some() {
                continue;
            }
            match self.voices.first_idle() {
                Some(slot) => self.bind_voice(slot, candidate),
                None => waiting += 1,
            }
        }
        self.admitted = admitted;

        self.rescore_elapsed = 0.0;
        self.rescore_count += 1;
        log::debug!(
            "[AmbientBus] Re-score: {} candidates, {} admitted, {} waiting",
            candidates.len(),
            self.admitted.len(),
            waiting
        );
    }

    fn bind_voice(&mut self, slot: usize, candidate: &ScoredCandidate) {
        let Some(desired) = self.desired.get(&candidate.track) else {
            return;
        };
        let track = Arc::clone(&desired.track);
        let playback = desired.playback;

        let spatial = match &candidate.key {
            CandidateKey::Layer(_) => None,
            CandidateKey::Emitter(id) => match self.emitters.get(*id) {
                Some(emitter) => Some(SpatialBinding {
                    position: emitter.position,
                    params: emitter.spatial,
                }),
                // Emitter vanished between scoring and binding
                None => return,
            },
        };

        let pitch = if playback.pitch.is_varied() {
            playback.pitch.pick(self.rng.random::<f32>())
        } else {
            playback.pitch.lo()
        };
        let start_offset_seconds = if playback.random_start && track.has_known_length() {
            self.rng.random_range(0.0..track.length_seconds)
        } else {
            0.0
        };
        let params = BindParams {
            looping: playback.looping,
            start_offset_seconds,
            pitch,
            spatial,
        };

        let gain = self.output_gain();
        let fade = self.fade_seconds;
        let curve = self.config.fade_curve;
        let Some(voice) = self.voices.get_mut(slot) else {
            return;
        };
        voice.bind(candidate.key.clone(), track, params, gain);
        voice.retarget(candidate.desired_volume, fade, curve);

        log::debug!(
            "[AmbientBus] Voice {} bound to {} (pitch {:.2}, offset {:.2}s)",
            slot,
            candidate.key,
            pitch,
            start_offset_seconds
        );
    }

    /// Release losing voices that have faded to silence
    fn release_silent(&mut self) -> usize {
        let threshold = self.config.silence_threshold;
        let mut released = 0;

        for (index, voice) in self.voices.iter_mut().enumerate() {
            let losing = match voice.key() {
                Some(key) => !self.admitted.iter().any(|a| &a.key == key),
                None => false,
            };
            if losing && voice.is_releasable(threshold) {
                if let Some(key) = voice.key() {
                    log::debug!("[AmbientBus] Voice {} released from {}", index, key);
                }
                voice.release();
                released += 1;
            }
        }

        released
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OUTPUT STAGE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = sanitize_gain(gain);
        self.apply_gain();
    }

    pub fn set_ambient_gain(&mut self, gain: f32) {
        self.ambient_gain = sanitize_gain(gain);
        self.apply_gain();
    }

    #[inline]
    fn output_gain(&self) -> f32 {
        self.master_gain * self.ambient_gain
    }

    fn apply_gain(&mut self) {
        let gain = self.output_gain();
        for voice in self.voices.iter_mut() {
            voice.advance(0.0, gain);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Desired state as of the last re-score
    pub fn desired_state(&self) -> &DesiredState {
        &self.desired
    }

    /// Candidates admitted by the last re-score, in rank order
    pub fn admitted(&self) -> &[ScoredCandidate] {
        &self.admitted
    }

    pub fn voices(&self) -> &VoicePool<V> {
        &self.voices
    }

    /// Consuming end of the diagnostics queue (available once)
    pub fn take_diagnostics(&mut self) -> Option<Consumer<Diagnostic>> {
        self.diagnostics.take_consumer()
    }

    /// Diagnostics lost to a full queue
    pub fn diagnostics_dropped(&self) -> u64 {
        self.diagnostics.dropped()
    }

    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            idle: self.idle,
            stack_depth: self.stack.depth(),
            emitter_count: self.emitters.len(),
            desired: self.desired.summary(),
            admitted: self.admitted.iter().map(|a| a.key.clone()).collect(),
            voices: self
                .voices
                .iter()
                .map(|voice| VoiceSnapshot {
                    key: voice.key().cloned(),
                    track: voice.binding().map(|b| b.track.name.clone()),
                    current_volume: voice.current_volume(),
                    target_volume: voice.target_volume(),
                    playing: voice.output().is_playing(),
                })
                .collect(),
            rescore_count: self.rescore_count,
        }
    }
}

fn sanitize_gain(gain: f32) -> f32 {
    if gain.is_finite() { gain.max(0.0) } else { 0.0 }
}
