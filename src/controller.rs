use crate::config::{FadeConfig, Settings, TimingConfig};
use crate::constellation::{Constellation, ConstellationBuilder, WidthStats};
use crate::field::ParticleField;
use rand::Rng;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Animating,
    Paused,
}

/// Owns one session: the field, the phase clock and the constellation state.
pub(crate) struct AnimationController<R: Rng> {
    timing: TimingConfig,
    fade: FadeConfig,
    particle_count: usize,
    field: ParticleField,
    builder: ConstellationBuilder,
    rng: R,
    phase: Phase,
    running: bool,
    phase_started: f64,
    constellation: Option<Constellation>,
    constellation_started: f64,
    used: BTreeSet<usize>,
    widths: WidthStats,
    runs: u64,
}

impl<R: Rng> AnimationController<R> {
    pub(crate) fn new(settings: &Settings, rng: R, now: f64) -> Self {
        let mut ctrl = Self {
            timing: settings.timing.clone(),
            fade: settings.fade.clone(),
            particle_count: settings.field.particle_count,
            field: ParticleField::new(settings.field.clone()),
            builder: ConstellationBuilder::new(settings.constellation.clone()),
            rng,
            phase: Phase::Animating,
            running: true,
            phase_started: now,
            constellation: None,
            constellation_started: now,
            used: BTreeSet::new(),
            widths: WidthStats::default(),
            runs: 0,
        };
        ctrl.reset(now);
        ctrl
    }

    /// Starts a new run: fresh field, empty used set, back to animating.
    pub(crate) fn reset(&mut self, now: f64) {
        self.constellation = None;
        self.used.clear();
        self.field.initialize(self.particle_count, &mut self.rng);
        self.phase = Phase::Animating;
        self.phase_started = now;
        self.runs += 1;
    }

    /// Advances one frame; returns the new phase when a transition happened.
    pub(crate) fn tick(&mut self, now: f64) -> Option<Phase> {
        let elapsed = now - self.phase_started;
        match self.phase {
            Phase::Animating => {
                self.field.advance(now);
                if elapsed >= self.timing.animation_ms {
                    self.enter_pause(now);
                    return Some(Phase::Paused);
                }
                None
            }
            Phase::Paused => {
                if elapsed < self.timing.pause_ms {
                    return None;
                }
                self.constellation = None;
                self.field.clear_constellation_marks();
                if self.running {
                    self.reset(now);
                    Some(Phase::Animating)
                } else if self.timing.rotate_when_frozen {
                    self.enter_pause(now);
                    None
                } else {
                    self.phase_started = now;
                    None
                }
            }
        }
    }

    fn enter_pause(&mut self, now: f64) {
        self.phase = Phase::Paused;
        self.phase_started = now;
        let c = self
            .builder
            .build(&mut self.field, &mut self.used, &mut self.rng);
        log::debug!(
            "pause: {} of {} arrived, {} members, {} used",
            self.field.arrived_count(),
            self.field.len(),
            c.members().len(),
            self.used.len()
        );
        self.widths.record(&c);
        self.constellation = Some(c);
        self.constellation_started = now;
    }

    /// Freezes the session at its next pause; resets stop for good.
    pub(crate) fn stop(&mut self) {
        if self.running {
            log::info!("stopped after {} runs", self.runs);
        }
        self.running = false;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn field(&self) -> &ParticleField {
        &self.field
    }

    pub(crate) fn constellation(&self) -> Option<&Constellation> {
        self.constellation.as_ref()
    }

    /// When the current constellation appeared, if one is shown.
    pub(crate) fn shown_since(&self) -> Option<f64> {
        self.constellation.as_ref().map(|_| self.constellation_started)
    }

    pub(crate) fn reveal_progress(&self, now: f64) -> f64 {
        match self.shown_since() {
            Some(start) => ((now - start) / self.timing.reveal_ms).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn used(&self) -> &BTreeSet<usize> {
        &self.used
    }

    pub(crate) fn widths(&self) -> &WidthStats {
        &self.widths
    }

    pub(crate) fn fade(&self) -> &FadeConfig {
        &self.fade
    }

    #[cfg(test)]
    pub(crate) fn runs(&self) -> u64 {
        self.runs
    }
}
