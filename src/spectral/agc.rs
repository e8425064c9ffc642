// src/spectral/agc.rs

use crate::config::AgcParams;

/// Closed-loop auto-gain. One update per cycle from the observed peak
/// magnitude (DC excluded). The asymmetry is deliberate: attack pulls the
/// gain down fast when the signal gets loud, release raises it slowly when
/// the signal gets quiet. The resulting factor feeds the *next* cycle's
/// input scaling; a one-cycle feedback delay is expected.
pub struct AutoGain {
    params: AgcParams,
    gain: f32,
    /// Manual gain reference supplied by configuration storage; multiplied
    /// into the effective factor, never into the loop state.
    reference: f32,
}

impl AutoGain {
    pub fn new(params: AgcParams) -> Self {
        Self {
            params,
            gain: 1.0f32.clamp(params.min_gain, params.max_gain),
            reference: 1.0,
        }
    }

    /// Update from this cycle's peak magnitude. A zero peak (silence)
    /// leaves the gain where it is. Returns the new loop gain.
    pub fn update(&mut self, peak: f32) -> f32 {
        if peak > 0.0 {
            let target =
                (self.params.target_peak / peak).clamp(self.params.min_gain, self.params.max_gain);
            let coeff = if target < self.gain {
                self.params.attack_coeff
            } else {
                self.params.release_coeff
            };
            self.gain += (target - self.gain) * coeff;
            self.gain = self.gain.clamp(self.params.min_gain, self.params.max_gain);
        }
        self.gain
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Gain the sample source should apply next cycle.
    pub fn effective_gain(&self) -> f32 {
        self.gain * self.reference
    }

    pub fn set_reference(&mut self, reference: f32) {
        self.reference = reference.max(0.0);
    }

    pub fn reset(&mut self) {
        self.gain = 1.0f32.clamp(self.params.min_gain, self.params.max_gain);
    }
}
