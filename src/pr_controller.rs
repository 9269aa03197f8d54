// Proportional-Resonant (PR) current controller
//
// PR control gives high gain at one AC frequency, so a sinusoidal current
// reference is tracked with zero steady-state error where a PI controller
// would lag. Continuous transfer function:
//
//   PR(s) = Kp + (2*Kr*wc*s) / (s^2 + 2*wc*s + w0^2)
//
// The resonant part is discretized once with the bilinear (Tustin)
// transform at the fixed control sample rate, and executed as a two-tap
// direct-form difference equation.

/// PR controller with output limiting.
///
/// Coefficients are a pure function of (kr, wc, sample rate, fundamental
/// frequency) and are recomputed on every gain change — they are never
/// mutated independently.
pub struct PrController {
    /// Proportional gain
    kp: f32,
    /// Resonant gain
    kr: f32,
    /// Cutoff frequency [rad/s] (resonant peak bandwidth)
    wc: f32,

    /// Discrete numerator coefficients (b1 is structurally zero)
    b0: f32,
    b1: f32,
    b2: f32,
    /// Discrete denominator coefficients
    a1: f32,
    a2: f32,

    /// Error input history
    x1: f32,
    x2: f32,
    /// Resonant output history
    y1: f32,
    y2: f32,

    /// Output limits
    output_min: f32,
    output_max: f32,

    /// Sample rate the coefficients were derived for [Hz]
    sample_freq_hz: f32,
    /// Resonant (fundamental) frequency [Hz]
    fundamental_freq_hz: f32,

    /// False until the coefficients have been computed
    initialized: bool,
    /// Updates since the last reset
    sample_count: u32,
}

impl PrController {
    /// Create a new PR controller.
    ///
    /// # Arguments
    /// * `kp` - Proportional gain
    /// * `kr` - Resonant gain
    /// * `wc` - Cutoff frequency [rad/s]
    /// * `sample_freq_hz` - Control loop rate [Hz]
    /// * `fundamental_freq_hz` - Frequency of the resonant peak [Hz]
    pub fn new(kp: f32, kr: f32, wc: f32, sample_freq_hz: f32, fundamental_freq_hz: f32) -> Self {
        let mut pr = Self {
            kp,
            kr,
            wc,
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            // Default limits: modulation index range
            output_min: 0.0,
            output_max: 1.0,
            sample_freq_hz,
            fundamental_freq_hz,
            initialized: false,
            sample_count: 0,
        };
        pr.calculate_coefficients();
        pr.initialized = true;
        pr
    }

    /// Discretize the resonant part with the bilinear transform.
    ///
    /// H(s) = (2*Kr*wc*s) / (s^2 + 2*wc*s + w0^2)
    /// maps to H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
    fn calculate_coefficients(&mut self) {
        let t = 1.0 / self.sample_freq_hz;
        let w0 = 2.0 * core::f32::consts::PI * self.fundamental_freq_hz;
        let w0_sq = w0 * w0;
        let wc2 = 2.0 * self.wc;

        let denom = 4.0 + wc2 * t + w0_sq * t * t;
        self.a1 = (2.0 * w0_sq * t * t - 8.0) / denom;
        self.a2 = (4.0 - wc2 * t + w0_sq * t * t) / denom;

        let num_scale = 2.0 * self.kr * self.wc * t;
        self.b0 = num_scale * 2.0 / denom;
        self.b1 = 0.0;
        self.b2 = -num_scale * 2.0 / denom;
    }

    /// Run one control update.
    ///
    /// # Arguments
    /// * `reference` - Desired value (e.g. instantaneous current command)
    /// * `measured` - Measured feedback
    ///
    /// # Returns
    /// Controller output clamped to [output_min, output_max]. An
    /// uninitialized controller returns a safe 0.0 rather than operating
    /// on garbage coefficients.
    pub fn update(&mut self, reference: f32, measured: f32) -> f32 {
        if !self.initialized {
            return 0.0;
        }

        let error = reference - measured;

        // Proportional term
        let p_term = self.kp * error;

        // Resonant term: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                       - a1*y[n-1] - a2*y[n-2]
        let r_term = self.b0 * error + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        // Shift history
        self.x2 = self.x1;
        self.x1 = error;
        self.y2 = self.y1;
        self.y1 = r_term;

        self.sample_count += 1;

        // Clamp after summing so saturation reflects total commanded effort
        (p_term + r_term).clamp(self.output_min, self.output_max)
    }

    /// Zero the filter history and sample counter.
    ///
    /// Required before reusing the controller for a new control episode,
    /// so no transient bleeds over from stale state.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
        self.sample_count = 0;
    }

    /// Set the output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    /// Set the proportional and resonant gains.
    ///
    /// Recomputes the discrete coefficients so they stay consistent with
    /// the gains.
    pub fn set_gains(&mut self, kp: f32, kr: f32) {
        self.kp = kp;
        self.kr = kr;
        self.calculate_coefficients();
    }

    /// Get the proportional gain
    pub fn kp(&self) -> f32 {
        self.kp
    }

    /// Get the resonant gain
    pub fn kr(&self) -> f32 {
        self.kr
    }

    /// Updates since the last reset
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }
}

/// An uninitialized controller: coefficients not yet computed, `update`
/// returns 0.0 until it is replaced by a properly constructed one.
impl Default for PrController {
    fn default() -> Self {
        Self {
            kp: 0.0,
            kr: 0.0,
            wc: 0.0,
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            output_min: 0.0,
            output_max: 1.0,
            sample_freq_hz: 0.0,
            fundamental_freq_hz: 0.0,
            initialized: false,
            sample_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FREQ: f32 = 5000.0;
    const FUNDAMENTAL: f32 = 50.0;

    fn controller() -> PrController {
        let mut pr = PrController::new(1.0, 50.0, 10.0, SAMPLE_FREQ, FUNDAMENTAL);
        pr.set_limits(-10.0, 10.0);
        pr
    }

    #[test]
    fn test_uninitialized_returns_zero() {
        let mut pr = PrController::default();
        assert_eq!(pr.update(5.0, 0.0), 0.0);
        assert_eq!(pr.sample_count(), 0);
    }

    #[test]
    fn test_zero_error_stays_zero() {
        let mut pr = controller();
        for _ in 0..100 {
            assert_eq!(pr.update(3.0, 3.0), 0.0);
        }
    }

    #[test]
    fn test_first_sample_deterministic() {
        // With zero history the first output is (kp + b0) * error exactly
        let mut pr = controller();
        pr.reset();
        let error = 2.0;
        let t = 1.0 / SAMPLE_FREQ;
        let w0 = 2.0 * core::f32::consts::PI * FUNDAMENTAL;
        let denom = 4.0 + 2.0 * 10.0 * t + w0 * w0 * t * t;
        let b0 = 2.0 * 50.0 * 10.0 * t * 2.0 / denom;
        let expected = 1.0 * error + b0 * error;
        let out = pr.update(error, 0.0);
        assert!((out - expected).abs() < 1e-5);
    }

    #[test]
    fn test_output_clamped_post_sum() {
        let mut pr = PrController::new(100.0, 50.0, 10.0, SAMPLE_FREQ, FUNDAMENTAL);
        pr.set_limits(0.0, 1.0);
        // Huge proportional term saturates the summed output
        assert_eq!(pr.update(10.0, 0.0), 1.0);
        assert_eq!(pr.update(-10.0, 0.0), 0.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut pr = controller();
        for _ in 0..10 {
            pr.update(1.0, 0.0);
        }
        assert_eq!(pr.sample_count(), 10);
        pr.reset();
        assert_eq!(pr.sample_count(), 0);
        // After reset the first-sample output is reproduced exactly
        let a = pr.update(2.0, 0.0);
        pr.reset();
        let b = pr.update(2.0, 0.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_gains_recomputes_coefficients() {
        let mut pr = controller();
        let out_before = {
            pr.reset();
            pr.update(1.0, 0.0)
        };
        pr.set_gains(1.0, 100.0);
        pr.reset();
        let out_after = pr.update(1.0, 0.0);
        // Doubling kr doubles b0, so the resonant share of the first
        // sample doubles: out = kp*e + b0*e
        let resonant_before = out_before - 1.0;
        let resonant_after = out_after - 1.0;
        assert!((resonant_after - 2.0 * resonant_before).abs() < 1e-5);
    }
}
