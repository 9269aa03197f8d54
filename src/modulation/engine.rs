// Modulation engine for the 5-level cascaded H-bridge
//
// Converts a modulation index and phase accumulator into duty cycle pairs
// for two H-bridges, using either phase-shifted or level-shifted carriers.

use libm::roundf;

use super::{CarrierStrategy, HbridgeDuty, InverterDuties, SineTable};
use crate::config::{MAX_OUTPUT_FREQUENCY_HZ, MIN_OUTPUT_FREQUENCY_HZ, SINE_TABLE_SIZE};

/// Sinusoidal PWM modulator for two cascaded H-bridges.
///
/// Owns the sine reference table and a fixed-point phase accumulator.
/// `calculate_duties()` and `advance_phase()` are called once per control
/// period; the setters are safe to call from a lower-priority context.
pub struct Modulator {
    /// Modulation index, 0.0 to 1.0
    modulation_index: f32,
    /// Output frequency [Hz]
    frequency_hz: f32,
    /// Current position in the sine table
    phase_index: usize,
    /// When disabled, both bridges output 50% duty (zero average)
    enabled: bool,
    /// Carrier placement, fixed at initialization
    strategy: CarrierStrategy,
    /// Carrier period in timer counts
    period: u16,
    /// Rate at which advance_phase() is called [Hz]
    update_rate_hz: f32,
    /// Sine reference table
    table: SineTable,
}

impl Modulator {
    /// Create a new modulator.
    ///
    /// # Arguments
    /// * `strategy` - Carrier strategy (phase- or level-shifted)
    /// * `period` - PWM carrier period in timer counts
    /// * `update_rate_hz` - Control loop rate driving `advance_phase()`
    pub fn new(strategy: CarrierStrategy, period: u16, update_rate_hz: f32) -> Self {
        Self {
            modulation_index: crate::config::DEFAULT_MODULATION_INDEX,
            frequency_hz: crate::config::DEFAULT_OUTPUT_FREQUENCY_HZ,
            phase_index: 0,
            enabled: false,
            strategy,
            period,
            update_rate_hz,
            table: SineTable::new(),
        }
    }

    /// Calculate the duty set for the current phase position.
    ///
    /// When disabled, all four outputs sit at exactly half the carrier
    /// period: with complementary bipolar switching this is the zero
    /// average output ("safe idle"), not 0% duty.
    pub fn calculate_duties(&self) -> InverterDuties {
        if !self.enabled {
            let half = self.period / 2;
            let idle = HbridgeDuty { ch1: half, ch2: half };
            return InverterDuties {
                hbridge1: idle,
                hbridge2: idle,
            };
        }

        // Modulation reference in [-1, +1]
        let reference = self.table.lookup(self.phase_index) * self.modulation_index;

        match self.strategy {
            CarrierStrategy::PhaseShifted => self.phase_shifted_duties(reference),
            CarrierStrategy::LevelShifted => self.level_shifted_duties(reference),
        }
    }

    /// Phase-shifted carriers: bridge 2 compares against a carrier 180°
    /// out of phase, realized as the mirrored reference. Both bridges
    /// switch over the full cycle; the interleaving doubles the output
    /// ripple frequency.
    fn phase_shifted_duties(&self, reference: f32) -> InverterDuties {
        let period = self.period as f32;

        // Bipolar PWM: duty = (1 + ref) / 2 * period
        let duty1 = roundf((1.0 + reference) * period / 2.0).clamp(0.0, period) as u16;
        // 180° shift
        let duty2 = roundf((1.0 - reference) * period / 2.0).clamp(0.0, period) as u16;

        InverterDuties {
            hbridge1: HbridgeDuty {
                ch1: duty1,
                ch2: self.period - duty1,
            },
            hbridge2: HbridgeDuty {
                ch1: duty2,
                ch2: self.period - duty2,
            },
        }
    }

    /// Level-shifted carriers: bridge 1 spans the [-1, 0] band, bridge 2
    /// the [0, +1] band. Each bridge only switches while the reference is
    /// inside its band, producing true 5-level output (-2,-1,0,+1,+2 in
    /// DC-bus units).
    fn level_shifted_duties(&self, reference: f32) -> InverterDuties {
        let period = self.period as f32;

        // Bridge 1: ref = -1 -> 0% duty, ref >= 0 -> 100% duty
        let duty1_norm = ((reference + 1.0) * 0.5).clamp(0.0, 1.0);
        // Bridge 2: ref <= 0 -> 0% duty, ref = +1 -> 100% duty
        let duty2_norm = reference.clamp(0.0, 1.0);

        let duty1 = (duty1_norm * period) as u16;
        let duty2 = (duty2_norm * period) as u16;

        InverterDuties {
            hbridge1: HbridgeDuty {
                ch1: duty1,
                ch2: self.period - duty1,
            },
            hbridge2: HbridgeDuty {
                ch1: duty2,
                ch2: self.period - duty2,
            },
        }
    }

    /// Advance the phase accumulator by one control period.
    ///
    /// step = round(N · f_out / f_update). The step is quantized to whole
    /// table entries, which bounds the frequency resolution: output
    /// frequencies below f_update / (2·N) round to a zero step. With the
    /// 200-entry table at 5 kHz that is 12.5 Hz — a known resolution
    /// limit of the fixed-point accumulator.
    pub fn advance_phase(&mut self) {
        let step =
            roundf(SINE_TABLE_SIZE as f32 * self.frequency_hz / self.update_rate_hz) as usize;
        self.phase_index = (self.phase_index + step) % SINE_TABLE_SIZE;
    }

    /// Set the modulation index, clamped to [0, 1]
    pub fn set_index(&mut self, mi: f32) {
        self.modulation_index = mi.clamp(0.0, 1.0);
    }

    /// Set the output frequency [Hz].
    ///
    /// Requests outside [1, 400] Hz are silently ignored; the caller is
    /// the trusted periodic task, not a validated external API.
    pub fn set_frequency(&mut self, freq: f32) {
        if !(MIN_OUTPUT_FREQUENCY_HZ..=MAX_OUTPUT_FREQUENCY_HZ).contains(&freq) {
            return;
        }
        self.frequency_hz = freq;
    }

    /// Enable or disable modulation output
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Get the current modulation index
    pub fn modulation_index(&self) -> f32 {
        self.modulation_index
    }

    /// Get the output frequency [Hz]
    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    /// Check whether modulation output is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the current phase index (diagnostics)
    pub fn phase_index(&self) -> usize {
        self.phase_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: u16 = 16_999;
    const UPDATE_RATE: f32 = 5_000.0;

    fn enabled_modulator(strategy: CarrierStrategy) -> Modulator {
        let mut m = Modulator::new(strategy, PERIOD, UPDATE_RATE);
        m.set_enabled(true);
        m
    }

    #[test]
    fn test_disabled_outputs_half_period() {
        let mut m = Modulator::new(CarrierStrategy::PhaseShifted, PERIOD, UPDATE_RATE);
        m.set_index(1.0);
        // Never enabled: all four outputs at exactly half the period
        let d = m.calculate_duties();
        assert_eq!(d.hbridge1.ch1, PERIOD / 2);
        assert_eq!(d.hbridge1.ch2, PERIOD / 2);
        assert_eq!(d.hbridge2.ch1, PERIOD / 2);
        assert_eq!(d.hbridge2.ch2, PERIOD / 2);
    }

    #[test]
    fn test_phase_shifted_complementary_pairing() {
        let mut m = enabled_modulator(CarrierStrategy::PhaseShifted);
        for &mi in &[0.0, 0.3, 0.8, 1.0] {
            m.set_index(mi);
            for _ in 0..SINE_TABLE_SIZE {
                let d = m.calculate_duties();
                assert_eq!(d.hbridge1.ch1 + d.hbridge1.ch2, PERIOD);
                assert_eq!(d.hbridge2.ch1 + d.hbridge2.ch2, PERIOD);
                m.advance_phase();
            }
        }
    }

    #[test]
    fn test_phase_shifted_bridges_mirror() {
        let mut m = enabled_modulator(CarrierStrategy::PhaseShifted);
        m.set_index(1.0);
        // At phase 0 the reference is 0: both bridges at ~50%
        let d = m.calculate_duties();
        assert_eq!(d.hbridge1.ch1, d.hbridge2.ch1);
        // Quarter cycle: reference = +1, bridge 1 full on, bridge 2 full off
        let mut m = enabled_modulator(CarrierStrategy::PhaseShifted);
        m.set_index(1.0);
        m.set_frequency(50.0);
        for _ in 0..SINE_TABLE_SIZE / 4 / 2 {
            // 50Hz at 5kHz advances 2 entries per step
            m.advance_phase();
        }
        let d = m.calculate_duties();
        assert_eq!(d.hbridge1.ch1, PERIOD);
        assert_eq!(d.hbridge2.ch1, 0);
    }

    #[test]
    fn test_level_shifted_bands() {
        let mut m = enabled_modulator(CarrierStrategy::LevelShifted);
        m.set_index(1.0);
        // Phase 0: ref = 0 -> bridge 1 at 50%, bridge 2 off
        let d = m.calculate_duties();
        assert_eq!(d.hbridge1.ch1, PERIOD / 2);
        assert_eq!(d.hbridge2.ch1, 0);
        // Advance to the negative half cycle: bridge 2 stays off
        for _ in 0..(SINE_TABLE_SIZE / 2 + SINE_TABLE_SIZE / 8) / 2 {
            m.advance_phase();
        }
        let d = m.calculate_duties();
        assert_eq!(d.hbridge2.ch1, 0);
        assert!(d.hbridge1.ch1 < PERIOD / 2);
    }

    #[test]
    fn test_phase_wrap_invariant() {
        for &freq in &[1.0, 12.5, 50.0, 60.0, 400.0] {
            let mut m = enabled_modulator(CarrierStrategy::PhaseShifted);
            m.set_frequency(freq);
            for _ in 0..10 * SINE_TABLE_SIZE {
                m.advance_phase();
                assert!(m.phase_index() < SINE_TABLE_SIZE);
            }
        }
    }

    #[test]
    fn test_set_index_clamps() {
        let mut m = enabled_modulator(CarrierStrategy::PhaseShifted);
        m.set_index(1.5);
        assert_eq!(m.modulation_index(), 1.0);
        m.set_index(-0.2);
        assert_eq!(m.modulation_index(), 0.0);
    }

    #[test]
    fn test_set_frequency_rejects_out_of_range() {
        let mut m = enabled_modulator(CarrierStrategy::PhaseShifted);
        m.set_frequency(50.0);
        m.set_frequency(0.5);
        assert_eq!(m.frequency_hz(), 50.0);
        m.set_frequency(450.0);
        assert_eq!(m.frequency_hz(), 50.0);
        m.set_frequency(400.0);
        assert_eq!(m.frequency_hz(), 400.0);
    }
}
