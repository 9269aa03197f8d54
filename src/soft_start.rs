// Soft-start ramp for the inverter output
//
// Gradually raises the modulation index from 0 to the target value so the
// output transformer and DC-link capacitors are not hit with full
// amplitude at turn-on.

/// Soft-start sequence state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoftStartState {
    /// Not running; also the state after an abort
    Idle,
    /// Linear ramp in progress
    Ramping,
    /// Target reached; stays here until begin() or abort()
    Complete,
}

/// Time-based linear ramp of the modulation index.
///
/// The caller passes in the monotonic millisecond clock; the ramp itself
/// has no timer dependency and `update()` is safe to call every control
/// period regardless of state.
pub struct SoftStart {
    /// Target modulation index
    target_mi: f32,
    /// Ramp output
    current_mi: f32,
    /// MI per millisecond
    ramp_rate: f32,
    /// Timestamp of begin() [ms]
    start_time_ms: u64,
    /// Ramp duration [ms]
    ramp_duration_ms: u64,
    state: SoftStartState,
}

impl SoftStart {
    /// Create an idle soft-start with the given ramp duration
    pub fn new(ramp_duration_ms: u64) -> Self {
        Self {
            target_mi: 0.0,
            current_mi: 0.0,
            ramp_rate: 0.0,
            start_time_ms: 0,
            ramp_duration_ms,
            state: SoftStartState::Idle,
        }
    }

    /// Start a ramp toward `target_mi` (clamped to [0, 1]).
    ///
    /// Resets the output to 0 and records `now_ms` as the ramp origin.
    pub fn begin(&mut self, target_mi: f32, now_ms: u64) {
        let target_mi = target_mi.clamp(0.0, 1.0);

        self.target_mi = target_mi;
        self.current_mi = 0.0;
        self.start_time_ms = now_ms;
        self.ramp_rate = target_mi / self.ramp_duration_ms as f32;
        self.state = SoftStartState::Ramping;
    }

    /// Advance the ramp. Only acts while ramping.
    pub fn update(&mut self, now_ms: u64) {
        if self.state != SoftStartState::Ramping {
            return;
        }

        let elapsed = now_ms.wrapping_sub(self.start_time_ms);

        if elapsed >= self.ramp_duration_ms {
            // Snap exactly to the target so float drift cannot leave the
            // ramp permanently just short of it
            self.current_mi = self.target_mi;
            self.state = SoftStartState::Complete;
        } else {
            self.current_mi = self.ramp_rate * elapsed as f32;

            // Coarse tick granularity must not overshoot the target
            if self.current_mi > self.target_mi {
                self.current_mi = self.target_mi;
            }
        }
    }

    /// Abort the ramp: output back to 0, state to Idle.
    ///
    /// Idle is distinct from Complete — a caller gating on
    /// `is_complete()` treats an aborted ramp as not complete.
    pub fn abort(&mut self) {
        self.current_mi = 0.0;
        self.state = SoftStartState::Idle;
    }

    /// Current ramp output (modulation index)
    pub fn current_mi(&self) -> f32 {
        self.current_mi
    }

    /// True once the ramp has reached its target
    pub fn is_complete(&self) -> bool {
        self.state == SoftStartState::Complete
    }

    /// Current state (diagnostics)
    pub fn state(&self) -> SoftStartState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_midpoint_and_completion() {
        let mut ss = SoftStart::new(2000);
        ss.begin(0.8, 1000);

        ss.update(2000); // 1000ms elapsed
        assert!((ss.current_mi() - 0.4).abs() < 1e-3);
        assert!(!ss.is_complete());

        ss.update(3000); // 2000ms elapsed
        assert_eq!(ss.current_mi(), 0.8);
        assert!(ss.is_complete());
        assert_eq!(ss.state(), SoftStartState::Complete);
    }

    #[test]
    fn test_update_idempotent_after_complete() {
        let mut ss = SoftStart::new(2000);
        ss.begin(0.5, 0);
        ss.update(5000);
        assert!(ss.is_complete());
        ss.update(6000);
        assert_eq!(ss.current_mi(), 0.5);
        assert!(ss.is_complete());
    }

    #[test]
    fn test_update_without_begin_is_noop() {
        let mut ss = SoftStart::new(2000);
        ss.update(1234);
        assert_eq!(ss.current_mi(), 0.0);
        assert_eq!(ss.state(), SoftStartState::Idle);
    }

    #[test]
    fn test_begin_clamps_target() {
        let mut ss = SoftStart::new(1000);
        ss.begin(1.5, 0);
        ss.update(1000);
        assert_eq!(ss.current_mi(), 1.0);
    }

    #[test]
    fn test_abort_is_not_complete() {
        let mut ss = SoftStart::new(2000);
        ss.begin(0.8, 0);
        ss.update(1000);
        assert!(ss.current_mi() > 0.0);

        ss.abort();
        assert_eq!(ss.current_mi(), 0.0);
        assert_eq!(ss.state(), SoftStartState::Idle);
        assert!(!ss.is_complete());

        // A new begin() restarts cleanly after an abort
        ss.begin(0.6, 10_000);
        ss.update(12_000);
        assert!(ss.is_complete());
        assert_eq!(ss.current_mi(), 0.6);
    }
}
