// Precomputed one-cycle sine lookup table

use libm::sinf;

use crate::config::SINE_TABLE_SIZE;

/// One full cycle of sin(2π·i/N), generated once at startup.
///
/// Shared read-only reference for the modulation engine. Entry `i` holds
/// sin(2π·i/N) for a table of N samples, so stepping through the table at
/// a fixed rate produces a sine wave whose frequency is set by the step
/// size.
pub struct SineTable {
    table: [f32; SINE_TABLE_SIZE],
}

impl SineTable {
    /// Generate the lookup table
    pub fn new() -> Self {
        let mut table = [0.0f32; SINE_TABLE_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = sinf(2.0 * core::f32::consts::PI * i as f32 / SINE_TABLE_SIZE as f32);
        }
        Self { table }
    }

    /// Look up the sine value at `index`.
    ///
    /// `index` must be below [`SineTable::len`]; the modulation engine's
    /// phase wrap guarantees this.
    #[inline]
    pub fn lookup(&self, index: usize) -> f32 {
        self.table[index]
    }

    /// Number of samples in one cycle
    #[inline]
    pub const fn len(&self) -> usize {
        SINE_TABLE_SIZE
    }
}

impl Default for SineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Sine via idsp::cossin() for a table index (fast, ~40 cycles on Cortex-M)
#[inline]
#[allow(dead_code)]
fn sine_idsp(index: usize) -> f32 {
    // Map table position [0, N) onto the full i32 turn used by idsp
    let phase = ((index as u64 * (1u64 << 32) / SINE_TABLE_SIZE as u64) as u32) as i32;
    let (_cos, sin) = idsp::cossin(phase);

    const I32_TO_F32: f32 = 1.0 / 2147483648.0; // 1 / 2^31
    sin as f32 * I32_TO_F32
}

/// Sine via libm for a table index (slower, ~100-200 cycles)
#[inline]
#[allow(dead_code)]
fn sine_libm(index: usize) -> f32 {
    sinf(2.0 * core::f32::consts::PI * index as f32 / SINE_TABLE_SIZE as f32)
}

/// Benchmark the three ways of obtaining the modulation sine reference.
///
/// Runs table lookup, idsp::cossin() and libm::sinf() `iterations` times
/// each and returns the last results plus the DWT tick counts:
/// (table, idsp, libm, table_ticks, idsp_ticks, libm_ticks).
#[cfg(not(test))]
#[allow(dead_code)]
pub fn benchmark_sine_reference(iterations: u32) -> (f32, f32, f32, u32, u32, u32) {
    use cortex_m::peripheral::DWT;

    // Test index: a quarter cycle plus a bit, away from the exact zeros
    let index = SINE_TABLE_SIZE / 4 + 3;
    let table = SineTable::new();

    unsafe {
        let dwt = &*DWT::PTR;

        let start_table = dwt.cyccnt.read();
        let mut result_table = 0.0;
        for _ in 0..iterations {
            result_table = table.lookup(index);
            // Prevent optimization
            core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
        }
        let end_table = dwt.cyccnt.read();

        let start_idsp = dwt.cyccnt.read();
        let mut result_idsp = 0.0;
        for _ in 0..iterations {
            result_idsp = sine_idsp(index);
            // Prevent optimization
            core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
        }
        let end_idsp = dwt.cyccnt.read();

        let start_libm = dwt.cyccnt.read();
        let mut result_libm = 0.0;
        for _ in 0..iterations {
            result_libm = sine_libm(index);
            // Prevent optimization
            core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
        }
        let end_libm = dwt.cyccnt.read();

        (
            result_table,
            result_idsp,
            result_libm,
            end_table.wrapping_sub(start_table),
            end_idsp.wrapping_sub(start_idsp),
            end_libm.wrapping_sub(start_libm),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_endpoints() {
        let table = SineTable::new();
        // sin(0) = 0
        assert!(table.lookup(0).abs() < 1e-6);
        // Quarter cycle: sin(π/2) = 1
        assert!((table.lookup(SINE_TABLE_SIZE / 4) - 1.0).abs() < 1e-5);
        // Half cycle: sin(π) = 0
        assert!(table.lookup(SINE_TABLE_SIZE / 2).abs() < 1e-5);
        // Three quarters: sin(3π/2) = -1
        assert!((table.lookup(3 * SINE_TABLE_SIZE / 4) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_table_range() {
        let table = SineTable::new();
        for i in 0..table.len() {
            let v = table.lookup(i);
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
