//! ベンチマークモジュール
//!
//! 変調基準値生成のパフォーマンス測定を提供します。

use crate::fmt::*;
use crate::modulation;

/// DWTサイクルカウンタを有効化
///
/// # Safety
/// Cortex-Mペリフェラルへの直接アクセスを含む
pub unsafe fn enable_cycle_counter() {
    let mut cp = cortex_m::Peripherals::steal();
    cp.DCB.enable_trace();
    cp.DWT.enable_cycle_counter();
}

/// 正弦波基準値生成のベンチマークを実行して結果を表示
///
/// テーブル参照 / idsp::cossin() / libm::sinf() の3方式を比較します。
///
/// # 引数
/// * `iterations` - ベンチマーク実行回数
pub fn run_sine_reference_benchmark(iterations: u32) {
    info!("Running sine reference benchmark...");

    let (result_table, result_idsp, result_libm, ticks_table, ticks_idsp, ticks_libm) =
        modulation::sine_table::benchmark_sine_reference(iterations);

    // サイクル/呼び出し を計算（整数に変換してdefmtで表示）
    let cycles_per_call_table = ticks_table / iterations;
    let cycles_per_call_idsp = ticks_idsp / iterations;
    let cycles_per_call_libm = ticks_libm / iterations;

    info!("Benchmark results ({} iterations):", iterations);
    info!(
        "  table lookup:    {} cycles total, {} cycles/call",
        ticks_table, cycles_per_call_table
    );
    info!(
        "  idsp::cossin():  {} cycles total, {} cycles/call",
        ticks_idsp, cycles_per_call_idsp
    );
    info!(
        "  libm::sinf():    {} cycles total, {} cycles/call",
        ticks_libm, cycles_per_call_libm
    );
    info!(
        "  Result table: {}, idsp: {}, libm: {}",
        result_table, result_idsp, result_libm
    );
    info!(
        "  Error vs libm: table={}, idsp={}",
        result_table - result_libm,
        result_idsp - result_libm
    );
}
