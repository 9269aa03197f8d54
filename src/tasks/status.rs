//! ステータス報告タスク
//!
//! 1秒ごとに運転状況をログ出力します。制御タスクが書き込む
//! スナップショットのみを読み、コア状態には触れません。

use embassy_time::{Duration, Ticker};

use crate::fmt::*;
use crate::state::{INVERTER_STATUS, TARGET_MODULATION_INDEX};

/// ステータス報告タスク（1Hz）
#[embassy_executor::task]
pub async fn status_task() {
    info!("Status task started");

    let mut ticker = Ticker::every(Duration::from_millis(1000));

    loop {
        ticker.next().await;

        let status = *INVERTER_STATUS.lock().await;

        info!(
            "Updates: {}, Faults: {}, MI: {}, Freq: {}Hz",
            status.update_count, status.fault_count, status.modulation_index, status.frequency_hz
        );
        info!(
            "I={}A, V={}V, DC1={}V, DC2={}V",
            status.output_current,
            status.output_voltage,
            status.dc_bus1_voltage,
            status.dc_bus2_voltage
        );

        if status.fault_bits != 0 {
            error!("FAULT flags: {}", status.fault_bits);
        }

        // ソフトスタート進行率
        if !status.soft_start_complete {
            let target = *TARGET_MODULATION_INDEX.lock().await;
            if target > 0.0 {
                let percent = status.modulation_index / target * 100.0;
                info!("Soft-start: {}%", percent);
            }
        }
    }
}
