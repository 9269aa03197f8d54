//! グローバル共有状態管理
//!
//! タスク間で共有される状態をMutexで保護して管理します。
//! コマンド系は下位優先度コンテキストが書き込み、制御タスクが毎周期
//! 読み出して適用します。ステータスは制御タスクのみが書き込みます。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;

use crate::config::{DEFAULT_MODULATION_INDEX, DEFAULT_OUTPUT_FREQUENCY_HZ};
use crate::config::pr::{DEFAULT_KP, DEFAULT_KR};

/// インバータステータス（ステータスタスク表示用スナップショット）
#[derive(Debug, Clone, Copy)]
pub struct InverterStatus {
    /// 累計制御周期数
    pub update_count: u32,
    /// フォルトでスキップした周期数
    pub fault_count: u32,
    /// 現在の変調率
    pub modulation_index: f32,
    /// 出力周波数 [Hz]
    pub frequency_hz: f32,
    /// フォルトフラグ（生ビット値）
    pub fault_bits: u32,
    /// ソフトスタート完了フラグ
    pub soft_start_complete: bool,
    /// 出力電流 [A]
    pub output_current: f32,
    /// 出力電圧 [V]
    pub output_voltage: f32,
    /// DCバス1電圧 [V]
    pub dc_bus1_voltage: f32,
    /// DCバス2電圧 [V]
    pub dc_bus2_voltage: f32,
}

impl InverterStatus {
    pub const fn new() -> Self {
        Self {
            update_count: 0,
            fault_count: 0,
            modulation_index: 0.0,
            frequency_hz: 0.0,
            fault_bits: 0,
            soft_start_complete: false,
            output_current: 0.0,
            output_voltage: 0.0,
            dc_bus1_voltage: 0.0,
            dc_bus2_voltage: 0.0,
        }
    }
}

/// 目標変調率（0.0～1.0）
pub static TARGET_MODULATION_INDEX: Mutex<ThreadModeRawMutex, f32> =
    Mutex::new(DEFAULT_MODULATION_INDEX);

/// 目標出力周波数 [Hz]
pub static TARGET_FREQUENCY: Mutex<ThreadModeRawMutex, f32> =
    Mutex::new(DEFAULT_OUTPUT_FREQUENCY_HZ);

/// インバータ運転有効/無効フラグ
pub static INVERTER_ENABLE: Mutex<ThreadModeRawMutex, bool> = Mutex::new(true);

/// PRコントローラのゲイン (Kp, Kr)
pub static PR_GAINS: Mutex<ThreadModeRawMutex, (f32, f32)> = Mutex::new((DEFAULT_KP, DEFAULT_KR));

/// 非常停止リクエスト（制御タスクが次周期で取り込みクリア）
pub static ESTOP_REQUEST: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// フォルトクリアリクエスト（制御タスクが次周期で取り込みクリア）
pub static CLEAR_FAULTS_REQUEST: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// インバータステータス（ステータスタスク表示用）
pub static INVERTER_STATUS: Mutex<ThreadModeRawMutex, InverterStatus> =
    Mutex::new(InverterStatus::new());
