//! Smoke test: verify all crates compile and basic types are accessible.

use candle_core::Device;

#[test]
fn core_types_accessible() {
    let _hp = signal_core::Hparams::default();
    let _flag = signal_core::ModeFlag::default();
    let _err = signal_core::SignalError::config("test");
    let _cfg = signal_soft::training::GameConfig::default();
    let _data = signal_learn::DatasetConfig::default();
}

#[test]
fn defaults_match_reference_run() {
    // msg_len 5, three symbols (stop included), seed 42
    let hp = signal_core::Hparams::default();
    assert_eq!(hp.msg_len, 5);
    assert_eq!(hp.n_symbols, 3);
    assert_eq!(hp.seed, 42);
    assert_eq!(signal_core::STOP_SYMBOL, 0);
    assert!(hp.ignore_index.is_none());
}

#[test]
fn packer_reports_stop_lengths() {
    let rows = vec![
        vec![2, 1, 0, 1, 2],
        vec![1, 1, 2, 1, 1],
        vec![2, 2, 2, 2, 2],
        vec![1, 2, 1, 2, 1],
    ];
    let msg = signal_soft::Message::from_symbols(&rows, 3, &Device::Cpu).unwrap();
    let packed = signal_soft::pack(&msg, 5).unwrap();
    assert_eq!(packed.lengths(), &[3, 5, 5, 5]);
}

#[test]
fn loss_composition_weighted() {
    let total = signal_soft::losses::compose_scalar(2.0, Some((1.0, 0.5)));
    assert!((total - 2.5).abs() < 1e-6);
}
