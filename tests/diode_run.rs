use std::path::Path;

use diode3d::io::json::read_json;
use diode3d::sim::actions::DiodeActions;
use diode3d::sim::analysis::SummaryScope;
use diode3d::sim::config::DetectorLayout;
use diode3d::sim::efficiency;
use diode3d::sim::framework::SimulationCallbacks;
use diode3d::sim::primary::ParticleKind;
use diode3d::sim::transport::ScriptedTransport;
use diode3d::{DetectorError, Point, RunConfig, RunManager, RunOutcome};

fn config_in(dir: &Path, output: &str) -> RunConfig {
    let mut config = RunConfig::default();
    config.analysis.output = dir.join(output).display().to_string();
    config.run.print_progress = 0;
    config
}

fn actions() -> Box<dyn SimulationCallbacks> {
    Box::new(DiodeActions::new())
}

/// One step of 1 MeV over 0.3 mm inside the diode, every event.
fn scripted() -> Box<ScriptedTransport> {
    Box::new(ScriptedTransport::default().with_step(Point::new(0., 0., -0.8), 1.0, 0.3))
}

fn run_scripted(config: RunConfig, events: usize) -> RunOutcome {
    RunManager::new(config, actions)
        .with_engine(scripted())
        .beam_on(events)
        .unwrap()
}

#[test]
fn test_fixed_deposit_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_scripted(config_in(dir.path(), "B4.csv"), 20);
    assert_eq!(outcome.events, 20);

    let summary = outcome.summary.unwrap();
    assert_eq!(summary.scope, SummaryScope::Master);
    let e = summary.line("Ediode").unwrap();
    assert_eq!(e.entries, 20);
    assert!((e.mean - 1.0).abs() < 1e-9);
    assert!(e.rms.abs() < 1e-6);
    let l = summary.line("Ldiode").unwrap();
    assert!((l.mean - 0.3).abs() < 1e-9);
    assert!(summary.to_string().contains("for the entire run"));

    // Five histograms and one n-tuple
    assert_eq!(outcome.files.len(), 6);
    for name in ["B4_h1_Ediode.csv", "B4_h1_diodeZ.csv", "B4_nt_B4.csv"] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
}

#[test]
fn test_efficiency_from_written_ntuple() {
    let dir = tempfile::tempdir().unwrap();
    run_scripted(config_in(dir.path(), "B4.csv"), 8);

    let eff = efficiency::from_ntuple_csv(&dir.path().join("B4_nt_B4.csv"), "Ediode").unwrap();
    assert_eq!((eff.detected, eff.total), (8, 8));
    assert!((eff.efficiency - 100.0).abs() < 1e-12);

    let dat = dir.path().join("e_efficiency_data.dat");
    efficiency::append_record(&dat, "1 MeV", &eff).unwrap();
    let text = std::fs::read_to_string(&dat).unwrap();
    assert!(text.starts_with("1 MeV\t100\t"));
}

#[test]
fn test_threads_merge_into_one_ntuple() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.json");
    config.run.threads = 3;
    let outcome = run_scripted(config, 10);
    assert_eq!(outcome.events, 10);
    assert_eq!(outcome.worker_summaries.len(), 3);
    assert!(
        outcome
            .worker_summaries
            .iter()
            .all(|s| matches!(s.scope, SummaryScope::Worker(_)))
    );

    assert_eq!(outcome.files.len(), 1);
    let file = read_json(&outcome.files[0]).unwrap();
    assert_eq!(file.histograms.len(), 5);
    assert_eq!(file.histograms[0].entries(), 10);
    assert_eq!(file.ntuple.unwrap().rows().len(), 10);
}

#[test]
fn test_threads_without_merging_write_per_worker_ntuples() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.csv");
    config.run.threads = 2;
    config.analysis.ntuple_merging = false;
    let outcome = run_scripted(config, 6);

    for t in 0..2 {
        let path = dir.path().join(format!("B4_nt_B4_t{t}.csv"));
        let eff = efficiency::from_ntuple_csv(&path, "Ediode").unwrap();
        assert_eq!(eff.total, 3);
    }
    assert!(!dir.path().join("B4_nt_B4.csv").exists());
    // Histograms are still merged on the master
    assert_eq!(outcome.summary.unwrap().line("Ediode").unwrap().entries, 6);
}

#[test]
fn test_straight_line_deposit_in_diode() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.csv");
    config.gun.particle = ParticleKind::Electron;
    config.gun.energy = 10.0;
    let outcome = RunManager::new(config, actions).beam_on(5).unwrap();

    let summary = outcome.summary.unwrap();
    let e = summary.line("Ediode").unwrap();
    assert_eq!(e.entries, 5);
    assert!((e.mean - 0.3876 * 0.3).abs() < 1e-6);
    let l = summary.line("Ldiode").unwrap();
    assert!((l.mean - 0.3).abs() < 1e-6);
}

#[test]
fn test_neutral_beam_fills_zero_deposit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.csv");
    config.gun.particle = ParticleKind::Gamma;
    let outcome = RunManager::new(config, actions).beam_on(3).unwrap();
    // Zero deposits still fill the histograms at 0
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.line("Ediode").unwrap().entries, 3);
    assert_eq!(summary.line("Ediode").unwrap().mean, 0.0);
}

#[test]
fn test_annular_layout_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.csv");
    config.geometry.layout = DetectorLayout::Annular;
    let engine = ScriptedTransport::default()
        .with_step(Point::new(0., 0., -0.8), 1.0, 0.3)
        .with_step(Point::new(8., 0., 10.), 0.25, 0.3);
    let outcome = RunManager::new(config, actions)
        .with_engine(Box::new(engine))
        .beam_on(4)
        .unwrap();
    let summary = outcome.summary.unwrap();
    assert!((summary.line("Eannular").unwrap().mean - 0.25).abs() < 1e-9);
    assert!(dir.path().join("B4_h1_annularX.csv").exists());
}

#[test]
fn test_quad_layout_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.csv");
    config.geometry.layout = DetectorLayout::QuadArray;
    config.geometry.quad_reflect = true;
    // Beam through the aperture misses every module
    let outcome = RunManager::new(config, actions).beam_on(2).unwrap();
    assert_eq!(outcome.summary.unwrap().line("Ediode").unwrap().mean, 0.0);
}

#[test]
fn test_unsupported_format_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    for output in ["B4.root", "B4.hdf5"] {
        let err = RunManager::new(config_in(dir.path(), output), actions)
            .with_engine(scripted())
            .beam_on(1)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DetectorError>(),
            Some(DetectorError::UnsupportedFormat(_))
        ));
    }
}

#[test]
fn test_missing_extension_defaults_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    run_scripted(config_in(dir.path(), "B4"), 1);
    assert!(dir.path().join("B4_nt_B4.csv").exists());
}

#[test]
fn test_overlapping_geometry_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "B4.csv");
    config.geometry.layout = DetectorLayout::Annular;
    config.geometry.annular.distance = 0.5;
    let err = RunManager::new(config, actions).beam_on(1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DetectorError>(),
        Some(DetectorError::Overlap { .. })
    ));
}
