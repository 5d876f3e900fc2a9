//! End-to-end runs through the public API.

use std::fs;

use fm_core::GenerationRequest;
use fm_generator::{ControllerConfig, GenerationController, Strategy};
use fm_solver::{ConsistencyChecker, DpllSolver};

fn config(seed: u64) -> ControllerConfig {
    ControllerConfig {
        seed,
        ..ControllerConfig::quick()
    }
}

#[test]
fn test_small_request_uses_direct_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new(6, 1, 0.8, 5, dir.path()).unwrap();
    assert_eq!(request.target_features_count(), 4);

    let controller = GenerationController::new(request, config(6));
    assert_eq!(controller.strategy(), Strategy::Direct);

    let accepted = controller.run().unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].strategy, Strategy::Direct);
    assert_eq!(accepted[0].constraints_count, 6);

    let path = dir.path().join("FM_6_0.splx");
    assert_eq!(accepted[0].path, path);
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next(), Some("<feature_model name=\"FM_6_0\">"));

    let parsed = fm_sxfm::parse_file(&path).unwrap();
    assert_eq!(parsed.features_count(), 4);
    assert_eq!(parsed.relationships().len() + parsed.constraints().len(), 6);
    assert_eq!(DpllSolver::default().is_consistent(&parsed), Ok(true));
}

#[test]
fn test_smallest_request_is_reachable() {
    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new(fm_core::CONSTRAINTS_MIN, 2, 0.8, 5, dir.path()).unwrap();
    assert_eq!(request.target_features_count(), 3);

    let accepted = GenerationController::new(request, config(4)).run().unwrap();
    assert_eq!(accepted.len(), 2);
    for model in &accepted {
        let parsed = fm_sxfm::parse_file(&model.path).unwrap();
        assert_eq!(parsed.statistics().total(), 4);
    }

    assert!(GenerationRequest::new(3, 1, 0.8, 5, dir.path()).is_err());
}

#[test]
fn test_large_request_uses_search_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new(40, 1, 0.8, 5, dir.path()).unwrap();
    assert_eq!(request.target_features_count(), 30);

    let controller = GenerationController::new(request, config(40));
    assert_eq!(controller.strategy(), Strategy::Search);

    let accepted = controller.run().unwrap();
    assert_eq!(accepted[0].strategy, Strategy::Search);

    let parsed = fm_sxfm::parse_file(&dir.path().join("FM_40_0.splx")).unwrap();
    assert_eq!(parsed.name(), "FM_40_0");
    assert_eq!(parsed.features_count(), 30);
    assert_eq!(parsed.statistics().total(), 40);
    assert_eq!(DpllSolver::default().is_consistent(&parsed), Ok(true));
}

#[test]
fn test_only_accepted_artifacts_remain() {
    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new(8, 3, 0.8, 5, dir.path()).unwrap();

    let accepted = GenerationController::new(request, config(3)).run().unwrap();
    assert_eq!(accepted.len(), 3);

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["FM_8_0.splx", "FM_8_1.splx", "FM_8_2.splx"]);

    for model in &accepted {
        let parsed = fm_sxfm::parse_file(&model.path).unwrap();
        assert_eq!(parsed.statistics().total(), 8);
        assert_eq!(parsed.name(), model.name);
    }
}

#[test]
fn test_same_seed_same_artifacts_for_any_jobs() {
    let sequential = tempfile::tempdir().unwrap();
    let parallel = tempfile::tempdir().unwrap();

    let run = |dir: &std::path::Path, jobs: usize| {
        let request = GenerationRequest::new(14, 4, 0.8, 5, dir).unwrap();
        let config = ControllerConfig { jobs, ..config(2024) };
        GenerationController::new(request, config).run().unwrap()
    };

    let a = run(sequential.path(), 1);
    let b = run(parallel.path(), 3);

    assert_eq!(a.len(), 4);
    for (left, right) in a.iter().zip(&b) {
        assert_eq!(left.name, right.name);
        assert_eq!(left.attempts, right.attempts);
        assert_eq!(
            fs::read(&left.path).unwrap(),
            fs::read(&right.path).unwrap()
        );
    }
}
