use std::fs;
use std::path::Path;
use std::time::Instant;

use bcn_core::BcnError;
use bcn_trainer::{run, EvalArgs, Outcome};
use clap::Parser;

fn write_sst_fine(datadir: &Path) {
    let dir = datadir.join("SST").join("fine");
    fs::create_dir_all(&dir).unwrap();

    let train: String = (0..40)
        .map(|i| match i % 5 {
            0 => "0 a truly awful , dreadful mess\n",
            1 => "1 dull and tedious\n",
            2 => "2 it is a film\n",
            3 => "3 quite a fun ride\n",
            _ => "4 a brilliant , moving masterpiece\n",
        })
        .collect();
    fs::write(dir.join("sentiment-train"), train).unwrap();
    fs::write(dir.join("sentiment-dev"), "4 brilliant masterpiece\n0 awful mess\n").unwrap();
    fs::write(dir.join("sentiment-test"), "3 fun ride\n1 tedious\n2 a film\n").unwrap();
}

fn args(datadir: &Path, outputdir: &Path, extra: &[&str]) -> EvalArgs {
    let mut argv = vec![
        "eval".to_string(),
        "--datadir".to_string(),
        datadir.display().to_string(),
        "--outputdir".to_string(),
        outputdir.display().to_string(),
        "--n_epochs".to_string(),
        "2".to_string(),
        "--batch_size".to_string(),
        "8".to_string(),
        "--bilstm_encoder_n_hidden".to_string(),
        "4".to_string(),
        "--bilstm_integrate_n_hidden".to_string(),
        "4".to_string(),
        "--embedding_dim".to_string(),
        "8".to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    EvalArgs::try_parse_from(argv).unwrap()
}

#[test]
fn pipeline_dry_run_writes_info_and_accuracy() {
    let root = tempfile::tempdir().unwrap();
    let datadir = root.path().join("datasets");
    let outputdir = root.path().join("result").join("nested");
    write_sst_fine(&datadir);

    let outcome = run(&args(&datadir, &outputdir, &["--mode", "2"]), Instant::now()).unwrap();
    let Outcome::Completed {
        dev_accuracy,
        test_accuracy,
    } = outcome
    else {
        panic!("expected a completed run, got {outcome:?}");
    };
    assert!((0.0..=1.0).contains(&dev_accuracy));
    assert!((0.0..=1.0).contains(&test_accuracy));

    let info = fs::read_to_string(outputdir.join("info.txt")).unwrap();
    let mut lines = info.lines();
    assert_eq!(lines.next(), Some("SSTFine"));
    let dict = lines.next().unwrap();
    assert!(dict.starts_with("{'n_epochs': 2, 'batch_size': 8, 'same_bilstm_for_encoder': False"));
    assert!(dict.ends_with("'adam_epsilon': 1e-08}"));

    let accuracy = fs::read_to_string(outputdir.join("accuracy.txt")).unwrap();
    assert!(accuracy.starts_with("{'dev': "));
    assert!(accuracy.contains(", 'test': "));
    assert!(outputdir.join("bcn.safetensors").exists());
}

#[test]
fn model_dry_run_leaves_output_dir_alone() {
    let root = tempfile::tempdir().unwrap();
    let outputdir = root.path().join("result");

    let outcome = run(
        &args(root.path(), &outputdir, &["--mode", "1", "--same_bilstm_for_encoder", "true"]),
        Instant::now(),
    )
    .unwrap();
    assert_eq!(outcome, Outcome::DryRun);
    assert!(!outputdir.exists());
}

#[test]
fn unknown_task_fails_after_writing_info() {
    let root = tempfile::tempdir().unwrap();
    let outputdir = root.path().join("result");

    let err = run(
        &args(root.path(), &outputdir, &["--transfer_task", "MRPC"]),
        Instant::now(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BcnError>(),
        Some(BcnError::UnknownTask(task)) if task == "MRPC"
    ));

    let info = fs::read_to_string(outputdir.join("info.txt")).unwrap();
    assert!(info.starts_with("MRPC\n"));
    assert!(!outputdir.join("accuracy.txt").exists());
}

#[test]
fn invalid_hyperparameters_fail_before_output_dir() {
    let root = tempfile::tempdir().unwrap();
    let datadir = root.path().join("datasets");
    write_sst_fine(&datadir);

    for extra in [["--dropout_ratio", "1.5"], ["--optimizer", "rmsprop"]] {
        let outputdir = root.path().join(extra[0].trim_start_matches('-'));
        let mut flags = vec!["--mode", "2"];
        flags.extend(extra);
        assert!(run(&args(&datadir, &outputdir, &flags), Instant::now()).is_err());
        assert!(!outputdir.exists(), "{} created for {extra:?}", outputdir.display());
    }
}

#[test]
fn runner_flags_do_not_block_a_dry_run() {
    let root = tempfile::tempdir().unwrap();
    let outputdir = root.path().join("result");
    let (args, ignored) = EvalArgs::try_parse_known_from([
        "eval",
        "--data_url",
        "s3://bucket/data",
        "--mode",
        "1",
        "--embedding_dim",
        "8",
        "--bilstm_encoder_n_hidden",
        "4",
        "--bilstm_integrate_n_hidden",
        "4",
        "--outputdir",
        outputdir.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(ignored, ["--data_url", "s3://bucket/data"]);
    assert_eq!(run(&args, Instant::now()).unwrap(), Outcome::DryRun);
}

#[test]
fn missing_dataset_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let outputdir = root.path().join("result");

    let err = run(
        &args(&root.path().join("nowhere"), &outputdir, &["--mode", "2"]),
        Instant::now(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("failed to load SSTFine"));
}
