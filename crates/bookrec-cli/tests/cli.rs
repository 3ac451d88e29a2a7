use bookrec_checkpoint::CheckpointFormat;
use bookrec_cli::{Cli, Commands};
use bookrec_training::{ModelKind, RunConfig, ValidationKind};
use clap::Parser;
use std::fs;
use tempfile::tempdir;

fn train_config(args: &[&str]) -> RunConfig {
    let cli = Cli::try_parse_from(args).unwrap();
    match cli.command {
        Commands::Train(cmd) => cmd.resolve().unwrap(),
        other => panic!("expected train, got {other:?}"),
    }
}

#[test]
fn test_no_flags_gives_defaults() {
    assert_eq!(train_config(&["bookrec", "train"]), RunConfig::default());
}

#[test]
fn test_flags_override_defaults() {
    let config = train_config(&[
        "bookrec",
        "train",
        "--model",
        "dcn",
        "--valid",
        "random",
        "--epochs",
        "7",
        "--round",
        "--classifier",
        "--ranges",
        "1-5,6-10",
        "--class-weights",
        "0.5,0.5",
        "--dcn-mlp-dims",
        "32,8",
        "--step-size",
        "2",
        "--gamma",
        "0.5",
        "--checkpoint-format",
        "binary",
    ]);
    assert_eq!(config.model, ModelKind::Dcn);
    assert_eq!(config.valid, ValidationKind::Random);
    assert_eq!(config.epochs, 7);
    assert!(config.round);
    assert!(config.classifier);
    assert_eq!(config.ranges.to_string(), "1-5,6-10");
    assert_eq!(config.class_weights, vec![0.5, 0.5]);
    assert_eq!(config.params.dcn_mlp_dims, vec![32, 8]);
    assert_eq!(config.scheduler.map(|s| s.step_size), Some(2));
    assert_eq!(config.checkpoint_format, CheckpointFormat::Binary);
    assert!(config.validate().is_ok());
}

#[test]
fn test_flags_override_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.json");
    fs::write(
        &path,
        r#"{"model": "NCF", "batch_size": 128, "lr": 0.01, "params": {"ncf_embed_dim": 8}}"#,
    )
    .unwrap();
    let config = train_config(&[
        "bookrec",
        "train",
        "--config",
        path.to_str().unwrap(),
        "--lr",
        "0.5",
        "--round=false",
    ]);
    assert_eq!(config.model, ModelKind::Ncf);
    assert_eq!(config.batch_size, 128);
    assert_eq!(config.params.ncf_embed_dim, 8);
    assert_eq!(config.lr, 0.5);
    assert!(!config.round);
    // untouched fields keep their defaults
    assert_eq!(config.n_splits, 5);
}

#[test]
fn test_unknown_model_is_a_parse_error() {
    assert!(Cli::try_parse_from(["bookrec", "train", "--model", "SVD"]).is_err());
    assert!(Cli::try_parse_from(["bookrec", "train", "--step-size", "2"]).is_err());
}

#[test]
fn test_inspect_reports_schema() {
    let dir = tempdir().unwrap();
    let write = |rel: &str, body: &str| {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    };
    write(
        "users/u01.csv",
        "user_id,location_city,location_state,location_country,age\nu1,seoul,-1,-1,-1\nu2,busan,-1,-1,-1\n",
    );
    write(
        "books/b01.csv",
        "isbn,category,publisher,year_of_publication,book_author\nb1,-1,-1,-1,-1\nb2,-1,-1,-1,-1\n",
    );
    let mut train = String::from("user_id,isbn,rating\n");
    for i in 0..12 {
        train.push_str(&format!("u{},b{},{}\n", i % 2 + 1, i % 2 + 1, i % 10 + 1));
    }
    write("ratings/train_ratings.csv", &train);
    write("ratings/test_ratings.csv", "user_id,isbn,rating\nu1,b2,0\n");
    write("ratings/sample_submission.csv", "user_id,isbn,rating\nu1,b2,0\n");

    let cli = Cli::try_parse_from([
        "bookrec",
        "inspect",
        "--data-path",
        dir.path().to_str().unwrap(),
        "--n-splits",
        "3",
    ])
    .unwrap();
    let Commands::Inspect(cmd) = cli.command else {
        panic!("expected inspect");
    };
    let report = cmd.report().unwrap();
    assert_eq!(report.columns, vec!["user_id", "isbn", "location_city"]);
    assert_eq!(report.field_dims, vec![2, 2, 2]);
    assert_eq!(report.train_rows, 12);
    assert_eq!(report.test_rows, 1);
    assert_eq!(report.folds.len(), 3);
    for (train, valid) in &report.folds {
        assert_eq!(train + valid, 12);
    }
}
