use bookrec_checkpoint::{CheckpointFormat, CheckpointLocation, ModelState};
use tempfile::tempdir;

#[test]
fn test_each_fold_keeps_its_own_best_state() {
    let dir = tempdir().unwrap();
    let location = CheckpointLocation::new(dir.path(), "WDN", 1, 4);
    for format in [CheckpointFormat::Json, CheckpointFormat::Binary] {
        let checkpointer = format.checkpointer();
        for fold in 0..3 {
            let mut state = ModelState::new("WDN", fold);
            state.score = fold as f64;
            checkpointer.save(&location.file(fold, format), &state).unwrap();
        }
        for fold in 0..3 {
            let restored = checkpointer.restore(&location.file(fold, format)).unwrap();
            assert_eq!(restored.fold, fold);
            assert_eq!(restored.score, fold as f64);
        }
    }
    assert!(dir.path().join("WDN/u01_b04/fold2/checkpoint.bin").exists());
}
