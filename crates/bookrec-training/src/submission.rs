//! Submission CSV output.

use crate::error::{Result, TrainingError};
use bookrec_data::{DataError, RatingRow, Table};
use std::path::{Path, PathBuf};
use tracing::info;

/// `YYYYMMDD_HHMM` in local time, the prefix of submission file names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M").to_string()
}

/// Rounds half away from zero: 2.5 becomes 3, 9.5 becomes 10.
pub fn round_rating(value: f32) -> f32 {
    value.round()
}

/// Writes the submission template with its `rating` column replaced.
///
/// `rows` are the test pairs in prediction order; every template row must
/// name the same `user_id` and `isbn` at the same position. Writes
/// `{stamp}_{model}.csv` and, when `round` is set, also
/// `{stamp}_{model}_r.csv`. Returns the written paths.
pub fn write_submission(
    template: &Table,
    rows: &[RatingRow],
    predictions: &[f32],
    dir: &Path,
    model: &str,
    stamp: &str,
    round: bool,
) -> Result<Vec<PathBuf>> {
    if predictions.len() != rows.len() {
        return Err(DataError::LengthMismatch {
            expected: rows.len(),
            actual: predictions.len(),
        }
        .into());
    }
    check_alignment(template, rows)?;
    std::fs::create_dir_all(dir).map_err(|source| TrainingError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    let path = dir.join(format!("{stamp}_{model}.csv"));
    write_table(template, &path, |i| predictions[i].to_string())?;
    written.push(path);
    if round {
        let path = dir.join(format!("{stamp}_{model}_r.csv"));
        write_table(template, &path, |i| format!("{}", round_rating(predictions[i]) as i64))?;
        written.push(path);
    }
    for path in &written {
        info!(path = %path.display(), rows = template.len(), "Wrote submission");
    }
    Ok(written)
}

fn check_alignment(template: &Table, rows: &[RatingRow]) -> Result<()> {
    if template.len() != rows.len() {
        return Err(DataError::LengthMismatch {
            expected: rows.len(),
            actual: template.len(),
        }
        .into());
    }
    let user_col = template.column("user_id")?;
    let isbn_col = template.column("isbn")?;
    for (row, pair) in rows.iter().enumerate() {
        let (user, isbn) = (template.value(row, user_col), template.value(row, isbn_col));
        if user != pair.user_id || isbn != pair.isbn {
            return Err(TrainingError::Misaligned {
                row,
                expected: format!("{}/{}", pair.user_id, pair.isbn),
                found: format!("{user}/{isbn}"),
            });
        }
    }
    Ok(())
}

fn write_table(template: &Table, path: &Path, rating: impl Fn(usize) -> String) -> Result<()> {
    let csv_err = |source: csv::Error| TrainingError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let rating_col = template.column("rating")?;
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(template.headers()).map_err(csv_err)?;
    for row in 0..template.len() {
        let record: Vec<String> = (0..template.headers().len())
            .map(|col| {
                if col == rating_col {
                    rating(row)
                } else {
                    template.value(row, col).to_string()
                }
            })
            .collect();
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| TrainingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table(csv: &str) -> Table {
        Table::from_reader("sample_submission.csv", csv.as_bytes(), &["user_id", "isbn", "rating"])
            .unwrap()
    }

    fn template() -> Table {
        table("user_id,isbn,rating\n11,0001,0\n12,0002,0\n13,0003,0\n")
    }

    fn test_rows() -> Vec<RatingRow> {
        [("11", "0001"), ("12", "0002"), ("13", "0003")]
            .into_iter()
            .map(|(user, isbn)| RatingRow {
                user_id: user.to_string(),
                isbn: isbn.to_string(),
                rating: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let rounded: Vec<f32> = [2.4, 2.6, 9.5].into_iter().map(round_rating).collect();
        assert_eq!(rounded, vec![2.0, 3.0, 10.0]);
    }

    #[test]
    fn test_writes_raw_and_rounded_files() {
        let dir = tempdir().unwrap();
        let files = write_submission(
            &template(),
            &test_rows(),
            &[2.4, 2.6, 9.5],
            dir.path(),
            "FM",
            "20260101_0930",
            true,
        )
        .unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("20260101_0930_FM.csv"),
                dir.path().join("20260101_0930_FM_r.csv"),
            ]
        );
        let raw = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(raw, "user_id,isbn,rating\n11,0001,2.4\n12,0002,2.6\n13,0003,9.5\n");
        let rounded = std::fs::read_to_string(&files[1]).unwrap();
        assert_eq!(rounded, "user_id,isbn,rating\n11,0001,2\n12,0002,3\n13,0003,10\n");
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let dir = tempdir().unwrap();
        let err = write_submission(&template(), &test_rows(), &[1.0], dir.path(), "FM", "x", false)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainingError::Data(DataError::LengthMismatch { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_rejects_reordered_template() {
        let dir = tempdir().unwrap();
        let swapped = table("user_id,isbn,rating\n11,0001,0\n13,0003,0\n12,0002,0\n");
        let predictions = [1.0, 2.0, 3.0];
        let rows = test_rows();
        let err = write_submission(&swapped, &rows, &predictions, dir.path(), "FM", "x", false)
            .unwrap_err();
        match err {
            TrainingError::Misaligned { row, expected, found } => {
                assert_eq!(row, 1);
                assert_eq!(expected, "12/0002");
                assert_eq!(found, "13/0003");
            }
            other => panic!("expected misalignment, got {other}"),
        }
        assert!(!dir.path().join("x_FM.csv").exists());

        let short = table("user_id,isbn,rating\n11,0001,0\n12,0002,0\n");
        assert!(matches!(
            write_submission(&short, &rows, &predictions, dir.path(), "FM", "x", false),
            Err(TrainingError::Data(DataError::LengthMismatch { expected: 3, actual: 2 }))
        ));
    }

    #[test]
    fn test_timestamp_shape() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), 13);
        assert_eq!(&stamp[8..9], "_");
    }
}
