//! Delimited input tables and the on-disk layout of a dataset version.

use crate::error::{DataError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

pub const USER_COLUMNS: [&str; 5] = [
    "user_id",
    "location_city",
    "location_state",
    "location_country",
    "age",
];

pub const BOOK_COLUMNS: [&str; 5] = [
    "isbn",
    "category",
    "publisher",
    "year_of_publication",
    "book_author",
];

pub const RATING_COLUMNS: [&str; 3] = ["user_id", "isbn", "rating"];

/// A headed CSV file held in memory as string cells.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    columns: HashMap<String, usize>,
    records: Vec<csv::StringRecord>,
}

impl Table {
    /// Reads `path`, failing with [`DataError::MissingColumn`] when any of
    /// `required` is absent from the header.
    pub fn read(path: &Path, required: &[&str]) -> Result<Self> {
        let file = File::open(path).map_err(|e| DataError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table = Self::from_reader(path.display().to_string(), BufReader::new(file), required)?;
        info!(path = %path.display(), rows = table.len(), "Loaded table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R, required: &[&str]) -> Result<Self> {
        let name = name.into();
        let csv_err = |source: csv::Error| DataError::Csv {
            file: name.clone(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers().map_err(csv_err)?.iter().map(str::to_string).collect();
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        for column in required {
            if !columns.contains_key(*column) {
                return Err(DataError::MissingColumn {
                    file: name.clone(),
                    column: column.to_string(),
                });
            }
        }
        let records = rdr
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        Ok(Self {
            name,
            headers,
            columns,
            records,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of `column` in the header.
    pub fn column(&self, column: &str) -> Result<usize> {
        self.columns
            .get(column)
            .copied()
            .ok_or_else(|| DataError::MissingColumn {
                file: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Cell at (`row`, `col`); short records read as empty.
    pub fn value(&self, row: usize, col: usize) -> &str {
        self.records[row].get(col).unwrap_or("")
    }

    /// Maps each distinct value of `column` to the first row holding it.
    pub fn key_rows(&self, column: &str) -> Result<HashMap<String, usize>> {
        let col = self.column(column)?;
        let mut keys = HashMap::with_capacity(self.len());
        for row in 0..self.len() {
            keys.entry(self.value(row, col).to_string()).or_insert(row);
        }
        Ok(keys)
    }
}

/// One line of a ratings file.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub user_id: String,
    pub isbn: String,
    pub rating: f32,
}

/// Parses a `user_id, isbn, rating` table.
pub fn rating_rows(table: &Table) -> Result<Vec<RatingRow>> {
    let user = table.column("user_id")?;
    let isbn = table.column("isbn")?;
    let rating = table.column("rating")?;
    (0..table.len())
        .map(|row| {
            let raw = table.value(row, rating);
            let value = raw.parse::<f32>().map_err(|_| DataError::Parse {
                file: table.name().to_string(),
                column: "rating".to_string(),
                value: raw.to_string(),
            })?;
            Ok(RatingRow {
                user_id: table.value(row, user).to_string(),
                isbn: table.value(row, isbn).to_string(),
                rating: value,
            })
        })
        .collect()
}

/// File layout under the data root for one (user, book) dataset version pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub user_version: u32,
    pub book_version: u32,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>, user_version: u32, book_version: u32) -> Self {
        Self {
            root: root.into(),
            user_version,
            book_version,
        }
    }

    pub fn users(&self) -> PathBuf {
        self.root
            .join("users")
            .join(format!("u{:02}.csv", self.user_version))
    }

    pub fn books(&self) -> PathBuf {
        self.root
            .join("books")
            .join(format!("b{:02}.csv", self.book_version))
    }

    pub fn train_ratings(&self) -> PathBuf {
        self.root.join("ratings").join("train_ratings.csv")
    }

    pub fn test_ratings(&self) -> PathBuf {
        self.root.join("ratings").join("test_ratings.csv")
    }

    pub fn submission(&self) -> PathBuf {
        self.root.join("ratings").join("sample_submission.csv")
    }

    pub fn image_vectors(&self) -> PathBuf {
        self.root.join("books").join("image_vectors.csv")
    }

    pub fn user_text_vectors(&self) -> PathBuf {
        self.root.join("users").join("text_vectors.csv")
    }

    pub fn book_text_vectors(&self) -> PathBuf {
        self.root.join("books").join("text_vectors.csv")
    }
}

/// Every input table of a run, validated against its expected columns.
#[derive(Debug, Clone)]
pub struct RawData {
    pub users: Table,
    pub books: Table,
    pub train: Vec<RatingRow>,
    pub test: Vec<RatingRow>,
    pub submission: Table,
}

impl RawData {
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let users = Table::read(&paths.users(), &USER_COLUMNS)?;
        let books = Table::read(&paths.books(), &BOOK_COLUMNS)?;
        let train = rating_rows(&Table::read(&paths.train_ratings(), &RATING_COLUMNS)?)?;
        let test = rating_rows(&Table::read(&paths.test_ratings(), &RATING_COLUMNS)?)?;
        let submission = Table::read(&paths.submission(), &RATING_COLUMNS)?;
        Ok(Self {
            users,
            books,
            train,
            test,
            submission,
        })
    }

    pub fn submission_rows(&self) -> Result<Vec<RatingRow>> {
        rating_rows(&self.submission)
    }
}
