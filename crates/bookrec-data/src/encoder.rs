//! Feature encoder.
//!
//! Joins each rating with its user and book attributes, decides once from
//! the training frame which context columns are populated, and encodes
//! rows into fixed-width field vectors. Column 0 is always the user code
//! and column 1 the item code; the surviving context columns follow in
//! [`ContextColumn::ALL`] order.

use crate::bucket::{age_bucket, parse_integer, year_bucket, AGE_BUCKETS, YEAR_BUCKETS};
use crate::error::{DataError, Result};
use crate::index::IdIndex;
use crate::table::{RatingRow, RawData, Table};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Category given to attributes of users or books absent from their table.
pub const MISSING: &str = "missing";

/// Marks an attribute a dataset version does not populate.
pub const SENTINEL: &str = "-1";

/// Optional per-rating attributes, in field-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextColumn {
    LocationCity,
    LocationState,
    LocationCountry,
    Age,
    BookAuthor,
    YearOfPublication,
    Publisher,
    Category,
}

impl ContextColumn {
    pub const ALL: [ContextColumn; 8] = [
        ContextColumn::LocationCity,
        ContextColumn::LocationState,
        ContextColumn::LocationCountry,
        ContextColumn::Age,
        ContextColumn::BookAuthor,
        ContextColumn::YearOfPublication,
        ContextColumn::Publisher,
        ContextColumn::Category,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContextColumn::LocationCity => "location_city",
            ContextColumn::LocationState => "location_state",
            ContextColumn::LocationCountry => "location_country",
            ContextColumn::Age => "age",
            ContextColumn::BookAuthor => "book_author",
            ContextColumn::YearOfPublication => "year_of_publication",
            ContextColumn::Publisher => "publisher",
            ContextColumn::Category => "category",
        }
    }

    fn from_users(self) -> bool {
        matches!(
            self,
            ContextColumn::LocationCity
                | ContextColumn::LocationState
                | ContextColumn::LocationCountry
                | ContextColumn::Age
        )
    }

    /// Bucket count for numeric columns, `None` for indexed ones.
    pub fn buckets(self) -> Option<usize> {
        match self {
            ContextColumn::Age => Some(AGE_BUCKETS),
            ContextColumn::YearOfPublication => Some(YEAR_BUCKETS),
            _ => None,
        }
    }

    fn bucket(self, raw: &str) -> Result<u32> {
        let value = match parse_integer(raw) {
            Some(v) => v,
            None if is_missing(raw) => return Ok(0),
            None => {
                return Err(DataError::Parse {
                    file: "joined ratings".to_string(),
                    column: self.name().to_string(),
                    value: raw.to_string(),
                })
            }
        };
        Ok(match self {
            ContextColumn::Age => age_bucket(value),
            _ => year_bucket(value),
        })
    }
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw == MISSING || raw.eq_ignore_ascii_case("nan")
}

fn is_sentinel(raw: &str) -> bool {
    raw == SENTINEL || raw.parse::<f64>().map_or(false, |v| v == -1.0)
}

/// One rating joined with the attributes of its user and book.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub user_id: String,
    pub isbn: String,
    pub rating: f32,
    /// Raw attribute values, indexed like [`ContextColumn::ALL`].
    pub context: [String; 8],
}

impl JoinedRow {
    pub fn value(&self, column: ContextColumn) -> &str {
        &self.context[column as usize]
    }
}

/// Left-joins ratings with the user and book tables.
pub fn join(ratings: &[RatingRow], users: &Table, books: &Table) -> Result<Vec<JoinedRow>> {
    let user_rows = users.key_rows("user_id")?;
    let book_rows = books.key_rows("isbn")?;
    let mut cols = Vec::with_capacity(ContextColumn::ALL.len());
    for column in ContextColumn::ALL {
        let table = if column.from_users() { users } else { books };
        cols.push(table.column(column.name())?);
    }

    Ok(ratings
        .iter()
        .map(|r| {
            let user = user_rows.get(&r.user_id).copied();
            let book = book_rows.get(&r.isbn).copied();
            let context = std::array::from_fn(|i| {
                let column = ContextColumn::ALL[i];
                let (table, row) = if column.from_users() {
                    (users, user)
                } else {
                    (books, book)
                };
                match row {
                    Some(row) => table.value(row, cols[i]).to_string(),
                    None => MISSING.to_string(),
                }
            });
            JoinedRow {
                user_id: r.user_id.clone(),
                isbn: r.isbn.clone(),
                rating: r.rating,
                context,
            }
        })
        .collect())
}

/// Row-major matrix of field vectors, `num_fields` codes per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMatrix {
    num_fields: usize,
    data: Vec<u32>,
}

impl FieldMatrix {
    pub fn new(num_fields: usize) -> Self {
        Self {
            num_fields,
            data: Vec::new(),
        }
    }

    pub fn from_data(num_fields: usize, data: Vec<u32>) -> Result<Self> {
        if num_fields == 0 || data.len() % num_fields != 0 {
            return Err(DataError::LengthMismatch {
                expected: num_fields.max(1) * (data.len() / num_fields.max(1)),
                actual: data.len(),
            });
        }
        Ok(Self { num_fields, data })
    }

    pub fn push_row(&mut self, row: &[u32]) -> Result<()> {
        if row.len() != self.num_fields {
            return Err(DataError::LengthMismatch {
                expected: self.num_fields,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub fn rows(&self) -> usize {
        if self.num_fields == 0 {
            0
        } else {
            self.data.len() / self.num_fields
        }
    }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.data[i * self.num_fields..(i + 1) * self.num_fields]
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Copies the listed rows, in the order given.
    pub fn select(&self, rows: &[usize]) -> FieldMatrix {
        let mut data = Vec::with_capacity(rows.len() * self.num_fields);
        for &r in rows {
            data.extend_from_slice(self.row(r));
        }
        FieldMatrix {
            num_fields: self.num_fields,
            data,
        }
    }

    pub fn column_max(&self, col: usize) -> Option<u32> {
        (0..self.rows()).map(|r| self.row(r)[col]).max()
    }

    /// Column-major `f64` copy, the layout tree boosters read.
    pub fn to_column_major_f64(&self) -> Vec<f64> {
        let rows = self.rows();
        let mut out = Vec::with_capacity(self.data.len());
        for c in 0..self.num_fields {
            out.extend((0..rows).map(|r| self.data[r * self.num_fields + c] as f64));
        }
        out
    }
}

/// Names and cardinalities of the field-vector columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub columns: Vec<String>,
    pub field_dims: Vec<usize>,
}

impl FeatureSchema {
    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone)]
struct ContextField {
    column: ContextColumn,
    index: Option<IdIndex>,
}

impl ContextField {
    fn cardinality(&self) -> usize {
        match &self.index {
            Some(index) => index.len(),
            None => self.column.buckets().unwrap_or(0),
        }
    }

    fn encode(&self, raw: &str) -> Result<u32> {
        match &self.index {
            Some(index) => index.encode(raw),
            None => self.column.bucket(raw),
        }
    }
}

/// Category-to-code mappings fitted once and reused for every split.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    users: IdIndex,
    items: IdIndex,
    context: Vec<ContextField>,
}

impl FeatureEncoder {
    /// Builds user and item indices from train, test and submission ids,
    /// and context indices from the joined train and test rows. A context
    /// column whose first training value is the sentinel is left out.
    pub fn fit(train: &[JoinedRow], test: &[JoinedRow], submission: &[RatingRow]) -> Self {
        let mut users = IdIndex::new("user_id");
        let mut items = IdIndex::new("isbn");
        for (user, isbn) in train
            .iter()
            .chain(test)
            .map(|r| (&r.user_id, &r.isbn))
            .chain(submission.iter().map(|r| (&r.user_id, &r.isbn)))
        {
            users.insert(user);
            items.insert(isbn);
        }

        let context = ContextColumn::ALL
            .into_iter()
            .filter(|&column| match train.first() {
                Some(first) if is_sentinel(first.value(column)) => {
                    info!(column = column.name(), "Dropping unpopulated context column");
                    false
                }
                _ => true,
            })
            .map(|column| {
                let index = column.buckets().is_none().then(|| {
                    IdIndex::from_values(
                        column.name(),
                        train.iter().chain(test).map(|r| r.value(column)),
                    )
                });
                ContextField { column, index }
            })
            .collect();

        Self {
            users,
            items,
            context,
        }
    }

    pub fn users(&self) -> &IdIndex {
        &self.users
    }

    pub fn items(&self) -> &IdIndex {
        &self.items
    }

    /// Context columns that survived the sentinel check, in order.
    pub fn context_columns(&self) -> Vec<ContextColumn> {
        self.context.iter().map(|f| f.column).collect()
    }

    /// Index of a surviving categorical context column.
    pub fn context_index(&self, column: ContextColumn) -> Option<&IdIndex> {
        self.context
            .iter()
            .find(|f| f.column == column)
            .and_then(|f| f.index.as_ref())
    }

    pub fn schema(&self) -> FeatureSchema {
        let mut columns = vec!["user_id".to_string(), "isbn".to_string()];
        let mut field_dims = vec![self.users.len(), self.items.len()];
        for field in &self.context {
            columns.push(field.column.name().to_string());
            field_dims.push(field.cardinality());
        }
        FeatureSchema {
            columns,
            field_dims,
        }
    }

    pub fn encode_row(&self, row: &JoinedRow) -> Result<Vec<u32>> {
        let mut codes = Vec::with_capacity(2 + self.context.len());
        codes.push(self.users.encode(&row.user_id)?);
        codes.push(self.items.encode(&row.isbn)?);
        for field in &self.context {
            codes.push(field.encode(row.value(field.column))?);
        }
        Ok(codes)
    }

    pub fn encode(&self, rows: &[JoinedRow]) -> Result<FieldMatrix> {
        let mut matrix = FieldMatrix::new(2 + self.context.len());
        for row in rows {
            matrix.push_row(&self.encode_row(row)?)?;
        }
        Ok(matrix)
    }
}

/// Encoded train and test sets with the encoder that produced them.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub encoder: FeatureEncoder,
    pub schema: FeatureSchema,
    pub train: FieldMatrix,
    pub ratings: Vec<f32>,
    pub test: FieldMatrix,
}

impl EncodedDataset {
    pub fn build(raw: &RawData) -> Result<Self> {
        let train = join(&raw.train, &raw.users, &raw.books)?;
        let test = join(&raw.test, &raw.users, &raw.books)?;
        let submission = raw.submission_rows()?;
        Self::from_joined(&train, &test, &submission)
    }

    pub fn from_joined(
        train: &[JoinedRow],
        test: &[JoinedRow],
        submission: &[RatingRow],
    ) -> Result<Self> {
        let encoder = FeatureEncoder::fit(train, test, submission);
        let schema = encoder.schema();
        let encoded_train = encoder.encode(train)?;
        let encoded_test = encoder.encode(test)?;
        info!(
            train_rows = encoded_train.rows(),
            test_rows = encoded_test.rows(),
            columns = ?schema.columns,
            field_dims = ?schema.field_dims,
            "Encoded dataset"
        );
        for (i, (name, dim)) in schema.columns.iter().zip(&schema.field_dims).enumerate() {
            let max = encoded_train.column_max(i).max(encoded_test.column_max(i));
            debug!(column = %name, field_dim = dim, max_code = ?max, "Field cardinality");
        }
        Ok(Self {
            encoder,
            schema,
            train: encoded_train,
            ratings: train.iter().map(|r| r.rating).collect(),
            test: encoded_test,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user: &str, isbn: &str, rating: f32, context: [&str; 8]) -> JoinedRow {
        JoinedRow {
            user_id: user.to_string(),
            isbn: isbn.to_string(),
            rating,
            context: context.map(str::to_string),
        }
    }

    const FULL: [&str; 8] = ["x", "s", "c", "30", "a", "1995", "p", "k"];

    #[test]
    fn test_schema_prefix_and_dims() {
        let train = vec![
            row("u1", "b1", 5.0, FULL),
            row("u2", "b2", 7.0, ["y", "s", "c", "61", "a", "2001", "q", "k"]),
        ];
        let test = vec![row("u3", "b1", 0.0, ["z", "s", "c", "10", "b", "1980", "p", "k"])];
        let sub = vec![RatingRow {
            user_id: "u4".into(),
            isbn: "b9".into(),
            rating: 0.0,
        }];
        let data = EncodedDataset::from_joined(&train, &test, &sub).unwrap();
        assert_eq!(data.schema.columns[0], "user_id");
        assert_eq!(data.schema.columns[1], "isbn");
        assert_eq!(data.schema.field_dims[0], 4);
        assert_eq!(data.schema.field_dims[1], 3);
        assert_eq!(data.schema.num_fields(), 10);
        let age = data.schema.columns.iter().position(|c| c == "age").unwrap();
        assert_eq!(data.schema.field_dims[age], AGE_BUCKETS);
        assert_eq!(data.train.row(1)[age], 5);
        assert_eq!(data.test.row(0)[age], 0);
    }

    #[test]
    fn test_sentinel_column_dropped() {
        let mut ctx = FULL;
        ctx[0] = "-1";
        ctx[3] = "-1.0";
        let train = vec![row("u1", "b1", 5.0, ctx)];
        let encoder = FeatureEncoder::fit(&train, &[], &[]);
        let cols = encoder.context_columns();
        assert!(!cols.contains(&ContextColumn::LocationCity));
        assert!(!cols.contains(&ContextColumn::Age));
        assert_eq!(cols.len(), 6);
        assert!(encoder.context_index(ContextColumn::LocationCity).is_none());
        assert_eq!(encoder.context_index(ContextColumn::Publisher).map(|i| i.len()), Some(1));
    }

    #[test]
    fn test_unknown_value_is_error() {
        let train = vec![row("u1", "b1", 5.0, FULL)];
        let encoder = FeatureEncoder::fit(&train, &[], &[]);
        let stranger = row("u1", "b1", 5.0, ["new", "s", "c", "30", "a", "1995", "p", "k"]);
        assert!(matches!(
            encoder.encode_row(&stranger),
            Err(DataError::UnknownValue { ref field, .. }) if field == "location_city"
        ));
    }

    #[test]
    fn test_missing_numeric_goes_to_lowest_bucket() {
        assert_eq!(ContextColumn::Age.bucket(MISSING).unwrap(), 0);
        assert_eq!(ContextColumn::YearOfPublication.bucket("NaN").unwrap(), 0);
        assert!(ContextColumn::Age.bucket("old").is_err());
    }

    #[test]
    fn test_select_and_column_major() {
        let m = FieldMatrix::from_data(2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(m.rows(), 3);
        let s = m.select(&[2, 0]);
        assert_eq!(s.data(), &[5, 6, 1, 2]);
        assert_eq!(m.to_column_major_f64(), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert!(FieldMatrix::from_data(2, vec![1, 2, 3]).is_err());
    }
}
