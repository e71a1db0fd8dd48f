use std::collections::HashMap;

use super::DataType;

/// A single column of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Column {
    /// Creates a column.
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column's data type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns true if the column accepts null values.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Same column with nullability forced on, used for the padded side of
    /// outer joins.
    pub fn to_nullable(&self) -> Self {
        Self {
            nullable: true,
            ..self.clone()
        }
    }
}

/// Ordered list of columns describing a row.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,

    /// Column name to first index with that name
    name_to_index: HashMap<String, usize>,

    /// Total size of fixed-length columns
    fixed_size: usize,

    /// Size of the null bitmap in bytes (ceiling of column_count / 8)
    null_bitmap_size: usize,
}

impl Schema {
    /// Creates a schema from its columns, precomputing the name lookup and
    /// the fixed-size layout.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::new();
        let mut fixed_size = 0;

        for (i, col) in columns.iter().enumerate() {
            name_to_index.entry(col.name.clone()).or_insert(i);
            fixed_size += col.data_type.fixed_size().unwrap_or(0);
        }

        let null_bitmap_size = (columns.len() + 7) / 8;
        Self {
            columns,
            name_to_index,
            fixed_size,
            null_bitmap_size,
        }
    }

    /// Starts a [`SchemaBuilder`].
    ///
    /// ```
    /// use slate::tuple::{DataType, Schema};
    ///
    /// let schema = Schema::builder()
    ///     .column("id", DataType::Integer)
    ///     .nullable_column("note", DataType::VarChar(32))
    ///     .build();
    /// assert_eq!(schema.column_index("note"), Some(1));
    /// assert!(schema.column(1).unwrap().is_nullable());
    /// assert_eq!(schema.fixed_size(), 8);
    /// ```
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Schema without columns.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Iterates over the columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the index of the first column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Returns the column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Returns the total size of all fixed-length columns.
    pub fn fixed_size(&self) -> usize {
        self.fixed_size
    }

    /// Returns the size of the null bitmap in bytes.
    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Largest possible encoded row.
    pub fn max_row_size(&self) -> usize {
        self.null_bitmap_size + self.columns.iter().map(|c| c.data_type.max_size()).sum::<usize>()
    }

    /// Schema with only the given columns, None if an index is out of range.
    pub fn project(&self, column_indices: &[usize]) -> Option<Schema> {
        column_indices
            .iter()
            .map(|&i| self.columns.get(i).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Schema::new)
    }

    /// Left columns followed by right columns.
    pub fn join(&self, right: &Schema) -> Schema {
        Schema::new(self.columns.iter().chain(right.columns.iter()).cloned().collect())
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Builder for constructing schemas fluently.
#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    /// Creates a builder with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a non-nullable column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false));
        self
    }

    /// Adds a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }
}
