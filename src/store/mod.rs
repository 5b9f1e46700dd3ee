//! Parquet-backed table store
//!
//! Each table is a single Parquet file `<root>/<table>.parquet`. Replacing a
//! table writes a staging file next to it and renames it into place, so a
//! reader opening the table sees either the previous or the new contents.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};

use crate::error::{PipelineError, Result};
use crate::schema::ArrowSchema;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// File extension of stored tables
pub const TABLE_EXTENSION: &str = "parquet";
/// Suffix of files written before they are renamed into place
pub const STAGING_SUFFIX: &str = "staging";

/// Handle to a directory of tables
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the table files
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `table`
    #[must_use]
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.{TABLE_EXTENSION}"))
    }

    fn staging_path(&self, table: &str) -> PathBuf {
        self.root
            .join(format!("{table}.{TABLE_EXTENSION}.{STAGING_SUFFIX}"))
    }

    /// Whether `table` has been written
    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.table_path(table).is_file()
    }

    /// Names of all stored tables, sorted
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(TABLE_EXTENSION)
            {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    fn open_table_file(&self, table: &str) -> Result<File> {
        File::open(self.table_path(table)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::MissingTable {
                    table: table.to_string(),
                }
            } else {
                PipelineError::Io(e)
            }
        })
    }

    /// Read a whole table as a single batch carrying the stored schema.
    /// An empty table yields a batch with zero rows.
    pub fn read_table(&self, table: &str) -> Result<RecordBatch> {
        let start = Instant::now();
        let path = self.table_path(table);
        log_operation_start("Reading table", &path);

        let file = self.open_table_file(table)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches = builder
            .build()?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;

        log_operation_complete("read", &path, batch.num_rows(), Some(start.elapsed()));
        Ok(batch)
    }

    /// Return every row of `table`; the query surface used by reporting tools
    pub fn query(&self, table: &str) -> Result<RecordBatch> {
        self.read_table(table)
    }

    /// Number of rows in `table`, from the file metadata
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let reader = SerializedFileReader::new(self.open_table_file(table)?)?;
        let rows = reader.metadata().file_metadata().num_rows();
        Ok(usize::try_from(rows).unwrap_or_default())
    }

    /// Write `batch` to a staging file without touching the live table
    pub fn stage_table(&self, table: &str, batch: &RecordBatch) -> Result<StagedTable> {
        let staging = self.staging_path(table);
        if let Err(e) = write_parquet(&staging, batch) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        Ok(StagedTable {
            table: table.to_string(),
            staging,
            target: self.table_path(table),
            rows: batch.num_rows(),
        })
    }

    /// Atomically replace `table` with `batch`
    pub fn replace_table(&self, table: &str, batch: &RecordBatch) -> Result<()> {
        self.stage_table(table, batch)?.commit()
    }

    /// Read `table` as typed rows, validating its schema first
    pub fn load_rows<T: ArrowSchema>(&self, table: &str) -> Result<Vec<T>> {
        let batch = self.read_table(table)?;
        T::from_record_batch(table, &batch)
    }

    /// Atomically replace `table` with typed rows
    pub fn save_rows<T: ArrowSchema>(&self, table: &str, rows: &[T]) -> Result<()> {
        let batch = T::to_record_batch(table, rows)?;
        self.replace_table(table, &batch)
    }
}

/// A fully written table waiting to be renamed into place
#[derive(Debug)]
#[must_use = "a staged table is discarded unless committed"]
pub struct StagedTable {
    table: String,
    staging: PathBuf,
    target: PathBuf,
    rows: usize,
}

impl StagedTable {
    /// Name of the table being replaced
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of rows that will become visible on commit
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Rename the staging file over the live table. On failure the staging
    /// file is removed and the live table is left as it was.
    pub fn commit(self) -> Result<()> {
        if let Err(e) = fs::rename(&self.staging, &self.target) {
            self.discard();
            return Err(e.into());
        }
        log::debug!("Replaced table {} ({} rows)", self.table, self.rows);
        Ok(())
    }

    /// Remove the staging file, leaving the live table untouched
    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.staging) {
            log::warn!(
                "Failed to remove staging file {}: {e}",
                self.staging.display()
            );
        }
    }
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}
