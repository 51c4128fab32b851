//! JSONL posting loader
//!
//! ```text
//! file.jsonl (one object per line)
//!     ↓ serde_json → RawPosting
//!     ↓ normalize (trim, empty → NULL, measure checks)
//!     ↓ SqlitePostingWriter (batched, one transaction per flush)
//! job_posting
//! ```

use super::error::StatisticsError;
use super::types::Posting;
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const DEFAULT_BATCH_SIZE: usize = 500;

/// One input line before normalization
#[derive(Debug, Deserialize)]
struct RawPosting {
    id: Option<String>,
    title: Option<String>,
    standard_job_id: Option<String>,
    country_code: Option<String>,
    /// Number, numeric string, null or garbage
    days_to_hire: Option<Value>,
}

/// Row-level problems found while loading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PostingAnomaly {
    /// Line is not a JSON object of the expected shape
    InvalidJson { line: usize },
    /// `id` or `standard_job_id` absent or blank; row skipped
    MissingField { line: usize, field: &'static str },
    /// Measure below zero; stored as NULL
    NegativeMeasure { line: usize, value: i64 },
    /// Measure not an integer or integer string; stored as NULL
    NonNumericMeasure { line: usize, raw: String },
}

impl PostingAnomaly {
    /// True if the whole row was dropped
    pub fn skips_row(&self) -> bool {
        matches!(
            self,
            PostingAnomaly::InvalidJson { .. } | PostingAnomaly::MissingField { .. }
        )
    }
}

/// Outcome of one load
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestionReport {
    pub lines_read: usize,
    pub postings_written: usize,
    pub rows_skipped: usize,
    pub measures_nulled: usize,
    pub anomalies: Vec<PostingAnomaly>,
}

impl IngestionReport {
    fn record(&mut self, anomaly: PostingAnomaly) {
        log::debug!("   ├─ Posting anomaly: {:?}", anomaly);
        if anomaly.skips_row() {
            self.rows_skipped += 1;
        } else {
            self.measures_nulled += 1;
        }
        self.anomalies.push(anomaly);
    }
}

/// Batched writer into `job_posting`
///
/// Rows are buffered and written in one transaction per flush. Ids are
/// upserted so reloading a file replaces earlier versions of a posting.
pub struct SqlitePostingWriter {
    conn: Connection,
    batch: Vec<Posting>,
    batch_size: usize,
    written: usize,
}

impl SqlitePostingWriter {
    /// Open the database; the schema must already exist
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StatisticsError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            batch: Vec::with_capacity(DEFAULT_BATCH_SIZE),
            batch_size: DEFAULT_BATCH_SIZE,
            written: 0,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn write(&mut self, posting: Posting) -> Result<(), StatisticsError> {
        self.batch.push(posting);

        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StatisticsError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO job_posting
                 (id, title, standard_job_id, country_code, days_to_hire)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for posting in &self.batch {
                stmt.execute(params![
                    posting.id,
                    posting.title,
                    posting.standard_job_id,
                    posting.country_code,
                    posting.days_to_hire,
                ])?;
            }
        }
        tx.commit()?;

        log::debug!("✅ Flushed {} postings to SQLite", self.batch.len());
        self.written += self.batch.len();
        self.batch.clear();

        Ok(())
    }

    /// Postings committed so far
    pub fn written(&self) -> usize {
        self.written
    }
}

/// Load a JSONL file of postings
///
/// Bad rows are reported, not fatal. I/O and store errors abort; rows
/// flushed before the failure stay written.
pub fn load_postings_jsonl(
    path: impl AsRef<Path>,
    writer: &mut SqlitePostingWriter,
) -> Result<IngestionReport, StatisticsError> {
    let path = path.as_ref();
    log::info!("📥 Loading postings from: {}", path.display());

    let reader = BufReader::new(File::open(path)?);
    let mut report = IngestionReport::default();
    let written_before = writer.written();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;

        if line.trim().is_empty() {
            continue;
        }
        report.lines_read += 1;

        let raw: RawPosting = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(_) => {
                report.record(PostingAnomaly::InvalidJson { line: line_no });
                continue;
            }
        };

        if let Some(posting) = normalize(raw, line_no, &mut report) {
            writer.write(posting)?;
        }
    }

    writer.flush()?;
    report.postings_written = writer.written() - written_before;

    if report.anomalies.is_empty() {
        log::info!("✅ Loaded {} postings", report.postings_written);
    } else {
        log::warn!(
            "⚠️  Loaded {} postings ({} rows skipped, {} measures set to NULL)",
            report.postings_written,
            report.rows_skipped,
            report.measures_nulled
        );
    }

    Ok(report)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn normalize(raw: RawPosting, line: usize, report: &mut IngestionReport) -> Option<Posting> {
    let Some(id) = non_blank(raw.id) else {
        report.record(PostingAnomaly::MissingField { line, field: "id" });
        return None;
    };
    let Some(standard_job_id) = non_blank(raw.standard_job_id) else {
        report.record(PostingAnomaly::MissingField {
            line,
            field: "standard_job_id",
        });
        return None;
    };

    let days_to_hire = match parse_measure(raw.days_to_hire, line) {
        Ok(days) => days,
        Err(anomaly) => {
            report.record(anomaly);
            None
        }
    };

    Some(Posting {
        id,
        title: non_blank(raw.title),
        standard_job_id,
        country_code: non_blank(raw.country_code),
        days_to_hire,
    })
}

/// `Ok(None)` for an absent measure (open posting)
fn parse_measure(value: Option<Value>, line: usize) -> Result<Option<i64>, PostingAnomaly> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().ok_or(
            PostingAnomaly::NonNumericMeasure { line, raw: s },
        )?,
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| PostingAnomaly::NonNumericMeasure {
            line,
            raw: n.to_string(),
        })?,
        Some(other) => {
            return Err(PostingAnomaly::NonNumericMeasure {
                line,
                raw: other.to_string(),
            })
        }
    };

    if parsed < 0 {
        return Err(PostingAnomaly::NegativeMeasure { line, value: parsed });
    }

    Ok(Some(parsed))
}
