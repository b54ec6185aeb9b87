// src/output.rs
//
// The audit record: one CSV header and one row per draw, written to stdout
// and appended to the result log.

use crate::error::{LottoError, Result};
use crate::models::{BlockId, DerivationResult};
use chrono::NaiveDate;
use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Everything a third party needs to re-run the draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub target_date: NaiveDate,
    pub dfi_price: f64,
    pub btc_price: f64,
    pub first_block: BlockId,
    pub block_hash_suffix: String,
    pub minter_suffix: String,
    pub result: DerivationResult,
}

impl DrawRecord {
    pub fn header(&self) -> Vec<String> {
        vec![
            "KuCoin USDT Price of DFI".to_string(),
            "KuCoin USDT Price of BTC".to_string(),
            "Result of Multiplication of Price of DFI and Price of BTC".to_string(),
            format!("First Block After {}", self.target_date),
            "Last 4 digits of Block Hash".to_string(),
            "Last 4 digits of Block Minter".to_string(),
            "1st Concatenation".to_string(),
            "SHA-256 Hash".to_string(),
            "2nd Concatenation".to_string(),
            "Decimal".to_string(),
            "Winning Ticket".to_string(),
        ]
    }

    /// Prices and the fraction use the shortest round-trip rendering
    /// (`1.0`, `2.793`, `0.4686115846116081`).
    pub fn row(&self) -> Vec<String> {
        vec![
            format!("{:?}", self.dfi_price),
            format!("{:?}", self.btc_price),
            self.result.price_product.to_string(),
            self.first_block.to_string(),
            self.block_hash_suffix.clone(),
            self.minter_suffix.clone(),
            self.result.first_concat.clone(),
            self.result.sha256_digest.clone(),
            self.result.second_concat.clone(),
            format!("{:?}", self.result.decimal_fraction),
            self.result.winning_ticket.to_string(),
        ]
    }

    /// Renders the record as CSV text, optionally preceded by the header.
    pub fn to_csv(&self, with_header: bool) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        if with_header {
            writer.write_record(self.header()).map_err(csv_error)?;
        }
        writer.write_record(self.row()).map_err(csv_error)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| LottoError::Io(std::io::Error::other(e.to_string())))?;
        String::from_utf8(bytes).map_err(|e| LottoError::Io(std::io::Error::other(e.to_string())))
    }
}

fn csv_error(e: csv::Error) -> LottoError {
    LottoError::Io(std::io::Error::other(e.to_string()))
}

/// Appends the record to the result log at `path`. The header is written only
/// when the file is new or empty.
pub fn append_to_log(path: &Path, record: &DrawRecord) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;
    let text = record.to_csv(is_empty)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Appends to the result log (when given), then writes to `out`. A failed
/// log write leaves `out` untouched.
pub fn publish<W: Write>(out: &mut W, log: Option<&Path>, record: &DrawRecord) -> Result<()> {
    let text = record.to_csv(true)?;
    if let Some(path) = log {
        append_to_log(path, record)?;
        info!("result appended to {}", path.display());
    }
    out.write_all(text.as_bytes())?;
    out.flush()?;
    for line in text.lines() {
        info!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> DrawRecord {
        DrawRecord {
            target_date: NaiveDate::from_ymd_opt(2022, 2, 5).unwrap(),
            dfi_price: 2.793,
            btc_price: 41603.4,
            first_block: BlockId::from(1598836),
            block_hash_suffix: "ab12".to_string(),
            minter_suffix: "cd34".to_string(),
            result: DerivationResult {
                price_product: 116198,
                first_concat: "1161981598836ab12cd34".to_string(),
                sha256_digest: "77f6e307415ccac1207d7cd2577b5626e1bdb50da326edf5a052e91058bdc66f"
                    .to_string(),
                second_concat: "77f6edc66f".to_string(),
                decimal_fraction: 0.4686115846116081,
                winning_ticket: 28,
            },
        }
    }

    #[test]
    fn test_row_rendering() {
        let row = make_record().row().join(",");
        assert_eq!(
            row,
            "2.793,41603.4,116198,1598836,ab12,cd34,1161981598836ab12cd34,\
             77f6e307415ccac1207d7cd2577b5626e1bdb50da326edf5a052e91058bdc66f,\
             77f6edc66f,0.4686115846116081,28"
        );
    }

    #[test]
    fn test_unit_price_renders_with_decimal_point() {
        let mut record = make_record();
        record.dfi_price = 1.0;
        assert_eq!(record.row()[0], "1.0");
    }

    #[test]
    fn test_publish_writes_header_and_row() {
        let mut out = Vec::new();
        publish(&mut out, None, &make_record()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("First Block After 2022-02-05"));
        assert!(lines[1].ends_with(",28"));
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = std::env::temp_dir().join(format!(
            "lotto_output_{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("results.log");

        append_to_log(&path, &make_record()).unwrap();
        append_to_log(&path, &make_record()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("KuCoin USDT Price of DFI"));
        assert_eq!(lines[1], lines[2]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_log_write_emits_nothing() {
        let path = std::env::temp_dir()
            .join(format!(
                "lotto_missing_{}",
                chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ))
            .join("results.log");
        let mut out = Vec::new();
        let err = publish(&mut out, Some(&path), &make_record()).unwrap_err();
        assert!(matches!(err, LottoError::Io(_)));
        assert!(out.is_empty());
        assert!(!path.exists());
    }
}
