//! Durable draw history: one CSV file, header row plus one row per round,
//! newest first. Column names are kept identical to the historical dataset
//! so existing files stay readable without migration.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{DRAW_NUMBERS, DrawRecord, PrizeTier};

/// On-disk row shape. The six winning numbers are a single comma-joined
/// column (`csv` quotes it automatically); conversion to the discrete
/// in-memory shape happens here and nowhere else.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    #[serde(rename = "회차")]
    round: u32,
    #[serde(rename = "추첨일")]
    draw_date: String,
    #[serde(rename = "당첨번호")]
    numbers: String,
    #[serde(rename = "보너스번호")]
    bonus: u8,
    #[serde(rename = "1등_총당첨금액")]
    rank1_total: u64,
    #[serde(rename = "1등_당첨게임수")]
    rank1_count: u64,
    #[serde(rename = "1등_1게임당당첨금액")]
    rank1_per_game: u64,
    #[serde(rename = "2등_총당첨금액")]
    rank2_total: u64,
    #[serde(rename = "2등_당첨게임수")]
    rank2_count: u64,
    #[serde(rename = "2등_1게임당당첨금액")]
    rank2_per_game: u64,
    #[serde(rename = "3등_총당첨금액")]
    rank3_total: u64,
    #[serde(rename = "3등_당첨게임수")]
    rank3_count: u64,
    #[serde(rename = "3등_1게임당당첨금액")]
    rank3_per_game: u64,
    #[serde(rename = "4등_총당첨금액")]
    rank4_total: u64,
    #[serde(rename = "4등_당첨게임수")]
    rank4_count: u64,
    #[serde(rename = "4등_1게임당당첨금액")]
    rank4_per_game: u64,
    #[serde(rename = "5등_총당첨금액")]
    rank5_total: u64,
    #[serde(rename = "5등_당첨게임수")]
    rank5_count: u64,
    #[serde(rename = "5등_1게임당당첨금액")]
    rank5_per_game: u64,
    #[serde(rename = "자동")]
    auto_count: u32,
    #[serde(rename = "반자동")]
    semi_auto_count: u32,
    #[serde(rename = "수동")]
    manual_count: u32,
    #[serde(rename = "총판매금액")]
    total_sales: u64,
    #[serde(rename = "당첨번호_합계")]
    numbers_sum: u32,
}

impl HistoryRow {
    fn from_record(record: &DrawRecord) -> Self {
        let [t1, t2, t3, t4, t5] = record.tiers;
        HistoryRow {
            round: record.round,
            draw_date: record.draw_date.clone(),
            numbers: record
                .numbers
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            bonus: record.bonus,
            rank1_total: t1.total_amount,
            rank1_count: t1.winner_count,
            rank1_per_game: t1.amount_per_winner,
            rank2_total: t2.total_amount,
            rank2_count: t2.winner_count,
            rank2_per_game: t2.amount_per_winner,
            rank3_total: t3.total_amount,
            rank3_count: t3.winner_count,
            rank3_per_game: t3.amount_per_winner,
            rank4_total: t4.total_amount,
            rank4_count: t4.winner_count,
            rank4_per_game: t4.amount_per_winner,
            rank5_total: t5.total_amount,
            rank5_count: t5.winner_count,
            rank5_per_game: t5.amount_per_winner,
            auto_count: record.auto_count,
            semi_auto_count: record.semi_auto_count,
            manual_count: record.manual_count,
            total_sales: record.total_sales,
            numbers_sum: record.numbers_sum,
        }
    }

    /// `None` when the row is unusable (bad round or numbers column); the
    /// derived sum is recomputed, never taken from the file.
    fn into_record(self) -> Option<DrawRecord> {
        if self.round == 0 {
            return None;
        }
        let numbers: Vec<u8> = self
            .numbers
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();
        if numbers.len() != DRAW_NUMBERS {
            return None;
        }
        let numbers_sum = DrawRecord::sum_of(&numbers);
        Some(DrawRecord {
            round: self.round,
            draw_date: self.draw_date,
            numbers,
            bonus: self.bonus,
            tiers: [
                PrizeTier {
                    total_amount: self.rank1_total,
                    winner_count: self.rank1_count,
                    amount_per_winner: self.rank1_per_game,
                },
                PrizeTier {
                    total_amount: self.rank2_total,
                    winner_count: self.rank2_count,
                    amount_per_winner: self.rank2_per_game,
                },
                PrizeTier {
                    total_amount: self.rank3_total,
                    winner_count: self.rank3_count,
                    amount_per_winner: self.rank3_per_game,
                },
                PrizeTier {
                    total_amount: self.rank4_total,
                    winner_count: self.rank4_count,
                    amount_per_winner: self.rank4_per_game,
                },
                PrizeTier {
                    total_amount: self.rank5_total,
                    winner_count: self.rank5_count,
                    amount_per_winner: self.rank5_per_game,
                },
            ],
            auto_count: self.auto_count,
            semi_auto_count: self.semi_auto_count,
            manual_count: self.manual_count,
            total_sales: self.total_sales,
            numbers_sum,
        })
    }
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reads the full history. A missing file is an empty history (fresh
    /// deployment); a present-but-corrupt file is an error, so a bad read
    /// can never masquerade as "no data" and truncate history downstream.
    pub fn read_all(&self) -> Result<Vec<DrawRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .with_context(|| format!("reading header of {}", self.path.display()))?;
        if !headers.iter().any(|h| h == "회차") {
            bail!("{} is not a draw history file (회차 column missing)", self.path.display());
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut seen_rows = 0usize;
        for row in reader.deserialize::<HistoryRow>() {
            seen_rows += 1;
            match row {
                Ok(row) => match row.into_record() {
                    Some(record) => records.push(record),
                    None => {
                        skipped += 1;
                        warn!("skipping unusable history row ({} so far)", skipped);
                    }
                },
                Err(e) => {
                    skipped += 1;
                    warn!("skipping malformed history row: {e}");
                }
            }
        }
        if seen_rows > 0 && records.is_empty() {
            bail!("{}: no usable rows out of {}", self.path.display(), seen_rows);
        }
        Ok(records)
    }

    /// Rewrites the whole file: sort descending by round, drop duplicate
    /// rounds (first occurrence wins), write to a temp file, rename over
    /// the old one. A failed write leaves the previous file intact.
    pub fn write_all(&self, records: &[DrawRecord]) -> Result<()> {
        let mut ordered = records.to_vec();
        ordered.sort_by(|a, b| b.round.cmp(&a.round));
        ordered.dedup_by_key(|r| r.round);

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            for record in &ordered {
                writer
                    .serialize(HistoryRow::from_record(record))
                    .with_context(|| format!("writing round {}", record.round))?;
            }
            writer.flush().context("flushing history file")?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty_history() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("lotto.csv"));
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn round_trip_preserves_records() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("lotto.csv"));
        let records = vec![DrawRecord::dummy(1204), DrawRecord::dummy(1203)];

        store.write_all(&records).unwrap();
        assert_eq!(store.read_all().unwrap(), records);
    }

    #[test]
    fn write_sorts_descending_and_dedupes_by_round() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("lotto.csv"));
        let mut duplicate = DrawRecord::dummy(1203);
        duplicate.total_sales = 1;
        let records = vec![
            DrawRecord::dummy(1202),
            DrawRecord::dummy(1204),
            DrawRecord::dummy(1203),
            duplicate,
        ];

        store.write_all(&records).unwrap();
        let read = store.read_all().unwrap();

        let rounds: Vec<u32> = read.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1204, 1203, 1202]);
        // first occurrence of 1203 wins
        assert_eq!(read[1].total_sales, DrawRecord::dummy(1203).total_sales);
    }

    #[test]
    fn numbers_sum_is_recomputed_on_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lotto.csv");
        let store = HistoryStore::new(&path);
        store.write_all(&[DrawRecord::dummy(1204)]).unwrap();

        // Tamper with the stored sum; the read must not trust it.
        let tampered = fs::read_to_string(&path).unwrap().replace(",127", ",9999");
        fs::write(&path, tampered).unwrap();

        let read = store.read_all().unwrap();
        assert_eq!(read[0].numbers_sum, 127);
    }

    #[test]
    fn malformed_row_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lotto.csv");
        let store = HistoryStore::new(&path);
        store
            .write_all(&[DrawRecord::dummy(1204), DrawRecord::dummy(1203)])
            .unwrap();

        // Break the numbers column of one row.
        let broken = fs::read_to_string(&path)
            .unwrap()
            .replace("1203,2026-01-03,\"3, 11, 14, 22, 37, 40\"", "1203,2026-01-03,없음");
        fs::write(&path, broken).unwrap();

        let read = store.read_all().unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].round, 1204);
    }

    #[test]
    fn corrupt_file_is_an_error_not_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lotto.csv");
        fs::write(&path, "this is not a history file\njust text\n").unwrap();

        let store = HistoryStore::new(&path);
        assert!(store.read_all().is_err());
    }
}
