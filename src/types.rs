use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const BALL_MIN: u8 = 1;
pub const BALL_MAX: u8 = 45;
pub const DRAW_NUMBERS: usize = 6;
pub const PRIZE_TIERS: usize = 5;

/// One payout rank (1st through 5th) of a single draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub total_amount: u64,
    pub winner_count: u64,
    pub amount_per_winner: u64,
}

/// The normalized facts published for one lottery round.
///
/// `numbers` keeps the source order of the six balls; `numbers_sum` is
/// derived and recomputed whenever `numbers` changes, never trusted from
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub round: u32,
    pub draw_date: String,
    pub numbers: Vec<u8>,
    pub bonus: u8,
    pub tiers: [PrizeTier; PRIZE_TIERS],
    pub auto_count: u32,
    pub semi_auto_count: u32,
    pub manual_count: u32,
    pub total_sales: u64,
    pub numbers_sum: u32,
}

impl DrawRecord {
    pub fn sum_of(numbers: &[u8]) -> u32 {
        numbers.iter().map(|&n| u32::from(n)).sum()
    }

    pub fn recompute_sum(&mut self) {
        self.numbers_sum = Self::sum_of(&self.numbers);
    }
}

/// Partial draw supplied to the merge endpoint. Only `round` is required;
/// every present field overwrites the stored one field-by-field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawFragment {
    pub round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbers: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<[PrizeTier; PRIZE_TIERS]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semi_auto_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sales: Option<u64>,
}

impl DrawFragment {
    /// Rejects a fragment that could corrupt history. Called on the whole
    /// batch before any store mutation.
    pub fn validate(&self) -> Result<()> {
        if self.round == 0 {
            bail!("round must be a positive integer");
        }
        if let Some(date) = &self.draw_date {
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                bail!("round {}: draw_date must be YYYY-MM-DD", self.round);
            }
        }
        if let Some(numbers) = &self.numbers {
            if numbers.len() != DRAW_NUMBERS {
                bail!(
                    "round {}: expected {} numbers, got {}",
                    self.round,
                    DRAW_NUMBERS,
                    numbers.len()
                );
            }
            for &n in numbers {
                if !(BALL_MIN..=BALL_MAX).contains(&n) {
                    bail!("round {}: number {} out of range", self.round, n);
                }
            }
            let mut seen = [false; BALL_MAX as usize + 1];
            for &n in numbers {
                if seen[n as usize] {
                    bail!("round {}: duplicate number {}", self.round, n);
                }
                seen[n as usize] = true;
            }
        }
        if let Some(bonus) = self.bonus {
            if !(BALL_MIN..=BALL_MAX).contains(&bonus) {
                bail!("round {}: bonus {} out of range", self.round, bonus);
            }
        }
        Ok(())
    }

    /// Overlays present fields onto an existing record. The derived sum is
    /// recomputed afterwards regardless of what the fragment carried.
    pub fn apply_to(&self, record: &mut DrawRecord) {
        if let Some(date) = &self.draw_date {
            record.draw_date = date.clone();
        }
        if let Some(numbers) = &self.numbers {
            record.numbers = numbers.clone();
        }
        if let Some(bonus) = self.bonus {
            record.bonus = bonus;
        }
        if let Some(tiers) = self.tiers {
            record.tiers = tiers;
        }
        if let Some(n) = self.auto_count {
            record.auto_count = n;
        }
        if let Some(n) = self.semi_auto_count {
            record.semi_auto_count = n;
        }
        if let Some(n) = self.manual_count {
            record.manual_count = n;
        }
        if let Some(n) = self.total_sales {
            record.total_sales = n;
        }
        record.recompute_sum();
    }

    /// Builds a full record for an insert; best-effort fields default to zero.
    pub fn into_record(self) -> DrawRecord {
        let numbers = self.numbers.unwrap_or_default();
        let numbers_sum = DrawRecord::sum_of(&numbers);
        DrawRecord {
            round: self.round,
            draw_date: self.draw_date.unwrap_or_default(),
            numbers,
            bonus: self.bonus.unwrap_or(0),
            tiers: self.tiers.unwrap_or_default(),
            auto_count: self.auto_count.unwrap_or(0),
            semi_auto_count: self.semi_auto_count.unwrap_or(0),
            manual_count: self.manual_count.unwrap_or(0),
            total_sales: self.total_sales.unwrap_or(0),
            numbers_sum,
        }
    }
}

/// Result of one merge batch, reported back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
}

#[cfg(test)]
impl DrawRecord {
    pub(crate) fn dummy(round: u32) -> Self {
        let numbers = vec![3, 11, 14, 22, 37, 40];
        let numbers_sum = Self::sum_of(&numbers);
        DrawRecord {
            round,
            draw_date: "2026-01-03".to_string(),
            numbers,
            bonus: 7,
            tiers: [
                PrizeTier {
                    total_amount: 26_000_000_000,
                    winner_count: 10,
                    amount_per_winner: 2_600_000_000,
                },
                PrizeTier {
                    total_amount: 4_300_000_000,
                    winner_count: 80,
                    amount_per_winner: 53_750_000,
                },
                PrizeTier {
                    total_amount: 4_300_000_000,
                    winner_count: 3000,
                    amount_per_winner: 1_433_333,
                },
                PrizeTier {
                    total_amount: 7_500_000_000,
                    winner_count: 150_000,
                    amount_per_winner: 50_000,
                },
                PrizeTier {
                    total_amount: 12_500_000_000,
                    winner_count: 2_500_000,
                    amount_per_winner: 5_000,
                },
            ],
            auto_count: 8,
            semi_auto_count: 1,
            manual_count: 1,
            total_sales: 120_000_000_000,
            numbers_sum,
        }
    }
}
