//! Pure extraction of a single draw from the rendered result page.
//!
//! Fails closed: if any required anchor (round, date, six balls, bonus,
//! five prize rows) is missing, no record is produced. Supplementary
//! numeric cells are best-effort and default to zero.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::{DRAW_NUMBERS, DrawRecord, PRIZE_TIERS, PrizeTier};

/// Strips every non-digit character and parses the rest. Never fails:
/// "1,234,567원" -> 1234567, no digits at all -> 0.
pub fn clean_int(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>()
}

fn capture_count(text: &str, pattern: &str) -> u32 {
    Regex::new(pattern)
        .ok()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| clean_int(m.as_str()) as u32)
        .unwrap_or(0)
}

/// Parses one `DrawRecord` out of the rendered result page, or `None` if
/// the page does not carry a complete draw.
pub fn extract_draw(html: &str) -> Option<DrawRecord> {
    let doc = Html::parse_document(html);

    let round_sel = Selector::parse(".win_result strong").ok()?;
    let round = clean_int(&text_of(doc.select(&round_sel).next()?)) as u32;
    if round == 0 {
        return None;
    }

    // Date text reads "(2026년 01월 03일 추첨)".
    let date_sel = Selector::parse(".win_result .desc").ok()?;
    let date_text = text_of(doc.select(&date_sel).next()?);
    let date_re = Regex::new(r"(\d{4})년 (\d{2})월 (\d{2})일").ok()?;
    let caps = date_re.captures(&date_text)?;
    let draw_date = format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);

    let ball_sel = Selector::parse(".win_result .num.win p .ball_645").ok()?;
    let numbers: Vec<u8> = doc
        .select(&ball_sel)
        .map(|el| clean_int(&text_of(el)) as u8)
        .collect();
    if numbers.len() != DRAW_NUMBERS {
        return None;
    }

    let bonus_sel = Selector::parse(".win_result .num.bonus p .ball_645").ok()?;
    let bonus = clean_int(&text_of(doc.select(&bonus_sel).next()?)) as u8;
    if bonus == 0 {
        return None;
    }

    let row_sel = Selector::parse(".tbl_data.tbl_data_col tbody tr").ok()?;
    let rows: Vec<ElementRef> = doc.select(&row_sel).collect();
    if rows.len() < PRIZE_TIERS {
        return None;
    }

    let td_sel = Selector::parse("td").ok()?;
    let mut tiers = [PrizeTier::default(); PRIZE_TIERS];
    for (tier, row) in tiers.iter_mut().zip(&rows) {
        let cells: Vec<String> = row.select(&td_sel).map(text_of).collect();
        let cell = |i: usize| cells.get(i).map(|c| clean_int(c)).unwrap_or(0);
        *tier = PrizeTier {
            total_amount: cell(1),
            winner_count: cell(2),
            amount_per_winner: cell(3),
        };
    }

    // Ticket-type breakdown lives in the free-text remarks cell of the
    // first prize row, e.g. "자동 8, 반자동 1, 수동 1". Each count is
    // searched independently and missing ones stay zero.
    let remarks = rows[0]
        .select(&td_sel)
        .nth(5)
        .map(text_of)
        .unwrap_or_default();
    let auto_count = capture_count(&remarks, r"자동\s*(\d+)");
    let semi_auto_count = capture_count(&remarks, r"반자동\s*(\d+)");
    let manual_count = capture_count(&remarks, r"수동\s*(\d+)");

    let li_sel = Selector::parse(".list_text_common > li").ok()?;
    let strong_sel = Selector::parse("strong").ok()?;
    let mut total_sales = 0;
    for li in doc.select(&li_sel) {
        if text_of(li).contains("총판매금액") {
            if let Some(strong) = li.select(&strong_sel).next() {
                total_sales = clean_int(&text_of(strong));
            }
            break;
        }
    }

    let numbers_sum = DrawRecord::sum_of(&numbers);
    Some(DrawRecord {
        round,
        draw_date,
        numbers,
        bonus,
        tiers,
        auto_count,
        semi_auto_count,
        manual_count,
        total_sales,
        numbers_sum,
    })
}
