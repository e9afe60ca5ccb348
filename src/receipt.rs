//! receipt.rs — OCR text → structured ledger entry.
//!
//! The oracle extracts amount/date/category/memo fields as JSON; the category
//! name is then mapped onto the ledger's fixed category table. An unmapped
//! name falls back to "기타" but the entry is flagged not-confident so the
//! caller can ask the user instead of silently booking it wrong.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::ChatbotError;
use crate::llm::LlmClient;
use crate::logging::{backend_info, backend_warn};

/// Fallback category: "기타".
const DEFAULT_CATEGORY_ID: &str = "14";

lazy_static! {
    /// Ledger category table: id → accepted Korean names.
    static ref CATEGORY_MAP: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("1", vec!["소득"]),
        ("2", vec!["저축 출금"]),
        ("3", vec!["차입"]),
        ("4", vec!["세금 · 공과금"]),
        ("5", vec!["식품", "식료품", "식비"]),
        ("6", vec!["주거"]),
        ("7", vec!["피복"]),
        ("8", vec!["보건위생"]),
        ("9", vec!["교육"]),
        ("10", vec!["여가 활동"]),
        ("11", vec!["교통"]),
        ("12", vec!["통신"]),
        ("13", vec!["효도"]),
        ("14", vec!["기타"]),
        ("15", vec!["특비"]),
        ("16", vec!["저축"]),
        ("17", vec!["차입금 상환"]),
    ];
}

/// A parsed receipt, ready to insert as a ledger record.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReceiptEntry {
    pub amount: String,
    pub reg_date: String,
    pub member_id: i64,
    pub category_id: String,
    pub category_name: String,
    /// False when the extracted category name did not match the table and
    /// the default was substituted.
    pub category_confident: bool,
    pub record_memo: String,
    pub record_details: String,
    pub del_yn: i64,
}

/// Raw JSON shape the oracle is asked to produce.
#[derive(Debug, Deserialize)]
struct ExtractedFields {
    #[serde(default)]
    amount: String,
    #[serde(default)]
    reg_date: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    memo: String,
    #[serde(default)]
    details: String,
}

/// Look up a category name in the fixed table.
pub fn map_category(name: &str) -> Option<&'static str> {
    let name = name.trim();
    CATEGORY_MAP
        .iter()
        .find(|(_, names)| names.contains(&name))
        .map(|(id, _)| *id)
}

fn category_names() -> String {
    CATEGORY_MAP
        .iter()
        .flat_map(|(_, names)| names.iter())
        .map(|s| *s)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt for the extraction pass.
pub fn build_receipt_prompt(ocr_text: &str) -> String {
    format!(
        r#"The text below was OCR-extracted from a receipt. Extract its fields as JSON.

OCR TEXT:
{ocr}

RULES:
- Output ONLY a JSON object, no markdown, no explanation
- Keys: "amount" (total amount as printed), "reg_date" (date and time, 'YYYY-MM-DD HH:MM:SS'), "category" (pick one: {categories}), "memo" (a short title for this purchase), "details" (one sentence inferring what the buyer did)
- Write memo and details in Korean"#,
        ocr = ocr_text,
        categories = category_names()
    )
}

/// Turn the oracle's JSON text into a `ReceiptEntry`.
pub fn entry_from_json(raw: &str) -> Result<ReceiptEntry, ChatbotError> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let fields: ExtractedFields = serde_json::from_str(cleaned)
        .map_err(|e| ChatbotError::Llm(format!("Receipt JSON parse error: {}", e)))?;

    let (category_id, category_confident) = match map_category(&fields.category) {
        Some(id) => (id.to_string(), true),
        None => {
            backend_warn(format!(
                "Unmapped receipt category '{}', falling back to 기타",
                fields.category
            ));
            (DEFAULT_CATEGORY_ID.to_string(), false)
        }
    };

    Ok(ReceiptEntry {
        amount: fields.amount,
        reg_date: fields.reg_date,
        member_id: 1,
        category_id,
        category_name: fields.category,
        category_confident,
        record_memo: fields.memo,
        record_details: fields.details,
        del_yn: 0,
    })
}

/// Parse OCR text into a structured entry via the oracle.
pub async fn parse_receipt(
    client: &LlmClient,
    ocr_text: &str,
) -> Result<ReceiptEntry, ChatbotError> {
    let prompt = build_receipt_prompt(ocr_text);
    let raw = client.generate(&prompt, &[]).await?;

    let entry = entry_from_json(&raw)?;
    backend_info(format!(
        "Receipt parsed: amount='{}' category={} confident={}",
        entry.amount, entry.category_id, entry.category_confident
    ));
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_category_aliases() {
        assert_eq!(map_category("식비"), Some("5"));
        assert_eq!(map_category("식료품"), Some("5"));
        assert_eq!(map_category("소득"), Some("1"));
        assert_eq!(map_category("차입금 상환"), Some("17"));
        assert_eq!(map_category("없는 카테고리"), None);
    }

    #[test]
    fn test_entry_from_plain_json() {
        let raw = r#"{"amount": "4,500원", "reg_date": "2026-07-15 12:30:00", "category": "식비", "memo": "김밥천국 점심", "details": "김밥천국에서 참치김밥으로 점심을 해결했어요."}"#;
        let entry = entry_from_json(raw).unwrap();
        assert_eq!(entry.category_id, "5");
        assert!(entry.category_confident);
        assert_eq!(entry.member_id, 1);
        assert_eq!(entry.del_yn, 0);
        assert_eq!(entry.record_memo, "김밥천국 점심");
    }

    #[test]
    fn test_entry_from_fenced_json() {
        let raw = "```json\n{\"amount\": \"12000\", \"reg_date\": \"2026-07-01 09:00:00\", \"category\": \"교통\", \"memo\": \"택시\", \"details\": \"택시를 탔어요.\"}\n```";
        let entry = entry_from_json(raw).unwrap();
        assert_eq!(entry.category_id, "11");
    }

    #[test]
    fn test_unmapped_category_flags_low_confidence() {
        let raw = r#"{"amount": "9900", "reg_date": "2026-07-02 20:00:00", "category": "구독서비스", "memo": "OTT", "details": "영상 구독을 결제했어요."}"#;
        let entry = entry_from_json(raw).unwrap();
        assert_eq!(entry.category_id, "14");
        assert!(!entry.category_confident);
        assert_eq!(entry.category_name, "구독서비스");
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(entry_from_json("total was 4500 won").is_err());
    }

    #[test]
    fn test_prompt_lists_categories_and_ocr_text() {
        let prompt = build_receipt_prompt("김밥천국 4,500원");
        assert!(prompt.contains("김밥천국 4,500원"));
        assert!(prompt.contains("식비"));
        assert!(prompt.contains("차입금 상환"));
        assert!(prompt.contains("\"reg_date\""));
    }
}
