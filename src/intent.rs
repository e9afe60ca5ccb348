//! intent.rs — Lightweight keyword routing for inbound questions.
//!
//! A pre-filter only: the LLM does the real work downstream. Ledger wording
//! (Korean or English) routes to the SQL pipeline, news wording to the
//! briefing scraper, everything else to plain chat.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Question about the household ledger — goes through text-to-SQL.
    LedgerQuery,
    /// Request for a news briefing.
    NewsBriefing,
    /// Anything else; answered conversationally without touching the store.
    SmallTalk,
}

/// Classify a question by keywords.
pub fn detect_intent(question: &str) -> Intent {
    let q = question.to_lowercase();

    // Ledger / money keywords
    if q.contains("썼") || q.contains("지출") || q.contains("수입")
        || q.contains("얼마") || q.contains("가계부") || q.contains("자산")
        || q.contains("저축") || q.contains("내역") || q.contains("기록")
        || q.contains("카테고리") || q.contains("예산")
        || q.contains("spent") || q.contains("spend") || q.contains("expense")
        || q.contains("income") || q.contains("ledger") || q.contains("budget")
        || q.contains("asset") || q.contains("saving")
    {
        return Intent::LedgerQuery;
    }

    // News keywords
    if q.contains("뉴스") || q.contains("기사") || q.contains("시사")
        || q.contains("헤드라인")
        || q.contains("news") || q.contains("article") || q.contains("headline")
    {
        return Intent::NewsBriefing;
    }

    Intent::SmallTalk
}
