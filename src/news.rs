//! news.rs — Finance news briefing.
//!
//! Scrapes the Naver news search results for headline links, picks one,
//! pulls the article body out of the page and has the oracle summarize it in
//! three casual lines. Errors are plain strings; the HTTP boundary turns
//! them into a 500.

use crate::llm::LlmClient;
use crate::logging::{backend_info, backend_warn};

const NAVER_SEARCH_URL: &str =
    "https://search.naver.com/search.naver?where=news&ie=utf8&sm=nws_hty&query=kb";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Article bodies longer than this are cut before prompting.
const MAX_ARTICLE_CHARS: usize = 4000;

#[derive(Debug, serde::Serialize)]
pub struct NewsSummary {
    pub url: String,
    pub response: String,
}

/// Headline links (`.news_tit` anchors) from a Naver news search page, in
/// page order.
pub fn extract_headline_links(html: &str) -> Vec<String> {
    let document = scraper::Html::parse_document(html);
    let Ok(selector) = scraper::Selector::parse(".news_tit") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| url::Url::parse(href).is_ok())
        .map(|href| href.to_string())
        .collect()
}

/// Strip tags and collapse whitespace when readability gives up.
pub fn clean_html_text(html: &str) -> String {
    let clean = regex_lite::Regex::new(r"<[^>]*>")
        .map(|re| re.replace_all(html, " ").to_string())
        .unwrap_or_else(|_| html.to_string());

    clean.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 1-based pick of a headline; out-of-range is an error like any other bad
/// input. `None` derives a rotating pick from the clock.
pub fn pick_headline(links: &[String], n: Option<usize>) -> Result<String, String> {
    if links.is_empty() {
        return Err("No headline links found on the search page".to_string());
    }
    let n = n.unwrap_or_else(|| {
        (chrono::Utc::now().timestamp_millis() as usize % links.len().min(5)) + 1
    });
    if n < 1 || n > links.len() {
        return Err(format!("Headline index {} out of range (1-{})", n, links.len()));
    }
    Ok(links[n - 1].clone())
}

/// Prompt for the summary pass (casual tone, three lines, emoji).
pub fn build_summary_prompt(article_text: &str) -> String {
    format!(
        "당신은 시사 상식 전문가입니다. 내용을 캐주얼한 톤앤 매너(존댓말)와 이모티콘을 추가해서 \
         시사 상식을 잘 모르는 사람도 알 수 있게 쉬운 설명으로 3줄로 요약해주세요:\n\"{}\"",
        article_text
    )
}

async fn fetch_page(url: &str) -> Result<String, String> {
    let client = reqwest::Client::new();
    let resp = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| format!("Fetch failed for {}: {}", url, e))?;

    if !resp.status().is_success() {
        return Err(format!("HTTP {} for {}", resp.status(), url));
    }

    resp.text()
        .await
        .map_err(|e| format!("Body read failed for {}: {}", url, e))
}

/// Extract the readable body of an article page.
pub fn extract_article_text(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url)
        .unwrap_or_else(|_| url::Url::parse("https://example.com").expect("static url"));
    let mut cursor = std::io::Cursor::new(html.to_string());

    let text = match readability::extractor::extract(&mut cursor, &parsed_url) {
        Ok(product) if !product.text.trim().is_empty() => product.text,
        Ok(_) => {
            backend_warn("Readability returned empty article body, stripping tags instead");
            clean_html_text(html)
        }
        Err(e) => {
            backend_warn(format!("Readability extraction failed: {}. Stripping tags.", e));
            clean_html_text(html)
        }
    };

    let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.len() > MAX_ARTICLE_CHARS {
        // cut on a char boundary
        let mut end = MAX_ARTICLE_CHARS;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Summarize the article behind `url` in three casual lines.
pub async fn summarize_url(client: &LlmClient, url: &str) -> Result<String, String> {
    let html = fetch_page(url).await?;
    let article = extract_article_text(&html, url);
    if article.trim().is_empty() {
        return Err(format!("No readable content at {}", url));
    }

    let summary = client
        .generate(&build_summary_prompt(&article), &[])
        .await
        .map_err(|e| e.to_string())?;

    if summary.trim().is_empty() {
        return Err("LLM returned an empty summary".to_string());
    }
    Ok(summary.trim().to_string())
}

/// Full briefing: search page → nth headline → article → summary.
pub async fn summarize_news(client: &LlmClient, n: Option<usize>) -> Result<NewsSummary, String> {
    let search_html = fetch_page(NAVER_SEARCH_URL).await?;
    let links = extract_headline_links(&search_html);
    let article_url = pick_headline(&links, n)?;

    backend_info(format!("Summarizing news article: {}", article_url));
    let response = summarize_url(client, &article_url).await?;

    Ok(NewsSummary {
        url: article_url,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"
        <html><body>
            <a class="news_tit" href="https://news.example.com/a1">금리 인하 전망</a>
            <a class="news_tit" href="https://news.example.com/a2">환율 급등</a>
            <a class="other" href="https://ads.example.com">광고</a>
            <a class="news_tit" href="not a url">깨진 링크</a>
        </body></html>"#;

    #[test]
    fn test_extract_headline_links_filters_and_orders() {
        let links = extract_headline_links(SEARCH_PAGE);
        assert_eq!(
            links,
            vec![
                "https://news.example.com/a1".to_string(),
                "https://news.example.com/a2".to_string(),
            ]
        );
    }

    #[test]
    fn test_pick_headline_bounds() {
        let links = vec!["https://a".to_string(), "https://b".to_string()];
        assert_eq!(pick_headline(&links, Some(2)).unwrap(), "https://b");
        assert!(pick_headline(&links, Some(0)).is_err());
        assert!(pick_headline(&links, Some(3)).is_err());
        assert!(pick_headline(&[], Some(1)).is_err());
        // clock-derived default stays in range
        let picked = pick_headline(&links, None).unwrap();
        assert!(links.contains(&picked));
    }

    #[test]
    fn test_clean_html_text() {
        let html = "<p>금리가  <strong>인하</strong>되었습니다.</p>";
        assert_eq!(clean_html_text(html), "금리가 인하 되었습니다.");
    }

    #[test]
    fn test_summary_prompt_wraps_article() {
        let prompt = build_summary_prompt("기사 본문");
        assert!(prompt.contains("3줄"));
        assert!(prompt.contains("\"기사 본문\""));
    }
}
