//! Notion content source.
//!
//! Starting from a set of root pages, every page is fetched together with
//! its text content, then its child pages are visited depth-first in the
//! order they appear. A page reachable from several places is visited once.

use std::collections::HashSet;

use futures::FutureExt;
use futures::future::BoxFuture;
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::document::Document;
use crate::error::SourceError;
use crate::source::{ContentSource, DocumentStream};

/// Default Notion API endpoint.
pub const NOTION_API_URL: &str = "https://api.notion.com";

/// API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

const PAGE_SIZE: &str = "100";

/// Fetches pages and their descendants from the Notion API.
pub struct NotionSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    root_pages: Vec<String>,
}

impl NotionSource {
    /// Create a source for the given integration key and root pages.
    ///
    /// Root pages may be page URLs or ids.
    pub fn new(api_key: impl Into<String>, root_pages: Vec<String>) -> Result<Self, SourceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SourceError::NotConfigured(
                "NOTION_API_KEY is not set".to_string(),
            ));
        }
        if root_pages.is_empty() {
            return Err(SourceError::NotConfigured(
                "no root pages configured".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: NOTION_API_URL.to_string(),
            root_pages,
        })
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self
            .client
            .get(format!("{}/v1/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Transport(format!("{path}: {status}: {body}")));
        }

        Ok(response.json().await?)
    }

    /// List every child block of `block_id`, following pagination.
    async fn list_children(&self, block_id: &str) -> Result<Vec<Value>, SourceError> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(cursor) = &cursor {
                query.push(("start_cursor", cursor.clone()));
            }

            let page: BlockChildren = self
                .get_json(&format!("blocks/{block_id}/children"), &query)
                .await?;
            blocks.extend(page.results);

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    /// Collect the text of a block tree and the child pages found in it.
    fn page_content<'a>(&'a self, block_id: &'a str) -> BoxFuture<'a, Result<PageContent, SourceError>> {
        async move {
            let blocks = self.list_children(block_id).await?;
            let mut texts = Vec::new();
            let mut child_pages = Vec::new();

            for block in &blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("child_page") => {
                        if let Some(id) = block.get("id").and_then(Value::as_str) {
                            child_pages.push(id.to_string());
                        }
                        continue;
                    }
                    Some("child_database") => continue,
                    _ => {}
                }

                let text = extract_text_from_block(block);
                if !text.is_empty() {
                    texts.push(text);
                }

                let has_children = block
                    .get("has_children")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if let (true, Some(id)) = (has_children, block.get("id").and_then(Value::as_str)) {
                    let nested = self.page_content(id).await?;
                    if !nested.text.is_empty() {
                        texts.push(nested.text);
                    }
                    child_pages.extend(nested.child_pages);
                }
            }

            Ok(PageContent {
                text: texts.join("\n"),
                child_pages,
            })
        }
        .boxed()
    }

    /// Fetch one page. Returns `None` for the document when it has no text.
    async fn fetch_page(
        &self,
        page_id: &str,
    ) -> Result<(Option<Document>, Vec<String>), SourceError> {
        let page: Value = self.get_json(&format!("pages/{page_id}"), &[]).await?;
        let title = page_title(&page);
        let url = page
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let last_edited = page
            .get("last_edited_time")
            .and_then(Value::as_str)
            .map(str::to_string);

        let content = self.page_content(page_id).await?;
        debug!(
            "Fetched page {title} ({page_id}), {} child pages",
            content.child_pages.len()
        );

        let document = (!content.text.trim().is_empty()).then(|| Document {
            source_id: page_id.to_string(),
            title,
            url,
            last_edited,
            text: content.text,
        });

        Ok((document, content.child_pages))
    }
}

impl ContentSource for NotionSource {
    fn name(&self) -> &str {
        "notion"
    }

    fn fetch_all(&self) -> DocumentStream<'_> {
        Box::pin(async_stream::stream! {
            let mut visited = HashSet::new();

            for root in &self.root_pages {
                let root_id = match parse_page_id(root) {
                    Ok(id) => id,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };
                info!("Fetching Notion pages under {root_id}");

                let mut pending = vec![root_id];
                while let Some(page_id) = pending.pop() {
                    if !visited.insert(page_id.replace('-', "")) {
                        continue;
                    }

                    match self.fetch_page(&page_id).await {
                        Ok((document, children)) => {
                            pending.extend(children.into_iter().rev());
                            if let Some(document) = document {
                                yield Ok(document);
                            }
                        }
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct BlockChildren {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

struct PageContent {
    text: String,
    child_pages: Vec<String>,
}

/// Extract a page id from a Notion URL, or normalize a bare id.
pub fn parse_page_id(url_or_id: &str) -> Result<String, SourceError> {
    let trimmed = url_or_id.trim();

    let undashed = trimmed.replace('-', "");
    if (32..=36).contains(&undashed.len())
        && undashed
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Ok(undashed);
    }

    let embedded = Regex::new(r"([a-f0-9]{32})(?:\?|$)")
        .map_err(|e| SourceError::InvalidPageId(e.to_string()))?;
    if let Some(id) = embedded.captures(trimmed).and_then(|c| c.get(1)) {
        return Ok(id.as_str().to_string());
    }

    let hex: Vec<char> = trimmed
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect();
    if hex.len() >= 32 {
        return Ok(hex[hex.len() - 32..].iter().collect());
    }

    Err(SourceError::InvalidPageId(url_or_id.to_string()))
}

/// Extract the plain text of a single block.
pub fn extract_text_from_block(block: &Value) -> String {
    let Some(block_type) = block.get("type").and_then(Value::as_str) else {
        return String::new();
    };
    let data = block.get(block_type);

    match block_type {
        "child_page" | "child_database" => String::new(),
        "equation" => data
            .and_then(|d| d.get("expression"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "code" => {
            let code = rich_text(data.and_then(|d| d.get("rich_text")));
            let language = data
                .and_then(|d| d.get("language"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("```{language}\n{code}\n```")
        }
        _ => rich_text(data.and_then(|d| d.get("rich_text"))),
    }
}

/// Extract a page's title, falling back to "Untitled".
pub fn page_title(page: &Value) -> String {
    let Some(properties) = page.get("properties").and_then(Value::as_object) else {
        return "Untitled".to_string();
    };

    let title_of = |prop: &Value| {
        if prop.get("type").and_then(Value::as_str) != Some("title") {
            return None;
        }
        let text = rich_text(prop.get("title"));
        (!text.is_empty()).then_some(text)
    };

    ["title", "Title", "Name", "name"]
        .iter()
        .filter_map(|key| properties.get(*key))
        .find_map(title_of)
        .or_else(|| properties.values().find_map(title_of))
        .unwrap_or_else(|| "Untitled".to_string())
}

fn rich_text(items: Option<&Value>) -> String {
    items
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ID: &str = "2dfc9c6bdc62803f9ad6fc5f3ec30a34";

    #[test]
    fn test_parse_bare_and_dashed_ids() {
        assert_eq!(parse_page_id(ID).unwrap(), ID);
        assert_eq!(
            parse_page_id("2dfc9c6b-dc62-803f-9ad6-fc5f3ec30a34").unwrap(),
            ID
        );
    }

    #[test]
    fn test_parse_id_from_url() {
        let url = format!("https://www.notion.so/baymac/Workout-{ID}");
        assert_eq!(parse_page_id(&url).unwrap(), ID);

        let with_query = format!("https://www.notion.so/Workout-{ID}?pvs=4");
        assert_eq!(parse_page_id(&with_query).unwrap(), ID);
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(matches!(
            parse_page_id("https://www.notion.so/nothing-here"),
            Err(SourceError::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_extract_paragraph_text() {
        let block = json!({
            "type": "paragraph",
            "paragraph": {"rich_text": [{"plain_text": "Hello "}, {"plain_text": "world"}]}
        });
        assert_eq!(extract_text_from_block(&block), "Hello world");
    }

    #[test]
    fn test_extract_code_and_equation() {
        let code = json!({
            "type": "code",
            "code": {"language": "rust", "rich_text": [{"plain_text": "fn main() {}"}]}
        });
        assert_eq!(extract_text_from_block(&code), "```rust\nfn main() {}\n```");

        let equation = json!({"type": "equation", "equation": {"expression": "e=mc^2"}});
        assert_eq!(extract_text_from_block(&equation), "e=mc^2");
    }

    #[test]
    fn test_child_page_has_no_text() {
        let block = json!({"type": "child_page", "child_page": {"title": "Sub"}});
        assert_eq!(extract_text_from_block(&block), "");
        assert_eq!(extract_text_from_block(&json!({})), "");
    }

    #[test]
    fn test_page_title_lookup() {
        let page = json!({
            "properties": {
                "Name": {"type": "title", "title": [{"plain_text": "Workout"}]}
            }
        });
        assert_eq!(page_title(&page), "Workout");

        let custom = json!({
            "properties": {
                "Tags": {"type": "multi_select"},
                "Headline": {"type": "title", "title": [{"plain_text": "Legs"}]}
            }
        });
        assert_eq!(page_title(&custom), "Legs");

        assert_eq!(page_title(&json!({"properties": {}})), "Untitled");
    }

    #[test]
    fn test_requires_key_and_roots() {
        assert!(matches!(
            NotionSource::new("", vec![ID.to_string()]),
            Err(SourceError::NotConfigured(_))
        ));
        assert!(matches!(
            NotionSource::new("secret", Vec::new()),
            Err(SourceError::NotConfigured(_))
        ));
    }
}
