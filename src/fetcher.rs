use std::io::Write;

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::db::{Media, MediaStore};
use crate::dom::{self, ContentType, Document, Element, Selector};
use crate::error::FetchError;
use crate::ogp::{fetch_ogp, OgpData};

const NO_TITLE: &str = "No title";
const NO_DESCRIPTION: &str = "No description";
const NO_DATE: &str = "No date";

/// The JSON document printed for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResult {
    pub media_id: i64,
    pub feed: FeedMeta,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
    pub og_image: Option<String>,
}

/// Item fields read from the feed, before the OGP lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

impl ItemFields {
    fn into_item(self, ogp: OgpData) -> FeedItem {
        FeedItem {
            title: self.title,
            link: self.link,
            description: self.description,
            pub_date: self.pub_date,
            og_image: ogp.og_image,
        }
    }
}

/// The eight media selectors of one media entry, compiled.
pub struct FeedSelectors {
    feed_title: Selector,
    feed_desc: Selector,
    feed_last_updated: Selector,
    item: Selector,
    item_title: Selector,
    item_link: Selector,
    item_desc: Selector,
    item_pubdate: Selector,
}

impl FeedSelectors {
    pub fn compile(media: &Media) -> Result<Self, FetchError> {
        let parse = Selector::parse;

        Ok(Self {
            feed_title: parse(&media.feed_title_selector)?,
            feed_desc: parse(&media.feed_desc_selector)?,
            feed_last_updated: parse(&media.feed_last_updated_selector)?,
            item: parse(&media.item_selector)?,
            item_title: parse(&media.item_title_selector)?,
            item_link: parse(&media.item_link_selector)?,
            item_desc: parse(&media.item_desc_selector)?,
            item_pubdate: parse(&media.item_pubdate_selector)?,
        })
    }

    /// Reads the fields of every item element, in document order.
    pub fn extract_items(&self, document: &Document) -> Vec<ItemFields> {
        document
            .query_selector_all(&self.item)
            .iter()
            .map(|item| ItemFields {
                title: item_text(item, &self.item_title),
                link: item_text(item, &self.item_link),
                description: item_text(item, &self.item_desc),
                pub_date: item_text(item, &self.item_pubdate),
            })
            .collect()
    }

    pub fn extract_meta(&self, document: &Document) -> FeedMeta {
        FeedMeta {
            title: document_text(document, &self.feed_title, NO_TITLE),
            description: document_text(document, &self.feed_desc, NO_DESCRIPTION),
            last_updated: document_text(document, &self.feed_last_updated, NO_DATE),
        }
    }
}

fn non_empty_text(element: Option<Element<'_>>) -> Option<String> {
    element
        .and_then(|e| e.text_content())
        .filter(|text| !text.is_empty())
}

fn item_text(item: &Element<'_>, selector: &Selector) -> String {
    non_empty_text(item.query_selector(selector)).unwrap_or_default()
}

fn document_text(document: &Document, selector: &Selector, fallback: &str) -> String {
    non_empty_text(document.query_selector(selector)).unwrap_or_else(|| fallback.to_string())
}

pub struct Fetcher {
    client: Client,
    content_type: ContentType,
}

impl Fetcher {
    pub fn new(content_type: ContentType) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, content_type))
    }

    pub fn with_client(client: Client, content_type: ContentType) -> Self {
        Self {
            client,
            content_type,
        }
    }

    /// Runs the whole pipeline for `feed_url` and returns the assembled feed.
    pub async fn fetch_feed<S: MediaStore>(
        &self,
        store: &S,
        feed_url: &str,
    ) -> Result<FeedResult, FetchError> {
        let url = Url::parse(feed_url)?;
        let hostname = url
            .host_str()
            .ok_or_else(|| FetchError::MissingHostname(feed_url.to_string()))?
            .to_string();

        let media = store
            .lookup(&hostname)
            .await?
            .ok_or(FetchError::MediaNotFound { hostname })?;
        let selectors = FeedSelectors::compile(&media)?;

        info!("Fetching feed: {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::FeedStatus(status.to_string()));
        }
        let body = response.text().await?;

        let (fields, meta) = {
            let document = dom::parse(&body, self.content_type);
            (
                selectors.extract_items(&document),
                selectors.extract_meta(&document),
            )
        };
        info!("Found {} items, looking up OGP data", fields.len());

        let client = &self.client;
        let items = join_all(fields.into_iter().map(|fields| async move {
            let ogp = if fields.link.is_empty() {
                OgpData::default()
            } else {
                fetch_ogp(client, &fields.link).await
            };
            fields.into_item(ogp)
        }))
        .await;

        Ok(FeedResult {
            media_id: media.id,
            feed: meta,
            items,
        })
    }
}

/// Fetches the feed once and prints it as pretty JSON to `out`.
///
/// Failures are logged rather than returned, and nothing is written to `out`
/// for a failed run. The store is released exactly once on every path.
pub async fn run<S: MediaStore, W: Write>(
    fetcher: &Fetcher,
    store: &S,
    feed_url: &str,
    out: &mut W,
) {
    match fetcher.fetch_feed(store, feed_url).await {
        Ok(feed) => {
            if let Err(e) = print_feed(&feed, out) {
                error!("Error: {}", e);
            }
        }
        Err(e) => error!("Error: {}", e),
    }

    store.release().await;
}

fn print_feed<W: Write>(feed: &FeedResult, out: &mut W) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(feed)?;
    writeln!(out, "{}", json)?;
    out.flush()?;
    Ok(())
}
