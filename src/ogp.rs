use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dom::{self, ContentType, Selector, SelectorError};

const OG_IMAGE_SELECTOR: &str = "meta[property='og:image']";

/// Open Graph preview data for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OgpData {
    pub og_image: Option<String>,
}

/// Fetches `url` and reads its `og:image` meta tag.
///
/// Never fails: network errors, non-success statuses and pages without the
/// tag all come back as `og_image: None`, with a log line.
pub async fn fetch_ogp(client: &Client, url: &str) -> OgpData {
    match fetch_og_image(client, url).await {
        Ok(Some(image)) => OgpData {
            og_image: Some(image),
        },
        Ok(None) => {
            debug!("No og:image found for {}", url);
            OgpData::default()
        }
        Err(e) => {
            warn!("Error fetching OGP data for {}: {:#}", url, e);
            OgpData::default()
        }
    }
}

async fn fetch_og_image(client: &Client, url: &str) -> anyhow::Result<Option<String>> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Error fetching URL: {}", status);
    }

    let html = response.text().await?;
    Ok(extract_og_image(&html)?)
}

/// Reads the `content` attribute of the first `og:image` meta tag in `html`.
pub fn extract_og_image(html: &str) -> Result<Option<String>, SelectorError> {
    let selector = Selector::parse(OG_IMAGE_SELECTOR)?;
    let document = dom::parse(html, ContentType::Html);

    let image = document
        .query_selector(&selector)
        .and_then(|meta| meta.get_attribute("content"))
        .map(str::to_string);
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_with_image(image: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
            <html>
                <head>
                    <meta property="og:title" content="Article">
                    <meta property="og:image" content="{}">
                </head>
                <body><p>Hello</p></body>
            </html>"#,
            image
        )
    }

    mod extract_og_image_tests {
        use super::*;

        #[test]
        fn test_extract_image() {
            let html = page_with_image("https://x/1.png");
            assert_eq!(
                extract_og_image(&html).unwrap(),
                Some("https://x/1.png".to_string())
            );
        }

        #[test]
        fn test_first_tag_wins() {
            let html = r#"<head>
                <meta property="og:image" content="https://x/first.png">
                <meta property="og:image" content="https://x/second.png">
            </head>"#;
            assert_eq!(
                extract_og_image(html).unwrap(),
                Some("https://x/first.png".to_string())
            );
        }

        #[test]
        fn test_no_tag() {
            let html = "<html><head><title>No preview</title></head></html>";
            assert_eq!(extract_og_image(html).unwrap(), None);
        }

        #[test]
        fn test_name_attribute_is_not_property() {
            let html = r#"<meta name="og:image" content="https://x/1.png">"#;
            assert_eq!(extract_og_image(html).unwrap(), None);
        }

        #[test]
        fn test_tag_without_content() {
            let html = r#"<meta property="og:image">"#;
            assert_eq!(extract_og_image(html).unwrap(), None);
        }

        #[test]
        fn test_garbage_input() {
            assert_eq!(extract_og_image("<<<>>> not html &&&").unwrap(), None);
        }
    }

    mod fetch_ogp_tests {
        use super::*;

        #[tokio::test]
        async fn test_fetch_success() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/article"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(page_with_image("https://x/1.png")),
                )
                .expect(1)
                .mount(&server)
                .await;

            let client = Client::new();
            let data = fetch_ogp(&client, &format!("{}/article", server.uri())).await;
            assert_eq!(data.og_image, Some("https://x/1.png".to_string()));
        }

        #[tokio::test]
        async fn test_non_success_status_is_none() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/missing"))
                .respond_with(
                    ResponseTemplate::new(404).set_body_string(page_with_image("https://x/404.png")),
                )
                .expect(1)
                .mount(&server)
                .await;

            let client = Client::new();
            let data = fetch_ogp(&client, &format!("{}/missing", server.uri())).await;
            assert_eq!(data, OgpData::default());
        }

        #[tokio::test]
        async fn test_server_error_is_none() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let client = Client::new();
            let data = fetch_ogp(&client, &format!("{}/boom", server.uri())).await;
            assert_eq!(data.og_image, None);
        }

        #[tokio::test]
        async fn test_page_without_tag_is_none() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
                .mount(&server)
                .await;

            let client = Client::new();
            let data = fetch_ogp(&client, &server.uri()).await;
            assert_eq!(data.og_image, None);
        }

        #[tokio::test]
        async fn test_unreachable_host_is_none() {
            let client = Client::new();
            let data = fetch_ogp(&client, "http://127.0.0.1:1/unreachable").await;
            assert_eq!(data.og_image, None);
        }

        #[tokio::test]
        async fn test_invalid_url_is_none() {
            let client = Client::new();
            let data = fetch_ogp(&client, "not a url").await;
            assert_eq!(data.og_image, None);
        }
    }

    #[test]
    fn test_serializes_as_camel_case() {
        let json = serde_json::to_string(&OgpData { og_image: None }).unwrap();
        assert_eq!(json, r#"{"ogImage":null}"#);
    }
}
