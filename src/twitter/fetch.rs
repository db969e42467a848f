// src/twitter/fetch.rs
// =============================================================================
// The real Transport: reqwest against the platform's web API.
//
// Endpoints:
// - search:       https://api.twitter.com/2/search/adaptive.json
// - conversation: https://api.twitter.com/2/timeline/conversation/{id}.json
//
// Both take the same long list of query flags the web client sends, plus an
// optional `cursor` for the next page. Responses are read as text and parsed
// with serde_json ourselves so a bad body is reported as a payload error
// rather than a transport one.
//
// Every request goes through one Client built with a hard timeout, so a
// stalled connection can't hang a worker (and with it, shutdown) forever.
// =============================================================================

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::debug;

use super::payload::RawPage;
use super::tokens::{self, HOME_URL, USER_AGENT};
use super::{CredentialSet, Transport};
use crate::error::{CrawlError, Result};

const SEARCH_URL: &str = "https://api.twitter.com/2/search/adaptive.json";
const CONVERSATION_URL: &str = "https://api.twitter.com/2/timeline/conversation";

// Query flags shared by the search and conversation endpoints
const COMMON_PARAMS: &[(&str, &str)] = &[
    ("include_profile_interstitial_type", "1"),
    ("include_blocking", "1"),
    ("include_blocked_by", "1"),
    ("include_followed_by", "1"),
    ("include_want_retweets", "1"),
    ("include_mute_edge", "1"),
    ("include_can_dm", "1"),
    ("include_can_media_tag", "1"),
    ("skip_status", "1"),
    ("cards_platform", "Web-12"),
    ("include_cards", "1"),
    ("include_composer_source", "true"),
    ("include_ext_alt_text", "true"),
    ("include_reply_count", "1"),
    ("tweet_mode", "extended"),
    ("include_entities", "true"),
    ("include_user_entities", "true"),
    ("include_ext_media_color", "true"),
    ("include_ext_media_availability", "true"),
    ("send_error_codes", "true"),
    ("simple_quoted_tweets", "true"),
    ("ext", "mediaStats,highlightedLabel,cameraMoment"),
];

// Extra flags only the search endpoint takes (besides q)
const SEARCH_PARAMS: &[(&str, &str)] = &[
    ("count", "20"),
    ("query_source", "typed_query"),
    ("pc", "1"),
    ("spelling_corrections", "1"),
];

pub struct HttpTransport {
    client: Client,
    lang: String,
}

impl HttpTransport {
    // Creates the transport
    //
    // Parameters:
    //   timeout: hard limit for every single request
    //   lang: client language sent with every request (e.g. "en")
    pub fn new(timeout: Duration, lang: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            lang: lang.to_string(),
        })
    }

    // Adds the headers every authenticated API call needs
    fn authorize(&self, request: RequestBuilder, credentials: &CredentialSet) -> RequestBuilder {
        request
            .header("authorization", format!("Bearer {}", credentials.access_token))
            .header("x-csrf-token", &credentials.csrf_token)
            .header("x-guest-token", &credentials.guest_token)
            .header("x-twitter-active-user", "yes")
            .header("x-twitter-client-language", &self.lang)
            .header("origin", "https://twitter.com")
            .header("accept", "*/*")
            .header("user-agent", USER_AGENT)
    }

    // Sends the request and parses the body as a page
    async fn fetch_page(&self, request: RequestBuilder) -> Result<RawPage> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(CrawlError::Transport {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        let body = response.text().await?;
        RawPage::from_json(&body)
    }
}

// Appends the optional cursor to a parameter list
fn with_cursor<'a>(mut params: Vec<(&'a str, &'a str)>, cursor: Option<&'a str>) -> Vec<(&'a str, &'a str)> {
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor));
    }
    params
}

// Referer the web client sends from the search results page
fn search_referer(keyword: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    format!("{}search?q={}&src=typed_query", HOME_URL, encoded)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn acquire_credentials(&self) -> Result<CredentialSet> {
        let html = tokens::fetch_home_page(&self.client, &self.lang).await?;

        let script_url = tokens::find_main_script_url(&html, HOME_URL).ok_or_else(|| {
            CrawlError::CredentialFetch("main script link not found on home page".to_string())
        })?;
        debug!(url = %script_url, "Found main script");

        let script = tokens::fetch_main_script(&self.client, &script_url).await?;
        let access_token = tokens::extract_access_token(&script).ok_or_else(|| {
            CrawlError::CredentialFetch("bearer token not found in main script".to_string())
        })?;

        let csrf_token = tokens::generate_csrf_token();
        let guest_token =
            tokens::fetch_guest_token(&self.client, &access_token, &csrf_token, &self.lang).await?;

        Ok(CredentialSet {
            access_token,
            csrf_token,
            guest_token,
            issued_at: Instant::now(),
        })
    }

    async fn search_page(
        &self,
        keyword: &str,
        credentials: &CredentialSet,
        cursor: Option<&str>,
    ) -> Result<RawPage> {
        let mut params = COMMON_PARAMS.to_vec();
        params.push(("q", keyword));
        params.extend_from_slice(SEARCH_PARAMS);
        let params = with_cursor(params, cursor);

        let request = self
            .client
            .get(SEARCH_URL)
            .query(&params)
            .header("referer", search_referer(keyword));

        self.fetch_page(self.authorize(request, credentials)).await
    }

    async fn item_page(
        &self,
        id: &str,
        credentials: &CredentialSet,
        cursor: Option<&str>,
    ) -> Result<RawPage> {
        let params = with_cursor(COMMON_PARAMS.to_vec(), cursor);
        let url = format!("{}/{}.json", CONVERSATION_URL, id);

        let request = self
            .client
            .get(&url)
            .query(&params)
            .header("referer", format!("{}i/status/{}", HOME_URL, id));

        self.fetch_page(self.authorize(request, credentials)).await
    }
}
