// src/twitter/tokens.rs
// =============================================================================
// Acquires the tokens an anonymous browser session uses.
//
// Steps:
// 1. Fetch the home page HTML
// 2. Find the <link as="script"> pointing at main.<hash>.js
// 3. Fetch that script and pull the bearer token out of it with a regex
// 4. Make up a CSRF token the same way the web client does
// 5. POST to guest/activate.json to get a guest token
//
// Each step that can fail returns a CredentialFetch error naming the step,
// so a log line tells you exactly where the flow broke.
// =============================================================================

use rand::Rng;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::OnceLock;
use url::Url;

use crate::error::{CrawlError, Result};

pub(super) const HOME_URL: &str = "https://twitter.com/";
const GUEST_ACTIVATE_URL: &str = "https://api.twitter.com/1.1/guest/activate.json";
pub(super) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36";

fn main_script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^main\..+\.js$").expect("main script pattern is valid"))
}

fn bearer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""(AAAAAAAAAAAAAAAAAAAAA[^"]+)""#).expect("bearer pattern is valid")
    })
}

// Fetches the home page HTML
pub(super) async fn fetch_home_page(client: &Client, lang: &str) -> Result<String> {
    let response = client
        .get(HOME_URL)
        .query(&[("lang", lang)])
        .header("user-agent", USER_AGENT)
        .header(
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await
        .map_err(|e| CrawlError::CredentialFetch(format!("home page: {}", e)))?;

    if !response.status().is_success() {
        return Err(CrawlError::CredentialFetch(format!(
            "home page: HTTP {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| CrawlError::CredentialFetch(format!("home page body: {}", e)))
}

// Finds the absolute URL of the main script in the home page HTML
//
// Parameters:
//   html: the home page
//   page_url: where the page came from (for resolving relative hrefs)
//
// Returns: None if no <link as="script"> points at a main.*.js file
pub(super) fn find_main_script_url(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"link[as="script"]"#).ok()?;
    let base = Url::parse(page_url).ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .find(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(|file| main_script_pattern().is_match(file))
                .unwrap_or(false)
        })
        .map(|url| url.to_string())
}

// Downloads the main script source
pub(super) async fn fetch_main_script(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header("referer", HOME_URL)
        .header("origin", "https://twitter.com")
        .header("user-agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| CrawlError::CredentialFetch(format!("main script: {}", e)))?;

    if !response.status().is_success() {
        return Err(CrawlError::CredentialFetch(format!(
            "main script: HTTP {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| CrawlError::CredentialFetch(format!("main script body: {}", e)))
}

// Pulls the bearer token out of the main script source
pub(super) fn extract_access_token(script: &str) -> Option<String> {
    bearer_pattern()
        .captures(script)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

// Builds a CSRF token like the web client does: 32 random bytes, keeping
// only the last hex digit of each
pub(super) fn generate_csrf_token() -> String {
    let mut rng = rand::rng();
    (0..32)
        .map(|_| {
            let byte: u8 = rng.random();
            let hex = format!("{:x}", byte);
            hex.chars().last().unwrap_or('0')
        })
        .collect()
}

#[derive(Deserialize)]
struct GuestActivation {
    guest_token: String,
}

// Activates a guest session and returns the guest token
pub(super) async fn fetch_guest_token(
    client: &Client,
    access_token: &str,
    csrf_token: &str,
    lang: &str,
) -> Result<String> {
    let response = client
        .post(GUEST_ACTIVATE_URL)
        .header("authorization", format!("Bearer {}", access_token))
        .header("x-csrf-token", csrf_token)
        .header("x-twitter-client-language", lang)
        .header("x-twitter-active-user", "yes")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("origin", "https://twitter.com")
        .header("user-agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| CrawlError::CredentialFetch(format!("guest activation: {}", e)))?;

    if !response.status().is_success() {
        return Err(CrawlError::CredentialFetch(format!(
            "guest activation: HTTP {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| CrawlError::CredentialFetch(format!("guest activation body: {}", e)))?;

    serde_json::from_str::<GuestActivation>(&body)
        .map(|activation| activation.guest_token)
        .map_err(|e| CrawlError::CredentialFetch(format!("guest activation: {}", e)))
}
