//! Google Drive serves an HTML confirmation page instead of the file when it
//! can't virus-scan it. These helpers dig the real download link out of it.

use gv_core::{Error, Result};
use scraper::{Html, Selector};
use url::Url;

const DOWNLOAD_URL_KEY: &str = "\"downloadUrl\":\"";

/// Find the download link on a Drive confirmation page. `Ok(None)` when the page carries none.
pub fn resolve_download_url(page_url: &Url, page: &str) -> Result<Option<Url>> {
    let document = Html::parse_document(page);

    if let Some(url) = download_form_url(page_url, &document)? {
        return Ok(Some(url));
    }
    if let Some(url) = confirm_link_url(page_url, &document)? {
        return Ok(Some(url));
    }
    embedded_download_url(page)
}

fn join(base: &Url, href: &str) -> Result<Url> {
    base.join(href)
        .map_err(|e| Error::Fetch(format!("invalid download link {}: {}", href, e)))
}

fn download_form_url(page_url: &Url, document: &Html) -> Result<Option<Url>> {
    let (Ok(form_selector), Ok(input_selector)) = (
        Selector::parse("form#download-form"),
        Selector::parse("input[type='hidden']"),
    ) else {
        return Ok(None);
    };

    let Some(form) = document.select(&form_selector).next() else {
        return Ok(None);
    };
    let Some(action) = form.value().attr("action") else {
        return Ok(None);
    };

    let mut url = join(page_url, action)?;
    {
        let mut query = url.query_pairs_mut();
        for input in form.select(&input_selector) {
            if let (Some(name), Some(value)) = (input.value().attr("name"), input.value().attr("value")) {
                query.append_pair(name, value);
            }
        }
    }
    Ok(Some(url))
}

fn confirm_link_url(page_url: &Url, document: &Html) -> Result<Option<Url>> {
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Ok(None);
    };

    for link in document.select(&link_selector) {
        if let Some(href) = link.value().attr("href") {
            if href.contains("export=download") && href.contains("confirm=") {
                return join(page_url, href).map(Some);
            }
        }
    }
    Ok(None)
}

fn embedded_download_url(page: &str) -> Result<Option<Url>> {
    let Some(start) = page.find(DOWNLOAD_URL_KEY) else {
        return Ok(None);
    };
    let rest = &page[start + DOWNLOAD_URL_KEY.len()..];
    let Some(end) = rest.find('"') else {
        return Ok(None);
    };

    let raw = rest[..end]
        .replace("\\u003d", "=")
        .replace("\\u0026", "&")
        .replace("\\/", "/");
    Url::parse(&raw)
        .map(Some)
        .map_err(|e| Error::Fetch(format!("invalid embedded download URL {}: {}", raw, e)))
}
