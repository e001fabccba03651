use crate::classify::resolve_url;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static SCANNED_ELEMENTS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "a, div, section, title, main, article, span, p, img, meta, iframe, script, \
         h1, h2, h3, h4, h5, h6",
    )
    .expect("valid element selector")
});
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid img selector"));
static SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("valid script selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static SCRIPT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s'"]+"#).expect("valid script url regex"));
static SCRIPT_KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?(?:url|href)["']?\s*:\s*["']?(https?://[^\s'"]+)["']?"#)
        .expect("valid key-value regex")
});
static SCRIPT_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location\s*=\s*["']?(https?://[^\s'"]+)["']?"#)
        .expect("valid location regex")
});

const TEXT_ELEMENTS: &[&str] = &[
    "p", "div", "span", "title", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Something on a page worth handing to the keyword matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageItem {
    /// Any element with a non-empty `href`, resolved against the page.
    Link {
        element: String,
        url: String,
        text: String,
    },
    /// An anchor wrapping an image that carries alt text.
    ImageBanner { url: String, alt: String },
    /// Visible text of a paragraph, heading, container or title.
    Text { element: String, text: String },
    Meta { attribute: String, content: String },
    ImageAlt { alt: String },
    /// Value of a `data-*url*` / `data-*href*` attribute, taken verbatim.
    DataUrl { url: String },
    /// URL found in an inline script body.
    ScriptUrl { url: String },
}

/// An anchor as seen by the discovery heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub url: String,
    pub text: String,
}

/// Visible text with runs of whitespace collapsed to single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Walk the document in order and collect every scannable item. Inline
/// script URLs are appended after all element items.
pub fn extract_page_items(html: &str, page_url: &str) -> Vec<PageItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for element in document.select(&SCANNED_ELEMENTS) {
        extract_element(element, page_url, &mut items);
    }

    for script in document.select(&SCRIPT) {
        let body: String = script.text().collect();
        if body.trim().is_empty() {
            continue;
        }
        items.extend(
            script_urls(&body)
                .into_iter()
                .map(|url| PageItem::ScriptUrl { url }),
        );
    }

    items
}

fn extract_element(element: ElementRef<'_>, page_url: &str, items: &mut Vec<PageItem>) {
    let node = element.value();
    let name = node.name();

    let resolved_href = node
        .attr("href")
        .and_then(|href| resolve_url(page_url, href));

    if let Some(ref url) = resolved_href {
        items.push(PageItem::Link {
            element: name.to_string(),
            url: url.clone(),
            text: visible_text(element),
        });
    }

    if name == "a"
        && let Some(img) = element.select(&IMAGE).next()
        && let Some(alt) = img.value().attr("alt").map(str::trim)
        && !alt.is_empty()
        && let Some(ref url) = resolved_href
    {
        items.push(PageItem::ImageBanner {
            url: url.clone(),
            alt: alt.to_string(),
        });
    }

    if TEXT_ELEMENTS.contains(&name) {
        let text = visible_text(element);
        if !text.is_empty() {
            items.push(PageItem::Text {
                element: name.to_string(),
                text,
            });
        }
    }

    if name == "meta"
        && let Some(content) = node.attr("content").map(str::trim)
        && !content.is_empty()
    {
        let attribute = node
            .attr("name")
            .filter(|v| !v.is_empty())
            .or_else(|| node.attr("property").filter(|v| !v.is_empty()))
            .unwrap_or("meta");
        items.push(PageItem::Meta {
            attribute: attribute.to_string(),
            content: content.to_string(),
        });
    }

    if name == "img"
        && let Some(alt) = node.attr("alt").map(str::trim)
        && !alt.is_empty()
    {
        items.push(PageItem::ImageAlt {
            alt: alt.to_string(),
        });
    }

    for (attr, value) in node.attrs() {
        let attr = attr.to_lowercase();
        if attr.starts_with("data-") && (attr.contains("url") || attr.contains("href")) {
            let value = value.trim();
            if !value.is_empty() {
                items.push(PageItem::DataUrl {
                    url: value.to_string(),
                });
            }
        }
    }
}

/// Literal URLs in a script body, followed by the captures of the
/// `url:`/`href:` and `window.location =` patterns.
pub fn script_urls(body: &str) -> Vec<String> {
    let mut urls: Vec<String> = SCRIPT_URL
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect();

    for regex in [&*SCRIPT_KEY_VALUE, &*SCRIPT_LOCATION] {
        urls.extend(
            regex
                .captures_iter(body)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }

    urls
}

/// Every `a[href]` in document order, resolved against `base`.
pub fn extract_anchors(html: &str, base: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_url(base, href)?;
            Some(Anchor {
                href: href.trim().to_string(),
                url,
                text: visible_text(element),
            })
        })
        .collect()
}
