//! Thread materialization: expand a thread into its full page set and
//! extract every post.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{extract, ResilientClient, ScrapeError};
use crate::models::{PostBatch, RawPost};
use crate::utils::{retry, RetryPolicy};

static PAGE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\d+$").unwrap());

/// Fetch a thread and all of its pages, returning one flat batch of posts
/// tagged with the page each came from.
///
/// Pages are visited highest-numbered first (where the newest replies
/// live), then the thread's own URL, then the rest in ascending order.
/// A redirect storm abandons the remaining pages and returns whatever was
/// accumulated; overlap and re-fetches are harmless because persistence is
/// idempotent. Retried as a whole.
pub async fn materialize_thread(
    client: &ResilientClient,
    base_url: &str,
    thread_url: &str,
) -> Result<PostBatch, ScrapeError> {
    retry(&RetryPolicy::SCRAPE_OP, || {
        materialize_once(client, base_url, thread_url)
    })
    .await
}

async fn materialize_once(
    client: &ResilientClient,
    base_url: &str,
    thread_url: &str,
) -> Result<PostBatch, ScrapeError> {
    let first = match client.fetch(thread_url).await {
        Ok(page) => page,
        Err(err) if err.is_redirect_storm() => {
            debug!("redirect storm on {thread_url}; thread unreachable");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let pages = expand_pages(base_url, thread_url, &first.body);
    let mut batch = Vec::new();

    for page_url in &pages {
        match collect_page(client, page_url).await {
            Ok(posts) => batch.extend(posts),
            Err(ScrapeError::Fetch(err)) if err.is_redirect_storm() => {
                debug!("redirect storm on {page_url}; keeping partial thread");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(batch)
}

async fn collect_page(
    client: &ResilientClient,
    page_url: &str,
) -> Result<Vec<RawPost>, ScrapeError> {
    let page = client.fetch(page_url).await?;
    let posts = extract::posts(&page.body)?;
    Ok(posts
        .into_iter()
        .map(|post| RawPost {
            author: post.author,
            content: post.content,
            created_at: post.created_at,
            url: page_url.to_string(),
        })
        .collect())
}

/// Resolve a thread's title by re-fetching its canonical page.
pub async fn fetch_topic_title(
    client: &ResilientClient,
    thread_url: &str,
) -> Result<String, ScrapeError> {
    retry(&RetryPolicy::SCRAPE_OP, || title_once(client, thread_url)).await
}

async fn title_once(client: &ResilientClient, thread_url: &str) -> Result<String, ScrapeError> {
    let page = client.fetch(thread_url).await?;
    extract::title(&page.body)
}

/// Build the ordered visit sequence for a thread from its first page's
/// pagination controls.
pub fn expand_pages(base_url: &str, thread_url: &str, html: &str) -> Vec<String> {
    let mut pages = BTreeSet::new();
    pages.insert(thread_url.to_string());

    for (max_page, href) in extract::page_number_anchors(html) {
        let template = resolve_url(base_url, &href);
        for n in 2..=max_page {
            pages.insert(
                PAGE_SUFFIX
                    .replace(&template, format!("/{n}").as_str())
                    .into_owned(),
            );
        }
    }

    order_pages(pages)
}

/// Natural-sort the page set ascending, then rotate the highest page to
/// the front.
pub fn order_pages(pages: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut ordered: Vec<String> = pages.into_iter().collect();
    ordered.sort_by(|a, b| natural_cmp(a, b));
    ordered.dedup();

    if let Some(highest) = ordered.pop() {
        ordered.insert(0, highest);
    }
    ordered
}

/// Resolve a pagination href against the forum root, handling both
/// absolute and site-relative hrefs.
pub fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{base_url}{href}")
    }
}

/// String ordering that compares digit runs numerically, so
/// ".../page/10" sorts after ".../page/9".
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ac = a.chars().peekable();
    let mut bc = b.chars().peekable();

    loop {
        match (ac.peek().copied(), bc.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let nx = take_number(&mut ac);
                let ny = take_number(&mut bc);
                match nx.cmp(&ny) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {
                    ac.next();
                    bc.next();
                }
                other => return other,
            },
        }
    }
}

fn take_number(chars: &mut Peekable<Chars>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = chars.peek() {
        match c.to_digit(10) {
            Some(d) => {
                n = n.saturating_mul(10).saturating_add(d as u64);
                chars.next();
            }
            None => break,
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://forum.test/";
    const THREAD: &str = "https://forum.test/topic/deve-gowda";

    fn page(n: u32) -> String {
        format!("{THREAD}/page/{n}")
    }

    #[test]
    fn test_order_pages_highest_first_then_ascending() {
        let pages = vec![THREAD.to_string(), page(2), page(3), page(4)];
        let ordered = order_pages(pages);
        assert_eq!(ordered, vec![page(4), THREAD.to_string(), page(2), page(3)]);
    }

    #[test]
    fn test_order_pages_numeric_not_lexicographic() {
        let mut pages: Vec<String> = (2..=10).map(page).collect();
        pages.push(THREAD.to_string());
        let ordered = order_pages(pages);

        assert_eq!(ordered[0], page(10));
        assert_eq!(ordered[1], THREAD);
        let rest: Vec<String> = (2..=9).map(page).collect();
        assert_eq!(&ordered[2..], rest.as_slice());
    }

    #[test]
    fn test_expand_pages_synthesizes_from_href_template() {
        let html = format!(
            r#"<a class="page-numbers" href="{THREAD}/page/4">4</a>
               <a class="page-numbers" href="{THREAD}/page/2">2</a>"#
        );
        let expanded = expand_pages(BASE, THREAD, &html);
        assert_eq!(
            expanded,
            vec![page(4), THREAD.to_string(), page(2), page(3)]
        );
    }

    #[test]
    fn test_expand_pages_without_pagination() {
        let expanded = expand_pages(BASE, THREAD, "<html></html>");
        assert_eq!(expanded, vec![THREAD.to_string()]);
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(BASE, "topic/foo/page/2"),
            "https://forum.test/topic/foo/page/2"
        );
        assert_eq!(resolve_url(BASE, &page(2)), page(2));
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("page/9", "page/10"), Ordering::Less);
        assert_eq!(natural_cmp("page/10", "page/10"), Ordering::Equal);
        assert_eq!(natural_cmp("page/2", "page/10"), Ordering::Less);
    }
}
