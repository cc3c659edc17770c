//! Markup queries against the forum's HTML conventions.
//!
//! Everything here is synchronous: pages are fetched elsewhere, parsed
//! here, and only owned data leaves (parsed documents never cross an
//! await point).
//!
//! Site conventions: the index lists threads in `table#latest`, one `tr`
//! per thread with the last-activity label in a `td.num.l` link and
//! pagination in `a.page-numbers`; thread pages carry posts in `div.post`
//! with the author in a sibling `div.threadauthor small` and the post time
//! inside `div.poststuff`; the title lives in `h2.topictitle`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use super::timeparse::parse_relative_label;
use super::ScrapeError;
use crate::models::ThreadRef;

static LATEST_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#latest").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static PAGE_NUMBERS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.page-numbers").unwrap());
static POST_DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.post").unwrap());
static POST_STUFF: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.poststuff").unwrap());
static THREAD_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.threadauthor small").unwrap());
static TOPIC_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.topictitle").unwrap());

/// A post pulled out of a thread page, not yet tagged with its page URL.
#[derive(Debug, Clone)]
pub struct ExtractedPost {
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Parse the index listing into thread references. Rows lacking a
/// qualifying link are skipped; a missing listing table yields an empty
/// set (the last index pages render without one).
pub fn thread_rows(html: &str) -> Result<Vec<ThreadRef>, ScrapeError> {
    let doc = Html::parse_document(html);
    let mut refs = Vec::new();

    let Some(table) = doc.select(&LATEST_TABLE).next() else {
        return Ok(refs);
    };

    for row in table.select(&ROW) {
        let mut last_update = None;
        let mut page_count: u32 = 1;
        let mut link: Option<String> = None;

        for cell in row.select(&CELL) {
            let classes: Vec<&str> = cell.value().classes().collect();

            if classes.contains(&"num") && classes.contains(&"l") {
                let label = cell
                    .select(&ANCHOR)
                    .next()
                    .ok_or_else(|| {
                        ScrapeError::Markup("last-activity cell without a link".into())
                    })?
                    .text()
                    .collect::<String>();
                let label = label.trim();
                last_update = Some(
                    parse_relative_label(label)
                        .ok_or_else(|| ScrapeError::RelativeTime(label.to_string()))?,
                );
            } else if classes.is_empty() {
                for anchor in cell.select(&ANCHOR) {
                    let anchor_classes: Vec<&str> = anchor.value().classes().collect();

                    if anchor_classes == ["page-numbers"] {
                        let text = anchor.text().collect::<String>();
                        if let Some(n) = parse_listed_page_number(&text) {
                            page_count = page_count.max(n);
                        }
                    } else if anchor_classes.is_empty()
                        && anchor.value().attr("title").is_none()
                        && link.is_none()
                    {
                        link = anchor.value().attr("href").map(|href| href.to_string());
                    }
                }
            }
        }

        if let Some(link) = link {
            let last_update = last_update.ok_or_else(|| {
                ScrapeError::Markup(format!("thread row for {link} lacks a last-activity label"))
            })?;
            refs.push(ThreadRef {
                link,
                last_update,
                page_count,
            });
        }
    }

    Ok(refs)
}

/// Extract the posts on one thread page.
pub fn posts(html: &str) -> Result<Vec<ExtractedPost>, ScrapeError> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    for post_el in doc.select(&POST_DIV) {
        let thread_post = parent_element(post_el)
            .ok_or_else(|| ScrapeError::Markup("post without enclosing container".into()))?;

        let label = thread_post
            .select(&POST_STUFF)
            .next()
            .ok_or_else(|| ScrapeError::Markup("post without a poststuff block".into()))?
            .text()
            .collect::<String>();
        let label = label.trim();
        let created_at = parse_relative_label(label)
            .ok_or_else(|| ScrapeError::RelativeTime(label.to_string()))?;

        let author = parent_element(thread_post)
            .and_then(|scope| scope.select(&THREAD_AUTHOR).next())
            .ok_or_else(|| ScrapeError::Markup("post without a threadauthor block".into()))?
            .text()
            .collect::<String>();

        out.push(ExtractedPost {
            author,
            content: post_el.text().collect::<String>(),
            created_at,
        });
    }

    Ok(out)
}

/// Numeric pagination anchors on a thread page: (page number, href).
/// Anchors whose text is not purely digits ("next", arrows) are ignored.
pub fn page_number_anchors(html: &str) -> Vec<(u32, String)> {
    let doc = Html::parse_document(html);
    let mut anchors = Vec::new();

    for anchor in doc.select(&PAGE_NUMBERS) {
        let text = anchor.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if let (Ok(n), Some(href)) = (text.parse::<u32>(), anchor.value().attr("href")) {
            anchors.push((n, href.to_string()));
        }
    }

    anchors
}

/// Read a thread's title.
pub fn title(html: &str) -> Result<String, ScrapeError> {
    let doc = Html::parse_document(html);
    doc.select(&TOPIC_TITLE)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| ScrapeError::Markup("page has no topic title".into()))
}

/// Index pagination numbers carry thousands separators ("1,234").
fn parse_listed_page_number(text: &str) -> Option<u32> {
    text.trim().replace(',', "").parse().ok()
}

fn parent_element(el: ElementRef) -> Option<ElementRef> {
    el.parent().and_then(ElementRef::wrap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_PAGE: &str = r##"
        <html><body>
        <table id="latest"><tbody>
        <tr>
            <td><a href="https://forum.test/topic/first-thread">First thread</a>
                <a class="page-numbers" href="https://forum.test/topic/first-thread/page/2">2</a>
                <a class="page-numbers" href="https://forum.test/topic/first-thread/page/3">3</a></td>
            <td class="num l"><a href="#">5 minutes ago #12</a></td>
        </tr>
        <tr>
            <td><a href="https://forum.test/topic/big-thread">Big thread</a>
                <a class="page-numbers" href="https://forum.test/topic/big-thread/page/1234">1,234</a></td>
            <td class="num l"><a href="#">2 weeks ago #9</a></td>
        </tr>
        <tr><td>No qualifying link here</td><td class="num l"><a href="#">1 hour ago #1</a></td></tr>
        </tbody></table>
        </body></html>
    "##;

    const THREAD_PAGE: &str = r#"
        <html><body>
        <h2 class="topictitle">Deve Gowda</h2>
        <div class="author">
            <div class="threadauthor"><small>EA12</small></div>
            <div class="threadpost">
                <div class="post">First post body</div>
                <div class="poststuff">5 minutes ago #1</div>
            </div>
        </div>
        <div class="author">
            <div class="threadauthor"><small>9bc4</small></div>
            <div class="threadpost">
                <div class="post">Second post body</div>
                <div class="poststuff">2 minutes ago #2</div>
            </div>
        </div>
        <a class="page-numbers" href="https://forum.test/topic/deve-gowda/page/3">3</a>
        <a class="page-numbers" href="https://forum.test/topic/deve-gowda/page/2">2</a>
        <a class="page-numbers" href="https://forum.test/topic/deve-gowda/page/3">Next</a>
        </body></html>
    "#;

    #[test]
    fn test_thread_rows_links_and_pages() {
        let rows = thread_rows(INDEX_PAGE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].link, "https://forum.test/topic/first-thread");
        assert_eq!(rows[0].page_count, 3);
        assert_eq!(rows[1].page_count, 1234);
    }

    #[test]
    fn test_thread_rows_empty_without_listing_table() {
        assert!(thread_rows("<html><body></body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_posts_extraction() {
        let posts = posts(THREAD_PAGE).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].author, "EA12");
        assert_eq!(posts[0].content, "First post body");
        assert_eq!(posts[1].author, "9bc4");
        assert!(posts[0].created_at < posts[1].created_at);
    }

    #[test]
    fn test_page_number_anchors_skip_non_numeric() {
        let anchors = page_number_anchors(THREAD_PAGE);
        let numbers: Vec<u32> = anchors.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![3, 2]);
    }

    #[test]
    fn test_title() {
        assert_eq!(title(THREAD_PAGE).unwrap(), "Deve Gowda");
        assert!(title("<html></html>").is_err());
    }
}
