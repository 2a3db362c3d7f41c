use super::opml::{OpmlDocument, Outline};

/// Outline `type` value marking a feed subscription.
const FEED_OUTLINE_TYPE: &str = "rss";

/// A feed subscription found in the outline tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRef {
    /// Display title: the `title` attribute, then `text`, then the feed URL.
    pub title: String,
    pub feed_url: String,
}

/// Flattens the document's outline tree into feed references.
///
/// Traversal is depth-first and parent-first. A feed outline is emitted and
/// not descended into; any other outline is treated as a folder and its
/// children are spliced in at its position. Duplicate subscriptions are
/// kept.
pub fn extract_feeds(document: &OpmlDocument) -> Vec<FeedRef> {
    extract_from_outlines(&document.outlines)
}

/// Same as [`extract_feeds`] for an arbitrary subtree.
pub fn extract_from_outlines(outlines: &[Outline]) -> Vec<FeedRef> {
    let mut feeds = Vec::new();
    collect(outlines, &mut feeds);
    feeds
}

fn collect(outlines: &[Outline], feeds: &mut Vec<FeedRef>) {
    for outline in outlines {
        if let Some(feed) = as_feed(outline) {
            feeds.push(feed);
        } else if !outline.outlines.is_empty() {
            collect(&outline.outlines, feeds);
        }
    }
}

/// Returns the feed reference for a feed-typed outline with a non-empty URL.
fn as_feed(outline: &Outline) -> Option<FeedRef> {
    let is_feed_type = outline
        .kind
        .as_deref()
        .is_some_and(|kind| kind.trim().eq_ignore_ascii_case(FEED_OUTLINE_TYPE));
    if !is_feed_type {
        return None;
    }

    let url = outline.xml_url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;

    let title = [outline.title.as_deref(), outline.text.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(url);

    Some(FeedRef {
        title: title.to_string(),
        feed_url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::opml::parse_document;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn feed(title: &str, url: &str) -> Outline {
        Outline {
            kind: Some("rss".to_string()),
            title: Some(title.to_string()),
            xml_url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn folder(title: &str, children: Vec<Outline>) -> Outline {
        Outline {
            title: Some(title.to_string()),
            outlines: children,
            ..Default::default()
        }
    }

    #[test]
    fn test_nested_feed_found_folder_skipped() {
        let doc = parse_document(
            r#"<opml version="2.0"><body>
    <outline type="rss" title="Top Feed" xmlUrl="https://top.example.com/rss"/>
    <outline title="Folder">
        <outline type="rss" title="Nested Feed" xmlUrl="https://nested.example.com/rss"/>
    </outline>
</body></opml>"#,
        )
        .unwrap();

        let feeds = extract_feeds(&doc);
        assert_eq!(
            feeds,
            vec![
                FeedRef {
                    title: "Top Feed".to_string(),
                    feed_url: "https://top.example.com/rss".to_string(),
                },
                FeedRef {
                    title: "Nested Feed".to_string(),
                    feed_url: "https://nested.example.com/rss".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_order_is_depth_first() {
        let outlines = vec![
            folder(
                "A",
                vec![
                    feed("a1", "https://a/1"),
                    folder("B", vec![feed("b1", "https://b/1")]),
                ],
            ),
            feed("c1", "https://c/1"),
            folder("D", vec![feed("d1", "https://d/1")]),
        ];

        let titles: Vec<_> = extract_from_outlines(&outlines)
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["a1", "b1", "c1", "d1"]);
    }

    #[test]
    fn test_untyped_outline_with_url_is_not_a_feed() {
        let outlines = vec![Outline {
            title: Some("Link".to_string()),
            xml_url: Some("https://example.com/rss".to_string()),
            ..Default::default()
        }];
        assert!(extract_from_outlines(&outlines).is_empty());
    }

    #[test]
    fn test_feed_type_without_url_is_a_folder() {
        let mut parent = feed("Parent", "");
        parent.outlines.push(feed("Child", "https://child.example.com/rss"));

        let feeds = extract_from_outlines(&[parent]);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "Child");
    }

    #[test]
    fn test_feed_children_are_not_visited() {
        let mut parent = feed("Parent", "https://parent.example.com/rss");
        parent.outlines.push(feed("Child", "https://child.example.com/rss"));

        let feeds = extract_from_outlines(&[parent]);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "Parent");
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let mut outline = feed("Upper", "https://upper.example.com/rss");
        outline.kind = Some("RSS".to_string());
        assert_eq!(extract_from_outlines(&[outline]).len(), 1);
    }

    #[test]
    fn test_title_fallbacks() {
        let text_only = Outline {
            kind: Some("rss".to_string()),
            text: Some("Text Only".to_string()),
            xml_url: Some("https://textonly.com/feed".to_string()),
            ..Default::default()
        };
        let url_only = Outline {
            kind: Some("rss".to_string()),
            title: Some("  ".to_string()),
            xml_url: Some("https://notitle.com/feed".to_string()),
            ..Default::default()
        };

        let feeds = extract_from_outlines(&[text_only, url_only]);
        assert_eq!(feeds[0].title, "Text Only");
        assert_eq!(feeds[1].title, "https://notitle.com/feed");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let outlines = vec![
            feed("Same", "https://same.example.com/rss"),
            folder("F", vec![feed("Same", "https://same.example.com/rss")]),
        ];
        assert_eq!(extract_from_outlines(&outlines).len(), 2);
    }

    /// Builds an arbitrary outline tree; leaves are feeds, feed-typed nodes
    /// with empty URLs, or plain empty outlines.
    fn arb_outline() -> impl Strategy<Value = Outline> {
        let leaf = prop_oneof![
            "[a-z]{1,8}".prop_map(|t| feed(&t, &format!("https://{t}.example.com/rss"))),
            "[a-z]{1,8}".prop_map(|t| feed(&t, "")),
            "[a-z]{1,8}".prop_map(|t| folder(&t, Vec::new())),
        ];
        leaf.prop_recursive(6, 64, 5, |inner| {
            ("[a-z]{1,8}", prop::collection::vec(inner, 0..5))
                .prop_map(|(t, children)| folder(&t, children))
        })
    }

    fn count_feeds(outlines: &[Outline]) -> usize {
        outlines
            .iter()
            .map(|o| {
                let is_feed = o.kind.as_deref() == Some("rss")
                    && o.xml_url.as_deref().is_some_and(|u| !u.is_empty());
                if is_feed {
                    1
                } else {
                    count_feeds(&o.outlines)
                }
            })
            .sum()
    }

    proptest! {
        #[test]
        fn prop_extraction_is_complete(outlines in prop::collection::vec(arb_outline(), 0..6)) {
            let feeds = extract_from_outlines(&outlines);
            prop_assert_eq!(feeds.len(), count_feeds(&outlines));
            prop_assert!(feeds.iter().all(|f| !f.feed_url.is_empty()));
        }
    }
}
