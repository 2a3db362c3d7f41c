use crate::feed::Article;
use quick_xml::escape::escape;

/// Renders one feed's articles into its digest.
///
/// The digest is the article fragments (see [`render_fragment`]) joined with
/// newlines, in article order. Output depends only on the articles.
///
/// Callers skip feeds with no articles, so an empty slice is never expected
/// here; it yields an empty string.
pub fn render_digest(feed_title: &str, articles: &[Article]) -> String {
    tracing::debug!(feed = %feed_title, articles = articles.len(), "Rendering digest");
    articles
        .iter()
        .map(render_fragment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a single article: heading, line break, content block, separator.
///
/// The title is escaped as text. The content is the entry's raw HTML and is
/// embedded unchanged.
pub fn render_fragment(article: &Article) -> String {
    format!(
        "<h2>{}</h2><br /><div>{}</div><br /><br /><hr />",
        escape(article.title.as_str()),
        article.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn article(title: &str, summary: &str, content: &str) -> Article {
        Article {
            title: title.to_string(),
            link: format!("https://example.com/{}", title.len()),
            summary: summary.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_fragment_shape() {
        let a = article("Hello", "", "<p>World</p>");
        assert_eq!(
            render_fragment(&a),
            "<h2>Hello</h2><br /><div><p>World</p></div><br /><br /><hr />"
        );
    }

    #[test]
    fn test_summary_not_used_when_content_empty() {
        let a = article("T", "S", "");
        assert_eq!(
            render_digest("Feed", &[a]),
            "<h2>T</h2><br /><div></div><br /><br /><hr />"
        );
    }

    #[test]
    fn test_title_is_escaped_content_is_not() {
        let a = article("Tom & <Jerry>", "", "<b>bold</b>");
        let html = render_fragment(&a);
        assert!(html.starts_with("<h2>Tom &amp; &lt;Jerry&gt;</h2>"));
        assert!(html.contains("<div><b>bold</b></div>"));
    }

    #[test]
    fn test_digest_is_fragments_joined_in_order() {
        let articles = vec![
            article("First", "", "1"),
            article("Second", "", "2"),
            article("Third", "", "3"),
        ];
        assert_eq!(
            render_digest("My Feed", &articles),
            "<h2>First</h2><br /><div>1</div><br /><br /><hr />\n\
             <h2>Second</h2><br /><div>2</div><br /><br /><hr />\n\
             <h2>Third</h2><br /><div>3</div><br /><br /><hr />"
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let articles = vec![article("A", "s", "c"), article("B", "", "")];
        assert_eq!(
            render_digest("Feed", &articles),
            render_digest("Feed", &articles)
        );
    }

    #[test]
    fn test_feed_title_not_in_output() {
        let html = render_digest("News & Views", &[article("x", "", "y")]);
        assert!(!html.contains("News"));
        assert!(!html.contains("<html"));
    }
}
