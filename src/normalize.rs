use anyhow::Result;
use regex::Regex;
use scraper::Html;

/// Collapses an HTML letter body into flat, whitespace-normalized plain
/// text. Idempotent, and total: any input (including empty) produces a
/// string.
pub struct TextNormalizer {
    script_block: Regex,
    style_block: Regex,
    whitespace_run: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Contents of script/style elements would otherwise survive
            // tag stripping as text nodes.
            script_block: Regex::new(r"(?is)<script[^>]*>.*?</script>")?,
            style_block: Regex::new(r"(?is)<style[^>]*>.*?</style>")?,
            whitespace_run: Regex::new(r"\s+")?,
        })
    }

    pub fn flatten(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }

        let stripped = self.script_block.replace_all(html, " ");
        let stripped = self.style_block.replace_all(&stripped, " ");

        // The parser strips the remaining tags and decodes entities
        // (&nbsp; becomes U+00A0).
        let document = Html::parse_document(&stripped);
        let text = document
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ");

        let text = text.replace('\u{a0}', " ");
        self.whitespace_run.replace_all(&text, " ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new().unwrap()
    }

    #[test]
    fn test_strips_tags() {
        let html = "<html><body><p>Name of Candidate:</p> <b>Jane Doe</b></body></html>";
        assert_eq!(normalizer().flatten(html), "Name of Candidate: Jane Doe");
    }

    #[test]
    fn test_removes_script_and_style_contents() {
        let html = concat!(
            "<style>p { color: red; }</style>",
            "<p>Rate: $55.00/hr</p>",
            "<script type=\"text/javascript\">var hidden = \"PO\";</script>",
        );
        assert_eq!(normalizer().flatten(html), "Rate: $55.00/hr");
    }

    #[test]
    fn test_collapses_nbsp_and_whitespace() {
        let html = "<p>Jane&nbsp;&nbsp;Doe</p>\n\n<p>  Location:\tUSA </p>";
        assert_eq!(normalizer().flatten(html), "Jane Doe Location: USA");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalizer().flatten(""), "");
        assert_eq!(normalizer().flatten("   \n  "), "");
    }

    #[test]
    fn test_idempotent() {
        let n = normalizer();
        let html = "<div>Name of Candidate: Jane&nbsp;Doe<br>SST Location: USA</div>";
        let once = n.flatten(html);
        let twice = n.flatten(&once);
        assert_eq!(once, twice);
    }
}
