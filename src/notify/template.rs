// src/notify/template.rs
use chrono::NaiveDate;
use html_escape::{encode_double_quoted_attribute, encode_text};

use super::RenderedDigest;
use crate::models::Article;

pub trait Renderer: Send + Sync {
    fn render(&self, overview: &str, articles: &[Article], date: NaiveDate) -> RenderedDigest;
}

/// Inline-styled HTML email plus a plain-text twin.
#[derive(Debug, Clone)]
pub struct HtmlTemplate {
    pub title: String,
}

impl Default for HtmlTemplate {
    fn default() -> Self {
        Self {
            title: "Daily AI News Digest".to_string(),
        }
    }
}

/// Model output occasionally carries stray code fences.
fn clean(text: &str) -> String {
    text.replace("```", "").trim().to_string()
}

fn badge(source_name: &str) -> &'static str {
    match source_name.to_ascii_lowercase().as_str() {
        "youtube" => {
            r#"<span style="background:#ff0000;color:#fff;padding:3px 8px;border-radius:12px;font-size:11px;margin-left:6px;">YouTube</span>"#
        }
        "newsletter" => {
            r#"<span style="background:#34a853;color:#fff;padding:3px 8px;border-radius:12px;font-size:11px;margin-left:6px;">Newsletter</span>"#
        }
        _ => "",
    }
}

impl HtmlTemplate {
    fn article_html(a: &Article) -> String {
        let title = encode_text(&clean(&a.title)).to_string();
        let summary = encode_text(&clean(a.summary.as_deref().unwrap_or_default())).to_string();
        let url = encode_double_quoted_attribute(if a.url.is_empty() { "#" } else { a.url.as_str() }).to_string();
        let takeaways: String = a
            .takeaways
            .iter()
            .map(|t| format!("<li>{}</li>", encode_text(&clean(t))))
            .collect();
        let takeaways = if takeaways.is_empty() {
            String::new()
        } else {
            format!(r#"<ul style="margin:8px 0 0;padding-left:18px;font-size:13px;color:#555;">{takeaways}</ul>"#)
        };
        format!(
            r#"<tr><td style="padding-top:25px;"><h3 style="margin:0;font-size:18px;color:#111;">{title}{badge}</h3></td></tr>
<tr><td style="padding-top:8px;font-size:14px;color:#333;line-height:1.6;">{summary}{takeaways}</td></tr>
<tr><td style="padding-top:10px;"><a href="{url}" style="color:#1a73e8;text-decoration:none;font-size:14px;">Read full article &rarr;</a></td></tr>
<tr><td style="padding-top:20px;border-bottom:1px solid #e0e0e0;"></td></tr>
"#,
            badge = badge(&a.source_name),
        )
    }

    fn text(&self, overview: &str, articles: &[Article], date_str: &str) -> String {
        let mut out = format!("{}\n{date_str}\n\n{}\n", self.title, clean(overview));
        for (i, a) in articles.iter().enumerate() {
            out.push_str(&format!("\n{}. {} [{}]\n", i + 1, clean(&a.title), a.source_name));
            if let Some(s) = a.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                out.push_str(&format!("   {}\n", clean(s)));
            }
            for t in &a.takeaways {
                out.push_str(&format!("   - {}\n", clean(t)));
            }
            out.push_str(&format!("   {}\n", a.url));
        }
        out
    }
}

impl Renderer for HtmlTemplate {
    fn render(&self, overview: &str, articles: &[Article], date: NaiveDate) -> RenderedDigest {
        let date_str = date.format("%B %d, %Y").to_string();
        let articles_html: String = articles.iter().map(Self::article_html).collect();
        let title = encode_text(&self.title);
        let overview_html = encode_text(&clean(overview)).to_string();

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{title}</title></head>
<body style="margin:0;padding:0;background-color:#f6f6f6;font-family:Arial,Helvetica,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0"><tr><td align="center">
<table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;padding:24px;margin-top:20px;">
<tr><td><h2 style="margin:0;font-size:22px;color:#111;">{title}</h2>
<p style="margin:6px 0 0;font-size:13px;color:#777;">{date_str}</p></td></tr>
<tr><td style="padding-top:15px;border-bottom:2px solid #000;"></td></tr>
<tr><td style="padding-top:20px;font-size:14px;color:#333;">Hello, here is your personalized AI &amp; tech update.</td></tr>
<tr><td style="padding-top:14px;font-size:14px;color:#333;line-height:1.6;">{overview_html}</td></tr>
{articles_html}<tr><td style="padding-top:30px;font-size:12px;color:#777;text-align:center;">
You are receiving this because you subscribed to the AI Knowledge Digest.</td></tr>
</table>
</td></tr></table>
</body>
</html>
"#
        );

        RenderedDigest {
            html,
            text: self.text(overview, articles, &date_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(title: &str, source: &str) -> Article {
        Article {
            id: 1,
            title: title.into(),
            url: "https://example.com/?a=1&b=\"2\"".into(),
            content: String::new(),
            published_at: Utc::now(),
            source_name: source.into(),
            summary: Some("```Summary <b>bold</b>```".into()),
            takeaways: vec!["one".into(), "two".into(), "three".into()],
            topic: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn escapes_content_and_shows_badges() {
        let r = HtmlTemplate::default().render(
            "Good morning! <script>",
            &[article("A <b>title</b>", "YouTube"), article("B", "Newsletter"), article("C", "Blog")],
            NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
        );
        assert!(r.html.contains("January 07, 2025"));
        assert!(r.html.contains("Good morning! &lt;script&gt;"));
        assert!(r.html.contains("A &lt;b&gt;title&lt;/b&gt;"));
        assert!(r.html.contains("Summary &lt;b&gt;bold&lt;/b&gt;"));
        assert!(!r.html.contains("```"));
        assert!(r.html.contains("&amp;b=&quot;2&quot;"));
        assert!(r.html.contains(">YouTube</span>"));
        assert!(r.html.contains(">Newsletter</span>"));
        assert_eq!(r.html.matches("<span").count(), 2);
        assert!(r.text.contains("1. A <b>title</b> [YouTube]"));
        assert!(r.text.contains("   - three"));
    }
}
