//! HTML documents served on tenant subdomains.
//!
//! Tenant markup, stylesheet and script are inserted verbatim; everything the
//! platform derives from tenant fields (titles, meta tags, metadata object) is
//! escaped.

use serde_json::json;

use crate::entity::portfolio;
use crate::utils::html::{escape, escape_script_json};

const RESET_CSS: &str = "*,*::before,*::after{box-sizing:border-box}\
body{margin:0;font-family:-apple-system,BlinkMacSystemFont,\"Segoe UI\",Roboto,sans-serif;line-height:1.5}\
img,picture,video,canvas,svg{display:block;max-width:100%}";

const BADGE_CSS: &str = ".folio-badge{position:fixed;bottom:16px;right:16px;z-index:2147483647;\
padding:6px 12px;border-radius:999px;background:rgba(17,24,39,.85);color:#fff;\
font:12px/1.4 -apple-system,BlinkMacSystemFont,sans-serif;text-decoration:none}";

const PAGE_CSS: &str = "body{display:flex;min-height:100vh;align-items:center;justify-content:center;\
background:#f9fafb;color:#111827;font-family:-apple-system,BlinkMacSystemFont,sans-serif}\
main{text-align:center;max-width:32rem;padding:2rem}h1{font-size:3rem;margin:0}\
p{color:#4b5563}a{color:#2563eb}code{display:block;margin-top:1rem;color:#991b1b;white-space:pre-wrap}";

/// Full document for a published portfolio.
pub fn render_portfolio(p: &portfolio::Model, owner_name: &str, platform_url: &str) -> String {
    let tags = p.tag_list();
    let page_title = escape(&format!("{} \u{2014} {}", p.title, owner_name));
    let description = if p.description.trim().is_empty() {
        format!("{} by {}", p.title, owner_name)
    } else {
        p.description.clone()
    };
    let description = escape(&description);
    let keywords = escape(&tags.join(", "));
    let platform_url = escape(platform_url);

    let metadata = json!({
        "id": p.id,
        "title": p.title,
        "description": p.description,
        "author": owner_name,
        "tags": tags,
        "views": p.views_count,
        "likes": p.likes_count,
        "slug": p.slug,
    });
    let metadata = escape_script_json(&metadata.to_string());

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{page_title}</title>
<meta name="description" content="{description}">
<meta name="keywords" content="{keywords}">
<meta name="author" content="{author}">
<meta property="og:type" content="website">
<meta property="og:title" content="{page_title}">
<meta property="og:description" content="{description}">
<meta name="twitter:card" content="summary">
<meta name="twitter:title" content="{page_title}">
<meta name="twitter:description" content="{description}">
<style>{RESET_CSS}</style>
<style>{BADGE_CSS}</style>
<style>
{css}
</style>
</head>
<body>
{html}
<a class="folio-badge" href="{platform_url}" target="_blank" rel="noopener">Made with Folio</a>
<script>
window.PORTFOLIO_DATA = {metadata};
{js}
</script>
</body>
</html>
"#,
        author = escape(owner_name),
        css = p.css_content,
        html = p.html_content,
        js = p.js_content,
    )
}

/// Branded 404 document for an unknown or unpublished slug.
pub fn render_not_found(slug: &str, platform_url: &str) -> String {
    page(
        "Portfolio not found",
        &format!(
            "<h1>404</h1><p>There is no published portfolio at <strong>{}</strong>.</p>\
             <p><a href=\"{}\">Create your own portfolio</a></p>",
            escape(slug),
            escape(platform_url)
        ),
    )
}

/// Branded 500 document. `message` is shown for operators; it must never be a backtrace.
pub fn render_error(message: &str, platform_url: &str) -> String {
    page(
        "Something went wrong",
        &format!(
            "<h1>500</h1><p>This portfolio could not be displayed right now.</p>\
             <p><a href=\"{}\">Back to Folio</a></p><code>{}</code>",
            escape(platform_url),
            escape(message)
        ),
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{RESET_CSS}{PAGE_CSS}</style>\n</head>\n\
         <body><main>{body}</main></body>\n</html>\n"
    )
}
