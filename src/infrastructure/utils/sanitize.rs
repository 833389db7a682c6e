use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

/// Tag/attribute allow-list for one class of rich-text content. Everything
/// not listed is stripped; script-executing constructs are stripped even if
/// a list were to name them.
#[derive(Debug, Clone, Copy)]
pub struct AllowList {
    pub tags: &'static [&'static str],
    pub attrs_by_tag: &'static [(&'static str, &'static [&'static str])],
}

/// The one allow-list deployed for catalog rich text (exhibit descriptions,
/// pages, session abstracts).
pub fn rich_text_allow_list() -> AllowList {
    AllowList {
        tags: &[
            "h1", "h2", "ul", "ol", "li", "strong", "em", "i", "a", "img",
            "code", "blockquote", "hr", "p", "br", "pre",
        ],
        attrs_by_tag: &[
            ("a", &["href", "target", "rel"]),
            ("img", &["src", "alt"]),
        ],
    }
}

/// Sanitizes untrusted HTML against `allow`. Pure: no shared state, safe to
/// call concurrently, idempotent. Malformed markup is recovered into
/// well-formed output rather than rejected.
///
/// Anchors are hardened here regardless of their input attributes:
/// `target="_blank"` and `rel="noopener noreferrer"` are forced on every
/// `<a>`. `data:` URIs and site-relative URLs are let through so the
/// extractor can see inline images and existing image references.
pub fn sanitize(html: &str, allow: &AllowList) -> String {
    let tags: HashSet<&str> = allow.tags.iter().copied().collect();

    let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (tag, attrs) in allow.attrs_by_tag {
        let attrs = attrs
            .iter()
            .copied()
            // target/rel on anchors are force-set below; any user-supplied
            // value must not survive.
            .filter(|a| *tag != "a" || (*a != "target" && *a != "rel"))
            .collect::<HashSet<&str>>();
        tag_attributes.insert(tag, attrs);
    }

    let url_schemes: HashSet<&str> =
        ["http", "https", "mailto", "data"].into_iter().collect();

    Builder::new()
        .tags(tags)
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .url_schemes(url_schemes)
        .url_relative(UrlRelative::PassThrough)
        .link_rel(Some("noopener noreferrer"))
        .set_tag_attribute_value("a", "target", "_blank")
        .clean(html)
        .to_string()
}
