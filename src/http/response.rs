//! Response bodies.
//!
//! # Item Shapes by Host Version
//! ```text
//! <= 0.6      {name, display_name, homepage, packages: {arch: {version, url, checksum}}, api: 2}
//! 0.7 - 0.9   {name, display_name, homepage, license, version, url, checksum, type}
//! >= 0.10     {id, name, homepage_url, license_url, primary_type, architecture, version, url, checksum}
//! unknown     same as >= 0.10
//! ```
//!
//! # Design Decisions
//! - One JSON object per add-on with its selected build inlined
//! - Optional metadata is omitted rather than serialized as null
//! - The info page escapes every catalog-provided string

use std::collections::BTreeMap;

use semver::Version;
use serde::Serialize;

use crate::catalog::CatalogEntry;
use crate::filter::FilteredEntry;

/// Item shape a host of a given version understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Hosts up to 0.6, keyed by architecture.
    Packages,
    /// Hosts 0.7 through 0.9.
    Typed,
    /// Hosts 0.10 and newer, and hosts that did not say.
    Current,
}

impl ResponseFormat {
    pub fn for_version(version: Option<&Version>) -> Self {
        match version {
            Some(v) if v.major == 0 && v.minor <= 6 => ResponseFormat::Packages,
            Some(v) if v.major == 0 && v.minor <= 9 => ResponseFormat::Typed,
            _ => ResponseFormat::Current,
        }
    }

    pub fn item<'a>(self, filtered: FilteredEntry<'a>) -> CatalogItem<'a> {
        match self {
            ResponseFormat::Packages => CatalogItem::Packages(PackagesItem::from(filtered)),
            ResponseFormat::Typed => CatalogItem::Typed(TypedItem::from(filtered)),
            ResponseFormat::Current => CatalogItem::Current(AddonItem::from(filtered)),
        }
    }
}

/// One add-on in whichever shape the host reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CatalogItem<'a> {
    Packages(PackagesItem<'a>),
    Typed(TypedItem<'a>),
    Current(AddonItem<'a>),
}

/// Add-on as served to hosts up to 0.6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagesItem<'a> {
    /// The add-on id.
    pub name: &'a str,
    pub display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<&'a str>,
    pub packages: BTreeMap<String, PackageRef<'a>>,
    pub api: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<&'a str>,
}

impl<'a> From<FilteredEntry<'a>> for PackagesItem<'a> {
    fn from(filtered: FilteredEntry<'a>) -> Self {
        let FilteredEntry { entry, build } = filtered;
        let mut packages = BTreeMap::new();
        packages.insert(
            build.architecture.to_string(),
            PackageRef {
                version: build.version.as_deref(),
                url: &build.url,
                checksum: build.checksum.as_deref(),
            },
        );
        Self {
            name: &entry.id,
            display_name: &entry.name,
            description: entry.description.as_deref(),
            author: entry.author.as_deref(),
            homepage: entry.homepage_url.as_deref(),
            packages,
            api: 2,
        }
    }
}

/// Add-on as served to hosts 0.7 through 0.9.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedItem<'a> {
    /// The add-on id.
    pub name: &'a str,
    pub display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<&'a str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'a str>,
}

impl<'a> From<FilteredEntry<'a>> for TypedItem<'a> {
    fn from(filtered: FilteredEntry<'a>) -> Self {
        let FilteredEntry { entry, build } = filtered;
        Self {
            name: &entry.id,
            display_name: &entry.name,
            description: entry.description.as_deref(),
            author: entry.author.as_deref(),
            homepage: entry.homepage_url.as_deref(),
            license: entry.license_url.as_deref(),
            version: build.version.as_deref(),
            url: &build.url,
            checksum: build.checksum.as_deref(),
            kind: entry.primary_type.as_deref(),
        }
    }
}

/// Add-on as served to hosts 0.10 and newer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddonItem<'a> {
    pub id: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<&'a str>,
    pub architecture: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<&'a str>,
}

impl<'a> From<FilteredEntry<'a>> for AddonItem<'a> {
    fn from(filtered: FilteredEntry<'a>) -> Self {
        let FilteredEntry { entry, build } = filtered;
        Self {
            id: &entry.id,
            name: &entry.name,
            description: entry.description.as_deref(),
            author: entry.author.as_deref(),
            homepage_url: entry.homepage_url.as_deref(),
            license_url: entry.license_url.as_deref(),
            primary_type: entry.primary_type.as_deref(),
            architecture: build.architecture.to_string(),
            version: build.version.as_deref(),
            url: &build.url,
            checksum: build.checksum.as_deref(),
        }
    }
}

const INFO_STYLE: &str = r#"<style>
    body { background-color: #5d9bc7; color: white; font-family: 'Open Sans', sans-serif; text-align: center; padding: 2rem; }
    ul { list-style-type: none; padding: 0; }
    li { background-color: #5288af; border-radius: 0.5rem; margin: 1rem auto; padding: 1.5rem; text-align: left; max-width: 60rem; }
    .addon-name { display: block; font-size: 1.8rem; padding-bottom: 0.5rem; }
    .addon-description { display: block; color: #ddd; padding-bottom: 0.5rem; }
    .addon-author { font-style: italic; color: #ddd; }
    a { color: white; }
</style>"#;

/// Escape a string for insertion into HTML text or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the human-readable add-on listing, sorted by name.
pub fn render_info_page<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> String {
    let mut sorted: Vec<&CatalogEntry> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let mut items = String::new();
    for entry in sorted {
        items.push_str("<li>");
        items.push_str(&format!(
            r#"<span class="addon-name">{}</span>"#,
            escape_html(&entry.name)
        ));
        if let Some(description) = &entry.description {
            items.push_str(&format!(
                r#"<span class="addon-description">{}</span>"#,
                escape_html(description)
            ));
        }
        match (&entry.author, &entry.homepage_url) {
            (Some(author), Some(homepage)) => items.push_str(&format!(
                r#"<span class="addon-author">by <a href="{}">{}</a></span>"#,
                escape_html(homepage),
                escape_html(author)
            )),
            (Some(author), None) => items.push_str(&format!(
                r#"<span class="addon-author">by {}</span>"#,
                escape_html(author)
            )),
            _ => {}
        }
        items.push_str("</li>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Add-ons</title>\n{}\n</head>\n<body>\n<h1>Add-ons</h1>\n<ul>\n{}</ul>\n</body>\n</html>\n",
        INFO_STYLE, items
    )
}
