//! Editable content items.
//!
//! These are the shapes the editor UI sees: texts carry `content`, images
//! `src`/`alt`, links `href`/`text`. Field names serialize in camelCase to
//! match the panel's JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which half of a composite label a text item edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPart {
    /// The bare text run (`Social` in `Social<span>Spark</span>`).
    Main,
    /// The styled inline child.
    Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub id: String,
    /// Source tag name, lowercase.
    pub element: String,
    pub content: String,
    pub path: String,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<TextPart>,
    /// Outer HTML of the composite node both halves came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_element: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: String,
    pub src: String,
    pub alt: String,
    pub path: String,
    #[serde(default)]
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkItem {
    pub id: String,
    pub href: String,
    pub text: String,
    pub path: String,
    #[serde(default)]
    pub is_new: bool,
}

/// Any item, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    Text(TextItem),
    Image(ImageItem),
    Link(LinkItem),
}

impl ContentItem {
    pub fn id(&self) -> &str {
        match self {
            ContentItem::Text(t) => &t.id,
            ContentItem::Image(i) => &i.id,
            ContentItem::Link(l) => &l.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ContentItem::Text(_) => ItemKind::Text,
            ContentItem::Image(_) => ItemKind::Image,
            ContentItem::Link(_) => ItemKind::Link,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Image,
    Link,
}

impl ItemKind {
    /// Prefix used for generated item ids.
    pub fn prefix(self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Image => "image",
            ItemKind::Link => "link",
        }
    }
}

/// An editable field. Each belongs to exactly one item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Content,
    Src,
    Alt,
    Href,
    Text,
}

impl Field {
    pub fn kind(self) -> ItemKind {
        match self {
            Field::Content => ItemKind::Text,
            Field::Src | Field::Alt => ItemKind::Image,
            Field::Href | Field::Text => ItemKind::Link,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Content => "content",
            Field::Src => "src",
            Field::Alt => "alt",
            Field::Href => "href",
            Field::Text => "text",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" => Ok(Field::Content),
            "src" => Ok(Field::Src),
            "alt" => Ok(Field::Alt),
            "href" => Ok(Field::Href),
            "text" => Ok(Field::Text),
            other => Err(Error::InvalidField(other.to_string())),
        }
    }
}

/// Everything extracted from one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionContent {
    pub texts: Vec<TextItem>,
    pub images: Vec<ImageItem>,
    pub links: Vec<LinkItem>,
}

impl SectionContent {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.images.is_empty() && self.links.is_empty()
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.texts.len() + self.images.len() + self.links.len()
    }

    /// Whether any collection already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.texts.iter().any(|t| t.id == id)
            || self.images.iter().any(|i| i.id == id)
            || self.links.iter().any(|l| l.id == id)
    }

    /// Items still waiting to be materialized.
    pub fn pending(&self) -> usize {
        self.texts.iter().filter(|t| t.is_new).count()
            + self.images.iter().filter(|i| i.is_new).count()
            + self.links.iter().filter(|l| l.is_new).count()
    }

    pub fn push(&mut self, item: ContentItem) {
        match item {
            ContentItem::Text(t) => self.texts.push(t),
            ContentItem::Image(i) => self.images.push(i),
            ContentItem::Link(l) => self.links.push(l),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_item_json_shape() {
        let item = TextItem {
            id: "text-main-0".into(),
            element: "h1".into(),
            content: "Grow".into(),
            path: "h1".into(),
            is_new: false,
            part: Some(TextPart::Main),
            original_element: Some("<h1>Grow <span>Smart</span></h1>".into()),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["isNew"], false);
        assert_eq!(json["part"], "main");
        assert_eq!(json["originalElement"], "<h1>Grow <span>Smart</span></h1>");

        let plain: TextItem = serde_json::from_str(
            r#"{"id":"text-3","element":"p","content":"Hi","path":"p"}"#,
        )
        .unwrap();
        assert!(!plain.is_new);
        assert_eq!(plain.part, None);
        assert!(!serde_json::to_string(&plain).unwrap().contains("part"));
    }

    #[test]
    fn test_content_item_is_tagged_by_kind() {
        let item: ContentItem = serde_json::from_str(
            r##"{"kind":"link","id":"link-0","href":"#","text":"New Link","path":"new-1","isNew":true}"##,
        )
        .unwrap();
        assert_eq!(item.kind(), ItemKind::Link);
        assert_eq!(item.id(), "link-0");
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(Field::Content.kind(), ItemKind::Text);
        assert_eq!(Field::Alt.kind(), ItemKind::Image);
        assert_eq!(Field::Text.kind(), ItemKind::Link);
        assert_eq!("href".parse::<Field>().unwrap(), Field::Href);
        assert!(matches!("colour".parse::<Field>(), Err(Error::InvalidField(f)) if f == "colour"));
    }

    #[test]
    fn test_section_content_counts() {
        let mut content = SectionContent::default();
        assert!(content.is_empty());
        content.push(ContentItem::Image(ImageItem {
            id: "image-0".into(),
            src: "a.png".into(),
            alt: String::new(),
            path: "img".into(),
            is_new: true,
        }));
        assert_eq!(content.len(), 1);
        assert_eq!(content.pending(), 1);
        assert!(content.contains_id("image-0"));
        assert!(!content.contains_id("image-1"));
    }
}
