//! Wire types for OSF JSON:API documents and their conversion to records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OsfError, Result};
use crate::fs::node::{NodeKind, NodeLinks, NodeRecord};

/// The logged-in user, as returned by `/users/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub full_name: String,
    pub profile_image: Option<String>,
    /// Listing of the user's projects
    pub nodes_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
    #[serde(default)]
    links: DocumentLinks,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentLinks {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    relationships: Relationships,
    #[serde(default)]
    links: ResourceLinks,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Attributes {
    title: Option<String>,
    category: Option<String>,
    name: Option<String>,
    kind: Option<String>,
    size: Option<u64>,
    provider: Option<String>,
    path: Option<String>,
    date_created: Option<String>,
    date_modified: Option<String>,
    last_touched: Option<String>,
    full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Relationships {
    files: Option<Relationship>,
    nodes: Option<Relationship>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Relationship {
    links: RelationshipLinks,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RelationshipLinks {
    related: Option<Href>,
}

/// Older API versions render links as bare strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Href {
    Object { href: String },
    Plain(String),
}

impl Href {
    fn into_string(self) -> String {
        match self {
            Href::Object { href } => href,
            Href::Plain(href) => href,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceLinks {
    #[serde(rename = "self")]
    self_link: Option<String>,
    download: Option<String>,
    upload: Option<String>,
    new_folder: Option<String>,
    delete: Option<String>,
    profile_image: Option<String>,
}

impl Relationship {
    fn href(self) -> Option<String> {
        self.links.related.map(Href::into_string)
    }
}

impl Resource {
    fn into_record(self) -> Result<NodeRecord> {
        let Resource {
            id,
            resource_type,
            attributes,
            relationships,
            links,
        } = self;
        let children = relationships.files.and_then(Relationship::href);

        match resource_type.as_str() {
            "nodes" => {
                let mut record =
                    NodeRecord::new(id, NodeKind::Project, attributes.title.unwrap_or_default());
                record.category = attributes.category;
                record.date_created = attributes.date_created;
                record.date_modified = attributes.date_modified;
                record.links = NodeLinks {
                    children,
                    delete: links.self_link,
                    ..NodeLinks::default()
                };
                Ok(record)
            }
            "files" => {
                let kind = match attributes.kind.as_deref() {
                    Some("folder") => NodeKind::Folder,
                    Some("file") => NodeKind::File,
                    other => {
                        return Err(OsfError::ParseError(format!(
                            "unknown file kind {:?} for {}",
                            other, id
                        )));
                    }
                };
                let mut record = NodeRecord::new(
                    waterbutler_id(&id, attributes.path.as_deref()),
                    kind,
                    attributes.name.unwrap_or_default(),
                );
                record.size = attributes.size;
                record.category = attributes.provider;
                record.date_created = attributes.date_created;
                record.date_modified = attributes.date_modified;
                record.last_touched = attributes.last_touched;
                record.links = NodeLinks {
                    children,
                    download: links.download,
                    upload: links.upload,
                    new_folder: links.new_folder,
                    delete: links.delete,
                };
                Ok(record)
            }
            other => Err(OsfError::ParseError(format!(
                "unexpected resource type {:?}",
                other
            ))),
        }
    }
}

/// WaterButler answers carry `provider/<id>` style ids; the API uses the bare id.
fn waterbutler_id(id: &str, path: Option<&str>) -> String {
    match id.split_once('/') {
        Some((_, rest)) if !rest.trim_matches('/').is_empty() => rest
            .trim_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(rest)
            .to_string(),
        // Provider roots are addressed as `provider/` with path `/`.
        Some(_) => match path {
            Some(p) if p != "/" => p.trim_matches('/').to_string(),
            _ => id.trim_end_matches('/').to_string(),
        },
        None => id.to_string(),
    }
}

fn from_value<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| OsfError::ParseError(e.to_string()))
}

/// Parse one page of a listing. Returns the records and the next page URL.
pub(crate) fn parse_listing(value: Value) -> Result<(Vec<NodeRecord>, Option<String>)> {
    let doc: Document<Vec<Resource>> = from_value(value)?;
    let records = doc
        .data
        .into_iter()
        .map(Resource::into_record)
        .collect::<Result<Vec<_>>>()?;
    Ok((records, doc.links.next))
}

/// Parse a single-resource document such as a create or upload answer.
pub(crate) fn parse_record(value: Value) -> Result<NodeRecord> {
    let doc: Document<Resource> = from_value(value)?;
    doc.data.into_record()
}

pub(crate) fn parse_user(value: Value) -> Result<UserInfo> {
    let doc: Document<Resource> = from_value(value)?;
    let Resource {
        id,
        resource_type,
        attributes,
        relationships,
        links,
    } = doc.data;

    if resource_type != "users" {
        return Err(OsfError::ParseError(format!(
            "expected a user, got {:?}",
            resource_type
        )));
    }

    Ok(UserInfo {
        id,
        full_name: attributes.full_name.unwrap_or_default(),
        profile_image: links.profile_image,
        nodes_url: relationships.nodes.and_then(Relationship::href),
    })
}
