//! Search document structure and index schema

use crate::models::{ArtifactKind, ArtifactRecord, ArtifactRef, ReadAcl, ResolvedRef};
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use tantivy::schema::*;
use tantivy::TantivyDocument;

/// Field names used in the artifact schema
pub mod names {
    pub const ID: &str = "id";
    pub const KEY: &str = "key";
    pub const NAME: &str = "name";
    pub const OWNER: &str = "owner";
    pub const SERIES: &str = "series";
    pub const KIND: &str = "type";
    pub const REVISION: &str = "revision";
    pub const PROMULGATED_REVISION: &str = "promulgated_revision";
    pub const PROMULGATED: &str = "promulgated";
    pub const SUMMARY: &str = "summary";
    pub const DESCRIPTION: &str = "description";
    pub const TAGS: &str = "tags";
    pub const CATEGORIES: &str = "categories";
    pub const TAG_TERMS: &str = "tag_terms";
    pub const PROVIDES: &str = "provides";
    pub const REQUIRES: &str = "requires";
    pub const READ_ACL: &str = "read_acl";
    pub const TOTAL_DOWNLOADS: &str = "total_downloads";
}

/// Denormalized record stored in the index, one per base entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: ResolvedRef,
    pub kind: ArtifactKind,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    pub read_acl: ReadAcl,
    pub total_downloads: u64,
}

impl SearchDocument {
    /// Build a document from a canonical record and an ACL snapshot
    pub fn from_record(record: &ArtifactRecord, read_acl: ReadAcl) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind,
            summary: record.summary.clone(),
            description: record.description.clone(),
            tags: record.tags.clone(),
            categories: record.categories.clone(),
            provides: record.provides.clone(),
            requires: record.requires.clone(),
            read_acl,
            total_downloads: record.popularity.total_downloads(),
        }
    }

    pub fn url(&self) -> &ArtifactRef {
        &self.id.url
    }

    pub fn name(&self) -> &str {
        &self.id.url.name
    }

    pub fn owner(&self) -> &str {
        &self.id.url.owner
    }

    pub fn series(&self) -> &str {
        &self.id.url.series
    }

    /// Id shown to clients
    pub fn preferred_url(&self) -> String {
        self.id.preferred_url()
    }

    /// Upsert key in the index
    pub fn key(&self) -> String {
        self.id.url.base_key()
    }

    /// Convert to a tantivy document
    pub fn to_tantivy_doc(&self, fields: &DocumentFields) -> TantivyDocument {
        let url = &self.id.url;
        let mut doc = TantivyDocument::new();

        doc.add_text(fields.id, url.to_string());
        doc.add_text(fields.key, url.base_key());
        doc.add_text(fields.name, &url.name);
        doc.add_text(fields.owner, &url.owner);
        doc.add_text(fields.series, &url.series);
        doc.add_text(fields.kind, self.kind.as_ref());
        doc.add_u64(fields.revision, u64::from(url.revision));
        doc.add_i64(
            fields.promulgated_revision,
            self.id.promulgated_revision.map_or(-1, i64::from),
        );
        doc.add_u64(fields.promulgated, u64::from(self.id.is_promulgated()));
        doc.add_text(fields.summary, &self.summary);
        doc.add_text(fields.description, &self.description);

        for tag in &self.tags {
            doc.add_text(fields.tags, tag);
            doc.add_text(fields.tag_terms, tag);
        }
        for category in &self.categories {
            doc.add_text(fields.categories, category);
            doc.add_text(fields.tag_terms, category);
        }
        for interface in &self.provides {
            doc.add_text(fields.provides, interface);
        }
        for interface in &self.requires {
            doc.add_text(fields.requires, interface);
        }
        for group in self.read_acl.iter() {
            doc.add_text(fields.read_acl, group);
        }

        doc.add_u64(fields.total_downloads, self.total_downloads);

        doc
    }

    /// Rebuild a document from its stored fields
    pub fn from_tantivy_doc(doc: &TantivyDocument, fields: &DocumentFields) -> SearchResult<Self> {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let texts = |field: Field| -> Vec<String> {
            doc.get_all(field)
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        };

        let id_text = text(fields.id).unwrap_or_default();
        let corrupt = |reason: &str| SearchError::CorruptDocument {
            id: id_text.clone(),
            reason: reason.to_string(),
        };

        let owner = text(fields.owner).ok_or_else(|| corrupt("missing owner"))?;
        let series = text(fields.series).ok_or_else(|| corrupt("missing series"))?;
        let name = text(fields.name).ok_or_else(|| corrupt("missing name"))?;
        let revision = doc
            .get_first(fields.revision)
            .and_then(|v| v.as_u64())
            .and_then(|r| u32::try_from(r).ok())
            .ok_or_else(|| corrupt("missing revision"))?;
        let promulgated_revision = doc
            .get_first(fields.promulgated_revision)
            .and_then(|v| v.as_i64())
            .and_then(|r| u32::try_from(r).ok());
        let kind = text(fields.kind)
            .and_then(|k| k.parse::<ArtifactKind>().ok())
            .ok_or_else(|| corrupt("missing type"))?;
        let total_downloads = doc
            .get_first(fields.total_downloads)
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(Self {
            id: ResolvedRef::new(
                ArtifactRef::new(owner, series, name, revision),
                promulgated_revision,
            ),
            kind,
            summary: text(fields.summary).unwrap_or_default(),
            description: text(fields.description).unwrap_or_default(),
            tags: texts(fields.tags),
            categories: texts(fields.categories),
            provides: texts(fields.provides),
            requires: texts(fields.requires),
            read_acl: texts(fields.read_acl).into_iter().collect(),
            total_downloads,
        })
    }
}

/// Resolved handles for every field of the artifact schema
#[derive(Debug, Clone, Copy)]
pub struct DocumentFields {
    pub id: Field,
    pub key: Field,
    pub name: Field,
    pub owner: Field,
    pub series: Field,
    pub kind: Field,
    pub revision: Field,
    pub promulgated_revision: Field,
    pub promulgated: Field,
    pub summary: Field,
    pub description: Field,
    pub tags: Field,
    pub categories: Field,
    pub tag_terms: Field,
    pub provides: Field,
    pub requires: Field,
    pub read_acl: Field,
    pub total_downloads: Field,
}

impl DocumentFields {
    /// Look up every field; fails when an existing index has another schema
    pub fn new(schema: &Schema) -> SearchResult<Self> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaError(format!("missing field {:?}", name)))
        };

        Ok(Self {
            id: field(names::ID)?,
            key: field(names::KEY)?,
            name: field(names::NAME)?,
            owner: field(names::OWNER)?,
            series: field(names::SERIES)?,
            kind: field(names::KIND)?,
            revision: field(names::REVISION)?,
            promulgated_revision: field(names::PROMULGATED_REVISION)?,
            promulgated: field(names::PROMULGATED)?,
            summary: field(names::SUMMARY)?,
            description: field(names::DESCRIPTION)?,
            tags: field(names::TAGS)?,
            categories: field(names::CATEGORIES)?,
            tag_terms: field(names::TAG_TERMS)?,
            provides: field(names::PROVIDES)?,
            requires: field(names::REQUIRES)?,
            read_acl: field(names::READ_ACL)?,
            total_downloads: field(names::TOTAL_DOWNLOADS)?,
        })
    }
}

/// Build the search schema for charms and bundles
pub fn build_artifact_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // Identity - exact terms, stored
    schema_builder.add_text_field(names::ID, STRING | STORED);
    schema_builder.add_text_field(names::KEY, STRING);
    schema_builder.add_text_field(names::OWNER, STRING | STORED);
    schema_builder.add_text_field(names::SERIES, STRING | STORED);
    schema_builder.add_text_field(names::KIND, STRING | STORED);
    schema_builder.add_u64_field(names::REVISION, STORED);
    schema_builder.add_i64_field(names::PROMULGATED_REVISION, STORED);
    schema_builder.add_u64_field(names::PROMULGATED, INDEXED | STORED | FAST);

    // Full-text fields
    schema_builder.add_text_field(names::NAME, TEXT | STORED);
    schema_builder.add_text_field(names::SUMMARY, TEXT | STORED);
    schema_builder.add_text_field(names::DESCRIPTION, TEXT | STORED);
    schema_builder.add_text_field(names::TAGS, TEXT | STORED);
    schema_builder.add_text_field(names::CATEGORIES, TEXT | STORED);

    // Facets - exact, multi-valued
    schema_builder.add_text_field(names::TAG_TERMS, STRING);
    schema_builder.add_text_field(names::PROVIDES, STRING | STORED);
    schema_builder.add_text_field(names::REQUIRES, STRING | STORED);
    schema_builder.add_text_field(names::READ_ACL, STRING | STORED);

    // Popularity signal, read by the scorer
    schema_builder.add_u64_field(names::TOTAL_DOWNLOADS, INDEXED | STORED | FAST);

    schema_builder.build()
}
