//! Entity catalogue.
//!
//! One [`EntityDefinition`] per [`EntityType`]: the logical index it lives in,
//! its primary key, the document schema and the attribute settings the index
//! must carry.

use crate::types::{DocumentSchema, EntityType, FieldSpec, IndexSettings};

use crate::types::FieldSource::{Column, CreatedAt, Id, Metric, Tags, UpdatedAt};
use crate::types::FieldType::{Boolean, Float, Integer, Text, TextList, Timestamp};

/// Suffix appended to a logical index name to form its shadow index.
pub const SHADOW_INDEX_SUFFIX: &str = "_new";

/// Everything the engine needs to know about one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDefinition {
    pub entity_type: EntityType,
    pub primary_key: &'static str,
    pub schema: DocumentSchema,
    pub searchable: &'static [&'static str],
    pub sortable: &'static [&'static str],
    pub filterable: &'static [&'static str],
}

impl EntityDefinition {
    /// Look up the definition of an entity type.
    pub fn of(entity_type: EntityType) -> &'static EntityDefinition {
        match entity_type {
            EntityType::Articles => &ARTICLES,
            EntityType::Images => &IMAGES,
            EntityType::Models => &MODELS,
        }
    }

    /// Logical (live) index name.
    pub fn index_name(&self) -> &'static str {
        self.entity_type.index_name()
    }

    /// Physical name of the index a full rebuild is built into.
    pub fn shadow_index_name(&self) -> String {
        format!("{}{}", self.index_name(), SHADOW_INDEX_SUFFIX)
    }

    pub fn settings(&self) -> IndexSettings {
        IndexSettings::new(self.searchable, self.sortable, self.filterable)
    }
}

static ARTICLES: EntityDefinition = EntityDefinition {
    entity_type: EntityType::Articles,
    primary_key: "id",
    schema: DocumentSchema {
        fields: &[
            FieldSpec::required("id", Id, Integer),
            FieldSpec::required("title", Column("title"), Text),
            FieldSpec::nullable("content", Column("content"), Text),
            FieldSpec::nullable("cover", Column("cover"), Text),
            FieldSpec::required("nsfw", Column("nsfw"), Boolean),
            FieldSpec::required("userId", Column("userId"), Integer),
            FieldSpec::nullable("publishedAt", Column("publishedAt"), Timestamp),
            FieldSpec::required("createdAt", CreatedAt, Timestamp),
            FieldSpec::required("updatedAt", UpdatedAt, Timestamp),
            FieldSpec::required("tags", Tags, TextList),
            FieldSpec::required("favoriteCount", Metric("favoriteCount"), Integer),
            FieldSpec::required("commentCount", Metric("commentCount"), Integer),
            FieldSpec::required("likeCount", Metric("likeCount"), Integer),
            FieldSpec::required("viewCount", Metric("viewCount"), Integer),
        ],
    },
    searchable: &["title", "content", "tags"],
    sortable: &[
        "createdAt",
        "publishedAt",
        "favoriteCount",
        "commentCount",
        "likeCount",
        "viewCount",
        "id",
    ],
    filterable: &["id", "tags", "nsfw", "userId"],
};

static IMAGES: EntityDefinition = EntityDefinition {
    entity_type: EntityType::Images,
    primary_key: "id",
    schema: DocumentSchema {
        fields: &[
            FieldSpec::required("id", Id, Integer),
            FieldSpec::required("url", Column("url"), Text),
            FieldSpec::nullable("hash", Column("hash"), Text),
            FieldSpec::nullable("width", Column("width"), Integer),
            FieldSpec::nullable("height", Column("height"), Integer),
            FieldSpec::required("nsfw", Column("nsfw"), Boolean),
            FieldSpec::required("userId", Column("userId"), Integer),
            FieldSpec::nullable("postId", Column("postId"), Integer),
            FieldSpec::required("createdAt", CreatedAt, Timestamp),
            FieldSpec::required("tags", Tags, TextList),
            FieldSpec::required("reactionCount", Metric("reactionCount"), Integer),
            FieldSpec::required("commentCount", Metric("commentCount"), Integer),
            FieldSpec::required("collectedCount", Metric("collectedCount"), Integer),
        ],
    },
    searchable: &["tags"],
    sortable: &[
        "createdAt",
        "reactionCount",
        "commentCount",
        "collectedCount",
        "id",
    ],
    filterable: &["id", "tags", "nsfw", "userId", "postId"],
};

static MODELS: EntityDefinition = EntityDefinition {
    entity_type: EntityType::Models,
    primary_key: "id",
    schema: DocumentSchema {
        fields: &[
            FieldSpec::required("id", Id, Integer),
            FieldSpec::required("name", Column("name"), Text),
            FieldSpec::nullable("description", Column("description"), Text),
            FieldSpec::required("type", Column("type"), Text),
            FieldSpec::required("nsfw", Column("nsfw"), Boolean),
            FieldSpec::required("userId", Column("userId"), Integer),
            FieldSpec::nullable("lastVersionAt", Column("lastVersionAt"), Timestamp),
            FieldSpec::required("createdAt", CreatedAt, Timestamp),
            FieldSpec::required("updatedAt", UpdatedAt, Timestamp),
            FieldSpec::required("tags", Tags, TextList),
            FieldSpec::required("downloadCount", Metric("downloadCount"), Integer),
            FieldSpec::required("favoriteCount", Metric("favoriteCount"), Integer),
            FieldSpec::required("commentCount", Metric("commentCount"), Integer),
            FieldSpec::required("rating", Metric("rating"), Float),
            FieldSpec::required("ratingCount", Metric("ratingCount"), Integer),
        ],
    },
    searchable: &["name", "description", "tags"],
    sortable: &[
        "createdAt",
        "lastVersionAt",
        "downloadCount",
        "favoriteCount",
        "commentCount",
        "rating",
        "id",
    ],
    filterable: &["id", "tags", "type", "nsfw", "userId"],
};
