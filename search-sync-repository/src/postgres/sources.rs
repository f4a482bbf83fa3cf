//! Where each entity type lives in the relational schema.

use search_sync_shared::EntityType;
use sqlx::{Postgres, QueryBuilder};

use crate::types::FetchFilter;

/// Tables and predicates backing one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntitySource {
    /// Base table, aliased `e` in queries.
    pub table: &'static str,
    /// Inclusion predicate over `e`, always applied.
    pub eligibility: &'static str,
    pub metrics_table: &'static str,
    pub tags_table: &'static str,
    /// Column referencing the base row in both the metrics and tag tables.
    pub foreign_key: &'static str,
}

impl EntitySource {
    pub fn of(entity_type: EntityType) -> &'static EntitySource {
        match entity_type {
            EntityType::Articles => &ARTICLE,
            EntityType::Images => &IMAGE,
            EntityType::Models => &MODEL,
        }
    }

    /// One page of eligible base rows matching `filter`, ordered by id.
    pub fn page_query<'a>(
        &self,
        filter: &'a FetchFilter,
        offset: i64,
        limit: i64,
    ) -> QueryBuilder<'a, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            r#"SELECT e.id::bigint AS id,
                (e."createdAt" AT TIME ZONE 'UTC') AS created_at,
                (e."updatedAt" AT TIME ZONE 'UTC') AS updated_at,
                to_jsonb(e) AS columns
            FROM "{}" e
            WHERE ({})"#,
            self.table, self.eligibility
        ));

        if let Some(since) = filter.since {
            let since = since.naive_utc();
            builder.push(r#" AND (e."createdAt" > "#);
            builder.push_bind(since);
            builder.push(r#" OR e."updatedAt" > "#);
            builder.push_bind(since);
            if !filter.dirty_ids.is_empty() {
                builder.push(" OR e.id = ANY(");
                builder.push_bind(filter.dirty_ids.iter().copied().collect::<Vec<i64>>());
                builder.push(")");
            }
            builder.push(")");
        }

        builder.push(" ORDER BY e.id LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);
        builder
    }

    /// Metrics rows of a set of entities; `$1` is the id array.
    pub fn metrics_sql(&self) -> String {
        format!(
            r#"SELECT m."{fk}"::bigint AS entity_id,
                m.timeframe::text AS timeframe,
                to_jsonb(m) - '{fk}' - 'timeframe' AS values
            FROM "{table}" m
            WHERE m."{fk}" = ANY($1)"#,
            fk = self.foreign_key,
            table = self.metrics_table
        )
    }

    /// Tag names of a set of entities; `$1` is the id array.
    pub fn tags_sql(&self) -> String {
        format!(
            r#"SELECT t."{fk}"::bigint AS entity_id,
                tag.id::bigint AS tag_id,
                tag.name AS name
            FROM "{table}" t
            JOIN "Tag" tag ON tag.id = t."tagId"
            WHERE t."{fk}" = ANY($1)
            ORDER BY t."{fk}", tag.name"#,
            fk = self.foreign_key,
            table = self.tags_table
        )
    }
}

static ARTICLE: EntitySource = EntitySource {
    table: "Article",
    eligibility: r#"e."publishedAt" IS NOT NULL AND e."tosViolation" = false"#,
    metrics_table: "ArticleMetric",
    tags_table: "TagsOnArticle",
    foreign_key: "articleId",
};

static IMAGE: EntitySource = EntitySource {
    table: "Image",
    eligibility: r#"e.ingestion = 'Scanned' AND e."tosViolation" = false AND e."needsReview" IS NULL"#,
    metrics_table: "ImageMetric",
    tags_table: "TagsOnImage",
    foreign_key: "imageId",
};

static MODEL: EntitySource = EntitySource {
    table: "Model",
    eligibility: r#"e.status = 'Published' AND e."tosViolation" = false"#,
    metrics_table: "ModelMetric",
    tags_table: "TagsOnModels",
    foreign_key: "modelId",
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    #[test]
    fn test_full_scan_query_has_no_change_filter() {
        let filter = FetchFilter::full_scan();
        let builder = EntitySource::of(EntityType::Models).page_query(&filter, 0, 1000);
        let sql = builder.sql();

        assert!(sql.contains(r#"FROM "Model" e"#));
        assert!(sql.contains("e.status = 'Published'"));
        assert!(!sql.contains(r#"e."updatedAt" >"#));
        assert!(sql.contains("ORDER BY e.id LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_incremental_query_binds_watermark_and_dirty_ids() {
        let filter = FetchFilter::incremental(Utc::now(), BTreeSet::from([7, 9]));
        let builder = EntitySource::of(EntityType::Articles).page_query(&filter, 2000, 1000);
        let sql = builder.sql();

        assert!(sql.contains(r#"e."publishedAt" IS NOT NULL"#));
        assert!(sql.contains(r#"AND (e."createdAt" > $1 OR e."updatedAt" > $2 OR e.id = ANY($3))"#));
        assert!(sql.contains("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn test_incremental_query_without_dirty_ids() {
        let filter = FetchFilter::incremental(Utc::now(), BTreeSet::new());
        let builder = EntitySource::of(EntityType::Images).page_query(&filter, 0, 10);
        assert!(!builder.sql().contains("ANY("));
    }

    #[test]
    fn test_nested_row_queries_use_foreign_key() {
        let source = EntitySource::of(EntityType::Images);
        assert!(source.metrics_sql().contains(r#"m."imageId" = ANY($1)"#));
        assert!(source.tags_sql().contains(r#"FROM "TagsOnImage" t"#));
    }
}
