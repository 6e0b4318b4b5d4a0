use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use std::cmp::Ordering;

use crate::entities::{prelude::*, services};
use crate::models::search::SearchFilters;
use crate::models::service::{
    EnrichedFields, PriceTier, ServiceInput, ServiceRecord, clamp_rating, clamp_relevance,
    normalize_keywords,
};

const TITLE_WEIGHT: f64 = 3.0;
const KEYWORD_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;

const LIKE_ESCAPE: char = '\\';

/// Text query against the listings table.
#[derive(Debug, Clone)]
pub struct TextQuery<'a> {
    pub text: &'a str,
    pub filters: &'a SearchFilters,
    pub include_premium: bool,
    pub offset: u64,
    pub limit: u64,
}

pub enum InsertOutcome {
    Inserted(ServiceRecord),
    /// Another row already owns the same source URL.
    Duplicate,
}

pub struct ServiceRepository {
    conn: DatabaseConnection,
}

impl ServiceRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub(crate) fn map_model(model: services::Model) -> ServiceRecord {
        let keywords: Vec<String> = serde_json::from_str(&model.keywords).unwrap_or_default();
        ServiceRecord {
            id: model.id,
            title: model.title,
            description: model.description,
            keywords: normalize_keywords(keywords),
            category_id: model.category_id,
            price_tier: model.price_tier.parse().unwrap_or_default(),
            location: model.location,
            rating: model.rating,
            relevance: model.relevance,
            premium_only: model.premium_only,
            source_url: model.source_url,
            verified: model.verified,
            contact_info: model.contact_info,
            image_url: model.image_url,
            featured: model.featured,
            view_count: model.view_count,
            last_scraped: model.last_scraped,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    fn keywords_json(keywords: &[String]) -> Result<String> {
        let set = normalize_keywords(keywords);
        Ok(serde_json::to_string(&set)?)
    }

    pub async fn get(&self, id: i32) -> Result<Option<ServiceRecord>> {
        let model = Services::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query service by ID")?;
        Ok(model.map(Self::map_model))
    }

    pub async fn get_many(&self, ids: &[i32]) -> Result<Vec<ServiceRecord>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let models = Services::find()
            .filter(services::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(Self::map_model).collect())
    }

    pub async fn list(&self, page: u64, limit: u64) -> Result<(Vec<ServiceRecord>, u64)> {
        let paginator = Services::find()
            .order_by_desc(services::Column::Rating)
            .order_by_asc(services::Column::Id)
            .paginate(&self.conn, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items.into_iter().map(Self::map_model).collect(), total))
    }

    pub async fn list_by_category(
        &self,
        category_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ServiceRecord>, u64)> {
        let paginator = Services::find()
            .filter(services::Column::CategoryId.eq(category_id))
            .order_by_desc(services::Column::Rating)
            .order_by_asc(services::Column::Id)
            .paginate(&self.conn, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items.into_iter().map(Self::map_model).collect(), total))
    }

    pub async fn featured(&self, limit: u64) -> Result<Vec<ServiceRecord>> {
        let models = Services::find()
            .filter(services::Column::Featured.eq(true))
            .order_by_desc(services::Column::Rating)
            .order_by_asc(services::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(Self::map_model).collect())
    }

    pub async fn count_in_category(&self, category_id: i32) -> Result<u64> {
        Ok(Services::find()
            .filter(services::Column::CategoryId.eq(category_id))
            .count(&self.conn)
            .await?)
    }

    pub async fn create(&self, input: &ServiceInput) -> Result<ServiceRecord> {
        match self.insert_if_absent(input).await? {
            InsertOutcome::Inserted(record) => Ok(record),
            InsertOutcome::Duplicate => anyhow::bail!(
                "A service with source URL '{}' already exists",
                input.source_url.as_deref().unwrap_or_default()
            ),
        }
    }

    /// Inserts a listing, reporting a source URL collision instead of failing.
    pub async fn insert_if_absent(&self, input: &ServiceInput) -> Result<InsertOutcome> {
        let now = chrono::Utc::now().to_rfc3339();
        let title = input.title.trim();
        let active_model = services::ActiveModel {
            title: Set(title.to_string()),
            title_folded: Set(fold_title(title)),
            description: Set(input.description.clone()),
            keywords: Set(Self::keywords_json(&input.keywords)?),
            search_text: Set(fold_search_text(
                title,
                &input.description,
                &input.keywords,
            )),
            category_id: Set(input.category_id),
            price_tier: Set(input.price_tier.as_str().to_string()),
            location: Set(input.location.clone()),
            rating: Set(clamp_rating(input.rating)),
            relevance: Set(input.relevance.map(clamp_relevance)),
            premium_only: Set(input.premium_only),
            source_url: Set(input.source_url.clone()),
            verified: Set(input.verified),
            contact_info: Set(input.contact_info.clone()),
            image_url: Set(input.image_url.clone()),
            featured: Set(input.featured),
            view_count: Set(0),
            last_scraped: Set(input.last_scraped.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active_model.insert(&self.conn).await {
            Ok(model) => Ok(InsertOutcome::Inserted(Self::map_model(model))),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e).context("Failed to insert service"),
        }
    }

    pub async fn update(&self, id: i32, input: &ServiceInput) -> Result<Option<ServiceRecord>> {
        let Some(existing) = Services::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let title = input.title.trim();
        let mut active: services::ActiveModel = existing.into();
        active.title = Set(title.to_string());
        active.title_folded = Set(fold_title(title));
        active.description = Set(input.description.clone());
        active.keywords = Set(Self::keywords_json(&input.keywords)?);
        active.search_text = Set(fold_search_text(
            title,
            &input.description,
            &input.keywords,
        ));
        active.category_id = Set(input.category_id);
        active.price_tier = Set(input.price_tier.as_str().to_string());
        active.location = Set(input.location.clone());
        active.rating = Set(clamp_rating(input.rating));
        active.relevance = Set(input.relevance.map(clamp_relevance));
        active.premium_only = Set(input.premium_only);
        active.source_url = Set(input.source_url.clone());
        active.verified = Set(input.verified);
        active.contact_info = Set(input.contact_info.clone());
        active.image_url = Set(input.image_url.clone());
        active.featured = Set(input.featured);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update service")?;
        Ok(Some(Self::map_model(model)))
    }

    pub async fn apply_enrichment(
        &self,
        id: i32,
        fields: &EnrichedFields,
    ) -> Result<Option<ServiceRecord>> {
        let Some(existing) = Services::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();
        let description = fields
            .description
            .clone()
            .unwrap_or_else(|| existing.description.clone());
        let keywords = match &fields.keywords {
            Some(keywords) => keywords.clone(),
            None => serde_json::from_str(&existing.keywords).unwrap_or_default(),
        };
        let search_text = fold_search_text(&existing.title, &description, &keywords);

        let mut active: services::ActiveModel = existing.into();
        active.search_text = Set(search_text);

        if let Some(description) = &fields.description {
            active.description = Set(description.clone());
        }
        if let Some(rating) = fields.rating {
            active.rating = Set(clamp_rating(rating));
        }
        if let Some(relevance) = fields.relevance {
            active.relevance = Set(Some(clamp_relevance(relevance)));
        }
        if let Some(keywords) = &fields.keywords {
            active.keywords = Set(Self::keywords_json(keywords)?);
        }
        if let Some(contact) = &fields.contact_info {
            active.contact_info = Set(Some(contact.clone()));
        }
        if let Some(image) = &fields.image_url {
            active.image_url = Set(Some(image.clone()));
        }
        if let Some(location) = &fields.location {
            active.location = Set(Some(location.clone()));
        }
        active.last_scraped = Set(Some(now.clone()));
        active.updated_at = Set(now);

        let model = active.update(&self.conn).await?;
        Ok(Some(Self::map_model(model)))
    }

    pub async fn delete(&self, id: i32) -> Result<Option<ServiceRecord>> {
        let Some(existing) = Services::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };
        Services::delete_by_id(id).exec(&self.conn).await?;
        Ok(Some(Self::map_model(existing)))
    }

    /// Atomic `view_count = view_count + 1`.
    pub async fn increment_views(&self, id: i32) -> Result<()> {
        Services::update_many()
            .col_expr(
                services::Column::ViewCount,
                Expr::col(services::Column::ViewCount).add(1),
            )
            .filter(services::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn find_by_source_url(&self, source_url: &str) -> Result<Option<ServiceRecord>> {
        let model = Services::find()
            .filter(services::Column::SourceUrl.eq(source_url))
            .one(&self.conn)
            .await?;
        Ok(model.map(Self::map_model))
    }

    /// First listing in `category_id` whose title starts with `prefix`,
    /// compared case-insensitively.
    pub async fn find_by_title_prefix(
        &self,
        category_id: i32,
        prefix: &str,
    ) -> Result<Option<ServiceRecord>> {
        let prefix = prefix.to_lowercase();
        if prefix.is_empty() {
            return Ok(None);
        }

        let candidates = Services::find()
            .filter(services::Column::CategoryId.eq(category_id))
            .filter(services::Column::TitleFolded.like(like_pattern(&prefix, false)))
            .order_by_asc(services::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(candidates
            .into_iter()
            .find(|m| m.title_folded.starts_with(&prefix))
            .map(Self::map_model))
    }

    /// Scored full-text lookup: returns the requested page and the total
    /// number of matching listings.
    pub async fn text_search(&self, query: &TextQuery<'_>) -> Result<(Vec<ServiceRecord>, u64)> {
        let folded = query.text.to_lowercase();
        let terms: Vec<&str> = folded.split_whitespace().collect();
        if terms.is_empty() {
            return Ok((vec![], 0));
        }

        let mut any_term = Condition::any();
        for term in &terms {
            any_term = any_term.add(services::Column::SearchText.like(like_pattern(term, true)));
        }

        let mut select = Services::find().filter(any_term);
        let filters = query.filters;

        if let Some(category_id) = filters.category_id {
            select = select.filter(services::Column::CategoryId.eq(category_id));
        }
        if let Some(tier) = filters.price_tier {
            select = select.filter(services::Column::PriceTier.eq(tier.as_str()));
        }
        if let Some(min_rating) = filters.min_rating {
            select = select.filter(services::Column::Rating.gte(min_rating));
        }
        if !query.include_premium {
            select = select.filter(services::Column::PremiumOnly.eq(false));
        }

        let models = select
            .all(&self.conn)
            .await
            .context("Local text query failed")?;

        let mut scored: Vec<(f64, ServiceRecord)> = models
            .into_iter()
            .map(Self::map_model)
            .filter(|record| matches_location(record, filters.location.as_deref()))
            .filter_map(|record| {
                let score = text_score(&record, &terms);
                (score > 0.0).then_some((score, record))
            })
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| rank_order(a, b))
        });

        let total = scored.len() as u64;
        let page = scored
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .map(|(_, record)| record)
            .collect();

        Ok((page, total))
    }
}

#[must_use]
pub fn fold_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Lowercased text the search pre-filter matches against.
#[must_use]
pub fn fold_search_text(title: &str, description: &str, keywords: &[String]) -> String {
    let mut text = fold_title(title);
    text.push('\n');
    text.push_str(&description.to_lowercase());
    for keyword in normalize_keywords(keywords) {
        text.push('\n');
        text.push_str(&keyword);
    }
    text
}

/// `LIKE` pattern matching `term` literally, as a prefix or anywhere.
fn like_pattern(term: &str, anywhere: bool) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    if anywhere {
        pattern.push('%');
    }
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

fn matches_location(record: &ServiceRecord, location: Option<&str>) -> bool {
    location.is_none_or(|wanted| {
        let wanted = wanted.to_lowercase();
        record
            .location
            .as_deref()
            .is_some_and(|l| l.to_lowercase().contains(&wanted))
    })
}

/// Weighted term hits across title, keywords and description.
#[must_use]
pub fn text_score(record: &ServiceRecord, terms: &[&str]) -> f64 {
    let title = record.title.to_lowercase();
    let description = record.description.to_lowercase();

    terms
        .iter()
        .map(|term| {
            let mut score = 0.0;
            if title.contains(term) {
                score += TITLE_WEIGHT;
            }
            if record.keywords.iter().any(|k| k.contains(term)) {
                score += KEYWORD_WEIGHT;
            }
            if description.contains(term) {
                score += DESCRIPTION_WEIGHT;
            }
            score
        })
        .sum()
}

/// Relevance descending (present before absent), then rating descending,
/// then id ascending.
#[must_use]
pub fn rank_order(a: &ServiceRecord, b: &ServiceRecord) -> Ordering {
    let relevance = match (a.relevance, b.relevance) {
        (Some(ra), Some(rb)) => rb.partial_cmp(&ra).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    relevance
        .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(id: i32, relevance: Option<f64>, rating: f64) -> ServiceRecord {
        ServiceRecord {
            id,
            title: format!("Service {id}"),
            description: String::new(),
            keywords: BTreeSet::new(),
            category_id: 1,
            price_tier: PriceTier::Unspecified,
            location: None,
            rating,
            relevance,
            premium_only: false,
            source_url: None,
            verified: true,
            contact_info: None,
            image_url: None,
            featured: false,
            view_count: 0,
            last_scraped: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_rank_order() {
        let mut records = vec![
            record(1, None, 5.0),
            record(2, Some(40.0), 1.0),
            record(3, Some(90.0), 2.0),
            record(4, Some(40.0), 4.5),
            record(5, None, 3.0),
        ];
        records.sort_by(rank_order);
        let ids: Vec<i32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4, 2, 1, 5]);
    }

    #[test]
    fn test_text_score_weights() {
        let mut r = record(1, None, 0.0);
        r.title = "Emergency Plumber".to_string();
        r.description = "Fixes leaks fast".to_string();
        r.keywords = normalize_keywords(["plumbing", "pipes"]);

        assert_eq!(text_score(&r, &["plumb"]), TITLE_WEIGHT + KEYWORD_WEIGHT);
        assert_eq!(text_score(&r, &["leaks"]), DESCRIPTION_WEIGHT);
        assert_eq!(text_score(&r, &["tutor"]), 0.0);
        assert_eq!(
            text_score(&r, &["emergency", "pipes"]),
            TITLE_WEIGHT + KEYWORD_WEIGHT
        );
    }

    #[test]
    fn test_fold_search_text_lowercases_unicode() {
        let text = fold_search_text(
            "  ÉLECTRICIEN Montréal ",
            "Dépannage RAPIDE",
            &["Éclairage".to_string()],
        );
        assert_eq!(text, "électricien montréal\ndépannage rapide\néclairage");
        assert_eq!(fold_title(" ÉCOLE de Ski "), "école de ski");
    }
}
