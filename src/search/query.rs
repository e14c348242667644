//! Translation of search requests into tantivy queries

use crate::models::AccessContext;
use crate::search::document::DocumentFields;
use crate::search::error::{SearchError, SearchResult};
use crate::search::params::{FilterField, SearchRequest};
use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur,
    PhraseQuery, Query, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

/// Relative weight of name matches in free-text search
const NAME_BOOST: f32 = 5.0;

/// Relative weight of tag and category matches in free-text search
const TAG_BOOST: f32 = 2.0;

/// Popularity adjustment applied on top of text relevance.
///
/// `score = relevance * (1 + weight * ln(1 + downloads)) * promulgated`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBoost {
    pub download_weight: f32,
    pub promulgated: f32,
}

impl ScoreBoost {
    pub fn new(download_weight: f32, promulgated: f32) -> Self {
        Self {
            download_weight,
            promulgated,
        }
    }

    /// Multiplier for a download count; 1.0 for an artifact never downloaded
    pub fn popularity(&self, downloads: u64) -> f32 {
        1.0 + self.download_weight * (downloads as f32).ln_1p()
    }

    pub fn apply(&self, relevance: f32, downloads: u64, promulgated: bool) -> f32 {
        let score = relevance * self.popularity(downloads);
        if promulgated {
            score * self.promulgated
        } else {
            score
        }
    }
}

/// Which side of a relation an interface is looked up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Provides,
    Requires,
}

/// Builds tantivy queries against the artifact schema
pub struct QueryBuilder<'a> {
    index: &'a Index,
    fields: &'a DocumentFields,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(index: &'a Index, fields: &'a DocumentFields) -> Self {
        Self { index, fields }
    }

    /// Text AND every filter AND, for non-admins, the read ACL.
    ///
    /// Only the text clause contributes to relevance; when there is no text
    /// every match scores 1.0 and ordering comes from the popularity boost.
    pub fn build(
        &self,
        request: &SearchRequest,
        access: &AccessContext,
    ) -> SearchResult<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        let text = match self.text_query(&request.text, request.auto_complete)? {
            Some(query) => query,
            None => Box::new(AllQuery),
        };
        clauses.push((Occur::Must, text));

        for (field, values) in request.filters.iter() {
            let filter = self.filter_query(field, values)?;
            clauses.push((Occur::Must, Self::unscored(filter)));
        }

        if let Some(acl) = self.acl_query(access) {
            clauses.push((Occur::Must, Self::unscored(acl)));
        }

        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    /// Documents related to `interfaces` on the given side, visible to `access`
    pub fn interface_query(
        &self,
        relation: Relation,
        interfaces: &[String],
        access: &AccessContext,
    ) -> Box<dyn Query> {
        let field = match relation {
            Relation::Provides => self.fields.provides,
            Relation::Requires => self.fields.requires,
        };
        let any_interface = Self::any_of(
            interfaces
                .iter()
                .map(|iface| Self::term(Term::from_field_text(field, iface)))
                .collect(),
        );

        let mut clauses = vec![(Occur::Must, any_interface)];
        if let Some(acl) = self.acl_query(access) {
            clauses.push((Occur::Must, acl));
        }
        Box::new(BooleanQuery::new(clauses))
    }

    fn text_query(&self, text: &str, auto_complete: bool) -> SearchResult<Option<Box<dyn Query>>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let query = if auto_complete {
            self.prefix_query(text)?
        } else {
            self.full_text_query(text)?
        };
        Ok(Some(query))
    }

    /// Every analyzed word must prefix a word of the name
    fn prefix_query(&self, text: &str) -> SearchResult<Box<dyn Query>> {
        let prefixes: Vec<(Occur, Box<dyn Query>)> = self
            .analyze(self.fields.name, text)?
            .into_iter()
            .map(|term| {
                let query: Box<dyn Query> = Box::new(FuzzyTermQuery::new_prefix(term, 0, true));
                (Occur::Must, query)
            })
            .collect();

        if prefixes.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }
        Ok(Box::new(BooleanQuery::new(prefixes)))
    }

    /// Any analyzed word in any text field, or any whitespace token as an
    /// owner. Free text carries no query syntax.
    fn full_text_query(&self, text: &str) -> SearchResult<Box<dyn Query>> {
        let f = self.fields;
        let weighted = [
            (f.name, NAME_BOOST),
            (f.summary, 1.0),
            (f.description, 1.0),
            (f.tags, TAG_BOOST),
            (f.categories, TAG_BOOST),
        ];

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (field, boost) in weighted {
            for term in self.analyze(field, text)? {
                let query: Box<dyn Query> = Box::new(BoostQuery::new(Self::term(term), boost));
                clauses.push((Occur::Should, query));
            }
        }
        for token in text.split_whitespace() {
            clauses.push((Occur::Should, Self::term(Term::from_field_text(f.owner, token))));
        }

        if clauses.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    /// OR of the per-value queries for one filter field
    fn filter_query(&self, field: FilterField, values: &[String]) -> SearchResult<Box<dyn Query>> {
        let queries = values
            .iter()
            .map(|value| self.value_query(field, value))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Self::any_of(queries))
    }

    fn value_query(&self, field: FilterField, value: &str) -> SearchResult<Box<dyn Query>> {
        let f = self.fields;
        let query = match field {
            FilterField::Name => self.phrase(f.name, value)?,
            FilterField::Summary => self.phrase(f.summary, value)?,
            FilterField::Description => self.phrase(f.description, value)?,
            FilterField::Owner if value.is_empty() => {
                // the unnamespaced alias only exists for promulgated artifacts
                Self::term(Term::from_field_u64(f.promulgated, 1))
            }
            FilterField::Owner => Self::term(Term::from_field_text(f.owner, value)),
            FilterField::Series => Self::term(Term::from_field_text(f.series, value)),
            FilterField::Type => Self::term(Term::from_field_text(f.kind, value)),
            FilterField::Provides => Self::all_tokens(f.provides, value),
            FilterField::Requires => Self::all_tokens(f.requires, value),
            FilterField::Tags => Self::all_tokens(f.tag_terms, value),
            FilterField::Promulgated => {
                Self::term(Term::from_field_u64(f.promulgated, u64::from(value == "1")))
            }
        };
        Ok(query)
    }

    /// Any of the requester's groups in the read ACL; `None` for admins
    fn acl_query(&self, access: &AccessContext) -> Option<Box<dyn Query>> {
        if access.is_admin() {
            return None;
        }
        Some(Self::any_of(
            access
                .groups()
                .iter()
                .map(|group| Self::term(Term::from_field_text(self.fields.read_acl, group)))
                .collect(),
        ))
    }

    /// Phrase match on an analyzed field; a value without tokens matches all
    fn phrase(&self, field: Field, value: &str) -> SearchResult<Box<dyn Query>> {
        let mut terms = self.analyze(field, value)?;
        Ok(match terms.len() {
            0 => Box::new(AllQuery),
            1 => Self::term(terms.remove(0)),
            _ => Box::new(PhraseQuery::new(terms)),
        })
    }

    /// Every whitespace-separated token must be present
    fn all_tokens(field: Field, value: &str) -> Box<dyn Query> {
        let clauses: Vec<(Occur, Box<dyn Query>)> = value
            .split_whitespace()
            .map(|token| (Occur::Must, Self::term(Term::from_field_text(field, token))))
            .collect();
        if clauses.is_empty() {
            Box::new(AllQuery)
        } else {
            Box::new(BooleanQuery::new(clauses))
        }
    }

    /// Run `text` through the tokenizer configured for `field`
    fn analyze(&self, field: Field, text: &str) -> SearchResult<Vec<Term>> {
        let mut analyzer = self
            .index
            .tokenizer_for_field(field)
            .map_err(SearchError::backend("cannot resolve tokenizer"))?;

        let mut terms = Vec::new();
        let mut stream = analyzer.token_stream(text);
        stream.process(&mut |token| terms.push(Term::from_field_text(field, &token.text)));
        Ok(terms)
    }

    fn term(term: Term) -> Box<dyn Query> {
        Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
    }

    fn any_of(mut queries: Vec<Box<dyn Query>>) -> Box<dyn Query> {
        if queries.len() == 1 {
            return queries.remove(0);
        }
        Box::new(BooleanQuery::new(
            queries.into_iter().map(|q| (Occur::Should, q)).collect(),
        ))
    }

    fn unscored(query: Box<dyn Query>) -> Box<dyn Query> {
        Box::new(ConstScoreQuery::new(query, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popularity_is_monotonic_and_saturating() {
        let boost = ScoreBoost::new(0.5, 1.25);
        assert_eq!(boost.popularity(0), 1.0);

        let mut previous = boost.popularity(0);
        for downloads in [1, 10, 100, 1_000, 1_000_000] {
            let current = boost.popularity(downloads);
            assert!(current > previous);
            previous = current;
        }

        // a thousandfold increase in downloads is far from a thousandfold boost
        assert!(boost.popularity(1_000_000) / boost.popularity(1_000) < 2.0);
    }

    #[test]
    fn test_boost_never_lowers_relevance() {
        let boost = ScoreBoost::new(0.5, 1.25);
        assert_eq!(boost.apply(2.0, 0, false), 2.0);
        assert_eq!(boost.apply(2.0, 0, true), 2.5);
        assert!(boost.apply(2.0, 57, false) > 2.0);
    }

    #[test]
    fn test_zero_weight_disables_popularity() {
        let boost = ScoreBoost::new(0.0, 1.0);
        assert_eq!(boost.apply(3.0, 1_000_000, true), 3.0);
    }
}
