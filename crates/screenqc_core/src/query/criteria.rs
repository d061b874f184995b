//! Criteria set, validation and clause composition.
//!
//! # Responsibility
//! - Hold the named criteria a caller supplies and turn them into one
//!   conjunction of per-criterion filter clauses.
//! - Render the clauses as an HQL-style query with named bind parameters.
//!
//! # Invariants
//! - Validation happens entirely at `build` time; a `ComposedQuery` is
//!   always well-formed.
//! - Criteria names are deduplicated; the last value set for a name wins.

use crate::query::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value supplied for one named criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriterionValue {
    /// LIKE pattern for text criteria.
    Text(String),
    /// Boolean switch (only `noqc`).
    Flag(bool),
    /// Timestamp window for `daterange`; validated to an ordered pair.
    Window(Vec<i64>),
}

impl From<&str> for CriterionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CriterionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CriterionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<[i64; 2]> for CriterionValue {
    fn from(value: [i64; 2]) -> Self {
        Self::Window(value.to_vec())
    }
}

/// One validated filter clause of a composed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// LIKE on the original file's client path.
    Filename(String),
    /// LIKE on the containing plate's name.
    PlateName(String),
    /// LIKE on the acquisition-run name.
    AcquisitionName(String),
    /// Image carries a tag whose text matches.
    WithTag(String),
    /// Image carries no tag whose text matches.
    WithoutTag(String),
    /// Creation-event time within `[start, end]`, inclusive.
    DateRange { start: i64, end: i64 },
    /// Image is not tagged `#noqc`, directly or via its plate.
    ExcludeNoQc,
}

/// Bind parameter of a rendered query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Text(String),
    Time(i64),
}

/// Named criteria supplied by a caller; build with [`Criteria::build`].
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    entries: BTreeMap<String, CriterionValue>,
}

const NOQC_TAG: &str = "#noqc";

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one named criterion, replacing any previous value for the name.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Validates every criterion and composes the query.
    ///
    /// # Errors
    /// - `UnknownCriterion` for a name outside the recognized set.
    /// - `InvalidCriterion` for a value of the wrong shape.
    /// - `EmptyCriteria` when nothing binds a parameter; a lone
    ///   `noqc` switch trips this rule because it binds none.
    pub fn build(&self) -> QueryResult<ComposedQuery> {
        let mut filters = Vec::new();
        let mut params = BTreeMap::new();
        let mut noqc = false;

        for (name, value) in &self.entries {
            match name.as_str() {
                "filename" | "plate" | "acquisition" | "with_tag" | "without_tag" => {
                    let CriterionValue::Text(pattern) = value else {
                        return Err(QueryError::InvalidCriterion {
                            name: name.clone(),
                            expected: "a text pattern",
                        });
                    };
                    let (filter, param) = match name.as_str() {
                        "filename" => (Filter::Filename(pattern.clone()), "filename"),
                        "plate" => (Filter::PlateName(pattern.clone()), "plate"),
                        "acquisition" => (Filter::AcquisitionName(pattern.clone()), "acquisition"),
                        "with_tag" => (Filter::WithTag(pattern.clone()), "withTag"),
                        _ => (Filter::WithoutTag(pattern.clone()), "withoutTag"),
                    };
                    params.insert(param.to_string(), QueryParam::Text(pattern.clone()));
                    filters.push(filter);
                }
                "daterange" => {
                    let CriterionValue::Window(window) = value else {
                        return Err(QueryError::InvalidCriterion {
                            name: name.clone(),
                            expected: "an ordered [start, end] timestamp pair",
                        });
                    };
                    let [start, end] = window.as_slice() else {
                        return Err(QueryError::InvalidCriterion {
                            name: name.clone(),
                            expected: "an ordered [start, end] timestamp pair",
                        });
                    };
                    if start > end {
                        return Err(QueryError::InvalidCriterion {
                            name: name.clone(),
                            expected: "an ordered [start, end] timestamp pair",
                        });
                    }
                    params.insert("startDate".to_string(), QueryParam::Time(*start));
                    params.insert("endDate".to_string(), QueryParam::Time(*end));
                    filters.push(Filter::DateRange {
                        start: *start,
                        end: *end,
                    });
                }
                "noqc" => {
                    let CriterionValue::Flag(flag) = value else {
                        return Err(QueryError::InvalidCriterion {
                            name: name.clone(),
                            expected: "a boolean",
                        });
                    };
                    noqc = *flag;
                }
                _ => return Err(QueryError::UnknownCriterion(name.clone())),
            }
        }

        // The noqc switch binds its parameter only once something else is
        // being searched for, so a lone `noqc` still reads as empty.
        if params.is_empty() {
            return Err(QueryError::EmptyCriteria);
        }
        if noqc {
            params.insert("noqc".to_string(), QueryParam::Text(NOQC_TAG.to_string()));
            filters.push(Filter::ExcludeNoQc);
        }

        let clauses: Vec<String> = filters.iter().map(render_clause).collect();
        let hql = format!(
            "select image from Image image where {}",
            clauses.join(" and ")
        );

        Ok(ComposedQuery {
            filters,
            hql,
            params,
        })
    }
}

/// Validated, renderable query over images.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    filters: Vec<Filter>,
    hql: String,
    params: BTreeMap<String, QueryParam>,
}

impl ComposedQuery {
    /// Structured clauses, for backends that evaluate rather than parse.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Rendered query text with named `:parameter` placeholders.
    pub fn hql(&self) -> &str {
        &self.hql
    }

    pub fn params(&self) -> &BTreeMap<String, QueryParam> {
        &self.params
    }

    pub fn clause_count(&self) -> usize {
        self.filters.len()
    }
}

fn tag_subquery(param: &str) -> String {
    format!(
        "select img from Image img \
         left outer join img.annotationLinks as links \
         left outer join links.child as annotation \
         where annotation.textValue like :{param}"
    )
}

fn plate_member_subquery(where_clause: &str) -> String {
    format!(
        "select image from Plate plate \
         left outer join plate.plateAcquisition as acquisition \
         left outer join acquisition.wellSample as sample \
         left outer join sample.image as image \
         where {where_clause}"
    )
}

fn render_clause(filter: &Filter) -> String {
    match filter {
        Filter::Filename(_) => "image in ( \
             select image from Image image \
             left outer join image.fileset as fileset \
             left outer join fileset.usedFiles as file \
             where file.clientPath like :filename )"
            .to_string(),
        Filter::PlateName(_) => format!(
            "image in ( {} )",
            plate_member_subquery("plate.name like :plate")
        ),
        Filter::AcquisitionName(_) => format!(
            "image in ( {} )",
            plate_member_subquery("acquisition.name like :acquisition")
        ),
        Filter::WithTag(_) => format!("image in ( {} )", tag_subquery("withTag")),
        Filter::WithoutTag(_) => format!("image not in ( {} )", tag_subquery("withoutTag")),
        Filter::DateRange { .. } => "image in ( \
             select image from Image image \
             left outer join image.details.creationEvent as event \
             where event.time between :startDate and :endDate )"
            .to_string(),
        Filter::ExcludeNoQc => format!(
            "image not in ( {} ) and image not in ( {} )",
            tag_subquery("noqc"),
            plate_member_subquery(
                "plate in ( select p from Plate p \
                 left outer join p.annotationLinks as links \
                 left outer join links.child as annotation \
                 where annotation.textValue like :noqc )"
            )
        ),
    }
}
