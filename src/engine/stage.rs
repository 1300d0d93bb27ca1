use serde_json::Value;

use super::expr::Expr;
use super::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// How a `$project` stage treats one output field.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include,
    Exclude,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Avg(Expr),
    Sum(Expr),
    First(Expr),
}

impl Accumulator {
    /// `{"$sum": 1}`
    pub fn count() -> Self {
        Self::Sum(Expr::literal(1))
    }

    pub fn avg(path: &str) -> Self {
        Self::Avg(Expr::field(path))
    }

    pub fn sum(path: &str) -> Self {
        Self::Sum(Expr::field(path))
    }

    pub fn first(path: &str) -> Self {
        Self::First(Expr::field(path))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub group_by: Expr,
    pub boundaries: Vec<f64>,
    pub default: Option<Value>,
    pub output: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Project(Vec<(String, Projection)>),
    Group {
        id: Expr,
        fields: Vec<(String, Accumulator)>,
    },
    Sort(Vec<(String, SortOrder)>),
    Limit(usize),
    Lookup(Lookup),
    Bucket(Bucket),
    Count(String),
}

/// Ordered list of stages, built fluently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn filter(self, filter: Filter) -> Self {
        self.then(Stage::Match(filter))
    }

    pub fn project<K: Into<String>>(self, fields: impl IntoIterator<Item = (K, Projection)>) -> Self {
        self.then(Stage::Project(
            fields.into_iter().map(|(name, p)| (name.into(), p)).collect(),
        ))
    }

    pub fn group<K: Into<String>>(
        self,
        id: Expr,
        fields: impl IntoIterator<Item = (K, Accumulator)>,
    ) -> Self {
        self.then(Stage::Group {
            id,
            fields: fields.into_iter().map(|(name, acc)| (name.into(), acc)).collect(),
        })
    }

    pub fn sort_by(self, field: impl Into<String>, order: SortOrder) -> Self {
        self.then(Stage::Sort(vec![(field.into(), order)]))
    }

    pub fn limit(self, count: usize) -> Self {
        self.then(Stage::Limit(count))
    }

    pub fn lookup(
        self,
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        self.then(Stage::Lookup(Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        }))
    }

    pub fn bucket(self, bucket: Bucket) -> Self {
        self.then(Stage::Bucket(bucket))
    }

    pub fn count(self, field: impl Into<String>) -> Self {
        self.then(Stage::Count(field.into()))
    }
}
