use bson::Document;
use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::sort::{Sort, sort_documents};

/// Options for a find: sort, then skip, then limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default)]
    pub sort: Vec<Sort>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply sort, skip and limit to already-filtered documents.
    ///
    /// Without a sort the input is consumed lazily, so skip/limit can stop
    /// the scan early.
    pub fn apply<I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = Document>,
    {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        if self.sort.is_empty() {
            return docs.into_iter().skip(skip).take(limit).collect();
        }

        let mut docs: Vec<Document> = docs.into_iter().collect();
        sort_documents(&mut docs, &self.sort);
        docs.into_iter().skip(skip).take(limit).collect()
    }
}

/// Filter `docs` in order and apply `options`.
///
/// Without a sort, matches keep the order of the input sequence.
pub fn find_in<I>(docs: I, filter: &Filter, options: &FindOptions) -> Vec<Document>
where
    I: IntoIterator<Item = Document>,
{
    options.apply(docs.into_iter().filter(|doc| filter.matches(doc)))
}
