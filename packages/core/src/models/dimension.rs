//! Content Dimensions
//!
//! A dimension is a named axis of content variation (for example `language`).
//! Every node record carries, per dimension, the sorted set of values its
//! variant applies to. Requests name the dimension values they accept, in
//! fallback order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping of dimension name to the set of values of one node variant
///
/// Both levels are ordered, so serialization (and therefore [`hash`]) is
/// deterministic regardless of insertion order.
///
/// [`hash`]: DimensionValues::hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionValues(BTreeMap<String, BTreeSet<String>>);

impl DimensionValues {
    /// Create an empty dimension set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one dimension with its values
    ///
    /// # Examples
    ///
    /// ```
    /// # use contentrepo_core::models::DimensionValues;
    /// let dims = DimensionValues::new().with("language", ["en", "de"]);
    /// assert!(dims.contains("language", "de"));
    /// ```
    pub fn with<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, values);
        self
    }

    /// Add values to a dimension, creating it if needed
    pub fn insert<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Values of one dimension, if present
    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.0.get(name)
    }

    /// Whether a dimension contains the given value
    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.0.get(name).is_some_and(|values| values.contains(value))
    }

    /// Iterate over (dimension name, values)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// Dimension names
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deterministic digest of the sorted dimension values
    ///
    /// Part of the uniqueness key (path, workspace, dimensions): two variants of
    /// the same path in the same workspace must differ in this hash.
    pub fn hash(&self) -> String {
        let encoded = serde_json::to_vec(&self.0).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }

    /// Check this variant against a request
    ///
    /// For every requested dimension the variant needs at least one value in
    /// common with the request. Dimensions the request does not mention are
    /// ignored, so an empty request matches everything.
    pub fn matches(&self, requested: &DimensionRequest) -> bool {
        requested.iter().all(|(name, wanted)| {
            self.0
                .get(name)
                .is_some_and(|values| wanted.iter().any(|w| values.contains(w)))
        })
    }

    /// Fallback rank of this variant for a request (lower is preferred)
    ///
    /// For each requested dimension, the position of the first requested value
    /// this variant carries. Returns `None` if the variant does not match.
    pub fn priority(&self, requested: &DimensionRequest) -> Option<Vec<usize>> {
        requested
            .iter()
            .map(|(name, wanted)| {
                let values = self.0.get(name)?;
                wanted.iter().position(|w| values.contains(w))
            })
            .collect()
    }
}

impl<K, V, S> FromIterator<(K, V)> for DimensionValues
where
    K: Into<String>,
    V: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dims = DimensionValues::new();
        for (name, values) in iter {
            dims.insert(name, values);
        }
        dims
    }
}

/// Requested dimension values, per dimension in fallback order
///
/// `{"language": ["de", "en"]}` accepts German variants first and English
/// variants as fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionRequest(BTreeMap<String, Vec<String>>);

impl DimensionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one requested dimension
    pub fn with<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Vec<String>> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&DimensionValues> for DimensionRequest {
    fn from(values: &DimensionValues) -> Self {
        Self(
            values
                .iter()
                .map(|(name, set)| (name.clone(), set.iter().cloned().collect()))
                .collect(),
        )
    }
}
