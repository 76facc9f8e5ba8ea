// Secondary indexes
// Each index maps a column value to the ids of the rows holding it

use super::Value;
use std::collections::BTreeMap;

/// Ordered index over a single column
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    tree: BTreeMap<IndexKey, Vec<usize>>,
    column_name: String,
}

/// `Value` wrapper giving it a total order
///
/// Values of different types have no natural order and compare equal;
/// the executor only ever probes an index with values of the column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey(pub Value);

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .compare(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl BTreeIndex {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            tree: BTreeMap::new(),
            column_name: column_name.into(),
        }
    }

    pub fn insert(&mut self, value: Value, row_id: usize) {
        self.tree.entry(IndexKey(value)).or_default().push(row_id);
    }

    /// Row ids holding `value`, empty when none do
    pub fn lookup(&self, value: &Value) -> &[usize] {
        self.tree
            .get(&IndexKey(value.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn remove(&mut self, value: &Value, row_id: usize) {
        let key = IndexKey(value.clone());

        if let Some(row_ids) = self.tree.get_mut(&key) {
            row_ids.retain(|&id| id != row_id);

            if row_ids.is_empty() {
                self.tree.remove(&key);
            }
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        !self.lookup(value).is_empty()
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Number of distinct indexed values
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btree_insert_and_lookup() {
        let mut index = BTreeIndex::new("id");

        index.insert(Value::Integer(1), 0);
        index.insert(Value::Integer(2), 1);
        index.insert(Value::Integer(1), 2);

        assert_eq!(index.lookup(&Value::Integer(1)), &[0, 2]);
        assert!(index.lookup(&Value::Integer(3)).is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_btree_remove_drops_empty_keys() {
        let mut index = BTreeIndex::new("name");

        index.insert(Value::Text("a".to_string()), 0);
        index.remove(&Value::Text("a".to_string()), 0);

        assert!(!index.contains(&Value::Text("a".to_string())));
        assert!(index.is_empty());
    }
}
