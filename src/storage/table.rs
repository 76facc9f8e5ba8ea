// Table implementation
// A table combines its schema, paged rows and secondary indexes

use super::{btree::BTreeIndex, page::PageManager, Row, Schema, Value};
use anyhow::{anyhow, Result};
use std::collections::HashMap;

pub const DEFAULT_ROWS_PER_PAGE: usize = 100;

pub struct Table {
    pub name: String,
    pub schema: Schema,
    page_manager: PageManager,
    /// Indexes keyed by column name
    indexes: HashMap<String, BTreeIndex>,
}

impl Table {
    /// Create a table; the primary key column is indexed right away
    pub fn new(name: String, schema: Schema, rows_per_page: usize) -> Self {
        let mut table = Self {
            name,
            schema,
            page_manager: PageManager::new(rows_per_page),
            indexes: HashMap::new(),
        };

        if let Some(pk_index) = table.schema.get_primary_key_index() {
            let pk_name = table.schema.columns[pk_index].name.clone();
            table
                .indexes
                .insert(pk_name.clone(), BTreeIndex::new(pk_name));
        }

        table
    }

    /// Insert a full-width row, returning its row id
    pub fn insert(&mut self, values: Vec<Value>) -> Result<usize> {
        if values.len() != self.schema.columns.len() {
            return Err(anyhow!(
                "Expected {} values, got {}",
                self.schema.columns.len(),
                values.len()
            ));
        }

        let values = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| self.check(i, value))
            .collect::<Result<Vec<_>>>()?;

        if let Some(pk_index) = self.schema.get_primary_key_index() {
            self.check_unique(pk_index, &values[pk_index])?;
        }

        let row_id = self.page_manager.insert(Row::new(values.clone()));

        for (col_index, value) in values.into_iter().enumerate() {
            let col_name = &self.schema.columns[col_index].name;
            if let Some(index) = self.indexes.get_mut(col_name) {
                index.insert(value, row_id);
            }
        }

        Ok(row_id)
    }

    /// Rows matching `column = value`, or every row without a filter
    pub fn select(&self, filter: Option<(&str, &Value)>) -> Result<Vec<Row>> {
        Ok(self
            .matching(filter)?
            .into_iter()
            .filter_map(|row_id| self.page_manager.get(row_id).cloned())
            .collect())
    }

    /// Set `column` to `value` on every row matching the filter
    pub fn update(&mut self, filter: (&str, &Value), column: &str, value: Value) -> Result<usize> {
        let col_index = self.column_index(column)?;
        let value = self.check(col_index, value)?;
        let row_ids = self.matching(Some(filter))?;

        if self.schema.columns[col_index].primary_key {
            if row_ids.len() > 1 {
                return Err(anyhow!("Primary key violation: duplicate value"));
            }
            let unchanged = row_ids
                .first()
                .and_then(|id| self.page_manager.get(*id))
                .map_or(false, |row| row.values[col_index] == value);
            if !unchanged && !row_ids.is_empty() {
                self.check_unique(col_index, &value)?;
            }
        }

        for &row_id in &row_ids {
            let Some(row) = self.page_manager.get_mut(row_id) else {
                continue;
            };
            let old = std::mem::replace(&mut row.values[col_index], value.clone());

            if let Some(index) = self.indexes.get_mut(column) {
                index.remove(&old, row_id);
                index.insert(value.clone(), row_id);
            }
        }

        Ok(row_ids.len())
    }

    /// Delete every row matching `column = value`
    pub fn delete(&mut self, filter: (&str, &Value)) -> Result<usize> {
        let row_ids = self.matching(Some(filter))?;

        for &row_id in &row_ids {
            let Some(row) = self.page_manager.delete(row_id) else {
                continue;
            };
            for (col_index, value) in row.values.iter().enumerate() {
                let col_name = &self.schema.columns[col_index].name;
                if let Some(index) = self.indexes.get_mut(col_name) {
                    index.remove(value, row_id);
                }
            }
        }

        Ok(row_ids.len())
    }

    /// Index a column, including every row already stored
    pub fn create_index(&mut self, column_name: &str) -> Result<()> {
        let col_index = self.column_index(column_name)?;

        if self.has_index(column_name) {
            return Err(anyhow!("Index already exists on column: {}", column_name));
        }

        let mut index = BTreeIndex::new(column_name);
        for (row_id, row) in self.page_manager.scan() {
            index.insert(row.values[col_index].clone(), row_id);
        }

        self.indexes.insert(column_name.to_string(), index);
        Ok(())
    }

    pub fn has_index(&self, column_name: &str) -> bool {
        self.indexes.contains_key(column_name)
    }

    pub fn row_count(&self) -> usize {
        self.page_manager.total_rows()
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .get_column_index(name)
            .ok_or_else(|| anyhow!("Column not found: {}", name))
    }

    /// Validate a value against its column definition
    fn check(&self, col_index: usize, value: Value) -> Result<Value> {
        let column = &self.schema.columns[col_index];

        if value.is_null() && (!column.nullable || column.primary_key) {
            return Err(anyhow!("Column '{}' cannot be NULL", column.name));
        }
        if !value.fits(&column.data_type) {
            return Err(anyhow!(
                "Type mismatch for column '{}': expected {:?}, got {}",
                column.name,
                column.data_type,
                value
            ));
        }

        Ok(value.coerce(&column.data_type))
    }

    fn check_unique(&self, col_index: usize, value: &Value) -> Result<()> {
        let col_name = &self.schema.columns[col_index].name;
        let taken = match self.indexes.get(col_name) {
            Some(index) => index.contains(value),
            None => self
                .page_manager
                .scan()
                .iter()
                .any(|(_, row)| &row.values[col_index] == value),
        };

        if taken {
            return Err(anyhow!("Primary key violation: duplicate value"));
        }
        Ok(())
    }

    /// Row ids matching the filter, using an index when one exists
    fn matching(&self, filter: Option<(&str, &Value)>) -> Result<Vec<usize>> {
        let Some((column, value)) = filter else {
            return Ok(self.page_manager.scan().into_iter().map(|(id, _)| id).collect());
        };

        let col_index = self.column_index(column)?;
        let value = value.clone().coerce(&self.schema.columns[col_index].data_type);

        if let Some(index) = self.indexes.get(column) {
            return Ok(index.lookup(&value).to_vec());
        }

        Ok(self
            .page_manager
            .scan()
            .into_iter()
            .filter(|(_, row)| row.values[col_index] == value)
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Column, DataType};

    fn users() -> Table {
        let column = |name: &str, data_type, primary_key| Column {
            name: name.to_string(),
            data_type,
            primary_key,
            nullable: true,
        };
        Table::new(
            "users".to_string(),
            Schema::new(vec![
                column("id", DataType::Integer, true),
                column("name", DataType::Text, false),
            ]),
            DEFAULT_ROWS_PER_PAGE,
        )
    }

    #[test]
    fn test_primary_key_is_unique() {
        let mut table = users();
        table.insert(vec![Value::Integer(1), "a".into()]).unwrap();

        let err = table.insert(vec![Value::Integer(1), "b".into()]).unwrap_err();
        assert!(err.to_string().contains("Primary key violation"));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_delete_removes_rows_and_index_entries() {
        let mut table = users();
        table.insert(vec![Value::Integer(1), "a".into()]).unwrap();
        table.insert(vec![Value::Integer(2), "b".into()]).unwrap();

        assert_eq!(table.delete(("id", &Value::Integer(1))).unwrap(), 1);
        assert_eq!(table.row_count(), 1);
        assert!(table.select(Some(("id", &Value::Integer(1)))).unwrap().is_empty());

        table.insert(vec![Value::Integer(1), "c".into()]).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_update_keeps_index_in_sync() {
        let mut table = users();
        table.insert(vec![Value::Integer(1), "a".into()]).unwrap();
        assert!(table.has_index("id"));
        assert!(!table.has_index("name"));
        table.create_index("name").unwrap();
        assert!(table.has_index("name"));
        assert!(table.create_index("name").is_err());

        table.update(("id", &Value::Integer(1)), "name", "z".into()).unwrap();

        let rows = table.select(Some(("name", &Value::from("z")))).unwrap();
        assert_eq!(rows, vec![Row::new(vec![Value::Integer(1), "z".into()])]);
        assert!(table.select(Some(("name", &Value::from("a")))).unwrap().is_empty());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut table = users();
        let err = table.insert(vec!["one".into(), "a".into()]).unwrap_err();
        assert!(err.to_string().contains("Type mismatch"));
    }
}
