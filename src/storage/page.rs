// Page-based row storage
// Rows live in fixed-capacity pages; a deleted row leaves an empty slot
// behind so that row ids (page * capacity + slot) never move

use super::Row;

/// A fixed-capacity block of row slots
#[derive(Debug, Clone)]
pub struct Page {
    pub id: usize,
    slots: Vec<Option<Row>>,
    pub max_rows: usize,
}

impl Page {
    pub fn new(id: usize, max_rows: usize) -> Self {
        Self {
            id,
            slots: Vec::with_capacity(max_rows),
            max_rows,
        }
    }

    /// Append a row, returning its slot or handing the row back when full
    pub fn insert(&mut self, row: Row) -> Result<usize, Row> {
        if self.is_full() {
            return Err(row);
        }

        self.slots.push(Some(row));
        Ok(self.slots.len() - 1)
    }

    /// A page is full once every slot was handed out, live or deleted
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_rows
    }

    pub fn get(&self, slot: usize) -> Option<&Row> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Row> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Delete the row in a slot, returning it
    pub fn delete(&mut self, slot: usize) -> Option<Row> {
        self.slots.get_mut(slot)?.take()
    }

    /// Number of live rows
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, row)| row.as_ref().map(|row| (slot, row)))
    }
}

/// Owns every page of a table and maps row ids onto slots
#[derive(Debug)]
pub struct PageManager {
    pages: Vec<Page>,
    max_rows_per_page: usize,
}

impl PageManager {
    pub fn new(max_rows_per_page: usize) -> Self {
        Self {
            pages: Vec::new(),
            max_rows_per_page: max_rows_per_page.max(1),
        }
    }

    /// Insert a row and return its row id
    ///
    /// Only the last page can have free slots since deleted slots are
    /// never reused.
    pub fn insert(&mut self, row: Row) -> usize {
        let row = match self.pages.last_mut() {
            Some(page) => match page.insert(row) {
                Ok(slot) => return page.id * self.max_rows_per_page + slot,
                Err(row) => row,
            },
            None => row,
        };

        let page_id = self.pages.len();
        let mut page = Page::new(page_id, self.max_rows_per_page);
        page.slots.push(Some(row));
        self.pages.push(page);

        page_id * self.max_rows_per_page
    }

    pub fn get(&self, row_id: usize) -> Option<&Row> {
        let (page_id, slot) = self.locate(row_id);
        self.pages.get(page_id)?.get(slot)
    }

    pub fn get_mut(&mut self, row_id: usize) -> Option<&mut Row> {
        let (page_id, slot) = self.locate(row_id);
        self.pages.get_mut(page_id)?.get_mut(slot)
    }

    pub fn delete(&mut self, row_id: usize) -> Option<Row> {
        let (page_id, slot) = self.locate(row_id);
        self.pages.get_mut(page_id)?.delete(slot)
    }

    /// Every live row with its row id, in insertion order
    pub fn scan(&self) -> Vec<(usize, &Row)> {
        self.pages
            .iter()
            .flat_map(|page| {
                page.live()
                    .map(move |(slot, row)| (page.id * self.max_rows_per_page + slot, row))
            })
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    fn locate(&self, row_id: usize) -> (usize, usize) {
        (
            row_id / self.max_rows_per_page,
            row_id % self.max_rows_per_page,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    fn row(i: i64) -> Row {
        Row::new(vec![Value::Integer(i)])
    }

    #[test]
    fn test_row_ids_survive_deletes() {
        let mut pages = PageManager::new(2);
        let ids: Vec<usize> = (0..5).map(|i| pages.insert(row(i))).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        assert_eq!(pages.delete(1), Some(row(1)));
        assert_eq!(pages.delete(1), None);
        assert_eq!(pages.get(2), Some(&row(2)));
        assert_eq!(pages.total_rows(), 4);

        let scanned: Vec<usize> = pages.scan().into_iter().map(|(id, _)| id).collect();
        assert_eq!(scanned, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_deleted_slots_are_not_reused() {
        let mut pages = PageManager::new(2);
        pages.insert(row(0));
        pages.insert(row(1));
        pages.delete(0);

        assert_eq!(pages.insert(row(2)), 2);
    }
}
