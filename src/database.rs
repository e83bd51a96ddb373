use crate::access::{Row, Table, TableSchema, Value};
use crate::catalog::Catalog;
use crate::storage::cache::{GclockCache, DEFAULT_CACHE_CAPACITY};
use crate::storage::disk::Pager;
use crate::storage::page::PageIndex;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Tunables for opening a database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maximum number of pages kept mapped at once
    pub cache_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// High-level database interface: a pager, its catalog, and the tables the
/// catalog describes.
pub struct Database {
    pager: Pager,
    catalog: Catalog,
}

impl Database {
    /// Create a new database at the specified path
    pub fn create(path: &Path) -> Result<Self> {
        Self::create_with_config(path, &DatabaseConfig::default())
    }

    pub fn create_with_config(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if path.exists() {
            bail!("Database file already exists at {:?}", path);
        }

        let pager = Self::open_pager(path, config)?;
        let catalog = Catalog::initialize(pager.clone())?;

        Ok(Self { pager, catalog })
    }

    /// Open an existing database
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, &DatabaseConfig::default())
    }

    pub fn open_with_config(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if !path.exists() {
            bail!("Database file does not exist at {:?}", path);
        }

        let pager = Self::open_pager(path, config)?;
        let catalog = Catalog::open(pager.clone())?;

        Ok(Self { pager, catalog })
    }

    fn open_pager(path: &Path, config: &DatabaseConfig) -> Result<Pager> {
        let cache = Box::new(GclockCache::new(config.cache_capacity));
        Pager::with_cache(path, cache)
            .with_context(|| format!("Failed to open database file {:?}", path))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn create_table(&mut self, name: &str, schema: TableSchema) -> Result<Table> {
        self.catalog.create_table(name, schema)
    }

    /// Open a table for reading/writing
    pub fn open_table(&self, name: &str) -> Result<Table> {
        self.catalog.open_table(name)
    }

    /// Insert a row and record any change to the table's page chain.
    ///
    /// A new tail may be linked before a later write fails, so anchors are
    /// recorded whether or not the insert succeeded.
    pub fn insert(&mut self, table: &mut Table, row: &Row) -> Result<()> {
        let anchors = (table.first_page(), table.last_page());
        let result = table.insert(row);
        self.persist_moved_anchors(table, anchors)?;
        Ok(result?)
    }

    pub fn select(&self, table: &Table, column: &str, value: &Value) -> Result<Row> {
        Ok(table.select(column, value)?)
    }

    pub fn update(
        &mut self,
        table: &mut Table,
        column: &str,
        value: &Value,
        new_row: &Row,
    ) -> Result<()> {
        let anchors = (table.first_page(), table.last_page());
        let result = table.update(column, value, new_row);
        self.persist_moved_anchors(table, anchors)?;
        Ok(result?)
    }

    fn persist_moved_anchors(
        &mut self,
        table: &Table,
        before: (Option<PageIndex>, Option<PageIndex>),
    ) -> Result<()> {
        if before != (table.first_page(), table.last_page()) {
            self.catalog.persist_anchors(table)?;
        }
        Ok(())
    }

    /// Release the backing file. Every change has already been flushed.
    pub fn close(self) {
        self.pager.close();
    }
}
