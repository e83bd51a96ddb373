//! System catalog.
//!
//! The catalog is an ordinary [`Table`] whose rows describe every table in the
//! database, itself included: name, page chain anchors and schema. Its chain
//! always starts at page 0.

use crate::access::{AccessError, ColumnDef, DataType, Row, Table, TableSchema, Value};
use crate::storage::{PageIndex, Pager};
use anyhow::{bail, Context, Result};
use log::debug;

pub const CATALOG_TABLE_NAME: &str = "table_dictionary";
pub const CATALOG_FIRST_PAGE: PageIndex = 0;

const NAME_COLUMN: &str = "name";

/// Anchor value stored for a missing page.
const NO_PAGE: i64 = -1;

pub fn catalog_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnDef::new(NAME_COLUMN, DataType::String),
        ColumnDef::new("first_page", DataType::Long),
        ColumnDef::new("last_page", DataType::Long),
        ColumnDef::new("schema", DataType::ColumnDefs),
    ])
    .expect("catalog schema is valid")
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub first_page: Option<PageIndex>,
    pub last_page: Option<PageIndex>,
    pub schema: TableSchema,
}

impl TableInfo {
    pub fn of(table: &Table) -> Self {
        Self {
            name: table.name().to_string(),
            first_page: table.first_page(),
            last_page: table.last_page(),
            schema: table.schema().clone(),
        }
    }

    fn to_row(&self) -> Row {
        Row::new(vec![
            Value::from(self.name.as_str()),
            Value::Long(encode_anchor(self.first_page)),
            Value::Long(encode_anchor(self.last_page)),
            self.schema.to_value(),
        ])
    }

    fn from_row(row: Row) -> Result<Self> {
        match <[Value; 4]>::try_from(row.into_values()) {
            Ok([Value::String(name), Value::Long(first), Value::Long(last), schema]) => {
                Ok(Self {
                    schema: TableSchema::from_value(schema)
                        .with_context(|| format!("Invalid schema stored for table '{}'", name))?,
                    name,
                    first_page: decode_anchor(first),
                    last_page: decode_anchor(last),
                })
            }
            _ => bail!("Malformed catalog row"),
        }
    }

    fn into_table(self, pager: Pager) -> Table {
        Table::open(
            pager,
            self.name,
            self.schema,
            self.first_page,
            self.last_page,
        )
    }
}

fn encode_anchor(anchor: Option<PageIndex>) -> i64 {
    anchor.map_or(NO_PAGE, |index| index as i64)
}

fn decode_anchor(raw: i64) -> Option<PageIndex> {
    (raw >= 0).then_some(raw as PageIndex)
}

pub struct Catalog {
    pager: Pager,
    table: Table,
}

impl Catalog {
    /// Set up the catalog in an empty file.
    pub fn initialize(pager: Pager) -> Result<Self> {
        let page_count = pager.page_count()?;
        if page_count != 0 {
            bail!(
                "Cannot initialize catalog: file already holds {} pages",
                page_count
            );
        }

        let table = Table::create(pager.clone(), CATALOG_TABLE_NAME, catalog_schema());
        let mut catalog = Self { pager, table };

        let own_row = TableInfo::of(&catalog.table).to_row();
        catalog
            .table
            .insert(&own_row)
            .context("Failed to insert catalog entry for the catalog itself")?;
        if catalog.table.first_page() != Some(CATALOG_FIRST_PAGE) {
            bail!(
                "Expected catalog to start at page {}, got {:?}",
                CATALOG_FIRST_PAGE,
                catalog.table.first_page()
            );
        }
        catalog.persist_own_anchors()?;

        Ok(catalog)
    }

    /// Reattach to the catalog of an existing file.
    pub fn open(pager: Pager) -> Result<Self> {
        // The chain itself is authoritative for the tail.
        let mut table = Table::open(
            pager.clone(),
            CATALOG_TABLE_NAME,
            catalog_schema(),
            Some(CATALOG_FIRST_PAGE),
            Some(CATALOG_FIRST_PAGE),
        );
        table
            .recover_tail()
            .context("Failed to walk catalog pages")?;
        debug!(
            "catalog spans pages {}..={:?}",
            CATALOG_FIRST_PAGE,
            table.last_page()
        );

        let catalog = Self { pager, table };
        if catalog.get_table(CATALOG_TABLE_NAME)?.is_none() {
            bail!("Catalog has no entry for itself");
        }

        Ok(catalog)
    }

    /// The catalog's own table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn get_table(&self, name: &str) -> Result<Option<TableInfo>> {
        match self.table.select(NAME_COLUMN, &Value::from(name)) {
            Ok(row) => Ok(Some(TableInfo::from_row(row)?)),
            Err(AccessError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to look up table '{}'", name)),
        }
    }

    /// Register a new, empty table.
    pub fn create_table(&mut self, name: &str, schema: TableSchema) -> Result<Table> {
        if self.get_table(name)?.is_some() {
            bail!("Table '{}' already exists", name);
        }

        let table = Table::create(self.pager.clone(), name, schema);
        self.table
            .insert(&TableInfo::of(&table).to_row())
            .with_context(|| format!("Failed to register table '{}'", name))?;
        self.persist_own_anchors()?;
        debug!("created table {}", name);

        Ok(table)
    }

    pub fn open_table(&self, name: &str) -> Result<Table> {
        let info = self
            .get_table(name)?
            .ok_or_else(|| anyhow::anyhow!("Table '{}' does not exist", name))?;
        let mut table = info.into_table(self.pager.clone());
        table
            .recover_tail()
            .with_context(|| format!("Failed to walk pages of table '{}'", name))?;
        Ok(table)
    }

    /// Store the current page chain anchors of `table`.
    pub fn persist_anchors(&mut self, table: &Table) -> Result<()> {
        let row = TableInfo::of(table).to_row();
        self.table
            .update(NAME_COLUMN, &Value::from(table.name()), &row)
            .with_context(|| format!("Failed to persist anchors of table '{}'", table.name()))?;
        Ok(())
    }

    fn persist_own_anchors(&mut self) -> Result<()> {
        let row = TableInfo::of(&self.table).to_row();
        self.table
            .update(NAME_COLUMN, &Value::from(CATALOG_TABLE_NAME), &row)
            .context("Failed to persist catalog anchors")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::new("id", DataType::Long),
            ColumnDef::new("name", DataType::String),
        ])
        .unwrap()
    }

    #[test]
    fn test_initialize_describes_itself() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::initialize(Pager::open(dir.path().join("test.db"))?)?;

        let info = catalog
            .get_table(CATALOG_TABLE_NAME)?
            .expect("catalog entry should exist");
        assert_eq!(info.first_page, Some(CATALOG_FIRST_PAGE));
        assert_eq!(info.last_page, Some(CATALOG_FIRST_PAGE));
        assert_eq!(info.schema, catalog_schema());

        Ok(())
    }

    #[test]
    fn test_initialize_requires_empty_file() -> Result<()> {
        let dir = tempdir()?;
        let pager = Pager::open(dir.path().join("test.db"))?;
        pager.append()?;
        assert!(Catalog::initialize(pager).is_err());
        Ok(())
    }

    #[test]
    fn test_create_and_open_table() -> Result<()> {
        let dir = tempdir()?;
        let mut catalog = Catalog::initialize(Pager::open(dir.path().join("test.db"))?)?;

        let mut table = catalog.create_table("users", user_schema())?;
        assert!(catalog.create_table("users", user_schema()).is_err());

        table.insert(&Row::new(vec![Value::Long(1), Value::from("ada")]))?;
        catalog.persist_anchors(&table)?;

        let info = catalog.get_table("users")?.expect("users should exist");
        assert_eq!(info.first_page, table.first_page());
        assert_eq!(info.last_page, table.last_page());
        assert_eq!(info.schema, user_schema());

        let reopened = catalog.open_table("users")?;
        assert_eq!(
            reopened.select("id", &Value::Long(1))?,
            Row::new(vec![Value::Long(1), Value::from("ada")])
        );
        assert!(catalog.open_table("missing").is_err());

        Ok(())
    }

    #[test]
    fn test_anchor_encoding() {
        assert_eq!(encode_anchor(None), -1);
        assert_eq!(decode_anchor(encode_anchor(Some(12))), Some(12));
        assert_eq!(decode_anchor(-1), None);
    }
}
