//! Schema Introspection Module
//!
//! Catalog query text for each engine. Every engine names its metadata
//! differently, so the facade asks the backend for these queries instead of
//! sharing one `information_schema` query across all of them.

/// Catalog queries used by the introspection operations.
///
/// Parameter order:
/// - `table_exists`: table name
/// - `column_exists`: table name, column name
/// - `list_tables`: none
/// - `list_columns`: table name
///
/// The two `*_exists` queries return a single `COUNT(*)`; the two `list_*`
/// queries return one text column.
#[derive(Debug)]
pub struct CatalogQueries {
    pub table_exists: &'static str,
    pub column_exists: &'static str,
    pub list_tables: &'static str,
    pub list_columns: &'static str,
}

pub const SQLITE_CATALOG: CatalogQueries = CatalogQueries {
    table_exists: "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
    column_exists: "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
    list_tables: "SELECT name FROM sqlite_master \
                  WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    list_columns: "SELECT name FROM pragma_table_info(?) ORDER BY cid",
};

pub const POSTGRES_CATALOG: CatalogQueries = CatalogQueries {
    table_exists: "SELECT COUNT(*) FROM information_schema.tables \
                   WHERE table_schema = current_schema() AND table_name::text = ?",
    column_exists: "SELECT COUNT(*) FROM information_schema.columns \
                    WHERE table_schema = current_schema() \
                    AND table_name::text = ? AND column_name::text = ?",
    list_tables: "SELECT table_name::text FROM information_schema.tables \
                  WHERE table_schema = current_schema() ORDER BY table_name",
    list_columns: "SELECT column_name::text FROM information_schema.columns \
                   WHERE table_schema = current_schema() AND table_name::text = ? \
                   ORDER BY ordinal_position",
};

pub const MYSQL_CATALOG: CatalogQueries = CatalogQueries {
    table_exists: "SELECT COUNT(*) FROM information_schema.tables \
                   WHERE table_schema = DATABASE() AND table_name = ?",
    column_exists: "SELECT COUNT(*) FROM information_schema.columns \
                    WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?",
    list_tables: "SELECT table_name FROM information_schema.tables \
                  WHERE table_schema = DATABASE() ORDER BY table_name",
    list_columns: "SELECT column_name FROM information_schema.columns \
                   WHERE table_schema = DATABASE() AND table_name = ? \
                   ORDER BY ordinal_position",
};
