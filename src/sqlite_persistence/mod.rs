mod versioned_schema;

pub use versioned_schema::{
    apply_schemas, open_versioned, Column, ForeignKey, SqlType, Table, VersionedSchema,
    BASE_DB_VERSION,
};
