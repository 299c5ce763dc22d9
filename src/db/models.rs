//! Database models for stored session fields.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::db::schema;

/// One stored session field.
#[derive(Debug, Clone, Queryable, Selectable, Getters)]
#[diesel(table_name = schema::session_fields)]
pub struct SessionField {
    key: String,
    value: String,
    updated_at: NaiveDateTime,
}

/// Insertable field; `updated_at` takes the column default.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::session_fields)]
pub struct NewSessionField {
    key: String,
    value: String,
}
