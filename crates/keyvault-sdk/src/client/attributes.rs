//! Management attributes shared by keys, certificates and secrets.
//!
//! The service encodes timestamps as Unix seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ObjectAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(
        rename = "nbf",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,

    #[serde(
        rename = "exp",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_on: Option<DateTime<Utc>>,

    #[serde(
        rename = "created",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing
    )]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(
        rename = "updated",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing
    )]
    pub updated_on: Option<DateTime<Utc>>,

    #[serde(rename = "recoveryLevel", default, skip_serializing)]
    pub recovery_level: Option<String>,

    #[serde(rename = "recoverableDays", default, skip_serializing)]
    pub recoverable_days: Option<i32>,
}

impl ObjectAttributes {
    /// Attributes a caller may set on create.
    pub(crate) fn settable(
        enabled: Option<bool>,
        not_before: Option<DateTime<Utc>>,
        expires_on: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        if enabled.is_none() && not_before.is_none() && expires_on.is_none() {
            return None;
        }
        Some(Self {
            enabled,
            not_before,
            expires_on,
            ..Self::default()
        })
    }
}

/// Deleted-object fields common to every soft-deleted entity.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DeletionInfo {
    #[serde(rename = "recoveryId", default)]
    pub recovery_id: Option<String>,

    #[serde(
        rename = "deletedDate",
        default,
        with = "chrono::serde::ts_seconds_option"
    )]
    pub deleted_on: Option<DateTime<Utc>>,

    #[serde(
        rename = "scheduledPurgeDate",
        default,
        with = "chrono::serde::ts_seconds_option"
    )]
    pub scheduled_purge_date: Option<DateTime<Utc>>,
}
