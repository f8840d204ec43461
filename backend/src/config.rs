//! Household settings loaded via OrthoConfig.

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_ROOM_NAME, RoomName, RoomValidationError};

const DEFAULT_CLEANUP_QUEUE_CAPACITY: usize = 64;

/// Configuration for the household services.
///
/// Every field can come from CLI flags, `HOUSEHOLD_*` environment variables
/// or a configuration file.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "HOUSEHOLD")]
pub struct HouseholdSettings {
    /// Apply multi-document changes one write at a time instead of in an
    /// all-or-nothing transaction. A failed change may be left half done.
    #[ortho_config(default = false)]
    pub sequential_transactions: bool,
    /// Jobs the cleanup queue holds before it starts refusing new ones.
    pub cleanup_queue_capacity: Option<usize>,
    /// Display name given to newly created rooms.
    pub default_room_name: Option<String>,
}

impl HouseholdSettings {
    /// Return the configured queue capacity, falling back to the default.
    pub fn cleanup_queue_capacity(&self) -> usize {
        self.cleanup_queue_capacity
            .unwrap_or(DEFAULT_CLEANUP_QUEUE_CAPACITY)
    }

    /// Return the configured room name, falling back to the default.
    ///
    /// # Errors
    /// Returns the validation error when the configured name is blank or too
    /// long.
    pub fn default_room_name(&self) -> Result<RoomName, RoomValidationError> {
        RoomName::new(self.default_room_name.as_deref().unwrap_or(DEFAULT_ROOM_NAME))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for household configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> HouseholdSettings {
        HouseholdSettings::load_from_iter([OsString::from("household")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env([
            ("HOUSEHOLD_SEQUENTIAL_TRANSACTIONS", None::<String>),
            ("HOUSEHOLD_CLEANUP_QUEUE_CAPACITY", None::<String>),
            ("HOUSEHOLD_DEFAULT_ROOM_NAME", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert!(!settings.sequential_transactions, "transactions are atomic by default");
        assert_eq!(settings.cleanup_queue_capacity(), DEFAULT_CLEANUP_QUEUE_CAPACITY);
        assert_eq!(
            settings.default_room_name().expect("valid").as_ref(),
            DEFAULT_ROOM_NAME
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("HOUSEHOLD_SEQUENTIAL_TRANSACTIONS", Some("true".to_owned())),
            ("HOUSEHOLD_CLEANUP_QUEUE_CAPACITY", Some("8".to_owned())),
            ("HOUSEHOLD_DEFAULT_ROOM_NAME", Some("Our Place".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.sequential_transactions);
        assert_eq!(settings.cleanup_queue_capacity(), 8);
        assert_eq!(
            settings.default_room_name().expect("valid").as_ref(),
            "Our Place"
        );
    }

    #[rstest]
    fn blank_room_name_is_rejected() {
        let _guard = lock_env([("HOUSEHOLD_DEFAULT_ROOM_NAME", Some("   ".to_owned()))]);

        let settings = load_from_empty_args();
        assert!(settings.default_room_name().is_err());
    }
}
