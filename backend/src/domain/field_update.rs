//! Three-state instruction for optional fields.

use serde::{Deserialize, Serialize};

/// How a partial update treats one optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate<T> {
    /// Leave the stored value untouched.
    #[default]
    Unchanged,
    /// Remove the stored value.
    Clear,
    /// Replace the stored value.
    Set(T),
}

impl FieldUpdate<String> {
    /// Interpret user-supplied text: absent leaves the field alone, blank
    /// clears it, anything else replaces it.
    ///
    /// # Examples
    /// ```
    /// use household::domain::FieldUpdate;
    ///
    /// assert_eq!(FieldUpdate::from_text(None), FieldUpdate::Unchanged);
    /// assert_eq!(FieldUpdate::from_text(Some("  ".into())), FieldUpdate::Clear);
    /// assert_eq!(
    ///     FieldUpdate::from_text(Some("Kitchen".into())),
    ///     FieldUpdate::Set("Kitchen".to_owned()),
    /// );
    /// ```
    pub fn from_text(value: Option<String>) -> Self {
        match value {
            None => Self::Unchanged,
            Some(text) if text.trim().is_empty() => Self::Clear,
            Some(text) => Self::Set(text),
        }
    }
}

impl<T> FieldUpdate<T> {
    /// Whether applying this update would leave the field as it is.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Validate or convert the carried value.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<FieldUpdate<U>, E> {
        Ok(match self {
            Self::Unchanged => FieldUpdate::Unchanged,
            Self::Clear => FieldUpdate::Clear,
            Self::Set(value) => FieldUpdate::Set(f(value)?),
        })
    }

    /// Apply the instruction to a stored optional value.
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Self::Unchanged => {}
            Self::Clear => *slot = None,
            Self::Set(value) => *slot = Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FieldUpdate::Unchanged, Some(1), Some(1))]
    #[case(FieldUpdate::Clear, Some(1), None)]
    #[case(FieldUpdate::Set(7), None, Some(7))]
    fn apply_to_follows_instruction(
        #[case] update: FieldUpdate<i32>,
        #[case] before: Option<i32>,
        #[case] after: Option<i32>,
    ) {
        let mut slot = before;
        update.apply_to(&mut slot);
        assert_eq!(slot, after);
    }

    #[rstest]
    fn try_map_propagates_errors() {
        let update = FieldUpdate::Set("x".to_owned());
        let result: Result<FieldUpdate<usize>, &str> = update.try_map(|_| Err("nope"));
        assert_eq!(result, Err("nope"));
    }

    #[rstest]
    fn empty_string_clears() {
        assert_eq!(FieldUpdate::from_text(Some(String::new())), FieldUpdate::Clear);
    }
}
