//! Primary/secondary color roles and the click transitions between them.

use crate::engine::HexColor;
use crate::error::RejectionError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub primary: Option<HexColor>,
    pub secondary: Option<HexColor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionChange {
    PrimarySet,
    PrimaryCleared,
    SecondarySet,
    SecondaryCleared,
}

impl Selection {
    /// Apply a click on `color`. A click on a selected color clears its
    /// role, otherwise the color fills the first free role. With both roles
    /// taken the click is rejected and the selection stays as it was.
    pub fn click(self, color: HexColor) -> Result<(Selection, SelectionChange), RejectionError> {
        if self.primary == Some(color) {
            Ok((
                Selection {
                    primary: None,
                    ..self
                },
                SelectionChange::PrimaryCleared,
            ))
        } else if self.secondary == Some(color) {
            Ok((
                Selection {
                    secondary: None,
                    ..self
                },
                SelectionChange::SecondaryCleared,
            ))
        } else if self.primary.is_none() {
            Ok((
                Selection {
                    primary: Some(color),
                    ..self
                },
                SelectionChange::PrimarySet,
            ))
        } else if self.secondary.is_none() {
            Ok((
                Selection {
                    secondary: Some(color),
                    ..self
                },
                SelectionChange::SecondarySet,
            ))
        } else {
            Err(RejectionError::SelectionFull)
        }
    }

    /// Both roles, once both are filled.
    pub fn roles(&self) -> Option<(HexColor, HexColor)> {
        self.primary.zip(self.secondary)
    }

    pub fn is_complete(&self) -> bool {
        self.roles().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: HexColor = HexColor::new(255, 0, 0);
    const B: HexColor = HexColor::new(0, 255, 0);
    const C: HexColor = HexColor::new(0, 0, 255);

    fn clicks(colors: &[HexColor]) -> Selection {
        colors
            .iter()
            .fold(Selection::default(), |state, color| state.click(*color).unwrap().0)
    }

    #[test]
    fn test_fills_primary_then_secondary() {
        let (state, change) = Selection::default().click(A).unwrap();
        assert_eq!(change, SelectionChange::PrimarySet);
        assert_eq!(state.primary, Some(A));

        let (state, change) = state.click(B).unwrap();
        assert_eq!(change, SelectionChange::SecondarySet);
        assert_eq!(state.roles(), Some((A, B)));
    }

    #[test]
    fn test_third_color_is_rejected() {
        let full = clicks(&[A, B]);
        let err = full.click(C).unwrap_err();

        assert!(matches!(err, RejectionError::SelectionFull));
        assert_eq!(
            err.to_string(),
            "You can only select a primary and a secondary color."
        );
        // Rejection is a value, the old state is still ours
        assert_eq!(full, clicks(&[A, B]));
    }

    #[test]
    fn test_clicking_primary_clears_it() {
        let (state, change) = clicks(&[A, B]).click(A).unwrap();
        assert_eq!(change, SelectionChange::PrimaryCleared);
        assert_eq!(
            state,
            Selection {
                primary: None,
                secondary: Some(B),
            }
        );
        assert!(!state.is_complete());
    }

    #[test]
    fn test_clicking_secondary_clears_it() {
        let (state, change) = clicks(&[A, B]).click(B).unwrap();
        assert_eq!(change, SelectionChange::SecondaryCleared);
        assert_eq!(state.primary, Some(A));
        assert_eq!(state.secondary, None);
    }

    #[test]
    fn test_freed_primary_is_refilled_first() {
        // {none, B} -> click C fills primary again
        let state = clicks(&[A, B, A, C]);
        assert_eq!(state.roles(), Some((C, B)));
    }

    #[test]
    fn test_roles_never_equal() {
        let state = clicks(&[A, A, A]);
        assert_eq!(state.primary, Some(A));
        assert_eq!(state.secondary, None);
    }
}
