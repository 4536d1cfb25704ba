//! Channel selection: which acquired b-values take part in the fit.
//!
//! Rules:
//! 1. At most one of the inclusion/exclusion lists may be non-empty
//! 2. Inclusion keeps channels whose b-value is in the list; exclusion drops them
//! 3. Membership is exact (`==`), no floating-point tolerance
//! 4. At least `MIN_SELECTED_CHANNELS` channels must remain

use crate::error::AppError;

/// Minimum number of selected channels for any fit.
pub const MIN_SELECTED_CHANNELS: usize = 2;

/// Acquired b-values plus the per-channel "selected for fitting" flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTable {
    b_values: Vec<f64>,
    selected: Vec<bool>,
    selected_b_values: Vec<f64>,
}

/// Fail if both filter lists are given.
pub fn ensure_exclusive_filters(include: &[f64], exclude: &[f64]) -> Result<(), AppError> {
    if !include.is_empty() && !exclude.is_empty() {
        return Err(AppError::config(
            "Either inclusion or exclusion b-values list can be specified, not both!",
        ));
    }
    Ok(())
}

impl ChannelTable {
    /// Resolve the selection for `b_values`.
    pub fn select(b_values: &[f64], include: &[f64], exclude: &[f64]) -> Result<Self, AppError> {
        ensure_exclusive_filters(include, exclude)?;

        let selected: Vec<bool> = if !include.is_empty() {
            b_values.iter().map(|b| include.contains(b)).collect()
        } else if !exclude.is_empty() {
            b_values.iter().map(|b| !exclude.contains(b)).collect()
        } else {
            vec![true; b_values.len()]
        };

        let selected_b_values: Vec<f64> = b_values
            .iter()
            .zip(&selected)
            .filter(|(_, keep)| **keep)
            .map(|(&b, _)| b)
            .collect();

        if selected_b_values.len() < MIN_SELECTED_CHANNELS {
            return Err(AppError::data(format!(
                "Less than {MIN_SELECTED_CHANNELS} values selected ({} of {}), cannot do the fit!",
                selected_b_values.len(),
                b_values.len()
            )));
        }

        Ok(Self {
            b_values: b_values.to_vec(),
            selected,
            selected_b_values,
        })
    }

    /// All acquired b-values, one per channel.
    pub fn b_values(&self) -> &[f64] {
        &self.b_values
    }

    pub fn selected(&self) -> &[bool] {
        &self.selected
    }

    /// b-values of the selected channels, in channel order.
    pub fn selected_b_values(&self) -> &[f64] {
        &self.selected_b_values
    }

    pub fn channel_count(&self) -> usize {
        self.b_values.len()
    }

    pub fn selected_count(&self) -> usize {
        self.selected_b_values.len()
    }

    /// Copy the selected intensities of one voxel into `out`.
    pub fn gather_selected(&self, signal: &[f32], out: &mut Vec<f64>) {
        out.clear();
        out.extend(
            signal
                .iter()
                .zip(&self.selected)
                .filter(|(_, keep)| **keep)
                .map(|(&s, _)| f64::from(s)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EXIT_CONFIG, EXIT_DATA};

    const B: [f64; 5] = [0.0, 100.0, 400.0, 800.0, 1400.0];

    #[test]
    fn no_filters_select_everything() {
        let table = ChannelTable::select(&B, &[], &[]).unwrap();
        assert_eq!(table.selected_count(), 5);
        assert_eq!(table.selected_b_values(), &B);
        assert!(table.selected().iter().all(|&s| s));
    }

    #[test]
    fn inclusion_keeps_only_listed_values() {
        let table = ChannelTable::select(&B, &[0.0, 800.0, 3000.0], &[]).unwrap();
        assert_eq!(table.selected(), &[true, false, false, true, false]);
        assert_eq!(table.selected_b_values(), &[0.0, 800.0]);
        assert_eq!(table.channel_count(), 5);
    }

    #[test]
    fn exclusion_drops_listed_values() {
        let table = ChannelTable::select(&B, &[], &[100.0]).unwrap();
        assert_eq!(table.selected(), &[true, false, true, true, true]);
        assert_eq!(table.selected_count(), 4);
    }

    #[test]
    fn membership_is_exact() {
        let err = ChannelTable::select(&B, &[0.0, 800.0001], &[]).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_DATA);
    }

    #[test]
    fn both_filters_are_a_configuration_error() {
        let err = ChannelTable::select(&B, &[0.0, 800.0], &[100.0]).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        // Even when the two lists would otherwise agree.
        let err = ChannelTable::select(&B, &[0.0], &[0.0]).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn fewer_than_two_channels_is_fatal() {
        assert_eq!(ChannelTable::select(&B, &[400.0], &[]).unwrap_err().exit_code(), EXIT_DATA);
        assert_eq!(
            ChannelTable::select(&B, &[], &[0.0, 100.0, 400.0, 800.0]).unwrap_err().exit_code(),
            EXIT_DATA
        );
        assert_eq!(ChannelTable::select(&[0.0], &[], &[]).unwrap_err().exit_code(), EXIT_DATA);
        assert!(ChannelTable::select(&B, &[0.0, 1400.0], &[]).is_ok());
    }

    #[test]
    fn gather_follows_selection_order() {
        let table = ChannelTable::select(&B, &[], &[400.0]).unwrap();
        let mut out = vec![99.0];
        table.gather_selected(&[10.0, 9.0, 8.0, 7.0, 6.0], &mut out);
        assert_eq!(out, vec![10.0, 9.0, 7.0, 6.0]);
    }
}
