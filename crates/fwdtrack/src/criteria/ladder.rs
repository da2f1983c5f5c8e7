use serde::{Deserialize, Serialize};

use super::{CriteriaSet, Criterion, CriterionError, CriterionName};

/// Configured cutoff values of one criterion, one entry per retry round.
///
/// Round `n` uses entry `n` when present and the last entry otherwise. An empty
/// list leaves that side of the range open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionCutoffs {
    pub name: String,
    #[serde(default)]
    pub min: Vec<f64>,
    #[serde(default)]
    pub max: Vec<f64>,
}

impl CriterionCutoffs {
    pub fn new(name: CriterionName, min: &[f64], max: &[f64]) -> Self {
        Self {
            name: name.as_str().to_string(),
            min: min.to_vec(),
            max: max.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Rung {
    name: CriterionName,
    min: Vec<f64>,
    max: Vec<f64>,
}

fn pick(values: &[f64], round: usize, open: f64) -> f64 {
    values
        .get(round)
        .or_else(|| values.last())
        .copied()
        .unwrap_or(open)
}

/// Progressively tighter criteria, used to retry an event whose segment graph
/// exceeded the connection budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutoffLadder {
    rungs: Vec<Rung>,
}

impl CutoffLadder {
    pub fn from_cutoffs(cutoffs: &[CriterionCutoffs]) -> Result<Self, CriterionError> {
        let rungs = cutoffs
            .iter()
            .map(|c| {
                Ok(Rung {
                    name: c.name.parse()?,
                    min: c.min.clone(),
                    max: c.max.clone(),
                })
            })
            .collect::<Result<Vec<_>, CriterionError>>()?;
        Ok(Self { rungs })
    }

    /// Number of rounds with at least one configured value.
    pub fn n_rounds(&self) -> usize {
        self.rungs
            .iter()
            .map(|r| r.min.len().max(r.max.len()))
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Criteria for round `round`, or `None` once no criterion has a new value.
    ///
    /// Round 0 always yields a set, possibly empty.
    pub fn criteria_for_round(&self, round: usize) -> Option<CriteriaSet> {
        if round > 0 && round >= self.n_rounds() {
            return None;
        }
        let criteria = self
            .rungs
            .iter()
            .map(|r| {
                Criterion::new(
                    r.name,
                    pick(&r.min, round, f64::NEG_INFINITY),
                    pick(&r.max, round, f64::INFINITY),
                )
            })
            .collect();
        Some(CriteriaSet::new(criteria))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_use_last_value_when_exhausted() {
        let ladder = CutoffLadder::from_cutoffs(&[
            CriterionCutoffs::new(CriterionName::Angle3d, &[0.0], &[10.0, 8.0, 6.0]),
            CriterionCutoffs::new(CriterionName::RzRatio, &[0.99], &[1.25]),
        ])
        .unwrap();
        assert_eq!(ladder.n_rounds(), 3);

        let r2 = ladder.criteria_for_round(2).unwrap();
        assert_eq!(r2.criteria()[0], Criterion::new(CriterionName::Angle3d, 0.0, 6.0));
        assert_eq!(r2.criteria()[1], Criterion::new(CriterionName::RzRatio, 0.99, 1.25));
        assert!(ladder.criteria_for_round(3).is_none());
    }

    #[test]
    fn round_zero_always_exists() {
        let ladder = CutoffLadder::default();
        assert_eq!(ladder.criteria_for_round(0), Some(CriteriaSet::default()));
        assert!(ladder.criteria_for_round(1).is_none());
    }

    #[test]
    fn open_sides_are_unbounded() {
        let ladder =
            CutoffLadder::from_cutoffs(&[CriterionCutoffs::new(CriterionName::Pt, &[0.1], &[])])
                .unwrap();
        let set = ladder.criteria_for_round(0).unwrap();
        assert_eq!(set.criteria()[0].max, f64::INFINITY);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = CutoffLadder::from_cutoffs(&[CriterionCutoffs {
            name: "Crit3_Nope".to_string(),
            min: vec![0.0],
            max: vec![1.0],
        }])
        .unwrap_err();
        assert_eq!(err, CriterionError::UnknownCriterion("Crit3_Nope".to_string()));
    }
}
