//! Commission split computation
//!
//! A paid referral's commission pool is divided across roles by applying the
//! owning company's percentages in a fixed order: agent, team lead, org lead,
//! bonus pool, contractor. Each share is truncated toward zero. The platform
//! (MRN) share is whatever is left, so the parts always add up to the pool.

use serde::{Deserialize, Serialize};

use crate::company::{CompensationStructure, FULL_SHARE_BPS};

/// Role receiving a share of a commission pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShareRole {
    Agent,
    TeamLead,
    OrgLead,
    BonusPool,
    Contractor,
    Mrn,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Agent => "agent",
            ShareRole::TeamLead => "teamLead",
            ShareRole::OrgLead => "orgLead",
            ShareRole::BonusPool => "bonusPool",
            ShareRole::Contractor => "contractor",
            ShareRole::Mrn => "mrn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(ShareRole::Agent),
            "teamLead" => Some(ShareRole::TeamLead),
            "orgLead" => Some(ShareRole::OrgLead),
            "bonusPool" => Some(ShareRole::BonusPool),
            "contractor" => Some(ShareRole::Contractor),
            "mrn" => Some(ShareRole::Mrn),
            _ => None,
        }
    }
}

/// Per-role amounts in minor currency units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSplit {
    pub agent: i64,
    pub team_lead: i64,
    pub org_lead: i64,
    pub bonus_pool: i64,
    pub contractor: i64,
    pub mrn: i64,
}

impl CommissionSplit {
    /// Split `amount` by `structure`, remainder to the MRN share.
    ///
    /// `amount` must be non-negative.
    pub fn compute(amount: i64, structure: &CompensationStructure) -> Self {
        let share = |bps: u32| -> i64 {
            // i128 keeps amount * bps exact for any i64 amount
            (i128::from(amount) * i128::from(bps) / i128::from(FULL_SHARE_BPS)) as i64
        };

        let agent = share(structure.agent_bps);
        let team_lead = share(structure.team_lead_bps);
        let org_lead = share(structure.org_lead_bps);
        let bonus_pool = share(structure.bonus_pool_bps);
        let contractor = share(structure.contractor_bps);
        let mrn = amount - agent - team_lead - org_lead - bonus_pool - contractor;

        Self {
            agent,
            team_lead,
            org_lead,
            bonus_pool,
            contractor,
            mrn,
        }
    }

    /// Entries in allocation order
    pub fn entries(&self) -> [(ShareRole, i64); 6] {
        [
            (ShareRole::Agent, self.agent),
            (ShareRole::TeamLead, self.team_lead),
            (ShareRole::OrgLead, self.org_lead),
            (ShareRole::BonusPool, self.bonus_pool),
            (ShareRole::Contractor, self.contractor),
            (ShareRole::Mrn, self.mrn),
        ]
    }

    pub fn total(&self) -> i64 {
        self.entries().iter().map(|(_, amount)| amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let structure = CompensationStructure::from_percentages(45, 8, 5, 15, 20, 7);
        let split = CommissionSplit::compute(10_000, &structure);

        assert_eq!(
            split,
            CommissionSplit {
                agent: 4500,
                team_lead: 800,
                org_lead: 500,
                bonus_pool: 1500,
                contractor: 700,
                mrn: 2000,
            }
        );
        assert_eq!(split.total(), 10_000);
    }

    #[test]
    fn test_rounding_remainder_goes_to_mrn() {
        let structure = CompensationStructure::from_percentages(45, 8, 5, 15, 20, 7);
        let split = CommissionSplit::compute(9_999, &structure);

        // 9999 * 45% = 4499.55 -> 4499, etc.
        assert_eq!(split.agent, 4499);
        assert_eq!(split.team_lead, 799);
        assert_eq!(split.org_lead, 499);
        assert_eq!(split.bonus_pool, 1499);
        assert_eq!(split.contractor, 699);
        assert_eq!(split.mrn, 9_999 - 4499 - 799 - 499 - 1499 - 699);
        assert_eq!(split.total(), 9_999);
    }

    #[test]
    fn test_unallocated_percentage_goes_to_mrn() {
        // 80% allocated, mrn configured at 10%, 10% unallocated
        let structure = CompensationStructure::from_percentages(50, 10, 5, 10, 10, 5);
        let split = CommissionSplit::compute(1_000, &structure);
        assert_eq!(split.mrn, 200);
        assert_eq!(split.total(), 1_000);
    }

    #[test]
    fn test_totals_hold_across_awkward_amounts() {
        let structures = [
            CompensationStructure::from_percentages(45, 8, 5, 15, 20, 7),
            CompensationStructure::from_percentages(33, 33, 33, 0, 1, 0),
            CompensationStructure {
                agent_bps: 3333,
                team_lead_bps: 1667,
                org_lead_bps: 125,
                bonus_pool_bps: 875,
                mrn_bps: 2000,
                contractor_bps: 2000,
            },
            CompensationStructure::default(),
        ];
        for structure in &structures {
            for amount in [0, 1, 7, 99, 101, 12_345, 1_000_003, i64::from(u32::MAX)] {
                let split = CommissionSplit::compute(amount, structure);
                assert_eq!(split.total(), amount, "{:?} / {}", structure, amount);
                assert!(split.entries().iter().all(|(_, a)| *a >= 0));
            }
        }
    }

    #[test]
    fn test_entries_order_is_fixed() {
        let roles: Vec<ShareRole> = CommissionSplit::default()
            .entries()
            .iter()
            .map(|(role, _)| *role)
            .collect();
        assert_eq!(
            roles,
            vec![
                ShareRole::Agent,
                ShareRole::TeamLead,
                ShareRole::OrgLead,
                ShareRole::BonusPool,
                ShareRole::Contractor,
                ShareRole::Mrn,
            ]
        );
    }
}
