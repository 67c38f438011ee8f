use std::fmt;
use std::str::FromStr;

use sea_orm::*;

use crate::entity::plan_limit;

const MB: i64 = 1024 * 1024;
const GB: i64 = 1024 * MB;

/// Subscription tier. Stored as its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTier {
    Standard,
    Premium,
    Pro,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Standard, PlanTier::Premium, PlanTier::Pro];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Standard => "standard",
            PlanTier::Premium => "premium",
            PlanTier::Pro => "pro",
        }
    }

    /// Built-in limits, used for seeding and when the table has no row for a tier.
    pub fn default_limits(self) -> plan_limit::Model {
        let (rph, rpd, max_file, per_request, storage, containers) = match self {
            PlanTier::Standard => (100, 1_000, 25 * MB, 5, Some(100 * MB), Some(3)),
            PlanTier::Premium => (1_000, 10_000, 100 * MB, 20, Some(5 * GB), Some(10)),
            PlanTier::Pro => (10_000, 100_000, 500 * MB, 100, None, None),
        };
        plan_limit::Model {
            plan: self.as_str().to_string(),
            requests_per_hour: rph,
            requests_per_day: rpd,
            max_file_size: max_file,
            max_files_per_request: per_request,
            storage_limit: storage,
            max_containers: containers,
            api_access: true,
            custom_domains: self != PlanTier::Standard,
            advanced_analytics: self == PlanTier::Pro,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(PlanTier::Standard),
            "premium" => Ok(PlanTier::Premium),
            "pro" => Ok(PlanTier::Pro),
            other => Err(format!("unknown plan '{other}'")),
        }
    }
}

/// Limits for `plan`, falling back to the standard tier's built-in values
/// for unknown plans or unseeded tables.
pub async fn plan_limits<C: ConnectionTrait>(
    conn: &C,
    plan: &str,
) -> Result<plan_limit::Model, DbErr> {
    if let Some(row) = plan_limit::Entity::find_by_id(plan.to_string()).one(conn).await? {
        return Ok(row);
    }
    let tier = plan.parse().unwrap_or(PlanTier::Standard);
    Ok(tier.default_limits())
}
