//! Citizen dashboard statistics.
use serde::Serialize;

use crate::{
    models::{Complaint, ComplaintStatus, PLACEHOLDER},
    triage::timestamp,
};

const RECENT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Totals {
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CompanyCount {
    pub company: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CategoryOverview {
    pub category: String,
    pub resolved: usize,
    pub pending: usize,
    pub fake: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecentComplaint {
    pub id: i64,
    pub category: String,
    pub bus_name: String,
    pub status: ComplaintStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Dashboard {
    pub totals: Totals,
    pub companies: Vec<CompanyCount>,
    pub overview: Vec<CategoryOverview>,
    pub recent: Vec<RecentComplaint>,
}

impl Dashboard {
    pub(crate) fn of(complaints: &[Complaint]) -> Self {
        let totals = Totals {
            total: complaints.len(),
            pending: complaints.iter().filter(|c| c.status.is_open()).count(),
            resolved: complaints
                .iter()
                .filter(|c| c.status == ComplaintStatus::Resolved)
                .count(),
        };

        let mut companies: Vec<CompanyCount> = Vec::new();
        let mut overview: Vec<CategoryOverview> = Vec::new();
        for c in complaints {
            let company = c.bus_name.as_deref().unwrap_or(PLACEHOLDER);
            match companies.iter_mut().find(|x| x.company == company) {
                Some(entry) => entry.count += 1,
                None => companies.push(CompanyCount {
                    company: company.to_owned(),
                    count: 1,
                }),
            }

            let entry = match overview.iter().position(|x| x.category == c.category) {
                Some(i) => &mut overview[i],
                None => {
                    overview.push(CategoryOverview {
                        category: c.category.clone(),
                        resolved: 0,
                        pending: 0,
                        fake: 0,
                    });
                    let last = overview.len() - 1;
                    &mut overview[last]
                }
            };
            match c.status {
                ComplaintStatus::Resolved => entry.resolved += 1,
                ComplaintStatus::Fake => entry.fake += 1,
                _ => entry.pending += 1,
            }
        }
        companies.sort_by(|a, b| b.count.cmp(&a.count));

        let mut newest: Vec<&Complaint> = complaints.iter().collect();
        newest.sort_by(|a, b| timestamp(&b.created_at).cmp(&timestamp(&a.created_at)));
        let recent = newest
            .into_iter()
            .take(RECENT)
            .map(|c| RecentComplaint {
                id: c.id,
                category: c.category.clone(),
                bus_name: c.bus_name.clone().unwrap_or_else(|| PLACEHOLDER.to_owned()),
                status: c.status,
                created_at: c.created_at.clone(),
            })
            .collect();

        Self {
            totals,
            companies,
            overview,
            recent,
        }
    }
}
